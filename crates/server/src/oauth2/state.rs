//! Shared state for the OAuth2 endpoints.

use crate::auth::Authenticator;
use crate::oauth2::tokens::TokenService;

#[derive(Clone)]
pub struct OAuth2State {
    pub tokens: TokenService,
    pub authenticator: Authenticator,
    /// Public base URL of this service
    pub issuer_url: String,
}

impl OAuth2State {
    pub fn new(tokens: TokenService, authenticator: Authenticator, issuer_url: String) -> Self {
        Self {
            tokens,
            authenticator,
            issuer_url,
        }
    }
}
