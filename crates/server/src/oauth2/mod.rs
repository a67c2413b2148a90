//! OAuth2 authorization server.
//!
//! ## Supported Flows
//!
//! - Authorization Code (PKCE S256 required for public clients)
//! - Refresh Token (rotating)
//!
//! ## Endpoints
//!
//! - `POST /oauth2/authorize` - Log in and obtain an authorization code
//! - `POST /oauth2/token` - Exchange a code or refresh token
//! - `POST /oauth2/revoke` - Token revocation
//! - `GET /oauth2/verify` - Resolve a bearer token to its user and permissions
//! - `GET /oauth2/.well-known/oauth-authorization-server` - Server metadata

pub mod endpoints;
mod scope;
mod state;
pub mod tokens;

pub use endpoints::router;
pub use scope::SpaceList;
pub use state::OAuth2State;
pub use tokens::{AuthorizationRequest, Principal, TokenService};

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
