//! Identity and authorization provider for a library consortium.
//!
//! Manages users, collections (library sigels) and per-collection permissions,
//! and runs an OAuth2 authorization server so downstream services can verify
//! who a caller is and what they may do.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{Authenticator, LoginThrottle, PasswordHasher, PasswordResets};
use crate::config::AppConfig;
use crate::directory::Directory;
use crate::error::AuthError;
use crate::oauth2::{OAuth2State, TokenService};
use crate::store::UserRepository;

pub mod api;
pub mod auth;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod store;

/// Shared handles from which the services are built.
#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub hasher: PasswordHasher,
}

impl AppResources {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Result<Self, AuthError> {
        let hasher = PasswordHasher::new(&config.password)?;
        Ok(Self { db, config, hasher })
    }

    pub fn directory(&self) -> Directory {
        Directory::new(self.db.clone(), self.hasher.clone())
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(
            UserRepository::new(self.db.clone()),
            self.hasher.clone(),
            self.throttle(),
        )
    }

    pub fn throttle(&self) -> LoginThrottle {
        LoginThrottle::new(self.db.clone(), self.config.throttle.clone())
    }

    pub fn password_resets(&self) -> PasswordResets {
        PasswordResets::new(
            self.db.clone(),
            self.hasher.clone(),
            self.config.password_reset.clone(),
        )
    }

    pub fn tokens(&self) -> TokenService {
        TokenService::new(self.db.clone(), self.config.oauth2.clone())
    }

    pub fn oauth2_state(&self) -> OAuth2State {
        OAuth2State::new(
            self.tokens(),
            self.authenticator(),
            self.config.issuer_url.clone(),
        )
    }
}
