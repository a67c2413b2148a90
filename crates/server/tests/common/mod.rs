#![allow(dead_code)]

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use sigel_auth::AppResources;
use sigel_auth::auth::Capabilities;
use sigel_auth::config::{
    AppConfig, OAuth2Config, PasswordConfig, PasswordResetConfig, ThrottleConfig,
};
use sigel_auth::directory::UserRegistration;
use sigel_auth::entity::{collection, oauth2_client, permission, user};
use sigel_auth::oauth2::SpaceList;
use sigel_auth::store::{NewClient, NewCollection, NewPermission};
use std::sync::Arc;

pub const PASSWORD: &str = "correct horse battery";
pub const REDIRECT_URI: &str = "https://app.example/cb";
pub const ALT_REDIRECT_URI: &str = "https://app.example/alt";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        issuer_url: "http://localhost:8080".to_string(),
        oauth2: OAuth2Config::default(),
        // Cheapest parameters argon2 accepts
        password: PasswordConfig {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        },
        throttle: ThrottleConfig {
            window_seconds: 900,
            max_attempts: 3,
        },
        password_reset: PasswordResetConfig {
            lifetime_days: 7,
            max_active_per_user: 2,
        },
        bootstrap: None,
    }
}

pub async fn setup() -> AppResources {
    setup_with(test_config()).await
}

pub async fn setup_with(config: AppConfig) -> AppResources {
    // A single connection keeps every query on the same in-memory database.
    let mut opts = ConnectOptions::new(config.database_url.clone());
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await.expect("connect to sqlite");
    Migrator::up(&db, None).await.expect("run migrations");

    AppResources::new(Arc::new(db), Arc::new(config)).expect("build resources")
}

pub async fn create_superuser(resources: &AppResources) -> user::Model {
    resources
        .directory()
        .bootstrap_superuser("root@example.org", "Root", PASSWORD)
        .await
        .expect("bootstrap superuser")
        .expect("no superuser existed yet")
}

pub async fn create_user(resources: &AppResources, actor: &user::Model, email: &str) -> user::Model {
    resources
        .directory()
        .register_user(
            actor,
            UserRegistration {
                email: email.to_string(),
                full_name: format!("User {email}"),
                password: Some(PASSWORD.to_string()),
                is_active: true,
                is_admin: false,
            },
        )
        .await
        .expect("register user")
}

pub async fn create_collection(
    resources: &AppResources,
    actor: &user::Model,
    code: &str,
) -> collection::Model {
    resources
        .directory()
        .register_collection(
            actor,
            NewCollection {
                code: code.to_string(),
                friendly_name: format!("Library {code}"),
                category: collection::Category::Library,
                is_active: true,
                is_super: false,
                replaces: None,
                replaced_by: None,
            },
        )
        .await
        .expect("register collection")
}

pub async fn grant(
    resources: &AppResources,
    actor: &user::Model,
    user: &user::Model,
    collection: &collection::Model,
    capabilities: Capabilities,
) -> permission::Model {
    resources
        .directory()
        .register_permission(
            actor,
            NewPermission {
                user_id: user.id.clone(),
                collection_id: collection.id.clone(),
                capabilities,
            },
        )
        .await
        .expect("register permission")
}

pub fn cataloger() -> Capabilities {
    Capabilities {
        registrant: false,
        cataloger: true,
        cataloging_admin: false,
    }
}

pub fn cataloging_admin() -> Capabilities {
    Capabilities {
        registrant: false,
        cataloger: true,
        cataloging_admin: true,
    }
}

pub async fn create_client(
    resources: &AppResources,
    actor: &user::Model,
    is_confidential: bool,
) -> oauth2_client::Model {
    resources
        .directory()
        .register_client(
            actor,
            NewClient {
                name: "Cataloguing UI".to_string(),
                description: None,
                is_confidential,
                redirect_uris: SpaceList::new([REDIRECT_URI, ALT_REDIRECT_URI]),
                default_scopes: SpaceList::decode("read write"),
                user_id: None,
            },
        )
        .await
        .expect("register client")
}

/// base64url(SHA-256(verifier)), the S256 code challenge.
pub fn s256_challenge(verifier: &str) -> String {
    use base64::Engine;
    use sha2::{Digest, Sha256};
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
