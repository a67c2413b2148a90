mod common;

use common::*;
use sigel_auth::directory::{SelfRegistration, UserRegistration};
use sigel_auth::entity::oauth2_token;
use sigel_auth::error::AuthError;
use sigel_auth::oauth2::{AuthorizationRequest, SpaceList};
use sigel_auth::store::{ClientChanges, CollectionChanges, NewClient, UserChanges};
use sea_orm::{EntityTrait, PaginatorTrait};

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_bootstrap_runs_once() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    assert!(root.is_admin && root.is_active);
    assert_eq!(root.created_by.as_deref(), Some(root.id.as_str()));

    let second = resources
        .directory()
        .bootstrap_superuser("other@example.org", "Other", PASSWORD)
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_email_is_unique_case_insensitively() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    create_user(&resources, &root, "alice@example.org").await;

    let err = resources
        .directory()
        .register_user(
            &root,
            UserRegistration {
                email: "Alice@Example.ORG".to_string(),
                full_name: "Alice Again".to_string(),
                password: None,
                is_active: true,
                is_admin: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict { entity: "user", .. }));
}

#[tokio::test]
async fn test_email_cannot_change_even_for_superuser() {
    let resources = setup().await;
    let directory = resources.directory();
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;

    let err = directory
        .update_user(
            &root,
            &alice.id,
            UserChanges {
                email: Some("new@example.org".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationFailed { field: "email", .. }));

    // Same address in another case is not a change
    let updated = directory
        .update_user(
            &root,
            &alice.id,
            UserChanges {
                email: Some("ALICE@example.org".to_string()),
                full_name: Some("Alice Liddell".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.email, "alice@example.org");
    assert_eq!(updated.full_name, "Alice Liddell");
    assert_eq!(updated.modified_by.as_deref(), Some(root.id.as_str()));
}

#[tokio::test]
async fn test_user_edits_self_but_not_privileges() {
    let resources = setup().await;
    let directory = resources.directory();
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;
    let bob = create_user(&resources, &root, "bob@example.org").await;

    directory
        .update_user(
            &alice,
            &alice.id,
            UserChanges {
                full_name: Some("Alice L.".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("edit own name");

    let err = directory
        .update_user(
            &alice,
            &alice.id,
            UserChanges {
                is_admin: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InsufficientPrivileges));

    let err = directory
        .update_user(
            &alice,
            &bob.id,
            UserChanges {
                full_name: Some("Bobby".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InsufficientPrivileges));
}

#[tokio::test]
async fn test_self_registration_requires_terms() {
    let resources = setup().await;
    let directory = resources.directory();

    let err = directory
        .self_register(SelfRegistration {
            email: "new@example.org".to_string(),
            full_name: "New User".to_string(),
            password: PASSWORD.to_string(),
            tos_approved: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationFailed { field: "tos_approved", .. }));

    let user = directory
        .self_register(SelfRegistration {
            email: "New@Example.org".to_string(),
            full_name: "New User".to_string(),
            password: PASSWORD.to_string(),
            tos_approved: true,
        })
        .await
        .unwrap();
    assert_eq!(user.email, "new@example.org");
    assert!(user.tos_approved_at.is_some());
    assert!(!user.is_admin);
    assert_eq!(user.created_by.as_deref(), Some(user.id.as_str()));
}

#[tokio::test]
async fn test_change_password_checks_current_for_self() {
    let resources = setup().await;
    let directory = resources.directory();
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;

    let err = directory
        .change_password(&alice, &alice.id, Some("wrong password"), "a brand new one")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationFailed { field: "current_password", .. }));

    directory
        .change_password(&alice, &alice.id, Some(PASSWORD), "a brand new one")
        .await
        .expect("change own password");

    // Superusers reset other accounts without the current password
    directory
        .change_password(&root, &alice.id, None, "set by the admin")
        .await
        .expect("admin sets password");

    let authenticator = resources.authenticator();
    assert!(
        authenticator
            .login("alice@example.org", "set by the admin", "192.0.2.1")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_short_password_is_rejected() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;

    let err = resources
        .directory()
        .change_password(&alice, &alice.id, Some(PASSWORD), "short")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationFailed { field: "password", .. }));
}

#[tokio::test]
async fn test_delete_user_anonymises_and_revokes_access() {
    let resources = setup().await;
    let directory = resources.directory();
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;
    let sfx = create_collection(&resources, &root, "SfX").await;
    let client = create_client(&resources, &root, true).await;
    grant(&resources, &root, &alice, &sfx, cataloger()).await;

    let tokens = resources.tokens();
    let grant_row = tokens
        .authorize(
            &AuthorizationRequest {
                client_id: client.id.clone(),
                ..Default::default()
            },
            &alice,
        )
        .await
        .unwrap();
    let token = tokens
        .exchange_code(&client, &grant_row.code, None, None)
        .await
        .unwrap();

    let err = directory.delete_user(&alice, &alice.id).await.unwrap_err();
    assert!(matches!(err, AuthError::InsufficientPrivileges));
    let err = directory.delete_user(&root, &root.id).await.unwrap_err();
    assert!(matches!(err, AuthError::ValidationFailed { .. }));

    let deleted = directory.delete_user(&root, &alice.id).await.unwrap();
    assert_eq!(deleted.id, alice.id);
    assert_ne!(deleted.email, "alice@example.org");
    assert!(deleted.email.ends_with("@invalid"));
    assert!(!deleted.is_active);
    assert!(deleted.password_hash.is_none());

    assert!(
        directory
            .visible_permissions(&root, &alice.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        tokens.verify(&token.access_token).await,
        Err(AuthError::TokenNotFound)
    ));

    // The address is free for a new account
    create_user(&resources, &root, "alice@example.org").await;
}

// =============================================================================
// Collections
// =============================================================================

#[tokio::test]
async fn test_collection_code_is_immutable() {
    let resources = setup().await;
    let directory = resources.directory();
    let root = create_superuser(&resources).await;
    let sfx = create_collection(&resources, &root, "SfX").await;

    let err = directory
        .update_collection(
            &root,
            &sfx.id,
            CollectionChanges {
                code: Some("SfY".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationFailed { field: "code", .. }));

    let updated = directory
        .update_collection(
            &root,
            &sfx.id,
            CollectionChanges {
                code: Some("SfX".to_string()),
                friendly_name: Some("Stockholm".to_string()),
                replaced_by: Some(Some("Sthm".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.code, "SfX");
    assert_eq!(updated.friendly_name, "Stockholm");
    assert_eq!(updated.replaced_by.as_deref(), Some("Sthm"));
}

#[tokio::test]
async fn test_collections_are_managed_by_superusers() {
    let resources = setup().await;
    let directory = resources.directory();
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;
    let sfx = create_collection(&resources, &root, "SfX").await;

    // Anyone active may list them
    assert_eq!(directory.list_collections(&alice).await.unwrap().len(), 1);

    let err = directory.deactivate_collection(&alice, &sfx.id).await.unwrap_err();
    assert!(matches!(err, AuthError::InsufficientPrivileges));

    let deactivated = directory.deactivate_collection(&root, &sfx.id).await.unwrap();
    assert!(!deactivated.is_active);
}

#[tokio::test]
async fn test_duplicate_collection_code_conflicts() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    create_collection(&resources, &root, "SfX").await;

    let err = resources
        .directory()
        .register_collection(
            &root,
            sigel_auth::store::NewCollection {
                code: "SfX".to_string(),
                friendly_name: "Duplicate".to_string(),
                category: sigel_auth::entity::collection::Category::Library,
                is_active: true,
                is_super: false,
                replaces: None,
                replaced_by: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict { entity: "collection", .. }));
}

// =============================================================================
// Clients
// =============================================================================

#[tokio::test]
async fn test_client_redirect_uris_are_validated() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;

    let err = resources
        .directory()
        .register_client(
            &root,
            NewClient {
                name: "Broken".to_string(),
                description: None,
                is_confidential: true,
                redirect_uris: SpaceList::decode("/relative/cb"),
                default_scopes: SpaceList::decode("read"),
                user_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ValidationFailed { field: "redirect_uris", .. }));
}

#[tokio::test]
async fn test_client_secret_rotation() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    let client = create_client(&resources, &root, true).await;

    let rotated = resources
        .directory()
        .update_client(
            &root,
            &client.id,
            ClientChanges {
                rotate_secret: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(rotated.secret, client.secret);

    let tokens = resources.tokens();
    assert!(matches!(
        tokens.authenticate_client(&client.id, Some(&client.secret)).await,
        Err(AuthError::InvalidClient)
    ));
    assert!(
        tokens
            .authenticate_client(&client.id, Some(&rotated.secret))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_delete_client_removes_its_tokens() {
    let resources = setup().await;
    let directory = resources.directory();
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;
    let client = create_client(&resources, &root, true).await;

    let tokens = resources.tokens();
    let grant_row = tokens
        .authorize(
            &AuthorizationRequest {
                client_id: client.id.clone(),
                ..Default::default()
            },
            &alice,
        )
        .await
        .unwrap();
    tokens
        .exchange_code(&client, &grant_row.code, None, None)
        .await
        .unwrap();

    let err = directory.delete_client(&alice, &client.id).await.unwrap_err();
    assert!(matches!(err, AuthError::InsufficientPrivileges));

    directory.delete_client(&root, &client.id).await.unwrap();
    let remaining = oauth2_token::Entity::find()
        .count(resources.db.as_ref())
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let err = directory.delete_client(&root, &client.id).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound { entity: "client", .. }));
}
