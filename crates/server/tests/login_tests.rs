mod common;

use common::*;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use sigel_auth::entity::failed_login_attempt;
use sigel_auth::error::AuthError;
use sigel_auth::store::UserChanges;
use time::{Duration, OffsetDateTime};

const ADDR: &str = "198.51.100.20";

#[tokio::test]
async fn test_login_with_correct_password() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;
    assert!(alice.last_login_at.is_none());

    let user = resources
        .authenticator()
        .login("  Alice@Example.org ", PASSWORD, ADDR)
        .await
        .expect("login");
    assert_eq!(user.id, alice.id);

    let reloaded = resources.directory().users().get(&alice.id).await.unwrap();
    assert!(reloaded.last_login_at.is_some());
}

#[tokio::test]
async fn test_unknown_and_wrong_password_look_the_same() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    create_user(&resources, &root, "alice@example.org").await;
    let authenticator = resources.authenticator();

    let unknown = authenticator
        .login("nobody@example.org", PASSWORD, ADDR)
        .await
        .unwrap_err();
    let wrong = authenticator
        .login("alice@example.org", "not the password", ADDR)
        .await
        .unwrap_err();
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn test_inactive_account_cannot_log_in() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;
    resources
        .directory()
        .update_user(
            &root,
            &alice.id,
            UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = resources
        .authenticator()
        .login("alice@example.org", PASSWORD, ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_throttle_blocks_even_the_right_password() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    create_user(&resources, &root, "alice@example.org").await;
    let authenticator = resources.authenticator();

    // test_config allows three failures per window
    for _ in 0..3 {
        let err = authenticator
            .login("alice@example.org", "guess", ADDR)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    let err = authenticator
        .login("alice@example.org", PASSWORD, ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimited));

    // Counted per (username, address) pair
    assert!(
        authenticator
            .login("alice@example.org", PASSWORD, "198.51.100.21")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_successful_login_clears_failures() {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    create_user(&resources, &root, "alice@example.org").await;
    let authenticator = resources.authenticator();
    let throttle = resources.throttle();

    for _ in 0..2 {
        let _ = authenticator.login("alice@example.org", "guess", ADDR).await;
    }
    assert_eq!(
        throttle
            .recent_failures("ALICE@example.org", ADDR, 900)
            .await
            .unwrap(),
        2
    );

    authenticator
        .login("alice@example.org", PASSWORD, ADDR)
        .await
        .expect("login");
    assert_eq!(
        throttle
            .recent_failures("alice@example.org", ADDR, 900)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_throttle_window_and_limit() {
    let resources = setup().await;
    let throttle = resources.throttle();

    throttle.record_failure("bob@example.org", ADDR).await.unwrap();
    throttle.record_failure("bob@example.org", ADDR).await.unwrap();

    assert!(!throttle.is_blocked("bob@example.org", ADDR, 900, 3).await.unwrap());
    assert!(throttle.is_blocked("bob@example.org", ADDR, 900, 2).await.unwrap());
    assert!(!throttle.check("bob@example.org", ADDR).await.unwrap());

    assert_eq!(throttle.purge("bob@example.org", ADDR).await.unwrap(), 2);
    assert!(!throttle.is_blocked("bob@example.org", ADDR, 900, 1).await.unwrap());
}

#[tokio::test]
async fn test_attempts_outside_window_are_ignored_and_pruned() {
    let resources = setup().await;
    let throttle = resources.throttle();

    // test_config uses a 900 second window
    failed_login_attempt::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        username: Set("bob@example.org".to_string()),
        remote_addr: Set(ADDR.to_string()),
        created_at: Set(OffsetDateTime::now_utc() - Duration::seconds(2000)),
    }
    .insert(resources.db.as_ref())
    .await
    .unwrap();

    assert_eq!(
        throttle.recent_failures("bob@example.org", ADDR, 900).await.unwrap(),
        0
    );
    assert!(!throttle.is_blocked("bob@example.org", ADDR, 900, 1).await.unwrap());

    throttle.record_failure("bob@example.org", ADDR).await.unwrap();

    let rows = failed_login_attempt::Entity::find()
        .filter(failed_login_attempt::Column::Username.eq("bob@example.org"))
        .all(resources.db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].created_at > OffsetDateTime::now_utc() - Duration::seconds(900));
}
