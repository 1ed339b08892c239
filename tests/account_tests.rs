//! Account lifecycle tests against Postgres (`SURF_TEST_DATABASE_URL`)
mod common;

use common::{db_app, email_for, register_user, unique_name, verified_user, TEST_PASSWORD};
use std::collections::HashMap;
use surf_club::{
    account::{LoginRequest, RegisterRequest},
    db::models::User,
    validation::{ImageChange, SessionFields},
    SurfError,
};
use uuid::Uuid;

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

async fn load_user(pool: &sqlx::PgPool, id: Uuid) -> Option<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .unwrap()
}

fn session_form() -> SessionFields {
    let form: HashMap<String, String> = [
        ("title", "Evening glass"),
        ("location", "Malibu"),
        ("wave_height", "1.2"),
        ("wave_period", "10"),
        ("wind_speed", "3"),
        ("wind_direction", "W"),
        ("tide_type", "high"),
        ("rating", "4"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    SessionFields::from_form(&form).unwrap()
}

#[tokio::test]
async fn test_registration_creates_unverified_user_with_token() {
    let Some(app) = db_app().await else { return };
    let (id, username) = register_user(&app, "reg").await;

    let user = load_user(&app.pool, id).await.unwrap();
    assert!(!user.email_verified);
    let token = user.email_verification_token.clone().unwrap();
    assert_eq!(token.len(), 64);
    assert!(user.email_verification_expires.unwrap() > chrono::Utc::now());
    assert_ne!(user.password_hash, TEST_PASSWORD);

    let mails = app.mail.sent_to(&email_for(&username));
    assert_eq!(mails.len(), 1);
    assert!(mails[0].body.contains(&format!("/verify-email?token={}", token)));
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let Some(app) = db_app().await else { return };
    let (_, username) = register_user(&app, "dup").await;

    let result = app
        .ctx
        .account_manager
        .register(RegisterRequest {
            email: format!("other_{}", email_for(&username)),
            username,
            password: TEST_PASSWORD.to_string(),
        })
        .await;

    assert!(matches!(result, Err(SurfError::Conflict(_))));
}

#[tokio::test]
async fn test_login_requires_verification_then_succeeds() {
    let Some(app) = db_app().await else { return };
    let (id, username) = register_user(&app, "login").await;
    let email = email_for(&username);

    match app.ctx.account_manager.login(login(&email, TEST_PASSWORD)).await {
        Err(SurfError::VerificationRequired { email: reported }) => assert_eq!(reported, email),
        other => panic!("Expected VerificationRequired, got {:?}", other.map(|r| r.user)),
    }

    let token = load_user(&app.pool, id)
        .await
        .unwrap()
        .email_verification_token
        .unwrap();
    let verified = app.ctx.account_manager.verify_email(&token).await.unwrap();
    assert!(verified.email_verified);

    let user = load_user(&app.pool, id).await.unwrap();
    assert!(user.email_verified);
    assert!(user.email_verification_token.is_none());
    assert!(user.email_verification_expires.is_none());

    // Tokens are single use
    assert!(matches!(
        app.ctx.account_manager.verify_email(&token).await,
        Err(SurfError::InvalidOrExpiredToken(_))
    ));

    let result = app
        .ctx
        .account_manager
        .login(login(&email, TEST_PASSWORD))
        .await
        .unwrap();
    assert_eq!(result.user.id, id);
    assert!(!result.token.is_empty());
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
    let Some(app) = db_app().await else { return };
    let (_, username) = verified_user(&app, "creds").await;

    let wrong_password = app
        .ctx
        .account_manager
        .login(login(&email_for(&username), "not-the-password"))
        .await;
    let unknown = app
        .ctx
        .account_manager
        .login(login(&email_for(&unique_name("ghost")), TEST_PASSWORD))
        .await;

    assert!(matches!(wrong_password, Err(SurfError::InvalidCredentials)));
    assert!(matches!(unknown, Err(SurfError::InvalidCredentials)));
}

#[tokio::test]
async fn test_expired_verification_token_rejected() {
    let Some(app) = db_app().await else { return };
    let (id, _) = register_user(&app, "expired").await;

    sqlx::query(
        "UPDATE users SET email_verification_expires = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(id)
    .execute(&app.pool)
    .await
    .unwrap();

    let token = load_user(&app.pool, id)
        .await
        .unwrap()
        .email_verification_token
        .unwrap();

    assert!(matches!(
        app.ctx.account_manager.verify_email(&token).await,
        Err(SurfError::InvalidOrExpiredToken(_))
    ));

    // The cleanup job clears it
    assert!(app.ctx.account_manager.clear_expired_tokens().await.unwrap() >= 1);
    assert!(load_user(&app.pool, id)
        .await
        .unwrap()
        .email_verification_token
        .is_none());
}

#[tokio::test]
async fn test_resend_verification() {
    let Some(app) = db_app().await else { return };
    let (id, username) = register_user(&app, "resend").await;
    let email = email_for(&username);
    let first = load_user(&app.pool, id).await.unwrap().email_verification_token;

    app.ctx.account_manager.resend_verification(&email).await.unwrap();

    let second = load_user(&app.pool, id).await.unwrap().email_verification_token;
    assert_ne!(first, second);
    assert_eq!(app.mail.sent_to(&email).len(), 2);

    assert!(matches!(
        app.ctx
            .account_manager
            .resend_verification(&email_for(&unique_name("nobody")))
            .await,
        Err(SurfError::NotFound(_))
    ));

    let (_, verified_name) = verified_user(&app, "resent").await;
    assert!(matches!(
        app.ctx
            .account_manager
            .resend_verification(&email_for(&verified_name))
            .await,
        Err(SurfError::AlreadyVerified)
    ));
}

#[tokio::test]
async fn test_password_reset_flow() {
    let Some(app) = db_app().await else { return };
    let (id, username) = verified_user(&app, "reset").await;
    let email = email_for(&username);

    // Unknown addresses succeed without sending anything
    let ghost = email_for(&unique_name("ghost"));
    app.ctx.account_manager.forgot_password(&ghost).await.unwrap();
    assert!(app.mail.sent_to(&ghost).is_empty());

    app.ctx.account_manager.forgot_password(&email).await.unwrap();

    let user = load_user(&app.pool, id).await.unwrap();
    let reset_token = user.password_reset_token.unwrap();
    assert!(app
        .mail
        .sent_to(&email)
        .iter()
        .any(|m| m.body.contains(&format!("/reset-password?token={}", reset_token))));

    app.ctx
        .account_manager
        .reset_password(&reset_token, "newpassword".to_string())
        .await
        .unwrap();

    let user = load_user(&app.pool, id).await.unwrap();
    assert!(user.password_reset_token.is_none());

    assert!(matches!(
        app.ctx
            .account_manager
            .reset_password(&reset_token, "another1".to_string())
            .await,
        Err(SurfError::InvalidOrExpiredToken(_))
    ));

    assert!(app
        .ctx
        .account_manager
        .login(login(&email, TEST_PASSWORD))
        .await
        .is_err());
    assert!(app
        .ctx
        .account_manager
        .login(login(&email, "newpassword"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_forgot_password_ignores_unverified_accounts() {
    let Some(app) = db_app().await else { return };
    let (id, username) = register_user(&app, "unver").await;
    let email = email_for(&username);

    app.ctx.account_manager.forgot_password(&email).await.unwrap();

    assert!(load_user(&app.pool, id).await.unwrap().password_reset_token.is_none());
    // Only the registration email was sent
    assert_eq!(app.mail.sent_to(&email).len(), 1);
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let Some(app) = db_app().await else { return };
    let (_, username) = verified_user(&app, "searchy").await;

    let hits = app.ctx.account_manager.search(&username.to_uppercase()).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].username, username);

    // "%%" would match everyone if passed through unescaped
    let hits = app.ctx.account_manager.search("%%").await.unwrap();
    assert!(hits.iter().all(|u| u.username.contains("%%")));

    assert!(matches!(
        app.ctx.account_manager.search("a").await,
        Err(SurfError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_profile_counts_sessions() {
    let Some(app) = db_app().await else { return };
    let (id, _) = verified_user(&app, "prof").await;

    app.ctx
        .session_manager
        .create(id, session_form(), ImageChange::Keep)
        .await
        .unwrap();

    let profile = app.ctx.account_manager.profile(id).await.unwrap();
    assert_eq!(profile.session_count, 1);

    let public = app.ctx.account_manager.public_profile(id).await.unwrap();
    assert_eq!(public.session_count, 1);
}

#[tokio::test]
async fn test_delete_account_requires_password() {
    let Some(app) = db_app().await else { return };
    let (id, _) = verified_user(&app, "keep").await;

    assert!(matches!(
        app.ctx
            .account_manager
            .delete_account(id, "wrong-password".to_string())
            .await,
        Err(SurfError::InvalidPassword)
    ));
    assert!(load_user(&app.pool, id).await.is_some());
}

async fn count(pool: &sqlx::PgPool, sql: &str, id: Uuid) -> i64 {
    let (n,): (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await.unwrap();
    n
}

async fn footprint(pool: &sqlx::PgPool, id: Uuid) -> [i64; 5] {
    [
        count(pool, "SELECT COUNT(*) FROM session_comments WHERE user_id = $1", id).await,
        count(pool, "SELECT COUNT(*) FROM session_likes WHERE user_id = $1", id).await,
        count(
            pool,
            "SELECT COUNT(*) FROM messages WHERE sender_id = $1 OR receiver_id = $1",
            id,
        )
        .await,
        count(pool, "SELECT COUNT(*) FROM surf_sessions WHERE user_id = $1", id).await,
        count(pool, "SELECT COUNT(*) FROM users WHERE id = $1", id).await,
    ]
}

/// Give `user` a comment, a like, a message and a session; `other` owns a liked session
async fn populate(app: &common::TestApp, user: Uuid, other: Uuid) -> Uuid {
    let theirs = app
        .ctx
        .session_manager
        .create(other, session_form(), ImageChange::Keep)
        .await
        .unwrap();
    let mine = app
        .ctx
        .session_manager
        .create(user, session_form(), ImageChange::Keep)
        .await
        .unwrap();

    app.ctx.like_manager.toggle(user, theirs.id).await.unwrap();
    app.ctx.like_manager.toggle(other, mine.id).await.unwrap();
    app.ctx
        .comment_manager
        .add(user, theirs.id, "Looks firing")
        .await
        .unwrap();
    app.ctx
        .comment_manager
        .add(other, mine.id, "Jealous")
        .await
        .unwrap();
    app.ctx
        .message_manager
        .send(user, other, "Paddle out tomorrow?")
        .await
        .unwrap();
    app.ctx
        .message_manager
        .send(other, user, "Dawn patrol")
        .await
        .unwrap();

    mine.id
}

#[tokio::test]
async fn test_delete_account_removes_everything() {
    let Some(app) = db_app().await else { return };
    let (user, _) = verified_user(&app, "leaver").await;
    let (other, _) = verified_user(&app, "stayer").await;
    let mine = populate(&app, user, other).await;

    assert_eq!(footprint(&app.pool, user).await, [1, 1, 2, 1, 1]);

    app.ctx
        .account_manager
        .delete_account(user, TEST_PASSWORD.to_string())
        .await
        .unwrap();

    assert_eq!(footprint(&app.pool, user).await, [0, 0, 0, 0, 0]);

    // Other users' activity on the deleted sessions is gone too
    assert_eq!(
        count(&app.pool, "SELECT COUNT(*) FROM session_likes WHERE session_id = $1", mine).await,
        0
    );
    assert_eq!(
        count(&app.pool, "SELECT COUNT(*) FROM session_comments WHERE session_id = $1", mine).await,
        0
    );
    // The other account keeps its own session
    assert_eq!(footprint(&app.pool, other).await[3], 1);
}

#[tokio::test]
async fn test_delete_account_rolls_back_on_failure() {
    let Some(app) = db_app().await else { return };
    let (user, username) = verified_user(&app, "stuck").await;
    let (other, _) = verified_user(&app, "friend").await;
    populate(&app, user, other).await;

    let before = footprint(&app.pool, user).await;
    let trigger = format!("surf_test_block_{}", Uuid::new_v4().simple());

    sqlx::query(
        "CREATE OR REPLACE FUNCTION surf_test_block_user_delete() RETURNS trigger AS $$
         BEGIN
             IF OLD.username = TG_ARGV[0] THEN
                 RAISE EXCEPTION 'user delete blocked for test';
             END IF;
             RETURN OLD;
         END;
         $$ LANGUAGE plpgsql",
    )
    .execute(&app.pool)
    .await
    .unwrap();

    sqlx::query(&format!(
        "CREATE TRIGGER {} BEFORE DELETE ON users FOR EACH ROW
         EXECUTE FUNCTION surf_test_block_user_delete('{}')",
        trigger, username
    ))
    .execute(&app.pool)
    .await
    .unwrap();

    let result = app
        .ctx
        .account_manager
        .delete_account(user, TEST_PASSWORD.to_string())
        .await;

    sqlx::query(&format!("DROP TRIGGER {} ON users", trigger))
        .execute(&app.pool)
        .await
        .unwrap();

    assert!(matches!(result, Err(SurfError::Database(_))));
    assert_eq!(footprint(&app.pool, user).await, before);

    // With the failure gone the same request goes through
    app.ctx
        .account_manager
        .delete_account(user, TEST_PASSWORD.to_string())
        .await
        .unwrap();
    assert_eq!(footprint(&app.pool, user).await, [0, 0, 0, 0, 0]);
}
