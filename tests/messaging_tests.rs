//! Direct message tests against Postgres (`SURF_TEST_DATABASE_URL`)
mod common;

use common::{db_app, verified_user};
use surf_club::SurfError;
use uuid::Uuid;

#[tokio::test]
async fn test_conversation_listed_once_per_side() {
    let Some(app) = db_app().await else { return };
    let (a, a_name) = verified_user(&app, "caller").await;
    let (b, b_name) = verified_user(&app, "callee").await;
    let messages = &app.ctx.message_manager;

    messages.send(a, b, "Swell is building").await.unwrap();
    messages.send(b, a, "See you at the point").await.unwrap();

    let for_a = messages.list_conversations(a).await.unwrap();
    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].other_user_id, b);
    assert_eq!(for_a[0].other_username, b_name);
    assert_eq!(for_a[0].last_message, "See you at the point");
    assert_eq!(for_a[0].unread_count, 1);

    let for_b = messages.list_conversations(b).await.unwrap();
    assert_eq!(for_b.len(), 1);
    assert_eq!(for_b[0].other_user_id, a);
    assert_eq!(for_b[0].other_username, a_name);
    assert_eq!(for_b[0].last_message, "See you at the point");
    assert_eq!(for_b[0].unread_count, 1);
}

#[tokio::test]
async fn test_conversations_ordered_by_latest_message() {
    let Some(app) = db_app().await else { return };
    let (me, _) = verified_user(&app, "hub").await;
    let (first, _) = verified_user(&app, "early").await;
    let (second, _) = verified_user(&app, "late").await;
    let messages = &app.ctx.message_manager;

    messages.send(first, me, "Morning").await.unwrap();
    messages.send(second, me, "Afternoon").await.unwrap();

    let conversations = messages.list_conversations(me).await.unwrap();
    let order: Vec<Uuid> = conversations.iter().map(|c| c.other_user_id).collect();
    assert_eq!(order, vec![second, first]);

    messages.send(me, first, "Evening").await.unwrap();

    let conversations = messages.list_conversations(me).await.unwrap();
    assert_eq!(conversations[0].other_user_id, first);
    assert_eq!(conversations[0].last_message, "Evening");
}

#[tokio::test]
async fn test_reading_thread_clears_unread() {
    let Some(app) = db_app().await else { return };
    let (a, _) = verified_user(&app, "sender").await;
    let (b, _) = verified_user(&app, "reader").await;
    let messages = &app.ctx.message_manager;

    messages.send(a, b, "one").await.unwrap();
    messages.send(a, b, "two").await.unwrap();
    messages.send(b, a, "three").await.unwrap();

    assert_eq!(messages.unread_count(b).await.unwrap(), 2);
    assert_eq!(messages.unread_count(a).await.unwrap(), 1);

    let thread = messages.get_thread(b, a).await.unwrap();
    let contents: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
    assert!(thread
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));

    assert_eq!(messages.unread_count(b).await.unwrap(), 0);
    // Reading only marks messages addressed to the reader
    assert_eq!(messages.unread_count(a).await.unwrap(), 1);

    let conversations = messages.list_conversations(b).await.unwrap();
    assert_eq!(conversations[0].unread_count, 0);
}

#[tokio::test]
async fn test_thread_with_stranger_is_empty() {
    let Some(app) = db_app().await else { return };
    let (a, _) = verified_user(&app, "quiet").await;

    let thread = app
        .ctx
        .message_manager
        .get_thread(a, Uuid::new_v4())
        .await
        .unwrap();
    assert!(thread.is_empty());
}

#[tokio::test]
async fn test_send_rejects_self_and_missing_receiver() {
    let Some(app) = db_app().await else { return };
    let (a, _) = verified_user(&app, "solo").await;
    let messages = &app.ctx.message_manager;

    match messages.send(a, a, "hello me").await {
        Err(SurfError::Validation(errors)) => assert_eq!(errors[0].field, "receiver_id"),
        other => panic!("Expected a validation error, got {:?}", other.map(|m| m.id)),
    }

    assert!(matches!(
        messages.send(a, Uuid::new_v4(), "hello?").await,
        Err(SurfError::NotFound(_))
    ));
}
