//! Exercises the request handlers directly against an in-memory store and a
//! live dispatcher, covering the send -> push -> sidebar -> mark-read loop.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use parley_api::auth::{AppState, AppStateInner};
use parley_api::error::ApiError;
use parley_api::messages::{get_messages, mark_messages_read, send_message};
use parley_api::sidebar::get_users_for_sidebar;
use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;
use parley_types::api::{Claims, SendMessageRequest};
use parley_types::events::GatewayEvent;

fn test_state(broadcast_refresh: bool) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        dispatcher: Dispatcher::new(),
        jwt_secret: "test-secret".into(),
        media_dir: std::env::temp_dir().join("parley-test-media"),
        broadcast_refresh,
    })
}

fn seed_user(state: &AppState, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    state
        .db
        .create_user(&id.to_string(), username, "hash")
        .unwrap();
    id
}

fn claims_for(id: Uuid, username: &str) -> Claims {
    Claims {
        sub: id,
        username: username.into(),
        exp: usize::MAX,
    }
}

fn text_request(text: &str) -> SendMessageRequest {
    SendMessageRequest {
        text: Some(text.into()),
        image_ref: None,
    }
}

#[tokio::test]
async fn message_flow_end_to_end() {
    let state = test_state(false);
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");

    let (_conn, mut bob_rx) = state.dispatcher.connect(bob).await;

    // Alice sends "hi" to Bob
    let (status, Json(sent)) = send_message(
        State(state.clone()),
        Path(bob),
        Extension(claims_for(alice, "alice")),
        Json(text_request("hi")),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent.sender_id, alice);
    assert_eq!(sent.receiver_id, bob);
    assert_eq!(sent.body.text(), Some("hi"));
    assert!(!sent.is_read);

    // Bob's socket sees exactly one NewMessage matching the persisted record,
    // then a sidebar nudge
    match bob_rx.try_recv().unwrap() {
        GatewayEvent::NewMessage { message } => {
            assert_eq!(message.id, sent.id);
            assert_eq!(message.sender_id, alice);
            assert_eq!(message.body.text(), Some("hi"));
            assert!(!message.is_read);
        }
        other => panic!("expected NewMessage, got {:?}", other),
    }
    assert!(matches!(
        bob_rx.try_recv().unwrap(),
        GatewayEvent::RefreshUsers
    ));
    assert!(bob_rx.try_recv().is_err());

    // Bob's sidebar shows one unread from Alice
    let Json(rows) = get_users_for_sidebar(
        State(state.clone()),
        Extension(claims_for(bob, "bob")),
    )
    .await
    .unwrap();
    let alice_row = rows.iter().find(|r| r.user.id == alice).unwrap();
    assert_eq!(alice_row.unread_count, 1);
    assert_eq!(alice_row.last_message_at, sent.created_at);

    // Bob opens the conversation: history has the message, still unread
    let Json(history) = get_messages(
        State(state.clone()),
        Path(alice),
        Extension(claims_for(bob, "bob")),
    )
    .await
    .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, sent.id);
    assert!(!history[0].is_read);

    // Mark as read, then the sidebar drops to zero
    mark_messages_read(
        State(state.clone()),
        Path(alice),
        Extension(claims_for(bob, "bob")),
    )
    .await
    .unwrap();

    let Json(history) = get_messages(
        State(state.clone()),
        Path(alice),
        Extension(claims_for(bob, "bob")),
    )
    .await
    .unwrap();
    assert!(history[0].is_read);

    let Json(rows) = get_users_for_sidebar(
        State(state.clone()),
        Extension(claims_for(bob, "bob")),
    )
    .await
    .unwrap();
    let alice_row = rows.iter().find(|r| r.user.id == alice).unwrap();
    assert_eq!(alice_row.unread_count, 0);
}

#[tokio::test]
async fn send_to_offline_recipient_persists_without_push() {
    let state = test_state(false);
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");

    // Bob never connects
    let (status, Json(sent)) = send_message(
        State(state.clone()),
        Path(bob),
        Extension(claims_for(alice, "alice")),
        Json(text_request("anyone home?")),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);

    // The message is still there for Bob's next fetch
    let Json(history) = get_messages(
        State(state.clone()),
        Path(alice),
        Extension(claims_for(bob, "bob")),
    )
    .await
    .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, sent.id);
}

#[tokio::test]
async fn refresh_is_targeted_to_participants_only() {
    let state = test_state(false);
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");
    let carol = seed_user(&state, "carol");

    let (_ca, mut alice_rx) = state.dispatcher.connect(alice).await;
    let (_cb, mut bob_rx) = state.dispatcher.connect(bob).await;
    let (_cc, mut carol_rx) = state.dispatcher.connect(carol).await;

    send_message(
        State(state.clone()),
        Path(bob),
        Extension(claims_for(alice, "alice")),
        Json(text_request("hi bob")),
    )
    .await
    .unwrap();

    assert!(matches!(
        alice_rx.try_recv().unwrap(),
        GatewayEvent::RefreshUsers
    ));
    assert!(matches!(
        bob_rx.try_recv().unwrap(),
        GatewayEvent::NewMessage { .. }
    ));
    assert!(matches!(
        bob_rx.try_recv().unwrap(),
        GatewayEvent::RefreshUsers
    ));
    // Bystanders hear nothing
    assert!(carol_rx.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_refresh_flag_nudges_everyone() {
    let state = test_state(true);
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");

    let mut events = state.dispatcher.subscribe();

    send_message(
        State(state.clone()),
        Path(bob),
        Extension(claims_for(alice, "alice")),
        Json(text_request("hi")),
    )
    .await
    .unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::RefreshUsers
    ));
}

#[tokio::test]
async fn send_requires_some_content() {
    let state = test_state(false);
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");

    let err = send_message(
        State(state.clone()),
        Path(bob),
        Extension(claims_for(alice, "alice")),
        Json(SendMessageRequest {
            text: Some("   ".into()),
            image_ref: None,
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn send_to_unknown_recipient_is_not_found() {
    let state = test_state(false);
    let alice = seed_user(&state, "alice");

    let err = send_message(
        State(state.clone()),
        Path(Uuid::new_v4()),
        Extension(claims_for(alice, "alice")),
        Json(text_request("hello?")),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn mark_read_is_idempotent_through_the_handler() {
    let state = test_state(false);
    let alice = seed_user(&state, "alice");
    let bob = seed_user(&state, "bob");

    for _ in 0..2 {
        send_message(
            State(state.clone()),
            Path(bob),
            Extension(claims_for(alice, "alice")),
            Json(text_request("ping")),
        )
        .await
        .unwrap();
    }

    for _ in 0..2 {
        mark_messages_read(
            State(state.clone()),
            Path(alice),
            Extension(claims_for(bob, "bob")),
        )
        .await
        .unwrap();

        let Json(rows) = get_users_for_sidebar(
            State(state.clone()),
            Extension(claims_for(bob, "bob")),
        )
        .await
        .unwrap();
        let alice_row = rows.iter().find(|r| r.user.id == alice).unwrap();
        assert_eq!(alice_row.unread_count, 0);
    }
}
