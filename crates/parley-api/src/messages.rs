use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use parley_types::api::{Claims, SendMessageRequest};
use parley_types::events::GatewayEvent;
use parley_types::models::{Message, MessageBody};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::store::with_store;

/// GET /messages/{counterpart_id} — full history with the counterpart,
/// oldest first. Reading does not mark anything read; that is a separate,
/// explicit call.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(counterpart_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let me = claims.sub.to_string();
    let other = counterpart_id.to_string();

    let rows = with_store(&state, move |db| db.conversation_between(&me, &other)).await?;

    let messages = rows
        .into_iter()
        .map(|row| row.into_message())
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(ApiError::Storage)?;

    Ok(Json(messages))
}

/// POST /messages/send/{receiver_id} — persist the message, then push it to
/// the recipient if they are online and nudge both participants' sidebars.
pub async fn send_message(
    State(state): State<AppState>,
    Path(receiver_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let body = MessageBody::from_parts(req.text, req.image_ref)
        .ok_or_else(|| ApiError::Validation("message needs text or an image".into()))?;

    let sender_id = claims.sub;
    let sid = sender_id.to_string();
    let rid = receiver_id.to_string();

    let row = with_store(&state, move |db| {
        if db.get_user_by_id(&rid)?.is_none() {
            return Ok(None);
        }
        db.insert_message(&sid, &rid, body.text(), body.image_url())
            .map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("user"))?;

    let message = row.into_message().map_err(ApiError::Storage)?;

    // Persist and push are two independent, non-atomic steps: if the
    // recipient's socket drops in between, the push is lost and the client
    // reconciles on its next fetch.
    state
        .dispatcher
        .emit_to(
            receiver_id,
            GatewayEvent::NewMessage {
                message: message.clone(),
            },
        )
        .await;

    if state.broadcast_refresh {
        state.dispatcher.broadcast(GatewayEvent::RefreshUsers);
    } else {
        state
            .dispatcher
            .emit_to(receiver_id, GatewayEvent::RefreshUsers)
            .await;
        state
            .dispatcher
            .emit_to(sender_id, GatewayEvent::RefreshUsers)
            .await;
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// PUT /messages/read/{counterpart_id} — mark every unread message from the
/// counterpart to the caller as read. Idempotent.
pub async fn mark_messages_read(
    State(state): State<AppState>,
    Path(counterpart_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let from = counterpart_id.to_string();
    let to = claims.sub.to_string();

    with_store(&state, move |db| db.mark_all_read(&from, &to)).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
