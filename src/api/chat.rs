//! Chat endpoints
//!
//! REST for room lists and history, plus one WebSocket per room. Messages
//! sent either way go through `ChatService::post_message`, which persists
//! them and fans them out to every socket joined to the room.

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use super::extract::RequestMetrics;
use crate::AppState;
use crate::api::dto::{MessageResponse, RoomResponse};
use crate::api::{message_to_response, room_to_response};
use crate::auth::CurrentUser;
use crate::chat::ChatEvent;
use crate::data::User;
use crate::error::AppError;
use crate::metrics::CHAT_CONNECTIONS_ACTIVE;
use crate::service::ChatService;

fn build_chat_service(state: &AppState) -> ChatService {
    ChatService::new(
        state.db.clone(),
        state.storage.clone(),
        state.chat_hub.clone(),
        state.config.chat.history_limit,
    )
}

/// Inbound frame and the REST message body
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorFrame<'a> {
    error: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

/// GET /api/chat/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/chat/rooms");
    let rooms = build_chat_service(&state).rooms(&user).await?;
    Ok(metrics.ok(Json(rooms.iter().map(room_to_response).collect())))
}

/// POST /api/chat/start/:username
///
/// Finds or creates the direct room with `username`.
pub async fn start_chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = build_chat_service(&state).start_chat(&user, &username).await?;
    Ok(Json(RoomResponse {
        id: room.id,
        name: room.name,
        is_group: room.is_group,
        updated_at: room.updated_at,
        last_message: None,
        unread_count: 0,
    }))
}

/// GET /api/chat/rooms/:id/messages
///
/// Recent history, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/chat/rooms/:id/messages");
    let messages = build_chat_service(&state).messages(&user, &room_id).await?;
    Ok(metrics.ok(Json(
        messages
            .iter()
            .map(|entry| message_to_response(entry, &state.storage))
            .collect(),
    )))
}

/// POST /api/chat/rooms/:id/messages
pub async fn post_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<ChatEvent>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/chat/rooms/:id/messages");
    let event = build_chat_service(&state)
        .post_message(&user, &room_id, &request.message)
        .await?;
    Ok(metrics.ok(Json(event)))
}

/// POST /api/chat/rooms/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let marked = build_chat_service(&state).mark_read(&user, &room_id).await?;
    Ok(Json(MarkReadResponse { marked }))
}

/// GET /ws/chat/:room_id
///
/// Access is checked before the upgrade, so unknown rooms answer 404 and
/// foreign direct rooms 403.
async fn chat_socket(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let room = build_chat_service(&state).ensure_access(&user, &room_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user, room.id)))
}

pub fn chat_socket_router() -> Router<AppState> {
    Router::new().route("/ws/chat/:room_id", get(chat_socket))
}

/// Connection lifecycle: join the room group, relay until either side
/// goes away, then leave the group.
async fn handle_socket(mut socket: WebSocket, state: AppState, user: User, room_id: String) {
    let hub = state.chat_hub.clone();
    let mut receiver = hub.subscribe(&room_id);
    CHAT_CONNECTIONS_ACTIVE.inc();
    tracing::info!(user_id = %user.id, %room_id, "Chat socket connected");

    let service = build_chat_service(&state);
    relay(&mut socket, &mut receiver, &service, &user, &room_id).await;

    drop(receiver);
    hub.release(&room_id);
    CHAT_CONNECTIONS_ACTIVE.dec();
    tracing::info!(user_id = %user.id, %room_id, "Chat socket disconnected");
}

async fn relay(
    socket: &mut WebSocket,
    receiver: &mut broadcast::Receiver<ChatEvent>,
    service: &ChatService,
    user: &User,
    room_id: &str,
) {
    loop {
        tokio::select! {
            inbound = socket.next() => {
                let keep_going = match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(socket, service, user, room_id, &text).await
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::warn!(
                            user_id = %user.id,
                            bytes = data.len(),
                            "Unexpected binary chat frame"
                        );
                        true
                    }
                    Some(Ok(Message::Ping(data))) => socket.send(Message::Pong(data)).await.is_ok(),
                    Some(Ok(Message::Pong(_))) => true,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(user_id = %user.id, ?frame, "Chat socket closed by client");
                        false
                    }
                    Some(Err(error)) => {
                        tracing::warn!(user_id = %user.id, %error, "Chat socket error");
                        false
                    }
                    None => false,
                };
                if !keep_going {
                    break;
                }
            }
            outbound = receiver.recv() => {
                match outbound {
                    Ok(event) => {
                        if !send_json(socket, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            user_id = %user.id,
                            %room_id,
                            skipped,
                            "Chat subscriber lagged"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Handle one inbound text frame; `false` once the socket is unusable
async fn handle_frame(
    socket: &mut WebSocket,
    service: &ChatService,
    user: &User,
    room_id: &str,
    text: &str,
) -> bool {
    let request: MessageRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(error) => {
            tracing::debug!(user_id = %user.id, %error, "Malformed chat frame");
            return send_json(socket, &ErrorFrame { error: "Invalid message format" }).await;
        }
    };

    if request.message.trim().is_empty() {
        return true;
    }

    // Delivery back to this socket happens through the room group.
    match service.post_message(user, room_id, &request.message).await {
        Ok(_) => true,
        Err(error) => {
            tracing::warn!(user_id = %user.id, %room_id, %error, "Failed to post chat message");
            send_json(socket, &ErrorFrame { error: "Message could not be sent" }).await
        }
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, payload: &T) -> bool {
    match serde_json::to_string(payload) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(error) => {
            tracing::error!(%error, "Failed to encode chat frame");
            true
        }
    }
}
