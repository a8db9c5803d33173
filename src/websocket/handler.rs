use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::chat::pipeline;
use crate::chat::sanitize::html_escape;
use crate::chat::wire;
use crate::state::AppState;
use crate::storage::{bans, history, transactions, users};
use crate::util::now_unix;
use crate::websocket::connection_manager::SocketId;
use crate::websocket::overlay::OverlayEvent;

const RATE_LIMIT_WINDOW: Duration = Duration::from_millis(1000);
const RATE_LIMIT_MAX_FRAMES: usize = 10;

/// Per-connection sliding window over the last `RATE_LIMIT_MAX_FRAMES`
/// frame-arrival instants, owned by the connection's own task rather than a
/// shared registry — there is nothing to coordinate across connections.
struct RateLimiter {
    arrivals: VecDeque<Instant>,
}

impl RateLimiter {
    fn new() -> Self {
        RateLimiter { arrivals: VecDeque::with_capacity(RATE_LIMIT_MAX_FRAMES) }
    }

    /// Returns `false` (drop the frame) if admitting it would exceed
    /// `RATE_LIMIT_MAX_FRAMES` arrivals within the trailing window.
    fn admit(&mut self) -> bool {
        let now = Instant::now();
        while let Some(&oldest) = self.arrivals.front() {
            if now.duration_since(oldest) > RATE_LIMIT_WINDOW {
                self.arrivals.pop_front();
            } else {
                break;
            }
        }
        if self.arrivals.len() >= RATE_LIMIT_MAX_FRAMES {
            return false;
        }
        self.arrivals.push_back(now);
        true
    }
}

#[derive(Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    auth: String,
    #[serde(default)]
    data: Value,
}

pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state, addr.ip().to_string()))
}

async fn handle_chat_socket(socket: WebSocket, state: AppState, host: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let socket_id = state.connections.accept(tx, host.clone()).await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let mut limiter = RateLimiter::new();

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };

        if !limiter.admit() {
            continue;
        }

        let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
            continue;
        };

        if frame.kind == "hello" {
            handle_hello(&state, socket_id).await;
            continue;
        }

        handle_authenticated_frame(&state, socket_id, &host, frame).await;
    }

    send_task.abort();
    if let Some(departed) = state.connections.remove_socket(socket_id).await {
        if let Ok(Some(user)) = users::get_user(&state.pool, departed).await {
            state.connections.broadcast(&wire::part_frame(&user.display_name)).await;
        }
    }
}

/// History burst plus a join frame per already-connected user, so a fresh
/// client can paint a roster before sending its own first authenticated
/// frame.
async fn handle_hello(state: &AppState, socket_id: SocketId) {
    if let Ok(messages) = history::recent_history(&state.pool, 50).await {
        for msg in messages {
            if let Ok(Some(author)) = users::get_user(&state.pool, msg.user_id).await {
                let frame = wire::chat_frame(
                    msg.id,
                    msg.time,
                    &author.display_name,
                    author.id,
                    &author.display_color,
                    author.auth_level.as_i32(),
                    &html_escape(&msg.message),
                    "",
                    &msg.donate_value,
                );
                state.connections.send_to_socket(socket_id, &frame).await;
            }
        }
    }

    for uid in state.connections.connected_user_ids().await {
        if let Ok(Some(user)) = users::get_user(&state.pool, uid).await {
            state.connections.send_to_socket(socket_id, &wire::join_frame(&user.display_name)).await;
        }
    }
}

/// The admission pipeline: host ban, token/provider presence, provider
/// authenticate, then `insertSocket` on every successfully authenticated
/// frame regardless of type, followed by type-specific dispatch.
async fn handle_authenticated_frame(state: &AppState, socket_id: SocketId, host: &str, frame: ClientFrame) {
    let now = now_unix();

    if bans::is_host_banned(&state.pool, host, now).await.unwrap_or(false) {
        state.connections.send_to_socket(socket_id, &wire::status_frame("banned")).await;
        return;
    }

    if frame.token.is_empty() || frame.auth.is_empty() {
        state.connections.send_to_socket(socket_id, &wire::status_frame("unauthenticated")).await;
        return;
    }

    let Some(provider) = state.auth.resolve(&frame.auth) else {
        state.connections.send_to_socket(socket_id, &wire::status_frame("unauthenticated")).await;
        return;
    };

    let resolved = match provider.authenticate(&state.pool, &frame.token).await {
        Ok(Some(uid)) => uid,
        Ok(None) => {
            state.connections.send_to_socket(socket_id, &wire::status_frame("unauthenticated")).await;
            return;
        }
        Err(e) => {
            tracing::error!(error = ?e, "auth provider storage error");
            state.connections.send_to_socket(socket_id, &wire::status_frame("unauthenticated")).await;
            return;
        }
    };

    let joined = state.connections.insert_socket(socket_id, resolved).await;

    let Ok(Some(user)) = users::get_user(&state.pool, resolved).await else {
        return;
    };

    if joined && user.has_display_name() {
        state.connections.broadcast(&wire::join_frame(&user.display_name)).await;
    }

    match frame.kind.as_str() {
        "status" => {
            state
                .connections
                .send_to_socket(socket_id, &wire::authlevel_frame(user.auth_level.as_i32()))
                .await;
        }
        "getuserconf" => handle_getuserconf(state, socket_id, &frame.data).await,
        "setuserconf" => handle_setuserconf(state, socket_id, &user, &frame.data, now).await,
        "message" => {
            if let Some(text) = frame.data.get("message").and_then(|v| v.as_str()) {
                pipeline::handle_message(state, socket_id, resolved, host, text).await;
            }
        }
        "paypal" => handle_paypal(state, &user, host, &frame.data, now).await,
        _ => {}
    }
}

async fn handle_getuserconf(state: &AppState, socket_id: SocketId, data: &Value) {
    let Some(name) = data.get("name").and_then(|v| v.as_str()) else { return };
    if let Ok(Some(user)) = users::get_user_by_name(&state.pool, name).await {
        let frame = wire::getuserconf_frame(&user.display_name, &user.display_color);
        state.connections.send_to_socket(socket_id, &frame).await;
    }
}

const DISPLAY_NAME_MIN: usize = 5;
const DISPLAY_NAME_MAX: usize = 32;

/// Validation ladder: length, charset, rename cooldown, then the storage
/// write itself, which surfaces a name collision as `DuplicateKey`.
async fn handle_setuserconf(
    state: &AppState,
    socket_id: SocketId,
    user: &crate::models::User,
    data: &Value,
    now: i64,
) {
    let name = data.get("name").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
    let color = data.get("color").and_then(|v| v.as_str()).unwrap_or("").to_string();

    if name.len() < DISPLAY_NAME_MIN || name.len() > DISPLAY_NAME_MAX {
        state.connections.send_to_socket(socket_id, &wire::status_frame("namelength")).await;
        return;
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        state.connections.send_to_socket(socket_id, &wire::status_frame("nameinvalid")).await;
        return;
    }
    if user.display_name_change_time != 0
        && now - user.display_name_change_time < crate::state::DISPLAY_NAME_CHANGE_COOLDOWN_SECS
    {
        state.connections.send_to_socket(socket_id, &wire::status_frame("nametimeout")).await;
        return;
    }

    match users::set_display_conf(&state.pool, user.id, &name, &color, now).await {
        Ok(()) => {
            if user.has_display_name() && user.display_name != name {
                state.connections.broadcast(&wire::part_frame(&user.display_name)).await;
            }
            if !user.has_display_name() || user.display_name != name {
                state.connections.broadcast(&wire::join_frame(&name)).await;
            }
            state.connections.send_to_socket(socket_id, &wire::status_frame("setuserconf")).await;
        }
        Err(crate::error::AppError::DuplicateKey) => {
            state.connections.send_to_socket(socket_id, &wire::status_frame("nameexists")).await;
        }
        Err(e) => {
            tracing::error!(error = ?e, "rename storage error");
        }
    }
}

/// The `paypal` frame: order lookup, replay check, verification against the
/// donation gates, then the same persist-and-broadcast path plain chat uses,
/// stamped with the verified amount. The transaction row's `data` column
/// records the inbound frame payload rather than the outbound PayPal order
/// response, since the verifier deliberately doesn't expose the latter.
async fn handle_paypal(state: &AppState, user: &crate::models::User, host: &str, data: &Value, now: i64) {
    if user.is_banned(now) {
        state.connections.send_to_user(user.id, &wire::status_frame("banned")).await;
        return;
    }
    if !user.has_display_name() {
        state.connections.send_to_user(user.id, &wire::status_frame("rename")).await;
        return;
    }

    let order_id = data.get("order").and_then(|o| o.get("id")).and_then(|v| v.as_str()).unwrap_or("");
    let message = data.get("message").and_then(|v| v.as_str()).unwrap_or("");
    if order_id.is_empty() {
        return;
    }

    if transactions::already_recorded(&state.pool, order_id).await.unwrap_or(false) {
        state
            .connections
            .send_to_user(user.id, &wire::servermsg_frame("transaction already exists in database"))
            .await;
        return;
    }

    match state.donations.verify(&state.http_client, &state.config, order_id, message, &state.banned_words).await {
        Ok(donation) => {
            let _ = transactions::insert(&state.pool, order_id, user.id, now, data, &donation.message, true).await;

            state
                .overlay
                .broadcast(&OverlayEvent::Alert {
                    title: format!("{} donated ${}", user.display_name, donation.amount),
                    subtitle: donation.message.clone(),
                })
                .await;

            if !donation.message.is_empty() {
                pipeline::persist_and_broadcast(state, user, now, &donation.message, host, &donation.amount).await;
            }
        }
        Err(e) => {
            let _ = transactions::insert(&state.pool, order_id, user.id, now, data, message, false).await;
            tracing::warn!(order_id, ?e, "donation rejected");
        }
    }
}
