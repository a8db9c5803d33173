use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, RwLock};

use crate::state::AppState;

/// The overlay enum is only two variants wide in practice: an alert (name +
/// optional subtitle) and a TTS control command. The donor source also
/// carries a vestigial `MSG_JOKE` variant that's constructed nowhere and is
/// dropped here rather than ported.
#[derive(Debug, Clone)]
pub enum OverlayEvent {
    Alert { title: String, subtitle: String },
    Command(TtsCommand),
}

#[derive(Debug, Clone, Copy)]
pub enum TtsCommand {
    SkipTts,
    PauseTts,
    PurgeTts,
    AutoTts,
    NextTts,
}

impl TtsCommand {
    fn name(self) -> &'static str {
        match self {
            TtsCommand::SkipTts => "skiptts",
            TtsCommand::PauseTts => "pausetts",
            TtsCommand::PurgeTts => "purgetts",
            TtsCommand::AutoTts => "autotts",
            TtsCommand::NextTts => "nexttts",
        }
    }
}

impl OverlayEvent {
    pub fn to_json(&self) -> String {
        let (kind, data) = match self {
            OverlayEvent::Alert { title, subtitle } => {
                ("alert", json!({ "title": title, "subtitle": subtitle }))
            }
            OverlayEvent::Command(cmd) => ("command", json!({ "name": cmd.name() })),
        };
        json!({ "type": kind, "data": data }).to_string()
    }
}

type SocketId = u64;

#[derive(Default)]
struct Inner {
    senders: HashMap<SocketId, mpsc::UnboundedSender<String>>,
    next_id: SocketId,
}

/// Flat fan-out set for overlay presentation clients. Unlike the chat
/// registry there's no per-user identity here — every connected overlay
/// client gets every event, in emission order.
#[derive(Clone, Default)]
pub struct OverlayRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn accept(&self, tx: mpsc::UnboundedSender<String>) -> SocketId {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.senders.insert(id, tx);
        id
    }

    async fn remove(&self, id: SocketId) {
        self.inner.write().await.senders.remove(&id);
    }

    pub async fn broadcast(&self, event: &OverlayEvent) {
        let payload = event.to_json();
        let inner = self.inner.read().await;
        for tx in inner.senders.values() {
            let _ = tx.send(payload.clone());
        }
    }

    pub async fn connected_count(&self) -> usize {
        self.inner.read().await.senders.len()
    }
}

pub async fn overlay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_overlay_socket(socket, state))
}

async fn handle_overlay_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = state.overlay.accept(tx).await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Overlay clients are receive-only; any inbound frame is drained and
    // ignored until the socket closes.
    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    send_task.abort();
    state.overlay.remove(id).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_connected_socket() {
        let reg = OverlayRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        reg.accept(tx1).await;
        reg.accept(tx2).await;

        reg.broadcast(&OverlayEvent::Command(TtsCommand::SkipTts)).await;

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a, b);
        assert!(a.contains("skiptts"));
    }

    #[tokio::test]
    async fn remove_drops_the_socket_from_future_broadcasts() {
        let reg = OverlayRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = reg.accept(tx).await;
        reg.remove(id).await;

        reg.broadcast(&OverlayEvent::Alert { title: "hi".into(), subtitle: "".into() }).await;
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn alert_json_carries_title_and_subtitle() {
        let e = OverlayEvent::Alert { title: "alice donated $5".into(), subtitle: "thanks!".into() };
        let v: serde_json::Value = serde_json::from_str(&e.to_json()).unwrap();
        assert_eq!(v["type"], "alert");
        assert_eq!(v["data"]["title"], "alice donated $5");
        assert_eq!(v["data"]["subtitle"], "thanks!");
    }
}
