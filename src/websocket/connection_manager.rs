use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

/// Identifies one live WebSocket connection. Assigned at accept time;
/// sockets themselves aren't hashable, so every connection's send task is
/// tracked by this handle instead.
pub type SocketId = u64;

#[derive(Default)]
struct Inner {
    by_user: HashMap<i64, HashSet<SocketId>>,
    user_of: HashMap<SocketId, i64>,
    senders: HashMap<SocketId, mpsc::UnboundedSender<String>>,
    hosts: HashMap<SocketId, String>,
    next_id: u64,
}

/// Dual-index mapping between user ids and their live sockets.
///
/// A user may hold any number of live sockets at once (multiple tabs,
/// multiple clients). Sockets registered under user id 0 are observers:
/// connected but not yet authenticated, or pre-`hello`. Cheaply cloneable —
/// clones share the same underlying state via `Arc`.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

fn insert_locked(inner: &mut Inner, socket: SocketId, user_id: i64) -> bool {
    if let Some(&prev) = inner.user_of.get(&socket) {
        if prev != user_id && prev != 0 {
            if let Some(set) = inner.by_user.get_mut(&prev) {
                set.remove(&socket);
                if set.is_empty() {
                    inner.by_user.remove(&prev);
                }
            }
        }
    }

    let mut joined = false;
    if user_id != 0 {
        joined = !inner.by_user.contains_key(&user_id);
        inner.by_user.entry(user_id).or_default().insert(socket);
    }
    inner.user_of.insert(socket, user_id);
    joined
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a brand-new connection as an observer (user id 0) and
    /// returns the socket id assigned to it. `host` is the peer address,
    /// recorded so the `ipban` command can insert a `BannedHost` row per
    /// live socket of its target without re-deriving it from the transport
    /// layer at ban time.
    pub async fn accept(&self, tx: mpsc::UnboundedSender<String>, host: String) -> SocketId {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.senders.insert(id, tx);
        inner.hosts.insert(id, host);
        insert_locked(&mut inner, id, 0);
        id
    }

    /// The peer addresses of every live socket currently registered under
    /// `user_id`, for `ipban`.
    pub async fn hosts_for_user(&self, user_id: i64) -> Vec<String> {
        let inner = self.inner.read().await;
        let Some(sockets) = inner.by_user.get(&user_id) else {
            return Vec::new();
        };
        sockets.iter().filter_map(|s| inner.hosts.get(s).cloned()).collect()
    }

    /// Re-registers `socket` under `user_id`, moving it out of whatever
    /// bucket it previously occupied. Returns `true` iff this is the first
    /// socket registered for a non-zero `user_id` — the caller uses that
    /// edge to broadcast `join`.
    pub async fn insert_socket(&self, socket: SocketId, user_id: i64) -> bool {
        let mut inner = self.inner.write().await;
        insert_locked(&mut inner, socket, user_id)
    }

    /// Removes `socket` entirely. Returns `Some(user_id)` iff `socket` was
    /// the last live socket for that non-zero `user_id` — the caller uses
    /// that edge to broadcast `part`. Observers (user id 0) never produce a
    /// part edge.
    pub async fn remove_socket(&self, socket: SocketId) -> Option<i64> {
        let mut inner = self.inner.write().await;
        inner.senders.remove(&socket);
        inner.hosts.remove(&socket);
        let uid = inner.user_of.remove(&socket)?;
        if uid == 0 {
            return None;
        }
        if let Some(set) = inner.by_user.get_mut(&uid) {
            set.remove(&socket);
            if set.is_empty() {
                inner.by_user.remove(&uid);
                return Some(uid);
            }
        }
        None
    }

    /// Sends to one socket by id. A closed or unknown socket is a no-op.
    pub async fn send_to_socket(&self, socket: SocketId, message: &str) {
        let inner = self.inner.read().await;
        if let Some(tx) = inner.senders.get(&socket) {
            let _ = tx.send(message.to_owned());
        }
    }

    /// Sends to every live socket registered under `user_id`. A silent no-op
    /// if the user has no connections.
    pub async fn send_to_user(&self, user_id: i64, message: &str) {
        let inner = self.inner.read().await;
        if let Some(sockets) = inner.by_user.get(&user_id) {
            for s in sockets {
                if let Some(tx) = inner.senders.get(s) {
                    let _ = tx.send(message.to_owned());
                }
            }
        }
    }

    /// Sends to every connected socket, observers included — this iterates
    /// the socket→user index rather than the user→sockets index, exactly as
    /// the donor broadcast does, so unauthenticated viewers still see chat.
    pub async fn broadcast(&self, message: &str) {
        let inner = self.inner.read().await;
        for tx in inner.senders.values() {
            let _ = tx.send(message.to_owned());
        }
    }

    pub async fn is_connected(&self, user_id: i64) -> bool {
        let inner = self.inner.read().await;
        inner.by_user.get(&user_id).map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub async fn socket_count(&self) -> usize {
        self.inner.read().await.senders.len()
    }

    /// Every non-observer user id with at least one live socket, for the
    /// roster replay sent on `hello`.
    pub async fn connected_user_ids(&self) -> Vec<i64> {
        self.inner.read().await.by_user.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_channel() -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn accept_registers_as_observer() {
        let reg = ConnectionRegistry::new();
        let (tx, _rx) = make_channel();
        reg.accept(tx, "127.0.0.1".into()).await;
        assert_eq!(reg.socket_count().await, 1);
        assert!(!reg.is_connected(0).await); // observers never count as "connected"
    }

    #[tokio::test]
    async fn insert_socket_reports_join_only_on_first_socket() {
        let reg = ConnectionRegistry::new();
        let (tx1, _rx1) = make_channel();
        let (tx2, _rx2) = make_channel();
        let s1 = reg.accept(tx1, "127.0.0.1".into()).await;
        let s2 = reg.accept(tx2, "127.0.0.1".into()).await;

        assert!(reg.insert_socket(s1, 42).await);
        assert!(!reg.insert_socket(s2, 42).await); // second socket, not a join
        assert!(reg.is_connected(42).await);
    }

    #[tokio::test]
    async fn remove_socket_reports_part_only_when_last() {
        let reg = ConnectionRegistry::new();
        let (tx1, _rx1) = make_channel();
        let (tx2, _rx2) = make_channel();
        let s1 = reg.accept(tx1, "127.0.0.1".into()).await;
        let s2 = reg.accept(tx2, "127.0.0.1".into()).await;
        reg.insert_socket(s1, 7).await;
        reg.insert_socket(s2, 7).await;

        assert_eq!(reg.remove_socket(s1).await, None);
        assert!(reg.is_connected(7).await);
        assert_eq!(reg.remove_socket(s2).await, Some(7));
        assert!(!reg.is_connected(7).await);
    }

    #[tokio::test]
    async fn removing_an_observer_never_produces_a_part_edge() {
        let reg = ConnectionRegistry::new();
        let (tx, _rx) = make_channel();
        let s = reg.accept(tx, "127.0.0.1".into()).await;
        assert_eq!(reg.remove_socket(s).await, None);
    }

    #[tokio::test]
    async fn reauthenticating_moves_the_socket_out_of_its_previous_bucket() {
        let reg = ConnectionRegistry::new();
        let (tx, _rx) = make_channel();
        let s = reg.accept(tx, "127.0.0.1".into()).await;

        assert!(reg.insert_socket(s, 1).await);
        assert!(reg.insert_socket(s, 2).await); // re-auth under a different user
        assert!(!reg.is_connected(1).await);
        assert!(reg.is_connected(2).await);
    }

    #[tokio::test]
    async fn insert_then_remove_restores_prior_state() {
        let reg = ConnectionRegistry::new();
        let (tx, _rx) = make_channel();
        let s = reg.accept(tx, "127.0.0.1".into()).await;
        let before = reg.socket_count().await;

        reg.insert_socket(s, 9).await;
        reg.remove_socket(s).await;

        assert_eq!(reg.socket_count().await, before - 1); // removed, not re-added
        assert!(!reg.is_connected(9).await);
    }

    #[tokio::test]
    async fn send_to_user_reaches_every_socket_for_that_user() {
        let reg = ConnectionRegistry::new();
        let (tx1, mut rx1) = make_channel();
        let (tx2, mut rx2) = make_channel();
        let s1 = reg.accept(tx1, "127.0.0.1".into()).await;
        let s2 = reg.accept(tx2, "127.0.0.1".into()).await;
        reg.insert_socket(s1, 5).await;
        reg.insert_socket(s2, 5).await;

        reg.send_to_user(5, "hi").await;
        assert_eq!(rx1.recv().await.unwrap(), "hi");
        assert_eq!(rx2.recv().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn broadcast_reaches_observers_too() {
        let reg = ConnectionRegistry::new();
        let (tx_observer, mut rx_observer) = make_channel();
        let (tx_user, mut rx_user) = make_channel();
        reg.accept(tx_observer, "127.0.0.1".into()).await;
        let s = reg.accept(tx_user, "127.0.0.1".into()).await;
        reg.insert_socket(s, 3).await;

        reg.broadcast("chat line").await;

        assert_eq!(rx_observer.recv().await.unwrap(), "chat line");
        assert_eq!(rx_user.recv().await.unwrap(), "chat line");
    }

    #[tokio::test]
    async fn hosts_for_user_lists_every_live_sockets_peer_address() {
        let reg = ConnectionRegistry::new();
        let (tx1, _rx1) = make_channel();
        let (tx2, _rx2) = make_channel();
        let s1 = reg.accept(tx1, "10.0.0.1".into()).await;
        let s2 = reg.accept(tx2, "10.0.0.2".into()).await;
        reg.insert_socket(s1, 1).await;
        reg.insert_socket(s2, 1).await;

        let mut hosts = reg.hosts_for_user(1).await;
        hosts.sort();
        assert_eq!(hosts, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
    }

    #[tokio::test]
    async fn hosts_for_user_is_empty_once_removed() {
        let reg = ConnectionRegistry::new();
        let (tx, _rx) = make_channel();
        let s = reg.accept(tx, "10.0.0.1".into()).await;
        reg.insert_socket(s, 1).await;
        reg.remove_socket(s).await;
        assert!(reg.hosts_for_user(1).await.is_empty());
    }

    #[tokio::test]
    async fn send_to_disconnected_user_is_noop() {
        let reg = ConnectionRegistry::new();
        reg.send_to_user(404, "nobody home").await; // should not panic
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let reg = ConnectionRegistry::new();
        let clone = reg.clone();
        let (tx, _rx) = make_channel();
        let s = reg.accept(tx, "127.0.0.1".into()).await;
        reg.insert_socket(s, 11).await;

        assert!(clone.is_connected(11).await);
    }
}
