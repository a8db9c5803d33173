use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::auth::AuthRegistry;
use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::donations::DonationVerifier;
use crate::websocket::connection_manager::ConnectionRegistry;
use crate::websocket::overlay::OverlayRegistry;

/// Default slow-mode and follow-mode thresholds, in effect until a `mod`
/// caller changes them at runtime via `slowmode`/`followmode`.
pub const DEFAULT_SLOW_MODE_SECS: i64 = 1;
pub const DEFAULT_FOLLOW_MODE_SECS: i64 = 0;

/// Fixed, not exposed to any command — the duplicate-message cooldown and
/// the display-name rename cooldown are constants in the donor algorithm,
/// not runtime-tunable settings.
pub const DUPLICATE_SLOW_MODE_SECS: i64 = 5;
pub const DISPLAY_NAME_CHANGE_COOLDOWN_SECS: i64 = 86_400;

/// Shared application state passed to every connection task and command
/// handler.
///
/// `ConnectionRegistry` and `OverlayRegistry` are cheaply cloneable (each
/// wraps an `Arc` internally), so cloning `AppState` per connection is
/// inexpensive.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub http_client: Client,

    pub connections: ConnectionRegistry,
    pub overlay: OverlayRegistry,

    pub auth: Arc<AuthRegistry>,
    pub donations: Arc<DonationVerifier>,

    pub commands: Arc<RwLock<CommandRegistry>>,
    /// `addcom`/`editcom`/`delcom` mutate this table and the command
    /// registry together; the registry holds only the verb's presence, this
    /// holds the text the dynamic handler looks up at call time.
    pub simple_responses: Arc<RwLock<HashMap<String, String>>>,

    pub banned_words: Arc<Vec<String>>,

    /// Transient `timer start/check/stop` state, lost on restart.
    pub timers: Arc<RwLock<HashMap<String, i64>>>,

    pub slow_mode_secs: Arc<RwLock<i64>>,
    pub follow_mode_secs: Arc<RwLock<i64>>,
}

impl AppState {
    pub async fn slow_mode(&self) -> i64 {
        *self.slow_mode_secs.read().await
    }

    pub async fn follow_mode(&self) -> i64 {
        *self.follow_mode_secs.read().await
    }
}

/// Builds `AppState` fixtures for handler unit tests that never touch the
/// database — the pool is constructed lazily (`connect_lazy`), so no real
/// connection is attempted until a query actually runs against it.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::commands::{register_builtins, CommandRegistry};

    pub fn memory_only_state() -> AppState {
        let pool = PgPool::connect_lazy("postgres://localhost/nonexistent")
            .expect("lazy pool construction does not touch the network");

        let mut commands = CommandRegistry::new();
        register_builtins(&mut commands);

        AppState {
            pool,
            config: Arc::new(Config::test_fixture()),
            http_client: Client::new(),
            connections: ConnectionRegistry::new(),
            overlay: OverlayRegistry::new(),
            auth: Arc::new(AuthRegistry::new()),
            donations: Arc::new(DonationVerifier::new()),
            commands: Arc::new(RwLock::new(commands)),
            simple_responses: Arc::new(RwLock::new(HashMap::new())),
            banned_words: Arc::new(Vec::new()),
            timers: Arc::new(RwLock::new(HashMap::new())),
            slow_mode_secs: Arc::new(RwLock::new(DEFAULT_SLOW_MODE_SECS)),
            follow_mode_secs: Arc::new(RwLock::new(DEFAULT_FOLLOW_MODE_SECS)),
        }
    }
}
