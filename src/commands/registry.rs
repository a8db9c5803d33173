use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::chat::{Request, Response};
use crate::models::AuthLevel;
use crate::state::AppState;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type HandlerFn = Box<dyn for<'a> Fn(&'a AppState, &'a Request) -> BoxFuture<'a, Response> + Send + Sync>;

pub struct CommandEntry {
    pub min_auth: AuthLevel,
    pub handler: HandlerFn,
}

/// Insertion-ordered command table: a lookup map paired with a `Vec` of
/// keys recording registration order, since `help`/`commands` must list
/// verbs in the order they were registered. Not `indexmap` — nothing else
/// in this crate's dependency stack reaches for it, and a `Vec` alongside
/// the map gets the same guarantee with no new dependency.
#[derive(Default)]
pub struct CommandRegistry {
    order: Vec<String>,
    entries: HashMap<String, CommandEntry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, min_auth: AuthLevel, handler: HandlerFn) {
        let key = name.to_lowercase();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, CommandEntry { min_auth, handler });
    }

    pub fn remove(&mut self, name: &str) {
        let key = name.to_lowercase();
        self.entries.remove(&key);
        self.order.retain(|k| k != &key);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.get(&name.to_lowercase())
    }

    /// Verbs registered in insertion order that `auth` is permitted to use.
    pub fn names_for(&self, auth: AuthLevel) -> Vec<String> {
        self.order
            .iter()
            .filter(|k| self.entries.get(*k).is_some_and(|e| auth >= e.min_auth))
            .cloned()
            .collect()
    }

    /// Dispatches a tokenized, `!`/`/`-stripped command line. Unknown verbs
    /// and insufficient auth both produce a private `Response`, never a
    /// hard error — this mirrors the donor's reply-only error surface for
    /// commands.
    pub async fn dispatch(&self, state: &AppState, req: &Request) -> Response {
        let Some(entry) = self.entries.get(&req.command) else {
            return Response::private(req, format!("Don't know command \"{}\"", req.command));
        };

        if req.auth_level() < entry.min_auth {
            return Response::private(req, "You don't have permission to use this command.");
        }

        (entry.handler)(state, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap<F, Fut>(f: F) -> HandlerFn
    where
        F: for<'a> Fn(&'a AppState, &'a Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Box::new(move |state, req| Box::pin(f(state, req)))
    }

    #[test]
    fn names_for_respects_insertion_order_and_auth_gate() {
        let mut reg = CommandRegistry::new();
        reg.register("time", AuthLevel::User, wrap(|_, r| async move { Response::public(r, "now") }));
        reg.register("ban", AuthLevel::Mod, wrap(|_, r| async move { Response::private(r, "banned") }));
        reg.register("help", AuthLevel::User, wrap(|_, r| async move { Response::private(r, "help") }));

        assert_eq!(reg.names_for(AuthLevel::User), vec!["time", "help"]);
        assert_eq!(reg.names_for(AuthLevel::Mod), vec!["time", "ban", "help"]);
    }

    #[test]
    fn remove_drops_from_both_order_and_lookup() {
        let mut reg = CommandRegistry::new();
        reg.register("foo", AuthLevel::User, wrap(|_, r| async move { Response::private(r, "x") }));
        reg.remove("foo");
        assert!(!reg.contains("foo"));
        assert!(reg.names_for(AuthLevel::Admin).is_empty());
    }

    #[test]
    fn re_registering_a_name_keeps_its_original_order_position() {
        let mut reg = CommandRegistry::new();
        reg.register("a", AuthLevel::User, wrap(|_, r| async move { Response::private(r, "1") }));
        reg.register("b", AuthLevel::User, wrap(|_, r| async move { Response::private(r, "2") }));
        reg.register("a", AuthLevel::User, wrap(|_, r| async move { Response::private(r, "3") }));
        assert_eq!(reg.names_for(AuthLevel::User), vec!["a", "b"]);
    }
}
