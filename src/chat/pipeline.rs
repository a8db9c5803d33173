use crate::chat::mention::handle_mention;
use crate::chat::sanitize::{html_escape, strip_zero_width};
use crate::chat::types::{Request, RequestAuthor, Response};
use crate::chat::wire;
use crate::models::AuthLevel;
use crate::state::{AppState, DUPLICATE_SLOW_MODE_SECS};
use crate::storage::{history, users};
use crate::util::now_unix;
use crate::websocket::connection_manager::SocketId;

fn contains_banned_word(message: &str, banned_words: &[String]) -> bool {
    let lower = message.to_lowercase();
    banned_words.iter().any(|w| !w.is_empty() && lower.contains(&w.to_lowercase()))
}

/// Runs the full publish pipeline for an authenticated `message` frame,
/// sending every frame the handling requires directly — there is no single
/// return value because the caller (the connection task) has nothing left
/// to do afterward.
pub async fn handle_message(state: &AppState, socket: SocketId, user_id: i64, host: &str, raw_message: &str) {
    let Ok(Some(user)) = users::get_user(&state.pool, user_id).await else {
        return;
    };

    let now = now_unix();
    if user.is_banned(now) {
        state.connections.send_to_socket(socket, &wire::status_frame("banned")).await;
        return;
    }
    if !user.has_display_name() {
        state.connections.send_to_socket(socket, &wire::status_frame("rename")).await;
        return;
    }

    let trimmed = strip_zero_width(raw_message);
    if trimmed.is_empty() {
        return;
    }

    let author = RequestAuthor {
        user_id: user.id,
        display_name: user.display_name.clone(),
        auth_level: user.auth_level,
    };

    let response = if trimmed.starts_with('!') || trimmed.starts_with('/') {
        let req = Request::new(&trimmed, author.clone());
        state.commands.read().await.dispatch(state, &req).await
    } else if trimmed.to_lowercase().contains(&format!("@{}", state.config.bot_name).to_lowercase()) {
        let req = Request::new(&trimmed, author.clone());
        handle_mention(&req, &state.config.bot_name)
    } else {
        Response::invalid()
    };

    let publishing = !response.is_valid() || response.public;

    if publishing && user.auth_level < AuthLevel::Mod {
        if let Some(wait) = check_rate_limits(state, &user, &trimmed, now).await {
            state.connections.send_to_socket(socket, &wire::servermsg_frame(&wait)).await;
            return;
        }
    }

    if publishing {
        let _ = users::update_last_message(&state.pool, user.id, &trimmed, now).await;
        persist_and_broadcast(state, &user, now, &trimmed, host, "").await;
    }

    if response.is_valid() {
        deliver_reply(state, &response).await;
    }

    state.connections.send_to_socket(socket, &wire::accepted_frame(&trimmed)).await;
}

/// Checks slow/duplicate-slow/follow mode in that order, returning a
/// human-readable wait message for the first violated one.
async fn check_rate_limits(
    state: &AppState,
    user: &crate::models::User,
    message: &str,
    now: i64,
) -> Option<String> {
    let slow = state.slow_mode().await;
    if slow > 0 && now - user.last_message_time < slow {
        let remaining = slow - (now - user.last_message_time);
        return Some(format!("Slow mode is enabled. Please wait {remaining}s."));
    }

    if message == user.last_message && now - user.last_message_time < DUPLICATE_SLOW_MODE_SECS {
        let remaining = DUPLICATE_SLOW_MODE_SECS - (now - user.last_message_time);
        return Some(format!("Please wait {remaining}s before repeating that message."));
    }

    let follow = state.follow_mode().await;
    if follow > 0 && now - user.created_at < follow {
        let remaining = follow - (now - user.created_at);
        return Some(format!("You must follow for {remaining}s longer before chatting."));
    }

    None
}

/// Scans for banned words, persists the message either way, and broadcasts
/// only when it wasn't dropped. Shared by plain chat (`donate_value=""`) and
/// the donation flow, which stamps the verified amount into the frame.
pub(crate) async fn persist_and_broadcast(
    state: &AppState,
    user: &crate::models::User,
    now: i64,
    message: &str,
    host: &str,
    donate_value: &str,
) {
    let dropped = contains_banned_word(message, &state.banned_words);

    let id = history::insert_message(&state.pool, user.id, now, message, dropped, host, donate_value)
        .await
        .unwrap_or(0);

    if dropped {
        return;
    }

    let frame = wire::chat_frame(
        id,
        now,
        &user.display_name,
        user.id,
        &user.display_color,
        user.auth_level.as_i32(),
        &html_escape(message),
        "",
        donate_value,
    );
    state.connections.broadcast(&frame).await;
}

/// Public responses with an author get "@<requester> " prefixed and are
/// broadcast as a bot chat line. Private responses go only to the
/// requester's live sockets. A response with no reply-to context at all
/// (the console path) is logged instead of sent anywhere, since there is no
/// socket to deliver it to.
async fn deliver_reply(state: &AppState, response: &Response) {
    let Some(text) = &response.text else { return };

    if response.public {
        let body = match &response.reply_to {
            Some(target) => format!("@{} {}", target.display_name, text),
            None => text.clone(),
        };
        let frame = wire::chat_frame(
            0,
            now_unix(),
            &state.config.bot_name,
            0,
            &state.config.bot_color,
            AuthLevel::Mod.as_i32(),
            &html_escape(&body),
            "",
            "",
        );
        state.connections.broadcast(&frame).await;
        return;
    }

    match &response.reply_to {
        Some(target) => {
            state.connections.send_to_user(target.user_id, &wire::servermsg_frame(text)).await;
        }
        None => tracing::info!(%text, "reply to console request"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(last_message: &str, last_message_time: i64, created_at: i64) -> crate::models::User {
        crate::models::User {
            id: 1,
            display_name: "alice".into(),
            display_color: "#fff".into(),
            auth_level: AuthLevel::User,
            last_message: last_message.to_string(),
            last_message_time,
            banned_at: 0,
            banned_until: 0,
            display_name_change_time: 0,
            created_at,
        }
    }

    #[tokio::test]
    async fn slow_mode_blocks_a_message_sent_too_soon() {
        let state = crate::state::test_support::memory_only_state();
        *state.slow_mode_secs.write().await = 30;
        let u = user("", 100, 0);

        let wait = check_rate_limits(&state, &u, "hello", 110).await;
        assert!(wait.unwrap().contains("20s"));
    }

    #[tokio::test]
    async fn duplicate_message_is_rejected_within_the_cooldown() {
        let state = crate::state::test_support::memory_only_state();
        let u = user("hello", 100, 0);

        let wait = check_rate_limits(&state, &u, "hello", 102).await;
        assert!(wait.is_some());
    }

    #[tokio::test]
    async fn distinct_message_is_not_treated_as_a_duplicate() {
        let state = crate::state::test_support::memory_only_state();
        let u = user("hello", 100, 0);

        let wait = check_rate_limits(&state, &u, "goodbye", 101).await;
        assert!(wait.is_none());
    }

    #[tokio::test]
    async fn follow_mode_blocks_a_recently_created_account() {
        let state = crate::state::test_support::memory_only_state();
        *state.follow_mode_secs.write().await = 3600;
        let u = user("", 0, 100);

        let wait = check_rate_limits(&state, &u, "hi", 200).await;
        assert!(wait.unwrap().contains("follow"));
    }

    #[test]
    fn banned_word_match_is_case_insensitive() {
        let words = vec!["badword".to_string()];
        assert!(contains_banned_word("this has a BadWord in it", &words));
        assert!(!contains_banned_word("this is clean", &words));
    }
}
