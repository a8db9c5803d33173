use serde::{Deserialize, Serialize};

/// A user's permission tier. Ordered so that `level >= AuthLevel::Member`
/// comparisons read naturally; the numeric values are part of the wire
/// contract (sent in `authlevel` frames) and must not be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum AuthLevel {
    User = 0,
    Member = 20,
    Mod = 50,
    Admin = 100,
}

impl AuthLevel {
    pub fn from_i32(v: i32) -> Self {
        match v {
            v if v >= AuthLevel::Admin as i32 => AuthLevel::Admin,
            v if v >= AuthLevel::Mod as i32 => AuthLevel::Mod,
            v if v >= AuthLevel::Member as i32 => AuthLevel::Member,
            _ => AuthLevel::User,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Raw row shape as stored; `auth_level` is a plain `INT4` column, converted
/// to `AuthLevel` at the boundary rather than taught to sqlx as a native type.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub display_name: String,
    pub display_color: String,
    pub auth_level: i32,
    pub last_message: String,
    pub last_message_time: i64,
    pub banned_at: i64,
    pub banned_until: i64,
    pub display_name_change_time: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    pub display_color: String,
    pub auth_level: AuthLevel,
    pub last_message: String,
    pub last_message_time: i64,
    pub banned_at: i64,
    pub banned_until: i64,
    pub display_name_change_time: i64,
    pub created_at: i64,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            display_name: r.display_name,
            display_color: r.display_color,
            auth_level: AuthLevel::from_i32(r.auth_level),
            last_message: r.last_message,
            last_message_time: r.last_message_time,
            banned_at: r.banned_at,
            banned_until: r.banned_until,
            display_name_change_time: r.display_name_change_time,
            created_at: r.created_at,
        }
    }
}

impl User {
    pub fn is_banned(&self, now: i64) -> bool {
        self.banned_until > now
    }

    pub fn has_display_name(&self) -> bool {
        !self.display_name.is_empty()
    }
}

/// A persisted chat line. `dropped` messages remain in storage but are
/// excluded from broadcast and history replay.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Message {
    pub id: i64,
    pub user_id: i64,
    pub time: i64,
    pub message: String,
    pub dropped: bool,
    pub host: String,
    pub donate_value: String,
}

/// A dynamically registered command reply (`addcom`/`editcom`/`delcom`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SimpleResponse {
    pub command: String,
    pub response: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BannedHost {
    pub host: String,
    pub started: i64,
    pub until: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BannedWord {
    pub word: String,
}

/// A verified (or rejected) donation order. `order_id` is unique; a second
/// insert attempt for the same id is a replay and is rejected at the
/// database layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Transaction {
    pub order_id: String,
    pub user_id: i64,
    pub time_received: i64,
    pub data: serde_json::Value,
    pub message: String,
    pub succeeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_level_ordering_matches_numeric_values() {
        assert!(AuthLevel::User < AuthLevel::Member);
        assert!(AuthLevel::Member < AuthLevel::Mod);
        assert!(AuthLevel::Mod < AuthLevel::Admin);
    }

    #[test]
    fn from_i32_clamps_to_nearest_known_tier() {
        assert_eq!(AuthLevel::from_i32(0), AuthLevel::User);
        assert_eq!(AuthLevel::from_i32(20), AuthLevel::Member);
        assert_eq!(AuthLevel::from_i32(50), AuthLevel::Mod);
        assert_eq!(AuthLevel::from_i32(100), AuthLevel::Admin);
        assert_eq!(AuthLevel::from_i32(1000), AuthLevel::Admin);
        assert_eq!(AuthLevel::from_i32(10), AuthLevel::User);
    }

    #[test]
    fn user_is_banned_checks_against_now() {
        let row = UserRow {
            id: 1,
            display_name: "alpha".into(),
            display_color: "#fff".into(),
            auth_level: 0,
            last_message: String::new(),
            last_message_time: 0,
            banned_at: 0,
            banned_until: 500,
            display_name_change_time: 0,
            created_at: 0,
        };
        let user: User = row.into();
        assert!(user.is_banned(100));
        assert!(!user.is_banned(500));
        assert!(!user.is_banned(600));
    }
}
