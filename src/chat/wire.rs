use serde_json::{json, Value};

/// Every server→client frame is `{ type, data }`; this wraps any `data`
/// payload and serializes to the string pushed down a connection's channel.
fn frame(kind: &str, data: Value) -> String {
    json!({ "type": kind, "data": data }).to_string()
}

#[allow(clippy::too_many_arguments)]
pub fn chat_frame(
    id: i64,
    time: i64,
    author: &str,
    author_id: i64,
    author_color: &str,
    author_level: i32,
    message: &str,
    auth: &str,
    donate_value: &str,
) -> String {
    frame(
        "chat",
        json!({
            "id": id,
            "time": time,
            "author": author,
            "author_id": author_id,
            "author_color": author_color,
            "author_level": author_level,
            "message": message,
            "auth": auth,
            "donate_value": donate_value,
        }),
    )
}

pub fn status_frame(status: &str) -> String {
    frame("status", json!({ "status": status }))
}

pub fn servermsg_frame(message: &str) -> String {
    frame("servermsg", json!({ "message": message }))
}

pub fn delete_frame(ids: &[i64]) -> String {
    frame("delete", json!({ "messages": ids }))
}

pub fn join_frame(name: &str) -> String {
    frame("join", json!({ "name": name }))
}

pub fn part_frame(name: &str) -> String {
    frame("part", json!({ "name": name }))
}

pub fn authlevel_frame(level: i32) -> String {
    frame("authlevel", json!({ "level": level }))
}

pub fn accepted_frame(message: &str) -> String {
    frame("accepted", json!({ "message": message }))
}

pub fn getuserconf_frame(name: &str, color: &str) -> String {
    frame("getuserconf", json!({ "name": name, "color": color }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_frame_round_trips_through_json() {
        let s = chat_frame(1, 100, "alice", 7, "#fff", 0, "hi", "google", "");
        let v: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["type"], "chat");
        assert_eq!(v["data"]["author"], "alice");
        assert_eq!(v["data"]["id"], 1);
    }

    #[test]
    fn delete_frame_carries_the_id_array() {
        let s = delete_frame(&[1, 2, 3]);
        let v: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["data"]["messages"], json!([1, 2, 3]));
    }
}
