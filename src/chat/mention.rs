use rand::seq::SliceRandom;

use super::types::{Request, Response};
use crate::models::AuthLevel;

const GREETING_WORDS: &[&str] = &[
    "hello", "hi", "hey", "salutations", "greetings", "sup", "wassup", "whats up", "what's up",
];

const MAGIC_8_BALL: &[&str] = &[
    "It is certain.",
    "It is decidedly so.",
    "Without a doubt.",
    "Yes definitely.",
    "You may rely on it.",
    "As I see it, yes.",
    "Most likely.",
    "Outlook good.",
    "Yes.",
    "Signs point to yes.",
    "Reply hazy, try again.",
    "Ask again later.",
    "Better not tell you now.",
    "Cannot predict now.",
    "Concentrate and ask again.",
    "Don't count on it.",
    "My reply is no.",
    "My sources say no.",
    "Outlook not so good.",
    "Very doubtful.",
];

fn is_greeting(line: &str) -> bool {
    let words: Vec<&str> = line.split(' ').collect();
    GREETING_WORDS.iter().any(|h| {
        if h.contains(' ') {
            line.contains(h)
        } else {
            words.iter().any(|w| w.eq_ignore_ascii_case(h))
        }
    })
}

/// Called only once the caller has confirmed the line mentions `@<bot_name>`.
/// Greetings are checked first; the 8-ball pattern is checked only if no
/// greeting word matched, so a line like "hey @kcbot is it working?" gets
/// the greeting reply, not the 8-ball one.
pub fn handle_mention(req: &Request, bot_name: &str) -> Response {
    if is_greeting(&req.line) {
        return if req.auth_level() >= AuthLevel::Member {
            Response::public(req, format!("Hey @{}!", req.author_name().unwrap_or_default()))
        } else {
            Response::public(req, "I only say hello to subscribers")
        };
    }

    let prefix = format!("@{bot_name}");
    if req.line.to_lowercase().starts_with(&prefix.to_lowercase()) && req.line.ends_with('?') {
        let reply = MAGIC_8_BALL.choose(&mut rand::thread_rng()).copied().unwrap_or("Yes.");
        return Response::public(req, reply);
    }

    Response::invalid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::RequestAuthor;

    fn req(line: &str, level: AuthLevel) -> Request {
        Request::new(line, RequestAuthor { user_id: 1, display_name: "alice".into(), auth_level: level })
    }

    #[test]
    fn member_greeting_gets_named_reply() {
        let r = req("hey @kcbot", AuthLevel::Member);
        let resp = handle_mention(&r, "kcbot");
        assert_eq!(resp.text.unwrap(), "Hey @alice!");
        assert!(resp.public);
    }

    #[test]
    fn non_member_greeting_gets_subscriber_only_reply() {
        let r = req("hi @kcbot", AuthLevel::User);
        let resp = handle_mention(&r, "kcbot");
        assert_eq!(resp.text.unwrap(), "I only say hello to subscribers");
    }

    #[test]
    fn multi_word_greeting_matches_as_substring() {
        let r = req("whats up @kcbot", AuthLevel::Member);
        let resp = handle_mention(&r, "kcbot");
        assert!(resp.is_valid());
    }

    #[test]
    fn eight_ball_fires_on_mention_prefixed_question() {
        let r = req("@kcbot is it working?", AuthLevel::User);
        let resp = handle_mention(&r, "kcbot");
        assert!(MAGIC_8_BALL.contains(&resp.text.unwrap().as_str()));
    }

    #[test]
    fn non_question_mention_with_no_greeting_is_invalid() {
        let r = req("@kcbot nice stream", AuthLevel::User);
        let resp = handle_mention(&r, "kcbot");
        assert!(!resp.is_valid());
    }

    #[test]
    fn greeting_takes_priority_over_eight_ball_pattern() {
        let r = req("hey @kcbot, is it working?", AuthLevel::Member);
        let resp = handle_mention(&r, "kcbot");
        assert_eq!(resp.text.unwrap(), "Hey @alice!");
    }
}
