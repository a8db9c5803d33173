use crate::commands::tokenize;
use crate::models::AuthLevel;

/// The caller behind a `Request`, when it has one. Console-constructed
/// requests (no live author) carry `None` and are treated as ADMIN for
/// permission checks, matching the donor algorithm's default-constructed
/// `Request`.
#[derive(Debug, Clone)]
pub struct RequestAuthor {
    pub user_id: i64,
    pub display_name: String,
    pub auth_level: AuthLevel,
}

/// A tokenized command or chat line plus (optionally) who sent it.
#[derive(Debug, Clone)]
pub struct Request {
    pub line: String,
    pub args: Vec<String>,
    pub command: String,
    pub author: Option<RequestAuthor>,
}

/// Strips exactly one leading `!` or `/` — the publish pipeline only reaches
/// a `Request` after deciding the message is a command, but the prefix
/// itself was never part of the verb.
fn strip_command_prefix(line: &str) -> &str {
    line.strip_prefix('!').or_else(|| line.strip_prefix('/')).unwrap_or(line)
}

impl Request {
    pub fn new(line: &str, author: RequestAuthor) -> Self {
        let stripped = strip_command_prefix(line);
        let args = tokenize(stripped);
        let command = args.first().map(|a| a.to_lowercase()).unwrap_or_default();
        Request { line: stripped.to_string(), args, command, author: Some(author) }
    }

    /// A request with no author, as the donor builds for an operator
    /// console. Not reachable from the WebSocket transport; kept for the
    /// reply-delivery print-instead-of-broadcast path.
    pub fn console(line: &str) -> Self {
        let stripped = strip_command_prefix(line);
        let args = tokenize(stripped);
        let command = args.first().map(|a| a.to_lowercase()).unwrap_or_default();
        Request { line: stripped.to_string(), args, command, author: None }
    }

    pub fn has_author(&self) -> bool {
        self.author.is_some()
    }

    pub fn auth_level(&self) -> AuthLevel {
        self.author.as_ref().map(|a| a.auth_level).unwrap_or(AuthLevel::Admin)
    }

    pub fn author_id(&self) -> i64 {
        self.author.as_ref().map(|a| a.user_id).unwrap_or(0)
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.display_name.as_str())
    }

    /// `args[n]`, or empty string if out of range — mirrors the donor's
    /// `QStringList::value(n)` default-empty accessor so handlers can index
    /// past the end without a bounds check.
    pub fn arg(&self, n: usize) -> &str {
        self.args.get(n).map(|s| s.as_str()).unwrap_or("")
    }
}

/// Who a public reply should be addressed to, when it should be addressed
/// at all. `say`'s response is built without one on purpose: its broadcast
/// carries no "@requester " prefix even though a requester obviously exists.
#[derive(Debug, Clone)]
pub struct ReplyTarget {
    pub user_id: i64,
    pub display_name: String,
}

/// The outcome of dispatching a command or mention. `text: None` means no
/// response was produced (plain chat, or a mention line that matched
/// neither the greeting nor the 8-ball patterns) — the caller falls
/// through to broadcasting the original message untouched.
#[derive(Debug, Clone)]
pub struct Response {
    pub text: Option<String>,
    pub public: bool,
    pub reply_to: Option<ReplyTarget>,
}

impl Response {
    pub fn invalid() -> Self {
        Response { text: None, public: false, reply_to: None }
    }

    pub fn is_valid(&self) -> bool {
        self.text.is_some()
    }

    /// A private reply, delivered as `servermsg` to every socket of the
    /// requester (or printed, if the request has no author).
    pub fn private(req: &Request, text: impl Into<String>) -> Self {
        Response {
            text: Some(text.into()),
            public: false,
            reply_to: req.author.as_ref().map(|a| ReplyTarget {
                user_id: a.user_id,
                display_name: a.display_name.clone(),
            }),
        }
    }

    /// A public reply, broadcast as a bot chat line. Prefixed with
    /// "@<requester> " at delivery time when the request has an author.
    pub fn public(req: &Request, text: impl Into<String>) -> Self {
        Response {
            text: Some(text.into()),
            public: true,
            reply_to: req.author.as_ref().map(|a| ReplyTarget {
                user_id: a.user_id,
                display_name: a.display_name.clone(),
            }),
        }
    }

    /// A public reply with no reply-to context, so no "@requester " prefix
    /// is ever added — used by `say`, which builds its response against an
    /// authorless request on purpose.
    pub fn public_anonymous(text: impl Into<String>) -> Self {
        Response { text: Some(text.into()), public: true, reply_to: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> RequestAuthor {
        RequestAuthor { user_id: 7, display_name: "alice".into(), auth_level: AuthLevel::Mod }
    }

    #[test]
    fn request_lowercases_command_but_not_args() {
        let r = Request::new("!Ban Bob 1h", author());
        assert_eq!(r.command, "ban");
        assert_eq!(r.arg(1), "Bob");
        assert_eq!(r.arg(2), "1h");
    }

    #[test]
    fn console_request_has_no_author_and_admin_level() {
        let r = Request::console("!ban bob");
        assert!(!r.has_author());
        assert_eq!(r.auth_level(), AuthLevel::Admin);
        assert_eq!(r.author_id(), 0);
    }

    #[test]
    fn missing_arg_is_empty_string() {
        let r = Request::new("!time", author());
        assert_eq!(r.arg(5), "");
    }

    #[test]
    fn say_response_has_no_reply_to_even_with_an_author_request() {
        let r = Request::new("!say hi", author());
        let resp = Response::public_anonymous("hi");
        assert!(resp.reply_to.is_none());
        assert!(resp.public);
        // the requesting `r` still has an author; only the response omits it
        assert!(r.has_author());
    }

    #[test]
    fn private_response_carries_requester_as_reply_target() {
        let r = Request::new("!info", author());
        let resp = Response::private(&r, "v0.1");
        assert_eq!(resp.reply_to.unwrap().user_id, 7);
        assert!(!resp.public);
    }
}
