use chrono::Utc;

use crate::chat::wire;
use crate::chat::{Request, Response};
use crate::commands::ban::{perform_ban, perform_unban};
use crate::commands::registry::{CommandRegistry, HandlerFn};
use crate::models::AuthLevel;
use crate::state::AppState;
use crate::storage::{config as config_storage, history, responses, users};
use crate::util::format_hms;
use crate::websocket::overlay::{OverlayEvent, TtsCommand};

/// `commandInfo` reports this as a literal in the donor source; treated here
/// as a build-time constant rather than reading `Cargo.toml` at runtime.
pub const SERVER_VERSION: &str = "0.1";

fn wrap<F, Fut>(f: F) -> HandlerFn
where
    F: for<'a> Fn(&'a AppState, &'a Request) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    Box::new(move |state, req| Box::pin(f(state, req)))
}

/// Builds the `<cmd>`-registered handler for a dynamically added simple
/// response: looks up the current text at call time (not at registration
/// time), so `editcom` takes effect without re-registering the command.
fn simple_response_handler() -> HandlerFn {
    wrap(|state, req| async move {
        let text = state
            .simple_responses
            .read()
            .await
            .get(&req.command)
            .cloned();
        match text {
            Some(t) => Response::public(req, t),
            None => Response::private(req, format!("Don't know command \"{}\"", req.command)),
        }
    })
}

async fn handle_addcom(state: &AppState, req: &Request) -> Response {
    let cmd = req.arg(1).to_lowercase();
    if cmd.is_empty() || req.args.len() < 3 {
        return Response::private(req, "Usage: addcom <command> <response...>");
    }
    if state.commands.read().await.contains(&cmd) {
        return Response::private(req, format!("Command \"{cmd}\" already exists"));
    }

    let text = req.args[2..].join(" ");
    if responses::insert(&state.pool, &cmd, &text).await.is_err() {
        return Response::private(req, format!("Command \"{cmd}\" already exists"));
    }
    state.simple_responses.write().await.insert(cmd.clone(), text);
    state.commands.write().await.register(&cmd, AuthLevel::User, simple_response_handler());

    Response::private(req, format!("Added command \"{cmd}\""))
}

async fn handle_editcom(state: &AppState, req: &Request) -> Response {
    let cmd = req.arg(1).to_lowercase();
    if cmd.is_empty() || req.args.len() < 3 {
        return Response::private(req, "Usage: editcom <command> <response...>");
    }
    if !state.simple_responses.read().await.contains_key(&cmd) {
        return Response::private(req, format!("\"{cmd}\" is not an editable command"));
    }

    let text = req.args[2..].join(" ");
    match responses::update(&state.pool, &cmd, &text).await {
        Ok(true) => {
            state.simple_responses.write().await.insert(cmd.clone(), text);
            Response::private(req, format!("Updated command \"{cmd}\""))
        }
        _ => Response::private(req, format!("\"{cmd}\" is not an editable command")),
    }
}

async fn handle_delcom(state: &AppState, req: &Request) -> Response {
    let cmd = req.arg(1).to_lowercase();
    if !state.simple_responses.read().await.contains_key(&cmd) {
        return Response::private(req, format!("\"{cmd}\" is not an editable command"));
    }

    let _ = responses::delete(&state.pool, &cmd).await;
    state.simple_responses.write().await.remove(&cmd);
    state.commands.write().await.remove(&cmd);

    Response::private(req, format!("Deleted command \"{cmd}\""))
}

async fn handle_commands(state: &AppState, req: &Request) -> Response {
    let names = state.commands.read().await.names_for(req.auth_level());
    Response::private(req, names.join(", "))
}

async fn handle_alert(state: &AppState, req: &Request) -> Response {
    let title = req.arg(1);
    if title.is_empty() {
        return Response::private(req, "Usage: alert <title> [subtitle...]");
    }
    let subtitle = if req.args.len() > 2 { req.args[2..].join(" ") } else { String::new() };
    state
        .overlay
        .broadcast(&OverlayEvent::Alert { title: title.to_string(), subtitle })
        .await;

    Response::private(req, "Alert sent")
}

fn tts_command_handler(cmd: TtsCommand) -> HandlerFn {
    wrap(move |state, req| async move {
        state.overlay.broadcast(&OverlayEvent::Command(cmd)).await;
        Response::private(req, format!("Sent {}", cmd_name(cmd)))
    })
}

fn cmd_name(cmd: TtsCommand) -> &'static str {
    match cmd {
        TtsCommand::SkipTts => "skiptts",
        TtsCommand::PauseTts => "pausetts",
        TtsCommand::PurgeTts => "purgetts",
        TtsCommand::AutoTts => "autotts",
        TtsCommand::NextTts => "nexttts",
    }
}

async fn handle_say(_state: &AppState, req: &Request) -> Response {
    if req.args.len() != 2 {
        return Response::private(req, "Usage: say \"<message>\"");
    }
    Response::public_anonymous(req.arg(1))
}

async fn handle_time(_state: &AppState, req: &Request) -> Response {
    Response::public(req, Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

async fn handle_timer(state: &AppState, req: &Request) -> Response {
    let sub = req.arg(1).to_lowercase();
    let name = req.arg(2).to_lowercase();
    if name.is_empty() {
        return Response::private(req, "Usage: timer <start|check|stop> <name>");
    }

    let now = crate::util::now_unix();
    let mut timers = state.timers.write().await;
    match sub.as_str() {
        "start" => {
            if timers.contains_key(&name) {
                Response::private(req, format!("Timer \"{name}\" is already running"))
            } else {
                timers.insert(name.clone(), now);
                Response::public(req, format!("Timer \"{name}\" started"))
            }
        }
        "check" => match timers.get(&name) {
            Some(&start) => Response::public(req, format!("Timer \"{name}\": {}", format_hms(now - start))),
            None => Response::private(req, format!("Timer \"{name}\" is not running")),
        },
        "stop" => match timers.remove(&name) {
            Some(start) => Response::public(req, format!("Timer \"{name}\" stopped at {}", format_hms(now - start))),
            None => Response::private(req, format!("Timer \"{name}\" is not running")),
        },
        _ => Response::private(req, "Usage: timer <start|check|stop> <name>"),
    }
}

/// `commandInfo` has no body in the donor source (declared, never
/// implemented); this content is built purely from the protocol's own
/// literal description of what it should report.
async fn handle_info(state: &AppState, req: &Request) -> Response {
    let slow = state.slow_mode().await;
    let follow = state.follow_mode().await;
    Response::private(
        req,
        format!(
            "v{SERVER_VERSION} | slow: {slow}s | duplicate-slow: {}s | follow: {follow}s",
            crate::state::DUPLICATE_SLOW_MODE_SECS
        ),
    )
}

/// Also undocumented in the donor source beyond its header declaration; see
/// `handle_info`.
async fn handle_followmode(state: &AppState, req: &Request) -> Response {
    match req.arg(1).parse::<i64>() {
        Ok(secs) => {
            *state.follow_mode_secs.write().await = secs;
            Response::private(req, format!("Follow mode set to {secs}s"))
        }
        Err(_) => Response::private(req, "Usage: followmode <seconds>"),
    }
}

async fn handle_slowmode(state: &AppState, req: &Request) -> Response {
    // Matches Qt's `toInt()`: a failed parse silently becomes zero rather
    // than rejecting the command.
    let secs = req.arg(1).parse::<i64>().unwrap_or(0);
    *state.slow_mode_secs.write().await = secs;
    Response::private(req, format!("Slow mode set to {secs}s"))
}

async fn handle_ban(state: &AppState, req: &Request) -> Response {
    let name = req.arg(1);
    if name.is_empty() {
        return Response::private(req, "Usage: ban <name> [duration]");
    }
    let duration = if req.arg(2).is_empty() { None } else { Some(req.arg(2)) };
    perform_ban(state, req, name, duration, false).await
}

async fn handle_ipban(state: &AppState, req: &Request) -> Response {
    let name = req.arg(1);
    if name.is_empty() {
        return Response::private(req, "Usage: ipban <name> [duration]");
    }
    let duration = if req.arg(2).is_empty() { None } else { Some(req.arg(2)) };
    perform_ban(state, req, name, duration, true).await
}

async fn handle_unban(state: &AppState, req: &Request) -> Response {
    let name = req.arg(1);
    if name.is_empty() {
        return Response::private(req, "Usage: unban <name>");
    }
    perform_unban(state, req, name).await
}

async fn handle_mod(state: &AppState, req: &Request) -> Response {
    set_auth_level(state, req, AuthLevel::Mod).await
}

async fn handle_unmod(state: &AppState, req: &Request) -> Response {
    set_auth_level(state, req, AuthLevel::User).await
}

async fn set_auth_level(state: &AppState, req: &Request, level: AuthLevel) -> Response {
    let name = crate::util::strip_at_symbols(req.arg(1));
    if name.is_empty() {
        return Response::private(req, "Usage: mod/unmod <name>");
    }
    match users::set_auth_level(&state.pool, name, level.as_i32()).await {
        Ok(true) => {
            if let Ok(Some(user)) = users::get_user_by_name(&state.pool, name).await {
                state
                    .connections
                    .send_to_user(user.id, &wire::authlevel_frame(level.as_i32()))
                    .await;
            }
            Response::private(req, format!("{name} is now level {}", level.as_i32()))
        }
        _ => Response::private(req, format!("Couldn't find user {name}")),
    }
}

async fn handle_delete(state: &AppState, req: &Request) -> Response {
    let ids: Vec<i64> = req.args[1..].iter().filter_map(|a| a.parse().ok()).collect();
    if ids.is_empty() {
        return Response::private(req, "Usage: delete <id...>");
    }
    if history::soft_delete_messages(&state.pool, &ids).await.is_err() {
        return Response::private(req, "Internal server error");
    }
    state.connections.broadcast(&wire::delete_frame(&ids)).await;
    Response::private(req, format!("Deleted {} message(s)", ids.len()))
}

async fn handle_video(state: &AppState, req: &Request) -> Response {
    let id = req.arg(1);
    if id.is_empty() {
        return Response::private(req, "Usage: video <id>");
    }
    if config_storage::set_config(&state.pool, "video", id).await.is_err() {
        return Response::private(req, "Internal server error");
    }
    Response::private(req, format!("Video set to {id}"))
}

/// Registers every built-in verb in the order `help`/`commands` should list
/// them — alphabetical registration isn't required, insertion order is what
/// matters and this order matches the donor's `initCommands()` table.
pub fn register_builtins(reg: &mut CommandRegistry) {
    reg.register("addcom", AuthLevel::Mod, wrap(|s, r| async move { handle_addcom(s, r).await }));
    reg.register("editcom", AuthLevel::Mod, wrap(|s, r| async move { handle_editcom(s, r).await }));
    reg.register("delcom", AuthLevel::Mod, wrap(|s, r| async move { handle_delcom(s, r).await }));
    reg.register("commands", AuthLevel::User, wrap(|s, r| async move { handle_commands(s, r).await }));
    reg.register("help", AuthLevel::User, wrap(|s, r| async move { handle_commands(s, r).await }));
    reg.register("alert", AuthLevel::Mod, wrap(|s, r| async move { handle_alert(s, r).await }));
    reg.register("autotts", AuthLevel::Mod, tts_command_handler(TtsCommand::AutoTts));
    reg.register("nexttts", AuthLevel::Mod, tts_command_handler(TtsCommand::NextTts));
    reg.register("pausetts", AuthLevel::Mod, tts_command_handler(TtsCommand::PauseTts));
    reg.register("purgetts", AuthLevel::Mod, tts_command_handler(TtsCommand::PurgeTts));
    reg.register("skiptts", AuthLevel::Mod, tts_command_handler(TtsCommand::SkipTts));
    reg.register("say", AuthLevel::Mod, wrap(|s, r| async move { handle_say(s, r).await }));
    reg.register("time", AuthLevel::User, wrap(|s, r| async move { handle_time(s, r).await }));
    reg.register("timer", AuthLevel::User, wrap(|s, r| async move { handle_timer(s, r).await }));
    reg.register("info", AuthLevel::User, wrap(|s, r| async move { handle_info(s, r).await }));
    reg.register("followmode", AuthLevel::Mod, wrap(|s, r| async move { handle_followmode(s, r).await }));
    reg.register("slowmode", AuthLevel::Mod, wrap(|s, r| async move { handle_slowmode(s, r).await }));
    reg.register("slow", AuthLevel::Mod, wrap(|s, r| async move { handle_slowmode(s, r).await }));
    reg.register("ban", AuthLevel::Mod, wrap(|s, r| async move { handle_ban(s, r).await }));
    reg.register("ipban", AuthLevel::Mod, wrap(|s, r| async move { handle_ipban(s, r).await }));
    reg.register("ip", AuthLevel::Mod, wrap(|s, r| async move { handle_ipban(s, r).await }));
    reg.register("unban", AuthLevel::Mod, wrap(|s, r| async move { handle_unban(s, r).await }));
    reg.register("mod", AuthLevel::Admin, wrap(|s, r| async move { handle_mod(s, r).await }));
    reg.register("unmod", AuthLevel::Admin, wrap(|s, r| async move { handle_unmod(s, r).await }));
    reg.register("delete", AuthLevel::Mod, wrap(|s, r| async move { handle_delete(s, r).await }));
    reg.register("del", AuthLevel::Mod, wrap(|s, r| async move { handle_delete(s, r).await }));
    reg.register("rm", AuthLevel::Mod, wrap(|s, r| async move { handle_delete(s, r).await }));
    reg.register("video", AuthLevel::Admin, wrap(|s, r| async move { handle_video(s, r).await }));
}
