use crate::chat::wire;
use crate::chat::{Request, Response};
use crate::state::AppState;
use crate::storage::{bans, history, users};
use crate::util::strip_at_symbols;

/// Kept as a literal so it round-trips safely through a 64-bit float on the
/// client side, matching the donor algorithm's permanent-ban sentinel.
pub const PERMANENT_BAN: i64 = 9_007_199_254_740_991;

/// Parses a ban duration into an absolute `until` unix timestamp. `None`
/// means permanent. A bare integer is seconds; otherwise the last character
/// must be a unit in `y/d/h/m/s` (case-insensitive).
pub fn parse_ban_until(duration: Option<&str>, now: i64) -> Result<i64, String> {
    let Some(s) = duration else {
        return Ok(PERMANENT_BAN);
    };

    if let Ok(secs) = s.parse::<i64>() {
        return Ok(now + secs);
    }

    let (amount, unit) = s.split_at(s.len().saturating_sub(1));
    let multiplier = match unit.to_lowercase().as_str() {
        "y" => 31_536_000,
        "d" => 86_400,
        "h" => 3_600,
        "m" => 60,
        "s" => 1,
        _ => return Err(format!("Failed to parse ban timeframe: {s}")),
    };
    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("Failed to parse ban timeframe: {s}"))?;

    Ok(now + amount * multiplier)
}

/// Shared by `ban` and `ipban`; `ip_ban` additionally bans every currently
/// live peer address of the target.
///
/// Deliberately replies public — the donor source's `ban()` ends with a
/// private reply (`Response(r, msg)` with no `true`), but this contradicts
/// the protocol's own literal reply-text instruction for `ban`/`ipban`,
/// which wins over the grounding source on a direct conflict.
pub async fn perform_ban(
    state: &AppState,
    req: &Request,
    target: &str,
    duration: Option<&str>,
    ip_ban: bool,
) -> Response {
    let name = strip_at_symbols(target);
    let now = crate::util::now_unix();

    let until = match parse_ban_until(duration, now) {
        Ok(u) => u,
        Err(e) => return Response::private(req, e),
    };

    let updated = match users::ban_user(&state.pool, name, now, until).await {
        Ok(u) => u,
        Err(_) => return Response::private(req, "Internal server error"),
    };
    if !updated {
        return Response::private(req, format!("Couldn't find user {name}"));
    }

    let Ok(Some(user)) = users::get_user_by_name(&state.pool, name).await else {
        return Response::private(req, format!("Couldn't find user {name}"));
    };

    if let Ok(deleted_ids) = history::soft_delete_user_messages(&state.pool, user.id).await {
        if !deleted_ids.is_empty() {
            state.connections.broadcast(&wire::delete_frame(&deleted_ids)).await;
        }
    }

    state.connections.send_to_user(user.id, &wire::status_frame("banned")).await;

    let mut ip_count = 0usize;
    if ip_ban {
        let hosts = state.connections.hosts_for_user(user.id).await;
        ip_count = hosts.len();
        for host in hosts {
            let _ = bans::insert_banned_host(&state.pool, &host, now, until).await;
        }
    }

    let mut msg = format!("{name} banned until <span class='timestamp'>{until}</span>");
    if ip_ban {
        msg.push_str(&format!("\n{ip_count} IP(s) banned"));
    }

    Response::public(req, msg)
}

pub async fn perform_unban(state: &AppState, req: &Request, target: &str) -> Response {
    let name = strip_at_symbols(target);

    let updated = match users::unban_user(&state.pool, name).await {
        Ok(u) => u,
        Err(_) => return Response::private(req, "Internal server error"),
    };
    if !updated {
        return Response::private(req, format!("Couldn't find user {name}"));
    }

    if let Ok(Some(user)) = users::get_user_by_name(&state.pool, name).await {
        state.connections.send_to_user(user.id, &wire::status_frame("authenticated")).await;
    }

    Response::private(req, format!("{name} unbanned"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_duration_is_permanent() {
        assert_eq!(parse_ban_until(None, 1_000).unwrap(), PERMANENT_BAN);
    }

    #[test]
    fn plain_integer_is_seconds_from_now() {
        assert_eq!(parse_ban_until(Some("45"), 1_000).unwrap(), 1_045);
    }

    #[test]
    fn unit_suffixes_apply_exact_multipliers() {
        assert_eq!(parse_ban_until(Some("1y"), 0).unwrap(), 31_536_000);
        assert_eq!(parse_ban_until(Some("2d"), 0).unwrap(), 172_800);
        assert_eq!(parse_ban_until(Some("3h"), 0).unwrap(), 10_800);
        assert_eq!(parse_ban_until(Some("15m"), 0).unwrap(), 900);
        assert_eq!(parse_ban_until(Some("45s"), 0).unwrap(), 45);
    }

    #[test]
    fn unit_suffix_is_case_insensitive() {
        assert_eq!(parse_ban_until(Some("1Y"), 0).unwrap(), 31_536_000);
    }

    #[test]
    fn unknown_unit_is_a_parse_error() {
        let err = parse_ban_until(Some("1x"), 0).unwrap_err();
        assert_eq!(err, "Failed to parse ban timeframe: 1x");
    }

    #[test]
    fn permanent_literal_matches_the_spec_constant() {
        assert_eq!(PERMANENT_BAN, 9_007_199_254_740_991);
    }
}
