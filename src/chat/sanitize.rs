/// Code points replaced with a plain space before a message is admitted,
/// so invisible characters can't be used to dodge the banned-word filter
/// or pad past `max_chat_length` unnoticed.
fn is_zero_width(c: char) -> bool {
    matches!(c as u32,
        0x00AD | 0x00A0 | 0x0009 | 0x034F | 0x061C | 0x115F | 0x1160
        | 0x17B4 | 0x17B5 | 0x180E
        | 0x2000..=0x200F
        | 0x202F | 0x205F
        | 0x2060..=0x2064
        | 0x206A..=0x206F
        | 0x3000 | 0x2800 | 0x3164 | 0xFEFF | 0xFFA0
    )
}

/// Replaces every zero-width code point with a space, then trims. Called
/// twice in the publish pipeline (trim, strip, re-trim) so a message that's
/// nothing but invisible characters collapses to empty and is dropped.
pub fn strip_zero_width(s: &str) -> String {
    let replaced: String = s.chars().map(|c| if is_zero_width(c) { ' ' } else { c }).collect();
    replaced.trim().to_string()
}

/// Escapes a message for embedding in the overlay's HTML-rendering client.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_space_and_trims() {
        assert_eq!(strip_zero_width("\u{200B}hello\u{200B}"), "hello");
    }

    #[test]
    fn message_of_only_invisible_characters_collapses_to_empty() {
        assert_eq!(strip_zero_width("\u{FEFF}\u{00A0}\u{2060}"), "");
    }

    #[test]
    fn ordinary_text_is_unaffected() {
        assert_eq!(strip_zero_width("  hello world  "), "hello world");
    }

    #[test]
    fn html_escape_covers_all_five_characters() {
        assert_eq!(html_escape(r#"<a href="x">O'Brien & Co</a>"#), "&lt;a href=&quot;x&quot;&gt;O&#x27;Brien &amp; Co&lt;/a&gt;");
    }
}
