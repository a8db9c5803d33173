/// Splits a command line on whitespace, treating any run inside a pair of
/// `"` as a single token, then strips one leading and one trailing `"` from
/// each token. Ported from the donor algorithm's regex-based splitter,
/// which the `regex` crate can't reproduce directly (its lookaround-free
/// engine can't express the original's quote-balancing pattern) — a small
/// hand-rolled scanner does the same job without lookaround.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(strip_quotes(&std::mem::take(&mut current)));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(strip_quotes(&current));
    }

    tokens
}

fn strip_quotes(s: &str) -> String {
    let mut s = s.to_string();
    if s.starts_with('"') {
        s.remove(0);
    }
    if s.ends_with('"') {
        s.pop();
    }
    s
}
