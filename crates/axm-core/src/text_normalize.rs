//! Source text normalization (spec §4.6).
//!
//! This function must stay byte-stable across releases: every evidence
//! span's byte offsets are computed against its output, so any change here
//! invalidates the offsets recorded in every shard already built.
//!
//! Pipeline: normalize newlines to LF, rstrip each line, trim leading and
//! trailing blank lines, conservatively unwind PDF soft-wrap artifacts
//! (merging continuation lines, respecting heading/list/hyphenation
//! boundaries), collapse duplicate blank lines, end with a single trailing
//! newline, then apply a small fixed set of OCR repairs.

/// Normalize extracted source text.
pub fn normalize_source_text(s: &str) -> String {
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let mut raw_lines: Vec<&str> = s.split('\n').map(|ln| ln.trim_end()).collect();

    while matches!(raw_lines.first(), Some(&"")) {
        raw_lines.remove(0);
    }
    while matches!(raw_lines.last(), Some(&"")) {
        raw_lines.pop();
    }

    let mut out: Vec<String> = Vec::new();
    let mut i = 0usize;
    while i < raw_lines.len() {
        let line = raw_lines[i];

        if line.is_empty() {
            let mut j = i + 1;
            while j < raw_lines.len() && raw_lines[j].is_empty() {
                j += 1;
            }

            if let (Some(prev), true) = (out.last().cloned(), j < raw_lines.len()) {
                let nxt = raw_lines[j].trim_start();
                let prev_last = prev.chars().last();
                let prev_ends_sentence = matches!(prev_last, Some('.' | ':' | ';' | '!' | '?' | ')'));
                let nxt_first = nxt.chars().next();
                let nxt_is_continuation =
                    nxt_first.map(|c| c.is_lowercase() || c.is_ascii_digit()).unwrap_or(false);

                if !prev.is_empty() && !prev_ends_sentence && nxt_is_continuation {
                    let merged = format!("{prev} {nxt}");
                    *out.last_mut().unwrap() = merged;
                    i = j + 1;
                    continue;
                }
            }

            if out.last().map(|s| s.as_str()) != Some("") {
                out.push(String::new());
            }
            i += 1;
            continue;
        }

        let mut buf = line.to_string();
        i += 1;

        while i < raw_lines.len() {
            let nxt = raw_lines[i];
            if nxt.is_empty() {
                break;
            }

            if let Some(stripped) = buf.strip_suffix('-') {
                buf = format!("{stripped}{}", nxt.trim_start());
                i += 1;
                continue;
            }

            let looks_like_heading = is_upper_word(&buf) || buf.ends_with(':');
            let looks_like_list = looks_like_list_item(nxt);
            if looks_like_heading || looks_like_list {
                break;
            }

            buf = format!("{buf} {}", nxt.trim_start());
            i += 1;
        }

        out.push(buf);
    }

    let mut cleaned: Vec<String> = Vec::new();
    for ln in out {
        if ln.is_empty() && cleaned.last().map(|s: &String| s.is_empty()).unwrap_or(false) {
            continue;
        }
        cleaned.push(ln);
    }

    let mut normalized = cleaned.join("\n");
    normalized.push('\n');

    normalized = normalized.replace("pi'essure", "pressure");
    normalized = normalized.replace("pi\u{00e2}\u{20ac}\u{2122}essure", "pressure");
    normalized = normalized.replace("bleed-\ning", "bleeding");

    normalized
}

/// Mirrors Python's `str.isupper()`: true only if the string has at least
/// one cased character and every cased character is uppercase.
fn is_upper_word(s: &str) -> bool {
    let mut has_cased = false;
    for c in s.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

fn looks_like_list_item(line: &str) -> bool {
    if line.trim_start().starts_with(['-', '*']) {
        return true;
    }
    // Unlike the dash/star check above, the numbered-list pattern is
    // matched against the un-stripped line, not `line.trim_start()`: an
    // indented line like "  1. foo" is not a list boundary, only one that
    // starts at column zero is.
    let mut chars = line.chars().peekable();
    if chars.peek() == Some(&'(') {
        chars.next();
    }
    let mut saw_digit = false;
    while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
        chars.next();
        saw_digit = true;
    }
    if !saw_digit {
        return false;
    }
    if chars.peek() == Some(&')') {
        chars.next();
    }
    if chars.peek() == Some(&'.') {
        chars.next();
    }
    matches!(chars.peek(), Some(c) if c.is_whitespace())
}
