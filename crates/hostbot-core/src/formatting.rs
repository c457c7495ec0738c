//! Formatting utilities for Telegram HTML replies.

/// Appended to output that was cut short.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cap `text` at `max_chars` characters, appending [`TRUNCATION_MARKER`] when cut.
///
/// Text at or below the limit is returned unchanged.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
    }
}

/// Render raw command output as a fixed-width block.
pub fn pre_block(raw: &str) -> String {
    format!("<pre>{}</pre>", escape_html(raw))
}

/// Render `raw` as one or more messages, each `header` (first only) plus a
/// `<pre>` block, so that no message exceeds `limit` characters.
///
/// Splits on line boundaries where possible. The content itself is not cut.
pub fn split_pre_messages(header: &str, raw: &str, limit: usize) -> Vec<String> {
    const PRE_OVERHEAD: usize = "<pre></pre>".len();

    let escaped = escape_html(raw);
    let header_len = header.chars().count();
    let mut out = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0usize;

    let budget = |first: bool| {
        let used = PRE_OVERHEAD + if first { header_len } else { 0 };
        limit.saturating_sub(used).max(1)
    };

    let flush = |out: &mut Vec<String>, chunk: &mut String| {
        let prefix = if out.is_empty() { header } else { "" };
        out.push(format!("{prefix}<pre>{chunk}</pre>"));
        chunk.clear();
    };

    for line in escaped.split_inclusive('\n') {
        let mut rest = line;
        while !rest.is_empty() {
            let room = budget(out.is_empty()).saturating_sub(chunk_len);
            let rest_len = rest.chars().count();
            if rest_len <= room {
                chunk.push_str(rest);
                chunk_len += rest_len;
                break;
            }
            if chunk_len > 0 {
                flush(&mut out, &mut chunk);
                chunk_len = 0;
                continue;
            }
            // A single line longer than a whole message: hard split at a char
            // boundary that does not cut an HTML entity in half.
            let cut = entity_safe_cut(rest, room);
            chunk.push_str(&rest[..cut]);
            flush(&mut out, &mut chunk);
            rest = &rest[cut..];
        }
    }

    if chunk_len > 0 || out.is_empty() {
        flush(&mut out, &mut chunk);
    }
    out
}

fn entity_safe_cut(s: &str, max_chars: usize) -> usize {
    let mut cut = s
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if let Some(amp) = s[..cut].rfind('&') {
        if !s[amp..cut].contains(';') && amp > 0 {
            cut = amp;
        }
    }
    cut
}
