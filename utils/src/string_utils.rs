pub const TRUNCATED_SUFFIX: &str = "...[TRUNCATED]";
pub const MAX_STATUS_DESCRIPTION_LEN: usize = 140;

/// Truncates each line longer than `max_chars` characters, keeping line breaks intact.
pub fn truncate_lines(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (line, ""),
        };
        match content.char_indices().nth(max_chars) {
            Some((idx, _)) => {
                out.push_str(&content[..idx]);
                out.push_str(TRUNCATED_SUFFIX);
            }
            None => out.push_str(content),
        }
        out.push_str(newline);
    }
    out
}

/// Upper-cases the first letter of each word. Space, '-', '_' and '.' separate words.
pub fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = matches!(c, ' ' | '-' | '_' | '.');
    }
    out
}

pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Commit status descriptions are limited to 140 characters by the host.
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() <= MAX_STATUS_DESCRIPTION_LEN {
        return description.to_string();
    }
    let kept: String = description
        .chars()
        .take(MAX_STATUS_DESCRIPTION_LEN - 3)
        .collect();
    format!("{}...", kept)
}

/// First three characters followed by `***`, or `<not set>` when empty.
pub fn redact(value: &str) -> String {
    if value.is_empty() {
        return "<not set>".to_string();
    }
    let prefix: String = value.chars().take(3).collect();
    format!("{}***", prefix)
}
