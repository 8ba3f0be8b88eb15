//! Rendering helpers for dashboard and report rows.
//!
//! Monitor and sync reports carry full validation messages; the terminal
//! surface shows one bounded line per row and a percentage per dimension.
//! Everything here is pure string shaping so the structured report stays
//! lossless.

/// Flatten a message to a single line and cut it at `limit` characters.
///
/// Validation messages can quote multi-line YAML; a dashboard row gets one
/// line, ellipsized when the message runs long.
pub fn one_line(message: &str, limit: usize) -> String {
    let mut flat = String::with_capacity(message.len().min(limit + 3));
    let mut count = 0usize;
    for word in message.split_whitespace() {
        if count > 0 {
            flat.push(' ');
        }
        flat.push_str(word);
        count += 1;
    }
    match flat.char_indices().nth(limit) {
        Some((cut, _)) => {
            flat.truncate(cut);
            flat.push_str("...");
            flat
        }
        None => flat,
    }
}

/// Join the first `max_items` messages for a row suffix, noting how many
/// were left out.
pub fn summarize(messages: &[String], max_items: usize, limit: usize) -> String {
    let mut shown: Vec<String> = messages
        .iter()
        .take(max_items)
        .map(|m| one_line(m, limit))
        .collect();
    let hidden = messages.len().saturating_sub(max_items);
    if hidden > 0 {
        shown.push(format!("+{} more", hidden));
    }
    shown.join(" | ")
}

/// Whole-number percentage for the progress overview (e.g. `75%`).
pub fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_flattens_whitespace() {
        assert_eq!(one_line("field 'design'\n  must be\ta map", 60), "field 'design' must be a map");
    }

    #[test]
    fn test_one_line_ellipsizes_at_limit() {
        assert_eq!(one_line("abcdef", 3), "abc...");
        assert_eq!(one_line("abc", 3), "abc");
    }

    #[test]
    fn test_summarize_counts_hidden_messages() {
        let msgs = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        assert_eq!(summarize(&msgs, 2, 10), "one | two | +1 more");
        assert_eq!(summarize(&msgs, 3, 10), "one | two | three");
    }

    #[test]
    fn test_summarize_empty_is_empty() {
        assert_eq!(summarize(&[], 3, 10), "");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.5), "50%");
        assert_eq!(percent(1.0), "100%");
    }
}
