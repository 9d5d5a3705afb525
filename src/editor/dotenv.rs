//! `KEY=VALUE` text used in the editor buffer.
//!
//! Values that need it are double-quoted with `\\`, `\"`, `\n`, `\r`
//! and `\t` escapes, so any string survives a write/parse cycle.

use std::collections::HashMap;

/// Parse a single line into a (key, value) pair.
///
/// Returns `None` for blank lines, comments, and lines without `=`.
/// Handles: `export` prefix, double/single quotes, values with `=`.
pub fn parse_env_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);

    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        unescape(inner)
    } else if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        inner.to_string()
    } else {
        value.to_string()
    };

    Some((key.to_string(), value))
}

/// Parse a whole buffer.  Later lines win on duplicate keys.
pub fn parse_env_text(content: &str) -> HashMap<String, String> {
    content.lines().filter_map(parse_env_line).collect()
}

/// Format one `KEY=VALUE` line, quoting the value when needed.
pub fn format_env_line(key: &str, value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value
            .chars()
            .any(|c| matches!(c, ' ' | '#' | '"' | '\'' | '\\' | '\n' | '\r' | '\t'));

    if needs_quotes {
        format!("{key}=\"{}\"", escape(value))
    } else {
        format!("{key}={value}")
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> Option<(String, String)> {
        Some((k.to_string(), v.to_string()))
    }

    #[test]
    fn parse_simple_key_value() {
        assert_eq!(parse_env_line("KEY=value"), pair("KEY", "value"));
    }

    #[test]
    fn parse_export_prefix() {
        assert_eq!(
            parse_env_line("export DATABASE_URL=postgres://localhost/db"),
            pair("DATABASE_URL", "postgres://localhost/db")
        );
    }

    #[test]
    fn parse_value_with_equals() {
        assert_eq!(parse_env_line("KEY=val=ue"), pair("KEY", "val=ue"));
    }

    #[test]
    fn parse_quoted_values() {
        assert_eq!(parse_env_line(r#"KEY="hello world""#), pair("KEY", "hello world"));
        assert_eq!(parse_env_line("KEY='hello world'"), pair("KEY", "hello world"));
        assert_eq!(parse_env_line(r#"KEY="""#), pair("KEY", ""));
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("   "), None);
        assert_eq!(parse_env_line("NOEQUALS"), None);
        assert_eq!(parse_env_line("=value"), None);
    }

    #[test]
    fn format_plain_and_quoted() {
        assert_eq!(format_env_line("A", "1"), "A=1");
        assert_eq!(format_env_line("B", "has space"), "B=\"has space\"");
        assert_eq!(format_env_line("C", ""), "C=\"\"");
    }

    #[test]
    fn awkward_values_survive_format_and_parse() {
        for value in ["multi\nline", "quote \" inside", "back\\slash", " padded ", "tab\there", "#hash"] {
            let line = format_env_line("K", value);
            assert_eq!(parse_env_line(&line), pair("K", value), "line: {line}");
        }
    }

    #[test]
    fn later_duplicates_win() {
        let map = parse_env_text("A=1\nA=2\n");
        assert_eq!(map["A"], "2");
    }
}
