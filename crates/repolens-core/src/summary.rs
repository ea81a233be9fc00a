//! Summary input selection and tolerant parsing of the model's reply.
//!
//! # Selection
//!
//! [`select_important_files`] builds the text sent to the LLM. Files whose
//! path contains a manifest pattern (README, package manifests, build files)
//! come first, grouped by pattern in [`PRIORITY_PATTERNS`] order. The
//! remaining files follow in storage order if they are smaller than the size
//! ceiling. Each file is wrapped in a `--- FILE: <path> ---` header.
//! Selection stops at the first file whose snippet would push the text past
//! the budget; that file and every file after it are left out.
//!
//! # Parsing
//!
//! [`parse_summary_response`] never fails. It strips wrapper tokens, takes
//! the text between the first `{` and the last `}`, parses it as JSON (with
//! one structural repair pass if needed) and clamps every field. When no
//! object can be recovered it returns the fallback record described on
//! [`fallback_fields`].

use serde_json::Value;

use crate::models::{Complexity, FileRecord, SummaryFields};

/// Default character budget for the summary input.
pub const DEFAULT_MAX_CHARS: usize = 8000;

/// Default size ceiling (bytes) for non-priority files.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20_000;

/// Manifest patterns, matched as substrings of the file path.
pub const PRIORITY_PATTERNS: &[&str] = &[
    "README",
    "readme",
    "package.json",
    "pubspec.yaml",
    "requirements.txt",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "Cargo.toml",
    "composer.json",
    "Gemfile",
    "go.mod",
    "tsconfig.json",
    "next.config.js",
    "vite.config.js",
    "Dockerfile",
    "docker-compose.yml",
];

const WRAPPER_TOKENS: &[&str] = &["<|header_start|>", "<|header_end|>"];

const FALLBACK_EXCERPT_CHARS: usize = 500;

/// Concatenate a bounded, priority-ordered selection of file contents.
pub fn select_important_files(files: &[FileRecord], max_chars: usize, max_file_size: u64) -> String {
    let mut picked = vec![false; files.len()];
    let mut order: Vec<usize> = Vec::new();

    for pattern in PRIORITY_PATTERNS {
        for (i, f) in files.iter().enumerate() {
            if !picked[i] && f.path.contains(pattern) {
                picked[i] = true;
                order.push(i);
            }
        }
    }
    for (i, f) in files.iter().enumerate() {
        if !picked[i] && f.size < max_file_size {
            order.push(i);
        }
    }

    let mut collected = String::new();
    let mut used = 0usize;
    for i in order {
        let f = &files[i];
        if f.content.is_empty() {
            continue;
        }
        let snippet = format!("\n--- FILE: {} ---\n{}\n", f.path, f.content);
        let len = snippet.chars().count();
        if used + len > max_chars {
            break;
        }
        used += len;
        collected.push_str(&snippet);
    }
    collected
}

/// Parse the LLM's summary reply. Never fails.
pub fn parse_summary_response(raw: &str) -> SummaryFields {
    let mut text = raw.to_string();
    for token in WRAPPER_TOKENS {
        text = text.replace(token, "");
    }

    let block = match (text.find('{'), text.rfind('}')) {
        (Some(first), Some(last)) if first < last => &text[first..=last],
        _ => return fallback_fields(&text),
    };

    let parsed = serde_json::from_str::<Value>(block)
        .or_else(|_| serde_json::from_str::<Value>(&repair_json(block)));

    match parsed {
        Ok(value) => clamp_fields(&value),
        Err(e) => {
            tracing::warn!(error = %e, "summary reply is not recoverable JSON, using fallback");
            fallback_fields(&text)
        }
    }
}

/// Fallback record: `"Parsing failed"`, `"Unknown"`, `Medium`, and the first
/// 500 characters of the reply as the only issue.
pub fn fallback_fields(text: &str) -> SummaryFields {
    SummaryFields {
        summary: "Parsing failed".to_string(),
        architecture: "Unknown".to_string(),
        complexity: Complexity::Medium,
        potential_issues: vec![text.chars().take(FALLBACK_EXCERPT_CHARS).collect()],
    }
}

fn clamp_fields(value: &Value) -> SummaryFields {
    let text_field = |key: &str, default: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| default.to_string())
    };

    let complexity = value
        .get("complexity")
        .and_then(Value::as_str)
        .and_then(Complexity::from_label)
        .unwrap_or_default();

    let mut potential_issues: Vec<String> = Vec::new();
    if let Some(items) = value.get("potentialIssues").and_then(Value::as_array) {
        for item in items.iter().filter_map(Value::as_str) {
            let item = item.trim();
            if !potential_issues.iter().any(|seen| seen == item) {
                potential_issues.push(item.to_string());
            }
        }
    }

    SummaryFields {
        summary: text_field("summary", "No summary"),
        architecture: text_field("architecture", "Unknown"),
        complexity,
        potential_issues,
    }
}

/// Best-effort structural repair of near-valid JSON.
///
/// Handles typographic quotes, raw newlines inside strings, trailing commas,
/// an unterminated final string, and unclosed objects or arrays.
pub fn repair_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        let c = match c {
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        };

        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                strip_trailing_comma(&mut out);
                if closers.last() == Some(&c) {
                    closers.pop();
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    strip_trailing_comma(&mut out);
    while let Some(closer) = closers.pop() {
        out.push(closer);
    }
    out
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> FileRecord {
        FileRecord::new("r1", path, content.len() as u64, "", content.to_string())
    }

    #[test]
    fn test_parse_well_formed_reply() {
        let raw = r#"{"summary":"ok","architecture":"MVC","complexity":"High","potentialIssues":["a","a","b"]}"#;
        let fields = parse_summary_response(raw);
        assert_eq!(fields.summary, "ok");
        assert_eq!(fields.architecture, "MVC");
        assert_eq!(fields.complexity, Complexity::High);
        assert_eq!(fields.potential_issues, ["a", "b"]);
    }

    #[test]
    fn test_parse_unparsable_reply_falls_back() {
        let raw = "Sorry, I cannot help with that.";
        let fields = parse_summary_response(raw);
        assert_eq!(fields.summary, "Parsing failed");
        assert_eq!(fields.architecture, "Unknown");
        assert_eq!(fields.complexity, Complexity::Medium);
        assert_eq!(fields.potential_issues, [raw]);
    }

    #[test]
    fn test_fallback_excerpt_is_truncated() {
        let raw = format!("{{ not json {} }}", "x".repeat(900));
        let fields = parse_summary_response(&raw);
        assert_eq!(fields.summary, "Parsing failed");
        assert_eq!(fields.potential_issues.len(), 1);
        assert_eq!(fields.potential_issues[0].chars().count(), 500);
    }

    #[test]
    fn test_parse_strips_wrappers_and_prose() {
        let raw = "<|header_start|>assistant<|header_end|>\nHere you go:\n```json\n{\"summary\": \" trimmed \", \"complexity\": \"Low\"}\n```";
        let fields = parse_summary_response(raw);
        assert_eq!(fields.summary, "trimmed");
        assert_eq!(fields.architecture, "Unknown");
        assert_eq!(fields.complexity, Complexity::Low);
        assert!(fields.potential_issues.is_empty());
    }

    #[test]
    fn test_parse_clamps_invalid_fields() {
        let raw = r#"{"summary": 42, "complexity": "Extreme", "potentialIssues": ["x", 7, null, " x "]}"#;
        let fields = parse_summary_response(raw);
        assert_eq!(fields.summary, "No summary");
        assert_eq!(fields.complexity, Complexity::Medium);
        assert_eq!(fields.potential_issues, ["x"]);
    }

    #[test]
    fn test_parse_repairs_trailing_commas_and_smart_quotes() {
        let raw = "{\u{201C}summary\u{201D}: \"fine\", \"potentialIssues\": [\"a\", \"b\",],}";
        let fields = parse_summary_response(raw);
        assert_eq!(fields.summary, "fine");
        assert_eq!(fields.potential_issues, ["a", "b"]);
    }

    #[test]
    fn test_repair_closes_open_structures() {
        let repaired = repair_json("{\"a\": [1, 2, {\"b\": \"unterminated");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"][2]["b"], "unterminated");
    }

    #[test]
    fn test_repair_escapes_raw_newlines_in_strings() {
        let repaired = repair_json("{\"summary\": \"line one\nline two\"}");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["summary"], "line one\nline two");
    }

    #[test]
    fn test_selection_puts_priority_files_first_in_pattern_order() {
        let files = vec![
            file("src/main.rs", "fn main() {}"),
            file("Cargo.toml", "[package]"),
            file("README.md", "# Demo"),
        ];
        let text = select_important_files(&files, 8000, 20_000);
        let readme = text.find("--- FILE: README.md ---").unwrap();
        let cargo = text.find("--- FILE: Cargo.toml ---").unwrap();
        let main = text.find("--- FILE: src/main.rs ---").unwrap();
        assert!(readme < cargo && cargo < main);
    }

    #[test]
    fn test_selection_stops_at_first_file_over_budget() {
        let big = "b".repeat(200);
        let files = vec![
            file("README.md", "short readme"),
            file("src/big.rs", &big),
            file("src/small.rs", "tiny"),
        ];
        let text = select_important_files(&files, 100, 20_000);
        assert_eq!(text, "\n--- FILE: README.md ---\nshort readme\n");
        assert!(!text.contains("src/big.rs"));
        assert!(!text.contains("src/small.rs"));
    }

    #[test]
    fn test_selection_keeps_files_that_fit_before_overflow() {
        let files = vec![
            file("src/one.rs", "1"),
            file("src/two.rs", "2"),
            file("src/three.rs", &"3".repeat(100)),
            file("src/four.rs", "4"),
        ];
        let text = select_important_files(&files, 60, 20_000);
        assert!(text.chars().count() <= 60);
        assert!(text.contains("--- FILE: src/one.rs ---\n1\n"));
        assert!(text.contains("--- FILE: src/two.rs ---\n2\n"));
        assert!(!text.contains("src/four.rs"));
    }

    #[test]
    fn test_selection_skips_empty_and_oversized_rest() {
        let mut huge = file("src/huge.rs", "x");
        huge.size = 50_000;
        let files = vec![file("src/empty.rs", ""), huge, file("package.json", "{}")];
        let text = select_important_files(&files, 8000, 20_000);
        assert_eq!(text, "\n--- FILE: package.json ---\n{}\n");
    }
}
