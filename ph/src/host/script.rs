//! Script builders and result helpers for the host-side functions

use regex::Regex;
use std::sync::LazyLock;

/// Host call that drops a marker at the playhead
pub const ADD_MARKER: &str = "addMarkerAtPlayhead()";

/// Host call that returns a summary of the open project
pub const PROJECT_SUMMARY: &str = "getHostProjectSummary()";

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:\w+)?\n([\s\S]*?)```").expect("code block pattern is valid"));

/// Escape source so it survives as a double-quoted script string literal
pub fn escape_script(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut chars = code.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Host call that evaluates arbitrary user code
pub fn run_dynamic_call(code: &str) -> String {
    format!("runDynamicExtendScript(\"{}\")", escape_script(code))
}

/// Empty output and the literal `undefined` mean the call produced nothing
pub fn normalize_result(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "undefined" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Body of the first fenced code block, trimmed; empty when there is none
pub fn extract_code_block(text: &str) -> String {
    CODE_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_script() {
        assert_eq!(escape_script(r#"alert("hi")"#), r#"alert(\"hi\")"#);
        assert_eq!(escape_script(r"C:\path"), r"C:\\path");
        assert_eq!(escape_script("a\r\nb\nc"), r"a\nb\nc");
        assert_eq!(escape_script("lone\rcr"), "lone\rcr");
    }

    #[test]
    fn test_run_dynamic_call() {
        let call = run_dynamic_call("var x = \"a\";\nx");
        assert_eq!(call, r#"runDynamicExtendScript("var x = \"a\";\nx")"#);
    }

    #[test]
    fn test_normalize_result() {
        assert_eq!(normalize_result(""), None);
        assert_eq!(normalize_result("  \n"), None);
        assert_eq!(normalize_result("undefined"), None);
        assert_eq!(normalize_result(" Marker added \n").as_deref(), Some("Marker added"));
    }

    #[test]
    fn test_extract_code_block_with_language() {
        let reply = "Try this:\n```javascript\napp.project.activeSequence.markers.createMarker(0);\n```\nDone.";
        assert_eq!(extract_code_block(reply), "app.project.activeSequence.markers.createMarker(0);");
    }

    #[test]
    fn test_extract_code_block_first_only() {
        let reply = "```\nfirst\n```\n```js\nsecond\n```";
        assert_eq!(extract_code_block(reply), "first");
    }

    #[test]
    fn test_extract_code_block_none() {
        assert_eq!(extract_code_block("no code here"), "");
        assert_eq!(extract_code_block("```js unterminated"), "");
    }
}
