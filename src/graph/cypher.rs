//! Cypher text helpers: literal rendering, identifier sanitizing, and
//! pulling queries out of model replies.

use patterns::{code_block_regex, write_clause_regex};
use serde_json::Value;

mod patterns {
    use regex::Regex;
    use std::sync::OnceLock;

    pub fn code_block_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)```").expect("Invalid regex pattern"))
    }

    pub fn write_clause_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"(?i)\b(CREATE|MERGE|DELETE|DETACH|SET|REMOVE|DROP|LOAD\s+CSV)\b")
                .expect("Invalid regex pattern")
        })
    }
}

/// Quote `s` as a Cypher string literal
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a JSON value as a Cypher literal. Objects are stored as JSON text.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(_) => quote(&value.to_string()),
    }
}

/// Make `raw` safe to use as a label, relationship type or property key.
///
/// Keeps ASCII alphanumerics and `_`; anything else becomes `_`.
pub fn identifier(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// `{k: v, ...}` property map for MERGE patterns
pub fn property_map<'a>(props: impl IntoIterator<Item = (&'a str, &'a Value)>) -> String {
    let parts: Vec<String> = props
        .into_iter()
        .map(|(k, v)| format!("{}: {}", identifier(k), literal(v)))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// Extract a Cypher query from a model reply: the first fenced code block,
/// or the whole reply when it already starts with a query clause.
pub fn extract_query(reply: &str) -> Option<String> {
    if let Some(caps) = code_block_regex().captures(reply) {
        let query = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        return (!query.is_empty()).then(|| query.to_string());
    }

    let trimmed = reply.trim();
    let upper = trimmed.to_ascii_uppercase();
    let starts_like_query = ["MATCH", "OPTIONAL", "WITH", "UNWIND", "CALL", "RETURN"]
        .iter()
        .any(|kw| upper.starts_with(kw));
    starts_like_query.then(|| trimmed.to_string())
}

/// True when `query` contains no clause that writes to the graph.
/// Keywords inside string literals and backticked names do not count.
pub fn is_read_only(query: &str) -> bool {
    !write_clause_regex().is_match(&mask_literals(query))
}

/// Blank out the contents of `'...'`, `"..."` and `` `...` `` spans
fn mask_literals(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut open: Option<char> = None;
    let mut escaped = false;

    for c in query.chars() {
        match open {
            None => {
                if matches!(c, '\'' | '"' | '`') {
                    open = Some(c);
                }
                out.push(c);
            }
            Some(quote) => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if c == '\\' && quote != '`' {
                    escaped = true;
                    out.push(' ');
                } else if c == quote {
                    open = None;
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote("a\\b"), r#""a\\b""#);
        assert_eq!(quote("line\nbreak"), r#""line\nbreak""#);
    }

    #[test]
    fn test_literal_values() {
        assert_eq!(literal(&json!(null)), "NULL");
        assert_eq!(literal(&json!(3)), "3");
        assert_eq!(literal(&json!(true)), "true");
        assert_eq!(literal(&json!(["a", 1])), r#"["a", 1]"#);
        assert_eq!(literal(&json!({"k": 1})), r#""{\"k\":1}""#);
    }

    #[test]
    fn test_identifier_sanitizes() {
        assert_eq!(identifier("Person"), "Person");
        assert_eq!(identifier("WORKS AT"), "WORKS_AT");
        assert_eq!(identifier("1st`; DROP"), "_1st___DROP");
        assert_eq!(identifier(""), "_");
    }

    #[test]
    fn test_property_map() {
        let name = json!("Ada");
        let born = json!(1815);
        assert_eq!(
            property_map([("name", &name), ("born year", &born)]),
            r#"{name: "Ada", born_year: 1815}"#
        );
    }

    #[test]
    fn test_extract_query_from_fence() {
        let reply = "Sure:\n```cypher\nMATCH (n:Person) RETURN n.name\n```\nDone.";
        assert_eq!(extract_query(reply).as_deref(), Some("MATCH (n:Person) RETURN n.name"));
    }

    #[test]
    fn test_extract_query_bare() {
        assert_eq!(
            extract_query("  MATCH (n) RETURN count(n)  ").as_deref(),
            Some("MATCH (n) RETURN count(n)")
        );
        assert_eq!(extract_query("I don't know"), None);
        assert_eq!(extract_query("```\n```"), None);
    }

    #[test]
    fn test_is_read_only() {
        assert!(is_read_only("MATCH (n:Person) RETURN n.name"));
        assert!(!is_read_only("MATCH (n) DETACH DELETE n"));
        assert!(!is_read_only("match (n) set n.x = 1"));
        assert!(is_read_only("MATCH (n) WHERE n.offset > 1 RETURN n"));
    }

    #[test]
    fn test_is_read_only_ignores_keywords_in_literals() {
        assert!(is_read_only(r#"MATCH (c:Company {name: "Merge Labs"}) RETURN c.founded"#));
        assert!(is_read_only(
            r#"MATCH (d:Dataset) WHERE d.title CONTAINS "training set" RETURN d.title"#
        ));
        assert!(is_read_only("MATCH (c {name: 'Create Inc'}) RETURN c"));
        assert!(is_read_only(r#"MATCH (c {name: "say \"delete\" now"}) RETURN c"#));
        assert!(is_read_only("MATCH (n:`Set Theory`) RETURN n"));

        assert!(!is_read_only(r#"MATCH (c {name: "Merge Labs"}) SET c.x = 1"#));
        assert!(!is_read_only("MATCH (n) WHERE n.name = 'a' DELETE n"));
    }

    #[test]
    fn test_mask_literals() {
        assert_eq!(mask_literals(r#"RETURN "ab", 'c'"#), r#"RETURN "  ", ' '"#);
        assert_eq!(mask_literals(r#"RETURN "a\"b" + x"#), r#"RETURN "    " + x"#);
    }
}
