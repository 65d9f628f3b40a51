// Malicious input signatures checked against the request path and query

use crate::errors::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

struct Signature {
    name: &'static str,
    pattern: Regex,
}

static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(|| {
    [
        (
            "sql_keyword",
            r"(?i)\b(sql|script|exec|union|select|insert|delete|drop|update|create|alter)\b",
        ),
        ("script_tag", r"(?i)<\s*script\b"),
        ("javascript_uri", r"(?i)javascript:"),
        ("event_handler", r"(?i)\bon[a-z]+\s*="),
        ("path_traversal", r"\.\.[/\\]"),
        ("encoded_traversal", r"(?i)%2e%2e%2f"),
        ("double_encoded_traversal", r"(?i)%252e%252e%252f"),
    ]
    .into_iter()
    .map(|(name, pattern)| Signature {
        name,
        pattern: Regex::new(pattern).unwrap(),
    })
    .collect()
});

/// Name of the first signature matching `input`
fn first_match(input: &str) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|sig| sig.pattern.is_match(input))
        .map(|sig| sig.name)
}

/// Scan the path and query, both as received and percent-decoded once
///
/// Returns the matched signature name. Input that does not decode to UTF-8 is
/// malformed.
pub fn detect_malicious_input(path: &str, query: Option<&str>) -> Result<Option<&'static str>> {
    let raw: Cow<'_, str> = match query {
        Some(q) if !q.is_empty() => Cow::Owned(format!("{}?{}", path, q)),
        _ => Cow::Borrowed(path),
    };

    if let Some(name) = first_match(&raw) {
        return Ok(Some(name));
    }

    let decoded = urlencoding::decode(&raw).map_err(|_| AppError::MalformedRequest)?;
    Ok(first_match(&decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(path: &str, query: Option<&str>) -> Option<&'static str> {
        detect_malicious_input(path, query).unwrap()
    }

    #[test]
    fn test_clean_requests_pass() {
        assert_eq!(detect("/api/auth/login", None), None);
        assert_eq!(detect("/api/roles", Some("page=2&sort=level")), None);
        assert_eq!(detect("/api/auth/session", None), None);
        assert_eq!(detect("/health/ready", Some("")), None);
    }

    #[test]
    fn test_path_traversal() {
        assert_eq!(detect("/../../etc/passwd", None), Some("path_traversal"));
        assert_eq!(detect("/files", Some("name=..\\boot.ini")), Some("path_traversal"));
    }

    #[test]
    fn test_encoded_traversal() {
        assert_eq!(
            detect("/%2e%2e%2f%2e%2e%2fetc/passwd", None),
            Some("encoded_traversal")
        );
        assert_eq!(detect("/%2E%2E%2Fetc", None), Some("encoded_traversal"));
        assert_eq!(
            detect("/%252e%252e%252fetc/passwd", None),
            Some("double_encoded_traversal")
        );
    }

    #[test]
    fn test_sql_keywords() {
        assert_eq!(
            detect("/api/items", Some("id=1%20UNION%20SELECT%20password")),
            Some("sql_keyword")
        );
        assert_eq!(detect("/api/items", Some("q=drop table")), Some("sql_keyword"));
        // Keywords inside longer words are fine
        assert_eq!(detect("/api/dropdown", Some("q=selection")), None);
    }

    #[test]
    fn test_script_vectors() {
        assert!(detect("/search", Some("q=%3Cscript%3Ealert(1)%3C/script%3E")).is_some());
        assert_eq!(
            detect("/redirect", Some("to=JavaScript:alert(1)")),
            Some("javascript_uri")
        );
        assert_eq!(
            detect("/profile", Some("bio=%22onmouseover%3D%22alert")),
            Some("event_handler")
        );
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        assert!(matches!(
            detect_malicious_input("/%ff%fe", None),
            Err(AppError::MalformedRequest)
        ));
    }
}
