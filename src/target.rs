//! Target normalization.
//!
//! Turns raw user input ("example.com", "HTTP://Example.com/x") into a probe
//! URL plus the lowercased host used for display and watch keys. Purely
//! syntactic: no DNS lookups happen here.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Input normalization failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("empty address")]
    Empty,
    #[error("malformed address: {0}")]
    Malformed(String),
}

/// A normalized probe target. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProbeTarget {
    url: String,
    host: String,
}

impl ProbeTarget {
    /// Absolute, scheme-qualified URL to probe.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Lowercased network location.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

fn scheme_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[a-z]+://").unwrap())
}

/// Normalize raw user input into a [`ProbeTarget`].
///
/// Inputs without a `scheme://` prefix get `https://`. The URL keeps the
/// caller's spelling (scheme case included); only the host is lowercased.
pub fn normalize(raw: &str) -> Result<ProbeTarget, TargetError> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return Err(TargetError::Empty);
    }

    let url = if scheme_prefix().is_match(cleaned) {
        cleaned.to_string()
    } else {
        format!("https://{}", cleaned)
    };

    let parsed = url::Url::parse(&url).map_err(|e| TargetError::Malformed(e.to_string()))?;

    let host = match parsed.host_str() {
        Some(h) if !h.is_empty() => h.to_lowercase(),
        _ => return Err(TargetError::Malformed(format!("no host in {}", cleaned))),
    };

    let host = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };

    Ok(ProbeTarget { url, host })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_domain_gets_https() {
        let target = normalize("example.com").unwrap();
        assert_eq!(target.url(), "https://example.com");
        assert_eq!(target.host(), "example.com");
    }

    #[test]
    fn test_scheme_preserved_host_lowercased() {
        let target = normalize("HTTP://Example.com/x").unwrap();
        assert_eq!(target.url(), "HTTP://Example.com/x");
        assert_eq!(target.host(), "example.com");
    }

    #[test]
    fn test_whitespace_trimmed() {
        let target = normalize("  index.hu/path?q=1 \n").unwrap();
        assert_eq!(target.url(), "https://index.hu/path?q=1");
        assert_eq!(target.host(), "index.hu");
    }

    #[test]
    fn test_explicit_port_kept_in_host() {
        let target = normalize("http://Example.com:8080/").unwrap();
        assert_eq!(target.host(), "example.com:8080");
    }

    #[test]
    fn test_unicode_host_is_punycoded_and_userinfo_dropped() {
        let target = normalize("https://user:pw@Bücher.de/katalog").unwrap();
        assert_eq!(target.url(), "https://user:pw@Bücher.de/katalog");
        assert_eq!(target.host(), "xn--bcher-kva.de");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("   "), Err(TargetError::Empty));
        assert_eq!(normalize(""), Err(TargetError::Empty));
    }

    #[test]
    fn test_missing_host() {
        assert!(matches!(normalize("http://"), Err(TargetError::Malformed(_))));
    }
}
