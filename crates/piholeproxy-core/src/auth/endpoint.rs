use std::fmt;

use serde::{Serialize, Serializer};

/// Base URL of one Pi-hole instance, e.g. `http://192.168.1.2`.
///
/// Stored normalized: surrounding whitespace and trailing slashes are
/// removed and the scheme and host are lowercased, so two spellings of
/// the same instance compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(String);

impl Endpoint {
    /// Normalize a raw base URL. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, trimmed),
        };
        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        let mut normalized = String::with_capacity(trimmed.len());
        if let Some(scheme) = scheme {
            normalized.push_str(&scheme.to_ascii_lowercase());
            normalized.push_str("://");
        }
        normalized.push_str(&authority.to_ascii_lowercase());
        normalized.push_str(path);
        Some(Self(normalized))
    }

    /// Parse a comma-separated endpoint list, dropping blanks and
    /// duplicates while keeping first-seen order.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut endpoints: Vec<Self> = Vec::new();
        for ep in raw.split(',').filter_map(Self::parse) {
            if !endpoints.contains(&ep) {
                endpoints.push(ep);
            }
        }
        endpoints
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full URL for an API path such as `/api/auth/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_trailing_slashes() {
        let ep = Endpoint::parse("  http://pihole.lan/// ").unwrap();
        assert_eq!(ep.as_str(), "http://pihole.lan");
    }

    #[test]
    fn test_parse_lowercases_scheme_and_host_only() {
        let ep = Endpoint::parse("HTTP://PiHole.LAN:8080/Admin/").unwrap();
        assert_eq!(ep.as_str(), "http://pihole.lan:8080/Admin");
    }

    #[test]
    fn test_parse_blank() {
        assert!(Endpoint::parse("").is_none());
        assert!(Endpoint::parse("   ").is_none());
        assert!(Endpoint::parse("/").is_none());
    }

    #[test]
    fn test_parse_list_dedupes_in_order() {
        let eps = Endpoint::parse_list("http://b.lan, http://a.lan/,,HTTP://B.LAN/ ");
        let names: Vec<&str> = eps.iter().map(|e| e.as_str()).collect();
        assert_eq!(names, vec!["http://b.lan", "http://a.lan"]);
    }

    #[test]
    fn test_url_joins_path() {
        let ep = Endpoint::parse("http://10.0.0.2/").unwrap();
        assert_eq!(ep.url("/api/auth/"), "http://10.0.0.2/api/auth/");
    }

    #[test]
    fn test_serializes_as_string() {
        let ep = Endpoint::parse("http://10.0.0.2").unwrap();
        assert_eq!(serde_json::to_string(&ep).unwrap(), "\"http://10.0.0.2\"");
    }
}
