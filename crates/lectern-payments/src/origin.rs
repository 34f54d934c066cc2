//! Origin Normalization
//!
//! Canonicalizes caller-supplied origins before they are baked into
//! processor redirect URLs. Everything is forced onto https except local
//! development hosts.

use url::Url;

/// Hosts exempt from the forced-https rule
const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Canonicalize a raw origin string into `scheme://host[:port]`.
///
/// Unparseable input falls back to `fallback`. Never fails: if even the
/// fallback does not parse, it is returned as-is minus trailing slashes.
pub fn normalize_origin(raw: &str, fallback: &str) -> String {
    let parsed = Url::parse(raw.trim())
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(fallback).ok().filter(|u| u.host_str().is_some()));

    let Some(url) = parsed else {
        return fallback.trim_end_matches('/').to_string();
    };

    let host = url.host_str().unwrap_or_default();
    let scheme = if LOCAL_HOSTS.contains(&host) {
        url.scheme()
    } else {
        "https"
    };

    match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    }
}

/// Resolve `path` against a bare origin. Query strings pass through.
pub fn build_url(origin: &str, path: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = "https://fallback.test";

    #[test]
    fn test_localhost_keeps_http() {
        assert_eq!(
            normalize_origin("http://localhost:5173", FALLBACK),
            "http://localhost:5173"
        );
        assert_eq!(
            normalize_origin("http://127.0.0.1:3000", FALLBACK),
            "http://127.0.0.1:3000"
        );
    }

    #[test]
    fn test_remote_host_forced_to_https() {
        assert_eq!(
            normalize_origin("http://example.com", FALLBACK),
            "https://example.com"
        );
    }

    #[test]
    fn test_unparseable_uses_fallback() {
        assert_eq!(normalize_origin("not-a-url", FALLBACK), FALLBACK);
        assert_eq!(normalize_origin("", FALLBACK), FALLBACK);
    }

    #[test]
    fn test_path_and_query_stripped() {
        assert_eq!(
            normalize_origin("https://example.com/some/path?q=1", FALLBACK),
            "https://example.com"
        );
    }

    #[test]
    fn test_non_default_port_survives() {
        assert_eq!(
            normalize_origin("http://example.com:8443", FALLBACK),
            "https://example.com:8443"
        );
    }

    #[test]
    fn test_build_url_no_double_slash() {
        assert_eq!(
            build_url("https://example.com/", "/return/acct_1"),
            "https://example.com/return/acct_1"
        );
        assert_eq!(
            build_url("https://example.com", "return/acct_1"),
            "https://example.com/return/acct_1"
        );
    }

    #[test]
    fn test_build_url_keeps_query() {
        assert_eq!(
            build_url("https://example.com", "courses/c1?session_id=cs_123"),
            "https://example.com/courses/c1?session_id=cs_123"
        );
    }
}
