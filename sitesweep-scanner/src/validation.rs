//! Target URL policy.
//!
//! Top-level input is validated by the caller before the pipeline runs; the
//! same predicate is applied to every URL the crawler discovers on its own.

use crate::error::{AuditError, Result};
use url::{Host, Url};

/// Validates a user-supplied audit target.
///
/// Accepts only non-empty, parseable `https://` URLs whose host is neither
/// `localhost` nor a bare IPv4 address.
pub fn validate_target_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuditError::InvalidUrl("URL is required".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| AuditError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if url.scheme() != "https" {
        return Err(AuditError::InvalidUrl(format!(
            "only https:// URLs are supported: {}",
            trimmed
        )));
    }

    match url.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => Err(
            AuditError::InvalidUrl(format!("localhost is not allowed: {}", trimmed)),
        ),
        Some(Host::Ipv4(_)) => Err(AuditError::InvalidUrl(format!(
            "IP address targets are not allowed: {}",
            trimmed
        ))),
        Some(_) => Ok(url),
        None => Err(AuditError::InvalidUrl(format!(
            "URL has no host component: {}",
            trimmed
        ))),
    }
}

pub fn is_allowed_target(raw: &str) -> bool {
    validate_target_url(raw).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_public_https() {
        assert!(validate_target_url("https://example.com").is_ok());
        assert!(validate_target_url("  https://example.com/path?q=1  ").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(validate_target_url("").is_err());
        assert!(validate_target_url("   ").is_err());
        assert!(validate_target_url("not a url").is_err());
    }

    #[test]
    fn test_rejects_non_https() {
        assert!(validate_target_url("http://example.com").is_err());
        assert!(validate_target_url("ftp://example.com").is_err());
        assert!(validate_target_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_rejects_localhost_and_ipv4() {
        assert!(validate_target_url("https://localhost/").is_err());
        assert!(validate_target_url("https://LOCALHOST:8443/").is_err());
        assert!(validate_target_url("https://127.0.0.1/").is_err());
        assert!(validate_target_url("https://93.184.216.34/").is_err());
    }

    #[test]
    fn test_rejection_is_a_client_error() {
        let err = validate_target_url("http://example.com").unwrap_err();
        assert_eq!(err.http_status(), 400);
    }
}
