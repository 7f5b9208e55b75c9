//! Upgrade-time checks: principal resolution and origin validation

use axum::http::{HeaderMap, header};
use url::Url;

use beacon_server_domain::realtime::Principal;

use super::jwt::{JwtConfig, JwtError, extract_token_from_header};

/// Resolves the caller of an upgrade request.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap, access_token: Option<&str>) -> Result<Principal, JwtError>;
}

/// Bearer token resolver backed by [`JwtConfig`]
#[derive(Debug, Clone)]
pub struct JwtPrincipalResolver {
    config: JwtConfig,
}

impl JwtPrincipalResolver {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }
}

impl PrincipalResolver for JwtPrincipalResolver {
    fn resolve(&self, headers: &HeaderMap, access_token: Option<&str>) -> Result<Principal, JwtError> {
        let token = match headers.get(header::AUTHORIZATION) {
            Some(value) => {
                let value = value.to_str().map_err(|_| JwtError::InvalidHeaderFormat)?;
                extract_token_from_header(value)?
            }
            None => access_token
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .ok_or(JwtError::MissingToken)?,
        };

        self.config.validate_token(token).map(|claims| claims.to_principal())
    }
}

/// Whether the browser origin may open a realtime connection.
///
/// Requests without `Origin` come from non-browser clients and pass. A
/// present origin must name the same host as the request, either directly or
/// through `X-Forwarded-Host`, ignoring ports and case.
pub fn is_origin_allowed(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Some(origin) = origin.to_str().ok().and_then(|raw| Url::parse(raw.trim()).ok()) else {
        return false;
    };
    let Some(origin_host) = origin.host_str().map(unbracket) else {
        return false;
    };
    if origin_host.is_empty() {
        return false;
    }

    let request_hosts = [
        headers.get(header::HOST),
        headers.get("x-forwarded-host"),
    ];
    request_hosts
        .into_iter()
        .flatten()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(|value| strip_port(value.trim()))
        .any(|host| !host.is_empty() && host.eq_ignore_ascii_case(origin_host))
}

/// Host part of a `Host` / `X-Forwarded-Host` value.
///
/// An unterminated IPv6 literal yields an empty host, which never matches.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split_once(']').map_or("", |(ip, _)| ip);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn unbracket(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::jwt::tests::{claims, create_test_token};
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_origin_missing_is_allowed() {
        assert!(is_origin_allowed(&headers(&[("host", "platform.example.dev")])));
    }

    #[test]
    fn test_origin_same_host() {
        assert!(is_origin_allowed(&headers(&[
            ("host", "platform.example.dev"),
            ("origin", "https://platform.example.dev"),
        ])));
        assert!(is_origin_allowed(&headers(&[
            ("host", "Platform.Example.dev:8443"),
            ("origin", "https://platform.example.dev:443"),
        ])));
    }

    #[test]
    fn test_origin_forwarded_host() {
        assert!(is_origin_allowed(&headers(&[
            ("host", "gateway:8080"),
            ("x-forwarded-host", "platform.example.dev"),
            ("origin", "https://platform.example.dev"),
        ])));
    }

    #[test]
    fn test_origin_different_host_denied() {
        assert!(!is_origin_allowed(&headers(&[
            ("host", "platform.example.dev"),
            ("origin", "https://evil.example.com"),
        ])));
    }

    #[test]
    fn test_origin_invalid_denied() {
        assert!(!is_origin_allowed(&headers(&[
            ("host", "platform.example.dev"),
            ("origin", "://bad"),
        ])));
        assert!(!is_origin_allowed(&headers(&[
            ("host", "platform.example.dev"),
            ("origin", "null"),
        ])));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.dev:8080"), "example.dev");
        assert_eq!(strip_port("example.dev"), "example.dev");
        assert_eq!(strip_port("[::1]:8080"), "::1");
        assert_eq!(strip_port("[::1"), "");
    }

    #[test]
    fn test_origin_ipv6_literals() {
        assert!(is_origin_allowed(&headers(&[
            ("host", "[::1]:8080"),
            ("origin", "http://[::1]:8080"),
        ])));
        assert!(!is_origin_allowed(&headers(&[
            ("host", "[::1"),
            ("origin", "https://[::1"),
        ])));
    }

    #[test]
    fn test_origin_with_userinfo_and_path() {
        assert!(is_origin_allowed(&headers(&[
            ("host", "platform.example.dev"),
            ("origin", "https://user@platform.example.dev:8443/ignored?x=1"),
        ])));
        assert!(!is_origin_allowed(&headers(&[
            ("host", "platform.example.dev"),
            ("origin", "https://platform.example.dev@evil.example.com"),
        ])));
    }

    #[test]
    fn test_origin_without_host_denied() {
        assert!(!is_origin_allowed(&headers(&[
            ("host", "platform.example.dev"),
            ("origin", "file:///etc/passwd"),
        ])));
    }

    #[test]
    fn test_resolver_prefers_header_then_query() {
        let resolver = JwtPrincipalResolver::new(JwtConfig::new("s3cret", None));
        let admin = create_test_token(&claims("admin-1", &["platform_admin"]), "s3cret", 60);
        let member = create_test_token(&claims("member-1", &[]), "s3cret", 60);

        let bearer = format!("Bearer {}", admin);
        let from_header = resolver
            .resolve(&headers(&[("authorization", bearer.as_str())]), Some(member.as_str()))
            .unwrap();
        assert_eq!(from_header.user_id, "admin-1");
        assert!(from_header.is_platform_admin);

        let from_query = resolver.resolve(&HeaderMap::new(), Some(member.as_str())).unwrap();
        assert_eq!(from_query.user_id, "member-1");
        assert!(!from_query.is_platform_operator());
    }

    #[test]
    fn test_resolver_rejects_missing_token() {
        let resolver = JwtPrincipalResolver::new(JwtConfig::new("s3cret", None));
        assert_eq!(
            resolver.resolve(&HeaderMap::new(), Some("  ")).unwrap_err(),
            JwtError::MissingToken
        );
    }
}
