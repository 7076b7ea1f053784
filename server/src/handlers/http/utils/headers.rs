use std::net::SocketAddr;
use std::time::{Duration, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use hyper::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::security::domain;
use crate::session::SessionCookie;

pub const REMOTE_USER: &str = "remote-user";
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_ORIGINAL_URL: &str = "x-original-url";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Extract a header value as a string
pub fn get_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| {
            debug!("Retrieved header: {}", name);
            s.to_string()
        })
}

/// Extract cookie value by name, looking through every `Cookie` header.
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                if name.trim() == cookie_name {
                    debug!("Cookie found: {}", cookie_name);
                    Some(value.trim().to_string())
                } else {
                    None
                }
            })
        })
}

/// Escape the five HTML-significant characters.
pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Header value with line breaks and spaces removed, HTML-escaped.
pub fn sanitize(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | ' '))
        .collect();
    html_escape(&compact)
}

/// Client IP as seen by the proxy in front of us: `X-Real-IP`, then
/// `X-Forwarded-For`, then the TCP peer. Only the first address of a list is
/// kept and any port is dropped.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let raw = [X_REAL_IP, X_FORWARDED_FOR]
        .iter()
        .filter_map(|name| get_header_value(headers, name))
        .map(|v| sanitize(&v))
        .find(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default();

    let first = raw.split(',').next().unwrap_or_default();
    domain::strip_port(first).to_string()
}

/// Domain the caller is trying to reach: `X-Original-URL`, then
/// `X-Forwarded-Host`, then `Host`.
pub fn target_url(headers: &HeaderMap) -> String {
    [X_ORIGINAL_URL, X_FORWARDED_HOST, "host"]
        .iter()
        .filter_map(|name| get_header_value(headers, name))
        .map(|v| domain::extract_domain(&sanitize(&v)).to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

fn http_date(unix_secs: i64) -> String {
    let secs = u64::try_from(unix_secs).unwrap_or_default();
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs(secs))
}

/// Render a cookie as a `Set-Cookie` header value.
pub fn set_cookie(cookie: &SessionCookie) -> Result<HeaderValue> {
    let mut value = format!("{}={}", cookie.name, cookie.value);

    if !cookie.domain.is_empty() {
        value.push_str(&format!("; Domain={}", cookie.domain));
    }

    if !cookie.path.is_empty() {
        value.push_str(&format!("; Path={}", cookie.path));
    }

    if let Some(expires_at) = cookie.expires_at {
        value.push_str(&format!("; Expires={}", http_date(expires_at)));
    }

    if let Some(age) = cookie.max_age {
        value.push_str(&format!("; Max-Age={}", age.max(0)));
    }

    if cookie.http_only {
        value.push_str("; HttpOnly");
    }

    if cookie.secure {
        value.push_str("; Secure");
    }

    value.push_str("; SameSite=Lax");

    debug!("Setting cookie: {}", cookie.name);

    HeaderValue::from_str(&value).map_err(|e| {
        warn!("Failed to create cookie header for {}: {}", cookie.name, e);
        anyhow!("Invalid cookie value: {}", e)
    })
}

/// Add no-cache and basic hardening headers
pub fn add_no_cache_headers<T>(mut res: hyper::Response<T>) -> hyper::Response<T> {
    let headers = res.headers_mut();

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("same-origin"),
    );

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::CookieConfig;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn cookie_is_found_among_others() {
        let h = headers(&[("cookie", "a=1; GFA=tok.en.sig; b=2")]);
        assert_eq!(get_cookie(&h, "GFA").as_deref(), Some("tok.en.sig"));
        assert_eq!(get_cookie(&h, "missing"), None);
    }

    #[test]
    fn cookie_is_found_in_a_second_header() {
        let h = headers(&[("cookie", "a=1"), ("cookie", "GFA=x")]);
        assert_eq!(get_cookie(&h, "GFA").as_deref(), Some("x"));
    }

    #[test]
    fn sanitize_strips_breaks_and_escapes() {
        assert_eq!(sanitize(" 1.2.3.4\r\n"), "1.2.3.4");
        assert_eq!(sanitize("<b>"), "&lt;b&gt;");
    }

    #[test]
    fn client_ip_prefers_real_ip_header() {
        let h = headers(&[("x-real-ip", "1.1.1.1"), ("x-forwarded-for", "2.2.2.2")]);
        assert_eq!(client_ip(&h, None), "1.1.1.1");
    }

    #[test]
    fn client_ip_keeps_first_forwarded_address_without_port() {
        let h = headers(&[("x-forwarded-for", "3.3.3.3:5555, 4.4.4.4")]);
        assert_eq!(client_ip(&h, None), "3.3.3.3");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let peer: SocketAddr = "[::1]:4000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "::1");
        let peer: SocketAddr = "10.1.2.3:4000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "10.1.2.3");
        assert_eq!(client_ip(&HeaderMap::new(), None), "");
    }

    #[test]
    fn target_prefers_original_url() {
        let h = headers(&[
            ("x-original-url", "https://app.url.com:8443/x"),
            ("host", "gateway.local"),
        ]);
        assert_eq!(target_url(&h), "app.url.com");
        assert_eq!(target_url(&headers(&[("host", "url.com:80")])), "url.com");
        assert_eq!(target_url(&HeaderMap::new()), "");
    }

    #[test]
    fn session_cookie_header_layout() {
        let config = CookieConfig {
            domain: "url.com".into(),
            secure: true,
            ..CookieConfig::default()
        };
        let cookie = SessionCookie::session(&config, "v".into(), 0, 5400);
        let value = set_cookie(&cookie).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "GFA=v; Domain=url.com; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; \
             Max-Age=5400; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn empty_domain_is_omitted() {
        let cookie = SessionCookie::cleared(&CookieConfig::default(), 0);
        let value = set_cookie(&cookie).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("GFA=; Path=/;"));
        assert!(value.contains("Max-Age=0"));
        assert!(!value.contains("Secure"));
    }
}
