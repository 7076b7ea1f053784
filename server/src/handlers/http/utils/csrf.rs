use hyper::header::HeaderMap;
use shared::types::CookieConfig;
use tracing::{debug, warn};

use super::headers;
use crate::security::random;
use crate::session::SessionCookie;

/// Bytes of randomness in a CSRF token.
pub const CSRF_TOKEN_LEN: usize = 32;

/// CSRF token for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub value: String,
    /// `true` when the request carried no token and a cookie must be set.
    pub fresh: bool,
}

/// Double-submit CSRF check: the token lives in a cookie and must be echoed
/// back in the `csrf` form field.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    cookie: CookieConfig,
    enabled: bool,
}

impl CsrfGuard {
    pub fn new(cookie: &CookieConfig, enabled: bool) -> Self {
        Self {
            cookie: CookieConfig {
                name: cookie.csrf_name(),
                ..cookie.clone()
            },
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Token from the request cookie, or a new one.
    pub fn token(&self, headers: &HeaderMap) -> Result<CsrfToken, rand::Error> {
        if let Some(value) = headers::get_cookie(headers, &self.cookie.name).filter(|v| !v.is_empty())
        {
            return Ok(CsrfToken {
                value,
                fresh: false,
            });
        }

        debug!("Issuing new CSRF token");
        Ok(CsrfToken {
            value: random::random_token(CSRF_TOKEN_LEN)?,
            fresh: true,
        })
    }

    /// Browser-session cookie carrying `token`.
    pub fn cookie(&self, token: &CsrfToken) -> SessionCookie {
        SessionCookie {
            name: self.cookie.name.clone(),
            value: token.value.clone(),
            domain: self.cookie.domain.clone(),
            path: self.cookie.path.clone(),
            secure: self.cookie.secure,
            http_only: true,
            expires_at: None,
            max_age: None,
        }
    }

    /// `true` when `submitted` matches the cookie token. A freshly minted
    /// token never matches: the form could not have known it.
    pub fn verify(&self, token: &CsrfToken, submitted: &str) -> bool {
        if !self.enabled {
            return true;
        }
        if token.fresh || submitted.is_empty() {
            warn!("CSRF token missing");
            return false;
        }
        random::constant_time_eq(&token.value, submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn guard(enabled: bool) -> CsrfGuard {
        CsrfGuard::new(&CookieConfig::default(), enabled)
    }

    #[test]
    fn token_is_read_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("GFA=x; GFA_csrf=abc"));
        let token = guard(true).token(&headers).unwrap();
        assert_eq!(token.value, "abc");
        assert!(!token.fresh);
    }

    #[test]
    fn missing_cookie_gives_a_fresh_token() {
        let g = guard(true);
        let token = g.token(&HeaderMap::new()).unwrap();
        assert!(token.fresh);
        assert_eq!(token.value.len(), 43);

        let cookie = g.cookie(&token);
        assert_eq!(cookie.name, "GFA_csrf");
        assert!(cookie.http_only);
        assert_eq!(cookie.max_age, None);
    }

    #[test]
    fn verify_compares_submitted_value() {
        let g = guard(true);
        let token = CsrfToken {
            value: "abc".into(),
            fresh: false,
        };
        assert!(g.verify(&token, "abc"));
        assert!(!g.verify(&token, "abd"));
        assert!(!g.verify(&token, ""));

        let fresh = CsrfToken { fresh: true, ..token };
        assert!(!g.verify(&fresh, "abc"));
    }

    #[test]
    fn disabled_guard_accepts_anything() {
        let token = CsrfToken {
            value: "abc".into(),
            fresh: true,
        };
        assert!(guard(false).verify(&token, ""));
    }
}
