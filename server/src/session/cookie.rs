use shared::types::CookieConfig;

/// A `Set-Cookie` to send back: the session cookie, its clearing
/// counterpart, or the CSRF cookie. Always `SameSite=Lax`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix timestamp, seconds. `None` for a browser-session cookie.
    pub expires_at: Option<i64>,
    pub max_age: Option<i64>,
}

impl SessionCookie {
    /// Cookie carrying a freshly signed token.
    pub fn session(config: &CookieConfig, value: String, expires_at: i64, max_age: i64) -> Self {
        Self {
            name: config.name.clone(),
            value,
            domain: config.domain.clone(),
            path: config.path.clone(),
            secure: config.secure,
            http_only: true,
            expires_at: Some(expires_at),
            max_age: Some(max_age),
        }
    }

    /// Empty, immediately expired session cookie. The only way to log out.
    pub fn cleared(config: &CookieConfig, now: i64) -> Self {
        Self {
            name: config.name.clone(),
            value: String::new(),
            domain: config.domain.clone(),
            path: config.path.clone(),
            secure: config.secure,
            http_only: true,
            expires_at: Some(now),
            max_age: Some(0),
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.value.is_empty() && self.max_age == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_takes_name_domain_and_security_from_config() {
        let config = CookieConfig {
            name: "GFA".into(),
            domain: "url.com".into(),
            path: "/".into(),
            secure: true,
        };
        let c = SessionCookie::session(&config, "tok".into(), 5_400, 5_400);
        assert_eq!(c.name, "GFA");
        assert_eq!(c.domain, "url.com");
        assert!(c.secure);
        assert!(c.http_only);
        assert!(!c.is_cleared());

        let gone = SessionCookie::cleared(&config, 10);
        assert!(gone.is_cleared());
        assert_eq!(gone.expires_at, Some(10));
    }
}
