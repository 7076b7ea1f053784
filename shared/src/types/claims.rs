use serde::{Deserialize, Serialize};

/// Issuer written into every session token.
pub const ISSUER: &str = "GFA";

/// Claims embedded in every session token issued by the gateway.
///
/// The token is the whole session: there is no server-side table, so
/// everything needed to decide allow/deny travels in here and is protected
/// by the HMAC signature only.
///
/// A claims value is never patched in place. A refresh builds a brand new
/// one with a fresh `jti` and a fresh `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Standard JWT subject, set to the username.
    pub sub: String,

    /// Client IP the session is pinned to, or the process MagicIp sentinel
    /// for sessions that opted out of IP pinning at login.
    pub ip: String,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,

    /// Not-before (Unix timestamp, seconds).
    pub nbf: i64,

    /// Standard JWT expiry (Unix timestamp, seconds).
    pub exp: i64,

    pub iss: String,

    /// Domain patterns this session may reach (regex suffixes).
    #[serde(default)]
    pub aud: Vec<String>,

    /// Random nonce, URL-safe base64 of at least 30 bytes.
    pub jti: String,
}

impl SessionClaims {
    /// `true` when the identity fields a token must carry are all present.
    pub fn has_identity(&self) -> bool {
        !self.sub.is_empty() && !self.ip.is_empty() && !self.jti.is_empty()
    }

    /// Seconds left before `exp`, negative once expired.
    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.exp - now
    }

    /// `nbf <= now <= exp`
    pub fn is_current(&self, now: i64) -> bool {
        self.nbf <= now && now <= self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> SessionClaims {
        SessionClaims {
            sub: "admin".to_string(),
            ip: "1.2.3.4".to_string(),
            iat: 1_000,
            nbf: 1_000,
            exp: 2_000,
            iss: ISSUER.to_string(),
            aud: vec!["url.com".to_string()],
            jti: "nonce".to_string(),
        }
    }

    #[test]
    fn identity_requires_sub_ip_and_jti() {
        assert!(claims().has_identity());

        let mut c = claims();
        c.sub.clear();
        assert!(!c.has_identity());

        let mut c = claims();
        c.ip.clear();
        assert!(!c.has_identity());

        let mut c = claims();
        c.jti.clear();
        assert!(!c.has_identity());
    }

    #[test]
    fn validity_window_is_inclusive() {
        let c = claims();
        assert!(!c.is_current(999));
        assert!(c.is_current(1_000));
        assert!(c.is_current(2_000));
        assert!(!c.is_current(2_001));
    }

    #[test]
    fn remaining_goes_negative_after_expiry() {
        let c = claims();
        assert_eq!(c.remaining_secs(1_500), 500);
        assert_eq!(c.remaining_secs(2_500), -500);
    }
}
