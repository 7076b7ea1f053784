use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use shared::types::claims::ISSUER;
use shared::types::{AuthConfig, CookieConfig, SessionClaims};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::cookie::SessionCookie;
use crate::security::{domain, random};

/// The only algorithm tokens are signed with and the only one accepted.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Bytes of randomness in every token id.
pub const NONCE_LEN: usize = 30;

/// Bytes of randomness in the MagicIp sentinel.
pub const MAGIC_IP_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no session cookie")]
    Missing,

    #[error("entropy source failed: {0}")]
    Entropy(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("refusing to issue a token with an empty audience")]
    EmptyAudience,

    #[error("unexpected signing algorithm {0:?}")]
    UnexpectedAlgorithm(Algorithm),

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token outside its validity window")]
    Expired,

    #[error("missing username or ip or id")]
    MissingIdentity,

    #[error("ip doesn't match")]
    IpMismatch,

    #[error("domain not allowed")]
    DomainNotAllowed,
}

/// Issues and checks the signed session tokens.
///
/// Holds the HMAC key, the token lifetime, the cookie attributes and the
/// MagicIp sentinel. Everything is fixed at construction, so one engine is
/// shared by every request task.
pub struct ClaimsEngine {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    token_expire: i64,
    refresh_threshold: i64,
    cookie: CookieConfig,
    magic_ip: String,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ClaimsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsEngine")
            .field("token_expire", &self.token_expire)
            .field("refresh_threshold", &self.refresh_threshold)
            .field("cookie", &self.cookie.name)
            .finish_non_exhaustive()
    }
}

impl ClaimsEngine {
    pub fn new(
        secret: &[u8],
        auth: &AuthConfig,
        cookie: &CookieConfig,
        magic_ip: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // The validity window is checked against our own clock below.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        // `aud` holds domain patterns, matched by the domain matcher instead.
        validation.validate_aud = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            token_expire: auth.token_expire_secs(),
            refresh_threshold: auth.token_refresh_secs(),
            cookie: cookie.clone(),
            magic_ip,
            clock,
        }
    }

    /// Generate a fresh MagicIp sentinel from the OS random source.
    pub fn generate_magic_ip() -> Result<String, TokenError> {
        random::random_token(MAGIC_IP_LEN).map_err(|e| TokenError::Entropy(e.to_string()))
    }

    pub fn magic_ip(&self) -> &str {
        &self.magic_ip
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Sign a new session for `username` and wrap it in a cookie.
    pub fn issue(
        &self,
        username: &str,
        ip: &str,
        domains: &[String],
    ) -> Result<SessionCookie, TokenError> {
        if domains.is_empty() {
            return Err(TokenError::EmptyAudience);
        }

        let jti = random::random_token(NONCE_LEN).map_err(|e| TokenError::Entropy(e.to_string()))?;

        let now = self.clock.now();
        let claims = SessionClaims {
            sub: username.to_string(),
            ip: ip.to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.token_expire),
            iss: ISSUER.to_string(),
            aud: domains.to_vec(),
            jti,
        };

        let token = self.sign(&claims)?;
        debug!("Issued session token for {}", username);

        Ok(SessionCookie::session(
            &self.cookie,
            token,
            claims.exp,
            self.token_expire,
        ))
    }

    /// Serialize and sign a claims value.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        if !claims.has_identity() {
            return Err(TokenError::MissingIdentity);
        }

        encode(&Header::new(ALGORITHM), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Run the full check of a presented token, stopping at the first failure:
    /// presence, algorithm, signature, validity window, identity fields, IP
    /// binding, then domain authorization.
    pub fn verify(
        &self,
        token: Option<&str>,
        client_ip: &str,
        target_url: &str,
    ) -> Result<SessionClaims, TokenError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(TokenError::Missing)?;

        // "none" does not even parse as an algorithm; anything else but
        // HS256 is refused before the signature is looked at.
        let header = decode_header(token)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnexpectedAlgorithm(header.alg));
        }

        let claims = decode::<SessionClaims>(token, &self.decoding, &self.validation)?.claims;

        if !claims.is_current(self.clock.now()) {
            return Err(TokenError::Expired);
        }

        if !claims.has_identity() {
            return Err(TokenError::MissingIdentity);
        }

        if claims.ip != self.magic_ip && (client_ip.is_empty() || claims.ip != client_ip) {
            return Err(TokenError::IpMismatch);
        }

        if target_url.is_empty() || !domain::matches(&claims.aud, target_url) {
            return Err(TokenError::DomainNotAllowed);
        }

        Ok(claims)
    }

    /// Like [`verify`](Self::verify), but every failure collapses to `None`
    /// after being logged with the acting IP.
    pub fn validate(
        &self,
        token: Option<&str>,
        client_ip: &str,
        target_url: &str,
    ) -> Option<SessionClaims> {
        match self.verify(token, client_ip, target_url) {
            Ok(claims) => Some(claims),
            Err(TokenError::Missing) => {
                info!(ip = %client_ip, "No session cookie");
                None
            }
            Err(e) => {
                warn!(ip = %client_ip, url = %target_url, "Rejected session token: {}", e);
                None
            }
        }
    }

    /// `true` when the session is close enough to expiry to be reissued.
    pub fn needs_refresh(&self, claims: &SessionClaims) -> bool {
        claims.remaining_secs(self.clock.now()) < self.refresh_threshold
    }

    /// Immediately expiring, empty session cookie.
    pub fn clear_cookie(&self) -> SessionCookie {
        SessionCookie::cleared(&self.cookie, self.clock.now())
    }
}
