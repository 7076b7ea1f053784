use std::sync::Arc;

use http::StatusCode;
use shared::types::{Credentials, SessionClaims};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::claims::{ClaimsEngine, TokenError};
use super::cookie::SessionCookie;
use super::users::UserDirectory;

pub const BAD_CREDENTIALS: &str = "Bad credentials";
pub const RESTRICTED_AREA: &str = "Restricted Area";

/// Where a request ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No valid session.
    Out,
    /// Valid session, nothing to renew.
    In,
    /// Session issued or renewed, a new cookie goes out.
    InRefreshed,
    /// Explicit rejection.
    Denied,
}

impl AuthState {
    pub fn status(self) -> StatusCode {
        match self {
            AuthState::Out => StatusCode::UNAUTHORIZED,
            AuthState::In => StatusCode::OK,
            AuthState::InRefreshed => StatusCode::MULTIPLE_CHOICES,
            AuthState::Denied => StatusCode::FORBIDDEN,
        }
    }

    pub fn is_in(self) -> bool {
        matches!(self, AuthState::In | AuthState::InRefreshed)
    }

    /// Failed states are answered only after the failure delay.
    pub fn is_failure(self) -> bool {
        !self.is_in()
    }

    /// Value handed to the page renderer.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthState::Out => "out",
            AuthState::In | AuthState::InRefreshed => "in",
            AuthState::Denied => "denied",
        }
    }
}

/// Outcome of one request: state, cookie to set and identity to forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub state: AuthState,
    pub cookie: Option<SessionCookie>,
    pub subject: Option<String>,
    pub message: Option<&'static str>,
}

impl Decision {
    fn out(message: Option<&'static str>) -> Self {
        Self {
            state: AuthState::Out,
            cookie: None,
            subject: None,
            message,
        }
    }

    fn denied(cookie: Option<SessionCookie>) -> Self {
        Self {
            state: AuthState::Denied,
            cookie,
            subject: None,
            message: Some(RESTRICTED_AREA),
        }
    }

    fn signed_in(subject: &str) -> Self {
        Self {
            state: AuthState::In,
            cookie: None,
            subject: Some(subject.to_string()),
            message: None,
        }
    }

    fn refreshed(subject: &str, cookie: SessionCookie) -> Self {
        Self {
            state: AuthState::InRefreshed,
            cookie: Some(cookie),
            subject: Some(subject.to_string()),
            message: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.state.status()
    }
}

/// Everything the decision depends on, already pulled out of the request.
#[derive(Debug, Clone, Default)]
pub struct AuthInput {
    pub session_token: Option<String>,
    pub credentials: Option<Credentials>,
    pub client_ip: String,
    pub target_url: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not issue session: {0}")]
    Issue(#[from] TokenError),
}

/// Drives the per-request state machine over the claims engine and the
/// user directory. No I/O happens here.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    engine: Arc<ClaimsEngine>,
    users: Arc<UserDirectory>,
}

impl RequestAuthenticator {
    pub fn new(engine: Arc<ClaimsEngine>, users: Arc<UserDirectory>) -> Self {
        Self { engine, users }
    }

    pub fn engine(&self) -> &ClaimsEngine {
        &self.engine
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    /// Decide what to answer. Runs Argon2 on the login path, so call it off
    /// the async executor.
    pub fn authenticate(&self, input: &AuthInput) -> Result<Decision, AuthError> {
        let token = input.session_token.as_deref().filter(|t| !t.is_empty());

        match self
            .engine
            .validate(token, &input.client_ip, &input.target_url)
        {
            Some(claims) if self.engine.needs_refresh(&claims) => self.refresh(&claims, input),
            Some(claims) => {
                debug!("Valid session for {}", claims.sub);
                Ok(Decision::signed_in(&claims.sub))
            }
            None => match &input.credentials {
                Some(creds) => self.login(creds, input),
                // A cookie was sent but did not hold up.
                None if token.is_some() => Ok(Decision::denied(None)),
                None => Ok(Decision::out(None)),
            },
        }
    }

    fn login(&self, creds: &Credentials, input: &AuthInput) -> Result<Decision, AuthError> {
        let user = match self.users.authenticate(creds) {
            Ok(user) => user,
            Err(e) => {
                warn!(ip = %input.client_ip, "Login failed: {}", e);
                return Ok(Decision::out(Some(BAD_CREDENTIALS)));
            }
        };

        if !user.allowed(&input.target_url) {
            warn!(ip = %input.client_ip, "Login refused for {}: domain not allowed", user.username);
            return Ok(Decision::out(Some(BAD_CREDENTIALS)));
        }

        let ip = if creds.any_ip && user.allow_any_ip {
            info!("{} requested a session valid from any IP", user.username);
            self.engine.magic_ip()
        } else {
            if creds.any_ip {
                warn!("{} asked for any IP but is not allowed to", user.username);
            }
            input.client_ip.as_str()
        };

        if ip.is_empty() {
            warn!("Login refused for {}: unknown client ip", user.username);
            return Ok(Decision::out(Some(BAD_CREDENTIALS)));
        }

        let cookie = self.engine.issue(&user.username, ip, &user.allowed_domains)?;
        info!(ip = %input.client_ip, "{} logged in", user.username);
        Ok(Decision::refreshed(&user.username, cookie))
    }

    fn refresh(&self, claims: &SessionClaims, input: &AuthInput) -> Result<Decision, AuthError> {
        let Some(user) = self.users.get(&claims.sub) else {
            warn!(ip = %input.client_ip, "Refresh refused: {} no longer exists", claims.sub);
            return Ok(Decision::denied(Some(self.engine.clear_cookie())));
        };

        let cookie = match self.engine.issue(&user.username, &claims.ip, &user.allowed_domains) {
            Ok(cookie) => cookie,
            Err(TokenError::EmptyAudience) => {
                warn!(ip = %input.client_ip, "Refresh refused: {} has no domain left", user.username);
                return Ok(Decision::denied(None));
            }
            Err(e) => return Err(e.into()),
        };

        if self
            .engine
            .validate(Some(&cookie.value), &input.client_ip, &input.target_url)
            .is_none()
        {
            warn!(ip = %input.client_ip, "Refresh refused: {} lost access to {}", user.username, input.target_url);
            return Ok(Decision::denied(None));
        }

        debug!("Refreshed session for {}", user.username);
        Ok(Decision::refreshed(&user.username, cookie))
    }
}
