//! Forward-auth gateway.
//!
//! A reverse proxy asks the gateway about every request. The gateway answers
//! from the signed session cookie alone: 200 when the session is good, 300
//! with a new cookie after a login or a refresh, 401 when nobody is signed in
//! and 403 when the session does not cover the requested domain.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use shared::config::MIN_SECRET_LEN;
use shared::types::AppConfig;
use tracing::{info, warn};

pub mod handlers;
pub mod security;
pub mod session;
pub mod tower_middle;

use handlers::http::utils::{CsrfGuard, PageTemplate};
use security::{PasswordHasher, domain, random};
use session::{Clock, ClaimsEngine, RequestAuthenticator, SystemClock, UserDirectory};

/// Bytes of the signing key generated when none is configured.
const GENERATED_SECRET_LEN: usize = 64;

/// Everything a request handler needs, built once at startup and cloned into
/// every connection task.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub authenticator: RequestAuthenticator,
    pub page: Arc<PageTemplate>,
    pub csrf: CsrfGuard,
    pub failure_delay: Duration,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let secret = match config.auth.resolved_jwt_secret() {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                bail!("JWT secret must be at least {} characters long", MIN_SECRET_LEN)
            }
            Some(secret) => secret.into_bytes(),
            None => {
                warn!("No JWT secret configured, generating one: sessions will not survive a restart");
                random::random_bytes(GENERATED_SECRET_LEN)
                    .context("Failed to generate JWT secret")?
            }
        };

        for (name, user) in &config.users {
            domain::check_patterns(&user.allowed_domains)
                .with_context(|| format!("Invalid domain pattern for user {}", name))?;
        }

        let hasher =
            PasswordHasher::new(&config.auth.hash).context("Invalid password hash parameters")?;
        let users = UserDirectory::new(&config.users, hasher)
            .context("Failed to prepare user directory")?;
        if users.is_empty() {
            warn!("No user configured, every login will fail");
        }

        let magic_ip = ClaimsEngine::generate_magic_ip().context("Failed to generate MagicIp")?;
        let engine = ClaimsEngine::new(&secret, &config.auth, &config.cookie, magic_ip, clock);

        let page = PageTemplate::load(config.paths.html_file.as_deref())?;
        let csrf = CsrfGuard::new(&config.cookie, config.auth.csrf_protect);
        let failure_delay = Duration::from_millis(config.auth.failure_delay_ms);

        info!(users = users.len(), "Gateway state ready");

        Ok(Self {
            authenticator: RequestAuthenticator::new(Arc::new(engine), Arc::new(users)),
            page: Arc::new(page),
            csrf,
            failure_delay,
            config: Arc::new(config),
        })
    }
}
