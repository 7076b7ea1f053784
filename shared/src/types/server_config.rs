use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Largest request body read when looking for form credentials.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PathsConfig {
    /// HTML page rendered for every answer. The built-in page is used when unset.
    #[serde(default)]
    pub html_file: Option<String>,
}

/// Argon2id cost parameters, tuned per deployment.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    #[serde(default = "default_hash_memory")]
    pub memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub parallelism: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token_expire")]
    pub token_expire_minutes: u64,
    /// A valid session with less than this left is reissued.
    #[serde(default = "default_token_refresh")]
    pub token_refresh_minutes: u64,
    /// HMAC key used to sign and verify session tokens.
    ///
    /// The `JWT_SECRET` environment variable takes priority. When neither is
    /// set the gateway generates a random key at startup.
    ///
    /// **Minimum length:** 32 characters.
    pub jwt_secret: Option<String>,
    /// Fixed pause before answering any failed authentication.
    #[serde(default = "default_failure_delay")]
    pub failure_delay_ms: u64,
    /// Require the double-submit CSRF token on credentials posted in a body.
    #[serde(default = "default_true")]
    pub csrf_protect: bool,
    #[serde(default)]
    pub hash: HashConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Set when clients reach the gateway over TLS (usually terminated upstream).
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// One entry of the user directory.
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    /// PHC-format Argon2 hash, as printed by `gateway --hash`.
    pub password_hash: String,
    /// Regex suffix patterns of the domains this user may reach.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Whether the user may request a session that is not pinned to an IP.
    #[serde(default)]
    pub allow_any_ip: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub users: HashMap<String, UserConfig>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"0.0.0.0:8000"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn minutes_to_secs(minutes: u64) -> i64 {
    i64::try_from(minutes.saturating_mul(60)).unwrap_or(i64::MAX)
}

impl AuthConfig {
    pub fn token_expire_secs(&self) -> i64 {
        minutes_to_secs(self.token_expire_minutes)
    }

    pub fn token_refresh_secs(&self) -> i64 {
        minutes_to_secs(self.token_refresh_minutes)
    }

    /// Resolve the JWT secret with `JWT_SECRET` env-var taking priority over
    /// the config file field.
    pub fn resolved_jwt_secret(&self) -> Option<String> {
        std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.jwt_secret.clone())
            .filter(|s| !s.is_empty())
    }
}

impl CookieConfig {
    /// Name of the cookie carrying the CSRF token.
    pub fn csrf_name(&self) -> String {
        format!("{}_csrf", self.name)
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_hash_memory(),
            iterations: default_hash_iterations(),
            parallelism: default_hash_parallelism(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_expire_minutes: default_token_expire(),
            token_refresh_minutes: default_token_refresh(),
            jwt_secret: None,
            failure_delay_ms: default_failure_delay(),
            csrf_protect: true,
            hash: HashConfig::default(),
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            domain: String::new(),
            path: default_cookie_path(),
            secure: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub fn default_port() -> u16 {
    8000
}

pub fn default_request_timeout() -> u64 {
    10
}

pub fn default_max_body_bytes() -> usize {
    16 * 1024
}

pub fn default_token_expire() -> u64 {
    90
}

pub fn default_token_refresh() -> u64 {
    45
}

pub fn default_failure_delay() -> u64 {
    500
}

pub fn default_hash_memory() -> u32 {
    19 * 1024
}

pub fn default_hash_iterations() -> u32 {
    2
}

pub fn default_hash_parallelism() -> u32 {
    1
}

pub fn default_cookie_name() -> String {
    "GFA".to_string()
}

pub fn default_cookie_path() -> String {
    "/".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
