pub mod claims;
pub mod credentials;
pub mod server_config;

pub use self::claims::SessionClaims;
pub use self::credentials::{Credentials, CredentialsError};
pub use self::server_config::{
    AppConfig, AuthConfig, ConfigError, CookieConfig, HashConfig, LogConfig, PathsConfig,
    ServerConfig, UserConfig,
};
