pub mod config;

pub use self::config::{MAX_TOKEN_EXPIRE_MINUTES, MIN_SECRET_LEN, load_config, parse_config};
