//! Types shared between the gateway library, its binary and its tests.
//!
//! `types` holds the session and credential wire types plus the configuration
//! structs; `config` loads and validates the TOML configuration file.

pub mod config;
pub mod types;
