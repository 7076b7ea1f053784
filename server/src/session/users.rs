use std::collections::HashMap;

use shared::types::{Credentials, UserConfig};
use thiserror::Error;
use tracing::{info, warn};

use crate::security::{PasswordError, PasswordHasher, domain};

/// Password hashed at startup and checked when the username is unknown, so
/// both failure paths cost one Argon2 verification.
const DUMMY_PASSWORD: &str = "gateway-dummy-password";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// Same answer for "no users", "no such user" and "wrong password".
    /// Only the logs tell them apart.
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// A configured user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub allowed_domains: Vec<String>,
    pub allow_any_ip: bool,
}

impl User {
    /// `true` when one of the user's domain patterns covers `url`.
    pub fn allowed(&self, url: &str) -> bool {
        let ok = domain::matches(&self.allowed_domains, url);
        if !ok {
            warn!("User {} not allowed on {}", self.username, url);
        }
        ok
    }
}

/// Read-only user table, loaded once from configuration.
#[derive(Debug)]
pub struct UserDirectory {
    users: HashMap<String, User>,
    hasher: PasswordHasher,
    dummy_hash: String,
}

impl UserDirectory {
    pub fn new(
        users: &HashMap<String, UserConfig>,
        hasher: PasswordHasher,
    ) -> Result<Self, PasswordError> {
        let users = users
            .iter()
            .map(|(name, u)| {
                (
                    name.clone(),
                    User {
                        username: name.clone(),
                        password_hash: u.password_hash.clone(),
                        allowed_domains: u.allowed_domains.clone(),
                        allow_any_ip: u.allow_any_ip,
                    },
                )
            })
            .collect();

        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;

        Ok(Self {
            users,
            hasher,
            dummy_hash,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn get(&self, username: &str) -> Option<&User> {
        if self.users.is_empty() {
            info!("No user configured");
            return None;
        }
        self.users.get(username)
    }

    /// Check submitted credentials against the stored hash.
    pub fn authenticate(&self, creds: &Credentials) -> Result<&User, CredentialError> {
        if self.users.is_empty() {
            warn!("Credentials rejected: no user available");
            return Err(CredentialError::InvalidCredentials);
        }

        let user = match self.users.get(&creds.username) {
            Some(user) if !user.password_hash.is_empty() => user,
            _ => {
                // Burn the same time as a real check.
                let _ = self.hasher.verify(&creds.password, &self.dummy_hash);
                info!(username = %creds.username, "Credentials rejected: user not found");
                return Err(CredentialError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(&creds.password, &user.password_hash) {
            warn!(username = %creds.username, "Credentials rejected: bad password");
            return Err(CredentialError::InvalidCredentials);
        }

        Ok(user)
    }
}
