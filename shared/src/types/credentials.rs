use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Login wire type
// ---------------------------------------------------------------------------

/// A username/password pair submitted for one request.
///
/// Lives only for the duration of that request. `Debug` never prints the
/// password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Value of the `csrf` field, empty when absent.
    pub csrf_token: String,
    /// Value of the `action` field, informational only.
    pub action: String,
    /// Client asked for a session that is not pinned to its IP (`anyip=on`).
    pub any_ip: bool,
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

impl Credentials {
    /// Decode an `application/x-www-form-urlencoded` payload
    /// (`username=..&password=..&csrf=..&action=..[&anyip=on]`).
    ///
    /// Username and password are required and must be non-empty. Unknown
    /// fields are ignored; for repeated fields the first occurrence wins.
    pub fn from_urlencoded(input: &[u8]) -> Result<Self, CredentialsError> {
        let mut params: HashMap<String, String> = HashMap::new();
        for (key, value) in form_urlencoded::parse(input).into_owned() {
            params.entry(key).or_insert(value);
        }

        let username = params
            .remove("username")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(CredentialsError::MissingField("username"))?;

        let password = params
            .remove("password")
            .filter(|p| !p.is_empty())
            .ok_or(CredentialsError::MissingField("password"))?;

        let any_ip = params
            .get("anyip")
            .map(|v| v == "on" || v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            username,
            password,
            csrf_token: params.remove("csrf").unwrap_or_default(),
            action: params.remove("action").unwrap_or_default(),
            any_ip,
        })
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("action", &self.action)
            .field("any_ip", &self.any_ip)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_fields() {
        let c = Credentials::from_urlencoded(
            b"username=admin&password=p%40ss+word&csrf=tok&action=login&anyip=on",
        )
        .unwrap();
        assert_eq!(c.username, "admin");
        assert_eq!(c.password, "p@ss word");
        assert_eq!(c.csrf_token, "tok");
        assert_eq!(c.action, "login");
        assert!(c.any_ip);
    }

    #[test]
    fn any_ip_defaults_to_false() {
        let c = Credentials::from_urlencoded(b"username=a&password=b").unwrap();
        assert!(!c.any_ip);
        assert!(c.csrf_token.is_empty());
    }

    #[test]
    fn missing_username_is_an_error() {
        assert_eq!(
            Credentials::from_urlencoded(b"password=b"),
            Err(CredentialsError::MissingField("username"))
        );
        assert_eq!(
            Credentials::from_urlencoded(b"username=+&password=b"),
            Err(CredentialsError::MissingField("username"))
        );
    }

    #[test]
    fn missing_password_is_an_error() {
        assert_eq!(
            Credentials::from_urlencoded(b"username=a&password="),
            Err(CredentialsError::MissingField("password"))
        );
        assert_eq!(
            Credentials::from_urlencoded(b""),
            Err(CredentialsError::MissingField("username"))
        );
    }

    #[test]
    fn debug_output_redacts_password() {
        let c = Credentials::from_urlencoded(b"username=a&password=hunter2").unwrap();
        let printed = format!("{:?}", c);
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("hunter2"));
    }
}
