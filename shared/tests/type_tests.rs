/// Integration-level tests for the `shared` crate.
///
/// Each section tests one module; unit tests that are tightly coupled to
/// private helpers live inside the modules themselves (see `#[cfg(test)]`
/// blocks in `config.rs`, `claims.rs` and `credentials.rs`).
// ---------------------------------------------------------------------------
// Session claims
// ---------------------------------------------------------------------------
#[cfg(test)]
mod claims_tests {
    use shared::types::claims::ISSUER;
    use shared::types::*;

    fn sample_claims() -> SessionClaims {
        SessionClaims {
            sub: "alice".to_string(),
            ip: "10.0.0.1".to_string(),
            iat: 1_700_000_000,
            nbf: 1_700_000_000,
            exp: 1_700_005_400,
            iss: ISSUER.to_string(),
            aud: vec!["url.com".to_string(), ".*example.com".to_string()],
            jti: "bm9uY2U".to_string(),
        }
    }

    #[test]
    fn claims_json_uses_registered_claim_names() {
        let json = serde_json::to_value(sample_claims()).unwrap();
        for key in &["sub", "ip", "iat", "nbf", "exp", "iss", "aud", "jti"] {
            assert!(json.get(key).is_some(), "missing key: {}", key);
        }
        assert_eq!(json["aud"][1], ".*example.com");
    }

    #[test]
    fn audience_is_optional_on_the_wire() {
        let json = r#"{"sub":"a","ip":"b","iat":1,"nbf":1,"exp":2,"iss":"GFA","jti":"c"}"#;
        let claims: SessionClaims = serde_json::from_str(json).unwrap();
        assert!(claims.aud.is_empty());
        assert!(claims.has_identity());
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------
#[cfg(test)]
mod credentials_tests {
    use shared::types::*;

    #[test]
    fn form_encoding_is_decoded() {
        let creds =
            Credentials::from_urlencoded(b"username=j%C3%BCrgen&password=p%26ss&anyip=on").unwrap();
        assert_eq!(creds.username, "jürgen");
        assert_eq!(creds.password, "p&ss");
        assert!(creds.any_ip);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(Credentials::from_urlencoded(b"").is_err());
    }
}

// ---------------------------------------------------------------------------
// Configuration loading
// ---------------------------------------------------------------------------
#[cfg(test)]
mod config_tests {
    use std::io::Write;

    use shared::config::load_config;
    use shared::types::ConfigError;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn full_file_is_loaded() {
        let file = write_config(
            r#"
[server]
bind = "0.0.0.0"
port = 9091

[paths]
html_file = "/srv/gateway/index.html"

[auth]
token_expire_minutes = 60
token_refresh_minutes = 10
failure_delay_ms = 250

[cookie]
name = "SESSION"
domain = "example.com"
secure = true

[users.admin]
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
allowed_domains = [".*example.com"]
allow_any_ip = true
"#,
        );

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:9091");
        assert_eq!(config.paths.html_file.as_deref(), Some("/srv/gateway/index.html"));
        assert_eq!(config.auth.token_expire_secs(), 3600);
        assert_eq!(config.auth.token_refresh_secs(), 600);
        assert_eq!(config.auth.failure_delay_ms, 250);
        assert_eq!(config.cookie.csrf_name(), "SESSION_csrf");
        assert!(config.cookie.secure);

        let admin = &config.users["admin"];
        assert_eq!(admin.allowed_domains, vec![".*example.com"]);
        assert!(admin.allow_any_ip);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_config(path.to_str().unwrap()),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn blank_file_is_invalid() {
        let file = write_config("   \n");
        assert!(matches!(
            load_config(file.path().to_str().unwrap()),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn user_without_hash_is_invalid() {
        let file = write_config(
            r#"
[server]
bind = "127.0.0.1"

[users.bob]
password_hash = ""
"#,
        );
        assert!(matches!(
            load_config(file.path().to_str().unwrap()),
            Err(ConfigError::InvalidConfig(_))
        ));
    }
}
