use http::{HeaderMap, Method, header};
use shared::types::{Credentials, CredentialsError};
use thiserror::Error;
use tracing::debug;

/// Header an upstream proxy fills with URL-encoded login form fields.
pub const AUTH_FORM_HEADER: &str = "auth-form";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no Auth-Form header")]
    MissingHeader,

    #[error("Auth-Form header is not valid text")]
    UnreadableHeader,

    #[error("you must send data via post")]
    NotPost,

    #[error("body is not url-encoded form data")]
    NotForm,

    #[error("error decoding form data: {0}")]
    Decode(#[from] CredentialsError),
}

/// Where a set of credentials was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Header,
    Body,
}

/// Read credentials from the `Auth-Form` header.
pub fn from_header(headers: &HeaderMap) -> Result<Credentials, ExtractError> {
    let raw = headers
        .get(AUTH_FORM_HEADER)
        .ok_or(ExtractError::MissingHeader)?
        .to_str()
        .map_err(|_| ExtractError::UnreadableHeader)?;

    Ok(Credentials::from_urlencoded(raw.as_bytes())?)
}

/// Read credentials from a POSTed `application/x-www-form-urlencoded` body.
pub fn from_body(
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Credentials, ExtractError> {
    if method != Method::POST {
        return Err(ExtractError::NotPost);
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false);
    if !is_form {
        return Err(ExtractError::NotForm);
    }

    Ok(Credentials::from_urlencoded(body)?)
}

/// Header first, body second. When both fail the body error is returned.
pub fn from_request(
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(Credentials, CredentialSource), ExtractError> {
    match from_header(headers) {
        Ok(creds) => Ok((creds, CredentialSource::Header)),
        Err(e) => {
            debug!("Credentials: error from header: {}", e);
            from_body(method, headers, body).map(|creds| (creds, CredentialSource::Body))
        }
    }
}
