use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Limited, combinators::BoxBody};
use hyper::body::Body;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, Response};
use tracing::{debug, error, warn};

use crate::AppState;
use crate::handlers::http::utils::headers::{self as h, REMOTE_USER};
use crate::handlers::http::utils::{CsrfToken, deliver_page, internal_error};
use crate::session::credentials::{self, CredentialSource};
use crate::session::{AuthInput, Decision};

/// Collect at most `limit` bytes. Anything unreadable counts as no body.
async fn read_body<B>(body: B, limit: usize) -> Bytes
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Ignoring request body: {}", e);
            Bytes::new()
        }
    }
}

/// The forward-auth check. Every path except `/logout` lands here.
pub async fn handle_home<B>(
    req: Request<B>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let peer = req.extensions().get::<SocketAddr>().copied();
    let (parts, body) = req.into_parts();

    let client_ip = h::client_ip(&parts.headers, peer);
    let target_url = h::target_url(&parts.headers);
    let session_token = h::get_cookie(&parts.headers, &state.config.cookie.name);
    let csrf = state
        .csrf
        .token(&parts.headers)
        .context("Failed to generate CSRF token")?;

    let body = if parts.method == Method::POST {
        read_body(body, state.config.server.max_body_bytes).await
    } else {
        Bytes::new()
    };

    let credentials = match credentials::from_request(&parts.method, &parts.headers, &body) {
        Ok((creds, CredentialSource::Body)) if !state.csrf.verify(&csrf, &creds.csrf_token) => {
            warn!(ip = %client_ip, "Credentials ignored: bad CSRF token");
            None
        }
        Ok((creds, _)) => Some(creds),
        Err(e) => {
            debug!(ip = %client_ip, "No credentials: {}", e);
            None
        }
    };

    let input = AuthInput {
        session_token,
        credentials,
        client_ip: client_ip.clone(),
        target_url,
    };

    // Argon2 is CPU-bound, keep it off the reactor.
    let authenticator = state.authenticator.clone();
    let outcome = tokio::task::spawn_blocking(move || authenticator.authenticate(&input))
        .await
        .context("Authentication task failed")?;

    let decision = match outcome {
        Ok(decision) => decision,
        Err(e) => {
            error!(ip = %client_ip, "{}", e);
            return Ok(internal_error());
        }
    };

    if decision.state.is_failure() {
        tokio::time::sleep(state.failure_delay).await;
    }

    respond(&state, &decision, &csrf, &client_ip)
}

fn respond(
    state: &AppState,
    decision: &Decision,
    csrf: &CsrfToken,
    client_ip: &str,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let data = [
        ("username", decision.subject.as_deref().unwrap_or_default()),
        ("state", decision.state.as_str()),
        ("csrf", csrf.value.as_str()),
        ("ip", client_ip),
        ("error", decision.message.unwrap_or_default()),
    ];

    let mut response = deliver_page(&state.page, decision.status(), &data)?;
    let headers = response.headers_mut();

    if decision.state.is_in() {
        if let Some(subject) = &decision.subject {
            let value = HeaderValue::from_str(subject).context("Invalid Remote-User value")?;
            headers.insert(REMOTE_USER, value);
        }
    }

    if let Some(cookie) = &decision.cookie {
        headers.append(header::SET_COOKIE, h::set_cookie(cookie)?);
    }

    if csrf.fresh {
        headers.append(header::SET_COOKIE, h::set_cookie(&state.csrf.cookie(csrf))?);
    }

    Ok(response)
}
