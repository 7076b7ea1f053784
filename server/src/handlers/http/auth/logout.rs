use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response};
use tracing::info;

use crate::AppState;
use crate::handlers::http::utils::deliver_redirect;
use crate::handlers::http::utils::headers;

/// Handle logout: always a 302 to `/`. A present session cookie is cleared,
/// otherwise the failure delay is served so both cases take as long.
pub async fn handle_logout<B: Send>(
    req: Request<B>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let peer = req.extensions().get::<SocketAddr>().copied();
    let ip = headers::client_ip(req.headers(), peer);

    let has_session = headers::get_cookie(req.headers(), &state.config.cookie.name)
        .is_some_and(|v| !v.is_empty());

    if has_session {
        info!(ip = %ip, "Logout");
        let cookie = state.authenticator.engine().clear_cookie();
        return deliver_redirect("/", Some(headers::set_cookie(&cookie)?));
    }

    info!(ip = %ip, "Logout without session");
    tokio::time::sleep(state.failure_delay).await;
    deliver_redirect("/", None)
}
