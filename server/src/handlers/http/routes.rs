use std::convert::Infallible;
use std::error::Error as StdError;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Body;
use hyper::{Request, Response};
use tracing::{debug, error};

use crate::AppState;
use crate::handlers::http::auth::{handle_home, handle_logout};
use crate::handlers::http::utils::internal_error;

pub const LOGOUT_PATH: &str = "/logout";

/// `true` when `request_path`, query string aside, is `route_path`.
/// A single trailing slash is tolerated.
pub fn path_matches(route_path: &str, request_path: &str) -> bool {
    let clean = request_path.split('?').next().unwrap_or(request_path);
    let clean = if clean.len() > 1 {
        clean.strip_suffix('/').unwrap_or(clean)
    } else {
        clean
    };
    route_path == clean
}

/// Dispatch: `/logout` to the logout handler, anything else to the
/// forward-auth check.
pub async fn route<B>(req: Request<B>, state: AppState) -> Result<Response<BoxBody<Bytes, Infallible>>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    debug!("{} {}", req.method(), req.uri().path());

    if path_matches(LOGOUT_PATH, req.uri().path()) {
        handle_logout(req, state).await
    } else {
        handle_home(req, state).await
    }
}

/// Service entry point. Handler errors become a bare 500.
pub async fn handle<B>(
    req: Request<B>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match route(req, state).await {
        Ok(response) => Ok(response),
        Err(e) => {
            error!("Request failed: {:#}", e);
            Ok(internal_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_path_matches() {
        assert!(path_matches("/logout", "/logout"));
    }

    #[test]
    fn different_paths_do_not_match() {
        assert!(!path_matches("/logout", "/"));
        assert!(!path_matches("/logout", "/logout/more"));
    }

    #[test]
    fn query_string_stripped_before_match() {
        assert!(path_matches("/logout", "/logout?next=/"));
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        assert!(path_matches("/logout", "/logout/"));
        assert!(path_matches("/", "/"));
    }
}
