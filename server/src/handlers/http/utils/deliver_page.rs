use std::convert::Infallible;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http::HeaderValue;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::{Response, StatusCode, header};
use tracing::{debug, error, info};

use super::headers;

const BUILTIN_PAGE: &str = include_str!("../../../../web/index.html");

/// Expand tilde (~) in path to home directory
fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path_ref: &Path = path.as_ref();
    let path_str: &str = path_ref.to_str().unwrap_or("");

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut home_path: PathBuf = PathBuf::from(home);
            home_path.push(rest);
            return home_path;
        }
    }

    path_ref.to_path_buf()
}

/// HTML page with `{{ key }}` placeholders, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    source: String,
}

impl Default for PageTemplate {
    fn default() -> Self {
        Self {
            source: BUILTIN_PAGE.to_string(),
        }
    }
}

impl PageTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Read the page at `path`, or fall back to the built-in one.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let Some(path) = path else {
            debug!("Using built-in page");
            return Ok(Self::default());
        };

        let expanded_path = expand_tilde(path);
        let source = std::fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read page: {}", expanded_path.display()))?;

        info!("Loaded page from {}", expanded_path.display());
        Ok(Self::new(source))
    }

    /// Fill every placeholder with its HTML-escaped value. Unknown keys
    /// render as nothing.
    pub fn render(&self, data: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start..].find("}}") else {
                break;
            };
            out.push_str(&rest[..start]);

            let key = rest[start + 2..start + len].trim();
            if let Some((_, value)) = data.iter().find(|(k, _)| *k == key) {
                out.push_str(&headers::html_escape(value));
            }
            rest = &rest[start + len + 2..];
        }

        out.push_str(rest);
        out
    }
}

/// Render `page` with `status` and no-cache headers
pub fn deliver_page(
    page: &PageTemplate,
    status: StatusCode,
    data: &[(&str, &str)],
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let html = page.render(data);

    debug!(
        "Delivering page with status: {}, size: {} bytes",
        status,
        html.len()
    );

    let response: Response<BoxBody<Bytes, Infallible>> = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(full(html))
        .map_err(|e| anyhow!("Failed to build response: {}", e))?;

    Ok(headers::add_no_cache_headers(response))
}

/// Delivers a redirect response, optionally setting a cookie
pub fn deliver_redirect(
    location: &str,
    cookie: Option<HeaderValue>,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Delivering redirect to: {}", location);

    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location);

    if let Some(c) = cookie {
        builder = builder.header(header::SET_COOKIE, c);
    }
    let response = builder.body(empty()).map_err(|e: http::Error| {
        error!("Failed to build redirect response to {}: {}", location, e);
        anyhow!("Failed to build redirect response: {}", e)
    })?;

    Ok(headers::add_no_cache_headers(response))
}

/// Generic 500, no detail leaked
pub fn internal_error() -> Response<BoxBody<Bytes, Infallible>> {
    let mut response = Response::new(full("Internal Server Error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers::add_no_cache_headers(response)
}

/// Helper function to create an empty body
pub fn empty() -> BoxBody<Bytes, Infallible> {
    Empty::<Bytes>::new().boxed()
}

/// Helper function to create a full body from various types
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    let bytes: Bytes = chunk.into();
    let full_body: Full<Bytes> = Full::new(bytes);
    full_body.boxed()
}
