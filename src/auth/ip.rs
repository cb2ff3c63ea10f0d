//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::request::Parts};

/// Header set by reverse proxies. Only trusted when configured.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Extract the client IP address.
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` entry is used and
/// a missing header is an error (no fallback to the socket address, which
/// would be the proxy's). Otherwise the peer address from `ConnectInfo`.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    trust_forwarded_for: bool,
) -> Result<String, &'static str> {
    if trust_forwarded_for {
        let value = source
            .headers()
            .get(FORWARDED_FOR_HEADER)
            .ok_or("IP header not present")?
            .to_str()
            .map_err(|_| "IP header contains invalid characters")?;
        let first = value.split(',').next().unwrap_or_default().trim();
        if first.is_empty() {
            return Err("IP header is empty");
        }
        return Ok(first.to_string());
    }

    source
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .ok_or("No client IP available")
}
