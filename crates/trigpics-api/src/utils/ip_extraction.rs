//! Client IP extraction
//!
//! The address recorded on a photo row comes from X-Forwarded-For when the
//! API sits behind trusted proxies, then X-Real-IP, then the socket peer.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::AppState;

/// Best-effort address of the caller; `None` when nothing usable was found
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            socket_addr.as_ref(),
            state.trusted_proxy_count,
        )))
    }
}

/// Extract and validate the client IP.
///
/// With `trusted_proxy_count` N, the last N entries of X-Forwarded-For are
/// our own proxies and the entry before them is the client. With no trusted
/// proxies only the last entry is used, since earlier ones can be forged.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| from_forwarded_for(v, trusted_proxy_count));
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| is_valid_ip(ip))
        .map(str::to_string);
    if real_ip.is_some() {
        return real_ip;
    }

    socket_addr.map(|addr| addr.ip().to_string())
}

fn from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.last()
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)
    };

    candidate
        .filter(|ip| is_valid_ip(ip))
        .map(|ip| ip.to_string())
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}
