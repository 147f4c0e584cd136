//! Client IP extraction from HTTP headers with trust validation
//!
//! The origin IP is the first `X-Forwarded-For` entry when forwarding headers
//! are trusted, otherwise the socket peer. Without either, loopback is used so
//! every request still has an attributable origin.

use axum::http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::debug;

use crate::config::{TrackingConfig, TrustedProxyMode};

pub const FALLBACK_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Extract the client IP address from HTTP headers
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_addr` - The socket remote address, when known
/// * `config` - Tracking configuration with trust settings
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<IpAddr>,
    config: &TrackingConfig,
) -> IpAddr {
    let direct = socket_addr.unwrap_or(FALLBACK_IP);

    match config.trusted_proxy_mode {
        TrustedProxyMode::None => direct,
        TrustedProxyMode::Standard => {
            if !peer_is_trusted(socket_addr, config) {
                debug!(peer = %direct, "ignoring forwarding headers from untrusted peer");
                return direct;
            }
            extract_from_x_forwarded_for(headers).unwrap_or(direct)
        }
    }
}

/// With no trusted proxy list configured, every peer may forward
fn peer_is_trusted(socket_addr: Option<IpAddr>, config: &TrackingConfig) -> bool {
    if config.trusted_proxies.is_empty() {
        return true;
    }
    socket_addr.is_some_and(|peer| config.trusted_proxies.iter().any(|net| net.contains(&peer)))
}

/// First entry of X-Forwarded-For, the client as seen by the outermost proxy
fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = xff.split(',').next()?.trim();

    first
        .parse::<IpAddr>()
        .ok()
        .or_else(|| first.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
