use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::handlers::AppState;
use crate::analytics::ClientContext;

/// Origin IP, user agent and referer of the current request
pub struct ClientInfo(pub ClientContext);

impl FromRequestParts<Arc<AppState>> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Absent when the router is served without connect info (tests)
        let socket_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(ClientInfo(ClientContext::from_request(
            &parts.headers,
            socket_ip,
            state.tracker.config(),
        )))
    }
}
