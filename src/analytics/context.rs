//! Per-request inputs to the tracker
//!
//! Built once at the HTTP boundary and passed explicitly into every tracking
//! call, so the tracker never reaches for ambient request state.

use axum::http::{header, HeaderMap};
use serde::Serialize;
use std::net::IpAddr;

use super::ip_extractor::extract_client_ip;
use crate::config::TrackingConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientContext {
    pub client_ip: IpAddr,
    pub user_agent: String,
    pub referer: String,
    pub analytics_consent: bool,
}

impl ClientContext {
    pub fn new(client_ip: IpAddr) -> Self {
        Self {
            client_ip,
            user_agent: String::new(),
            referer: String::new(),
            analytics_consent: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn with_consent(mut self, analytics_consent: bool) -> Self {
        self.analytics_consent = analytics_consent;
        self
    }

    /// Attribute a request from its headers and socket peer
    pub fn from_request(
        headers: &HeaderMap,
        socket_addr: Option<IpAddr>,
        config: &TrackingConfig,
    ) -> Self {
        Self {
            client_ip: extract_client_ip(headers, socket_addr, config),
            user_agent: header_string(headers, header::USER_AGENT.as_str()),
            referer: header_string(headers, header::REFERER.as_str()),
            analytics_consent: false,
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
