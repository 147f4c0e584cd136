use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How much of the forwarding chain to believe when attributing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the first X-Forwarded-For entry, falling back to the socket peer
    Standard,
    /// Ignore forwarding headers entirely
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Repeat visits to the same page from the same IP inside this window are dropped
    pub dedup_window_secs: u64,
    /// Number of days before today covered by the statistics report
    pub report_window_days: u64,
    pub trusted_proxy_mode: TrustedProxyMode,
    /// When non-empty, forwarding headers are honored only from these peers
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
}

impl TrackingConfig {
    pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 5;
    pub const DEFAULT_REPORT_WINDOW_DAYS: u64 = 30;
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: Self::DEFAULT_DEDUP_WINDOW_SECS,
            report_window_days: Self::DEFAULT_REPORT_WINDOW_DAYS,
            trusted_proxy_mode: TrustedProxyMode::Standard,
            trusted_proxies: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./visitor-stats.db".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let dedup_window_secs = std::env::var("DEDUP_WINDOW_SECS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("DEDUP_WINDOW_SECS must be a number of seconds")?
            .unwrap_or(TrackingConfig::DEFAULT_DEDUP_WINDOW_SECS);

        let report_window_days = std::env::var("REPORT_WINDOW_DAYS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("REPORT_WINDOW_DAYS must be a number of days")?
            .unwrap_or(TrackingConfig::DEFAULT_REPORT_WINDOW_DAYS);

        let trusted_proxy_mode = parse_proxy_mode(
            &std::env::var("TRUSTED_PROXY_MODE").unwrap_or_else(|_| "standard".to_string()),
        );

        let trusted_proxies = std::env::var("TRUSTED_PROXIES")
            .map(|v| parse_trusted_proxies(&v))
            .unwrap_or_default();

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            tracking: TrackingConfig {
                dedup_window_secs,
                report_window_days,
                trusted_proxy_mode,
                trusted_proxies,
            },
        })
    }
}

fn parse_proxy_mode(value: &str) -> TrustedProxyMode {
    match value.trim().to_lowercase().as_str() {
        "standard" => TrustedProxyMode::Standard,
        "none" => TrustedProxyMode::None,
        other => {
            tracing::warn!(
                "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'standard'. Supported values: standard, none"
            );
            TrustedProxyMode::Standard
        }
    }
}

/// Parse a comma-separated CIDR list. Bare addresses are accepted as host routes.
fn parse_trusted_proxies(value: &str) -> Vec<IpNet> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let parsed = entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<std::net::IpAddr>().map(IpNet::from));
            match parsed {
                Ok(net) => Some(net),
                Err(_) => {
                    tracing::warn!("Ignoring unparseable TRUSTED_PROXIES entry '{entry}'");
                    None
                }
            }
        })
        .collect()
}
