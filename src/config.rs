use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::{
    error::ClientError,
    types::{
        DEFAULT_API_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_EVENT_BUFFER,
        DEFAULT_FEED_POLL_INTERVAL, DEFAULT_PAYMENT_VERIFY_DELAY, DEFAULT_RECONNECTION_ATTEMPTS,
        DEFAULT_RECONNECTION_DELAY, Result, TransportKind,
    },
    utils::{is_http_url, trim_trailing_slash},
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    /// Falls back to `api_url` when unset.
    pub socket_url: Option<String>,
    /// Tried in order until one connects.
    pub transports: Vec<TransportKind>,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub connect_timeout: Duration,
    pub feed_poll_interval: Duration,
    pub payment_verify_delay: Duration,
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: String::from(DEFAULT_API_URL),
            socket_url: None,
            transports: vec![TransportKind::Websocket, TransportKind::Polling],
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            feed_poll_interval: DEFAULT_FEED_POLL_INTERVAL,
            payment_verify_delay: DEFAULT_PAYMENT_VERIFY_DELAY,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: trim_trailing_slash(api_url),
            ..Self::default()
        }
    }

    /// Reads `COMMITHUB_*` variables, after loading `.env` if present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let api_url = var("COMMITHUB_API_URL")
            .map(|url| trim_trailing_slash(&url))
            .unwrap_or(defaults.api_url);

        let socket_url = var("COMMITHUB_SOCKET_URL").map(|url| trim_trailing_slash(&url));

        let transports = var("COMMITHUB_TRANSPORTS")
            .map(|raw| parse_transports(&raw))
            .filter(|transports| !transports.is_empty())
            .unwrap_or(defaults.transports);

        Self {
            api_url,
            socket_url,
            transports,
            reconnection_attempts: try_load(
                "COMMITHUB_RECONNECT_ATTEMPTS",
                defaults.reconnection_attempts,
            ),
            reconnection_delay: Duration::from_millis(try_load(
                "COMMITHUB_RECONNECT_DELAY_MS",
                defaults.reconnection_delay.as_millis() as u64,
            )),
            connect_timeout: Duration::from_millis(try_load(
                "COMMITHUB_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout.as_millis() as u64,
            )),
            feed_poll_interval: Duration::from_secs(try_load(
                "COMMITHUB_FEED_POLL_SECS",
                defaults.feed_poll_interval.as_secs(),
            )),
            payment_verify_delay: defaults.payment_verify_delay,
            event_buffer: defaults.event_buffer,
        }
    }

    pub fn socket_url(&self) -> &str {
        self.socket_url.as_deref().unwrap_or(&self.api_url)
    }

    pub fn validate(&self) -> Result<()> {
        for url in [self.api_url.as_str(), self.socket_url()] {
            if !is_http_url(url) {
                return Err(ClientError::InvalidUrl {
                    url: String::from(url),
                });
            }
        }

        if self.transports.is_empty() {
            return Err(ClientError::InvalidUrl {
                url: format!("{} (no transports configured)", self.socket_url()),
            });
        }

        Ok(())
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    let Some(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}. Using default: {default}");
        default
    })
}

fn parse_transports(raw: &str) -> Vec<TransportKind> {
    let mut transports = vec![];
    for name in raw.split(',') {
        match TransportKind::parse(name) {
            Some(kind) if !transports.contains(&kind) => transports.push(kind),
            Some(_) => {}
            None => warn!("Ignoring unknown transport {name:?}"),
        }
    }
    transports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_socket_options() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:7777");
        assert_eq!(config.socket_url(), "http://localhost:7777");
        assert_eq!(
            config.transports,
            vec![TransportKind::Websocket, TransportKind::Polling]
        );
        assert_eq!(config.reconnection_attempts, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.feed_poll_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = ClientConfig::new("/");
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidUrl { .. })
        ));

        let config = ClientConfig {
            socket_url: Some(String::from("ftp://files")),
            ..ClientConfig::new("https://api.commithub.dev/")
        };
        assert_eq!(config.api_url, "https://api.commithub.dev");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_transports_dedups_and_skips_unknown() {
        assert_eq!(
            parse_transports("polling, websocket,polling,sse"),
            vec![TransportKind::Polling, TransportKind::Websocket]
        );
        assert!(parse_transports("sse").is_empty());
    }
}
