use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{SOCKET_IO_PATH, TransportKind};

static HTTP_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^http://").unwrap());
static HTTPS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https://").unwrap());
static TRAILING_SLASH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/+$").unwrap());

pub(crate) fn is_http_url(url: &str) -> bool {
    url.find("://").is_some_and(|colon_idx| {
        let scheme = &url[..colon_idx].to_ascii_lowercase();
        matches!(scheme.as_str(), "http" | "https") && url.len() > colon_idx + 3
    })
}

pub(crate) fn trim_trailing_slash(url: &str) -> String {
    String::from(TRAILING_SLASH_REGEX.replace(url, ""))
}

/// Engine.IO endpoint for the given transport, e.g.
/// `ws://host/socket.io/?EIO=4&transport=websocket`.
pub(crate) fn socket_endpoint(base_url: &str, transport: TransportKind) -> String {
    let base = trim_trailing_slash(base_url);
    let base = match transport {
        TransportKind::Websocket => {
            let replaced_http = HTTP_REGEX.replace(&base, "ws://");
            String::from(HTTPS_REGEX.replace(&replaced_http, "wss://"))
        }
        TransportKind::Polling => base,
    };

    format!("{base}{SOCKET_IO_PATH}?EIO=4&transport={transport}")
}

/// Chat timestamp label: "Just now", "5m ago", "3h ago", "2d ago", or a date.
pub fn relative_time(now: DateTime<Utc>, timestamp: Option<DateTime<Utc>>) -> String {
    let Some(timestamp) = timestamp else {
        return String::from("Just now");
    };

    let seconds = (now - timestamp).num_seconds();

    if seconds < 60 {
        String::from("Just now")
    } else if seconds < 3_600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h ago", seconds / 3_600)
    } else if seconds < 604_800 {
        format!("{}d ago", seconds / 86_400)
    } else {
        timestamp.format("%-m/%-d/%Y").to_string()
    }
}

/// Whole days until `expiry`, rounded up.
pub fn days_until(now: DateTime<Utc>, expiry: DateTime<Utc>) -> i64 {
    let millis = (expiry - now).num_milliseconds();
    const DAY_MILLIS: i64 = 86_400_000;
    millis.div_euclid(DAY_MILLIS) + i64::from(millis.rem_euclid(DAY_MILLIS) != 0)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_socket_endpoint() {
        assert_eq!(
            socket_endpoint("http://localhost:7777/", TransportKind::Websocket),
            "ws://localhost:7777/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_endpoint("HTTPS://api.commithub.dev", TransportKind::Websocket),
            "wss://api.commithub.dev/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_endpoint("https://api.commithub.dev", TransportKind::Polling),
            "https://api.commithub.dev/socket.io/?EIO=4&transport=polling"
        );
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("http://localhost:7777"));
        assert!(is_http_url("HTTPS://example.com"));
        assert!(!is_http_url("ws://example.com"));
        assert!(!is_http_url("/"));
        assert!(!is_http_url("http://"));
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = now();
        assert_eq!(relative_time(now, None), "Just now");
        assert_eq!(relative_time(now, Some(now - Duration::seconds(59))), "Just now");
        assert_eq!(relative_time(now, Some(now - Duration::minutes(5))), "5m ago");
        assert_eq!(relative_time(now, Some(now - Duration::hours(3))), "3h ago");
        assert_eq!(relative_time(now, Some(now - Duration::days(2))), "2d ago");
        assert_eq!(relative_time(now, Some(now - Duration::days(9))), "3/1/2025");
    }

    #[test]
    fn test_days_until_rounds_up() {
        let now = now();
        assert_eq!(days_until(now, now + Duration::days(30)), 30);
        assert_eq!(days_until(now, now + Duration::hours(25)), 2);
        assert_eq!(days_until(now, now + Duration::minutes(1)), 1);
        assert_eq!(days_until(now, now - Duration::hours(12)), 0);
        assert_eq!(days_until(now, now - Duration::hours(36)), -1);
    }
}
