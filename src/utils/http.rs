// src/utils/http.rs

//! HTTP client utilities.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::StatusCode;

use crate::backend::{FetchError, FetchResult};
use crate::error::Result;
use crate::models::CrawlerConfig;

/// Marker the site puts on its block page.
const BLOCKED_MARKER: &str = "Your access has been blocked";

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Map a response status and body onto the fetch failure taxonomy.
pub fn classify_response(status: StatusCode, body: &str) -> FetchResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        StatusCode::FORBIDDEN if body.contains(BLOCKED_MARKER) => Err(FetchError::RateLimited),
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
        other => Err(FetchError::connection(format!("unexpected status {other}"))),
    }
}

/// Fetch a URL as text, classifying failures.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    cookie: Option<&str>,
) -> FetchResult<String> {
    let mut request = client.get(url);
    if let Some(cookie) = cookie {
        request = request.header(reqwest::header::COOKIE, cookie);
    }
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    classify_response(status, &body)?;
    Ok(body)
}

/// Hands out a fresh visitor cookie per request.
#[derive(Debug, Default)]
pub struct CookieJar {
    counter: AtomicU64,
}

impl CookieJar {
    pub fn next_guid(&self) -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("guid={:x}{:04x}", nanos, n & 0xffff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_response() {
        assert_eq!(classify_response(StatusCode::OK, ""), Ok(()));
        assert_eq!(
            classify_response(StatusCode::NOT_FOUND, ""),
            Err(FetchError::NotFound)
        );
        assert_eq!(
            classify_response(
                StatusCode::FORBIDDEN,
                "<h1>Your access has been blocked</h1>"
            ),
            Err(FetchError::RateLimited)
        );
        assert!(matches!(
            classify_response(StatusCode::FORBIDDEN, "nope"),
            Err(FetchError::Connection(_))
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_GATEWAY, ""),
            Err(FetchError::Connection(_))
        ));
    }

    #[test]
    fn test_cookies_are_distinct() {
        let jar = CookieJar::default();
        let a = jar.next_guid();
        let b = jar.next_guid();
        assert!(a.starts_with("guid="));
        assert_ne!(a, b);
    }
}
