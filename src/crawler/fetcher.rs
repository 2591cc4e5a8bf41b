//! HTTP fetcher implementation
//!
//! This module handles all plain HTTP requests for the scrapers, including:
//! - Building one HTTP client per proxy (plus a direct client)
//! - Normalizing relative URLs against the site base URL
//! - Retry-until-success with a fixed delay per failure kind
//! - Classifying moved/missing pages as terminal, empty results

use crate::crawler::proxy::ProxyRotator;
use crate::crawler::retry::{FailureKind, RetryPolicy};
use crate::FetchError;
use reqwest::header::COOKIE;
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// User agent sent with every plain HTTP request
pub const USER_AGENT: &str = "Mozilla/5.0";

/// Statuses meaning "moved or missing, do not retry"
pub const TERMINAL_STATUSES: [u16; 2] = [404, 301];

const MAX_REDIRECTS: usize = 10;

/// HTTP method of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One logical request, replayed verbatim on every retry
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    /// Form body for POST requests
    pub form: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            form: Vec::new(),
            cookies: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            form,
            cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: &[(String, String)]) -> Self {
        self.cookies.extend_from_slice(cookies);
        self
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Result of a fetch operation
///
/// Only `Success` carries content; callers must check before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The server answered with a 2xx status
    Success {
        /// HTTP status code
        status_code: u16,
        /// Decoded response body
        content: String,
    },

    /// The page moved or does not exist; traversal ends at this node
    Terminal {
        /// The HTTP status code
        status_code: u16,
    },

    /// A bounded retry policy ran out of attempts or time
    Exhausted {
        /// Attempts made before giving up
        attempts: u32,
        /// Last HTTP status seen, if any response came back
        last_status: Option<u16>,
    },
}

impl FetchResult {
    /// Response body, or `None` for the empty outcomes
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Success { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn into_content(self) -> Option<String> {
        match self {
            Self::Success { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. } | Self::Terminal { status_code } => {
                Some(*status_code)
            }
            Self::Exhausted { last_status, .. } => *last_status,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content().is_none()
    }
}

/// Fetches pages of one site through rotating proxies, retrying until the
/// site answers
pub struct ResilientFetcher {
    base_url: Url,
    direct: Client,
    proxied: Vec<Client>,
    rotator: Arc<ProxyRotator>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    /// Builds a fetcher for `base_url` with one client per proxy
    ///
    /// # Arguments
    ///
    /// * `base_url` - Prefix for relative URLs
    /// * `timeout` - Per-attempt request timeout
    /// * `rotator` - Shared proxy rotation
    /// * `policy` - Retry policy applied to every fetch
    pub fn new(
        base_url: &str,
        timeout: Duration,
        rotator: Arc<ProxyRotator>,
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|source| FetchError::Url {
            url: base_url.to_string(),
            source,
        })?;

        let direct = build_http_client(timeout, None)?;
        let proxied = rotator
            .endpoints()
            .iter()
            .map(|endpoint| {
                let proxy = reqwest::Proxy::all(endpoint.as_str()).map_err(|source| {
                    FetchError::Proxy {
                        proxy: endpoint.to_string(),
                        source,
                    }
                })?;
                build_http_client(timeout, Some(proxy))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_url,
            direct,
            proxied,
            rotator,
            policy,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Prefixes relative URLs with the site base URL
    pub fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http") {
            return url.to_string();
        }
        match self.base_url.join(url) {
            Ok(joined) => joined.to_string(),
            Err(_) => format!("{}{}", self.base_url.as_str().trim_end_matches('/'), url),
        }
    }

    /// GET without cookies
    pub async fn get(&self, url: &str) -> FetchResult {
        self.fetch(&FetchRequest::get(url)).await
    }

    /// Performs one logical fetch
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 404, 301 | Immediate → Terminal (empty) |
    /// | HTTP < 300 | Immediate → Success |
    /// | Any other status | Sleep status delay, retry |
    /// | Network error | Sleep error delay, retry |
    ///
    /// There is no attempt ceiling unless the policy sets one. A fresh proxy
    /// is taken from the shared rotation for every attempt.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResult {
        let url = self.absolute_url(&request.url);
        let mut retry = self.policy.start();
        let mut last_status = None;

        loop {
            let failure = match self.send_once(&url, request).await {
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status.as_u16());

                    if is_terminal(status) {
                        tracing::debug!(url = %url, status = status.as_u16(), "Terminal status");
                        return FetchResult::Terminal {
                            status_code: status.as_u16(),
                        };
                    }

                    if status.as_u16() < 300 {
                        match response.text().await {
                            Ok(content) => {
                                return FetchResult::Success {
                                    status_code: status.as_u16(),
                                    content,
                                }
                            }
                            Err(e) => {
                                tracing::warn!(url = %url, error = %e, "Failed reading body");
                                FailureKind::Network
                            }
                        }
                    } else {
                        tracing::warn!(
                            url = %url,
                            status = status.as_u16(),
                            attempt = retry.attempts() + 1,
                            "Waiting: retryable status"
                        );
                        FailureKind::Status
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        attempt = retry.attempts() + 1,
                        "Request failed"
                    );
                    FailureKind::Network
                }
            };

            if !retry.backoff(failure).await {
                tracing::warn!(url = %url, attempts = retry.attempts(), "Retry policy exhausted");
                return FetchResult::Exhausted {
                    attempts: retry.attempts(),
                    last_status,
                };
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        request: &FetchRequest,
    ) -> Result<Response, reqwest::Error> {
        let client = self.next_client();
        let mut builder = match request.method {
            Method::Get => client.get(url),
            Method::Post => client.post(url).form(&request.form),
        };
        if let Some(cookies) = request.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        builder.send().await
    }

    fn next_client(&self) -> &Client {
        match self.rotator.next_index() {
            Some(index) => &self.proxied[index],
            None => &self.direct,
        }
    }
}

fn is_terminal(status: StatusCode) -> bool {
    TERMINAL_STATUSES.contains(&status.as_u16())
}

/// Builds an HTTP client with the scraper's fixed settings
///
/// Redirects are followed up to 10 hops except for 301, which is handed
/// back to the caller as a terminal status.
pub fn build_http_client(
    timeout: Duration,
    proxy: Option<reqwest::Proxy>,
) -> Result<Client, FetchError> {
    let redirect = Policy::custom(|attempt: Attempt| {
        if attempt.status() == StatusCode::MOVED_PERMANENTLY {
            attempt.stop()
        } else if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    });

    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(redirect)
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}
