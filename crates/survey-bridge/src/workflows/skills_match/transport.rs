use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A single outbound call. `query` pairs are appended to `url` as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer_token: Option<String>,
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            bearer_token: None,
            query: Vec::new(),
            json: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            bearer_token: None,
            query: Vec::new(),
            json: Some(body),
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        if !token.trim().is_empty() {
            self.bearer_token = Some(token.to_string());
        }
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{method} {url} failed: {message}")]
    Request {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("{method} {url} failed after {attempts} attempts: {message}")]
    Exhausted {
        method: &'static str,
        url: String,
        attempts: u32,
        message: String,
    },
}

/// Blocking network seam shared by every outbound caller.
///
/// Any HTTP status counts as a completed call; only failures to obtain a
/// reply are errors.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpReply, TransportError>;
}

/// Attempt cap plus the randomized pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Whole seconds drawn uniformly from `[min_delay, max_delay]`.
    pub fn backoff(&self) -> Duration {
        let min = self.min_delay.as_secs();
        let max = self.max_delay.as_secs().max(min);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }
}

/// `reqwest` blocking client wrapped with timing logs and retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Request {
                method: "BUILD",
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self { client, policy })
    }

    fn attempt(&self, request: &HttpRequest) -> Result<HttpReply, reqwest::Error> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpReply { status, body })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        let method = request.method.as_str();
        let mut last_message = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let started = Instant::now();
            match self.attempt(request) {
                Ok(reply) => {
                    info!(
                        method,
                        url = %request.url,
                        status = reply.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "outbound call completed"
                    );
                    return Ok(reply);
                }
                Err(err) => {
                    last_message = err.to_string();
                    if attempt == self.policy.max_attempts {
                        error!(
                            method,
                            url = %request.url,
                            attempt,
                            error = %err,
                            "outbound call failed"
                        );
                        break;
                    }
                    let wait = self.policy.backoff();
                    error!(
                        method,
                        url = %request.url,
                        attempt,
                        error = %err,
                        retry_in_secs = wait.as_secs(),
                        "outbound call failed, retrying"
                    );
                    std::thread::sleep(wait);
                }
            }
        }

        Err(TransportError::Exhausted {
            method,
            url: request.url.clone(),
            attempts: self.policy.max_attempts,
            message: last_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backoff_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let wait = policy.backoff();
            assert!(wait >= Duration::from_secs(1) && wait <= Duration::from_secs(4));
        }
    }

    #[test]
    fn zero_delay_policy_never_sleeps() {
        let policy = RetryPolicy {
            max_attempts: 2,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        assert_eq!(policy.backoff(), Duration::ZERO);
        assert_eq!(RetryPolicy::with_attempts(0).max_attempts, 1);
    }

    #[test]
    fn request_builder_skips_blank_tokens() {
        let request = HttpRequest::get("https://example.test/details")
            .bearer("  ")
            .query("per_page", "100");
        assert!(request.bearer_token.is_none());
        assert_eq!(request.query, vec![("per_page".to_string(), "100".to_string())]);

        let post = HttpRequest::post_json("https://example.test/score", json!({"a": 1}))
            .bearer("secret");
        assert_eq!(post.method, HttpMethod::Post);
        assert_eq!(post.bearer_token.as_deref(), Some("secret"));
    }

    #[test]
    fn reply_reports_success_range() {
        let ok = HttpReply { status: 204, body: String::new() };
        let bad = HttpReply { status: 404, body: String::new() };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
