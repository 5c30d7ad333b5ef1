use std::future::Future;
use std::time::Duration;

use log::{debug, error, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::ImportError;

/// Fixed-interval retry budget for a result that is still being computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 15,
        }
    }
}

/// Repeats `attempt` until it yields a finished body
///
/// Each attempt returns an HTTP status and body. 202 means "still
/// processing": wait `policy.interval` and go again. Any other success hands
/// back the body. 504 means an upstream poller already gave up and becomes
/// [`ImportError::Timeout`]. Everything else stops immediately with
/// [`ImportError::Relay`]. There is no sleep after the last attempt.
///
/// # Arguments
/// * `policy` - Interval and attempt budget
/// * `attempt` - Performs one request
///
/// # Returns
/// * `Result<String, ImportError>` - The body, a terminal failure or
///   [`ImportError::Timeout`] once the budget is spent
pub async fn poll_until_ready<F, Fut>(policy: &PollPolicy, mut attempt: F) -> Result<String, ImportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(u16, String), ImportError>>,
{
    for n in 1..=policy.max_attempts {
        let (status, body) = attempt().await?;

        if status == StatusCode::ACCEPTED.as_u16() {
            debug!("attempt {}/{}: still processing", n, policy.max_attempts);
            if n < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
            continue;
        }

        if (200..300).contains(&status) {
            debug!("attempt {}/{}: ready ({} bytes)", n, policy.max_attempts, body.len());
            return Ok(body);
        }

        if status == StatusCode::GATEWAY_TIMEOUT.as_u16() {
            let attempts = timeout_attempts(&body).unwrap_or(n);
            warn!("relay gave up after {} attempts", attempts);
            return Err(ImportError::Timeout { attempts });
        }

        let message = relay_message(status, &body);
        error!("relay answered {}: {}", status, message);
        return Err(ImportError::Relay { status, message });
    }

    warn!("gave up after {} attempts", policy.max_attempts);
    Err(ImportError::Timeout {
        attempts: policy.max_attempts,
    })
}

/// Attempt count reported by a relay that timed out.
fn timeout_attempts(body: &str) -> Option<u32> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    json.get("attempts")?.as_u64()?.try_into().ok()
}

/// Message for a terminal relay answer: the JSON `error` or `message`
/// field, else the body text, else the bare status.
pub fn relay_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let field = json
            .get("error")
            .or_else(|| json.get("message"))
            .and_then(Value::as_str);
        if let Some(message) = field {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed.to_string()
    }
}

/// Talks to the analytics service that executes saved queries and serves
/// their results as CSV.
#[derive(Clone, Debug)]
pub struct QueryRelay {
    client: Client,
    base_url: String,
    api_key: String,
    api_key_header: String,
    policy: PollPolicy,
}

impl QueryRelay {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_key_header: "X-Dune-Api-Key".to_string(),
            policy: PollPolicy::default(),
        }
    }

    pub fn with_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Starts (or reuses) an execution of `query_id` and waits for its CSV.
    pub async fn fetch_csv(&self, query_id: &str) -> Result<String, ImportError> {
        let execute_url = format!("{}/query/{}/execute", self.base_url, query_id);
        match self
            .client
            .post(&execute_url)
            .header(self.api_key_header.as_str(), self.api_key.as_str())
            .send()
            .await
        {
            Ok(response) if !response.status().is_success() => {
                warn!("execute for query {} answered {}", query_id, response.status());
            }
            Ok(_) => debug!("execution of query {} requested", query_id),
            Err(e) => warn!("execute for query {} failed: {}", query_id, e),
        }

        let csv_url = format!("{}/query/{}/results/csv", self.base_url, query_id);
        let csv_url = csv_url.as_str();
        let relay = self;
        poll_until_ready(&self.policy, || async move {
            let response = relay
                .client
                .get(csv_url)
                .header(relay.api_key_header.as_str(), relay.api_key.as_str())
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok((status, body))
        })
        .await
    }
}
