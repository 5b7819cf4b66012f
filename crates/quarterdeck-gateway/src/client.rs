//! The gateway client: one chokepoint for every remote call.
//!
//! Owns the retry/backoff policy, response-envelope normalization and
//! failure classification. Callers always get either a value or a typed
//! failure; there is no partial or ambiguous outcome.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use quarterdeck_core::config::ConsoleConfig;
use quarterdeck_core::error::{ConsoleError, Result};

use crate::transport::{ApiRequest, HttpTransport, Method, RawResponse, TransportError};

/// Delay before retry number `retry` (0-based): 1s, 2s, 4s, ... capped.
/// No delay is applied before the first attempt.
pub fn backoff_delay(retry: u32, cap: Duration) -> Duration {
    let secs = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
    cmp::min(Duration::from_secs(secs), cap)
}

/// Normalizes the panel's response envelope.
///
/// `{ "response": X }` unwraps to `X`; `{ "error": e }` is a failure
/// carrying the message; any other JSON value passes through unchanged.
pub fn unwrap_envelope(value: Value) -> Result<Value> {
    match value {
        Value::Object(mut map) => {
            if let Some(inner) = map.remove("response") {
                Ok(inner)
            } else if let Some(error) = map.remove("error") {
                let message = match error {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Err(ConsoleError::Api(message))
            } else {
                Ok(Value::Object(map))
            }
        }
        other => Ok(other),
    }
}

enum AttemptError {
    /// Worth retrying: connect/timeout/protocol failures and HTTP 5xx.
    Transient(String),
    /// Retrying cannot help; surface immediately.
    Terminal(ConsoleError),
}

/// Stateless (per call) client over a shared transport.
pub struct GatewayClient {
    transport: Arc<dyn HttpTransport>,
    retry_attempts: u32,
    backoff_cap: Duration,
}

impl GatewayClient {
    pub fn new(transport: Arc<dyn HttpTransport>, retry_attempts: u32, backoff_cap: Duration) -> Self {
        Self {
            transport,
            retry_attempts: retry_attempts.max(1),
            backoff_cap,
        }
    }

    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &ConsoleConfig) -> Self {
        Self::new(transport, config.retry_attempts, config.backoff_cap())
    }

    /// Issues one logical request, retrying transient failures with
    /// exponential backoff. Retries are strictly sequential; a
    /// non-idempotent call is never attempted twice concurrently.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<Value> {
        let mut last_transient = String::new();

        for attempt in 0..self.retry_attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1, self.backoff_cap);
                tracing::info!(
                    method = method.as_str(),
                    endpoint,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            let request = ApiRequest::new(method, endpoint)
                .with_query(query.to_vec())
                .with_body_opt(body.clone());

            match self.attempt(request).await {
                Ok(value) => {
                    tracing::debug!(
                        method = method.as_str(),
                        endpoint,
                        attempt,
                        "request succeeded"
                    );
                    return Ok(value);
                }
                Err(AttemptError::Terminal(err)) => {
                    tracing::debug!(
                        method = method.as_str(),
                        endpoint,
                        attempt,
                        error = %err,
                        "request failed terminally"
                    );
                    return Err(err);
                }
                Err(AttemptError::Transient(reason)) => {
                    tracing::warn!(
                        method = method.as_str(),
                        endpoint,
                        attempt,
                        reason = %reason,
                        "transient request failure"
                    );
                    last_transient = reason;
                }
            }
        }

        Err(ConsoleError::unavailable(format!(
            "{} {} failed after {} attempts: {}",
            method.as_str(),
            endpoint,
            self.retry_attempts,
            last_transient
        )))
    }

    async fn attempt(&self, request: ApiRequest) -> std::result::Result<Value, AttemptError> {
        let response = self.transport.send(request).await.map_err(|err| match err {
            TransportError::Connect(_) | TransportError::Timeout(_) | TransportError::Protocol(_) => {
                AttemptError::Transient(err.to_string())
            }
        })?;

        Self::interpret(response)
    }

    fn interpret(response: RawResponse) -> std::result::Result<Value, AttemptError> {
        let RawResponse { status, body } = response;

        if status >= 500 {
            return Err(AttemptError::Transient(format!("server error {status}")));
        }
        if status == 404 {
            return Err(AttemptError::Terminal(ConsoleError::not_found(
                "resource", body_hint(&body),
            )));
        }
        if status >= 400 {
            // Surface the envelope message when the panel provides one.
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| envelope_error_message(&v))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AttemptError::Terminal(ConsoleError::Api(message)));
        }

        if body.trim().is_empty() {
            return Err(AttemptError::Terminal(ConsoleError::malformed(
                "empty body on success status",
            )));
        }
        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            AttemptError::Terminal(ConsoleError::malformed(format!("invalid JSON: {err}")))
        })?;

        unwrap_envelope(parsed).map_err(AttemptError::Terminal)
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::Get, endpoint, None, &[]).await
    }

    pub async fn get_with(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        self.request(Method::Get, endpoint, None, query).await
    }

    /// GET where absence is a normal outcome: 404 maps to `None`.
    pub async fn get_opt(&self, endpoint: &str) -> Result<Option<Value>> {
        match self.get(endpoint).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value> {
        self.request(Method::Post, endpoint, Some(body), &[]).await
    }

    /// POST without a body (action endpoints).
    pub async fn post_empty(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::Post, endpoint, None, &[]).await
    }

    pub async fn patch(&self, endpoint: &str, body: Value) -> Result<Value> {
        self.request(Method::Patch, endpoint, Some(body), &[]).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.request(Method::Delete, endpoint, None, &[]).await
    }
}

impl ApiRequest {
    fn with_body_opt(self, body: Option<Value>) -> Self {
        match body {
            Some(body) => self.with_body(body),
            None => self,
        }
    }
}

fn envelope_error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        other => other.get("message").and_then(Value::as_str).map(String::from),
    }
}

fn body_hint(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "<empty>".to_string()
    } else {
        trimmed.chars().take(80).collect()
    }
}
