//! Page aggregation over the panel's `start`/`size` list endpoints.
//!
//! Listing endpoints come in two shapes: a bare JSON array, or an object
//! keyed by the collection name (`{"total": n, "users": [...]}`). Both are
//! tolerated everywhere so a panel upgrade cannot silently break listings.

use serde_json::Value;

use quarterdeck_core::error::{ConsoleError, Result};

use crate::client::GatewayClient;

/// Extracts the item list from either response shape.
pub fn list_from(value: Value, key: &str) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(ConsoleError::malformed(format!(
                "expected array under '{key}', got {other}"
            ))),
            None => Err(ConsoleError::malformed(format!(
                "list response missing '{key}'"
            ))),
        },
        other => Err(ConsoleError::malformed(format!(
            "expected list response, got {other}"
        ))),
    }
}

/// Fetches every page of a listing endpoint and returns the concatenation.
///
/// Pages are requested sequentially with `start`/`size` until a short or
/// empty page arrives. Two guards keep a misbehaving endpoint from looping
/// or discarding work:
/// - a page identical to its predecessor aborts and returns what has been
///   accumulated so far,
/// - a failure after at least one successful page also returns the
///   accumulated items rather than dropping them.
///
/// A failure on the very first page propagates as an error.
pub async fn fetch_all(
    client: &GatewayClient,
    endpoint: &str,
    list_key: &str,
    page_size: usize,
) -> Result<Vec<Value>> {
    let page_size = page_size.max(1);
    let mut items: Vec<Value> = Vec::new();
    let mut previous_page: Option<Vec<Value>> = None;
    let mut start = 0usize;

    loop {
        let query = vec![
            ("start".to_string(), start.to_string()),
            ("size".to_string(), page_size.to_string()),
        ];
        let page = match client.get_with(endpoint, &query).await {
            Ok(value) => list_from(value, list_key)?,
            Err(err) if items.is_empty() => return Err(err),
            Err(err) => {
                tracing::warn!(
                    endpoint,
                    start,
                    fetched = items.len(),
                    error = %err,
                    "aborting pagination mid-way, returning partial listing"
                );
                return Ok(items);
            }
        };

        if page.is_empty() {
            return Ok(items);
        }
        if previous_page.as_ref() == Some(&page) {
            tracing::warn!(
                endpoint,
                start,
                "endpoint repeated a page, aborting pagination"
            );
            return Ok(items);
        }

        let len = page.len();
        items.extend(page.iter().cloned());
        previous_page = Some(page);

        if len < page_size {
            return Ok(items);
        }
        start += page_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::transport::{ApiRequest, HttpTransport, RawResponse, TransportError};

    struct PagedTransport {
        responses: Mutex<Vec<std::result::Result<String, TransportError>>>,
        queries: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl PagedTransport {
        fn new(responses: Vec<std::result::Result<String, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for PagedTransport {
        async fn send(&self, request: ApiRequest) -> std::result::Result<RawResponse, TransportError> {
            self.queries.lock().unwrap().push(request.query.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(TransportError::Connect("no more pages scripted".into()));
            }
            responses.remove(0).map(|body| RawResponse { status: 200, body })
        }
    }

    fn client_over(transport: Arc<PagedTransport>) -> GatewayClient {
        // Single attempt so scripted transport failures surface directly.
        GatewayClient::new(transport, 1, Duration::from_secs(1))
    }

    fn users_page(names: &[&str]) -> String {
        let items: Vec<Value> = names
            .iter()
            .map(|n| serde_json::json!({"username": n}))
            .collect();
        serde_json::json!({"total": 99, "users": items}).to_string()
    }

    #[tokio::test]
    async fn aggregates_until_short_page() {
        let transport = Arc::new(PagedTransport::new(vec![
            Ok(users_page(&["a", "b"])),
            Ok(users_page(&["c", "d"])),
            Ok(users_page(&["e"])),
        ]));
        let client = client_over(transport.clone());

        let items = fetch_all(&client, "users", "users", 2).await.unwrap();
        assert_eq!(items.len(), 5);

        let queries = transport.queries.lock().unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0], vec![("start".to_string(), "0".to_string()), ("size".to_string(), "2".to_string())]);
        assert_eq!(queries[2][0], ("start".to_string(), "4".to_string()));
    }

    #[tokio::test]
    async fn tolerates_bare_array_shape() {
        let transport = Arc::new(PagedTransport::new(vec![Ok(
            serde_json::json!([{"remark": "h1"}]).to_string(),
        )]));
        let client = client_over(transport);

        let items = fetch_all(&client, "hosts", "hosts", 8).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn repeated_page_aborts_with_accumulated_items() {
        let same = users_page(&["a", "b"]);
        let transport = Arc::new(PagedTransport::new(vec![
            Ok(same.clone()),
            Ok(same.clone()),
            Ok(same),
        ]));
        let client = client_over(transport.clone());

        let items = fetch_all(&client, "users", "users", 2).await.unwrap();
        assert_eq!(items.len(), 2);
        // The third scripted page was never requested.
        assert_eq!(transport.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn mid_way_failure_returns_partial_listing() {
        let transport = Arc::new(PagedTransport::new(vec![
            Ok(users_page(&["a", "b"])),
            Err(TransportError::Timeout("deadline".into())),
        ]));
        let client = client_over(transport);

        let items = fetch_all(&client, "users", "users", 2).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn first_page_failure_propagates() {
        let transport = Arc::new(PagedTransport::new(vec![Err(TransportError::Connect(
            "refused".into(),
        ))]));
        let client = client_over(transport);

        let err = fetch_all(&client, "users", "users", 2).await.unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn list_from_rejects_wrong_shapes() {
        assert!(list_from(serde_json::json!({"users": 5}), "users").is_err());
        assert!(list_from(serde_json::json!({"total": 0}), "users").is_err());
        assert!(list_from(serde_json::json!("nope"), "users").is_err());
    }
}
