//! Fallback client tests - ordered endpoint attempts over a scripted transport

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use walletdash::graph::{
    fetch_with_fallback, FailureHint, FailureReason, GraphClient, GraphQuery, QueryTransport,
};

/// Per-endpoint canned outcomes, in call order.
struct Scripted {
    outcomes: Vec<(&'static str, Result<Value, FailureReason>)>,
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(outcomes: Vec<(&'static str, Result<Value, FailureReason>)>) -> Self {
        Self {
            outcomes,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn endpoints(&self) -> Vec<String> {
        self.outcomes.iter().map(|(e, _)| e.to_string()).collect()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryTransport for Scripted {
    async fn post(&self, endpoint: &str, _query: &GraphQuery, _timeout: Duration) -> Result<Value, FailureReason> {
        self.calls.lock().unwrap().push(endpoint.to_string());
        self.outcomes
            .iter()
            .find(|(e, _)| *e == endpoint)
            .map(|(_, o)| o.clone())
            .unwrap_or_else(|| Err(FailureReason::Network("unknown endpoint".into())))
    }
}

fn query() -> GraphQuery {
    GraphQuery::new("{ pools { id } }")
}

#[tokio::test]
async fn third_endpoint_answers_after_two_failures() {
    let transport = Scripted::new(vec![
        ("https://bad1.example", Err(FailureReason::Status(500))),
        ("https://bad2.example", Err(FailureReason::Timeout)),
        ("https://good.example", Ok(json!({"pools": []}))),
    ]);
    let endpoints = transport.endpoints();

    let fetched = fetch_with_fallback(&transport, &endpoints, &query(), Duration::from_secs(15))
        .await
        .unwrap();

    assert_eq!(fetched.payload, json!({"pools": []}));
    assert_eq!(fetched.endpoint, "https://good.example");
    assert_eq!(fetched.skipped.len(), 2);
    assert_eq!(fetched.skipped[0].endpoint, "https://bad1.example");
    assert_eq!(fetched.skipped[1].reason, FailureReason::Timeout);
    assert_eq!(transport.calls(), endpoints);
}

#[tokio::test]
async fn later_endpoints_not_contacted_after_success() {
    let transport = Scripted::new(vec![
        ("https://a.example", Err(FailureReason::Network("connection refused".into()))),
        ("https://b.example", Ok(json!({"ok": true}))),
        ("https://c.example", Ok(json!({"ok": "never"}))),
    ]);
    let endpoints = transport.endpoints();
    let client = GraphClient::new(transport, endpoints, Duration::from_secs(15));

    let fetched = client.fetch(&query()).await.unwrap();
    assert_eq!(fetched.payload, json!({"ok": true}));
    assert_eq!(fetched.skipped.len(), 1);
    assert_eq!(
        client.transport().calls(),
        vec!["https://a.example", "https://b.example"]
    );
}

#[tokio::test]
async fn all_endpoints_failing_reports_each_in_order() {
    let transport = Scripted::new(vec![
        ("https://a.example", Err(FailureReason::Status(429))),
        ("https://b.example", Err(FailureReason::Malformed("not json".into()))),
        ("https://c.example", Err(FailureReason::GraphErrors("indexing error".into()))),
    ]);
    let endpoints = transport.endpoints();
    let client = GraphClient::new(transport, endpoints.clone(), Duration::from_secs(15));

    let err = client.fetch(&query()).await.unwrap_err();
    let reported: Vec<&str> = err.failures.iter().map(|f| f.endpoint.as_str()).collect();
    assert_eq!(reported, endpoints);
    assert_eq!(err.hint(), FailureHint::RateLimited);
    assert!(err.to_string().contains("https://c.example"));
}

#[tokio::test]
async fn empty_endpoint_list_fails_without_calls() {
    let transport = Scripted::new(Vec::new());
    let client = GraphClient::new(transport, Vec::new(), Duration::from_secs(15));

    let err = client.fetch(&query()).await.unwrap_err();
    assert!(err.failures.is_empty());
    assert!(client.transport().calls().is_empty());
}
