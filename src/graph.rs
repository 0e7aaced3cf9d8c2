//! GraphQL client for the indexing service with ordered endpoint fallback.
//!
//! Endpoints are tried one at a time in priority order. Each attempt is
//! bounded by its own timeout; the first endpoint that answers with a usable
//! `data` payload wins and the remaining endpoints are never contacted.
//! When every endpoint fails the caller gets an [`AggregateFetchFailure`]
//! listing one reason per endpoint, in input order.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Uniswap V3 subgraph endpoints, most reliable first.
///
/// `{api_key}` is substituted from configuration; templated endpoints are
/// skipped when no key is configured.
pub const UNISWAP_V3_ENDPOINTS: &[&str] = &[
    "https://gateway.thegraph.com/api/{api_key}/subgraphs/id/5zvR82QoaXYFyDEKLZ9t6v9adgnptxYpKpSbxtgVENFV",
    "https://gateway-arbitrum.network.thegraph.com/api/{api_key}/subgraphs/id/5zvR82QoaXYFyDEKLZ9t6v9adgnptxYpKpSbxtgVENFV",
    "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v3",
];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

/// A GraphQL request body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Why a single endpoint attempt failed.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FailureReason {
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("http {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("graphql errors: {0}")]
    GraphErrors(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub reason: FailureReason,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.endpoint, self.reason)
    }
}

/// Every endpoint in the list failed.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("all endpoints failed: {}", join_failures(.failures))]
pub struct AggregateFetchFailure {
    pub failures: Vec<EndpointFailure>,
}

fn join_failures(failures: &[EndpointFailure]) -> String {
    if failures.is_empty() {
        return "no endpoints configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// User-facing classification of an aggregate failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureHint {
    RateLimited,
    NotFound,
    NetworkDown,
    Timeout,
    Other,
}

impl fmt::Display for FailureHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FailureHint::RateLimited => {
                "Too many requests to the indexing service (rate limited). Wait and retry, or configure an API key."
            }
            FailureHint::NotFound => {
                "Subgraph endpoint not found. The hosted service may be retired; configure an API key for the decentralized network."
            }
            FailureHint::NetworkDown => "Network connection failed. Check your network settings.",
            FailureHint::Timeout => "The request timed out. Please retry later.",
            FailureHint::Other => "Failed to fetch data from the indexing service.",
        };
        f.write_str(msg)
    }
}

impl AggregateFetchFailure {
    /// Most actionable hint across all endpoint failures.
    pub fn hint(&self) -> FailureHint {
        let reasons = || self.failures.iter().map(|f| &f.reason);
        if self.failures.is_empty() {
            return FailureHint::Other;
        }
        if reasons().any(|r| *r == FailureReason::Status(429)) {
            FailureHint::RateLimited
        } else if reasons().all(|r| *r == FailureReason::Timeout) {
            FailureHint::Timeout
        } else if reasons().any(|r| *r == FailureReason::Status(404)) {
            FailureHint::NotFound
        } else if reasons().all(|r| matches!(r, FailureReason::Network(_) | FailureReason::Timeout)) {
            FailureHint::NetworkDown
        } else {
            FailureHint::Other
        }
    }

    pub fn user_message(&self) -> String {
        match self.hint() {
            FailureHint::Other => format!("{} {}", FailureHint::Other, self),
            hint => hint.to_string(),
        }
    }
}

/// Sends one GraphQL request to one endpoint.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait QueryTransport {
    async fn post(
        &self,
        endpoint: &str,
        query: &GraphQuery,
        timeout: Duration,
    ) -> Result<Value, FailureReason>;
}

/// Validate a raw GraphQL HTTP response and extract its `data` member.
pub fn parse_graph_response(status: u16, body: &str) -> Result<Value, FailureReason> {
    if !(200..300).contains(&status) {
        return Err(FailureReason::Status(status));
    }
    let mut v: Value =
        serde_json::from_str(body).map_err(|e| FailureReason::Malformed(e.to_string()))?;

    if let Some(errors) = v.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let msg = errors
                .iter()
                .map(|e| e.get("message").and_then(|m| m.as_str()).unwrap_or("graphql error"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FailureReason::GraphErrors(msg));
        }
    }

    match v.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => Err(FailureReason::Malformed("missing data".into())),
        Some(data) => Ok(data),
    }
}

/// reqwest-backed transport.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()?;

        #[cfg(target_arch = "wasm32")]
        let client = reqwest::Client::builder().build()?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify_reqwest(e: reqwest::Error) -> FailureReason {
    if e.is_timeout() {
        FailureReason::Timeout
    } else {
        FailureReason::Network(e.to_string())
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl QueryTransport for HttpTransport {
    async fn post(
        &self,
        endpoint: &str,
        query: &GraphQuery,
        timeout: Duration,
    ) -> Result<Value, FailureReason> {
        let res = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest)?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(classify_reqwest)?;
        parse_graph_response(status, &body)
    }
}

/// Sequential-attempt state of one fallback run.
#[derive(Clone, Debug, PartialEq)]
pub enum Attempt {
    Trying(usize),
    Succeeded(Value),
    Failed(Vec<EndpointFailure>),
}

/// Drives [`Attempt`] over an endpoint list, one outcome at a time.
#[derive(Debug)]
pub struct FallbackRun<'a> {
    endpoints: &'a [String],
    state: Attempt,
    failures: Vec<EndpointFailure>,
}

impl<'a> FallbackRun<'a> {
    pub fn new(endpoints: &'a [String]) -> Self {
        let state = if endpoints.is_empty() {
            Attempt::Failed(Vec::new())
        } else {
            Attempt::Trying(0)
        };
        Self {
            endpoints,
            state,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> &Attempt {
        &self.state
    }

    /// Endpoint to try next, if the run is not finished.
    pub fn current(&self) -> Option<&'a str> {
        match self.state {
            Attempt::Trying(i) => self.endpoints.get(i).map(String::as_str),
            _ => None,
        }
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> &[EndpointFailure] {
        match &self.state {
            Attempt::Failed(all) => all,
            _ => &self.failures,
        }
    }

    /// Feed the outcome for the current endpoint. Ignored once finished.
    pub fn record(&mut self, outcome: Result<Value, FailureReason>) {
        let Attempt::Trying(i) = self.state else {
            log::debug!("[graph] outcome recorded after run finished; ignored");
            return;
        };
        match outcome {
            Ok(payload) => self.state = Attempt::Succeeded(payload),
            Err(reason) => {
                self.failures.push(EndpointFailure {
                    endpoint: self.endpoints[i].clone(),
                    reason,
                });
                self.state = if i + 1 < self.endpoints.len() {
                    Attempt::Trying(i + 1)
                } else {
                    Attempt::Failed(std::mem::take(&mut self.failures))
                };
            }
        }
    }

    pub fn finish(self) -> Result<Fetched, AggregateFetchFailure> {
        match self.state {
            Attempt::Succeeded(payload) => {
                let endpoint = self
                    .endpoints
                    .get(self.failures.len())
                    .cloned()
                    .unwrap_or_default();
                Ok(Fetched {
                    payload,
                    endpoint,
                    skipped: self.failures,
                })
            }
            Attempt::Failed(failures) => Err(AggregateFetchFailure { failures }),
            Attempt::Trying(_) => Err(AggregateFetchFailure {
                failures: self.failures,
            }),
        }
    }
}

/// A successful fallback run.
#[derive(Clone, Debug, PartialEq)]
pub struct Fetched {
    pub payload: Value,
    /// Endpoint that answered.
    pub endpoint: String,
    /// Endpoints that failed before it, in order.
    pub skipped: Vec<EndpointFailure>,
}

/// Try `endpoints` in order until one returns a payload.
pub async fn fetch_with_fallback<T>(
    transport: &T,
    endpoints: &[String],
    query: &GraphQuery,
    timeout: Duration,
) -> Result<Fetched, AggregateFetchFailure>
where
    T: QueryTransport + ?Sized,
{
    let mut run = FallbackRun::new(endpoints);
    while let Some(endpoint) = run.current() {
        log::debug!("[graph] querying {endpoint}");
        let outcome = transport.post(endpoint, query, timeout).await;
        if let Err(reason) = &outcome {
            log::warn!("[graph] endpoint {endpoint} failed: {reason}");
        }
        run.record(outcome);
    }

    let result = run.finish();
    match &result {
        Ok(fetched) => log::info!(
            "[graph] fetched from {} after {} failed endpoint(s)",
            fetched.endpoint,
            fetched.skipped.len()
        ),
        Err(e) => log::error!("[graph] {e}"),
    }
    result
}

/// Transport plus endpoint configuration, constructed once and passed to callers.
#[derive(Clone, Debug)]
pub struct GraphClient<T> {
    transport: T,
    endpoints: Vec<String>,
    timeout: Duration,
}

impl<T: QueryTransport> GraphClient<T> {
    pub fn new(transport: T, endpoints: Vec<String>, timeout: Duration) -> Self {
        Self {
            transport,
            endpoints,
            timeout,
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn fetch(&self, query: &GraphQuery) -> Result<Fetched, AggregateFetchFailure> {
        fetch_with_fallback(&self.transport, &self.endpoints, query, self.timeout).await
    }
}
