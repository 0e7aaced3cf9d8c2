//! Time-windowed cache in front of a [`GraphClient`].
//!
//! One slot per cached query. A payload younger than the freshness window is
//! served without touching the network. Expired payloads are kept: when a
//! refresh fails they are still handed back, flagged with a
//! [`StaleDataWarning`], so the caller can keep showing the last good answer.

use crate::graph::{AggregateFetchFailure, GraphClient, GraphQuery, QueryTransport};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn at(ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(ms)))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as i64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub payload: Value,
    pub fetched_at_ms: i64,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.fetched_at_ms)
    }

    pub fn is_fresh(&self, now_ms: i64, window: Duration) -> bool {
        (self.age_ms(now_ms) as i128) < window.as_millis() as i128
    }
}

/// A refresh failed but an older payload is still available.
#[derive(Clone, Debug, PartialEq)]
pub struct StaleDataWarning {
    pub failure: AggregateFetchFailure,
    pub cached_at_ms: i64,
}

impl fmt::Display for StaleDataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "refresh failed, showing cached data: {}",
            self.failure.user_message()
        )
    }
}

/// What a cached fetch produced.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheOutcome {
    /// Served from a fresh cache entry; no network call was made.
    Cached(Value),
    /// Fetched from the network and stored.
    Fresh(Value),
    /// Network failed; this is the last good payload.
    Stale {
        payload: Value,
        warning: StaleDataWarning,
    },
}

impl CacheOutcome {
    pub fn payload(&self) -> &Value {
        match self {
            CacheOutcome::Cached(p) | CacheOutcome::Fresh(p) => p,
            CacheOutcome::Stale { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> Value {
        match self {
            CacheOutcome::Cached(p) | CacheOutcome::Fresh(p) => p,
            CacheOutcome::Stale { payload, .. } => payload,
        }
    }

    pub fn warning(&self) -> Option<&StaleDataWarning> {
        match self {
            CacheOutcome::Stale { warning, .. } => Some(warning),
            _ => None,
        }
    }
}

/// Freshness of the cache slot, for a refresh-button style label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Empty,
    Valid { remaining_ms: i64 },
    Expired,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Empty => Ok(()),
            CacheStatus::Valid { remaining_ms } => {
                let secs = remaining_ms / 1000;
                write!(f, "cache valid ({}:{:02})", secs / 60, secs % 60)
            }
            CacheStatus::Expired => f.write_str("cache expired"),
        }
    }
}

/// A single query plus its cache slot.
pub struct CachedQuery<T, C = SystemClock> {
    client: GraphClient<T>,
    query: GraphQuery,
    window: Duration,
    clock: C,
    entry: Option<CacheEntry>,
}

impl<T: QueryTransport> CachedQuery<T, SystemClock> {
    pub fn new(client: GraphClient<T>, query: GraphQuery, window: Duration) -> Self {
        Self::with_clock(client, query, window, SystemClock)
    }
}

impl<T: QueryTransport, C: Clock> CachedQuery<T, C> {
    pub fn with_clock(client: GraphClient<T>, query: GraphQuery, window: Duration, clock: C) -> Self {
        Self {
            client,
            query,
            window,
            clock,
            entry: None,
        }
    }

    pub fn client(&self) -> &GraphClient<T> {
        &self.client
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn status(&self) -> CacheStatus {
        let Some(entry) = &self.entry else {
            return CacheStatus::Empty;
        };
        let now = self.clock.now_ms();
        if entry.is_fresh(now, self.window) {
            CacheStatus::Valid {
                remaining_ms: self.window.as_millis() as i64 - entry.age_ms(now),
            }
        } else {
            CacheStatus::Expired
        }
    }

    /// Serve from cache when fresh, otherwise go to the network.
    ///
    /// `Err` only when the network failed and nothing was ever cached.
    pub async fn fetch_with_cache(
        &mut self,
        force_refresh: bool,
    ) -> Result<CacheOutcome, AggregateFetchFailure> {
        let now = self.clock.now_ms();

        if !force_refresh {
            if let Some(entry) = &self.entry {
                if entry.is_fresh(now, self.window) {
                    log::debug!(
                        "[cache] using cached payload, {}s until refresh",
                        (self.window.as_millis() as i64 - entry.age_ms(now)) / 1000
                    );
                    return Ok(CacheOutcome::Cached(entry.payload.clone()));
                }
            }
        }

        match self.client.fetch(&self.query).await {
            Ok(fetched) => {
                self.entry = Some(CacheEntry {
                    payload: fetched.payload.clone(),
                    fetched_at_ms: self.clock.now_ms(),
                });
                Ok(CacheOutcome::Fresh(fetched.payload))
            }
            Err(failure) => match &self.entry {
                Some(entry) => {
                    log::warn!("[cache] refresh failed, serving stale payload: {failure}");
                    Ok(CacheOutcome::Stale {
                        payload: entry.payload.clone(),
                        warning: StaleDataWarning {
                            failure,
                            cached_at_ms: entry.fetched_at_ms,
                        },
                    })
                }
                None => Err(failure),
            },
        }
    }
}
