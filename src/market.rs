//! Uniswap V3 "top pools" feed served through the cached fallback client.

use crate::cache::{CacheOutcome, CacheStatus, CachedQuery, Clock, SystemClock};
use crate::graph::{GraphClient, GraphQuery, QueryTransport};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const POOLS_QUERY: &str = r#"
  query GetTopPools {
    pools(first: 5, orderBy: volumeUSD, orderDirection: desc) {
      id
      token0 {
        id
        symbol
        name
        decimals
      }
      token1 {
        id
        symbol
        name
        decimals
      }
      feeTier
      liquidity
      volumeUSD
      token0Price
      token1Price
    }
  }
"#;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub decimals: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: String,
    pub token0: Token,
    pub token1: Token,
    pub fee_tier: String,
    pub liquidity: String,
    #[serde(rename = "volumeUSD")]
    pub volume_usd: String,
    pub token0_price: String,
    pub token1_price: String,
}

impl Pool {
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.token0.symbol, self.token1.symbol)
    }

    /// Fee tier in percent (`3000` -> `0.3`).
    pub fn fee_percent(&self) -> Option<f64> {
        self.fee_tier.parse::<f64>().ok().map(|f| f / 10_000.0)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PoolsData {
    pub pools: Vec<Pool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Cached,
    Fresh,
    Stale,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarketSnapshot {
    pub pools: Vec<Pool>,
    pub origin: Origin,
    /// Set when a refresh failed and `pools` is the last good answer.
    pub warning: Option<String>,
}

/// Top pools, cached for the configured freshness window.
pub struct MarketFeed<T, C = SystemClock> {
    query: CachedQuery<T, C>,
}

impl<T: QueryTransport> MarketFeed<T, SystemClock> {
    pub fn new(client: GraphClient<T>, window: Duration) -> Self {
        Self::with_clock(client, window, SystemClock)
    }
}

impl<T: QueryTransport, C: Clock> MarketFeed<T, C> {
    pub fn with_clock(client: GraphClient<T>, window: Duration, clock: C) -> Self {
        Self {
            query: CachedQuery::with_clock(client, GraphQuery::new(POOLS_QUERY), window, clock),
        }
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.query.status()
    }

    /// Fetch pools, honouring the cache unless `force` is set.
    ///
    /// Errors only when nothing has ever been fetched; the underlying
    /// [`AggregateFetchFailure`](crate::graph::AggregateFetchFailure) can be
    /// recovered with `downcast_ref` for a user-facing hint.
    pub async fn refresh(&mut self, force: bool) -> Result<MarketSnapshot> {
        let outcome = self.query.fetch_with_cache(force).await?;
        let (origin, warning) = match &outcome {
            CacheOutcome::Cached(_) => (Origin::Cached, None),
            CacheOutcome::Fresh(_) => (Origin::Fresh, None),
            CacheOutcome::Stale { warning, .. } => (Origin::Stale, Some(warning.to_string())),
        };
        let data: PoolsData = serde_json::from_value(outcome.into_payload())
            .context("Unexpected pools payload from indexing service")?;
        Ok(MarketSnapshot {
            pools: data.pools,
            origin,
            warning,
        })
    }
}
