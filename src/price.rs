use anyhow::{anyhow, Result};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd";

/// How often a dashboard should re-poll the spot price.
pub const PRICE_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Extract `ethereum.usd` from a CoinGecko simple-price body.
pub fn parse_eth_usd(body: &Value) -> Option<f64> {
    body.get("ethereum")?.get("usd")?.as_f64()
}

/// Fetch the ETH/USD spot price. `Ok(None)` when the body has no price.
pub async fn fetch_eth_usd(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<Option<f64>> {
    log::debug!("[price] fetching ETH/USD from {url}");

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to fetch ETH price: {}", e))?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(anyhow!("Price API error ({})", status));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse price response: {}", e))?;

    let price = parse_eth_usd(&data);
    if price.is_none() {
        log::warn!("[price] response had no ethereum.usd field");
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_eth_usd() {
        assert_eq!(parse_eth_usd(&json!({"ethereum": {"usd": 3120.45}})), Some(3120.45));
        assert_eq!(parse_eth_usd(&json!({"ethereum": {"usd": 3000}})), Some(3000.0));
        assert_eq!(parse_eth_usd(&json!({"ethereum": {}})), None);
        assert_eq!(parse_eth_usd(&json!({"status": {"error_code": 429}})), None);
    }
}
