use super::{PriceFeed, RawPrice, normalize_feed_id};
use crate::{constants::DEFAULT_PRICE_FEED_TIMEOUT, error::PricingError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use std::time::Duration;
use tracing::{error, trace};
use url::Url;

/// Response of the `/v2/updates/price/latest` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HermesResponse {
    /// Parsed price updates, one per requested id.
    #[serde(default)]
    pub parsed: Vec<HermesPriceUpdate>,
}

/// A parsed price update.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HermesPriceUpdate {
    /// Feed id, hex without prefix.
    pub id: String,
    /// The spot price.
    pub price: HermesPrice,
}

/// A price published by Hermes.
#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HermesPrice {
    /// Integer mantissa. Hermes encodes it as a string.
    #[serde(alias = "mantissa")]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub price: i64,
    /// Decimal exponent.
    #[serde(alias = "exponent")]
    pub expo: i32,
    /// Unix timestamp the price was published at.
    #[serde(alias = "publishTime", default)]
    pub publish_time: u64,
}

/// Pyth Hermes price feed client.
#[derive(Debug, Clone)]
pub struct HermesClient {
    /// HTTP client for making requests.
    client: reqwest::Client,
    /// Base URL of the Hermes deployment.
    base_url: Url,
}

impl HermesClient {
    /// Creates a new client for `base_url` with the given request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, PricingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Creates a new client with the default request timeout.
    pub fn with_base_url(base_url: Url) -> Result<Self, PricingError> {
        Self::new(base_url, DEFAULT_PRICE_FEED_TIMEOUT)
    }

    /// Fetches the latest updates of the given feeds.
    pub async fn latest(&self, feed_ids: &[String]) -> Result<HermesResponse, PricingError> {
        let url = self
            .base_url
            .join("v2/updates/price/latest")
            .map_err(|err| PricingError::Network(err.to_string()))?;

        let mut query: Vec<(&str, &str)> =
            feed_ids.iter().map(|id| ("ids[]", id.as_str())).collect();
        query.push(("parsed", "true"));

        trace!(%url, ?feed_ids, "Fetching prices");
        let response = self.client.get(url.clone()).query(&query).send().await.map_err(|err| {
            error!(%url, %err, "Failed to send request to price feed");
            PricingError::from(err)
        })?;

        response.error_for_status()?.json::<HermesResponse>().await.map_err(|err| {
            error!(%url, %err, "Failed to parse price feed response");
            PricingError::from(err)
        })
    }
}

#[async_trait]
impl PriceFeed for HermesClient {
    async fn fetch(&self, feed_id: &str) -> Result<RawPrice, PricingError> {
        let id = normalize_feed_id(feed_id);
        let response = self.latest(std::slice::from_ref(&id)).await?;
        select_price(&id, response)
    }
}

/// Picks the update of `feed_id` from a response.
fn select_price(feed_id: &str, response: HermesResponse) -> Result<RawPrice, PricingError> {
    if response.parsed.is_empty() {
        return Err(PricingError::InvalidPriceData {
            feed_id: feed_id.to_string(),
            reason: "empty result set".to_string(),
        });
    }

    response
        .parsed
        .into_iter()
        .find(|update| normalize_feed_id(&update.id) == feed_id)
        .map(|update| RawPrice {
            mantissa: update.price.price,
            exponent: update.price.expo,
            publish_time: update.price.publish_time,
        })
        .ok_or_else(|| PricingError::InvalidPriceData {
            feed_id: feed_id.to_string(),
            reason: "feed missing from response".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "binary": { "encoding": "hex", "data": [] },
        "parsed": [{
            "id": "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a",
            "price": { "price": "99991234", "conf": "81234", "expo": -8, "publish_time": 1718000000 },
            "ema_price": { "price": "99990000", "conf": "80000", "expo": -8, "publish_time": 1718000000 }
        }]
    }"#;

    #[test]
    fn parses_latest_updates() {
        let response: HermesResponse = serde_json::from_str(RESPONSE).unwrap();
        let raw = select_price(
            "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a",
            response,
        )
        .unwrap();

        assert_eq!(raw, RawPrice { mantissa: 99_991_234, exponent: -8, publish_time: 1718000000 });
    }

    #[test]
    fn accepts_numeric_and_aliased_fields() {
        let price: HermesPrice =
            serde_json::from_str(r#"{ "mantissa": 250000000000, "exponent": -8, "publishTime": 7 }"#)
                .unwrap();
        assert_eq!(price.price, 250_000_000_000);
        assert_eq!(price.expo, -8);
        assert_eq!(price.publish_time, 7);
    }

    #[test]
    fn rejects_empty_results() {
        let response: HermesResponse = serde_json::from_str(r#"{ "parsed": [] }"#).unwrap();
        assert!(matches!(
            select_price("eaa0", response),
            Err(PricingError::InvalidPriceData { .. })
        ));
    }
}
