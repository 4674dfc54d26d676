use super::{PriceFeed, metrics::FeedMetrics, normalize_feed_id};
use crate::{cache::TtlCache, constants::PRICE_TTL, error::PricingError};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{trace, warn};

/// A USD price and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    /// Normalized feed id.
    pub feed_id: String,
    /// USD price of one whole token.
    pub usd_price: f64,
    /// When the price was fetched.
    pub fetched_at: Instant,
    /// Whether the quote outlived its TTL and is served because a refresh failed.
    pub stale: bool,
}

/// Cached USD price lookups backed by a [`PriceFeed`].
///
/// A quote is refreshed once it is older than the TTL. Concurrent lookups of the same feed share
/// one outbound fetch. If a refresh fails, the last good quote is returned tagged as stale.
#[derive(Debug, Clone)]
pub struct PriceOracle {
    /// Upstream feed.
    feed: Arc<dyn PriceFeed>,
    /// Last good prices by normalized feed id.
    cache: Arc<TtlCache<String, f64, PricingError>>,
    /// Constant price returned for every feed. For testing only.
    constant_price: Option<f64>,
}

impl PriceOracle {
    /// Creates an oracle with the default TTL.
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self::with_ttl(feed, PRICE_TTL)
    }

    /// Creates an oracle with a custom TTL.
    pub fn with_ttl(feed: Arc<dyn PriceFeed>, ttl: Duration) -> Self {
        Self { feed, cache: Arc::new(TtlCache::new("price", ttl)), constant_price: None }
    }

    /// Returns [`Self`] with a constant price for every feed.
    pub fn with_constant_price(mut self, price: Option<f64>) -> Self {
        self.constant_price = price;
        self
    }

    /// Returns the USD price of `feed_id`.
    pub async fn usd_price(&self, feed_id: &str) -> Result<PriceQuote, PricingError> {
        let feed_id = normalize_feed_id(feed_id);
        if let Some(usd_price) = self.constant_price {
            return Ok(PriceQuote { feed_id, usd_price, fetched_at: Instant::now(), stale: false });
        }

        let metrics = FeedMetrics::new_with_labels(&[("feed", feed_id.clone())]);
        let result = self
            .cache
            .get_or_refresh(&feed_id, || async {
                metrics.fetches.increment(1);
                self.feed.fetch(&feed_id).await?.to_usd(&feed_id)
            })
            .await;

        match result {
            Ok((cached, fetched)) => {
                if fetched {
                    trace!(%feed_id, usd_price = cached.value, "Fetched USD price");
                    metrics.price.set(cached.value);
                } else {
                    metrics.cache_hits.increment(1);
                }
                Ok(PriceQuote {
                    feed_id,
                    usd_price: cached.value,
                    fetched_at: cached.fetched_at,
                    stale: false,
                })
            }
            Err(err) => {
                metrics.fetch_failures.increment(1);
                let Some(cached) = self.cache.get_any(&feed_id) else {
                    warn!(%feed_id, %err, "Price unavailable");
                    return Err(match err {
                        err @ PricingError::InvalidPriceData { .. } => err,
                        _ => PricingError::PriceUnavailable(feed_id),
                    });
                };

                warn!(
                    %feed_id,
                    %err,
                    age = ?cached.fetched_at.elapsed(),
                    "Price refresh failed, serving stale price"
                );
                metrics.stale_hits.increment(1);
                Ok(PriceQuote {
                    feed_id,
                    usd_price: cached.value,
                    fetched_at: cached.fetched_at,
                    stale: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::RawPrice;
    use async_trait::async_trait;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug)]
    struct FakeFeed {
        response: Mutex<Result<RawPrice, PricingError>>,
        calls: AtomicUsize,
    }

    impl FakeFeed {
        fn new(mantissa: i64) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Ok(RawPrice { mantissa, exponent: -2, publish_time: 0 })),
                calls: AtomicUsize::new(0),
            })
        }

        fn set(&self, response: Result<RawPrice, PricingError>) {
            *self.response.lock().unwrap() = response;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceFeed for FakeFeed {
        async fn fetch(&self, _feed_id: &str) -> Result<RawPrice, PricingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.lock().unwrap().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lookups_within_ttl_share_one_fetch() {
        let feed = FakeFeed::new(250_000);
        let oracle = PriceOracle::new(feed.clone());

        let first = oracle.usd_price("0xETH").await.unwrap();
        tokio::time::advance(Duration::from_secs(29)).await;
        let second = oracle.usd_price("eth").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.usd_price, 2500.0);
        assert_eq!(feed.calls(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        oracle.usd_price("eth").await.unwrap();
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_serves_stale_quote() {
        let feed = FakeFeed::new(100);
        let oracle = PriceOracle::new(feed.clone());
        oracle.usd_price("usdc").await.unwrap();

        feed.set(Err(PricingError::Network("timeout".to_string())));
        tokio::time::advance(Duration::from_secs(31)).await;

        let quote = oracle.usd_price("usdc").await.unwrap();
        assert!(quote.stale);
        assert_eq!(quote.usd_price, 1.0);
    }

    #[tokio::test]
    async fn unavailable_without_previous_quote() {
        let feed = FakeFeed::new(100);
        feed.set(Err(PricingError::Network("timeout".to_string())));
        let oracle = PriceOracle::new(feed);

        assert!(matches!(oracle.usd_price("usdc").await, Err(PricingError::PriceUnavailable(_))));
    }

    #[tokio::test]
    async fn rejects_non_positive_prices() {
        let oracle = PriceOracle::new(FakeFeed::new(0));
        assert!(matches!(
            oracle.usd_price("usdc").await,
            Err(PricingError::InvalidPriceData { .. })
        ));
    }

    #[tokio::test]
    async fn constant_price_skips_the_feed() {
        let feed = FakeFeed::new(100);
        let oracle = PriceOracle::new(feed.clone()).with_constant_price(Some(3.0));
        assert_eq!(oracle.usd_price("usdc").await.unwrap().usd_price, 3.0);
        assert_eq!(feed.calls(), 0);
    }
}
