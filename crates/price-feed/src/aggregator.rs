//! Price aggregator - quorum price across all registered fetchers

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use oracle_core::{AggregatedPrice, Pair, PairKey, PriceFeedError, PriceFeedResult, PriceSample};

use crate::fetchers::PriceFetcher;

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Successful samples required before a price is trusted
    pub min_results_num: usize,
    /// Upper bound on a single fetcher call
    pub fetch_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_results_num: 1,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Main price aggregator
pub struct PriceAggregator {
    config: AggregatorConfig,
    fetchers: Vec<Arc<dyn PriceFetcher>>,

    /// Stats
    aggregations: AtomicU64,
    quorum_failures: AtomicU64,
    abstentions: AtomicU64,
}

impl PriceAggregator {
    pub fn new(
        config: AggregatorConfig,
        fetchers: Vec<Arc<dyn PriceFetcher>>,
    ) -> PriceFeedResult<Self> {
        if config.min_results_num == 0 {
            return Err(PriceFeedError::InvalidArgument(
                "min_results_num must be at least 1".into(),
            ));
        }
        if fetchers.is_empty() {
            return Err(PriceFeedError::InvalidArgument("no price fetchers".into()));
        }
        if config.fetch_timeout.is_zero() {
            return Err(PriceFeedError::InvalidArgument(
                "fetch timeout must be positive".into(),
            ));
        }

        Ok(Self {
            config,
            fetchers,
            aggregations: AtomicU64::new(0),
            quorum_failures: AtomicU64::new(0),
            abstentions: AtomicU64::new(0),
        })
    }

    pub fn fetchers(&self) -> &[Arc<dyn PriceFetcher>] {
        &self.fetchers
    }

    /// Query every fetcher concurrently, keeping only the successful samples
    pub async fn collect_samples(&self, base: &str, quote: &str) -> Vec<PriceSample> {
        let timeout = self.config.fetch_timeout;
        let calls = self.fetchers.iter().map(|fetcher| async move {
            let outcome = match tokio::time::timeout(timeout, fetcher.fetch_price(base, quote)).await
            {
                Ok(result) => result,
                Err(_) => Err(PriceFeedError::Timeout {
                    exchange: fetcher.name().to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            (fetcher.name(), outcome)
        });

        let mut samples = Vec::with_capacity(self.fetchers.len());
        for (exchange, outcome) in join_all(calls).await {
            match outcome {
                Ok(price) => samples.push(PriceSample {
                    exchange: exchange.to_string(),
                    base: base.to_string(),
                    quote: quote.to_string(),
                    price,
                    timestamp: Utc::now(),
                }),
                Err(e) => {
                    if !matches!(e, PriceFeedError::PairNotSupported { .. }) {
                        self.abstentions.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(exchange, base, quote, error = %e, "source abstained");
                }
            }
        }
        samples
    }

    /// Quorum price for a pair, unrounded
    pub async fn fetch_price(&self, base: &str, quote: &str) -> PriceFeedResult<AggregatedPrice> {
        let samples = self.collect_samples(base, quote).await;

        if samples.len() < self.config.min_results_num {
            self.quorum_failures.fetch_add(1, Ordering::Relaxed);
            return Err(PriceFeedError::InsufficientQuorum {
                base: base.to_string(),
                quote: quote.to_string(),
                got: samples.len(),
                required: self.config.min_results_num,
            });
        }

        let prices: Vec<Decimal> = samples.iter().map(|s| s.price).collect();
        let price = mean_price(&prices).ok_or_else(|| {
            PriceFeedError::InvalidArgument(format!("cannot average prices for {}-{}", base, quote))
        })?;

        self.aggregations.fetch_add(1, Ordering::Relaxed);
        debug!(base, quote, %price, num_sources = samples.len(), "aggregated price");

        Ok(AggregatedPrice {
            pair: PairKey::new(base, quote),
            price,
            num_sources: samples.len(),
            timestamp: Utc::now(),
        })
    }

    /// Quorum price for a configured pair, rounded to its decimals
    pub async fn fetch_pair_price(&self, pair: &Pair) -> PriceFeedResult<AggregatedPrice> {
        let aggregated = self.fetch_price(&pair.base, &pair.quote).await?;
        Ok(aggregated.rounded(pair.decimals))
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            fetcher_count: self.fetchers.len(),
            aggregations: self.aggregations.load(Ordering::Relaxed),
            quorum_failures: self.quorum_failures.load(Ordering::Relaxed),
            abstentions: self.abstentions.load(Ordering::Relaxed),
        }
    }
}

/// Arithmetic mean of the samples
///
/// Prices are summed in ascending order so the result does not depend on the
/// order the sources answered in. Returns `None` for an empty slice or on
/// overflow.
pub fn mean_price(prices: &[Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    let mut sorted = prices.to_vec();
    sorted.sort();

    let sum = sorted
        .iter()
        .try_fold(Decimal::ZERO, |acc, price| acc.checked_add(*price))?;
    sum.checked_div(Decimal::from(sorted.len()))
}

/// Statistics about aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub fetcher_count: usize,
    pub aggregations: u64,
    pub quorum_failures: u64,
    pub abstentions: u64,
}
