//! Exchange price fetchers
//!
//! Each supported [`Exchange`] resolves to exactly one fetcher instance at
//! startup through [`create_price_fetchers`]. Fetchers only answer for pairs
//! registered beforehand with [`PriceFetcher::add_pair`].

mod rest;
mod transport;
mod xexchange;

pub use rest::RestFetcher;
pub use transport::{GraphqlGetter, GraphqlResponseGetter, HttpResponseGetter, ResponseGetter};
pub use xexchange::{XExchangeFetcher, XEXCHANGE_GRAPHQL_URL};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use oracle_core::{Exchange, PairKey, PriceFeedError, PriceFeedResult, TokenIdsMappings};

/// Base trait for price fetchers
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Exchange name, as used in the pair configuration
    fn name(&self) -> &str;

    /// Register interest in a pair ahead of the first fetch
    fn add_pair(&self, base: &str, quote: &str);

    /// Current price of one `base` expressed in `quote`
    async fn fetch_price(&self, base: &str, quote: &str) -> PriceFeedResult<Decimal>;
}

/// Set of pairs a fetcher agreed to serve
#[derive(Debug, Default)]
pub struct PairRegistry {
    pairs: RwLock<HashSet<PairKey>>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, base: &str, quote: &str) {
        self.pairs.write().insert(PairKey::new(base, quote));
    }

    pub fn contains(&self, base: &str, quote: &str) -> bool {
        self.pairs.read().contains(&PairKey::new(base, quote))
    }

    pub fn len(&self) -> usize {
        self.pairs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.read().is_empty()
    }
}

/// Build one fetcher for a given exchange
pub fn create_price_fetcher(
    exchange: Exchange,
    http: Arc<dyn ResponseGetter>,
    graphql: Arc<dyn GraphqlGetter>,
    mappings: &TokenIdsMappings,
) -> Arc<dyn PriceFetcher> {
    match exchange {
        Exchange::Binance
        | Exchange::Bitfinex
        | Exchange::Cryptocom
        | Exchange::Gemini
        | Exchange::Hitbtc
        | Exchange::Huobi
        | Exchange::Kraken
        | Exchange::Okx => Arc::new(RestFetcher::new(exchange, http)),
        Exchange::XExchange => Arc::new(XExchangeFetcher::new(
            graphql,
            mappings.clone(),
            XEXCHANGE_GRAPHQL_URL,
        )),
    }
}

/// Build the fixed fetcher list, one per supported exchange
pub fn create_price_fetchers(
    http: Arc<dyn ResponseGetter>,
    graphql: Arc<dyn GraphqlGetter>,
    mappings: &TokenIdsMappings,
) -> Vec<Arc<dyn PriceFetcher>> {
    Exchange::ALL
        .iter()
        .map(|exchange| {
            create_price_fetcher(*exchange, Arc::clone(&http), Arc::clone(&graphql), mappings)
        })
        .collect()
}

/// Parse a JSON price that may be encoded as a string or a number
pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Reject zero and negative prices
pub(crate) fn ensure_positive(exchange: &str, price: Decimal) -> PriceFeedResult<Decimal> {
    if price <= Decimal::ZERO {
        return Err(PriceFeedError::InvalidResponse {
            exchange: exchange.to_string(),
            reason: format!("non-positive price {}", price),
        });
    }
    Ok(price)
}
