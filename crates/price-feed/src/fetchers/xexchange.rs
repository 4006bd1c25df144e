//! xExchange fetcher
//!
//! xExchange identifies tokens by on-chain identifier, so pairs are resolved
//! through the configured token-ID mappings when they are registered. The
//! price of `base` in `quote` is the ratio of the two tokens' USD prices.

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use oracle_core::{
    Exchange, PairKey, PriceFeedError, PriceFeedResult, TokenIdsMappings, XExchangeTokensPair,
};

use super::{decimal_from_value, ensure_positive, GraphqlGetter, PriceFetcher};

pub const XEXCHANGE_GRAPHQL_URL: &str = "https://graph.xexchange.com/graphql";

const TOKEN_PRICES_QUERY: &str = "query tokenPrices($base: String!, $quote: String!) { \
     base: token(id: $base) { price } \
     quote: token(id: $quote) { price } }";

pub struct XExchangeFetcher {
    graphql: Arc<dyn GraphqlGetter>,
    mappings: TokenIdsMappings,
    url: String,
    /// Pairs registered through `add_pair`, with their resolved token IDs
    resolved: RwLock<HashMap<PairKey, XExchangeTokensPair>>,
}

impl XExchangeFetcher {
    pub fn new(
        graphql: Arc<dyn GraphqlGetter>,
        mappings: TokenIdsMappings,
        url: impl Into<String>,
    ) -> Self {
        Self {
            graphql,
            mappings,
            url: url.into(),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    fn token_price(document: &Value, alias: &str) -> Result<Decimal, String> {
        let pointer = format!("/data/{}/price", alias);
        let field = document
            .pointer(&pointer)
            .ok_or_else(|| format!("{} price missing", alias))?;
        decimal_from_value(field).ok_or_else(|| format!("unparsable {} price {}", alias, field))
    }

    fn invalid(&self, reason: String) -> PriceFeedError {
        PriceFeedError::InvalidResponse {
            exchange: self.name().to_string(),
            reason,
        }
    }
}

#[async_trait]
impl PriceFetcher for XExchangeFetcher {
    fn name(&self) -> &str {
        Exchange::XExchange.name()
    }

    fn add_pair(&self, base: &str, quote: &str) {
        let key = PairKey::new(base, quote);
        match self.mappings.get(&key) {
            Some(ids) => {
                debug!(pair = %key, base_id = %ids.base, quote_id = %ids.quote, "resolved xExchange token IDs");
                self.resolved.write().insert(key, ids.clone());
            }
            None => warn!(pair = %key, "no xExchange token IDs mapping, pair will not be served"),
        }
    }

    async fn fetch_price(&self, base: &str, quote: &str) -> PriceFeedResult<Decimal> {
        let ids = self
            .resolved
            .read()
            .get(&PairKey::new(base, quote))
            .cloned()
            .ok_or_else(|| PriceFeedError::PairNotSupported {
                exchange: self.name().to_string(),
                base: base.to_string(),
                quote: quote.to_string(),
            })?;

        let variables = json!({ "base": ids.base, "quote": ids.quote });
        let document = self
            .graphql
            .query(&self.url, TOKEN_PRICES_QUERY, variables)
            .await
            .map_err(|e| PriceFeedError::RequestFailed {
                exchange: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let base_usd = Self::token_price(&document, "base").map_err(|r| self.invalid(r))?;
        let quote_usd = Self::token_price(&document, "quote").map_err(|r| self.invalid(r))?;
        let quote_usd = ensure_positive(self.name(), quote_usd)?;

        let price = base_usd
            .checked_div(quote_usd)
            .ok_or_else(|| self.invalid("price ratio overflow".to_string()))?;
        ensure_positive(self.name(), price)
    }
}
