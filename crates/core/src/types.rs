//! Core type definitions

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Highest number of decimals a `Decimal` can carry
pub const MAX_DECIMALS: u32 = 28;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Bitfinex,
    Cryptocom,
    Gemini,
    Hitbtc,
    Huobi,
    Kraken,
    Okx,
    XExchange,
}

impl Exchange {
    pub const ALL: [Exchange; 9] = [
        Exchange::Binance,
        Exchange::Bitfinex,
        Exchange::Cryptocom,
        Exchange::Gemini,
        Exchange::Hitbtc,
        Exchange::Huobi,
        Exchange::Kraken,
        Exchange::Okx,
        Exchange::XExchange,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Bitfinex => "bitfinex",
            Exchange::Cryptocom => "cryptocom",
            Exchange::Gemini => "gemini",
            Exchange::Hitbtc => "hitbtc",
            Exchange::Huobi => "huobi",
            Exchange::Kraken => "kraken",
            Exchange::Okx => "okx",
            Exchange::XExchange => "xexchange",
        }
    }

    /// Whether the exchange lists USD-stable markets against USDT instead of USD
    pub fn quotes_usd_as_usdt(&self) -> bool {
        matches!(
            self,
            Exchange::Binance
                | Exchange::Huobi
                | Exchange::Okx
                | Exchange::Cryptocom
                | Exchange::Hitbtc
        )
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Exchange::ALL
            .iter()
            .find(|e| e.name() == lower)
            .copied()
            .ok_or_else(|| format!("unknown exchange '{}'", s))
    }
}

/// Base/quote identifier of a price feed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub base: String,
    pub quote: String,
}

impl PairKey {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// One configured on-chain price feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub base: String,
    pub quote: String,
    /// Minimum move, in percent, that triggers a notification
    pub percent_difference_to_notify: Decimal,
    pub decimals: u32,
    pub exchanges: BTreeSet<Exchange>,
}

impl Pair {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.base.clone(), self.quote.clone())
    }

    pub fn uses_exchange(&self, exchange: Exchange) -> bool {
        self.exchanges.contains(&exchange)
    }
}

/// Price reported by a single exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSample {
    pub exchange: String,
    pub base: String,
    pub quote: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Quorum price computed from the samples of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedPrice {
    pub pair: PairKey,
    pub price: Decimal,
    pub num_sources: usize,
    pub timestamp: DateTime<Utc>,
}

impl AggregatedPrice {
    /// Round the price half away from zero to `decimals` places
    pub fn rounded(mut self, decimals: u32) -> Self {
        self.price = self
            .price
            .round_dp_with_strategy(decimals.min(MAX_DECIMALS), RoundingStrategy::MidpointAwayFromZero);
        self
    }
}

/// Relative move between two prices, in percent
///
/// Returns `None` when there is no usable baseline (zero old price).
pub fn percent_change(old: Decimal, new: Decimal) -> Option<Decimal> {
    if old.is_zero() {
        return None;
    }
    let diff = (new - old).abs();
    diff.checked_div(old.abs())
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}
