//! Exchange price fetching and quorum aggregation
//!
//! Features:
//! - One fetcher per supported exchange, resolved at startup
//! - Concurrent fan-out with a per-fetcher timeout
//! - Quorum check before any price is trusted

pub mod aggregator;
pub mod fetchers;

pub use aggregator::{mean_price, AggregatorConfig, AggregatorStats, PriceAggregator};
pub use fetchers::{
    create_price_fetcher, create_price_fetchers, GraphqlGetter, GraphqlResponseGetter,
    HttpResponseGetter, PriceFetcher, ResponseGetter,
};
