//! Ticker fetchers for exchanges with a public REST API

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use oracle_core::{Exchange, PriceFeedError, PriceFeedResult};

use super::{decimal_from_value, ensure_positive, PairRegistry, PriceFetcher, ResponseGetter};

/// Fetcher reading the last traded price from a REST ticker endpoint
pub struct RestFetcher {
    exchange: Exchange,
    getter: Arc<dyn ResponseGetter>,
    pairs: PairRegistry,
}

impl RestFetcher {
    pub fn new(exchange: Exchange, getter: Arc<dyn ResponseGetter>) -> Self {
        Self {
            exchange,
            getter,
            pairs: PairRegistry::new(),
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    fn normalize_quote<'a>(&self, quote: &'a str) -> &'a str {
        if self.exchange.quotes_usd_as_usdt() && quote.eq_ignore_ascii_case("USD") {
            "USDT"
        } else {
            quote
        }
    }

    /// Ticker URL for a pair, `None` for exchanges without a REST ticker
    pub fn endpoint(&self, base: &str, quote: &str) -> Option<String> {
        let quote = self.normalize_quote(quote);
        let (b, q) = (base.to_uppercase(), quote.to_uppercase());
        let (lb, lq) = (base.to_lowercase(), quote.to_lowercase());

        let url = match self.exchange {
            Exchange::Binance => {
                format!("https://api.binance.com/api/v3/ticker/price?symbol={}{}", b, q)
            }
            Exchange::Bitfinex => format!("https://api.bitfinex.com/v1/pubticker/{}{}", lb, lq),
            Exchange::Cryptocom => format!(
                "https://api.crypto.com/v2/public/get-ticker?instrument_name={}_{}",
                b, q
            ),
            Exchange::Gemini => format!("https://api.gemini.com/v1/pubticker/{}{}", lb, lq),
            Exchange::Hitbtc => format!("https://api.hitbtc.com/api/3/public/ticker/{}{}", b, q),
            Exchange::Huobi => format!(
                "https://api.huobi.pro/market/detail/merged?symbol={}{}",
                lb, lq
            ),
            Exchange::Kraken => format!("https://api.kraken.com/0/public/Ticker?pair={}{}", b, q),
            Exchange::Okx => format!("https://www.okx.com/api/v5/market/ticker?instId={}-{}", b, q),
            Exchange::XExchange => return None,
        };
        Some(url)
    }

    /// Extract the last price from a ticker response
    pub fn parse(&self, body: &Value) -> Result<Decimal, String> {
        let field = match self.exchange {
            Exchange::Binance => body.get("price"),
            Exchange::Bitfinex => body.get("last_price"),
            Exchange::Cryptocom => {
                let data = body.pointer("/result/data");
                let ticker = match data {
                    Some(Value::Array(items)) => items.first(),
                    other => other,
                };
                ticker.and_then(|t| t.get("a"))
            }
            Exchange::Gemini | Exchange::Hitbtc => body.get("last"),
            Exchange::Huobi => body.pointer("/tick/close"),
            Exchange::Kraken => {
                if let Some(errors) = body.get("error").and_then(Value::as_array) {
                    if !errors.is_empty() {
                        return Err(format!("exchange errors: {:?}", errors));
                    }
                }
                body.get("result")
                    .and_then(Value::as_object)
                    .and_then(|result| result.values().next())
                    .and_then(|ticker| ticker.pointer("/c/0"))
            }
            Exchange::Okx => body.pointer("/data/0/last"),
            Exchange::XExchange => None,
        };

        let field = field.ok_or_else(|| "price field missing".to_string())?;
        decimal_from_value(field).ok_or_else(|| format!("unparsable price {}", field))
    }
}

#[async_trait]
impl PriceFetcher for RestFetcher {
    fn name(&self) -> &str {
        self.exchange.name()
    }

    fn add_pair(&self, base: &str, quote: &str) {
        self.pairs.add(base, quote);
    }

    async fn fetch_price(&self, base: &str, quote: &str) -> PriceFeedResult<Decimal> {
        let url = match self.endpoint(base, quote) {
            Some(url) if self.pairs.contains(base, quote) => url,
            _ => {
                return Err(PriceFeedError::PairNotSupported {
                    exchange: self.name().to_string(),
                    base: base.to_string(),
                    quote: quote.to_string(),
                })
            }
        };
        let body = self
            .getter
            .get(&url)
            .await
            .map_err(|e| PriceFeedError::RequestFailed {
                exchange: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let price = self.parse(&body).map_err(|reason| PriceFeedError::InvalidResponse {
            exchange: self.name().to_string(),
            reason,
        })?;

        debug!(exchange = self.name(), base, quote, %price, "fetched price");
        ensure_positive(self.name(), price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::testing::CannedGetter;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn fetcher(exchange: Exchange) -> RestFetcher {
        RestFetcher::new(exchange, Arc::new(CannedGetter::default()))
    }

    #[test]
    fn test_usd_quote_normalisation() {
        assert!(fetcher(Exchange::Binance)
            .endpoint("EGLD", "USD")
            .unwrap()
            .ends_with("symbol=EGLDUSDT"));
        assert!(fetcher(Exchange::Okx).endpoint("egld", "usd").unwrap().ends_with("instId=EGLD-USDT"));
        assert!(fetcher(Exchange::Bitfinex).endpoint("EGLD", "USD").unwrap().ends_with("/egldusd"));
        assert!(fetcher(Exchange::Kraken).endpoint("EGLD", "USD").unwrap().ends_with("pair=EGLDUSD"));
        assert!(fetcher(Exchange::Binance)
            .endpoint("EGLD", "BTC")
            .unwrap()
            .ends_with("symbol=EGLDBTC"));
        assert!(fetcher(Exchange::XExchange).endpoint("EGLD", "USD").is_none());
    }

    #[test]
    fn test_parse_ticker_shapes() {
        let cases = vec![
            (Exchange::Binance, json!({"symbol": "EGLDUSDT", "price": "41.23000000"}), "41.23"),
            (Exchange::Bitfinex, json!({"mid": "41.2", "last_price": "41.25"}), "41.25"),
            (Exchange::Cryptocom, json!({"result": {"data": [{"i": "EGLD_USDT", "a": "41.3"}]}}), "41.3"),
            (Exchange::Cryptocom, json!({"result": {"data": {"a": 41.31}}}), "41.31"),
            (Exchange::Gemini, json!({"last": "41.4"}), "41.4"),
            (Exchange::Hitbtc, json!({"last": "41.5"}), "41.5"),
            (Exchange::Huobi, json!({"status": "ok", "tick": {"close": 41.6}}), "41.6"),
            (Exchange::Kraken, json!({"error": [], "result": {"EGLDUSD": {"c": ["41.7", "2.0"]}}}), "41.7"),
            (Exchange::Okx, json!({"code": "0", "data": [{"instId": "EGLD-USDT", "last": "41.8"}]}), "41.8"),
        ];

        for (exchange, body, expected) in cases {
            assert_eq!(fetcher(exchange).parse(&body).unwrap(), dec(expected), "{}", exchange);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(fetcher(Exchange::Binance).parse(&json!({"code": -1121})).is_err());
        assert!(fetcher(Exchange::Kraken)
            .parse(&json!({"error": ["EQuery:Unknown asset pair"]}))
            .is_err());
        assert!(fetcher(Exchange::Okx).parse(&json!({"data": []})).is_err());
        assert!(fetcher(Exchange::Gemini).parse(&json!({"last": "abc"})).is_err());
    }

    #[tokio::test]
    async fn test_fetch_requires_registered_pair() {
        let url = "https://api.gemini.com/v1/pubticker/egldusd";
        let getter = Arc::new(CannedGetter::with(url, json!({"last": "40.1"})));
        let fetcher = RestFetcher::new(Exchange::Gemini, getter.clone());

        let err = fetcher.fetch_price("EGLD", "USD").await.unwrap_err();
        assert!(matches!(err, PriceFeedError::PairNotSupported { .. }));
        assert!(getter.requests.lock().is_empty());

        fetcher.add_pair("EGLD", "USD");
        assert_eq!(fetcher.fetch_price("EGLD", "USD").await.unwrap(), dec("40.1"));
        assert_eq!(getter.requests.lock().as_slice(), &[url.to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_positive_price() {
        let url = "https://api.gemini.com/v1/pubticker/egldusd";
        let getter = Arc::new(CannedGetter::with(url, json!({"last": "0"})));
        let fetcher = RestFetcher::new(Exchange::Gemini, getter);
        fetcher.add_pair("EGLD", "USD");

        let err = fetcher.fetch_price("EGLD", "USD").await.unwrap_err();
        assert!(matches!(err, PriceFeedError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_is_request_error() {
        let fetcher = fetcher(Exchange::Huobi);
        fetcher.add_pair("EGLD", "USD");

        let err = fetcher.fetch_price("EGLD", "USD").await.unwrap_err();
        assert!(matches!(err, PriceFeedError::RequestFailed { ref exchange, .. } if exchange == "huobi"));
    }
}
