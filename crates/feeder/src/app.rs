//! Startup wiring: configuration in, running polling loop out

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use oracle_core::{Pair, PriceNotifierConfig};
use oracle_executor::{
    BlockchainProxy, ChainNotifee, GatewayProxy, LocalKeySigner, NonceTransactionHandler,
    TransactionBuilder, TxSigner,
};
use oracle_notifier::{PollingHandler, PriceNotifier, SystemClock};
use oracle_price_feed::{
    create_price_fetchers, AggregatorConfig, GraphqlGetter, GraphqlResponseGetter,
    HttpResponseGetter, PriceAggregator, PriceFetcher, ResponseGetter,
};

use crate::cli::Args;

/// Running feeder: the polling loop and the nonce handler behind it
pub struct App {
    polling: PollingHandler,
    nonce_handler: Arc<NonceTransactionHandler>,
}

impl App {
    /// Load the configuration and build every component
    ///
    /// Any failure here is fatal; nothing has been started yet.
    pub async fn build(args: &Args) -> anyhow::Result<Self> {
        let config_path = args.config_path();
        let cfg = PriceNotifierConfig::load(&config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
        let general = &cfg.general;

        let token_ids_mappings = cfg.token_ids_mappings();
        for (key, mapping) in token_ids_mappings.iter() {
            info!(key = %key, base = %mapping.base, quote = %mapping.quote, "read xExchange token IDs mapping");
        }

        if general.network_address.trim().is_empty() {
            anyhow::bail!("empty network_address in config file");
        }

        let pairs = cfg.to_pairs().context("invalid pair configuration")?;

        // Price sources
        let http: Arc<dyn ResponseGetter> = Arc::new(
            HttpResponseGetter::new(general.fetch_timeout()).context("failed to build HTTP client")?,
        );
        let graphql: Arc<dyn GraphqlGetter> = Arc::new(
            GraphqlResponseGetter::new(general.fetch_timeout())
                .context("failed to build GraphQL client")?,
        );
        let fetchers = create_price_fetchers(http, graphql, &token_ids_mappings);
        register_pairs(&pairs, &fetchers);

        let aggregator = PriceAggregator::new(
            AggregatorConfig {
                min_results_num: general.min_results_num,
                fetch_timeout: general.fetch_timeout(),
            },
            fetchers,
        )
        .context("failed to create price aggregator")?;

        // Chain side
        let proxy = GatewayProxy::new(&general.network_address, general.proxy_request_timeout())
            .context("failed to create gateway proxy")?;
        let network = proxy
            .network_config()
            .await
            .with_context(|| format!("network {} unreachable", general.network_address))?;
        info!(
            network = %general.network_address,
            chain_id = %network.chain_id,
            min_gas_price = network.min_gas_price,
            "connected to network"
        );

        let key_file = args.resolve(&general.private_key_file);
        let signer = LocalKeySigner::load_from_file(&key_file)
            .with_context(|| format!("failed to load private key {}", key_file.display()))?;
        info!(address = %signer.address(), "loaded signing key");

        let nonce_handler = Arc::new(
            NonceTransactionHandler::new(
                Arc::new(proxy),
                Arc::new(signer),
                general.interval_to_resend_txs(),
            )
            .context("failed to create nonce transaction handler")?,
        );

        let contract = general
            .contract_address()
            .context("invalid aggregator contract address")?;
        let notifee = ChainNotifee::new(
            TransactionBuilder::new(contract, general.base_gas_limit, general.gas_limit_for_each),
            Arc::clone(&nonce_handler),
        );

        let notifier = PriceNotifier::new(
            pairs,
            Arc::new(aggregator),
            Arc::new(notifee),
            general.auto_send_interval(),
            Arc::new(SystemClock),
        )
        .context("failed to create price notifier")?;

        let polling = PollingHandler::new(
            Arc::new(notifier),
            general.poll_interval(),
            general.poll_interval_when_error(),
        )
        .context("failed to create polling handler")?;

        Ok(Self {
            polling,
            nonce_handler,
        })
    }

    pub fn start(&self) -> anyhow::Result<()> {
        self.polling.start()
    }

    /// Stop the polling loop, then the resend task
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        info!("application closing, closing polling handler");
        let result = self.polling.close().await;
        self.nonce_handler.close().await;

        let stats = self.polling.stats();
        let tx_stats = self.nonce_handler.stats();
        info!(
            cycles = stats.cycles,
            failed_cycles = stats.failures,
            sent = tx_stats.sent,
            resent = tx_stats.resent,
            resyncs = tx_stats.resyncs,
            "shutdown complete"
        );
        result
    }
}

/// Register each pair with exactly the fetchers its configuration names
pub fn register_pairs(pairs: &[Pair], fetchers: &[Arc<dyn PriceFetcher>]) {
    for pair in pairs {
        let mut registered = 0usize;
        for fetcher in fetchers {
            if pair.exchanges.iter().any(|e| e.name() == fetcher.name()) {
                fetcher.add_pair(&pair.base, &pair.quote);
                registered += 1;
            }
        }

        if registered < pair.exchanges.len() {
            warn!(
                pair = %pair.key(),
                configured = pair.exchanges.len(),
                registered,
                "some configured exchanges have no fetcher"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oracle_core::{Exchange, PriceFeedError, PriceFeedResult};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    /// Fetcher remembering which pairs were registered with it
    struct RecordingFetcher {
        name: &'static str,
        added: Mutex<Vec<String>>,
    }

    impl RecordingFetcher {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                added: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PriceFetcher for RecordingFetcher {
        fn name(&self) -> &str {
            self.name
        }

        fn add_pair(&self, base: &str, quote: &str) {
            self.added.lock().push(format!("{}-{}", base, quote));
        }

        async fn fetch_price(&self, base: &str, quote: &str) -> PriceFeedResult<Decimal> {
            Err(PriceFeedError::PairNotSupported {
                exchange: self.name.to_string(),
                base: base.to_string(),
                quote: quote.to_string(),
            })
        }
    }

    fn pair(base: &str, quote: &str, exchanges: &[Exchange]) -> Pair {
        Pair {
            base: base.into(),
            quote: quote.into(),
            percent_difference_to_notify: Decimal::ONE,
            decimals: 2,
            exchanges: exchanges.iter().copied().collect(),
        }
    }

    #[test]
    fn test_pairs_registered_only_with_configured_exchanges() {
        let binance = RecordingFetcher::new(Exchange::Binance.name());
        let kraken = RecordingFetcher::new(Exchange::Kraken.name());
        let xexchange = RecordingFetcher::new(Exchange::XExchange.name());
        let fetchers: Vec<Arc<dyn PriceFetcher>> = vec![
            binance.clone(),
            kraken.clone(),
            xexchange.clone(),
        ];

        let pairs = vec![
            pair("EGLD", "USD", &[Exchange::Binance, Exchange::Kraken]),
            pair("EGLD", "USDC", &[Exchange::XExchange, Exchange::Binance]),
        ];
        register_pairs(&pairs, &fetchers);

        assert_eq!(*binance.added.lock(), vec!["EGLD-USD", "EGLD-USDC"]);
        assert_eq!(*kraken.added.lock(), vec!["EGLD-USD"]);
        assert_eq!(*xexchange.added.lock(), vec!["EGLD-USDC"]);
    }

    #[test]
    fn test_exchange_without_fetcher_is_skipped() {
        let okx = RecordingFetcher::new(Exchange::Okx.name());
        let fetchers: Vec<Arc<dyn PriceFetcher>> = vec![okx.clone()];

        register_pairs(&[pair("BTC", "USD", &[Exchange::Okx, Exchange::Gemini])], &fetchers);

        assert_eq!(*okx.added.lock(), vec!["BTC-USD"]);
    }

    #[tokio::test]
    async fn test_build_fails_on_missing_config() {
        let args = Args {
            config: "does/not/exist.toml".into(),
            log_level: "info".into(),
            log_json: false,
            disable_ansi_color: false,
            working_directory: None,
        };
        let err = App::build(&args).await.err().unwrap();
        assert!(format!("{:#}", err).contains("failed to load config"));
    }
}
