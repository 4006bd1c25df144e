//! Configuration types

use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

use crate::{CoreError, CoreResult, Exchange, Pair, TokenIdsMappings, XExchangeTokensPair, MAX_DECIMALS};

/// Prefix of environment variables overriding file values
pub const ENV_PREFIX: &str = "PRICE_FEEDER";

/// General notifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralNotifierConfig {
    pub network_address: String,
    pub private_key_file: String,
    pub interval_to_resend_txs_in_seconds: u64,
    pub aggregator_contract_address: String,
    pub base_gas_limit: u64,
    pub gas_limit_for_each: u64,
    pub min_results_num: usize,
    pub poll_interval_in_seconds: u64,
    #[serde(default)]
    pub poll_interval_when_error_in_seconds: Option<u64>,
    pub auto_send_interval_in_seconds: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_in_seconds: u64,
    #[serde(default = "default_proxy_timeout")]
    pub proxy_request_timeout_in_seconds: u64,
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_proxy_timeout() -> u64 {
    30
}

impl GeneralNotifierConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_in_seconds)
    }

    pub fn poll_interval_when_error(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_when_error_in_seconds
                .unwrap_or(self.poll_interval_in_seconds),
        )
    }

    pub fn auto_send_interval(&self) -> Duration {
        Duration::from_secs(self.auto_send_interval_in_seconds)
    }

    pub fn interval_to_resend_txs(&self) -> Duration {
        Duration::from_secs(self.interval_to_resend_txs_in_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_in_seconds)
    }

    pub fn proxy_request_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_request_timeout_in_seconds)
    }

    pub fn contract_address(&self) -> CoreResult<Address> {
        self.aggregator_contract_address.parse().map_err(|e| {
            CoreError::InvalidConfig(format!(
                "aggregator_contract_address '{}': {}",
                self.aggregator_contract_address, e
            ))
        })
    }
}

/// Pair as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub base: String,
    pub quote: String,
    pub percent_difference_to_notify: Decimal,
    pub decimals: u32,
    pub exchanges: Vec<String>,
}

impl PairConfig {
    /// Validate and convert into a [`Pair`]
    pub fn to_pair(&self) -> CoreResult<Pair> {
        if self.base.trim().is_empty() || self.quote.trim().is_empty() {
            return Err(CoreError::InvalidConfig("pair with empty base or quote".into()));
        }
        if self.percent_difference_to_notify.is_sign_negative() {
            return Err(CoreError::InvalidConfig(format!(
                "pair {}-{}: negative percent_difference_to_notify",
                self.base, self.quote
            )));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(CoreError::InvalidConfig(format!(
                "pair {}-{}: decimals {} above maximum {}",
                self.base, self.quote, self.decimals, MAX_DECIMALS
            )));
        }
        if self.exchanges.is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "pair {}-{}: no exchanges configured",
                self.base, self.quote
            )));
        }

        let exchanges = self
            .exchanges
            .iter()
            .map(|name| name.parse::<Exchange>().map_err(CoreError::UnknownExchange))
            .collect::<CoreResult<BTreeSet<_>>>()?;

        Ok(Pair {
            base: self.base.trim().to_string(),
            quote: self.quote.trim().to_string(),
            percent_difference_to_notify: self.percent_difference_to_notify,
            decimals: self.decimals,
            exchanges,
        })
    }
}

/// Complete feeder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceNotifierConfig {
    pub general: GeneralNotifierConfig,
    pub pairs: Vec<PairConfig>,
    #[serde(default)]
    pub xexchange_token_ids_mappings: HashMap<String, XExchangeTokensPair>,
}

impl PriceNotifierConfig {
    /// Load from a TOML file, with `PRICE_FEEDER_*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let cfg: Self = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse from an in-memory TOML document
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let cfg: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(content, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let general = &self.general;

        if general.network_address.trim().is_empty() {
            return Err(CoreError::InvalidConfig("empty network_address".into()));
        }
        if general.private_key_file.trim().is_empty() {
            return Err(CoreError::InvalidConfig("empty private_key_file".into()));
        }
        if general.min_results_num == 0 {
            return Err(CoreError::InvalidConfig("min_results_num must be at least 1".into()));
        }
        if general.poll_interval_in_seconds == 0 {
            return Err(CoreError::InvalidConfig("poll_interval_in_seconds must be positive".into()));
        }
        if general.poll_interval_when_error_in_seconds == Some(0) {
            return Err(CoreError::InvalidConfig(
                "poll_interval_when_error_in_seconds must be positive".into(),
            ));
        }
        if general.interval_to_resend_txs_in_seconds == 0 {
            return Err(CoreError::InvalidConfig(
                "interval_to_resend_txs_in_seconds must be positive".into(),
            ));
        }
        if general.fetch_timeout_in_seconds == 0 {
            return Err(CoreError::InvalidConfig("fetch_timeout_in_seconds must be positive".into()));
        }
        general.contract_address()?;

        if self.pairs.is_empty() {
            return Err(CoreError::InvalidConfig("no pairs configured".into()));
        }
        let pairs = self.to_pairs()?;

        let mut seen = BTreeSet::new();
        for pair in &pairs {
            if !seen.insert(pair.key()) {
                return Err(CoreError::InvalidConfig(format!("duplicate pair {}", pair.key())));
            }
        }

        Ok(())
    }

    pub fn to_pairs(&self) -> CoreResult<Vec<Pair>> {
        self.pairs.iter().map(PairConfig::to_pair).collect()
    }

    pub fn token_ids_mappings(&self) -> TokenIdsMappings {
        TokenIdsMappings::new(self.xexchange_token_ids_mappings.clone())
    }
}
