//! On-chain price notification

use alloy_primitives::B256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use oracle_core::{ExecutionResult, PairKey};

use crate::builder::TransactionBuilder;
use crate::nonce::NonceTransactionHandler;

/// New price of one pair, ready to be written on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    pub base: String,
    pub quote: String,
    pub price: Decimal,
    pub decimals: u32,
    pub timestamp: DateTime<Utc>,
}

impl PriceChange {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.base.clone(), self.quote.clone())
    }
}

/// Receiver of the prices the notifier decided to publish
#[async_trait]
pub trait PriceNotifee: Send + Sync {
    /// Publish all `changes` at once, returning the transaction hash
    async fn notify(&self, changes: &[PriceChange]) -> ExecutionResult<B256>;
}

/// Notifee writing price batches to the aggregator contract
pub struct ChainNotifee {
    builder: TransactionBuilder,
    handler: Arc<NonceTransactionHandler>,
}

impl ChainNotifee {
    pub fn new(builder: TransactionBuilder, handler: Arc<NonceTransactionHandler>) -> Self {
        Self { builder, handler }
    }
}

#[async_trait]
impl PriceNotifee for ChainNotifee {
    async fn notify(&self, changes: &[PriceChange]) -> ExecutionResult<B256> {
        let payload = self.builder.build_submit_batch(changes)?;
        let gas_limit = payload.gas_limit;
        let hash = self.handler.send_transaction(payload).await?;

        info!(
            contract = %self.builder.contract(),
            prices = changes.len(),
            gas_limit,
            hash = %hash,
            "price batch submitted"
        );
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::testing::{MockProxy, MockSigner};
    use alloy_primitives::Address;
    use oracle_core::ExecutionError;
    use std::str::FromStr;
    use std::time::Duration;

    fn change(price: &str) -> PriceChange {
        PriceChange {
            base: "EGLD".into(),
            quote: "USD".into(),
            price: Decimal::from_str(price).unwrap(),
            decimals: 2,
            timestamp: Utc::now(),
        }
    }

    fn notifee(proxy: Arc<MockProxy>) -> ChainNotifee {
        let handler =
            NonceTransactionHandler::new(proxy, Arc::new(MockSigner), Duration::from_secs(60)).unwrap();
        ChainNotifee::new(
            TransactionBuilder::new(Address::repeat_byte(0x42), 5_000_000, 1_500_000),
            Arc::new(handler),
        )
    }

    #[tokio::test]
    async fn test_notify_submits_one_transaction_per_batch() {
        let proxy = MockProxy::with_nonce(0);
        let notifee = notifee(proxy.clone());

        notifee.notify(&[change("10.1"), change("10.2")]).await.unwrap();

        let state = proxy.state.lock();
        assert_eq!(state.broadcasts.len(), 1);
        let tx = &state.broadcasts[0];
        assert_eq!(tx.receiver, Address::repeat_byte(0x42));
        assert_eq!(tx.gas_limit, 8_000_000);
        assert_eq!(tx.data.iter().filter(|b| **b == b'@').count(), 10);
    }

    #[tokio::test]
    async fn test_invalid_batches_never_reach_the_chain() {
        let proxy = MockProxy::with_nonce(0);
        let notifee = notifee(proxy.clone());

        assert!(matches!(
            notifee.notify(&[]).await,
            Err(ExecutionError::InvalidNotification(_))
        ));
        assert!(matches!(
            notifee.notify(&[change("-1")]).await,
            Err(ExecutionError::InvalidNotification(_))
        ));
        assert!(proxy.state.lock().broadcasts.is_empty());
    }
}
