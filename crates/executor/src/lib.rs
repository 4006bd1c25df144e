//! Signed transaction submission to the aggregator contract
//!
//! Features:
//! - Batched `submitBatch` call data and gas sizing
//! - Serialized nonce allocation per account
//! - Stale-nonce recovery and periodic resend of pending transactions
//! - REST gateway client for the blockchain proxy

pub mod builder;
pub mod nonce;
pub mod notifee;
pub mod proxy;
pub mod signer;

pub use builder::{Transaction, TransactionBuilder, TxPayload};
pub use nonce::{NonceHandlerStats, NonceTransactionHandler, PendingTransaction};
pub use notifee::{ChainNotifee, PriceChange, PriceNotifee};
pub use proxy::{BlockchainProxy, GatewayProxy, NetworkConfig, TxStatus};
pub use signer::{LocalKeySigner, TxSigner};
