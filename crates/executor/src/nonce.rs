//! Nonce-safe transaction submission for a single account
//!
//! All submissions for the account go through one [`NonceTransactionHandler`].
//! The account state sits behind an async mutex that stays locked across the
//! proxy calls, so nonce allocation, signing and broadcast are serialized.
//! A background task periodically resends whatever the network has not yet
//! executed, under the nonce the transaction was first sent with.

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use oracle_core::{ExecutionError, ExecutionResult};

use crate::builder::{Transaction, TxPayload, TX_VERSION};
use crate::proxy::{BlockchainProxy, NetworkConfig};
use crate::signer::TxSigner;

/// Sent transaction not yet executed by the network
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub nonce: u64,
    pub tx: Transaction,
    pub hash: B256,
    pub last_sent_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AccountState {
    network: Option<NetworkConfig>,
    next_nonce: u64,
    pending: BTreeMap<u64, PendingTransaction>,
}

struct Inner {
    proxy: Arc<dyn BlockchainProxy>,
    signer: Arc<dyn TxSigner>,
    account: Mutex<AccountState>,

    /// Stats
    sent: AtomicU64,
    resent: AtomicU64,
    resyncs: AtomicU64,
}

impl Inner {
    /// Fetch network parameters and the account nonce on first use
    async fn ensure_initialized(&self, account: &mut AccountState) -> ExecutionResult<NetworkConfig> {
        if let Some(network) = &account.network {
            return Ok(network.clone());
        }

        let network = self.proxy.network_config().await?;
        let nonce = self.proxy.account_nonce(self.signer.address()).await?;
        info!(
            address = %self.signer.address(),
            chain_id = %network.chain_id,
            nonce,
            "account state initialized"
        );
        account.next_nonce = nonce;
        account.network = Some(network.clone());
        Ok(network)
    }

    fn sign(&self, network: &NetworkConfig, payload: &TxPayload, nonce: u64) -> ExecutionResult<Transaction> {
        let mut tx = Transaction {
            nonce,
            value: payload.value,
            receiver: payload.receiver,
            sender: self.signer.address(),
            gas_price: network.min_gas_price,
            gas_limit: payload.gas_limit.max(network.min_gas_limit),
            data: payload.data.clone(),
            chain_id: network.chain_id.clone(),
            version: TX_VERSION,
            signature: None,
        };
        let message = tx.signing_message()?;
        tx.signature = Some(self.signer.sign(&message)?);
        Ok(tx)
    }

    /// Realign the allocation counter with the network nonce
    ///
    /// Pending transactions below the network nonce are executed and dropped.
    /// The others are still in flight and keep their nonces; allocation resumes
    /// above the highest of them.
    async fn resync(&self, account: &mut AccountState) -> ExecutionResult<u64> {
        let network_nonce = self.proxy.account_nonce(self.signer.address()).await?;

        let before = account.pending.len();
        account.pending.retain(|nonce, _| *nonce >= network_nonce);
        let confirmed = before - account.pending.len();
        let in_flight = account.pending.len();

        account.next_nonce = match account.pending.keys().next_back() {
            Some(highest) => (*highest + 1).max(network_nonce),
            None => network_nonce,
        };
        self.resyncs.fetch_add(1, Ordering::Relaxed);

        warn!(
            network_nonce,
            next_nonce = account.next_nonce,
            confirmed,
            in_flight,
            "nonce resynchronized with network"
        );
        Ok(account.next_nonce)
    }

    async fn resend_pending(&self) -> usize {
        let mut account = self.account.lock().await;
        if account.pending.is_empty() {
            return 0;
        }

        let network_nonce = match self.proxy.account_nonce(self.signer.address()).await {
            Ok(nonce) => nonce,
            Err(e) => {
                warn!(error = %e, "cannot read account nonce, skipping resend");
                return 0;
            }
        };

        let before = account.pending.len();
        account.pending.retain(|nonce, _| *nonce >= network_nonce);
        let confirmed = before - account.pending.len();
        if confirmed > 0 {
            debug!(confirmed, network_nonce, "pruned executed transactions");
        }
        if network_nonce > account.next_nonce {
            account.next_nonce = network_nonce;
        }

        // the status endpoint can run ahead of the account nonce
        let mut executed = Vec::new();
        for pending in account.pending.values() {
            match self.proxy.transaction_status(pending.hash).await {
                Ok(status) if status.is_executed() => executed.push(pending.nonce),
                Ok(_) => {}
                Err(e) => debug!(nonce = pending.nonce, error = %e, "status query failed"),
            }
        }
        for nonce in &executed {
            account.pending.remove(nonce);
        }
        if !executed.is_empty() {
            debug!(executed = executed.len(), "pruned transactions reported executed");
        }

        let mut resent = 0;
        for pending in account.pending.values_mut() {
            match self.proxy.send_transaction(&pending.tx).await {
                Ok(_) => {
                    pending.last_sent_at = Utc::now();
                    resent += 1;
                }
                Err(e) => warn!(nonce = pending.nonce, hash = %pending.hash, error = %e, "resend failed"),
            }
        }
        if resent > 0 {
            self.resent.fetch_add(resent as u64, Ordering::Relaxed);
            info!(resent, "resent pending transactions");
        }
        resent
    }
}

/// Transaction handler owning the nonce of one account
pub struct NonceTransactionHandler {
    inner: Arc<Inner>,
    shutdown_tx: watch::Sender<bool>,
    resend_handle: SyncMutex<Option<JoinHandle<()>>>,
}

impl NonceTransactionHandler {
    /// Create the handler and start its resend task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        proxy: Arc<dyn BlockchainProxy>,
        signer: Arc<dyn TxSigner>,
        resend_interval: Duration,
    ) -> ExecutionResult<Self> {
        if resend_interval.is_zero() {
            return Err(ExecutionError::InvalidArgument(
                "resend interval must be positive".into(),
            ));
        }

        let inner = Arc::new(Inner {
            proxy,
            signer,
            account: Mutex::new(AccountState::default()),
            sent: AtomicU64::new(0),
            resent: AtomicU64::new(0),
            resyncs: AtomicU64::new(0),
        });
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task_inner = Arc::clone(&inner);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(resend_interval);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        task_inner.resend_pending().await;
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("resend task stopping");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            inner,
            shutdown_tx,
            resend_handle: SyncMutex::new(Some(handle)),
        })
    }

    pub fn address(&self) -> Address {
        self.inner.signer.address()
    }

    /// Assign the next nonce to `payload`, sign and broadcast it
    ///
    /// A stale nonce triggers one resynchronization and retry. Any other
    /// broadcast failure leaves the nonce free for the next submission.
    pub async fn send_transaction(&self, payload: TxPayload) -> ExecutionResult<B256> {
        if *self.shutdown_tx.borrow() {
            return Err(ExecutionError::Closed);
        }

        let mut account = self.inner.account.lock().await;
        let network = self.inner.ensure_initialized(&mut account).await?;

        let mut nonce = account.next_nonce;
        let mut tx = self.inner.sign(&network, &payload, nonce)?;

        let hash = match self.inner.proxy.send_transaction(&tx).await {
            Ok(hash) => hash,
            Err(e) if e.is_stale_nonce() => {
                warn!(nonce, error = %e, "stale nonce, resynchronizing");
                nonce = self.inner.resync(&mut account).await?;
                tx = self.inner.sign(&network, &payload, nonce)?;
                self.inner.proxy.send_transaction(&tx).await?
            }
            Err(e) => return Err(e),
        };

        account.pending.insert(
            nonce,
            PendingTransaction {
                nonce,
                tx,
                hash,
                last_sent_at: Utc::now(),
            },
        );
        account.next_nonce = nonce + 1;
        self.inner.sent.fetch_add(1, Ordering::Relaxed);

        info!(nonce, hash = %hash, "transaction sent");
        Ok(hash)
    }

    /// Resend every transaction the network has not executed yet
    pub async fn resend_pending(&self) -> usize {
        self.inner.resend_pending().await
    }

    pub async fn next_nonce(&self) -> u64 {
        self.inner.account.lock().await.next_nonce
    }

    pub async fn pending(&self) -> Vec<PendingTransaction> {
        self.inner.account.lock().await.pending.values().cloned().collect()
    }

    /// Stop the resend task and wait for it
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.resend_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "resend task failed");
            }
        }
        info!("nonce transaction handler closed");
    }

    pub fn stats(&self) -> NonceHandlerStats {
        NonceHandlerStats {
            sent: self.inner.sent.load(Ordering::Relaxed),
            resent: self.inner.resent.load(Ordering::Relaxed),
            resyncs: self.inner.resyncs.load(Ordering::Relaxed),
        }
    }
}

impl Drop for NonceTransactionHandler {
    fn drop(&mut self) {
        if let Some(handle) = self.resend_handle.get_mut().take() {
            handle.abort();
        }
    }
}

/// Statistics about submissions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceHandlerStats {
    pub sent: u64,
    pub resent: u64,
    pub resyncs: u64,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use alloy_primitives::{keccak256, Bytes};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};

    use crate::proxy::TxStatus;

    /// In-memory network for one account
    ///
    /// Transactions are kept in a mempool keyed by nonce and executed in order
    /// by [`MockProxy::execute`]. A nonce is executed at most once.
    #[derive(Default)]
    pub struct MockProxy {
        pub state: SyncMutex<MockState>,
    }

    #[derive(Default)]
    pub struct MockState {
        pub account_nonce: u64,
        pub mempool: BTreeMap<u64, Transaction>,
        pub executed: Vec<Transaction>,
        pub broadcasts: Vec<Transaction>,
        pub failures: VecDeque<ExecutionError>,
        pub nonce_failures: u64,
        pub statuses: HashMap<B256, TxStatus>,
    }

    impl MockProxy {
        pub fn with_nonce(nonce: u64) -> Arc<Self> {
            let proxy = Self::default();
            proxy.state.lock().account_nonce = nonce;
            Arc::new(proxy)
        }

        pub fn fail_next(&self, error: ExecutionError) {
            self.state.lock().failures.push_back(error);
        }

        /// Execute consecutive mempool transactions starting at the account nonce
        pub fn execute(&self) -> usize {
            let mut state = self.state.lock();
            let mut count = 0;
            loop {
                let nonce = state.account_nonce;
                match state.mempool.remove(&nonce) {
                    Some(tx) => {
                        state.executed.push(tx);
                        state.account_nonce += 1;
                        count += 1;
                    }
                    None => break,
                }
            }
            count
        }
    }

    #[async_trait]
    impl BlockchainProxy for MockProxy {
        async fn network_config(&self) -> ExecutionResult<NetworkConfig> {
            Ok(NetworkConfig {
                chain_id: "T".into(),
                min_gas_price: 1_000_000_000,
                min_gas_limit: 50_000,
            })
        }

        async fn account_nonce(&self, _address: Address) -> ExecutionResult<u64> {
            Ok(self.state.lock().account_nonce)
        }

        async fn send_transaction(&self, tx: &Transaction) -> ExecutionResult<B256> {
            let mut state = self.state.lock();
            state.broadcasts.push(tx.clone());
            if let Some(error) = state.failures.pop_front() {
                return Err(error);
            }
            if tx.nonce < state.account_nonce {
                state.nonce_failures += 1;
                return Err(ExecutionError::NonceTooLow);
            }
            state.mempool.insert(tx.nonce, tx.clone());
            Ok(keccak256(tx.signing_message()?))
        }

        async fn transaction_status(&self, hash: B256) -> ExecutionResult<TxStatus> {
            Ok(self
                .state
                .lock()
                .statuses
                .get(&hash)
                .copied()
                .unwrap_or(TxStatus::Pending))
        }
    }

    /// Signer producing a digest of the message, distinct per message
    pub struct MockSigner;

    impl TxSigner for MockSigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0xaa)
        }

        fn sign(&self, message: &[u8]) -> ExecutionResult<Bytes> {
            Ok(Bytes::from(keccak256(message).to_vec()))
        }
    }

    pub fn payload(tag: u8) -> TxPayload {
        TxPayload {
            receiver: Address::repeat_byte(0x01),
            value: alloy_primitives::U256::ZERO,
            data: Bytes::from(vec![tag]),
            gas_limit: 10_000,
        }
    }

    /// Count of distinct payloads executed per nonce
    pub fn executed_by_nonce(state: &MockState) -> HashMap<u64, usize> {
        let mut counts = HashMap::new();
        for tx in &state.executed {
            *counts.entry(tx.nonce).or_insert(0) += 1;
        }
        counts
    }
}
