//! Poll cycle: fetch, decide, notify
//!
//! A pair is due when its aggregated price moved by at least the pair's
//! threshold since the last notification, or when the auto-send interval has
//! elapsed. Due pairs are submitted as one batch and only recorded once the
//! submission succeeded, so a failed batch is retried on the next cycle.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use oracle_core::{percent_change, NotifierError, NotifierResult, Pair};
use oracle_executor::{PriceChange, PriceNotifee};
use oracle_price_feed::PriceAggregator;

use crate::clock::Clock;
use crate::polling::CycleExecutor;
use crate::state::{NotifyEntry, NotifyState};

/// Why a pair is due for notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyReason {
    /// No usable baseline yet
    FirstRun,
    /// Price moved by this many percent
    PriceChanged(Decimal),
    /// Auto-send interval elapsed
    Heartbeat,
}

/// Outcome of one successful cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub skipped: usize,
    pub notified: usize,
}

/// Price notifier
pub struct PriceNotifier {
    pairs: Vec<Pair>,
    aggregator: Arc<PriceAggregator>,
    notifee: Arc<dyn PriceNotifee>,
    clock: Arc<dyn Clock>,
    auto_send_interval: chrono::Duration,
    state: NotifyState,
}

impl PriceNotifier {
    pub fn new(
        pairs: Vec<Pair>,
        aggregator: Arc<PriceAggregator>,
        notifee: Arc<dyn PriceNotifee>,
        auto_send_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> NotifierResult<Self> {
        if pairs.is_empty() {
            return Err(NotifierError::InvalidArgument("no pairs to notify".into()));
        }
        let auto_send_interval = chrono::Duration::from_std(auto_send_interval)
            .map_err(|e| NotifierError::InvalidArgument(format!("auto send interval: {}", e)))?;

        Ok(Self {
            pairs,
            aggregator,
            notifee,
            clock,
            auto_send_interval,
            state: NotifyState::new(),
        })
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn state(&self) -> &NotifyState {
        &self.state
    }

    /// Decide whether `price` must be published for `pair`
    pub fn should_notify(
        &self,
        pair: &Pair,
        price: Decimal,
        last: Option<&NotifyEntry>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<NotifyReason> {
        let last = match last {
            Some(last) => last,
            None => return Some(NotifyReason::FirstRun),
        };

        let change = match percent_change(last.price, price) {
            Some(change) => change,
            None => return Some(NotifyReason::FirstRun),
        };
        if change >= pair.percent_difference_to_notify {
            return Some(NotifyReason::PriceChanged(change));
        }
        if last.age(now) >= self.auto_send_interval {
            return Some(NotifyReason::Heartbeat);
        }
        None
    }

    /// Run one poll cycle over all pairs
    pub async fn run_cycle(&self) -> NotifierResult<CycleReport> {
        let start = Instant::now();
        let now = self.clock.now();
        let mut report = CycleReport::default();
        let mut changes = Vec::new();

        for pair in &self.pairs {
            let key = pair.key();
            let aggregated = match self.aggregator.fetch_pair_price(pair).await {
                Ok(aggregated) => aggregated,
                Err(e) => {
                    warn!(pair = %key, error = %e, "skipping pair this cycle");
                    report.skipped += 1;
                    continue;
                }
            };
            report.fetched += 1;

            let last = self.state.get(&key);
            match self.should_notify(pair, aggregated.price, last.as_ref(), now) {
                Some(reason) => {
                    debug!(pair = %key, price = %aggregated.price, ?reason, "pair due");
                    changes.push(PriceChange {
                        base: pair.base.clone(),
                        quote: pair.quote.clone(),
                        price: aggregated.price,
                        decimals: pair.decimals,
                        timestamp: now,
                    });
                }
                None => debug!(pair = %key, price = %aggregated.price, "below threshold"),
            }
        }

        if report.fetched == 0 {
            return Err(NotifierError::NoPrices(self.pairs.len()));
        }

        if !changes.is_empty() {
            let hash = self
                .notifee
                .notify(&changes)
                .await
                .map_err(|source| NotifierError::NotifyFailed {
                    pairs: changes.len(),
                    source,
                })?;

            for change in &changes {
                self.state.record(change.key(), change.price, now);
            }
            report.notified = changes.len();
            info!(prices = changes.len(), hash = %hash, "notified price changes");
        }

        debug!(
            fetched = report.fetched,
            skipped = report.skipped,
            notified = report.notified,
            elapsed = ?start.elapsed(),
            "cycle completed"
        );
        Ok(report)
    }
}

#[async_trait]
impl CycleExecutor for PriceNotifier {
    fn name(&self) -> &str {
        "price notifier"
    }

    async fn execute(&self) -> anyhow::Result<()> {
        self.run_cycle().await?;
        Ok(())
    }
}
