//! Funding monitor facade.
//!
//! [`FundingMonitor`] owns the registry, the pending queue, and the worker
//! lifecycle, and ingests [`LedgerEvent`]s. It is an explicit subsystem
//! instance: the node process constructs one with its ledger and gateway
//! collaborators injected, rather than reaching through process-global
//! state, which keeps test instantiation and teardown clean.
//!
//! The worker thread is spawned lazily by the first `start_monitor` call so
//! nodes that never register a monitor never run it. Shutdown is
//! cooperative and permanent: once the stop flag is set the worker exits and
//! every future `start_monitor` call fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info};

use crate::account::{AccountId, HoldingId, HoldingKind};
use crate::error::{ConfigError, FundingError, FundingResult};
use crate::ledger::{AccountProperty, LedgerEvent, LedgerReader};
use crate::monitor::policy::{MonitorDefinition, MonitorKey, MonitorSnapshot, MonitorSpec};
use crate::monitor::queue::PendingQueue;
use crate::monitor::registry::{MonitoredAccount, Registry};
use crate::monitor::worker::{worker_loop, WorkerContext};
use crate::tx::TransferGateway;

/// Configuration for the funding monitor subsystem.
#[derive(Debug, Clone)]
pub struct FundingMonitorConfig {
    /// Maximum number of concurrently active monitors.
    pub max_monitors: usize,
}

impl Default for FundingMonitorConfig {
    fn default() -> Self {
        Self { max_monitors: 100 }
    }
}

/// The funding monitor subsystem.
///
/// Administrative calls and event ingestion run on caller threads and
/// serialize on the registry mutex; the single worker thread consumes the
/// pending queue and never takes the registry lock.
pub struct FundingMonitor {
    cfg: FundingMonitorConfig,
    ledger: Arc<dyn LedgerReader>,
    gateway: Arc<dyn TransferGateway>,
    registry: Mutex<Registry>,
    queue: Arc<PendingQueue>,
    wake_tx: Sender<()>,
    wake_rx: Mutex<Option<Receiver<()>>>,
    stopped: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FundingMonitor {
    /// Create a subsystem instance over the given collaborators.
    ///
    /// No thread is spawned until the first monitor is started.
    #[must_use]
    pub fn new(
        cfg: FundingMonitorConfig,
        ledger: Arc<dyn LedgerReader>,
        gateway: Arc<dyn TransferGateway>,
    ) -> Self {
        let (wake_tx, wake_rx) = unbounded();
        Self {
            cfg,
            ledger,
            gateway,
            registry: Mutex::new(Registry::default()),
            queue: Arc::new(PendingQueue::default()),
            wake_tx,
            wake_rx: Mutex::new(Some(wake_rx)),
            stopped: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Start a monitor.
    ///
    /// Validates the default parameters against the minimums, lazily
    /// initializes the worker, scans the property store for accounts already
    /// carrying the property (with the funding account as setter), derives a
    /// monitored account for each, enqueues them, and publishes the monitor.
    ///
    /// Returns `Ok(false)` without error if a monitor with the same identity
    /// is already active. Fails with [`ConfigError::MonitorCapacity`] when
    /// the active count already exceeds the configured maximum, and with
    /// [`ConfigError::Stopped`] permanently after shutdown.
    pub fn start_monitor(&self, spec: MonitorSpec) -> FundingResult<bool> {
        spec.defaults.validate()?;
        self.ensure_worker()?;

        let monitor = Arc::new(MonitorDefinition::new(spec));
        let key = monitor.key().clone();

        // Scan current property holders outside the registry lock; the
        // property-set path picks up anything that lands in between, and the
        // monitor is not yet visible to it.
        let properties =
            self.ledger
                .properties(Some(key.funding_account()), key.property(), 0, usize::MAX)?;
        let mut derived = Vec::with_capacity(properties.len());
        for property in properties {
            let params = monitor.defaults().with_overrides(
                property.account,
                key.property(),
                property.value.as_deref(),
            )?;
            derived.push(Arc::new(MonitoredAccount::new(
                property.account,
                Arc::clone(&monitor),
                params,
            )));
        }

        {
            let mut registry = self.lock_registry()?;
            if registry.monitor_count() > self.cfg.max_monitors {
                return Err(ConfigError::MonitorCapacity {
                    max: self.cfg.max_monitors,
                }
                .into());
            }
            if registry.contains(&key) {
                debug!(
                    kind = %key.kind(),
                    funding = %monitor.funding_address(),
                    property = key.property(),
                    holding = %key.holding(),
                    "monitor already started"
                );
                return Ok(false);
            }
            for account in derived {
                let params = account.params();
                debug!(
                    kind = %key.kind(),
                    account = %account.address(),
                    property = key.property(),
                    holding = %key.holding(),
                    amount = params.amount,
                    threshold = params.threshold,
                    interval = params.interval,
                    "monitored account created"
                );
                self.queue.enqueue(Arc::clone(&account));
                registry.insert_account(account);
            }
            registry.publish(Arc::clone(&monitor));
        }

        info!(
            kind = %key.kind(),
            funding = %monitor.funding_address(),
            property = key.property(),
            holding = %key.holding(),
            "monitor started"
        );
        Ok(true)
    }

    /// Stop one monitor; returns true if it was active.
    ///
    /// Removes the monitor and every monitored account it owns. Funding
    /// checks already in the pending queue are not retracted and still run
    /// to completion against the detached accounts.
    pub fn stop_monitor(&self, key: &MonitorKey) -> bool {
        let Ok(mut registry) = self.lock_registry() else {
            error!("registry lock poisoned; stop_monitor ignored");
            return false;
        };
        match registry.remove_monitor(key) {
            Some(monitor) => {
                info!(
                    kind = %key.kind(),
                    funding = %monitor.funding_address(),
                    property = key.property(),
                    holding = %key.holding(),
                    "monitor stopped"
                );
                true
            }
            None => false,
        }
    }

    /// Stop all monitors; returns the prior monitor count.
    ///
    /// Same in-flight-queue policy as [`Self::stop_monitor`].
    pub fn stop_all(&self) -> usize {
        let Ok(mut registry) = self.lock_registry() else {
            error!("registry lock poisoned; stop_all ignored");
            return 0;
        };
        let count = registry.clear();
        info!(count, "all monitors stopped");
        count
    }

    /// Snapshot of one active monitor, if any.
    #[must_use]
    pub fn monitor(&self, key: &MonitorKey) -> Option<MonitorSnapshot> {
        let registry = self.lock_registry().ok()?;
        registry.find(key).map(|m| m.snapshot())
    }

    /// Snapshots of all active monitors.
    #[must_use]
    pub fn monitors(&self) -> Vec<MonitorSnapshot> {
        self.lock_registry()
            .map(|registry| registry.monitors().iter().map(|m| m.snapshot()).collect())
            .unwrap_or_default()
    }

    /// Number of funding checks currently awaiting evaluation.
    #[must_use]
    pub fn pending_checks(&self) -> usize {
        self.queue.len()
    }

    /// Ingest a ledger state change notification.
    ///
    /// Each call is a single critical section over the registry and queue;
    /// handlers become no-ops once shutdown has begun.
    pub fn handle_event(&self, event: LedgerEvent) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        match event {
            LedgerEvent::CoinBalance { account, balance } => {
                self.on_balance(account, HoldingKind::Coin, HoldingId::NONE, balance);
            }
            LedgerEvent::AssetBalance {
                account,
                asset,
                balance,
            } => self.on_balance(account, HoldingKind::Asset, asset, balance),
            LedgerEvent::CurrencyBalance {
                account,
                currency,
                units,
            } => self.on_balance(account, HoldingKind::Currency, currency, units),
            LedgerEvent::PropertySet(property) => self.on_property_set(&property),
            LedgerEvent::PropertyDeleted(property) => self.on_property_deleted(&property),
            LedgerEvent::BlockCommitted { .. } => self.on_block_committed(),
        }
    }

    /// Cooperative shutdown.
    ///
    /// Sets the stop flag (monotonic, never cleared) and releases one wake
    /// so a blocked worker observes the flag and exits. Idempotent. After
    /// shutdown, starting any monitor fails with [`ConfigError::Stopped`].
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.wake_tx.send(());
        debug!("funding monitor shutdown requested");
    }

    fn on_balance(&self, account: AccountId, kind: HoldingKind, holding: HoldingId, balance: u64) {
        let Ok(registry) = self.lock_registry() else {
            error!("registry lock poisoned; balance event dropped");
            return;
        };
        for entry in registry.accounts_for(account) {
            let key = entry.monitor().key();
            if key.kind() == kind && key.holding() == holding && balance < entry.params().threshold
            {
                self.queue.enqueue(Arc::clone(entry));
            }
        }
    }

    fn on_property_set(&self, property: &AccountProperty) {
        let Ok(mut registry) = self.lock_registry() else {
            error!("registry lock poisoned; property-set event dropped");
            return;
        };

        // An existing monitored account for this property name is updated in
        // place; a malformed override leaves it untouched.
        let mut matched = false;
        for entry in registry.accounts_for(property.account) {
            let monitor = entry.monitor();
            if monitor.key().property() != property.name {
                continue;
            }
            matched = true;
            match monitor.defaults().with_overrides(
                property.account,
                &property.name,
                property.value.as_deref(),
            ) {
                Ok(params) => {
                    entry.set_params(params);
                    self.queue.enqueue(Arc::clone(entry));
                    debug!(
                        kind = %monitor.key().kind(),
                        account = %entry.address(),
                        property = property.name.as_str(),
                        holding = %monitor.key().holding(),
                        amount = params.amount,
                        threshold = params.threshold,
                        interval = params.interval,
                        "monitored account updated"
                    );
                }
                Err(err) => {
                    error!(
                        account = %property.account.address(),
                        property = property.name.as_str(),
                        %err,
                        "invalid funding override; monitored account unchanged"
                    );
                }
            }
        }
        if matched {
            return;
        }

        // Otherwise derive a new monitored account for every active monitor
        // tied to this property name.
        let mut created = Vec::new();
        for monitor in registry.monitors() {
            if monitor.key().property() != property.name {
                continue;
            }
            match monitor.defaults().with_overrides(
                property.account,
                &property.name,
                property.value.as_deref(),
            ) {
                Ok(params) => created.push(Arc::new(MonitoredAccount::new(
                    property.account,
                    Arc::clone(monitor),
                    params,
                ))),
                Err(err) => {
                    error!(
                        account = %property.account.address(),
                        property = property.name.as_str(),
                        %err,
                        "invalid funding override; monitored account not created"
                    );
                }
            }
        }
        for account in created {
            let monitor = Arc::clone(account.monitor());
            let params = account.params();
            debug!(
                kind = %monitor.key().kind(),
                account = %account.address(),
                property = property.name.as_str(),
                holding = %monitor.key().holding(),
                amount = params.amount,
                threshold = params.threshold,
                interval = params.interval,
                "monitored account created"
            );
            self.queue.enqueue(Arc::clone(&account));
            registry.insert_account(account);
        }
    }

    fn on_property_deleted(&self, property: &AccountProperty) {
        let Ok(mut registry) = self.lock_registry() else {
            error!("registry lock poisoned; property-delete event dropped");
            return;
        };
        for entry in registry.remove_property(property.account, &property.name) {
            let key = entry.monitor().key();
            debug!(
                kind = %key.kind(),
                account = %entry.address(),
                property = property.name.as_str(),
                holding = %key.holding(),
                "monitored account deleted"
            );
        }
    }

    fn on_block_committed(&self) {
        // Pure wake signal: the worker reads the queue itself. Waking only
        // on non-empty queues keeps an idle subsystem quiet.
        if !self.queue.is_empty() {
            let _ = self.wake_tx.send(());
        }
    }

    fn lock_registry(&self) -> Result<MutexGuard<'_, Registry>, FundingError> {
        self.registry
            .lock()
            .map_err(|_| FundingError::internal("registry lock poisoned"))
    }

    /// Spawn the worker on first use. A spawn failure permanently stops the
    /// subsystem.
    fn ensure_worker(&self) -> FundingResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(ConfigError::Stopped.into());
        }
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| FundingError::internal("worker lock poisoned"))?;
        if worker.is_some() {
            return Ok(());
        }

        let wake_rx = self
            .wake_rx
            .lock()
            .map_err(|_| FundingError::internal("wake receiver lock poisoned"))?
            .take()
            .ok_or_else(|| FundingError::internal("wake receiver already taken"))?;

        let ctx = WorkerContext {
            ledger: Arc::clone(&self.ledger),
            gateway: Arc::clone(&self.gateway),
            queue: Arc::clone(&self.queue),
            stopped: Arc::clone(&self.stopped),
            wake_rx,
        };
        match thread::Builder::new()
            .name("fundwatch-worker".to_string())
            .spawn(move || worker_loop(&ctx))
        {
            Ok(handle) => {
                *worker = Some(handle);
                debug!("funding monitor initialized");
                Ok(())
            }
            Err(err) => {
                self.stopped.store(true, Ordering::Release);
                error!(%err, "funding monitor initialization failed");
                Err(ConfigError::StartupFailed {
                    reason: err.to_string(),
                }
                .into())
            }
        }
    }
}

impl Drop for FundingMonitor {
    fn drop(&mut self) {
        // shutdown() always releases one wake, so a blocked worker observes
        // the stop flag and the join below cannot deadlock.
        self.shutdown();
        if let Ok(mut guard) = self.worker.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountId, HoldingId, HoldingKind};
    use crate::ledger::InMemoryLedger;
    use crate::monitor::policy::FundingParams;
    use crate::tx::{FundingCredential, MemoryGateway};

    const FUNDING: AccountId = AccountId::new(100);

    fn defaults() -> FundingParams {
        FundingParams {
            amount: 5,
            threshold: 10,
            interval: 10,
        }
    }

    fn coin_spec(property: &str) -> MonitorSpec {
        MonitorSpec::new(
            HoldingKind::Coin,
            HoldingId::NONE,
            property,
            defaults(),
            FundingCredential::new(FUNDING, "secret phrase"),
        )
    }

    fn subsystem(cfg: FundingMonitorConfig) -> (Arc<InMemoryLedger>, FundingMonitor) {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.put_account(FUNDING, 1000, 1000).unwrap();
        let gateway = Arc::new(MemoryGateway::new(1));
        let monitor = FundingMonitor::new(
            cfg,
            Arc::clone(&ledger) as Arc<dyn LedgerReader>,
            gateway as Arc<dyn TransferGateway>,
        );
        (ledger, monitor)
    }

    fn property(account: u64, name: &str, value: Option<&str>) -> AccountProperty {
        AccountProperty {
            account: AccountId::new(account),
            setter: FUNDING,
            name: name.to_string(),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn duplicate_start_returns_false_without_error() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        assert!(system.start_monitor(coin_spec("fund")).unwrap());
        assert!(!system.start_monitor(coin_spec("fund")).unwrap());
        assert_eq!(system.monitors().len(), 1);
    }

    #[test]
    fn start_validates_minimums() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        let mut spec = coin_spec("fund");
        spec.defaults.interval = 9;
        let err = system.start_monitor(spec).unwrap_err();
        assert!(matches!(
            err,
            FundingError::Config(ConfigError::IntervalBelowMinimum { .. })
        ));
    }

    #[test]
    fn start_fails_over_capacity() {
        let (_, system) = subsystem(FundingMonitorConfig { max_monitors: 1 });
        assert!(system.start_monitor(coin_spec("a")).unwrap());
        assert!(system.start_monitor(coin_spec("b")).unwrap());
        let err = system.start_monitor(coin_spec("c")).unwrap_err();
        assert!(matches!(
            err,
            FundingError::Config(ConfigError::MonitorCapacity { max: 1 })
        ));
    }

    #[test]
    fn start_after_shutdown_is_fatal() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        assert!(system.start_monitor(coin_spec("fund")).unwrap());
        system.shutdown();
        system.shutdown(); // idempotent
        let err = system.start_monitor(coin_spec("other")).unwrap_err();
        assert!(matches!(
            err,
            FundingError::Config(ConfigError::Stopped)
        ));
    }

    #[test]
    fn start_scans_existing_property_holders() {
        let (ledger, system) = subsystem(FundingMonitorConfig::default());
        ledger.put_account(AccountId::new(1), 2, 2).unwrap();
        ledger.set_property(property(1, "fund", None)).unwrap();
        ledger
            .set_property(property(2, "fund", Some("amount=50")))
            .unwrap();
        // Property set by someone other than the funding account is skipped.
        ledger
            .set_property(AccountProperty {
                setter: AccountId::new(999),
                ..property(3, "fund", None)
            })
            .unwrap();

        assert!(system.start_monitor(coin_spec("fund")).unwrap());
        assert_eq!(system.pending_checks(), 2);
    }

    #[test]
    fn start_rejects_malformed_existing_override() {
        let (ledger, system) = subsystem(FundingMonitorConfig::default());
        ledger
            .set_property(property(1, "fund", Some("amount")))
            .unwrap();

        let err = system.start_monitor(coin_spec("fund")).unwrap_err();
        assert!(matches!(
            err,
            FundingError::Config(ConfigError::InvalidOverride { .. })
        ));
        // Nothing was published.
        assert!(system.monitors().is_empty());
    }

    #[test]
    fn stop_removes_monitor_from_lookup() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        let spec = coin_spec("fund");
        let key = spec.key.clone();
        assert!(system.start_monitor(spec).unwrap());
        assert!(system.monitor(&key).is_some());

        assert!(system.stop_monitor(&key));
        assert!(system.monitor(&key).is_none());
        assert!(!system.stop_monitor(&key));
    }

    #[test]
    fn stop_all_reports_prior_count() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("a")).unwrap();
        system.start_monitor(coin_spec("b")).unwrap();
        assert_eq!(system.stop_all(), 2);
        assert!(system.monitors().is_empty());
        assert_eq!(system.stop_all(), 0);
    }

    #[test]
    fn coin_lookup_ignores_supplied_holding_id() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("fund")).unwrap();

        // Same identity even with a non-null holding id.
        let key = MonitorKey::new(HoldingKind::Coin, HoldingId::new(77), "fund", FUNDING);
        assert!(system.monitor(&key).is_some());
    }

    #[test]
    fn balance_event_enqueues_only_below_threshold() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("fund")).unwrap();
        system.handle_event(LedgerEvent::PropertySet(property(1, "fund", None)));
        assert_eq!(system.pending_checks(), 1);

        // Drain simulation is not needed: the entry is deduplicated, so a
        // below-threshold event is a no-op while it is queued.
        system.handle_event(LedgerEvent::CoinBalance {
            account: AccountId::new(1),
            balance: 2,
        });
        assert_eq!(system.pending_checks(), 1);

        // Above-threshold balances never enqueue.
        system.handle_event(LedgerEvent::CoinBalance {
            account: AccountId::new(2),
            balance: 50,
        });
        assert_eq!(system.pending_checks(), 1);
    }

    #[test]
    fn asset_event_filters_on_holding_id() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        let spec = MonitorSpec::new(
            HoldingKind::Asset,
            HoldingId::new(7),
            "fund-asset",
            defaults(),
            FundingCredential::new(FUNDING, "secret phrase"),
        );
        system.start_monitor(spec).unwrap();
        system.handle_event(LedgerEvent::PropertySet(property(1, "fund-asset", None)));
        let baseline = system.pending_checks();

        // Wrong asset id never enqueues; dedup hides the matching case here,
        // so check the mismatch only.
        system.handle_event(LedgerEvent::AssetBalance {
            account: AccountId::new(1),
            asset: HoldingId::new(8),
            balance: 1,
        });
        assert_eq!(system.pending_checks(), baseline);
    }

    #[test]
    fn property_set_creates_then_updates_in_place() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("fund")).unwrap();

        system.handle_event(LedgerEvent::PropertySet(property(1, "fund", None)));
        assert_eq!(system.pending_checks(), 1);

        // Same property again: updated in place, not duplicated.
        system.handle_event(LedgerEvent::PropertySet(property(
            1,
            "fund",
            Some("amount=50,threshold=5"),
        )));
        assert_eq!(system.pending_checks(), 1);

        let registry = system.lock_registry().unwrap();
        let entries = registry.accounts_for(AccountId::new(1));
        assert_eq!(entries.len(), 1);
        let params = entries[0].params();
        assert_eq!(params.amount, 50);
        assert_eq!(params.threshold, 5);
        assert_eq!(params.interval, 10); // inherited
    }

    #[test]
    fn malformed_property_set_leaves_state_untouched() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("fund")).unwrap();
        system.handle_event(LedgerEvent::PropertySet(property(
            1,
            "fund",
            Some("amount=50"),
        )));

        system.handle_event(LedgerEvent::PropertySet(property(
            1,
            "fund",
            Some("amount=50,bogus=1"),
        )));

        let registry = system.lock_registry().unwrap();
        let entries = registry.accounts_for(AccountId::new(1));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].params().amount, 50);
    }

    #[test]
    fn property_set_for_unknown_property_is_ignored() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("fund")).unwrap();
        system.handle_event(LedgerEvent::PropertySet(property(1, "unrelated", None)));
        assert_eq!(system.pending_checks(), 0);
    }

    #[test]
    fn property_delete_removes_matching_accounts() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("fund")).unwrap();
        system.handle_event(LedgerEvent::PropertySet(property(1, "fund", None)));

        system.handle_event(LedgerEvent::PropertyDeleted(property(1, "fund", None)));

        let registry = system.lock_registry().unwrap();
        assert!(registry.accounts_for(AccountId::new(1)).is_empty());
        drop(registry);

        // Balance events no longer enqueue for the removed account; the
        // check enqueued at creation time is still pending (in-flight
        // policy), so the count stays at one.
        system.handle_event(LedgerEvent::CoinBalance {
            account: AccountId::new(1),
            balance: 0,
        });
        assert_eq!(system.pending_checks(), 1);
    }

    #[test]
    fn events_are_ignored_after_shutdown() {
        let (_, system) = subsystem(FundingMonitorConfig::default());
        system.start_monitor(coin_spec("fund")).unwrap();
        system.shutdown();
        system.handle_event(LedgerEvent::PropertySet(property(1, "fund", None)));
        assert_eq!(system.pending_checks(), 0);
    }
}
