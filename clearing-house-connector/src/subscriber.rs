//! # Clearing House Subscriber
//!
//! The [`ClearingHouseSubscriber`] keeps a typed, eagerly refreshed copy of the clearing
//! house accounts in memory and tells interested consumers when any of them changes.
//!
//! ## Lifecycle
//!
//! `Unsubscribed -> Subscribing -> Subscribed`, and back to `Unsubscribed` via
//! [`ClearingHouseSubscriber::unsubscribe`].
//!
//! A subscription runs these steps in order:
//! 1. Read the global state account directly and fill the [`SubscriptionRegistry`] with the
//!    required accounts plus the requested optional ones.
//! 2. Register every tracked address and one update/error handler pair with the shared
//!    [`BulkAccountLoader`].
//! 3. Run one full fetch to fill the [`AccountCache`].
//! 4. Emit [`ClearingHouseEvent::Update`].
//!
//! The steps run in a spawned task. Their result is published on a `watch` channel, so
//! concurrent callers of `subscribe` all wait on the same attempt and receive the same
//! outcome. A failure at any step tears the partial registration down and leaves the
//! subscriber `Unsubscribed`.
//!
//! After that, changes reach the subscriber through the loader's update handler, which
//! decodes the bytes, refreshes the cache and emits the kind-specific event followed by
//! `Update`.

use crate::{
    cache::AccountCache,
    codec::{AccountCodec, AnchorAccountCodec},
    config::ConnectorConfig,
    error::{ConnectorError, ConnectorResult, LoaderError},
    events::ClearingHouseEvent,
    fetcher::AccountFetcher,
    kind::{AccountKind, OptionalKindSet},
    loader::{BulkAccountLoader, HandlerId},
    registry::{SubscriptionRegistry, TrackedAccount},
};
use clearing_house_state::{
    DepositHistory, ExtendedCurveHistory, FundingPaymentHistory, FundingRateHistory,
    LiquidationHistory, Markets, OrderState, State, TradeHistory,
};
use parking_lot::{Mutex, RwLock};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// The externally visible lifecycle of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Subscribed,
}

/// `None` until the in-flight subscription finishes.
type SubscribeOutcome = Option<ConnectorResult<()>>;

enum Lifecycle {
    Unsubscribed,
    Subscribing(watch::Receiver<SubscribeOutcome>),
    Subscribed,
}

/// What this subscriber added to the shared loader, so exactly that can be removed again.
struct Registration {
    addresses: Vec<Pubkey>,
    update_handler: HandlerId,
    error_handler: HandlerId,
}

struct Inner {
    program_id: Pubkey,
    fetcher: Arc<dyn AccountFetcher>,
    loader: Arc<dyn BulkAccountLoader>,
    codec: Arc<dyn AccountCodec>,
    lifecycle: Mutex<Lifecycle>,
    optional_kinds: RwLock<OptionalKindSet>,
    registry: RwLock<SubscriptionRegistry>,
    cache: RwLock<AccountCache>,
    registration: Mutex<Option<Registration>>,
    events: broadcast::Sender<ClearingHouseEvent>,
}

/// A clonable handle to a polling account subscriber.
///
/// Clones share the same subscription, cache and event stream.
#[derive(Clone)]
pub struct ClearingHouseSubscriber {
    inner: Arc<Inner>,
}

impl ClearingHouseSubscriber {
    /// Creates an unsubscribed subscriber that decodes accounts with [`AnchorAccountCodec`].
    ///
    /// # Arguments
    ///
    /// * `config` - Connector configuration; only the channel capacities are read here.
    /// * `program_id` - The clearing house program whose state account is the root of the account graph.
    /// * `fetcher` - Used for the direct bootstrap read of the state account.
    /// * `loader` - The shared bulk loader. Other subscribers may use it at the same time.
    pub fn new(
        config: &ConnectorConfig,
        program_id: Pubkey,
        fetcher: Arc<dyn AccountFetcher>,
        loader: Arc<dyn BulkAccountLoader>,
    ) -> Self {
        Self::with_codec(config, program_id, fetcher, loader, Arc::new(AnchorAccountCodec))
    }

    /// Like [`ClearingHouseSubscriber::new`], with a custom [`AccountCodec`].
    pub fn with_codec(
        config: &ConnectorConfig,
        program_id: Pubkey,
        fetcher: Arc<dyn AccountFetcher>,
        loader: Arc<dyn BulkAccountLoader>,
        codec: Arc<dyn AccountCodec>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.channels.event_buffer.max(1));
        Self {
            inner: Arc::new(Inner {
                program_id,
                fetcher,
                loader,
                codec,
                lifecycle: Mutex::new(Lifecycle::Unsubscribed),
                optional_kinds: RwLock::new(OptionalKindSet::new()),
                registry: RwLock::new(SubscriptionRegistry::new()),
                cache: RwLock::new(AccountCache::default()),
                registration: Mutex::new(None),
                events,
            }),
        }
    }

    /// Subscribes to the required accounts plus `optional_kinds`.
    ///
    /// Returns immediately if already subscribed; the optional set of the running
    /// subscription is kept in that case. If a subscription is in flight, waits for it
    /// and returns its outcome instead of starting another one.
    ///
    /// The initial fetch goes through the loader, so kind-specific events for the first
    /// observed values are emitted while the state is still `Subscribing`; getters called
    /// from those events fail with [`ConnectorError::NotSubscribed`]. Only the closing
    /// [`ClearingHouseEvent::Update`] is emitted after the transition to `Subscribed`.
    pub async fn subscribe(&self, optional_kinds: impl Into<OptionalKindSet>) -> ConnectorResult<()> {
        let mut outcome = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match &*lifecycle {
                Lifecycle::Subscribed => return Ok(()),
                Lifecycle::Subscribing(outcome) => outcome.clone(),
                Lifecycle::Unsubscribed => {
                    *self.inner.optional_kinds.write() = optional_kinds.into();
                    let (tx, rx) = watch::channel(None);
                    *lifecycle = Lifecycle::Subscribing(rx.clone());
                    tracing::info!("Subscribing to clearing house {}", self.inner.program_id);

                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        let result = inner.run_subscription().await;
                        inner.finish_subscription(&result);
                        let _ = tx.send(Some(result));
                    });
                    rx
                }
            }
        };

        let result = wait_for_outcome(&mut outcome).await;
        if matches!(result, Err(ConnectorError::SubscribeAborted)) {
            self.inner.abandon_subscription();
        }
        result
    }

    /// Detaches from the bulk loader and clears the registry.
    ///
    /// The typed cache is kept, but every getter fails with
    /// [`ConnectorError::NotSubscribed`] until the next successful `subscribe`. An
    /// in-flight subscription is awaited first.
    pub async fn unsubscribe(&self) {
        loop {
            let mut pending = {
                let mut lifecycle = self.inner.lifecycle.lock();
                match &*lifecycle {
                    Lifecycle::Unsubscribed => return,
                    Lifecycle::Subscribing(outcome) => outcome.clone(),
                    Lifecycle::Subscribed => {
                        self.inner.detach_from_loader();
                        self.inner.registry.write().clear();
                        *lifecycle = Lifecycle::Unsubscribed;
                        tracing::info!("Unsubscribed from clearing house {}", self.inner.program_id);
                        return;
                    }
                }
            };
            let _ = wait_for_outcome(&mut pending).await;
        }
    }

    /// Refreshes every tracked account through the bulk loader and stores the decoded values.
    ///
    /// Waits for an in-flight subscription first. This path does not emit change events;
    /// the loader's update handler does that for any bytes that actually changed.
    /// Every slot is attempted; the first decode failure is returned.
    pub async fn fetch(&self) -> ConnectorResult<()> {
        let pending = match &*self.inner.lifecycle.lock() {
            Lifecycle::Subscribing(outcome) => Some(outcome.clone()),
            _ => None,
        };
        if let Some(mut outcome) = pending {
            let _ = wait_for_outcome(&mut outcome).await;
        }
        self.assert_subscribed()?;
        self.inner.fetch_all(false).await
    }

    /// A new receiver for the subscriber's event stream.
    pub fn events(&self) -> broadcast::Receiver<ClearingHouseEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> SubscriptionState {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Unsubscribed => SubscriptionState::Unsubscribed,
            Lifecycle::Subscribing(_) => SubscriptionState::Subscribing,
            Lifecycle::Subscribed => SubscriptionState::Subscribed,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.state() == SubscriptionState::Subscribed
    }

    pub fn program_id(&self) -> Pubkey {
        self.inner.program_id
    }

    /// The optional kinds requested by the current (or last) subscription.
    pub fn optional_kinds(&self) -> OptionalKindSet {
        self.inner.optional_kinds.read().clone()
    }

    /// Accounts currently in the registry. Empty while unsubscribed.
    pub fn tracked_accounts(&self) -> Vec<TrackedAccount> {
        self.inner.registry.read().iter().copied().collect()
    }

    pub fn get_state_account(&self) -> ConnectorResult<Arc<State>> {
        self.read(AccountKind::State, |cache| cache.state.clone())
    }

    pub fn get_markets_account(&self) -> ConnectorResult<Arc<Markets>> {
        self.read(AccountKind::Markets, |cache| cache.markets.clone())
    }

    pub fn get_order_state_account(&self) -> ConnectorResult<Arc<OrderState>> {
        self.read(AccountKind::OrderState, |cache| cache.order_state.clone())
    }

    pub fn get_trade_history_account(&self) -> ConnectorResult<Arc<TradeHistory>> {
        self.read(AccountKind::TradeHistory, |cache| cache.trade_history.clone())
    }

    pub fn get_deposit_history_account(&self) -> ConnectorResult<Arc<DepositHistory>> {
        self.read(AccountKind::DepositHistory, |cache| cache.deposit_history.clone())
    }

    pub fn get_funding_payment_history_account(&self) -> ConnectorResult<Arc<FundingPaymentHistory>> {
        self.read(AccountKind::FundingPaymentHistory, |cache| {
            cache.funding_payment_history.clone()
        })
    }

    pub fn get_funding_rate_history_account(&self) -> ConnectorResult<Arc<FundingRateHistory>> {
        self.read(AccountKind::FundingRateHistory, |cache| {
            cache.funding_rate_history.clone()
        })
    }

    pub fn get_extended_curve_history_account(&self) -> ConnectorResult<Arc<ExtendedCurveHistory>> {
        self.read(AccountKind::ExtendedCurveHistory, |cache| {
            cache.extended_curve_history.clone()
        })
    }

    pub fn get_liquidation_history_account(&self) -> ConnectorResult<Arc<LiquidationHistory>> {
        self.read(AccountKind::LiquidationHistory, |cache| {
            cache.liquidation_history.clone()
        })
    }

    fn assert_subscribed(&self) -> ConnectorResult<()> {
        if self.is_subscribed() {
            Ok(())
        } else {
            Err(ConnectorError::NotSubscribed)
        }
    }

    fn read<T>(
        &self,
        kind: AccountKind,
        slot: impl FnOnce(&AccountCache) -> Option<Arc<T>>,
    ) -> ConnectorResult<Arc<T>> {
        self.assert_subscribed()?;
        if !kind.is_required() && !self.inner.optional_kinds.read().contains(kind) {
            return Err(ConnectorError::OptionalStreamNotRequested(kind));
        }
        slot(&self.inner.cache.read()).ok_or(ConnectorError::AccountNotLoaded(kind))
    }
}

async fn wait_for_outcome(outcome: &mut watch::Receiver<SubscribeOutcome>) -> ConnectorResult<()> {
    match outcome.wait_for(Option::is_some).await {
        Ok(outcome) => match &*outcome {
            Some(result) => result.clone(),
            None => Err(ConnectorError::SubscribeAborted),
        },
        Err(_) => Err(ConnectorError::SubscribeAborted),
    }
}

impl Inner {
    async fn run_subscription(self: &Arc<Self>) -> ConnectorResult<()> {
        let optional_kinds = self.optional_kinds.read().clone();
        let mut registry = self.registry.read().clone();
        registry
            .populate(
                self.fetcher.as_ref(),
                self.codec.as_ref(),
                &self.program_id,
                &optional_kinds,
            )
            .await?;
        *self.registry.write() = registry;

        self.attach_to_loader();

        if let Err(e) = self.fetch_all(true).await {
            self.detach_from_loader();
            self.registry.write().clear();
            return Err(e);
        }
        Ok(())
    }

    fn finish_subscription(&self, result: &ConnectorResult<()>) {
        let mut lifecycle = self.lifecycle.lock();
        match result {
            Ok(()) => {
                *lifecycle = Lifecycle::Subscribed;
                drop(lifecycle);
                tracing::info!(
                    "Subscribed to clearing house {} ({} accounts)",
                    self.program_id,
                    self.registry.read().len()
                );
                self.emit(ClearingHouseEvent::Update);
            }
            Err(e) => {
                *lifecycle = Lifecycle::Unsubscribed;
                tracing::error!("Subscription to clearing house {} failed: {}", self.program_id, e);
            }
        }
    }

    /// Resets a subscription whose task died without reporting.
    fn abandon_subscription(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Subscribing(_)) {
            self.detach_from_loader();
            self.registry.write().clear();
            *lifecycle = Lifecycle::Unsubscribed;
        }
    }

    fn attach_to_loader(self: &Arc<Self>) {
        let addresses = self.registry.read().addresses();
        for address in &addresses {
            self.loader.add_account(*address);
        }

        let weak = Arc::downgrade(self);
        let update_handler = self.loader.on_account_update(Arc::new(
            move |address: &Pubkey, data: &[u8]| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_account_update(address, data);
                }
            },
        ));

        let weak = Arc::downgrade(self);
        let error_handler = self.loader.on_error(Arc::new(move |error: &LoaderError| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_loader_error(error);
            }
        }));

        *self.registration.lock() = Some(Registration {
            addresses,
            update_handler,
            error_handler,
        });
    }

    fn detach_from_loader(&self) {
        let registration = self.registration.lock().take();
        if let Some(registration) = registration {
            for address in &registration.addresses {
                self.loader.remove_account(address);
            }
            self.loader.remove_handler(registration.update_handler);
            self.loader.remove_handler(registration.error_handler);
        }
    }

    /// Loads through the bulk loader, then decodes every tracked account it has bytes for.
    ///
    /// With `require_all_required`, a required account missing from the loader is an error.
    async fn fetch_all(&self, require_all_required: bool) -> ConnectorResult<()> {
        self.loader.load().await?;

        let tracked: Vec<TrackedAccount> = self.registry.read().iter().copied().collect();
        let mut first_error = None;

        for account in tracked {
            let Some(data) = self.loader.get_account_data(&account.address) else {
                if require_all_required && account.kind.is_required() {
                    first_error.get_or_insert(ConnectorError::MissingAccount {
                        kind: account.kind,
                        address: account.address,
                    });
                }
                continue;
            };

            match self.codec.decode(account.kind, &data) {
                Ok(record) => self.cache.write().store(record),
                Err(e) => {
                    tracing::warn!(address = %account.address, "Fetch could not decode account: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn handle_account_update(&self, address: &Pubkey, data: &[u8]) {
        // Addresses owned by other subscribers sharing the loader are ignored.
        let Some(tracked) = self.registry.read().get(address).copied() else {
            return;
        };

        match self.codec.decode(tracked.kind, data) {
            Ok(record) => {
                self.cache.write().store(record.clone());
                tracing::debug!(
                    %address,
                    event = tracked.change_event(),
                    "Tracked account updated"
                );
                self.emit(record.into());
                self.emit(ClearingHouseEvent::Update);
            }
            Err(e) => {
                tracing::warn!(%address, "Dropping undecodable account update: {}", e);
                self.emit(ClearingHouseEvent::Error(e));
            }
        }
    }

    fn handle_loader_error(&self, error: &LoaderError) {
        tracing::debug!("Forwarding bulk loader error: {}", error);
        self.emit(ClearingHouseEvent::Error(ConnectorError::Loader(error.clone())));
    }

    fn emit(&self, event: ClearingHouseEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.detach_from_loader();
    }
}
