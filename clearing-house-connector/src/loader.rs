//! # Bulk Account Loader
//!
//! A single loader is shared by every subscriber in the process. Subscribers register
//! the addresses they care about, and one `load()` refreshes all of them in as few
//! `getMultipleAccounts` round trips as the chunk size allows.
//!
//! Consumers are notified through handlers registered with
//! [`BulkAccountLoader::on_account_update`] and [`BulkAccountLoader::on_error`]. Each
//! registration returns a [`HandlerId`], and a handler is removed by that id only, so
//! one subscriber tearing down never detaches another's handlers.

use crate::{config::LoaderConfig, error::LoaderError, fetcher::AccountFetcher};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;
use solana_sdk::pubkey::Pubkey;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{
    sync::{watch, Mutex},
    time::MissedTickBehavior,
};

/// Invoked with the address and new bytes of every account whose data changed.
pub type AccountUpdateHandler = Arc<dyn Fn(&Pubkey, &[u8]) + Send + Sync>;
/// Invoked with every error raised while refreshing accounts.
pub type LoaderErrorHandler = Arc<dyn Fn(&LoaderError) + Send + Sync>;

/// Identity of a registered handler, used to remove exactly that handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// The boundary between subscribers and the batched account transport.
#[async_trait]
pub trait BulkAccountLoader: Send + Sync {
    /// Starts tracking `address`. Calls are counted; see [`BulkAccountLoader::remove_account`].
    fn add_account(&self, address: Pubkey);

    /// Releases one registration of `address`. The address stops being refreshed once every
    /// `add_account` call for it has been matched.
    fn remove_account(&self, address: &Pubkey);

    /// Refreshes every tracked address once, notifying update handlers of changed data.
    async fn load(&self) -> Result<(), LoaderError>;

    /// The last bytes observed for `address`, if any.
    fn get_account_data(&self, address: &Pubkey) -> Option<Vec<u8>>;

    fn on_account_update(&self, handler: AccountUpdateHandler) -> HandlerId;

    fn on_error(&self, handler: LoaderErrorHandler) -> HandlerId;

    /// Detaches the handler registered under `id`. Unknown ids are ignored.
    fn remove_handler(&self, id: HandlerId);
}

#[derive(Default)]
struct Handlers {
    update: Vec<(HandlerId, AccountUpdateHandler)>,
    error: Vec<(HandlerId, LoaderErrorHandler)>,
}

/// The default [`BulkAccountLoader`], backed by an [`AccountFetcher`].
///
/// Call [`PollingAccountLoader::run`] in a background task to refresh on a fixed
/// interval, or call [`BulkAccountLoader::load`] directly.
pub struct PollingAccountLoader {
    fetcher: Arc<dyn AccountFetcher>,
    config: LoaderConfig,
    /// Tracked address -> number of outstanding registrations.
    accounts: DashMap<Pubkey, usize>,
    buffers: DashMap<Pubkey, Vec<u8>>,
    handlers: RwLock<Handlers>,
    next_handler_id: AtomicU64,
    /// Serialises concurrent `load()` calls.
    load_lock: Mutex<()>,
}

impl PollingAccountLoader {
    pub fn new(fetcher: Arc<dyn AccountFetcher>, config: LoaderConfig) -> Self {
        Self {
            fetcher,
            config,
            accounts: DashMap::new(),
            buffers: DashMap::new(),
            handlers: RwLock::new(Handlers::default()),
            next_handler_id: AtomicU64::new(1),
            load_lock: Mutex::new(()),
        }
    }

    /// Addresses currently refreshed by `load()`, sorted.
    pub fn tracked_accounts(&self) -> Vec<Pubkey> {
        let mut addresses: Vec<Pubkey> = self.accounts.iter().map(|entry| *entry.key()).collect();
        addresses.sort();
        addresses
    }

    /// Number of registered update and error handlers, in that order.
    pub fn handler_count(&self) -> (usize, usize) {
        let handlers = self.handlers.read();
        (handlers.update.len(), handlers.error.len())
    }

    /// Polls `load()` every `poll_interval_ms` until `shutdown` changes or its sender is dropped.
    ///
    /// Failures are already reported to error handlers; here they are only logged and the
    /// loop keeps polling.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Account loader polling every {}ms",
            self.config.poll_interval_ms
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.load().await {
                        tracing::error!("Error during bulk account load: {}", e);
                    }
                },
                _ = shutdown.changed() => {
                    tracing::info!("PollingAccountLoader: shutdown signal received, exiting.");
                    return;
                }
            }
        }
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed))
    }

    fn notify_updates(&self, changed: &[(Pubkey, Vec<u8>)]) {
        if changed.is_empty() {
            return;
        }
        let handlers: Vec<AccountUpdateHandler> = self
            .handlers
            .read()
            .update
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for (address, data) in changed {
            for handler in &handlers {
                handler(address, data);
            }
        }
    }

    fn notify_error(&self, error: &LoaderError) {
        let handlers: Vec<LoaderErrorHandler> = self
            .handlers
            .read()
            .error
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler(error);
        }
    }
}

#[async_trait]
impl BulkAccountLoader for PollingAccountLoader {
    fn add_account(&self, address: Pubkey) {
        *self.accounts.entry(address).or_insert(0) += 1;
    }

    fn remove_account(&self, address: &Pubkey) {
        if let Entry::Occupied(mut entry) = self.accounts.entry(*address) {
            *entry.get_mut() -= 1;
            if *entry.get() == 0 {
                entry.remove();
                self.buffers.remove(address);
            }
        }
    }

    async fn load(&self) -> Result<(), LoaderError> {
        let _guard = self.load_lock.lock().await;

        let addresses = self.tracked_accounts();
        if addresses.is_empty() {
            return Ok(());
        }

        let mut changed = Vec::new();
        let mut failure = None;

        for chunk in addresses.chunks(self.config.max_accounts_per_request.max(1)) {
            let accounts = match self.fetcher.fetch_multiple_accounts(chunk).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    failure = Some(LoaderError::Rpc {
                        accounts: chunk.len(),
                        reason: e.to_string(),
                    });
                    break;
                }
            };

            for (address, data) in chunk.iter().zip(accounts) {
                let Some(data) = data else {
                    continue;
                };
                // Released while the request was in flight.
                if !self.accounts.contains_key(address) {
                    continue;
                }
                let unchanged = self
                    .buffers
                    .get(address)
                    .is_some_and(|buffered| *buffered == data);
                if unchanged {
                    continue;
                }
                self.buffers.insert(*address, data.clone());
                changed.push((*address, data));
            }
        }

        tracing::debug!(
            tracked = addresses.len(),
            changed = changed.len(),
            "Bulk account load finished"
        );
        self.notify_updates(&changed);

        match failure {
            Some(error) => {
                self.notify_error(&error);
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn get_account_data(&self, address: &Pubkey) -> Option<Vec<u8>> {
        self.buffers.get(address).map(|data| data.clone())
    }

    fn on_account_update(&self, handler: AccountUpdateHandler) -> HandlerId {
        let id = self.next_id();
        self.handlers.write().update.push((id, handler));
        id
    }

    fn on_error(&self, handler: LoaderErrorHandler) -> HandlerId {
        let id = self.next_id();
        self.handlers.write().error.push((id, handler));
        id
    }

    fn remove_handler(&self, id: HandlerId) {
        let mut handlers = self.handlers.write();
        handlers.update.retain(|(handler_id, _)| *handler_id != id);
        handlers.error.retain(|(handler_id, _)| *handler_id != id);
    }
}
