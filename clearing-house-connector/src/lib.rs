//! A polling account-state synchronizer for the clearing house program.
//!
//! This crate keeps an in-memory, typed copy of the clearing house accounts and notifies
//! consumers whenever one of them changes. It never submits transactions and never
//! persists anything; it only reads, decodes and caches.
//!
//! # Key Components
//!
//! *   [`subscriber::ClearingHouseSubscriber`]: The main entry point. Subscribes to the global
//!     state and markets accounts plus any requested history accounts, and exposes typed
//!     getters and an event stream.
//! *   [`loader::PollingAccountLoader`]: A bulk loader shared between subscribers. It batches
//!     every tracked address into `getMultipleAccounts` calls and pushes changed bytes to
//!     registered handlers.
//! *   [`codec`]: Decoding of raw account bytes into the records of `clearing-house-state`.
//! *   [`fetcher::AccountFetcher`]: The RPC seam, implemented for the nonblocking `RpcClient`.
pub mod cache;
pub mod codec;
/// Defines configuration structures for the connector.
pub mod config;
pub mod error;
/// Events published by a subscriber.
pub mod events;
pub mod fetcher;
/// The closed set of tracked account kinds.
pub mod kind;
pub mod loader;
/// Which addresses a subscriber tracks, and as what.
pub mod registry;
pub mod subscriber;

#[cfg(test)]
mod testing;

pub use codec::{AccountCodec, AccountRecord, AnchorAccountCodec};
pub use config::ConnectorConfig;
pub use error::{ConnectorError, ConnectorResult, LoaderError};
pub use events::ClearingHouseEvent;
pub use fetcher::AccountFetcher;
pub use kind::{AccountKind, OptionalKindSet};
pub use loader::{BulkAccountLoader, PollingAccountLoader};
pub use subscriber::{ClearingHouseSubscriber, SubscriptionState};
