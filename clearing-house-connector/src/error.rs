use crate::kind::AccountKind;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors surfaced by the [`ClearingHouseSubscriber`](crate::subscriber::ClearingHouseSubscriber).
///
/// The type is `Clone` so a single subscribe outcome can be handed to every caller
/// waiting on the same in-flight subscription, and so it can travel on the event stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Not subscribed: call `subscribe` before reading accounts")]
    NotSubscribed,

    #[error("The {0} stream was not requested at subscribe time")]
    OptionalStreamNotRequested(AccountKind),

    #[error("Failed to fetch clearing house state account {address}: {reason}")]
    BootstrapFetchFailed { address: Pubkey, reason: String },

    #[error("Failed to decode {kind}: {reason}")]
    DecodeFailed { kind: AccountKind, reason: String },

    #[error("Bulk account loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Required account {kind} ({address}) was not returned by the account loader")]
    MissingAccount { kind: AccountKind, address: Pubkey },

    #[error("The state account names {address} for both {existing} and {kind}")]
    SharedAccountAddress {
        kind: AccountKind,
        existing: AccountKind,
        address: Pubkey,
    },

    #[error("No data has been observed for {0} yet")]
    AccountNotLoaded(AccountKind),

    #[error("The subscription task ended before reporting a result")]
    SubscribeAborted,
}

/// Errors raised by a [`BulkAccountLoader`](crate::loader::BulkAccountLoader).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("RPC request for {accounts} accounts failed: {reason}")]
    Rpc { accounts: usize, reason: String },
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
