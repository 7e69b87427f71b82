//! # Subscription Registry
//!
//! Maps every tracked address to the account kind it holds. The registry is filled
//! once per subscription from the global state account, which is read directly
//! rather than through the bulk loader because it is the account that names all the
//! others.

use crate::{
    codec::{AccountCodec, AccountRecord},
    error::{ConnectorError, ConnectorResult},
    fetcher::AccountFetcher,
    kind::{AccountKind, OptionalKindSet},
};
use clearing_house_state::state_address;
use solana_sdk::pubkey::Pubkey;
use std::collections::{hash_map::Entry, HashMap};

/// One tracked account: where it lives and what it decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedAccount {
    pub address: Pubkey,
    pub kind: AccountKind,
}

impl TrackedAccount {
    /// Name of the event emitted when this account changes.
    pub fn change_event(&self) -> &'static str {
        self.kind.change_event()
    }
}

/// At most one [`TrackedAccount`] per address.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    accounts: HashMap<Pubkey, TrackedAccount>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the registry with the required accounts and every kind in `optional_kinds`.
    ///
    /// Does nothing if the registry already holds entries. On failure the registry is left
    /// untouched and the error is returned as-is; there is no retry.
    ///
    /// Two tracked kinds whose addresses coincide (typically two history accounts the
    /// program never initialised, both left at `Pubkey::default()`) fail with
    /// [`ConnectorError::SharedAccountAddress`].
    pub async fn populate(
        &mut self,
        fetcher: &dyn AccountFetcher,
        codec: &dyn AccountCodec,
        program_id: &Pubkey,
        optional_kinds: &OptionalKindSet,
    ) -> ConnectorResult<()> {
        if !self.is_empty() {
            return Ok(());
        }

        let address = state_address(program_id);
        let data = fetcher
            .fetch_account(&address)
            .await
            .map_err(|e| ConnectorError::BootstrapFetchFailed {
                address,
                reason: format!("{:#}", e),
            })?
            .ok_or_else(|| ConnectorError::BootstrapFetchFailed {
                address,
                reason: "account does not exist".to_string(),
            })?;

        let state = match codec.decode(AccountKind::State, &data)? {
            AccountRecord::State(state) => state,
            other => {
                return Err(ConnectorError::DecodeFailed {
                    kind: AccountKind::State,
                    reason: format!("codec returned a {} record", other.kind()),
                })
            }
        };

        let kinds = AccountKind::ALL
            .into_iter()
            .filter(|kind| kind.is_required() || optional_kinds.contains(*kind));

        let mut accounts = HashMap::new();
        for kind in kinds {
            let tracked = TrackedAccount {
                address: kind.address_in(&state, address),
                kind,
            };
            match accounts.entry(tracked.address) {
                Entry::Vacant(slot) => {
                    slot.insert(tracked);
                }
                Entry::Occupied(existing) => {
                    return Err(ConnectorError::SharedAccountAddress {
                        kind,
                        existing: existing.get().kind,
                        address: tracked.address,
                    });
                }
            }
        }

        tracing::debug!(
            "Registry populated with {} accounts from state {}",
            accounts.len(),
            address
        );
        self.accounts = accounts;
        Ok(())
    }

    pub fn get(&self, address: &Pubkey) -> Option<&TrackedAccount> {
        self.accounts.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedAccount> {
        self.accounts.values()
    }

    pub fn addresses(&self) -> Vec<Pubkey> {
        self.accounts.keys().copied().collect()
    }

    /// The address tracked for `kind`, if any.
    pub fn address_of(&self, kind: AccountKind) -> Option<Pubkey> {
        self.iter()
            .find(|tracked| tracked.kind == kind)
            .map(|tracked| tracked.address)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn clear(&mut self) {
        self.accounts.clear();
    }
}
