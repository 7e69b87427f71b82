//! In-memory doubles shared by the unit tests.

use crate::fetcher::AccountFetcher;
use anchor_lang::AccountSerialize;
use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

/// An [`AccountFetcher`] over a mutable in-memory ledger that records every request.
#[derive(Default)]
pub struct MemoryFetcher {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    pub single_reads: Mutex<Vec<Pubkey>>,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub fail: Mutex<bool>,
}

impl MemoryFetcher {
    pub fn set(&self, address: Pubkey, data: &[u8]) {
        self.accounts.lock().insert(address, data.to_vec());
    }

    pub fn set_account<T: AccountSerialize>(&self, address: Pubkey, account: &T) {
        self.set(address, &encode(account));
    }

    pub fn remove(&self, address: &Pubkey) {
        self.accounts.lock().remove(address);
    }
}

#[async_trait]
impl AccountFetcher for MemoryFetcher {
    async fn fetch_account(&self, address: &Pubkey) -> anyhow::Result<Option<Vec<u8>>> {
        if *self.fail.lock() {
            anyhow::bail!("connection refused");
        }
        self.single_reads.lock().push(*address);
        Ok(self.accounts.lock().get(address).cloned())
    }

    async fn fetch_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> anyhow::Result<Vec<Option<Vec<u8>>>> {
        if *self.fail.lock() {
            anyhow::bail!("connection refused");
        }
        self.batch_sizes.lock().push(addresses.len());
        let accounts = self.accounts.lock();
        Ok(addresses.iter().map(|a| accounts.get(a).cloned()).collect())
    }
}

pub fn encode<T: AccountSerialize>(account: &T) -> Vec<u8> {
    let mut data = Vec::new();
    account.try_serialize(&mut data).unwrap();
    data
}
