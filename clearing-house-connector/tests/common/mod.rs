#![allow(dead_code)]

use anchor_lang::AccountSerialize;
use async_trait::async_trait;
use clearing_house_connector::{
    config::LoaderConfig, AccountFetcher, ClearingHouseEvent, ClearingHouseSubscriber,
    ConnectorConfig, PollingAccountLoader,
};
use clearing_house_state::{
    state_address, DepositHistory, FundingRateHistory, FundingRateRecord, Market, Markets,
    OrderState, State, TradeHistory, TradeRecord,
};
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{
    broadcast::{self, error::TryRecvError},
    Notify,
};

/// An [`AccountFetcher`] over a mutable in-memory ledger that records every request.
///
/// Mirrors the unit-test double in `src/testing.rs`, plus a gate that can hold the
/// bootstrap read of the state account.
#[derive(Default)]
pub struct MemoryFetcher {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    pub single_reads: Mutex<Vec<Pubkey>>,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub fail: Mutex<bool>,
    /// When set, `fetch_account` waits for a notification before reading.
    pub single_read_gate: Mutex<Option<Arc<Notify>>>,
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

    /// Makes every following `fetch_account` wait until the returned `Notify` fires.
    pub fn hold_single_reads(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.single_read_gate.lock() = Some(release.clone());
        release
    }
}

#[async_trait]
impl AccountFetcher for MemoryFetcher {
    async fn fetch_account(&self, address: &Pubkey) -> anyhow::Result<Option<Vec<u8>>> {
        let hold = self.single_read_gate.lock().clone();
        if let Some(release) = hold {
            release.notified().await;
        }
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

pub fn markets_with_open_interest(open_interest: u128) -> Markets {
    Markets {
        markets: vec![Market {
            initialized: true,
            open_interest,
            ..Market::default()
        }],
    }
}

pub fn trade_history(record_ids: &[u128]) -> TradeHistory {
    TradeHistory {
        head: record_ids.len() as u64,
        records: record_ids
            .iter()
            .map(|&record_id| TradeRecord {
                record_id,
                ..TradeRecord::default()
            })
            .collect(),
    }
}

/// A clearing house with every account seeded on the in-memory ledger.
pub struct Fixture {
    pub program_id: Pubkey,
    pub state_address: Pubkey,
    pub state: State,
    pub fetcher: Arc<MemoryFetcher>,
    pub loader: Arc<PollingAccountLoader>,
    pub config: ConnectorConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let program_id = Pubkey::new_unique();
        let state_address = state_address(&program_id);
        let state = State {
            admin: Pubkey::new_unique(),
            markets: Pubkey::new_unique(),
            order_state: Pubkey::new_unique(),
            trade_history: Pubkey::new_unique(),
            deposit_history: Pubkey::new_unique(),
            funding_payment_history: Pubkey::new_unique(),
            funding_rate_history: Pubkey::new_unique(),
            extended_curve_history: Pubkey::new_unique(),
            liquidation_history: Pubkey::new_unique(),
            margin_ratio_initial: 2000,
            ..State::default()
        };

        let fetcher = Arc::new(MemoryFetcher::default());
        fetcher.set_account(state_address, &state);
        fetcher.set_account(state.markets, &markets_with_open_interest(1));
        fetcher.set_account(
            state.order_state,
            &OrderState {
                min_order_quote_asset_amount: 500_000,
                ..OrderState::default()
            },
        );
        fetcher.set_account(state.trade_history, &trade_history(&[1, 2]));
        fetcher.set_account(state.deposit_history, &DepositHistory::default());
        fetcher.set_account(
            state.funding_rate_history,
            &FundingRateHistory {
                head: 1,
                records: vec![FundingRateRecord {
                    record_id: 1,
                    funding_rate: -42,
                    ..FundingRateRecord::default()
                }],
            },
        );

        let config = ConnectorConfig::default();
        let loader = Arc::new(PollingAccountLoader::new(
            fetcher.clone(),
            LoaderConfig {
                poll_interval_ms: 50,
                max_accounts_per_request: 3,
            },
        ));

        Self {
            program_id,
            state_address,
            state,
            fetcher,
            loader,
            config,
        }
    }

    pub fn subscriber(&self) -> ClearingHouseSubscriber {
        ClearingHouseSubscriber::new(
            &self.config,
            self.program_id,
            self.fetcher.clone(),
            self.loader.clone(),
        )
    }
}

/// Everything currently buffered on `rx`, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<ClearingHouseEvent>) -> Vec<ClearingHouseEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
        }
    }
}
