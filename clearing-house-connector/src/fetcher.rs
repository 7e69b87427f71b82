//! Defines the RPC seam used for direct and batched account reads.

use anyhow::Result;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

/// A trait abstracting over how raw account data is read from the chain.
///
/// This keeps the subscriber and the [`PollingAccountLoader`](crate::loader::PollingAccountLoader)
/// independent of the transport, so tests can drive them with an in-memory ledger.
#[async_trait]
pub trait AccountFetcher: Send + Sync {
    /// Reads a single account. `Ok(None)` means the account does not exist.
    async fn fetch_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    /// Reads several accounts in one round trip. The result is positionally aligned with `addresses`.
    async fn fetch_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>>;
}

#[async_trait]
impl AccountFetcher for RpcClient {
    async fn fetch_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .get_account_with_commitment(address, self.commitment())
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn fetch_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        let response = self
            .get_multiple_accounts_with_commitment(addresses, self.commitment())
            .await?;
        Ok(response
            .value
            .into_iter()
            .map(|account| account.map(|account| account.data))
            .collect())
    }
}
