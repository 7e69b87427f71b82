use anchor_lang::prelude::*;

/// Ring-buffer accessors shared by every history account.
macro_rules! ring_buffer {
    ($account:ident, $record:ident) => {
        impl $account {
            /// The slot the next record will be written to.
            pub fn next_record_index(&self) -> usize {
                self.head as usize
            }

            pub fn records(&self) -> &[$record] {
                &self.records
            }

            /// The most recently written record, if the buffer holds any.
            pub fn latest(&self) -> Option<&$record> {
                let len = self.records.len();
                if len == 0 {
                    return None;
                }
                // `head` is account data; reduce it before stepping back one slot.
                let head = (self.head % len as u64) as usize;
                self.records.get((head + len - 1) % len)
            }
        }
    };
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PositionDirection {
    #[default]
    Long,
    Short,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DepositDirection {
    #[default]
    Deposit,
    Withdraw,
}

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct TradeHistory {
    pub head: u64,
    pub records: Vec<TradeRecord>,
}
ring_buffer!(TradeHistory, TradeRecord);

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct TradeRecord {
    pub ts: i64,
    pub record_id: u128,
    pub user_authority: Pubkey,
    pub user: Pubkey,
    pub direction: PositionDirection,
    pub base_asset_amount: u128,
    pub quote_asset_amount: u128,
    pub mark_price_before: u128,
    pub mark_price_after: u128,
    pub fee: u128,
    pub liquidation: bool,
    pub market_index: u64,
    pub oracle_price: i128,
}

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct DepositHistory {
    pub head: u64,
    pub records: Vec<DepositRecord>,
}
ring_buffer!(DepositHistory, DepositRecord);

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct DepositRecord {
    pub ts: i64,
    pub record_id: u128,
    pub user_authority: Pubkey,
    pub user: Pubkey,
    pub direction: DepositDirection,
    pub collateral_before: u128,
    pub cumulative_deposits_before: i128,
    pub amount: u64,
}

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct FundingPaymentHistory {
    pub head: u64,
    pub records: Vec<FundingPaymentRecord>,
}
ring_buffer!(FundingPaymentHistory, FundingPaymentRecord);

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct FundingPaymentRecord {
    pub ts: i64,
    pub record_id: u128,
    pub user_authority: Pubkey,
    pub user: Pubkey,
    pub market_index: u64,
    pub funding_payment: i128,
    pub base_asset_amount: i128,
    pub user_last_cumulative_funding: i128,
    pub amm_cumulative_funding_long: i128,
    pub amm_cumulative_funding_short: i128,
}

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct FundingRateHistory {
    pub head: u64,
    pub records: Vec<FundingRateRecord>,
}
ring_buffer!(FundingRateHistory, FundingRateRecord);

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct FundingRateRecord {
    pub ts: i64,
    pub record_id: u128,
    pub market_index: u64,
    pub funding_rate: i128,
    pub cumulative_funding_rate_long: i128,
    pub cumulative_funding_rate_short: i128,
    pub oracle_price_twap: i128,
    pub mark_price_twap: u128,
}

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct ExtendedCurveHistory {
    pub head: u64,
    pub records: Vec<ExtendedCurveRecord>,
}
ring_buffer!(ExtendedCurveHistory, ExtendedCurveRecord);

/// A repeg or k-adjustment of a market's AMM.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct ExtendedCurveRecord {
    pub ts: i64,
    pub record_id: u128,
    pub market_index: u64,
    pub peg_multiplier_before: u128,
    pub base_asset_reserve_before: u128,
    pub quote_asset_reserve_before: u128,
    pub sqrt_k_before: u128,
    pub peg_multiplier_after: u128,
    pub base_asset_reserve_after: u128,
    pub quote_asset_reserve_after: u128,
    pub sqrt_k_after: u128,
    pub total_fee: u128,
    pub adjustment_cost: i128,
    pub oracle_price: i128,
}

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct LiquidationHistory {
    pub head: u64,
    pub records: Vec<LiquidationRecord>,
}
ring_buffer!(LiquidationHistory, LiquidationRecord);

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct LiquidationRecord {
    pub ts: i64,
    pub record_id: u128,
    pub user_authority: Pubkey,
    pub user: Pubkey,
    pub partial: bool,
    pub base_asset_value: u128,
    pub liquidation_fee: u128,
    pub fee_to_liquidator: u64,
    pub fee_to_insurance_fund: u64,
    pub liquidator: Pubkey,
    pub total_collateral: u128,
    pub margin_ratio: u128,
}
