use anchor_lang::prelude::*;

/// The global clearing house configuration. Its address is the PDA returned by
/// [`crate::state_address`].
///
/// Apart from exchange-wide settings, this account is the directory of every other
/// account the program owns.
#[account]
#[derive(Debug, Default, PartialEq)]
pub struct State {
    /// The wallet allowed to run admin instructions.
    pub admin: Pubkey,
    pub exchange_paused: bool,
    pub funding_paused: bool,
    pub admin_controls_prices: bool,
    pub collateral_mint: Pubkey,
    pub collateral_vault: Pubkey,
    pub insurance_vault: Pubkey,
    /// Address of the [`Markets`] account.
    pub markets: Pubkey,
    /// Address of the [`OrderState`] account.
    pub order_state: Pubkey,
    pub trade_history: Pubkey,
    pub deposit_history: Pubkey,
    pub funding_payment_history: Pubkey,
    pub funding_rate_history: Pubkey,
    pub extended_curve_history: Pubkey,
    pub liquidation_history: Pubkey,
    pub margin_ratio_initial: u128,
    pub margin_ratio_partial: u128,
    pub margin_ratio_maintenance: u128,
    pub fee_structure: FeeStructure,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct FeeStructure {
    pub fee_numerator: u128,
    pub fee_denominator: u128,
}

/// All perpetual markets, indexed by `market_index`.
#[account]
#[derive(Debug, Default, PartialEq)]
pub struct Markets {
    pub markets: Vec<Market>,
}

impl Markets {
    /// Returns the market at `market_index` if it exists and has been initialized.
    pub fn market(&self, market_index: u64) -> Option<&Market> {
        self.markets
            .get(usize::try_from(market_index).ok()?)
            .filter(|market| market.initialized)
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct Market {
    pub initialized: bool,
    pub base_asset_amount_long: i128,
    pub base_asset_amount_short: i128,
    /// Net user position.
    pub base_asset_amount: i128,
    pub open_interest: u128,
    pub total_fee: u128,
    pub total_fee_withdrawn: u128,
    pub amm: Amm,
}

/// Virtual AMM parameters of a market.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq)]
pub struct Amm {
    pub oracle: Pubkey,
    pub base_asset_reserve: u128,
    pub quote_asset_reserve: u128,
    pub sqrt_k: u128,
    pub peg_multiplier: u128,
    pub cumulative_funding_rate_long: i128,
    pub cumulative_funding_rate_short: i128,
    pub last_funding_rate: i128,
    pub last_funding_rate_ts: i64,
    pub funding_period: i64,
    pub last_mark_price_twap: u128,
    pub last_mark_price_twap_ts: i64,
    pub minimum_quote_asset_trade_size: u128,
    pub minimum_base_asset_trade_size: u128,
}

/// Order-book settings shared by every market.
#[account]
#[derive(Debug, Default, PartialEq)]
pub struct OrderState {
    pub order_history: Pubkey,
    /// Smallest notional value, in quote precision, accepted for a limit order.
    pub min_order_quote_asset_amount: u128,
    pub reward_numerator: u128,
    pub reward_denominator: u128,
    pub time_based_reward_lower_bound: u128,
}
