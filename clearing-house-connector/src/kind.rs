//! The closed set of clearing house accounts a subscriber can track.

use clearing_house_state::State;
use solana_sdk::pubkey::Pubkey;
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Identifies an account type, and with it the decoder, cache slot and change event used for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountKind {
    State,
    Markets,
    OrderState,
    TradeHistory,
    DepositHistory,
    FundingPaymentHistory,
    FundingRateHistory,
    ExtendedCurveHistory,
    LiquidationHistory,
}

impl AccountKind {
    pub const ALL: [AccountKind; 9] = [
        AccountKind::State,
        AccountKind::Markets,
        AccountKind::OrderState,
        AccountKind::TradeHistory,
        AccountKind::DepositHistory,
        AccountKind::FundingPaymentHistory,
        AccountKind::FundingRateHistory,
        AccountKind::ExtendedCurveHistory,
        AccountKind::LiquidationHistory,
    ];

    /// Kinds tracked by every subscription regardless of the requested optional set.
    pub fn is_required(self) -> bool {
        matches!(self, AccountKind::State | AccountKind::Markets)
    }

    /// The account name as used in configuration files, e.g. `tradeHistoryAccount`.
    pub fn name(self) -> &'static str {
        match self {
            AccountKind::State => "stateAccount",
            AccountKind::Markets => "marketsAccount",
            AccountKind::OrderState => "orderStateAccount",
            AccountKind::TradeHistory => "tradeHistoryAccount",
            AccountKind::DepositHistory => "depositHistoryAccount",
            AccountKind::FundingPaymentHistory => "fundingPaymentHistoryAccount",
            AccountKind::FundingRateHistory => "fundingRateHistoryAccount",
            AccountKind::ExtendedCurveHistory => "extendedCurveHistoryAccount",
            AccountKind::LiquidationHistory => "liquidationHistoryAccount",
        }
    }

    /// Name of the event emitted when an account of this kind changes.
    pub fn change_event(self) -> &'static str {
        match self {
            AccountKind::State => "stateAccountUpdate",
            AccountKind::Markets => "marketsAccountUpdate",
            AccountKind::OrderState => "orderStateAccountUpdate",
            AccountKind::TradeHistory => "tradeHistoryAccountUpdate",
            AccountKind::DepositHistory => "depositHistoryAccountUpdate",
            AccountKind::FundingPaymentHistory => "fundingPaymentHistoryAccountUpdate",
            AccountKind::FundingRateHistory => "fundingRateHistoryAccountUpdate",
            AccountKind::ExtendedCurveHistory => "extendedCurveHistoryAccountUpdate",
            AccountKind::LiquidationHistory => "liquidationHistoryAccountUpdate",
        }
    }

    /// Where the address of this account lives inside the global state account.
    pub fn address_in(self, state: &State, state_address: Pubkey) -> Pubkey {
        match self {
            AccountKind::State => state_address,
            AccountKind::Markets => state.markets,
            AccountKind::OrderState => state.order_state,
            AccountKind::TradeHistory => state.trade_history,
            AccountKind::DepositHistory => state.deposit_history,
            AccountKind::FundingPaymentHistory => state.funding_payment_history,
            AccountKind::FundingRateHistory => state.funding_rate_history,
            AccountKind::ExtendedCurveHistory => state.extended_curve_history,
            AccountKind::LiquidationHistory => state.liquidation_history,
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("Unknown account kind '{}'", s))
    }
}

/// The optional kinds a subscription was asked to track on top of the required ones.
///
/// Required kinds are silently dropped on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalKindSet(BTreeSet<AccountKind>);

impl OptionalKindSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: AccountKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AccountKind> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<AccountKind> for OptionalKindSet {
    fn from_iter<I: IntoIterator<Item = AccountKind>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|kind| !kind.is_required()).collect())
    }
}

impl<const N: usize> From<[AccountKind; N]> for OptionalKindSet {
    fn from(kinds: [AccountKind; N]) -> Self {
        kinds.into_iter().collect()
    }
}
