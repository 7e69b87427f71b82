use crate::{codec::AccountRecord, kind::AccountKind};
use clearing_house_state::{
    DepositHistory, ExtendedCurveHistory, FundingPaymentHistory, FundingRateHistory,
    LiquidationHistory, Markets, OrderState, State, TradeHistory,
};
use std::sync::Arc;

/// The latest decoded value of every tracked account, one slot per kind.
///
/// Values are shared as `Arc`s, so handing a record to a reader or an event
/// subscriber never copies the account body.
#[derive(Debug, Clone, Default)]
pub struct AccountCache {
    pub state: Option<Arc<State>>,
    pub markets: Option<Arc<Markets>>,
    pub order_state: Option<Arc<OrderState>>,
    pub trade_history: Option<Arc<TradeHistory>>,
    pub deposit_history: Option<Arc<DepositHistory>>,
    pub funding_payment_history: Option<Arc<FundingPaymentHistory>>,
    pub funding_rate_history: Option<Arc<FundingRateHistory>>,
    pub extended_curve_history: Option<Arc<ExtendedCurveHistory>>,
    pub liquidation_history: Option<Arc<LiquidationHistory>>,
}

impl AccountCache {
    /// Replaces the slot matching the record's kind.
    pub fn store(&mut self, record: AccountRecord) {
        match record {
            AccountRecord::State(v) => self.state = Some(v),
            AccountRecord::Markets(v) => self.markets = Some(v),
            AccountRecord::OrderState(v) => self.order_state = Some(v),
            AccountRecord::TradeHistory(v) => self.trade_history = Some(v),
            AccountRecord::DepositHistory(v) => self.deposit_history = Some(v),
            AccountRecord::FundingPaymentHistory(v) => self.funding_payment_history = Some(v),
            AccountRecord::FundingRateHistory(v) => self.funding_rate_history = Some(v),
            AccountRecord::ExtendedCurveHistory(v) => self.extended_curve_history = Some(v),
            AccountRecord::LiquidationHistory(v) => self.liquidation_history = Some(v),
        }
    }

    pub fn is_loaded(&self, kind: AccountKind) -> bool {
        match kind {
            AccountKind::State => self.state.is_some(),
            AccountKind::Markets => self.markets.is_some(),
            AccountKind::OrderState => self.order_state.is_some(),
            AccountKind::TradeHistory => self.trade_history.is_some(),
            AccountKind::DepositHistory => self.deposit_history.is_some(),
            AccountKind::FundingPaymentHistory => self.funding_payment_history.is_some(),
            AccountKind::FundingRateHistory => self.funding_rate_history.is_some(),
            AccountKind::ExtendedCurveHistory => self.extended_curve_history.is_some(),
            AccountKind::LiquidationHistory => self.liquidation_history.is_some(),
        }
    }
}
