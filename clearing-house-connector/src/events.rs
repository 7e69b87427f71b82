use crate::{codec::AccountRecord, error::ConnectorError};
use clearing_house_state::{
    DepositHistory, ExtendedCurveHistory, FundingPaymentHistory, FundingRateHistory,
    LiquidationHistory, Markets, OrderState, State, TradeHistory,
};
use std::sync::Arc;

/// Everything a [`ClearingHouseSubscriber`](crate::subscriber::ClearingHouseSubscriber)
/// publishes on its event stream.
///
/// A change to a tracked account produces the kind-specific variant first, then
/// [`ClearingHouseEvent::Update`].
#[derive(Debug, Clone)]
pub enum ClearingHouseEvent {
    StateAccountUpdate(Arc<State>),
    MarketsAccountUpdate(Arc<Markets>),
    OrderStateAccountUpdate(Arc<OrderState>),
    TradeHistoryAccountUpdate(Arc<TradeHistory>),
    DepositHistoryAccountUpdate(Arc<DepositHistory>),
    FundingPaymentHistoryAccountUpdate(Arc<FundingPaymentHistory>),
    FundingRateHistoryAccountUpdate(Arc<FundingRateHistory>),
    ExtendedCurveHistoryAccountUpdate(Arc<ExtendedCurveHistory>),
    LiquidationHistoryAccountUpdate(Arc<LiquidationHistory>),
    /// Some tracked account changed, or the initial fetch completed.
    Update,
    /// A failure from the bulk loader or from decoding a pushed update.
    Error(ConnectorError),
}

impl ClearingHouseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClearingHouseEvent::Update => "update",
            ClearingHouseEvent::Error(_) => "error",
            ClearingHouseEvent::StateAccountUpdate(_) => "stateAccountUpdate",
            ClearingHouseEvent::MarketsAccountUpdate(_) => "marketsAccountUpdate",
            ClearingHouseEvent::OrderStateAccountUpdate(_) => "orderStateAccountUpdate",
            ClearingHouseEvent::TradeHistoryAccountUpdate(_) => "tradeHistoryAccountUpdate",
            ClearingHouseEvent::DepositHistoryAccountUpdate(_) => "depositHistoryAccountUpdate",
            ClearingHouseEvent::FundingPaymentHistoryAccountUpdate(_) => {
                "fundingPaymentHistoryAccountUpdate"
            }
            ClearingHouseEvent::FundingRateHistoryAccountUpdate(_) => {
                "fundingRateHistoryAccountUpdate"
            }
            ClearingHouseEvent::ExtendedCurveHistoryAccountUpdate(_) => {
                "extendedCurveHistoryAccountUpdate"
            }
            ClearingHouseEvent::LiquidationHistoryAccountUpdate(_) => {
                "liquidationHistoryAccountUpdate"
            }
        }
    }
}

impl From<AccountRecord> for ClearingHouseEvent {
    fn from(record: AccountRecord) -> Self {
        match record {
            AccountRecord::State(v) => ClearingHouseEvent::StateAccountUpdate(v),
            AccountRecord::Markets(v) => ClearingHouseEvent::MarketsAccountUpdate(v),
            AccountRecord::OrderState(v) => ClearingHouseEvent::OrderStateAccountUpdate(v),
            AccountRecord::TradeHistory(v) => ClearingHouseEvent::TradeHistoryAccountUpdate(v),
            AccountRecord::DepositHistory(v) => ClearingHouseEvent::DepositHistoryAccountUpdate(v),
            AccountRecord::FundingPaymentHistory(v) => {
                ClearingHouseEvent::FundingPaymentHistoryAccountUpdate(v)
            }
            AccountRecord::FundingRateHistory(v) => {
                ClearingHouseEvent::FundingRateHistoryAccountUpdate(v)
            }
            AccountRecord::ExtendedCurveHistory(v) => {
                ClearingHouseEvent::ExtendedCurveHistoryAccountUpdate(v)
            }
            AccountRecord::LiquidationHistory(v) => {
                ClearingHouseEvent::LiquidationHistoryAccountUpdate(v)
            }
        }
    }
}
