//! Turns raw account bytes into typed records.

use crate::{error::ConnectorError, kind::AccountKind};
use anchor_lang::AccountDeserialize;
use clearing_house_state::{
    DepositHistory, ExtendedCurveHistory, FundingPaymentHistory, FundingRateHistory,
    LiquidationHistory, Markets, OrderState, State, TradeHistory,
};
use std::sync::Arc;

/// A decoded account, tagged by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountRecord {
    State(Arc<State>),
    Markets(Arc<Markets>),
    OrderState(Arc<OrderState>),
    TradeHistory(Arc<TradeHistory>),
    DepositHistory(Arc<DepositHistory>),
    FundingPaymentHistory(Arc<FundingPaymentHistory>),
    FundingRateHistory(Arc<FundingRateHistory>),
    ExtendedCurveHistory(Arc<ExtendedCurveHistory>),
    LiquidationHistory(Arc<LiquidationHistory>),
}

impl AccountRecord {
    pub fn kind(&self) -> AccountKind {
        match self {
            AccountRecord::State(_) => AccountKind::State,
            AccountRecord::Markets(_) => AccountKind::Markets,
            AccountRecord::OrderState(_) => AccountKind::OrderState,
            AccountRecord::TradeHistory(_) => AccountKind::TradeHistory,
            AccountRecord::DepositHistory(_) => AccountKind::DepositHistory,
            AccountRecord::FundingPaymentHistory(_) => AccountKind::FundingPaymentHistory,
            AccountRecord::FundingRateHistory(_) => AccountKind::FundingRateHistory,
            AccountRecord::ExtendedCurveHistory(_) => AccountKind::ExtendedCurveHistory,
            AccountRecord::LiquidationHistory(_) => AccountKind::LiquidationHistory,
        }
    }
}

/// Decodes account data for a given [`AccountKind`].
///
/// Implementations must fail with [`ConnectorError::DecodeFailed`] when the bytes do not
/// match the layout expected for `kind`.
pub trait AccountCodec: Send + Sync {
    fn decode(&self, kind: AccountKind, data: &[u8]) -> Result<AccountRecord, ConnectorError>;
}

/// The default codec for accounts written by the Anchor program: discriminator check
/// followed by Borsh deserialization of the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorAccountCodec;

impl AccountCodec for AnchorAccountCodec {
    fn decode(&self, kind: AccountKind, data: &[u8]) -> Result<AccountRecord, ConnectorError> {
        let record = match kind {
            AccountKind::State => AccountRecord::State(decode_as(kind, data)?),
            AccountKind::Markets => AccountRecord::Markets(decode_as(kind, data)?),
            AccountKind::OrderState => AccountRecord::OrderState(decode_as(kind, data)?),
            AccountKind::TradeHistory => AccountRecord::TradeHistory(decode_as(kind, data)?),
            AccountKind::DepositHistory => AccountRecord::DepositHistory(decode_as(kind, data)?),
            AccountKind::FundingPaymentHistory => {
                AccountRecord::FundingPaymentHistory(decode_as(kind, data)?)
            }
            AccountKind::FundingRateHistory => {
                AccountRecord::FundingRateHistory(decode_as(kind, data)?)
            }
            AccountKind::ExtendedCurveHistory => {
                AccountRecord::ExtendedCurveHistory(decode_as(kind, data)?)
            }
            AccountKind::LiquidationHistory => {
                AccountRecord::LiquidationHistory(decode_as(kind, data)?)
            }
        };
        Ok(record)
    }
}

fn decode_as<T: AccountDeserialize>(kind: AccountKind, data: &[u8]) -> Result<Arc<T>, ConnectorError> {
    let mut slice = data;
    T::try_deserialize(&mut slice)
        .map(Arc::new)
        .map_err(|e| ConnectorError::DecodeFailed {
            kind,
            reason: e.to_string(),
        })
}
