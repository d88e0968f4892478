//! Error handling for the ledger engine
//!
//! Defines the typed input-validation errors raised by engine computations,
//! the non-fatal warnings returned alongside best-effort results, and a
//! unified Result type using anyhow for context chaining in outer layers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::db::models::{AssetId, LiabilityId, TransactionId};

/// Core error types for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("grant date {grant} must be before purchase date {purchase}")]
    GrantNotBeforePurchase { grant: NaiveDate, purchase: NaiveDate },

    #[error("sell date {sell} is before purchase date {purchase}")]
    SellBeforePurchase { sell: NaiveDate, purchase: NaiveDate },

    #[error("liability payment has negative {field}: {amount}")]
    NegativePaymentAmount { field: &'static str, amount: Decimal },

    #[error("payment dated {payment} precedes liability start {start}")]
    PaymentBeforeLiabilityStart { payment: NaiveDate, start: NaiveDate },

    #[error(
        "insufficient open lots for {asset} on {date}: requested {requested}, available {available}"
    )]
    InsufficientLots {
        asset: AssetId,
        date: NaiveDate,
        requested: Decimal,
        available: Decimal,
    },

    #[error("date arithmetic out of range from {0}")]
    DateOutOfRange(NaiveDate),

    #[error("database error: {0}")]
    DbError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for outer layers (storage, dispatch)
pub type Result<T> = anyhow::Result<T>;

/// Non-fatal conditions attached to a best-effort result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// A feed entry whose kind is outside the closed set; it contributed no cash.
    UnrecognizedKind {
        transaction: TransactionId,
        label: String,
    },
    /// No price point exists for the asset; the holding was left out.
    MissingPrice { asset: AssetId, date: NaiveDate },
    /// Spinoffs and mergers are recorded but not applied to lots.
    UnsupportedLotEvent {
        transaction: TransactionId,
        asset: AssetId,
        kind: String,
    },
    /// A hypothetical disposition check was skipped because the lot's dates are invalid.
    InvalidEquityCompensationDates { asset: AssetId, reason: String },
    /// The requested date precedes every recorded payment; the balance is a partial correction.
    LiabilityPrecedesPaymentHistory {
        liability: LiabilityId,
        date: NaiveDate,
        earliest_payment: NaiveDate,
    },
    /// No payments are recorded; the current balance is reported unchanged.
    LiabilityNoPaymentHistory { liability: LiabilityId, date: NaiveDate },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnrecognizedKind { transaction, label } => {
                write!(f, "transaction {} has unrecognized kind '{}'", transaction, label)
            }
            Warning::MissingPrice { asset, date } => {
                write!(f, "no price for {} near {}; holding excluded", asset, date)
            }
            Warning::UnsupportedLotEvent {
                transaction,
                asset,
                kind,
            } => write!(
                f,
                "{} event {} for {} is not applied to tax lots",
                kind, transaction, asset
            ),
            Warning::InvalidEquityCompensationDates { asset, reason } => {
                write!(f, "disposition check skipped for {}: {}", asset, reason)
            }
            Warning::LiabilityPrecedesPaymentHistory {
                liability,
                date,
                earliest_payment,
            } => write!(
                f,
                "balance of {} on {} precedes first recorded payment ({}); reconstruction is partial",
                liability, date, earliest_payment
            ),
            Warning::LiabilityNoPaymentHistory { liability, date } => write!(
                f,
                "no payments recorded for {}; balance on {} is the current balance",
                liability, date
            ),
        }
    }
}
