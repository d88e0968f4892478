//! Historical liability balances reconstructed from the payment log.
//!
//! Only the current balance is stored. A past balance is the current one plus
//! the principal of every payment made after that date. Before the first
//! recorded payment this is only a partial correction, and the result says so.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::db::models::{Liability, LiabilityPayment};
use crate::error::{LedgerError, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionAccuracy {
    /// Every payment after the date is recorded
    Exact,
    /// The date precedes the earliest recorded payment; earlier payments may be missing
    PrecedesPaymentHistory,
    /// No payments recorded; the current balance is returned as-is
    NoPaymentHistory,
}

impl ReconstructionAccuracy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconstructionAccuracy::Exact => "exact",
            ReconstructionAccuracy::PrecedesPaymentHistory => "precedes_payment_history",
            ReconstructionAccuracy::NoPaymentHistory => "no_payment_history",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiabilityBalance {
    pub date: NaiveDate,
    pub balance: Decimal,
    pub accuracy: ReconstructionAccuracy,
    /// The date falls before the liability's start date
    pub before_origination: bool,
    pub warnings: Vec<Warning>,
}

impl LiabilityBalance {
    pub fn is_exact(&self) -> bool {
        self.accuracy == ReconstructionAccuracy::Exact
    }
}

/// Reject payments with negative amounts or dated before the liability starts
pub fn validate_payment(liability: &Liability, payment: &LiabilityPayment) -> Result<(), LedgerError> {
    if payment.principal_paid < Decimal::ZERO {
        return Err(LedgerError::NegativePaymentAmount {
            field: "principal",
            amount: payment.principal_paid,
        });
    }
    if payment.interest_paid < Decimal::ZERO {
        return Err(LedgerError::NegativePaymentAmount {
            field: "interest",
            amount: payment.interest_paid,
        });
    }
    if payment.date < liability.start_date {
        return Err(LedgerError::PaymentBeforeLiabilityStart {
            payment: payment.date,
            start: liability.start_date,
        });
    }
    Ok(())
}

fn assess(
    liability: &Liability,
    earliest_payment: Option<NaiveDate>,
    date: NaiveDate,
    balance: Decimal,
) -> LiabilityBalance {
    let (accuracy, warning) = match earliest_payment {
        None => (
            ReconstructionAccuracy::NoPaymentHistory,
            Some(Warning::LiabilityNoPaymentHistory {
                liability: liability.id,
                date,
            }),
        ),
        Some(earliest) if date < earliest => (
            ReconstructionAccuracy::PrecedesPaymentHistory,
            Some(Warning::LiabilityPrecedesPaymentHistory {
                liability: liability.id,
                date,
                earliest_payment: earliest,
            }),
        ),
        Some(_) => (ReconstructionAccuracy::Exact, None),
    };

    if let Some(w) = &warning {
        warn!("{}", w);
    }

    LiabilityBalance {
        date,
        balance,
        accuracy,
        before_origination: date < liability.start_date,
        warnings: warning.into_iter().collect(),
    }
}

/// Balance of `liability` at the end of `target`
pub fn balance_at(liability: &Liability, payments: &[LiabilityPayment], target: NaiveDate) -> LiabilityBalance {
    let undone: Decimal = payments
        .iter()
        .filter(|p| p.date > target)
        .map(|p| p.principal_paid)
        .sum();
    let earliest = payments.iter().map(|p| p.date).min();
    assess(liability, earliest, target, liability.balance + undone)
}

/// Balance at each of `dates`, ascending, in one backward sweep over the payments
pub fn balance_history(
    liability: &Liability,
    payments: &[LiabilityPayment],
    dates: &[NaiveDate],
) -> Vec<LiabilityBalance> {
    let mut by_date: Vec<&LiabilityPayment> = payments.iter().collect();
    by_date.sort_by_key(|p| std::cmp::Reverse(p.date));
    let earliest = by_date.last().map(|p| p.date);

    let mut targets = dates.to_vec();
    targets.sort_by(|a, b| b.cmp(a));
    targets.dedup();

    let mut cursor = 0;
    let mut balance = liability.balance;
    let mut history = Vec::with_capacity(targets.len());
    for target in targets {
        while cursor < by_date.len() && by_date[cursor].date > target {
            balance += by_date[cursor].principal_paid;
            cursor += 1;
        }
        history.push(assess(liability, earliest, target, balance));
    }

    history.reverse();
    history
}
