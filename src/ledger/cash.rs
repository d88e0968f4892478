use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::db::models::{Transaction, TransactionKind};
use crate::error::Warning;

/// Signed cash effect of a single transaction.
///
/// Trades settle `quantity x price` net of fees; pure cash events carry their
/// amount in `price`. Non-cash events and unrecognized kinds contribute zero.
pub fn cash_impact(tx: &Transaction) -> Decimal {
    match &tx.kind {
        TransactionKind::Buy | TransactionKind::EsppPurchase { .. } => {
            -(tx.quantity * tx.price + tx.fees)
        }
        TransactionKind::Sell => tx.quantity * tx.price - tx.fees,
        TransactionKind::Dividend | TransactionKind::Interest | TransactionKind::Deposit => tx.price,
        TransactionKind::Fee
        | TransactionKind::Tax
        | TransactionKind::Withdrawal
        | TransactionKind::LiabilityPayment => -tx.price,
        TransactionKind::RsuVest { .. }
        | TransactionKind::Reinvestment
        | TransactionKind::TransferIn
        | TransactionKind::TransferOut
        | TransactionKind::Split { .. }
        | TransactionKind::Spinoff
        | TransactionKind::Merger
        | TransactionKind::Unrecognized { .. } => Decimal::ZERO,
    }
}

/// Whether the kind moves cash at all
pub fn is_cash_affecting(kind: &TransactionKind) -> bool {
    matches!(
        kind,
        TransactionKind::Buy
            | TransactionKind::EsppPurchase { .. }
            | TransactionKind::Sell
            | TransactionKind::Dividend
            | TransactionKind::Interest
            | TransactionKind::Deposit
            | TransactionKind::Fee
            | TransactionKind::Tax
            | TransactionKind::Withdrawal
            | TransactionKind::LiabilityPayment
    )
}

/// Warning for a transaction the classifier cannot account for
pub fn classify_warning(tx: &Transaction) -> Option<Warning> {
    match &tx.kind {
        TransactionKind::Unrecognized { label } => {
            warn!("Transaction {} has unrecognized kind '{}'", tx.id, label);
            Some(Warning::UnrecognizedKind {
                transaction: tx.id,
                label: label.clone(),
            })
        }
        _ => None,
    }
}

/// Feed sorted by date; same-day entries keep their input (insertion) order.
pub fn sort_chronologically(transactions: &[Transaction]) -> Vec<&Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|tx| tx.date);
    sorted
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashBalance {
    pub date: NaiveDate,
    pub balance: Decimal,
    /// Number of transactions on or before `date`
    pub transactions_applied: usize,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashSeries {
    pub points: Vec<BalancePoint>,
    pub warnings: Vec<Warning>,
}

/// Replay the feed up to and including `target` on top of `initial`.
///
/// The result may be negative (overdraft/margin).
pub fn balance_at(transactions: &[Transaction], target: NaiveDate, initial: Decimal) -> CashBalance {
    let mut balance = initial;
    let mut applied = 0;
    let mut warnings = Vec::new();

    for tx in sort_chronologically(transactions)
        .into_iter()
        .take_while(|tx| tx.date <= target)
    {
        applied += 1;
        if let Some(warning) = classify_warning(tx) {
            warnings.push(warning);
        }
        if is_cash_affecting(&tx.kind) {
            balance += cash_impact(tx);
        }
    }

    CashBalance {
        date: target,
        balance,
        transactions_applied: applied,
        warnings,
    }
}

/// Balance at each of `dates` with a single pass over the sorted feed.
///
/// Points are returned in ascending date order.
pub fn balance_series(transactions: &[Transaction], dates: &[NaiveDate], initial: Decimal) -> CashSeries {
    let sorted = sort_chronologically(transactions);
    let mut targets = dates.to_vec();
    targets.sort();

    let mut cursor = 0;
    let mut balance = initial;
    let mut points = Vec::with_capacity(targets.len());
    let mut warnings = Vec::new();

    for target in targets {
        while cursor < sorted.len() && sorted[cursor].date <= target {
            let tx = sorted[cursor];
            if let Some(warning) = classify_warning(tx) {
                warnings.push(warning);
            }
            if is_cash_affecting(&tx.kind) {
                balance += cash_impact(tx);
            }
            cursor += 1;
        }
        points.push(BalancePoint {
            date: target,
            balance,
        });
    }

    CashSeries { points, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AssetId, PortfolioId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(id: i64, kind: TransactionKind, on: NaiveDate) -> Transaction {
        Transaction::new(id, PortfolioId::new("main"), kind, on)
    }

    #[test]
    fn test_trade_impacts_include_fees() {
        let buy = tx(1, TransactionKind::Buy, date(2024, 1, 15))
            .with_asset(AssetId::new("ACME"))
            .with_trade(dec!(10), dec!(100), dec!(5));
        let sell = tx(2, TransactionKind::Sell, date(2024, 2, 15))
            .with_asset(AssetId::new("ACME"))
            .with_trade(dec!(10), dec!(120), dec!(5));
        assert_eq!(cash_impact(&buy), dec!(-1005));
        assert_eq!(cash_impact(&sell), dec!(1195));

        let espp = tx(
            3,
            TransactionKind::EsppPurchase {
                grant_date: date(2023, 6, 1),
                discount_percent: dec!(15),
            },
            date(2024, 1, 1),
        )
        .with_trade(dec!(4), dec!(85), dec!(0));
        assert_eq!(cash_impact(&espp), dec!(-340));
    }

    #[test]
    fn test_pure_cash_events_use_price_field() {
        let on = date(2024, 1, 1);
        assert_eq!(cash_impact(&tx(1, TransactionKind::Dividend, on).with_amount(dec!(12.5))), dec!(12.5));
        assert_eq!(cash_impact(&tx(1, TransactionKind::Interest, on).with_amount(dec!(3))), dec!(3));
        assert_eq!(cash_impact(&tx(1, TransactionKind::Deposit, on).with_amount(dec!(100))), dec!(100));
        assert_eq!(cash_impact(&tx(1, TransactionKind::Fee, on).with_amount(dec!(2))), dec!(-2));
        assert_eq!(cash_impact(&tx(1, TransactionKind::Tax, on).with_amount(dec!(7))), dec!(-7));
        assert_eq!(cash_impact(&tx(1, TransactionKind::Withdrawal, on).with_amount(dec!(50))), dec!(-50));
        assert_eq!(
            cash_impact(&tx(1, TransactionKind::LiabilityPayment, on).with_amount(dec!(1500))),
            dec!(-1500)
        );
    }

    #[test]
    fn test_non_cash_kinds_are_zero() {
        let on = date(2024, 1, 1);
        let kinds = [
            TransactionKind::RsuVest {
                grant_date: None,
                vesting_date: on,
                shares_withheld: dec!(2),
            },
            TransactionKind::Reinvestment,
            TransactionKind::TransferIn,
            TransactionKind::TransferOut,
            TransactionKind::Split { ratio: dec!(2) },
            TransactionKind::Spinoff,
            TransactionKind::Merger,
        ];
        for kind in kinds {
            let t = tx(1, kind, on).with_trade(dec!(10), dec!(50), dec!(1));
            assert_eq!(cash_impact(&t), Decimal::ZERO);
            assert!(!is_cash_affecting(&t.kind));
        }
    }

    #[test]
    fn test_balance_excludes_future_and_tolerates_overdraft() {
        let txs = vec![
            tx(1, TransactionKind::Deposit, date(2024, 1, 1)).with_amount(dec!(100)),
            tx(2, TransactionKind::Withdrawal, date(2024, 1, 2)).with_amount(dec!(250)),
            tx(3, TransactionKind::Deposit, date(2024, 1, 3)).with_amount(dec!(1000)),
        ];
        let result = balance_at(&txs, date(2024, 1, 2), Decimal::ZERO);
        assert_eq!(result.balance, dec!(-150));
        assert_eq!(result.transactions_applied, 2);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unrecognized_kind_contributes_zero_and_warns() {
        let txs = vec![
            tx(1, TransactionKind::Deposit, date(2024, 1, 1)).with_amount(dec!(100)),
            tx(
                2,
                TransactionKind::Unrecognized {
                    label: "airdrop".to_string(),
                },
                date(2024, 1, 2),
            )
            .with_amount(dec!(999)),
        ];
        let result = balance_at(&txs, date(2024, 12, 31), dec!(10));
        assert_eq!(result.balance, dec!(110));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_series_matches_point_queries() {
        let txs = vec![
            tx(1, TransactionKind::Deposit, date(2024, 1, 1)).with_amount(dec!(10000)),
            tx(2, TransactionKind::Buy, date(2024, 1, 15)).with_trade(dec!(10), dec!(100), dec!(5)),
            tx(3, TransactionKind::Sell, date(2024, 2, 15)).with_trade(dec!(10), dec!(120), dec!(5)),
            tx(4, TransactionKind::Dividend, date(2024, 2, 20)).with_amount(dec!(4.25)),
        ];
        let dates = vec![
            date(2024, 3, 1),
            date(2023, 12, 31),
            date(2024, 1, 15),
            date(2024, 2, 16),
        ];
        let series = balance_series(&txs, &dates, Decimal::ZERO);
        assert_eq!(series.points.len(), 4);
        for point in &series.points {
            assert_eq!(point.balance, balance_at(&txs, point.date, Decimal::ZERO).balance);
        }
        assert_eq!(series.points[0].date, date(2023, 12, 31));
        assert_eq!(series.points[3].balance, dec!(10194.25));
    }
}
