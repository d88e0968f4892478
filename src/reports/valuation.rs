//! Portfolio value over time.
//!
//! The feed is replayed once with a single cursor while the requested dates
//! are stepped in order; at each date cash comes from the cash classifier and
//! positions are marked with the nearest price.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::db::models::{AssetId, Transaction, TransactionKind};
use crate::error::{LedgerError, Warning};
use crate::ledger::cash::classify_warning;
use crate::ledger::{cash_impact, sort_chronologically};
use crate::pricing::{price_at, PriceCache, PriceSettings, PriceSource};
use crate::tax::cost_basis::LotBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Value crossing the portfolio boundary
    External,
    Internal,
}

/// Classify a transaction for time-weighted return purposes
pub fn classify_flow(kind: &TransactionKind) -> FlowType {
    match kind {
        TransactionKind::Deposit
        | TransactionKind::Withdrawal
        | TransactionKind::LiabilityPayment
        | TransactionKind::TransferIn
        | TransactionKind::TransferOut
        | TransactionKind::RsuVest { .. } => FlowType::External,
        _ => FlowType::Internal,
    }
}

/// Signed external flow carried by a transaction; zero for internal ones.
///
/// Cash flows carry their amount, share transfers and vests carry their market value.
pub fn external_flow(tx: &Transaction) -> Decimal {
    if classify_flow(&tx.kind) == FlowType::Internal {
        return Decimal::ZERO;
    }
    match &tx.kind {
        TransactionKind::TransferIn => tx.quantity * tx.price,
        TransactionKind::TransferOut => -(tx.quantity * tx.price),
        TransactionKind::RsuVest { shares_withheld, .. } => (tx.quantity - *shares_withheld) * tx.price,
        _ => cash_impact(tx),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub holdings_value: Decimal,
    pub total_value: Decimal,
    /// Net external flow since the previous point, inclusive of this date
    pub external_flow: Decimal,
    pub has_interpolated_price: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueSeries {
    pub points: Vec<ValuePoint>,
    pub warnings: Vec<Warning>,
}

/// Value the portfolio at each of `dates` (returned ascending).
pub fn value_series<S: PriceSource + ?Sized>(
    transactions: &[Transaction],
    source: &S,
    dates: &[NaiveDate],
    initial_cash: Decimal,
    settings: &PriceSettings,
) -> Result<ValueSeries, LedgerError> {
    let sorted = sort_chronologically(transactions);
    let targets: BTreeSet<NaiveDate> = dates.iter().copied().collect();

    let mut cache = PriceCache::new();
    let mut book = LotBook::new();
    let mut cursor = 0;
    let mut cash = initial_cash;
    let mut warnings = Vec::new();
    let mut unpriced: BTreeSet<AssetId> = BTreeSet::new();
    let mut points = Vec::with_capacity(targets.len());

    for target in targets {
        let mut flow = Decimal::ZERO;
        while cursor < sorted.len() && sorted[cursor].date <= target {
            let tx = sorted[cursor];
            if let Some(warning) = classify_warning(tx) {
                warnings.push(warning);
            }
            cash += cash_impact(tx);
            flow += external_flow(tx);
            book.apply(tx)?;
            cursor += 1;
        }

        let mut holdings_value = Decimal::ZERO;
        let mut has_interpolated_price = false;
        let held: Vec<AssetId> = book.assets().cloned().collect();
        for asset in held {
            let quantity = book.quantity(&asset);
            if quantity <= Decimal::ZERO {
                continue;
            }
            let lookup = price_at(source, &mut cache, &asset, target, settings);
            if lookup.is_missing() && unpriced.insert(asset.clone()) {
                warn!("No price for {} near {}; valued at zero", asset, target);
                warnings.push(Warning::MissingPrice {
                    asset: asset.clone(),
                    date: target,
                });
            }
            has_interpolated_price |= lookup.is_interpolated;
            holdings_value += quantity * lookup.price;
        }

        points.push(ValuePoint {
            date: target,
            cash,
            holdings_value,
            total_value: cash + holdings_value,
            external_flow: flow,
            has_interpolated_price,
        });
    }

    book.warnings.append(&mut warnings);
    debug!("Valued {} dates, {} cached prices", points.len(), cache.len());

    Ok(ValueSeries {
        points,
        warnings: book.warnings,
    })
}

/// Every day from `from` to `to`, inclusive
pub fn daily_dates(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PortfolioId, PricePoint};
    use crate::pricing::PriceBook;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(id: i64, kind: TransactionKind, on: NaiveDate) -> Transaction {
        Transaction::new(id, PortfolioId::new("main"), kind, on)
    }

    fn prices() -> PriceBook {
        PriceBook::from_points(
            [(1, dec!(100)), (2, dec!(110)), (3, dec!(99)), (4, dec!(120))].map(|(day, price)| PricePoint {
                asset_id: AssetId::new("ACME"),
                date: date(2024, 1, day),
                price,
            }),
        )
    }

    #[test]
    fn test_flow_classification() {
        let on = date(2024, 1, 1);
        let deposit = tx(1, TransactionKind::Deposit, on).with_amount(dec!(500));
        let withdrawal = tx(2, TransactionKind::Withdrawal, on).with_amount(dec!(200));
        let transfer = tx(3, TransactionKind::TransferIn, on).with_trade(dec!(2), dec!(50), dec!(0));
        let vest = tx(
            4,
            TransactionKind::RsuVest {
                grant_date: None,
                vesting_date: on,
                shares_withheld: dec!(1),
            },
            on,
        )
        .with_trade(dec!(3), dec!(10), dec!(0));
        let buy = tx(5, TransactionKind::Buy, on).with_trade(dec!(1), dec!(10), dec!(0));
        let dividend = tx(6, TransactionKind::Dividend, on).with_amount(dec!(5));

        assert_eq!(external_flow(&deposit), dec!(500));
        assert_eq!(external_flow(&withdrawal), dec!(-200));
        assert_eq!(external_flow(&transfer), dec!(100));
        assert_eq!(external_flow(&vest), dec!(20));
        assert_eq!(external_flow(&buy), Decimal::ZERO);
        assert_eq!(external_flow(&dividend), Decimal::ZERO);
        assert_eq!(classify_flow(&TransactionKind::Fee), FlowType::Internal);
    }

    #[test]
    fn test_value_series_marks_positions() {
        let txs = vec![
            tx(1, TransactionKind::Deposit, date(2024, 1, 1)).with_amount(dec!(1000)),
            tx(2, TransactionKind::Buy, date(2024, 1, 1))
                .with_asset(AssetId::new("ACME"))
                .with_trade(dec!(5), dec!(100), dec!(0)),
            tx(3, TransactionKind::Deposit, date(2024, 1, 3)).with_amount(dec!(100)),
        ];
        let series = value_series(
            &txs,
            &prices(),
            &daily_dates(date(2024, 1, 1), date(2024, 1, 4)),
            Decimal::ZERO,
            &PriceSettings::default(),
        )
        .unwrap();

        let totals: Vec<Decimal> = series.points.iter().map(|p| p.total_value).collect();
        assert_eq!(totals, vec![dec!(1000), dec!(1050), dec!(1095), dec!(1200)]);
        assert_eq!(series.points[0].external_flow, dec!(1000));
        assert_eq!(series.points[1].external_flow, Decimal::ZERO);
        assert_eq!(series.points[2].external_flow, dec!(100));
        assert_eq!(series.points[2].cash, dec!(600));
        assert!(series.warnings.is_empty());
    }

    #[test]
    fn test_unpriced_asset_warns_once() {
        let txs = vec![tx(1, TransactionKind::Buy, date(2024, 1, 1))
            .with_asset(AssetId::new("NOPE"))
            .with_trade(dec!(1), dec!(10), dec!(0))];
        let series = value_series(
            &txs,
            &prices(),
            &daily_dates(date(2024, 1, 1), date(2024, 1, 3)),
            dec!(10),
            &PriceSettings::default(),
        )
        .unwrap();
        assert_eq!(series.warnings.len(), 1);
        assert!(series.points.iter().all(|p| p.has_interpolated_price));
        assert_eq!(series.points[0].total_value, Decimal::ZERO);
    }
}
