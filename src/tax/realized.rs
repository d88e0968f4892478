use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::analysis::{GainBuckets, TaxRates};
use super::cost_basis::SaleCostBasis;

/// Realized gains for one calendar year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealizedGainsReport {
    pub year: i32,
    pub sale_count: usize,
    pub total_proceeds: Decimal,
    pub total_cost_basis: Decimal,
    #[serde(flatten)]
    pub buckets: GainBuckets,
    pub net_realized: Decimal,
    pub estimated_tax: Decimal,
}

impl RealizedGainsReport {
    fn empty(year: i32) -> Self {
        Self {
            year,
            sale_count: 0,
            total_proceeds: Decimal::ZERO,
            total_cost_basis: Decimal::ZERO,
            buckets: GainBuckets::default(),
            net_realized: Decimal::ZERO,
            estimated_tax: Decimal::ZERO,
        }
    }

    fn add_sale(&mut self, sale: &SaleCostBasis) {
        self.sale_count += 1;
        self.total_proceeds += sale.proceeds;
        self.total_cost_basis += sale.cost_basis;
        for matched in &sale.matched_lots {
            self.buckets.add(matched.holding_period, matched.gain);
        }
        self.net_realized = self.buckets.net();
    }
}

/// Aggregate sales into one report per calendar year, ascending
pub fn realized_gains_by_year(sales: &[SaleCostBasis], rates: &TaxRates) -> Vec<RealizedGainsReport> {
    let mut by_year: BTreeMap<i32, RealizedGainsReport> = BTreeMap::new();
    for sale in sales {
        let year = sale.sale_date.year();
        by_year
            .entry(year)
            .or_insert_with(|| RealizedGainsReport::empty(year))
            .add_sale(sale);
    }

    by_year
        .into_values()
        .map(|mut report| {
            report.estimated_tax = report.buckets.estimated_tax(rates);
            report
        })
        .collect()
}

/// Report for a single year; empty when nothing was sold
pub fn realized_gains_for_year(sales: &[SaleCostBasis], year: i32, rates: &TaxRates) -> RealizedGainsReport {
    realized_gains_by_year(sales, rates)
        .into_iter()
        .find(|r| r.year == year)
        .unwrap_or_else(|| RealizedGainsReport::empty(year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AssetId, PortfolioId, Transaction, TransactionKind};
    use crate::tax::cost_basis::LotBook;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trade(id: i64, kind: TransactionKind, on: NaiveDate, qty: Decimal, price: Decimal, fees: Decimal) -> Transaction {
        Transaction::new(id, PortfolioId::new("main"), kind, on)
            .with_asset(AssetId::new("ACME"))
            .with_trade(qty, price, fees)
    }

    fn sales() -> Vec<SaleCostBasis> {
        let txs = vec![
            trade(1, TransactionKind::Buy, date(2022, 1, 3), dec!(10), dec!(50), dec!(0)),
            trade(2, TransactionKind::Buy, date(2023, 9, 1), dec!(10), dec!(80), dec!(0)),
            trade(3, TransactionKind::Sell, date(2023, 3, 1), dec!(5), dec!(40), dec!(0)),
            trade(4, TransactionKind::Sell, date(2024, 2, 1), dec!(10), dec!(90), dec!(10)),
        ];
        LotBook::from_transactions(&txs, None).unwrap().sales
    }

    #[test]
    fn test_reports_split_by_year_and_period() {
        let reports = realized_gains_by_year(&sales(), &TaxRates::default());
        assert_eq!(reports.len(), 2);

        // 2023: 5 shares of the 2022 lot at a loss of 10 each, long-term
        assert_eq!(reports[0].year, 2023);
        assert_eq!(reports[0].buckets.long_term_losses, dec!(50));
        assert_eq!(reports[0].estimated_tax, dec!(0));

        // 2024: 5 remaining long-term shares (+200) and 5 short-term shares (+50), minus 10 fees
        let r = &reports[1];
        assert_eq!(r.year, 2024);
        assert_eq!(r.sale_count, 1);
        assert_eq!(r.total_proceeds, dec!(890));
        assert_eq!(r.total_cost_basis, dec!(650));
        assert_eq!(r.buckets.long_term_gains, dec!(195));
        assert_eq!(r.buckets.short_term_gains, dec!(45));
        assert_eq!(r.net_realized, dec!(240));
    }

    #[test]
    fn test_year_without_sales_is_empty() {
        let report = realized_gains_for_year(&sales(), 2021, &TaxRates::default());
        assert_eq!(report.sale_count, 0);
        assert_eq!(report.net_realized, Decimal::ZERO);
    }
}
