use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::valuation::ValuePoint;
use crate::utils::dates::{days_between, inclusive_days, year_bounds};

/// Days in a full comparison year; shorter windows are partial
pub const DAYS_PER_YEAR: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSettings {
    /// Annual risk-free rate as a fraction (0.04 = 4%)
    pub risk_free_rate: f64,
    pub trading_days_per_year: f64,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            trading_days_per_year: 252.0,
        }
    }
}

/// Flow-adjusted return of one step of the value series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub value_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueExtreme {
    pub date: NaiveDate,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: Decimal,
    pub end_value: Decimal,
    pub net_external_flows: Decimal,
    /// Time-weighted, as a fraction
    pub total_return: f64,
    pub annualized_return: f64,
    pub high: ValueExtreme,
    pub low: ValueExtreme,
    pub best_day: Option<DailyReturn>,
    pub worst_day: Option<DailyReturn>,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearOverYearMetric {
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: Decimal,
    pub end_value: Decimal,
    pub simple_return: f64,
    pub annualized_return: f64,
    pub days: i64,
    /// Window shorter than a year; the annualized figure is for comparison only
    pub is_partial: bool,
    pub is_current_year: bool,
}

fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    (numerator / denominator).to_f64().unwrap_or(0.0)
}

/// r_i = (V_i - F_i) / V_(i-1) - 1, skipping steps whose previous value is not positive
pub fn daily_returns(points: &[ValuePoint]) -> Vec<DailyReturn> {
    points
        .iter()
        .tuple_windows()
        .filter(|(prev, _)| prev.total_value > Decimal::ZERO)
        .map(|(prev, cur)| DailyReturn {
            date: cur.date,
            value_return: ratio(cur.total_value - cur.external_flow, prev.total_value) - 1.0,
        })
        .collect()
}

/// Chain sub-period returns: (1 + r1)(1 + r2)...(1 + rn) - 1
///
/// Example:
/// - Start: 100k, contribution of 50k on day 10, end: 165k, value before the flow 110k
/// - Period 1: 110k / 100k - 1 = 10%
/// - Period 2: (165k - 50k) / 110k - 1 = 4.54%
/// - TWR: 1.10 x 1.0454 - 1 = 15.00%
pub fn calculate_time_weighted_return(returns: &[DailyReturn]) -> f64 {
    returns
        .iter()
        .fold(1.0, |factor, r| factor * (1.0 + r.value_return))
        - 1.0
}

/// Annualize a return observed over `days` calendar days: (1 + r)^(365 / days) - 1
pub fn cagr(total_return: f64, days: i64) -> f64 {
    if days <= 0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(DAYS_PER_YEAR as f64 / days as f64) - 1.0
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Annualized volatility of the non-zero daily returns
pub fn volatility(returns: &[DailyReturn], trading_days_per_year: f64) -> f64 {
    let active: Vec<f64> = returns
        .iter()
        .map(|r| r.value_return)
        .filter(|r| *r != 0.0)
        .collect();
    std_dev(&active) * trading_days_per_year.sqrt()
}

/// (annualized return - risk-free rate) / volatility; zero without volatility
pub fn sharpe_ratio(annualized_return: f64, volatility: f64, risk_free_rate: f64) -> f64 {
    if volatility < 1e-15 {
        return 0.0;
    }
    (annualized_return - risk_free_rate) / volatility
}

/// Summary statistics over a value series; None when it is empty
pub fn summarize(points: &[ValuePoint], settings: &PerformanceSettings) -> Option<PerformanceSummary> {
    let first = points.first()?;
    let last = points.last()?;

    let high = points
        .iter()
        .max_by(|a, b| a.total_value.cmp(&b.total_value).then(b.date.cmp(&a.date)))?;
    let low = points
        .iter()
        .min_by(|a, b| a.total_value.cmp(&b.total_value).then(a.date.cmp(&b.date)))?;

    let returns = daily_returns(points);
    let best_day = returns
        .iter()
        .copied()
        .max_by(|a, b| a.value_return.total_cmp(&b.value_return));
    let worst_day = returns
        .iter()
        .copied()
        .min_by(|a, b| a.value_return.total_cmp(&b.value_return));

    let total_return = calculate_time_weighted_return(&returns);
    let days = inclusive_days(first.date, last.date);
    let annualized_return = cagr(total_return, days);
    let volatility = volatility(&returns, settings.trading_days_per_year);
    let sharpe = sharpe_ratio(annualized_return, volatility, settings.risk_free_rate);

    debug!(
        "Performance {}..{}: twr={:.6} vol={:.6} sharpe={:.4}",
        first.date, last.date, total_return, volatility, sharpe
    );

    Some(PerformanceSummary {
        start_date: first.date,
        end_date: last.date,
        start_value: first.total_value,
        end_value: last.total_value,
        net_external_flows: points.iter().skip(1).map(|p| p.external_flow).sum(),
        total_return,
        annualized_return,
        high: ValueExtreme {
            date: high.date,
            value: high.total_value,
        },
        low: ValueExtreme {
            date: low.date,
            value: low.total_value,
        },
        best_day,
        worst_day,
        volatility,
        sharpe_ratio: sharpe,
        days,
    })
}

/// Point nearest to `date`; equidistant points resolve to the earlier one
fn nearest_point(points: &[ValuePoint], date: NaiveDate) -> Option<&ValuePoint> {
    points
        .iter()
        .min_by_key(|p| (days_between(date, p.date).abs(), p.date))
}

/// One row per calendar year from inception through `now`.
///
/// Each window is clamped to [inception, now]; the first and current years
/// are usually partial.
pub fn year_over_year(points: &[ValuePoint], inception: NaiveDate, now: NaiveDate) -> Vec<YearOverYearMetric> {
    if points.is_empty() || inception > now {
        return Vec::new();
    }

    (inception.year()..=now.year())
        .filter_map(|year| {
            let (year_start, year_end) = year_bounds(year)?;
            let start_date = year_start.max(inception);
            let end_date = year_end.min(now);

            let start = nearest_point(points, start_date)?;
            let end = nearest_point(points, end_date)?;
            let simple_return = if start.total_value > Decimal::ZERO {
                ratio(end.total_value - start.total_value, start.total_value)
            } else {
                0.0
            };
            let days = inclusive_days(start_date, end_date);

            Some(YearOverYearMetric {
                year,
                start_date,
                end_date,
                start_value: start.total_value,
                end_value: end.total_value,
                simple_return,
                annualized_return: cagr(simple_return, days),
                days,
                is_partial: days < DAYS_PER_YEAR,
                is_current_year: year == now.year(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn point(on: NaiveDate, total: Decimal, flow: Decimal) -> ValuePoint {
        ValuePoint {
            date: on,
            cash: Decimal::ZERO,
            holdings_value: total,
            total_value: total,
            external_flow: flow,
            has_interpolated_price: false,
        }
    }

    #[test]
    fn test_twr_neutralizes_contributions() {
        let points = vec![
            point(date(2024, 1, 1), dec!(100000), dec!(100000)),
            point(date(2024, 1, 10), dec!(160000), dec!(50000)),
            point(date(2024, 1, 31), dec!(165000), dec!(0)),
        ];
        let returns = daily_returns(&points);
        assert_eq!(returns.len(), 2);
        assert!((returns[0].value_return - 0.10).abs() < 1e-12);

        let twr = calculate_time_weighted_return(&returns);
        let expected = 1.10 * (165000.0 / 160000.0) - 1.0;
        assert!((twr - expected).abs() < 1e-12);
    }

    #[test]
    fn test_returns_skip_non_positive_start() {
        let points = vec![
            point(date(2024, 1, 1), dec!(0), dec!(0)),
            point(date(2024, 1, 2), dec!(100), dec!(100)),
            point(date(2024, 1, 3), dec!(110), dec!(0)),
        ];
        let returns = daily_returns(&points);
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].date, date(2024, 1, 3));
    }

    #[test]
    fn test_cagr_annualizes_by_days() {
        assert!((cagr(0.21, 730) - 0.1).abs() < 1e-3);
        assert!((cagr(0.10, 365) - 0.10).abs() < 1e-12);
        assert_eq!(cagr(0.5, 0), 0.0);
        assert_eq!(cagr(-1.5, 100), -1.0);
    }

    #[test]
    fn test_volatility_and_sharpe() {
        let returns: Vec<DailyReturn> = [0.01, 0.0, -0.01, 0.02]
            .iter()
            .enumerate()
            .map(|(i, r)| DailyReturn {
                date: date(2024, 1, 2 + i as u32),
                value_return: *r,
            })
            .collect();
        // zero day ignored: sample sd of [0.01, -0.01, 0.02]
        let active = [0.01, -0.01, 0.02];
        let expected = std_dev(&active) * 252f64.sqrt();
        let vol = volatility(&returns, 252.0);
        assert!((vol - expected).abs() < 1e-12);

        assert!((sharpe_ratio(0.12, 0.2, 0.02) - 0.5).abs() < 1e-12);
        assert_eq!(sharpe_ratio(0.12, 0.0, 0.02), 0.0);
    }

    #[test]
    fn test_summary_extremes() {
        let points = vec![
            point(date(2024, 1, 1), dec!(100), dec!(0)),
            point(date(2024, 1, 2), dec!(120), dec!(0)),
            point(date(2024, 1, 3), dec!(90), dec!(0)),
            point(date(2024, 1, 4), dec!(99), dec!(0)),
        ];
        let summary = summarize(&points, &PerformanceSettings::default()).unwrap();
        assert_eq!(summary.high.date, date(2024, 1, 2));
        assert_eq!(summary.low.value, dec!(90));
        assert_eq!(summary.best_day.unwrap().date, date(2024, 1, 2));
        assert_eq!(summary.worst_day.unwrap().date, date(2024, 1, 3));
        assert!((summary.total_return - (-0.01)).abs() < 1e-12);
        assert_eq!(summary.days, 4);
        assert!(summarize(&[], &PerformanceSettings::default()).is_none());
    }

    #[test]
    fn test_year_over_year_rows() {
        let inception = date(2022, 3, 15);
        let now = date(2024, 6, 30);
        let points = vec![
            point(inception, dec!(1000), dec!(1000)),
            point(date(2022, 12, 31), dec!(1100), dec!(0)),
            point(date(2023, 12, 29), dec!(1210), dec!(0)),
            point(now, dec!(1331), dec!(0)),
        ];
        let rows = year_over_year(&points, inception, now);
        assert_eq!(rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2022, 2023, 2024]);

        assert!(rows[0].is_partial);
        assert_eq!(rows[0].start_date, inception);
        assert!((rows[0].simple_return - 0.10).abs() < 1e-12);

        // 2023 starts at the point nearest Jan 1 (2022-12-31)
        assert!(!rows[1].is_partial);
        assert_eq!(rows[1].days, 365);
        assert_eq!(rows[1].start_value, dec!(1100));
        assert_eq!(rows[1].end_value, dec!(1210));
        assert!((rows[1].annualized_return - 0.10).abs() < 1e-12);

        assert!(rows[2].is_partial);
        assert!(rows[2].is_current_year);
        assert!(!rows[1].is_current_year);
        assert_eq!(rows[2].end_date, now);
    }
}
