//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use lotbook::db::Transaction;
use lotbook::error::Warning;
use lotbook::liability::LiabilityBalance;
use lotbook::reports::{PerformanceSummary, PortfolioReport, YearOverYearMetric};
use lotbook::tax::{DispositionCheck, RealizedGainsReport, TaxAnalysis, TaxLot};
use lotbook::utils::{format_currency, format_pct, format_quantity};

/// Pretty JSON for any serializable result
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn signed_currency(value: Decimal) -> String {
    let text = format_currency(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn signed_pct(value: f64) -> String {
    let text = format_pct(value);
    if value >= 0.0 {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn optional_currency(value: Option<Decimal>) -> String {
    value.map(format_currency).unwrap_or_else(|| "N/A".to_string())
}

/// Warnings block, empty when there are none
pub fn format_warnings(warnings: &[Warning]) -> String {
    let mut output = String::new();
    for warning in warnings {
        output.push_str(&format!("{} {}\n", "⚠".yellow().bold(), warning));
    }
    output
}

pub fn format_transactions_table(transactions: &[Transaction]) -> String {
    #[derive(Tabled)]
    struct TransactionRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Asset")]
        asset: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Fees")]
        fees: String,
        #[tabled(rename = "Total")]
        total: String,
    }

    let rows: Vec<TransactionRow> = transactions
        .iter()
        .map(|tx| TransactionRow {
            id: tx.id.to_string(),
            date: tx.date.to_string(),
            kind: tx.kind.to_string(),
            asset: tx.asset_id.as_ref().map(|a| a.to_string()).unwrap_or_default(),
            quantity: format_quantity(tx.quantity),
            price: format_currency(tx.price),
            fees: format_currency(tx.fees),
            total: format_currency(tx.total_amount),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..), Alignment::right());
    table.to_string()
}

pub fn format_lots_table(lots: &[&TaxLot]) -> String {
    #[derive(Tabled)]
    struct LotRow {
        #[tabled(rename = "Lot")]
        id: String,
        #[tabled(rename = "Asset")]
        asset: String,
        #[tabled(rename = "Type")]
        lot_type: String,
        #[tabled(rename = "Purchased")]
        purchase_date: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Sold")]
        sold: String,
        #[tabled(rename = "Remaining")]
        remaining: String,
        #[tabled(rename = "Unit Cost")]
        unit_cost: String,
    }

    let rows: Vec<LotRow> = lots
        .iter()
        .map(|lot| LotRow {
            id: lot.id.to_string(),
            asset: lot.asset_id.to_string(),
            lot_type: lot.lot_type.as_str().to_string(),
            purchase_date: lot.purchase_date.to_string(),
            quantity: format_quantity(lot.quantity),
            sold: format_quantity(lot.sold_quantity),
            remaining: format_quantity(lot.remaining_quantity),
            unit_cost: format_currency(lot.purchase_price),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..), Alignment::right());
    table.to_string()
}

/// Format holdings for terminal table output
pub fn format_holdings_table(report: &PortfolioReport) -> String {
    let mut output = String::new();

    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "Asset")]
        asset: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Avg Cost")]
        avg_cost: String,
        #[tabled(rename = "Cost Basis")]
        cost_basis: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Unrealized")]
        unrealized: String,
    }

    let rows: Vec<HoldingRow> = report
        .holdings
        .iter()
        .map(|h| {
            let price = match h.current_price {
                Some(p) if h.price_is_interpolated => format!("{}*", format_currency(p)),
                other => optional_currency(other),
            };
            HoldingRow {
                asset: h.asset_id.to_string(),
                quantity: format_quantity(h.quantity),
                avg_cost: format_currency(h.average_cost),
                cost_basis: format_currency(h.cost_basis),
                price,
                value: optional_currency(h.current_value),
                unrealized: h
                    .unrealized_gain
                    .map(signed_currency)
                    .unwrap_or_else(|| "N/A".to_string()),
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    output.push_str(&format!("\n\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!("\n{:<20} {}", "Total Cost:".bold(), format_currency(report.total_cost)));
    output.push_str(&format!("\n{:<20} {}", "Total Value:".bold(), format_currency(report.total_value)));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Unrealized:".bold(),
        signed_currency(report.total_unrealized_gain)
    ));
    if report.holdings.iter().any(|h| h.price_is_interpolated && h.current_price.is_some()) {
        output.push_str(&format!("{}\n", "* stale price (more than the staleness threshold away)".bright_black()));
    }
    output.push_str(&format_warnings(&report.warnings));
    output
}

pub fn format_tax_analysis(analysis: &TaxAnalysis) -> String {
    let mut output = format!("\n{} Tax analysis as of {}\n\n", "📊".cyan().bold(), analysis.as_of);

    #[derive(Tabled)]
    struct LotAnalysisRow {
        #[tabled(rename = "Lot")]
        lot: String,
        #[tabled(rename = "Asset")]
        asset: String,
        #[tabled(rename = "Type")]
        lot_type: String,
        #[tabled(rename = "Days")]
        days: String,
        #[tabled(rename = "Term")]
        term: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Cost Basis")]
        cost: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Gain")]
        gain: String,
        #[tabled(rename = "Disposition")]
        disposition: String,
    }

    let rows: Vec<LotAnalysisRow> = analysis
        .lots
        .iter()
        .map(|l| LotAnalysisRow {
            lot: l.lot_id.to_string(),
            asset: l.asset_id.to_string(),
            lot_type: l.lot_type.as_str().to_string(),
            days: l.days_held.to_string(),
            term: l.holding_period.as_str().to_string(),
            quantity: format_quantity(l.quantity),
            cost: format_currency(l.cost_basis),
            value: format_currency(l.current_value),
            gain: signed_currency(l.unrealized_gain),
            disposition: l
                .disposition
                .as_ref()
                .map(|d| d.reason.as_str().to_string())
                .unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..9), Alignment::right());
    output.push_str(&table.to_string());

    let b = &analysis.buckets;
    output.push_str(&format!("\n\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!("\n{:<24} {}", "Short-term gains:".bold(), format_currency(b.short_term_gains)));
    output.push_str(&format!("\n{:<24} {}", "Short-term losses:".bold(), format_currency(b.short_term_losses)));
    output.push_str(&format!("\n{:<24} {}", "Long-term gains:".bold(), format_currency(b.long_term_gains)));
    output.push_str(&format!("\n{:<24} {}", "Long-term losses:".bold(), format_currency(b.long_term_losses)));
    output.push_str(&format!(
        "\n{:<24} {} (short {} / long {})\n",
        "Estimated tax:".bold(),
        format_currency(analysis.estimated_tax).yellow(),
        analysis.rates.short_term,
        analysis.rates.long_term
    ));
    output.push_str(&format_warnings(&analysis.warnings));
    output
}

pub fn format_disposition(check: &DispositionCheck) -> String {
    let mark = |met: bool| if met { "✓".green() } else { "✗".red() };
    let verdict = if check.is_qualifying {
        "QUALIFYING".green().bold()
    } else {
        "DISQUALIFYING".red().bold()
    };

    let mut output = String::new();
    output.push_str(&format!("\n{} {}\n\n", verdict, check.reason.as_str().bright_black()));
    output.push_str(&format!(
        "{} 2 years from grant    ({}, sell must be after)\n",
        mark(check.meets_grant_requirement),
        check.two_years_from_grant
    ));
    output.push_str(&format!(
        "{} 1 year from purchase  ({}, sell must be after)\n",
        mark(check.meets_purchase_requirement),
        check.one_year_from_purchase
    ));
    output.push_str(&format!("\n{}\n", check.tax_implication));
    output
}

pub fn format_realized_table(reports: &[RealizedGainsReport]) -> String {
    #[derive(Tabled)]
    struct RealizedRow {
        #[tabled(rename = "Year")]
        year: i32,
        #[tabled(rename = "Sales")]
        sales: usize,
        #[tabled(rename = "Proceeds")]
        proceeds: String,
        #[tabled(rename = "Cost Basis")]
        cost: String,
        #[tabled(rename = "Short Net")]
        short_net: String,
        #[tabled(rename = "Long Net")]
        long_net: String,
        #[tabled(rename = "Net")]
        net: String,
        #[tabled(rename = "Est. Tax")]
        tax: String,
    }

    let rows: Vec<RealizedRow> = reports
        .iter()
        .map(|r| RealizedRow {
            year: r.year,
            sales: r.sale_count,
            proceeds: format_currency(r.total_proceeds),
            cost: format_currency(r.total_cost_basis),
            short_net: signed_currency(r.buckets.net_short_term()),
            long_net: signed_currency(r.buckets.net_long_term()),
            net: signed_currency(r.net_realized),
            tax: format_currency(r.estimated_tax),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

pub fn format_liability_history(name: &str, history: &[LiabilityBalance]) -> String {
    #[derive(Tabled)]
    struct BalanceRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Balance")]
        balance: String,
        #[tabled(rename = "Accuracy")]
        accuracy: String,
    }

    let rows: Vec<BalanceRow> = history
        .iter()
        .map(|point| {
            let mut accuracy = if point.is_exact() {
                point.accuracy.as_str().green().to_string()
            } else {
                point.accuracy.as_str().yellow().to_string()
            };
            if point.before_origination {
                accuracy.push_str(" (before origination)");
            }
            BalanceRow {
                date: point.date.to_string(),
                balance: format_currency(point.balance),
                accuracy,
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..2), Alignment::right());

    let mut output = format!("\n{} {}\n\n", "🏦".cyan().bold(), name.bold());
    output.push_str(&table.to_string());
    output.push('\n');
    if history.iter().any(|p| !p.is_exact()) {
        output.push_str(&format!(
            "{} Balances before the first recorded payment are partial reconstructions.\n",
            "⚠".yellow().bold()
        ));
    }
    output
}

pub fn format_performance_summary(summary: &PerformanceSummary) -> String {
    let mut output = format!(
        "\n{} Performance {} → {} ({} days)\n",
        "📈".cyan().bold(),
        summary.start_date,
        summary.end_date,
        summary.days
    );
    output.push_str(&format!("{}\n", "━".repeat(60).bright_black()));

    let lines = [
        ("Start value:", format_currency(summary.start_value)),
        ("End value:", format_currency(summary.end_value)),
        ("Net external flows:", format_currency(summary.net_external_flows)),
        ("Time-weighted return:", signed_pct(summary.total_return)),
        ("Annualized return:", signed_pct(summary.annualized_return)),
        (
            "High:",
            format!("{} on {}", format_currency(summary.high.value), summary.high.date),
        ),
        (
            "Low:",
            format!("{} on {}", format_currency(summary.low.value), summary.low.date),
        ),
        (
            "Best day:",
            summary
                .best_day
                .map(|d| format!("{} on {}", signed_pct(d.value_return), d.date))
                .unwrap_or_else(|| "N/A".to_string()),
        ),
        (
            "Worst day:",
            summary
                .worst_day
                .map(|d| format!("{} on {}", signed_pct(d.value_return), d.date))
                .unwrap_or_else(|| "N/A".to_string()),
        ),
        ("Volatility:", format_pct(summary.volatility)),
        ("Sharpe ratio:", format!("{:.2}", summary.sharpe_ratio)),
    ];
    for (label, value) in lines {
        output.push_str(&format!("{:<24} {}\n", label.bold(), value));
    }
    output
}

pub fn format_year_over_year(rows: &[YearOverYearMetric]) -> String {
    #[derive(Tabled)]
    struct YoyRow {
        #[tabled(rename = "Year")]
        year: String,
        #[tabled(rename = "From")]
        from: String,
        #[tabled(rename = "To")]
        to: String,
        #[tabled(rename = "Start")]
        start: String,
        #[tabled(rename = "End")]
        end: String,
        #[tabled(rename = "Return")]
        simple: String,
        #[tabled(rename = "Annualized")]
        annualized: String,
    }

    let table_rows: Vec<YoyRow> = rows
        .iter()
        .map(|r| {
            let mut year = r.year.to_string();
            if r.is_partial {
                year.push_str(" (partial)");
            }
            YoyRow {
                year,
                from: r.start_date.to_string(),
                to: r.end_date.to_string(),
                start: format_currency(r.start_value),
                end: format_currency(r.end_value),
                simple: signed_pct(r.simple_return),
                annualized: signed_pct(r.annualized_return),
            }
        })
        .collect();

    let mut table = Table::new(&table_rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..), Alignment::right());
    table.to_string()
}

/// Format empty feed message
pub fn format_empty_feed() -> String {
    format!(
        "{} No transactions found\nAdd some first using: {} tx add <kind> <date>\n",
        "ℹ".blue().bold(),
        "lotbook".bold()
    )
}
