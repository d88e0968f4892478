//! Cash balance and lot commands

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use rust_decimal::Decimal;
use tracing::info;

use super::{parse_date, parse_decimal, parse_optional_date, prices, today, Context};
use crate::cli::formatters;
use lotbook::db::{self, AssetId};
use lotbook::ledger::cash::{balance_at, balance_series};
use lotbook::reports::{calculate_holdings, daily_dates};
use lotbook::tax::{LotBook, TaxLot};

/// Parse a range string (YYYY-MM-DD:YYYY-MM-DD)
fn parse_range(range: &str) -> Result<(chrono::NaiveDate, chrono::NaiveDate)> {
    let (from, to) = range
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid range '{}'. Use YYYY-MM-DD:YYYY-MM-DD", range))?;
    let from = parse_date(from)?;
    let to = parse_date(to)?;
    if to < from {
        bail!("Range end {} is before its start {}", to, from);
    }
    Ok((from, to))
}

pub async fn dispatch_balance(date: &str, initial: &str, series: Option<&str>, ctx: &Context) -> Result<()> {
    let date = parse_date(date)?;
    let initial: Decimal = parse_decimal("initial balance", initial)?;
    let range = series.map(parse_range).transpose()?;

    let conn = ctx.connect()?;
    let transactions = db::load_transactions(&conn, &ctx.portfolio, None)?;
    info!("Replaying {} transactions up to {}", transactions.len(), date);

    let balance = balance_at(&transactions, date, initial);
    let series = range.map(|(from, to)| balance_series(&transactions, &daily_dates(from, to), initial));

    if ctx.json_output {
        let payload = serde_json::json!({
            "balance": balance,
            "series": series,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if !balance.warnings.is_empty() {
        eprint!("{}", formatters::format_warnings(&balance.warnings));
    }
    let amount = lotbook::utils::format_currency(balance.balance);
    let amount = if balance.balance < Decimal::ZERO {
        amount.red()
    } else {
        amount.green()
    };
    println!(
        "\n{} Cash balance on {}: {}",
        "💵".cyan().bold(),
        balance.date,
        amount.bold()
    );
    println!(
        "  {}",
        format!("{} transactions applied", balance.transactions_applied).bright_black()
    );

    if let Some(series) = series {
        println!();
        for point in &series.points {
            println!("  {}  {:>16}", point.date, lotbook::utils::format_currency(point.balance));
        }
    }
    Ok(())
}

pub async fn dispatch_lots(asset: Option<&str>, at: Option<&str>, ctx: &Context) -> Result<()> {
    let as_of = parse_optional_date(at)?.unwrap_or_else(today);
    let asset = asset.map(|a| AssetId::new(a.to_uppercase()));

    let conn = ctx.connect()?;
    let transactions = db::load_transactions(&conn, &ctx.portfolio, asset.as_ref())?;
    let book = LotBook::from_transactions(&transactions, Some(as_of))?;

    let assets: Vec<AssetId> = book.assets().cloned().collect();
    let prices = prices::resolve_at(&conn, &assets, as_of, ctx.config.price_settings()).await?;
    let mut report = calculate_holdings(&book, &prices);
    let mut warnings = book.warnings.clone();
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    let open: Vec<&TaxLot> = book.open_lots().collect();

    if ctx.json_output {
        let payload = serde_json::json!({
            "as_of": as_of,
            "lots": open,
            "holdings": report,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if open.is_empty() {
        println!("{} No open lots on {}", "ℹ".blue().bold(), as_of);
        return Ok(());
    }

    println!("\n{} Open lots on {}\n", "📦".cyan().bold(), as_of);
    println!("{}", formatters::format_lots_table(&open));
    println!();
    println!("{}", formatters::format_holdings_table(&report));
    Ok(())
}
