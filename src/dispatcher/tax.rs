//! Tax command dispatcher implementation

use anyhow::{bail, Result};
use colored::Colorize;
use rust_decimal::Decimal;
use tracing::info;

use super::{parse_date, parse_decimal, parse_optional_date, prices, today, Context};
use crate::cli::{formatters, TaxCommands};
use lotbook::db::{self, AssetId};
use lotbook::tax::{analyze_lots, check_disposition, realized_gains_by_year, realized_gains_for_year, LotBook, TaxRates};

pub async fn dispatch_tax(action: TaxCommands, ctx: &Context) -> Result<()> {
    match action {
        TaxCommands::Analyze {
            at,
            short_rate,
            long_rate,
        } => {
            let as_of = parse_optional_date(at.as_deref())?.unwrap_or_else(today);
            let rates = rates_with_overrides(ctx, short_rate.as_deref(), long_rate.as_deref())?;
            dispatch_analyze(as_of, rates, ctx).await
        }
        TaxCommands::EsppCheck { grant, purchase, sell } => {
            let check = check_disposition(parse_date(&grant)?, parse_date(&purchase)?, parse_date(&sell)?)?;
            if ctx.json_output {
                println!("{}", formatters::to_json(&check));
            } else {
                print!("{}", formatters::format_disposition(&check));
            }
            Ok(())
        }
        TaxCommands::Realized {
            year,
            short_rate,
            long_rate,
        } => {
            let rates = rates_with_overrides(ctx, short_rate.as_deref(), long_rate.as_deref())?;
            dispatch_realized(year, rates, ctx)
        }
    }
}

fn rates_with_overrides(ctx: &Context, short_rate: Option<&str>, long_rate: Option<&str>) -> Result<TaxRates> {
    let mut rates = ctx.config.tax_rates();
    if let Some(rate) = short_rate {
        rates.short_term = parse_rate("short-term rate", rate)?;
    }
    if let Some(rate) = long_rate {
        rates.long_term = parse_rate("long-term rate", rate)?;
    }
    Ok(rates)
}

fn parse_rate(field: &str, value: &str) -> Result<Decimal> {
    let rate = parse_decimal(field, value)?;
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        bail!("{} must be between 0 and 1 (got {})", field, rate);
    }
    Ok(rate)
}

async fn dispatch_analyze(as_of: chrono::NaiveDate, rates: TaxRates, ctx: &Context) -> Result<()> {
    let conn = ctx.connect()?;
    let transactions = db::load_transactions(&conn, &ctx.portfolio, None)?;
    let book = LotBook::from_transactions(&transactions, Some(as_of))?;
    info!("Analyzing {} open lots as of {}", book.open_lots().count(), as_of);

    let assets: Vec<AssetId> = book.assets().cloned().collect();
    let prices = prices::resolve_at(&conn, &assets, as_of, ctx.config.price_settings()).await?;

    let mut analysis = analyze_lots(book.open_lots(), &prices, as_of, rates);
    let mut warnings = book.warnings.clone();
    warnings.append(&mut analysis.warnings);
    analysis.warnings = warnings;

    if ctx.json_output {
        println!("{}", formatters::to_json(&analysis));
    } else if analysis.lots.is_empty() && analysis.warnings.is_empty() {
        println!("{} No open lots on {}", "ℹ".blue().bold(), as_of);
    } else {
        print!("{}", formatters::format_tax_analysis(&analysis));
    }
    Ok(())
}

fn dispatch_realized(year: Option<i32>, rates: TaxRates, ctx: &Context) -> Result<()> {
    let conn = ctx.connect()?;
    let transactions = db::load_transactions(&conn, &ctx.portfolio, None)?;
    let book = LotBook::from_transactions(&transactions, None)?;

    let reports = match year {
        Some(year) => vec![realized_gains_for_year(&book.sales, year, &rates)],
        None => realized_gains_by_year(&book.sales, &rates),
    };

    if ctx.json_output {
        println!("{}", formatters::to_json(&reports));
    } else if reports.is_empty() {
        println!("{} No sales recorded", "ℹ".blue().bold());
    } else {
        println!("\n{} Realized gains (FIFO)\n", "💰".cyan().bold());
        println!("{}", formatters::format_realized_table(&reports));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_rate_bounds() {
        assert_eq!(parse_rate("rate", "0.24").unwrap(), dec!(0.24));
        assert!(parse_rate("rate", "1.5").is_err());
        assert!(parse_rate("rate", "-0.1").is_err());
    }
}
