//! Performance command dispatcher implementation

use anyhow::{bail, Result};
use chrono::NaiveDate;
use colored::Colorize;
use rust_decimal::Decimal;
use tracing::info;

use super::{parse_optional_date, today, Context};
use crate::cli::{formatters, PerformanceCommands};
use lotbook::db;
use lotbook::reports::{daily_dates, summarize, value_series, year_over_year, ValueSeries};

pub async fn dispatch_performance(action: PerformanceCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.connect()?;
    let Some(inception) = db::get_inception_date(&conn, &ctx.portfolio)? else {
        if ctx.json_output {
            println!("null");
        } else {
            print!("{}", formatters::format_empty_feed());
        }
        return Ok(());
    };

    match action {
        PerformanceCommands::Summary { from, to } => {
            let from = parse_optional_date(from.as_deref())?.unwrap_or(inception);
            let to = parse_optional_date(to.as_deref())?.unwrap_or_else(today);
            if to < from {
                bail!("End date {} is before start date {}", to, from);
            }

            let series = load_series(&conn, ctx, from, to)?;
            let summary = summarize(&series.points, &ctx.config.performance_settings());

            if ctx.json_output {
                let payload = serde_json::json!({
                    "summary": summary,
                    "warnings": series.warnings,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            match summary {
                Some(summary) => print!("{}", formatters::format_performance_summary(&summary)),
                None => println!("{} No valuation points between {} and {}", "ℹ".blue().bold(), from, to),
            }
            print!("{}", formatters::format_warnings(&series.warnings));
            Ok(())
        }
        PerformanceCommands::Yoy => {
            let now = today().max(inception);
            let series = load_series(&conn, ctx, inception, now)?;
            let rows = year_over_year(&series.points, inception, now);

            if ctx.json_output {
                let payload = serde_json::json!({
                    "years": rows,
                    "warnings": series.warnings,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            println!("\n{} Year over year since {}\n", "📅".cyan().bold(), inception);
            println!("{}", formatters::format_year_over_year(&rows));
            print!("{}", formatters::format_warnings(&series.warnings));
            Ok(())
        }
    }
}

/// Daily portfolio values over [from, to]
fn load_series(conn: &rusqlite::Connection, ctx: &Context, from: NaiveDate, to: NaiveDate) -> Result<ValueSeries> {
    let settings = ctx.config.price_settings();
    let transactions = db::load_transactions(conn, &ctx.portfolio, None)?;
    let assets = db::get_portfolio_assets(conn, &ctx.portfolio)?;

    let margin = chrono::Days::new(settings.lookback_days.max(0) as u64);
    let book = db::load_price_book(
        conn,
        &assets,
        from.checked_sub_days(margin).unwrap_or(from),
        to.checked_add_days(margin).unwrap_or(to),
    )?;

    let dates = daily_dates(from, to);
    info!(
        "Valuing {} days over {} assets ({} price points)",
        dates.len(),
        assets.len(),
        book.len()
    );
    Ok(value_series(&transactions, &book, &dates, Decimal::ZERO, &settings)?)
}
