use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{parse_date, parse_decimal, Context};
use crate::cli::{formatters, PriceCommands};
use lotbook::db::{self, AssetId, PricePoint};
use lotbook::pricing::resolver::resolve_prices_at;
use lotbook::pricing::{price_at, PriceCache, PriceLookup};
use lotbook::utils::format_currency;

pub async fn dispatch_prices(action: PriceCommands, ctx: &Context) -> Result<()> {
    match action {
        PriceCommands::Add { asset, date, price } => {
            let point = PricePoint {
                asset_id: AssetId::new(asset.to_uppercase()),
                date: parse_date(&date)?,
                price: parse_decimal("price", &price)?,
            };
            if point.price.is_sign_negative() {
                anyhow::bail!("Price cannot be negative");
            }

            let conn = ctx.connect()?;
            db::insert_price(&conn, &point)?;
            tracing::info!("Recorded price {} for {} on {}", point.price, point.asset_id, point.date);

            if ctx.json_output {
                println!("{}", formatters::to_json(&point));
            } else {
                println!(
                    "{} {} {} on {}",
                    "✓".green().bold(),
                    point.asset_id,
                    format_currency(point.price),
                    point.date
                );
            }
            Ok(())
        }
        PriceCommands::At { asset, date } => {
            let asset = AssetId::new(asset.to_uppercase());
            let date = parse_date(&date)?;
            let settings = ctx.config.price_settings();

            let conn = ctx.connect()?;
            let margin = chrono::Days::new(settings.lookback_days.max(0) as u64);
            let from = date.checked_sub_days(margin).unwrap_or(date);
            let to = date.checked_add_days(margin).unwrap_or(date);
            let book = db::load_price_book(&conn, std::slice::from_ref(&asset), from, to)?;

            let mut cache = PriceCache::new();
            let lookup = price_at(&book, &mut cache, &asset, date, &settings);
            print_lookup(&lookup, settings.staleness_days, ctx.json_output);
            Ok(())
        }
    }
}

fn print_lookup(lookup: &PriceLookup, staleness_days: i64, json_output: bool) {
    if json_output {
        #[derive(Serialize)]
        struct LookupJson<'a> {
            #[serde(flatten)]
            lookup: &'a PriceLookup,
            is_missing: bool,
        }
        println!(
            "{}",
            formatters::to_json(&LookupJson {
                lookup,
                is_missing: lookup.is_missing(),
            })
        );
        return;
    }

    match lookup.price_date {
        None => println!(
            "{} No price for {} near {}",
            "⚠".yellow().bold(),
            lookup.asset_id,
            lookup.requested
        ),
        Some(price_date) => {
            let mut line = format!(
                "{} {} on {} (from {})",
                lookup.asset_id.to_string().bold(),
                format_currency(lookup.price),
                lookup.requested,
                price_date
            );
            if lookup.is_interpolated {
                line.push_str(&format!(
                    " {}",
                    format!("stale: more than {} days away", staleness_days).yellow()
                ));
            }
            println!("{}", line);
        }
    }
}

/// Load a window of history around `date` and resolve every asset concurrently
pub(super) async fn resolve_at(
    conn: &rusqlite::Connection,
    assets: &[AssetId],
    date: chrono::NaiveDate,
    settings: lotbook::pricing::PriceSettings,
) -> Result<HashMap<AssetId, PriceLookup>> {
    let margin = chrono::Days::new(settings.lookback_days.max(0) as u64);
    let from = date.checked_sub_days(margin).unwrap_or(date);
    let to = date.checked_add_days(margin).unwrap_or(date);
    let book = Arc::new(db::load_price_book(conn, assets, from, to)?);
    resolve_prices_at(book, assets, date, settings).await
}
