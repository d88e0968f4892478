use anyhow::{bail, Context as _, Result};
use colored::Colorize;
use rust_decimal::Decimal;
use tracing::info;

use super::{parse_date, parse_decimal, parse_optional_date, Context};
use crate::cli::{formatters, TxCommands};
use lotbook::db::{self, AssetId, KindDetails, Transaction, TransactionId, TransactionKind};
use lotbook::ledger::cash::classify_warning;
use lotbook::tax::LotBook;

/// The feed must still replay into valid lots after a write
fn ensure_replayable(feed: &[Transaction]) -> Result<()> {
    LotBook::from_transactions(feed, None)?;
    Ok(())
}

pub async fn dispatch_transactions(action: TxCommands, ctx: &Context) -> Result<()> {
    match action {
        TxCommands::Add {
            kind,
            date,
            asset,
            quantity,
            price,
            amount,
            fees,
            currency,
            grant_date,
            vesting_date,
            discount,
            withheld,
            ratio,
        } => {
            let trade_date = parse_date(&date)?;
            let details = KindDetails {
                grant_date: parse_optional_date(grant_date.as_deref())?,
                vesting_date: parse_optional_date(vesting_date.as_deref())?.or(Some(trade_date)),
                discount_percent: discount.as_deref().map(|v| parse_decimal("discount", v)).transpose()?,
                shares_withheld: withheld.as_deref().map(|v| parse_decimal("withheld", v)).transpose()?,
                split_ratio: ratio.as_deref().map(|v| parse_decimal("ratio", v)).transpose()?,
            };
            let kind = TransactionKind::from_label(&kind, details)?;

            let quantity = parse_decimal("quantity", &quantity)?;
            let fees = parse_decimal("fees", &fees)?;
            if quantity < Decimal::ZERO {
                bail!("Quantity cannot be negative");
            }
            if fees < Decimal::ZERO {
                bail!("Fees cannot be negative");
            }

            let mut tx = Transaction::new(0, ctx.portfolio.clone(), kind, trade_date);
            tx.currency = currency;
            if let Some(asset) = asset {
                tx = tx.with_asset(AssetId::new(asset.to_uppercase()));
            }
            tx = match amount {
                Some(amount) => tx.with_amount(parse_decimal("amount", &amount)?),
                None => tx.with_trade(quantity, parse_decimal("price", &price)?, fees),
            };

            if tx.kind.affects_lots() && tx.asset_id.is_none() {
                bail!("{} transactions require an asset (--asset)", tx.kind);
            }

            info!("Adding {} transaction on {}", tx.kind, tx.date);
            let conn = ctx.connect()?;
            let mut feed = db::load_transactions(&conn, &ctx.portfolio, None)?;
            feed.push(tx.clone());
            ensure_replayable(&feed).with_context(|| format!("Rejected {} on {}", tx.kind, tx.date))?;

            let id = db::insert_transaction(&conn, &tx)?;
            tx.id = id;
            if let Some(warning) = classify_warning(&tx) {
                eprintln!("{} {}", "⚠".yellow().bold(), warning);
            }

            if ctx.json_output {
                println!("{}", formatters::to_json(&tx));
            } else {
                println!(
                    "{} Added {} transaction {} on {}",
                    "✓".green().bold(),
                    tx.kind,
                    id,
                    tx.date
                );
            }
            Ok(())
        }
        TxCommands::Delete { id } => {
            let id = TransactionId(id);
            let conn = ctx.connect()?;
            let mut feed = db::load_transactions(&conn, &ctx.portfolio, None)?;
            let Some(pos) = feed.iter().position(|tx| tx.id == id) else {
                bail!("Transaction {} not found in portfolio {}", id, ctx.portfolio);
            };
            let removed = feed.remove(pos);
            ensure_replayable(&feed).with_context(|| format!("Cannot delete transaction {}", id))?;

            info!("Deleting {} transaction {}", removed.kind, id);
            if !db::delete_transaction(&conn, &ctx.portfolio, id)? {
                bail!("Transaction {} not found in portfolio {}", id, ctx.portfolio);
            }

            if ctx.json_output {
                println!("{}", formatters::to_json(&removed));
            } else {
                println!(
                    "{} Deleted {} transaction {} on {}",
                    "✓".green().bold(),
                    removed.kind,
                    id,
                    removed.date
                );
            }
            Ok(())
        }
        TxCommands::List { asset } => {
            let conn = ctx.connect()?;
            let asset = asset.map(|a| AssetId::new(a.to_uppercase()));
            let transactions = db::load_transactions(&conn, &ctx.portfolio, asset.as_ref())?;

            if ctx.json_output {
                println!("{}", formatters::to_json(&transactions));
            } else if transactions.is_empty() {
                print!("{}", formatters::format_empty_feed());
            } else {
                println!("{}", formatters::format_transactions_table(&transactions));
            }
            Ok(())
        }
    }
}
