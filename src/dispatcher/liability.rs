//! Liability command dispatcher implementation

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};
use tracing::info;

use super::{parse_date, parse_decimal, today, Context};
use crate::cli::{formatters, LiabilityCommands};
use lotbook::db::{self, Liability, LiabilityId, LiabilityPayment};
use lotbook::liability::balance_history;
use lotbook::utils::format_currency;

pub async fn dispatch_liability(action: LiabilityCommands, ctx: &Context) -> Result<()> {
    match action {
        LiabilityCommands::Add { name, balance, start } => {
            let balance = parse_decimal("balance", &balance)?;
            if balance < Decimal::ZERO {
                bail!("Balance cannot be negative");
            }
            let start = parse_date(&start)?;

            let conn = ctx.connect()?;
            let id = db::insert_liability(&conn, &name, balance, start)?;
            info!("Added liability {} ({})", id, name);

            if ctx.json_output {
                let liability = Liability {
                    id,
                    name,
                    balance,
                    start_date: start,
                };
                println!("{}", formatters::to_json(&liability));
            } else {
                println!(
                    "{} Added liability {} {} ({} since {})",
                    "✓".green().bold(),
                    id,
                    name.bold(),
                    format_currency(balance),
                    start
                );
            }
            Ok(())
        }
        LiabilityCommands::Pay {
            id,
            date,
            principal,
            interest,
        } => {
            let date = parse_date(&date)?;
            let principal = parse_decimal("principal", &principal)?;
            let interest = parse_decimal("interest", &interest)?;

            let mut conn = ctx.connect()?;
            let payment = db::insert_liability_payment(&mut conn, LiabilityId(id), date, principal, interest)?;

            if ctx.json_output {
                println!("{}", formatters::to_json(&payment));
            } else {
                println!(
                    "{} Payment of {} recorded on {}; balance now {}",
                    "✓".green().bold(),
                    format_currency(payment.principal_paid),
                    payment.date,
                    format_currency(payment.remaining_balance).bold()
                );
            }
            Ok(())
        }
        LiabilityCommands::List => {
            let conn = ctx.connect()?;
            let liabilities = db::list_liabilities(&conn)?;

            if ctx.json_output {
                println!("{}", formatters::to_json(&liabilities));
            } else if liabilities.is_empty() {
                println!("{} No liabilities recorded", "ℹ".blue().bold());
            } else {
                println!("{}", format_liabilities_table(&liabilities));
            }
            Ok(())
        }
        LiabilityCommands::History { id, dates } => {
            let conn = ctx.connect()?;
            let liability = db::get_liability(&conn, LiabilityId(id))?
                .ok_or_else(|| anyhow!("Liability {} not found", LiabilityId(id)))?;
            let payments = db::load_liability_payments(&conn, liability.id)?;

            let dates = if dates.is_empty() {
                default_history_dates(&liability, &payments)
            } else {
                dates.iter().map(|d| parse_date(d)).collect::<Result<Vec<_>>>()?
            };

            let history = balance_history(&liability, &payments, &dates);
            if ctx.json_output {
                let payload = serde_json::json!({
                    "liability": liability,
                    "history": history,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print!("{}", formatters::format_liability_history(&liability.name, &history));
            }
            Ok(())
        }
    }
}

/// Start date, every payment date and today
fn default_history_dates(liability: &Liability, payments: &[LiabilityPayment]) -> Vec<chrono::NaiveDate> {
    let mut dates = vec![liability.start_date];
    dates.extend(payments.iter().map(|p| p.date));
    dates.push(today().max(liability.start_date));
    dates.sort();
    dates.dedup();
    dates
}

fn format_liabilities_table(liabilities: &[Liability]) -> String {
    #[derive(Tabled)]
    struct LiabilityRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Start")]
        start: String,
        #[tabled(rename = "Balance")]
        balance: String,
    }

    let rows: Vec<LiabilityRow> = liabilities
        .iter()
        .map(|l| LiabilityRow {
            id: l.id.to_string(),
            name: l.name.clone(),
            start: l.start_date.to_string(),
            balance: format_currency(l.balance),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..), Alignment::right());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_default_history_dates_are_sorted_and_unique() {
        let liability = Liability {
            id: LiabilityId(1),
            name: "Mortgage".to_string(),
            balance: dec!(9000),
            start_date: d(2024, 1, 1),
        };
        let payment = |date| LiabilityPayment {
            date,
            principal_paid: dec!(500),
            interest_paid: dec!(0),
            remaining_balance: dec!(0),
        };
        let dates = default_history_dates(&liability, &[payment(d(2024, 3, 1)), payment(d(2024, 2, 1)), payment(d(2024, 1, 1))]);

        assert_eq!(dates[0], d(2024, 1, 1));
        assert_eq!(dates[1], d(2024, 2, 1));
        assert_eq!(dates[2], d(2024, 3, 1));
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }
}
