//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Handlers load an immutable snapshot of the feed from SQLite, run the
//! engine over it and print either a table or JSON.

mod ledger;
mod liability;
mod performance;
mod prices;
mod tax;
mod transactions;

use anyhow::{Context as _, Result};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cli::{Cli, Commands};
use lotbook::config::Config;
use lotbook::db::{self, PortfolioId};

/// Settings shared by every handler for one invocation
pub struct Context {
    pub config: Config,
    pub db_path: Option<PathBuf>,
    pub portfolio: PortfolioId,
    pub json_output: bool,
}

impl Context {
    pub fn new(cli: &Cli, config: Config) -> Self {
        let db_path = cli.db.clone().or_else(|| config.database.path.clone());
        Self {
            config,
            db_path,
            portfolio: PortfolioId::new(cli.portfolio.clone()),
            json_output: cli.json,
        }
    }

    /// Open the database, creating the schema when needed
    pub fn connect(&self) -> Result<Connection> {
        db::init_database(self.db_path.clone())
    }
}

/// Route a parsed command to its handler
pub async fn dispatch_command(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Init => dispatch_init(ctx),
        Commands::Tx { action } => transactions::dispatch_transactions(action, ctx).await,
        Commands::Price { action } => prices::dispatch_prices(action, ctx).await,
        Commands::Balance {
            date,
            initial,
            series,
        } => ledger::dispatch_balance(&date, &initial, series.as_deref(), ctx).await,
        Commands::Lots { asset, at } => ledger::dispatch_lots(asset.as_deref(), at.as_deref(), ctx).await,
        Commands::Tax { action } => tax::dispatch_tax(action, ctx).await,
        Commands::Liability { action } => liability::dispatch_liability(action, ctx).await,
        Commands::Performance { action } => performance::dispatch_performance(action, ctx).await,
    }
}

fn dispatch_init(ctx: &Context) -> Result<()> {
    use colored::Colorize;

    let path = match &ctx.db_path {
        Some(p) => p.clone(),
        None => db::get_default_db_path()?,
    };
    ctx.connect()?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "database": path }));
    } else {
        println!("{} Database ready at {}", "✓".green().bold(), path.display());
    }
    Ok(())
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", value))
}

pub(crate) fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value.map(parse_date).transpose()
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .with_context(|| format!("Invalid {} '{}'. Must be a decimal number", field, value))
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}
