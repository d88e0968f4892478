use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "lotbook")]
#[command(version, about = "Portfolio ledger with FIFO tax lots and performance analytics")]
#[command(
    long_about = "Record portfolio transactions, prices and liabilities, then replay them into historical cash balances, tax-lot analysis (including ESPP disposition rules) and time-weighted performance."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Database file (defaults to ~/.lotbook/data.db)
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    /// Portfolio to operate on
    #[arg(long, global = true, default_value = "main")]
    pub portfolio: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database
    Init,

    /// Transaction feed management
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Price history management
    Price {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Cash balance at a date
    Balance {
        /// Date (YYYY-MM-DD)
        date: String,

        /// Opening cash balance
        #[arg(long, default_value = "0")]
        initial: String,

        /// Also print a daily series over FROM:TO (YYYY-MM-DD:YYYY-MM-DD)
        #[arg(long)]
        series: Option<String>,
    },

    /// Show tax lots and holdings
    Lots {
        /// Only this asset
        #[arg(short, long)]
        asset: Option<String>,

        /// Replay the feed up to this date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        at: Option<String>,
    },

    /// Tax analysis and ESPP disposition checks
    Tax {
        #[command(subcommand)]
        action: TaxCommands,
    },

    /// Liabilities and their balance history
    Liability {
        #[command(subcommand)]
        action: LiabilityCommands,
    },

    /// Performance analytics
    Performance {
        #[command(subcommand)]
        action: PerformanceCommands,
    },
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Append a transaction to the feed
    Add {
        /// Kind: buy, sell, dividend, interest, fee, tax, deposit, withdrawal,
        /// transfer_in, transfer_out, split, spinoff, merger, reinvestment,
        /// espp_purchase, rsu_vest, liability_payment
        kind: String,

        /// Trade date (YYYY-MM-DD)
        date: String,

        /// Asset ticker (omit for pure cash events)
        #[arg(short, long)]
        asset: Option<String>,

        #[arg(short, long, default_value = "0")]
        quantity: String,

        /// Unit price
        #[arg(short, long, default_value = "0")]
        price: String,

        /// Amount of a pure cash event (stored as the price)
        #[arg(long)]
        amount: Option<String>,

        #[arg(long, default_value = "0")]
        fees: String,

        #[arg(long, default_value = "USD")]
        currency: String,

        /// ESPP/RSU grant date (YYYY-MM-DD)
        #[arg(long)]
        grant_date: Option<String>,

        /// RSU vesting date (YYYY-MM-DD, defaults to the trade date)
        #[arg(long)]
        vesting_date: Option<String>,

        /// ESPP discount percentage (15 = 15%)
        #[arg(long)]
        discount: Option<String>,

        /// RSU shares withheld for taxes
        #[arg(long)]
        withheld: Option<String>,

        /// Split ratio (2 for 2:1)
        #[arg(long)]
        ratio: Option<String>,
    },

    /// Remove a transaction (refused if later sales would lose their lots)
    Delete {
        /// Transaction id as shown by `tx list`
        id: i64,
    },

    /// List the feed in replay order
    List {
        #[arg(short, long)]
        asset: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Record a price point (replaces an existing one for the same day)
    Add {
        asset: String,
        /// Date (YYYY-MM-DD)
        date: String,
        price: String,
    },

    /// Resolve the price nearest to a date
    At {
        asset: String,
        /// Date (YYYY-MM-DD)
        date: String,
    },
}

#[derive(Subcommand)]
pub enum TaxCommands {
    /// Unrealized gains by holding period and estimated tax
    Analyze {
        /// Analysis date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        at: Option<String>,

        /// Short-term rate override (0.37 = 37%)
        #[arg(long)]
        short_rate: Option<String>,

        /// Long-term rate override
        #[arg(long)]
        long_rate: Option<String>,
    },

    /// Check whether selling ESPP shares on a date is a qualifying disposition
    EsppCheck {
        /// Grant (offering) date (YYYY-MM-DD)
        #[arg(long)]
        grant: String,

        /// Purchase date (YYYY-MM-DD)
        #[arg(long)]
        purchase: String,

        /// Sale date (YYYY-MM-DD)
        #[arg(long)]
        sell: String,
    },

    /// Realized gains from FIFO sales, by year
    Realized {
        /// Only this year
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(long)]
        short_rate: Option<String>,

        #[arg(long)]
        long_rate: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum LiabilityCommands {
    /// Register a liability with its current balance
    Add {
        name: String,
        balance: String,
        /// Origination date (YYYY-MM-DD)
        start: String,
    },

    /// Record a payment; the current balance drops by the principal
    Pay {
        id: i64,
        /// Payment date (YYYY-MM-DD)
        date: String,
        principal: String,
        #[arg(long, default_value = "0")]
        interest: String,
    },

    /// List liabilities
    List,

    /// Reconstructed balance at each date
    History {
        id: i64,
        /// Dates (YYYY-MM-DD); defaults to the start date, each payment date and today
        dates: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PerformanceCommands {
    /// Return, extremes, volatility and Sharpe ratio over a window
    Summary {
        /// Start date (YYYY-MM-DD, defaults to inception)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,
    },

    /// Year-over-year returns since inception
    Yoy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lotbook", "balance", "2024-03-01", "--json", "--db", "x.db"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert_eq!(cli.portfolio, "main");
        assert!(matches!(cli.command, Commands::Balance { .. }));
    }

    #[test]
    fn test_tx_add_parses_equity_details() {
        let cli = Cli::try_parse_from([
            "lotbook",
            "tx",
            "add",
            "espp_purchase",
            "2024-01-31",
            "--asset",
            "ACME",
            "-q",
            "10",
            "-p",
            "85",
            "--grant-date",
            "2023-08-01",
            "--discount",
            "15",
        ])
        .unwrap();
        match cli.command {
            Commands::Tx {
                action: TxCommands::Add { kind, grant_date, discount, .. },
            } => {
                assert_eq!(kind, "espp_purchase");
                assert_eq!(grant_date.as_deref(), Some("2023-08-01"));
                assert_eq!(discount.as_deref(), Some("15"));
            }
            _ => panic!("expected tx add"),
        }
    }

    #[test]
    fn test_tx_delete_takes_numeric_id() {
        let cli = Cli::try_parse_from(["lotbook", "tx", "delete", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tx {
                action: TxCommands::Delete { id: 3 }
            }
        ));
        assert!(Cli::try_parse_from(["lotbook", "tx", "delete", "abc"]).is_err());
    }
}
