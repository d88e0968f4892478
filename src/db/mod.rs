// Database module - SQLite transaction, price and liability provider

pub mod models;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

use crate::liability;
use crate::pricing::PriceBook;
pub use models::{
    AssetId, KindDetails, Liability, LiabilityId, LiabilityPayment, PortfolioId, PricePoint,
    Transaction, TransactionId, TransactionKind,
};

/// Get the default database path (~/.lotbook/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let lotbook_dir = PathBuf::from(home).join(".lotbook");

    std::fs::create_dir_all(&lotbook_dir).context("Failed to create .lotbook directory")?;

    Ok(lotbook_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Create all tables and indexes on an open connection
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")
}

/// Initialize the database with schema and return the open connection
pub fn init_database(db_path: Option<PathBuf>) -> Result<Connection> {
    let conn = open_db(db_path)?;
    init_schema(&conn)?;
    info!("Database initialized");
    Ok(conn)
}

/// Append a transaction to the feed.
///
/// The stored id is assigned by the database (insertion order); `tx.id` is ignored.
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<TransactionId> {
    let details = tx.kind.details();
    conn.execute(
        "INSERT INTO transactions (
            portfolio_id, asset_id, kind, trade_date,
            quantity, price, total_amount, fees, currency,
            grant_date, vesting_date, discount_percent, shares_withheld, split_ratio
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            tx.portfolio_id.as_str(),
            tx.asset_id.as_ref().map(|a| a.as_str().to_string()),
            tx.kind.as_str(),
            tx.date,
            tx.quantity.to_string(),
            tx.price.to_string(),
            tx.total_amount.to_string(),
            tx.fees.to_string(),
            tx.currency,
            details.grant_date,
            details.vesting_date,
            details.discount_percent.map(|d| d.to_string()),
            details.shares_withheld.map(|d| d.to_string()),
            details.split_ratio.map(|d| d.to_string()),
        ],
    )?;

    Ok(TransactionId(conn.last_insert_rowid()))
}

/// Load a portfolio's feed (optionally one asset) ordered by (date, insertion order)
pub fn load_transactions(
    conn: &Connection,
    portfolio: &PortfolioId,
    asset: Option<&AssetId>,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, portfolio_id, asset_id, kind, trade_date,
                quantity, price, total_amount, fees, currency,
                grant_date, vesting_date, discount_percent, shares_withheld, split_ratio
         FROM transactions
         WHERE portfolio_id = ?1 AND (?2 IS NULL OR asset_id = ?2)
         ORDER BY trade_date ASC, id ASC",
    )?;

    let rows = stmt.query_map(
        params![portfolio.as_str(), asset.map(|a| a.as_str().to_string())],
        |row| {
            let label: String = row.get(3)?;
            let details = KindDetails {
                grant_date: row.get(10)?,
                vesting_date: row.get(11)?,
                discount_percent: get_optional_decimal_value(row, 12)?,
                shares_withheld: get_optional_decimal_value(row, 13)?,
                split_ratio: get_optional_decimal_value(row, 14)?,
            };
            let kind = TransactionKind::from_label(&label, details)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
            let asset_id: Option<String> = row.get(2)?;
            let portfolio_id: String = row.get(1)?;
            Ok(Transaction {
                id: TransactionId(row.get(0)?),
                portfolio_id: PortfolioId::new(portfolio_id),
                asset_id: asset_id.map(AssetId::new),
                kind,
                date: row.get(4)?,
                quantity: get_decimal_value(row, 5)?,
                price: get_decimal_value(row, 6)?,
                total_amount: get_decimal_value(row, 7)?,
                fees: get_decimal_value(row, 8)?,
                currency: row.get(9)?,
            })
        },
    )?;

    let transactions = rows
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read transaction feed")?;

    debug!(
        "Loaded {} transactions for portfolio {}",
        transactions.len(),
        portfolio
    );
    Ok(transactions)
}

/// Remove one transaction from a portfolio's feed. Returns false when no such row exists.
pub fn delete_transaction(conn: &Connection, portfolio: &PortfolioId, id: TransactionId) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM transactions WHERE id = ?1 AND portfolio_id = ?2",
        params![id.0, portfolio.as_str()],
    )?;
    debug!("Deleted {} rows for transaction {}", affected, id);
    Ok(affected > 0)
}

/// Distinct asset ids appearing in a portfolio's feed
pub fn get_portfolio_assets(conn: &Connection, portfolio: &PortfolioId) -> Result<Vec<AssetId>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT asset_id FROM transactions
         WHERE portfolio_id = ?1 AND asset_id IS NOT NULL
         ORDER BY asset_id",
    )?;
    let assets = stmt
        .query_map([portfolio.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assets.into_iter().map(AssetId::new).collect())
}

/// Earliest transaction date of a portfolio
pub fn get_inception_date(conn: &Connection, portfolio: &PortfolioId) -> Result<Option<NaiveDate>> {
    let date: Option<NaiveDate> = conn.query_row(
        "SELECT MIN(trade_date) FROM transactions WHERE portfolio_id = ?1",
        [portfolio.as_str()],
        |row| row.get(0),
    )?;
    Ok(date)
}

/// Insert a price point; a second point for the same asset and date replaces the first
pub fn insert_price(conn: &Connection, point: &PricePoint) -> Result<()> {
    conn.execute(
        "INSERT INTO price_history (asset_id, price_date, price) VALUES (?1, ?2, ?3)
         ON CONFLICT(asset_id, price_date) DO UPDATE SET price = excluded.price",
        params![point.asset_id.as_str(), point.date, point.price.to_string()],
    )?;
    Ok(())
}

/// Price history for one asset within [from, to], ordered by date
pub fn load_price_history(
    conn: &Connection,
    asset: &AssetId,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<PricePoint>> {
    let mut stmt = conn.prepare(
        "SELECT price_date, price FROM price_history
         WHERE asset_id = ?1 AND price_date >= ?2 AND price_date <= ?3
         ORDER BY price_date ASC",
    )?;
    let points = stmt
        .query_map(params![asset.as_str(), from, to], |row| {
            Ok(PricePoint {
                asset_id: asset.clone(),
                date: row.get(0)?,
                price: get_decimal_value(row, 1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Snapshot the price histories of several assets into an in-memory book
pub fn load_price_book(
    conn: &Connection,
    assets: &[AssetId],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<PriceBook> {
    let mut book = PriceBook::new();
    for asset in assets {
        for point in load_price_history(conn, asset, from, to)? {
            book.insert(point);
        }
    }
    Ok(book)
}

/// Insert a liability, returns its id
pub fn insert_liability(
    conn: &Connection,
    name: &str,
    balance: Decimal,
    start_date: NaiveDate,
) -> Result<LiabilityId> {
    conn.execute(
        "INSERT INTO liabilities (name, balance, start_date) VALUES (?1, ?2, ?3)",
        params![name, balance.to_string(), start_date],
    )?;
    Ok(LiabilityId(conn.last_insert_rowid()))
}

pub fn get_liability(conn: &Connection, id: LiabilityId) -> Result<Option<Liability>> {
    conn.query_row(
        "SELECT id, name, balance, start_date FROM liabilities WHERE id = ?1",
        [id.0],
        |row| {
            Ok(Liability {
                id: LiabilityId(row.get(0)?),
                name: row.get(1)?,
                balance: get_decimal_value(row, 2)?,
                start_date: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_liabilities(conn: &Connection) -> Result<Vec<Liability>> {
    let mut stmt = conn.prepare("SELECT id, name, balance, start_date FROM liabilities ORDER BY id")?;
    let liabilities = stmt
        .query_map([], |row| {
            Ok(Liability {
                id: LiabilityId(row.get(0)?),
                name: row.get(1)?,
                balance: get_decimal_value(row, 2)?,
                start_date: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(liabilities)
}

/// Record a validated payment and move the liability's current balance to the
/// payment's remaining balance.
pub fn insert_liability_payment(
    conn: &mut Connection,
    id: LiabilityId,
    date: NaiveDate,
    principal_paid: Decimal,
    interest_paid: Decimal,
) -> Result<LiabilityPayment> {
    let liability = get_liability(conn, id)?.ok_or_else(|| anyhow!("Liability {} not found", id))?;

    let payment = LiabilityPayment {
        date,
        principal_paid,
        interest_paid,
        remaining_balance: liability.balance - principal_paid,
    };
    liability::validate_payment(&liability, &payment)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO liability_payments
            (liability_id, payment_date, principal_paid, interest_paid, remaining_balance)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.0,
            payment.date,
            payment.principal_paid.to_string(),
            payment.interest_paid.to_string(),
            payment.remaining_balance.to_string(),
        ],
    )?;
    tx.execute(
        "UPDATE liabilities SET balance = ?1 WHERE id = ?2",
        params![payment.remaining_balance.to_string(), id.0],
    )?;
    tx.commit()?;

    Ok(payment)
}

pub fn load_liability_payments(conn: &Connection, id: LiabilityId) -> Result<Vec<LiabilityPayment>> {
    let mut stmt = conn.prepare(
        "SELECT payment_date, principal_paid, interest_paid, remaining_balance
         FROM liability_payments
         WHERE liability_id = ?1
         ORDER BY payment_date ASC, id ASC",
    )?;
    let payments = stmt
        .query_map([id.0], |row| {
            Ok(LiabilityPayment {
                date: row.get(0)?,
                principal_paid: get_decimal_value(row, 1)?,
                interest_paid: get_decimal_value(row, 2)?,
                remaining_balance: get_decimal_value(row, 3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(payments)
}

/// Helper to read Decimal from SQLite (stored as TEXT, tolerant of numeric columns)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))?;
            Decimal::from_str(s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Real, Box::new(e))),
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            Type::Null,
        )),
    }
}

/// Helper to read optional Decimal from SQLite
fn get_optional_decimal_value(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<Decimal>, rusqlite::Error> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        _ => get_decimal_value(row, idx).map(Some),
    }
}
