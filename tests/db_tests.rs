//! SQLite provider tests
//!
//! - Feed round trip keeps kinds, equity details and decimal precision
//! - Same-day transactions come back in insertion order
//! - Deletes are scoped to the owning portfolio
//! - Price upserts and windowed price books
//! - Liability payments validate and move the current balance

use anyhow::Result;
use chrono::NaiveDate;
use lotbook::db::{
    self, init_database, open_db, AssetId, LiabilityId, PortfolioId, PricePoint, Transaction, TransactionKind,
};
use lotbook::error::LedgerError;
use lotbook::liability::{balance_history, ReconstructionAccuracy};
use lotbook::pricing::{price_at, PriceCache, PriceSettings};
use rusqlite::Connection;
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Test helper: Create a temporary database
fn create_test_db() -> Result<(TempDir, Connection)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    init_database(Some(db_path.clone()))?;
    let conn = open_db(Some(db_path))?;
    Ok((temp_dir, conn))
}

#[test]
fn test_feed_round_trip() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let main = PortfolioId::new("main");

    let buy = Transaction::new(0, main.clone(), TransactionKind::Buy, d(2024, 1, 15))
        .with_asset(AssetId::new("ACME"))
        .with_trade(dec!(3.1234567890123), dec!(100.0000000001), dec!(1.25));
    let espp = Transaction::new(
        0,
        main.clone(),
        TransactionKind::EsppPurchase {
            grant_date: d(2023, 7, 1),
            discount_percent: dec!(15),
        },
        d(2024, 1, 15),
    )
    .with_asset(AssetId::new("ACME"))
    .with_trade(dec!(10), dec!(85), dec!(0));
    let odd = Transaction::new(
        0,
        main.clone(),
        TransactionKind::Unrecognized {
            label: "rebate".to_string(),
        },
        d(2024, 1, 10),
    )
    .with_amount(dec!(5));
    let other = Transaction::new(0, PortfolioId::new("ira"), TransactionKind::Deposit, d(2024, 1, 1))
        .with_amount(dec!(100));

    let buy_id = db::insert_transaction(&conn, &buy)?;
    let espp_id = db::insert_transaction(&conn, &espp)?;
    db::insert_transaction(&conn, &odd)?;
    db::insert_transaction(&conn, &other)?;

    let loaded = db::load_transactions(&conn, &main, None)?;
    assert_eq!(loaded.len(), 3);

    // ordered by date, then insertion order
    assert_eq!(loaded[0].kind, odd.kind);
    assert_eq!(loaded[1].id, buy_id);
    assert_eq!(loaded[2].id, espp_id);

    assert_eq!(loaded[1].quantity, dec!(3.1234567890123));
    assert_eq!(loaded[1].price, dec!(100.0000000001));
    assert_eq!(loaded[1].fees, dec!(1.25));
    assert_eq!(loaded[2].kind, espp.kind);

    let only_acme = db::load_transactions(&conn, &main, Some(&AssetId::new("ACME")))?;
    assert_eq!(only_acme.len(), 2);

    assert_eq!(db::get_inception_date(&conn, &main)?, Some(d(2024, 1, 10)));
    assert_eq!(db::get_portfolio_assets(&conn, &main)?, vec![AssetId::new("ACME")]);
    Ok(())
}

#[test]
fn test_delete_transaction_scoped_to_portfolio() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let main = PortfolioId::new("main");
    let ira = PortfolioId::new("ira");

    let kept = db::insert_transaction(
        &conn,
        &Transaction::new(0, main.clone(), TransactionKind::Deposit, d(2024, 1, 1)).with_amount(dec!(100)),
    )?;
    let gone = db::insert_transaction(
        &conn,
        &Transaction::new(0, main.clone(), TransactionKind::Fee, d(2024, 1, 2)).with_amount(dec!(3)),
    )?;

    assert!(!db::delete_transaction(&conn, &ira, gone)?);
    assert!(db::delete_transaction(&conn, &main, gone)?);
    assert!(!db::delete_transaction(&conn, &main, gone)?);

    let loaded = db::load_transactions(&conn, &main, None)?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, kept);
    Ok(())
}

#[test]
fn test_stored_kind_missing_details_fails_the_load() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    conn.execute(
        "INSERT INTO transactions (portfolio_id, asset_id, kind, trade_date) VALUES ('main', 'ACME', 'split', '2024-01-01')",
        [],
    )?;

    let err = db::load_transactions(&conn, &PortfolioId::new("main"), None).unwrap_err();
    assert!(format!("{:#}", err).contains("split requires a ratio"));
    Ok(())
}

#[test]
fn test_price_upsert_and_lookup() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let acme = AssetId::new("ACME");

    for (date, price) in [(d(2024, 3, 1), dec!(10)), (d(2024, 3, 9), dec!(12)), (d(2024, 3, 1), dec!(11))] {
        db::insert_price(
            &conn,
            &PricePoint {
                asset_id: acme.clone(),
                date,
                price,
            },
        )?;
    }

    let history = db::load_price_history(&conn, &acme, d(2024, 1, 1), d(2024, 12, 31))?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].price, dec!(11));

    let book = db::load_price_book(&conn, std::slice::from_ref(&acme), d(2024, 2, 1), d(2024, 4, 1))?;
    let mut cache = PriceCache::new();
    let settings = PriceSettings::default();

    let near = price_at(&book, &mut cache, &acme, d(2024, 3, 2), &settings);
    assert_eq!(near.price, dec!(11));
    assert!(!near.is_interpolated);

    // equidistant: the earlier point wins and is stale at four days away
    let middle = price_at(&book, &mut cache, &acme, d(2024, 3, 5), &settings);
    assert_eq!(middle.price_date, Some(d(2024, 3, 1)));
    assert!(middle.is_interpolated);
    Ok(())
}

#[test]
fn test_liability_payments_move_balance() -> Result<()> {
    let (_dir, mut conn) = create_test_db()?;
    let id = db::insert_liability(&conn, "Car loan", dec!(20000), d(2023, 1, 1))?;

    db::insert_liability_payment(&mut conn, id, d(2024, 1, 1), dec!(500), dec!(80))?;
    let second = db::insert_liability_payment(&mut conn, id, d(2024, 2, 1), dec!(500), dec!(78))?;
    assert_eq!(second.remaining_balance, dec!(19000));

    let liability = db::get_liability(&conn, id)?.unwrap();
    assert_eq!(liability.balance, dec!(19000));

    let early = db::insert_liability_payment(&mut conn, id, d(2022, 12, 1), dec!(500), dec!(0));
    let err = early.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::PaymentBeforeLiabilityStart { .. })
    ));

    let negative = db::insert_liability_payment(&mut conn, id, d(2024, 3, 1), dec!(-1), dec!(0));
    assert!(negative.is_err());
    assert_eq!(db::get_liability(&conn, id)?.unwrap().balance, dec!(19000));

    let payments = db::load_liability_payments(&conn, id)?;
    let history = balance_history(&liability, &payments, &[d(2023, 6, 1), d(2024, 1, 15), d(2024, 3, 1)]);
    assert_eq!(history[0].balance, dec!(20000));
    assert_eq!(history[0].accuracy, ReconstructionAccuracy::PrecedesPaymentHistory);
    assert_eq!(history[1].balance, dec!(19500));
    assert!(history[1].is_exact());
    assert_eq!(history[2].balance, dec!(19000));

    assert!(db::get_liability(&conn, LiabilityId(99))?.is_none());
    assert_eq!(db::list_liabilities(&conn)?.len(), 1);
    Ok(())
}
