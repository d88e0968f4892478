//! Batch price resolution across many assets.
//!
//! Assets are independent, so each one is resolved on its own blocking task
//! over a shared immutable [`PriceBook`]. Within an asset, dates are resolved
//! in chronological order with a cache owned by that task.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

use super::{price_at, PriceBook, PriceCache, PriceLookup, PriceSettings};
use crate::db::models::AssetId;

/// Resolve every requested (asset, dates) pair; lookups come back sorted by date.
pub async fn resolve_prices(
    book: Arc<PriceBook>,
    requests: Vec<(AssetId, Vec<NaiveDate>)>,
    settings: PriceSettings,
) -> Result<HashMap<AssetId, Vec<PriceLookup>>> {
    let mut join_set = JoinSet::new();

    for (asset, mut dates) in requests {
        let book = Arc::clone(&book);
        join_set.spawn_blocking(move || {
            dates.sort();
            dates.dedup();
            let mut cache = PriceCache::new();
            let lookups: Vec<PriceLookup> = dates
                .iter()
                .map(|date| price_at(book.as_ref(), &mut cache, &asset, *date, &settings))
                .collect();
            (asset, lookups)
        });
    }

    let mut results = HashMap::new();
    while let Some(joined) = join_set.join_next().await {
        let (asset, lookups) = joined.context("Price resolution task failed")?;
        debug!("Resolved {} prices for {}", lookups.len(), asset);
        results.insert(asset, lookups);
    }

    Ok(results)
}

/// Resolve one date for many assets
pub async fn resolve_prices_at(
    book: Arc<PriceBook>,
    assets: &[AssetId],
    date: NaiveDate,
    settings: PriceSettings,
) -> Result<HashMap<AssetId, PriceLookup>> {
    let requests = assets
        .iter()
        .map(|asset| (asset.clone(), vec![date]))
        .collect();

    let resolved = resolve_prices(book, requests, settings).await?;
    Ok(resolved
        .into_iter()
        .filter_map(|(asset, mut lookups)| lookups.pop().map(|lookup| (asset, lookup)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PricePoint;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn book() -> Arc<PriceBook> {
        let mut points = Vec::new();
        for (ticker, base) in [("AAA", dec!(10)), ("BBB", dec!(20)), ("CCC", dec!(30))] {
            for day in 1..=10 {
                points.push(PricePoint {
                    asset_id: AssetId::new(ticker),
                    date: date(2024, 5, day),
                    price: base + rust_decimal::Decimal::from(day),
                });
            }
        }
        Arc::new(PriceBook::from_points(points))
    }

    #[tokio::test]
    async fn test_resolves_each_asset_in_date_order() {
        let requests = vec![
            (AssetId::new("AAA"), vec![date(2024, 5, 9), date(2024, 5, 2)]),
            (AssetId::new("BBB"), vec![date(2024, 5, 5)]),
            (AssetId::new("ZZZ"), vec![date(2024, 5, 5)]),
        ];
        let results = resolve_prices(book(), requests, PriceSettings::default())
            .await
            .unwrap();

        let aaa = &results[&AssetId::new("AAA")];
        assert_eq!(aaa[0].requested, date(2024, 5, 2));
        assert_eq!(aaa[0].price, dec!(12));
        assert_eq!(aaa[1].price, dec!(19));
        assert_eq!(results[&AssetId::new("BBB")][0].price, dec!(25));
        assert!(results[&AssetId::new("ZZZ")][0].is_missing());
    }

    #[tokio::test]
    async fn test_resolve_single_date_for_many_assets() {
        let assets = vec![AssetId::new("AAA"), AssetId::new("CCC")];
        let results = resolve_prices_at(book(), &assets, date(2024, 5, 12), PriceSettings::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[&AssetId::new("CCC")].price, dec!(40));
        assert!(!results[&AssetId::new("CCC")].is_interpolated);
    }
}
