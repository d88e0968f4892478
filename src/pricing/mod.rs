// Pricing module - nearest-price resolution with staleness flagging

pub mod resolver;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::db::models::{AssetId, PricePoint};
use crate::utils::dates::days_between;

/// Tunables for price resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSettings {
    /// A point farther than this from the requested date is flagged as interpolated
    pub staleness_days: i64,
    /// History is searched within this many days on either side of the requested date
    pub lookback_days: i64,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            staleness_days: 3,
            lookback_days: 30,
        }
    }
}

/// Source of bounded price histories
pub trait PriceSource {
    /// Points for `asset` within [from, to], ascending by date
    fn history(&self, asset: &AssetId, from: NaiveDate, to: NaiveDate) -> Vec<PricePoint>;
}

/// In-memory, immutable-once-built snapshot of price histories
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    series: HashMap<AssetId, BTreeMap<NaiveDate, Decimal>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, point: PricePoint) {
        self.series
            .entry(point.asset_id)
            .or_default()
            .insert(point.date, point.price);
    }

    pub fn from_points(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut book = Self::new();
        for point in points {
            book.insert(point);
        }
        book
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.series.keys()
    }

    pub fn len(&self) -> usize {
        self.series.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PriceSource for PriceBook {
    fn history(&self, asset: &AssetId, from: NaiveDate, to: NaiveDate) -> Vec<PricePoint> {
        if from > to {
            return Vec::new();
        }
        self.series
            .get(asset)
            .map(|series| {
                series
                    .range(from..=to)
                    .map(|(date, price)| PricePoint {
                        asset_id: asset.clone(),
                        date: *date,
                        price: *price,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Result of resolving a price for an asset on a date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceLookup {
    pub asset_id: AssetId,
    pub requested: NaiveDate,
    pub price: Decimal,
    /// Date of the point used; None when no point was found
    pub price_date: Option<NaiveDate>,
    pub is_interpolated: bool,
}

impl PriceLookup {
    pub fn is_missing(&self) -> bool {
        self.price_date.is_none()
    }
}

/// Memo of lookups for a single calculation pass.
///
/// Create one per pass and drop it afterwards; nothing is shared across passes.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: HashMap<(AssetId, NaiveDate), PriceLookup>,
    hits: usize,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// Resolve the price of `asset` on `date` from the nearest point in the lookback window.
///
/// Equidistant points resolve to the earlier one. With no point in the window
/// the price is zero and the lookup is flagged as interpolated.
pub fn price_at<S: PriceSource + ?Sized>(
    source: &S,
    cache: &mut PriceCache,
    asset: &AssetId,
    date: NaiveDate,
    settings: &PriceSettings,
) -> PriceLookup {
    let key = (asset.clone(), date);
    if let Some(hit) = cache.entries.get(&key) {
        cache.hits += 1;
        return hit.clone();
    }

    let margin = Days::new(settings.lookback_days.max(0) as u64);
    let from = date.checked_sub_days(margin).unwrap_or(NaiveDate::MIN);
    let to = date.checked_add_days(margin).unwrap_or(NaiveDate::MAX);

    let nearest = source
        .history(asset, from, to)
        .into_iter()
        .min_by_key(|point| (days_between(date, point.date).abs(), point.date));

    let lookup = match nearest {
        Some(point) => {
            let distance = days_between(date, point.date).abs();
            PriceLookup {
                asset_id: asset.clone(),
                requested: date,
                price: point.price,
                price_date: Some(point.date),
                is_interpolated: distance > settings.staleness_days,
            }
        }
        None => {
            debug!("No price for {} within {} days of {}", asset, settings.lookback_days, date);
            PriceLookup {
                asset_id: asset.clone(),
                requested: date,
                price: Decimal::ZERO,
                price_date: None,
                is_interpolated: true,
            }
        }
    };

    cache.entries.insert(key, lookup.clone());
    lookup
}
