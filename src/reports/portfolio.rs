use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::db::models::AssetId;
use crate::error::Warning;
use crate::pricing::PriceLookup;
use crate::tax::cost_basis::LotBook;

/// Aggregate of the open lots of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holding {
    pub asset_id: AssetId,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub average_cost: Decimal,
    pub lot_count: usize,
    pub current_price: Option<Decimal>,
    pub current_value: Option<Decimal>,
    pub unrealized_gain: Option<Decimal>,
    pub price_is_interpolated: bool,
}

/// Complete holdings report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioReport {
    pub holdings: Vec<Holding>,
    pub total_cost: Decimal,
    /// Sum over holdings with a price
    pub total_value: Decimal,
    pub total_unrealized_gain: Decimal,
    pub warnings: Vec<Warning>,
}

/// Roll open lots up into holdings valued at the given prices.
///
/// Holding quantity always equals the sum of its open lots' remaining quantity.
pub fn calculate_holdings(book: &LotBook, prices: &HashMap<AssetId, PriceLookup>) -> PortfolioReport {
    let mut holdings = Vec::new();
    let mut warnings = Vec::new();

    for asset in book.assets() {
        let open: Vec<_> = book.lots_for(asset).iter().filter(|l| l.is_open()).collect();
        if open.is_empty() {
            continue;
        }

        let quantity: Decimal = open.iter().map(|l| l.remaining_quantity).sum();
        let cost_basis: Decimal = open.iter().map(|l| l.remaining_cost()).sum();
        let average_cost = cost_basis / quantity;

        let priced = prices.get(asset).filter(|lookup| !lookup.is_missing());
        if priced.is_none() {
            warn!("No price for {}; holding shown at cost only", asset);
            if let Some(lookup) = prices.get(asset) {
                warnings.push(Warning::MissingPrice {
                    asset: asset.clone(),
                    date: lookup.requested,
                });
            }
        }

        let current_price = priced.map(|lookup| lookup.price);
        let current_value = current_price.map(|price| quantity * price);
        holdings.push(Holding {
            asset_id: asset.clone(),
            quantity,
            cost_basis,
            average_cost,
            lot_count: open.len(),
            current_price,
            current_value,
            unrealized_gain: current_value.map(|value| value - cost_basis),
            price_is_interpolated: priced.map(|lookup| lookup.is_interpolated).unwrap_or(true),
        });
    }

    let total_cost = holdings.iter().map(|h| h.cost_basis).sum();
    let total_value = holdings.iter().filter_map(|h| h.current_value).sum();
    let total_unrealized_gain = holdings.iter().filter_map(|h| h.unrealized_gain).sum();

    PortfolioReport {
        holdings,
        total_cost,
        total_value,
        total_unrealized_gain,
        warnings,
    }
}
