use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use super::cost_basis::{HoldingPeriod, LotBook, LotType, TaxLot};
use super::disposition::{check_disposition, DispositionCheck};
use crate::db::models::{AssetId, LotId};
use crate::error::Warning;
use crate::pricing::{price_at, PriceCache, PriceLookup, PriceSettings, PriceSource};
use crate::utils::dates::days_between;

/// Marginal rates applied to gains by holding period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxRates {
    pub short_term: Decimal,
    pub long_term: Decimal,
}

impl Default for TaxRates {
    fn default() -> Self {
        Self {
            short_term: Decimal::new(37, 2),
            long_term: Decimal::new(20, 2),
        }
    }
}

/// Gains and losses split by holding period. Losses are positive magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GainBuckets {
    pub short_term_gains: Decimal,
    pub short_term_losses: Decimal,
    pub long_term_gains: Decimal,
    pub long_term_losses: Decimal,
}

impl GainBuckets {
    pub fn add(&mut self, period: HoldingPeriod, gain: Decimal) {
        match (period, gain >= Decimal::ZERO) {
            (HoldingPeriod::ShortTerm, true) => self.short_term_gains += gain,
            (HoldingPeriod::ShortTerm, false) => self.short_term_losses += -gain,
            (HoldingPeriod::LongTerm, true) => self.long_term_gains += gain,
            (HoldingPeriod::LongTerm, false) => self.long_term_losses += -gain,
        }
    }

    pub fn net_short_term(&self) -> Decimal {
        self.short_term_gains - self.short_term_losses
    }

    pub fn net_long_term(&self) -> Decimal {
        self.long_term_gains - self.long_term_losses
    }

    pub fn net(&self) -> Decimal {
        self.net_short_term() + self.net_long_term()
    }

    /// Rates apply to gains only; losses never produce a liability.
    pub fn estimated_tax(&self, rates: &TaxRates) -> Decimal {
        self.short_term_gains * rates.short_term + self.long_term_gains * rates.long_term
    }
}

/// Unrealized position of one open lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotAnalysis {
    pub lot_id: LotId,
    pub asset_id: AssetId,
    pub lot_type: LotType,
    pub purchase_date: NaiveDate,
    pub quantity: Decimal,
    pub purchase_price: Decimal,
    pub cost_basis: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub unrealized_gain: Decimal,
    pub days_held: i64,
    pub holding_period: HoldingPeriod,
    pub price_is_interpolated: bool,
    pub bargain_element: Option<Decimal>,
    /// Outcome if the lot were sold on the analysis date (ESPP lots only)
    pub disposition: Option<DispositionCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxAnalysis {
    pub as_of: NaiveDate,
    pub rates: TaxRates,
    #[serde(flatten)]
    pub buckets: GainBuckets,
    pub total_cost_basis: Decimal,
    pub total_current_value: Decimal,
    pub total_unrealized_gain: Decimal,
    pub estimated_tax: Decimal,
    pub lots: Vec<LotAnalysis>,
    pub warnings: Vec<Warning>,
}

/// Analyze open lots against already-resolved prices.
///
/// Lots whose asset has no price are left out and reported once per asset.
pub fn analyze_lots<'a>(
    lots: impl IntoIterator<Item = &'a TaxLot>,
    prices: &HashMap<AssetId, PriceLookup>,
    as_of: NaiveDate,
    rates: TaxRates,
) -> TaxAnalysis {
    let mut buckets = GainBuckets::default();
    let mut analyses = Vec::new();
    let mut warnings = Vec::new();
    let mut missing: BTreeSet<AssetId> = BTreeSet::new();

    for lot in lots.into_iter().filter(|l| l.is_open()) {
        let lookup = match prices.get(&lot.asset_id) {
            Some(lookup) if !lookup.is_missing() => lookup,
            _ => {
                missing.insert(lot.asset_id.clone());
                continue;
            }
        };

        let cost_basis = lot.remaining_cost();
        let current_value = lot.remaining_quantity * lookup.price;
        let unrealized_gain = current_value - cost_basis;
        let holding_period = HoldingPeriod::classify(lot.purchase_date, as_of);
        buckets.add(holding_period, unrealized_gain);

        let disposition = match (lot.lot_type, lot.grant_date) {
            (LotType::Espp, Some(grant)) => match check_disposition(grant, lot.purchase_date, as_of) {
                Ok(check) => Some(check),
                Err(e) => {
                    warn!("Skipping disposition check for lot {}: {}", lot.id, e);
                    warnings.push(Warning::InvalidEquityCompensationDates {
                        asset: lot.asset_id.clone(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            _ => None,
        };

        analyses.push(LotAnalysis {
            lot_id: lot.id,
            asset_id: lot.asset_id.clone(),
            lot_type: lot.lot_type,
            purchase_date: lot.purchase_date,
            quantity: lot.remaining_quantity,
            purchase_price: lot.purchase_price,
            cost_basis,
            current_price: lookup.price,
            current_value,
            unrealized_gain,
            days_held: days_between(lot.purchase_date, as_of),
            holding_period,
            price_is_interpolated: lookup.is_interpolated,
            bargain_element: lot.bargain_element,
            disposition,
        });
    }

    for asset in missing {
        warn!("No price for {} near {}; its lots are excluded", asset, as_of);
        warnings.push(Warning::MissingPrice { asset, date: as_of });
    }

    let total_cost_basis = analyses.iter().map(|a| a.cost_basis).sum();
    let total_current_value = analyses.iter().map(|a| a.current_value).sum();
    let total_unrealized_gain = analyses.iter().map(|a| a.unrealized_gain).sum();
    let estimated_tax = buckets.estimated_tax(&rates);
    debug!("Analyzed {} open lots, estimated tax {}", analyses.len(), estimated_tax);

    TaxAnalysis {
        as_of,
        rates,
        buckets,
        total_cost_basis,
        total_current_value,
        total_unrealized_gain,
        estimated_tax,
        lots: analyses,
        warnings,
    }
}

/// Analyze every open lot of a book, resolving prices from `source` in one pass.
pub fn analyze<S: PriceSource + ?Sized>(
    book: &LotBook,
    source: &S,
    as_of: NaiveDate,
    settings: &PriceSettings,
    rates: TaxRates,
) -> TaxAnalysis {
    let mut cache = PriceCache::new();
    let prices: HashMap<AssetId, PriceLookup> = book
        .assets()
        .map(|asset| (asset.clone(), price_at(source, &mut cache, asset, as_of, settings)))
        .collect();

    let mut analysis = analyze_lots(book.open_lots(), &prices, as_of, rates);
    let mut warnings = book.warnings.clone();
    warnings.append(&mut analysis.warnings);
    analysis.warnings = warnings;
    analysis
}
