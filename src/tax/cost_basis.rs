use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::db::models::{AssetId, LotId, Transaction, TransactionKind};
use crate::error::{LedgerError, Warning};
use crate::ledger::sort_chronologically;
use crate::utils::dates::days_between;

/// Days held at which a lot becomes long-term
pub const LONG_TERM_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotType {
    Standard,
    Espp,
    Rsu,
}

impl LotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotType::Standard => "standard",
            LotType::Espp => "espp",
            LotType::Rsu => "rsu",
        }
    }

    pub fn is_equity_compensation(&self) -> bool {
        matches!(self, LotType::Espp | LotType::Rsu)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingPeriod {
    ShortTerm,
    LongTerm,
}

impl HoldingPeriod {
    /// Long-term from exactly 365 days held.
    pub fn classify(acquired: NaiveDate, as_of: NaiveDate) -> Self {
        if days_between(acquired, as_of) >= LONG_TERM_DAYS {
            HoldingPeriod::LongTerm
        } else {
            HoldingPeriod::ShortTerm
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HoldingPeriod::ShortTerm => "short",
            HoldingPeriod::LongTerm => "long",
        }
    }
}

/// A discrete acquisition tracked for cost basis and holding period.
///
/// `remaining_quantity == quantity - sold_quantity` always holds; drained lots
/// stay in the book for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLot {
    pub id: LotId,
    pub asset_id: AssetId,
    pub quantity: Decimal,
    pub purchase_price: Decimal,
    pub purchase_date: NaiveDate,
    pub sold_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub lot_type: LotType,
    pub grant_date: Option<NaiveDate>,
    pub bargain_element: Option<Decimal>,
}

impl TaxLot {
    pub fn new(
        id: LotId,
        asset_id: AssetId,
        quantity: Decimal,
        purchase_price: Decimal,
        purchase_date: NaiveDate,
        lot_type: LotType,
    ) -> Self {
        Self {
            id,
            asset_id,
            quantity,
            purchase_price,
            purchase_date,
            sold_quantity: Decimal::ZERO,
            remaining_quantity: quantity,
            lot_type,
            grant_date: None,
            bargain_element: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.remaining_quantity > Decimal::ZERO
    }

    /// Cost of the shares still held
    pub fn remaining_cost(&self) -> Decimal {
        self.remaining_quantity * self.purchase_price
    }

    fn consume(&mut self, quantity: Decimal) {
        self.sold_quantity += quantity;
        self.remaining_quantity = self.quantity - self.sold_quantity;
    }

    fn apply_split(&mut self, ratio: Decimal) {
        self.quantity *= ratio;
        self.sold_quantity *= ratio;
        self.remaining_quantity = self.quantity - self.sold_quantity;
        self.purchase_price /= ratio;
    }
}

/// A lot slice consumed by a disposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedLot {
    pub lot_id: LotId,
    pub lot_type: LotType,
    pub purchase_date: NaiveDate,
    pub grant_date: Option<NaiveDate>,
    pub quantity: Decimal,
    pub cost: Decimal,
    pub proceeds: Decimal,
    /// Proceeds net of this slice's share of fees, minus cost
    pub gain: Decimal,
    pub holding_period: HoldingPeriod,
}

/// Cost basis result for a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleCostBasis {
    pub asset_id: AssetId,
    pub sale_date: NaiveDate,
    pub quantity: Decimal,
    pub sale_price: Decimal,
    pub fees: Decimal,
    /// quantity x price - fees
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub realized_gain: Decimal,
    pub matched_lots: Vec<MatchedLot>,
}

/// FIFO matcher for calculating cost basis of disposals of one asset
#[derive(Debug, Clone)]
pub struct FifoMatcher {
    asset_id: AssetId,
    lots: Vec<TaxLot>,
}

impl FifoMatcher {
    pub fn new(asset_id: AssetId) -> Self {
        Self {
            asset_id,
            lots: Vec::new(),
        }
    }

    pub fn add_lot(&mut self, lot: TaxLot) {
        self.lots.push(lot);
        self.lots.sort_by_key(|l| l.purchase_date);
    }

    pub fn lots(&self) -> &[TaxLot] {
        &self.lots
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.lots.iter().map(|l| l.remaining_quantity).sum()
    }

    /// Multiply every lot's quantities by `ratio`; cost basis is unchanged.
    pub fn apply_split(&mut self, ratio: Decimal) -> Result<(), LedgerError> {
        if ratio <= Decimal::ZERO {
            return Err(LedgerError::ValidationError(format!(
                "split ratio must be positive, got {}",
                ratio
            )));
        }
        for lot in &mut self.lots {
            lot.apply_split(ratio);
        }
        Ok(())
    }

    /// Consume open lots oldest-first, returning the slices taken.
    fn drain(&mut self, date: NaiveDate, quantity: Decimal) -> Result<Vec<(TaxLot, Decimal)>, LedgerError> {
        let available = self.remaining_quantity();
        if quantity > available {
            return Err(LedgerError::InsufficientLots {
                asset: self.asset_id.clone(),
                date,
                requested: quantity,
                available,
            });
        }

        let mut left = quantity;
        let mut taken = Vec::new();
        for lot in self.lots.iter_mut().filter(|l| l.is_open()) {
            if left <= Decimal::ZERO {
                break;
            }
            let slice = left.min(lot.remaining_quantity);
            lot.consume(slice);
            left -= slice;
            taken.push((lot.clone(), slice));
        }
        Ok(taken)
    }

    /// Remove shares without realizing a gain (e.g. transfer out)
    pub fn transfer_out(&mut self, date: NaiveDate, quantity: Decimal) -> Result<Decimal, LedgerError> {
        let taken = self.drain(date, quantity)?;
        Ok(taken
            .iter()
            .map(|(lot, slice)| *slice * lot.purchase_price)
            .sum())
    }

    /// Match a sale against the oldest open lots
    pub fn match_sale(
        &mut self,
        sale_date: NaiveDate,
        quantity: Decimal,
        sale_price: Decimal,
        fees: Decimal,
    ) -> Result<SaleCostBasis, LedgerError> {
        let taken = self.drain(sale_date, quantity)?;

        let mut fees_left = fees;
        let slice_count = taken.len();
        let mut matched_lots = Vec::with_capacity(slice_count);
        for (idx, (lot, slice)) in taken.into_iter().enumerate() {
            let fee_share = if idx + 1 == slice_count {
                fees_left
            } else {
                fees * slice / quantity
            };
            fees_left -= fee_share;

            let cost = slice * lot.purchase_price;
            let proceeds = slice * sale_price;
            matched_lots.push(MatchedLot {
                lot_id: lot.id,
                lot_type: lot.lot_type,
                purchase_date: lot.purchase_date,
                grant_date: lot.grant_date,
                quantity: slice,
                cost,
                proceeds,
                gain: proceeds - fee_share - cost,
                holding_period: HoldingPeriod::classify(lot.purchase_date, sale_date),
            });
        }

        let cost_basis: Decimal = matched_lots.iter().map(|m| m.cost).sum();
        let proceeds = quantity * sale_price - fees;

        Ok(SaleCostBasis {
            asset_id: self.asset_id.clone(),
            sale_date,
            quantity,
            sale_price,
            fees,
            proceeds,
            cost_basis,
            realized_gain: proceeds - cost_basis,
            matched_lots,
        })
    }
}

/// Lots and realized sales for every asset of a feed
#[derive(Debug, Clone, Default)]
pub struct LotBook {
    matchers: BTreeMap<AssetId, FifoMatcher>,
    pub sales: Vec<SaleCostBasis>,
    pub warnings: Vec<Warning>,
}

impl LotBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay the feed in chronological order, stopping after `as_of` when given.
    pub fn from_transactions(
        transactions: &[Transaction],
        as_of: Option<NaiveDate>,
    ) -> Result<Self, LedgerError> {
        let mut book = Self::new();
        for tx in sort_chronologically(transactions) {
            if as_of.is_some_and(|d| tx.date > d) {
                break;
            }
            book.apply(tx)?;
        }
        Ok(book)
    }

    fn matcher(&mut self, asset: &AssetId) -> &mut FifoMatcher {
        self.matchers
            .entry(asset.clone())
            .or_insert_with(|| FifoMatcher::new(asset.clone()))
    }

    fn require_asset(tx: &Transaction) -> Result<AssetId, LedgerError> {
        tx.asset_id.clone().ok_or_else(|| {
            LedgerError::ValidationError(format!("{} transaction {} has no asset", tx.kind, tx.id))
        })
    }

    /// Apply one transaction to the lots of its asset
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let lot_id = LotId(tx.id.0);
        match &tx.kind {
            TransactionKind::Buy | TransactionKind::Reinvestment | TransactionKind::TransferIn => {
                let asset = Self::require_asset(tx)?;
                let lot = TaxLot::new(lot_id, asset.clone(), tx.quantity, tx.price, tx.date, LotType::Standard);
                self.matcher(&asset).add_lot(lot);
            }
            TransactionKind::EsppPurchase {
                grant_date,
                discount_percent,
            } => {
                let asset = Self::require_asset(tx)?;
                let mut lot = TaxLot::new(lot_id, asset.clone(), tx.quantity, tx.price, tx.date, LotType::Espp);
                lot.grant_date = Some(*grant_date);
                lot.bargain_element = espp_bargain_element(tx.price, *discount_percent, tx.quantity);
                self.matcher(&asset).add_lot(lot);
            }
            TransactionKind::RsuVest {
                grant_date,
                vesting_date,
                shares_withheld,
            } => {
                let asset = Self::require_asset(tx)?;
                let net = tx.quantity - *shares_withheld;
                if net < Decimal::ZERO {
                    return Err(LedgerError::ValidationError(format!(
                        "rsu_vest {} withholds {} of {} shares",
                        tx.id, shares_withheld, tx.quantity
                    )));
                }
                let mut lot = TaxLot::new(lot_id, asset.clone(), net, tx.price, *vesting_date, LotType::Rsu);
                lot.grant_date = *grant_date;
                self.matcher(&asset).add_lot(lot);
            }
            TransactionKind::Sell => {
                let asset = Self::require_asset(tx)?;
                let sale = self
                    .matcher(&asset)
                    .match_sale(tx.date, tx.quantity, tx.price, tx.fees)?;
                debug!(
                    "Sale of {} {} on {} realized {}",
                    sale.quantity, asset, sale.sale_date, sale.realized_gain
                );
                self.sales.push(sale);
            }
            TransactionKind::TransferOut => {
                let asset = Self::require_asset(tx)?;
                self.matcher(&asset).transfer_out(tx.date, tx.quantity)?;
            }
            TransactionKind::Split { ratio } => {
                let asset = Self::require_asset(tx)?;
                self.matcher(&asset).apply_split(*ratio)?;
            }
            TransactionKind::Spinoff | TransactionKind::Merger => {
                let asset = Self::require_asset(tx)?;
                warn!("{} {} for {} is not applied to lots", tx.kind, tx.id, asset);
                self.warnings.push(Warning::UnsupportedLotEvent {
                    transaction: tx.id,
                    asset,
                    kind: tx.kind.as_str().to_string(),
                });
            }
            TransactionKind::Dividend
            | TransactionKind::Interest
            | TransactionKind::Fee
            | TransactionKind::Tax
            | TransactionKind::Deposit
            | TransactionKind::Withdrawal
            | TransactionKind::LiabilityPayment
            | TransactionKind::Unrecognized { .. } => {}
        }
        Ok(())
    }

    /// Every lot, open or drained, grouped by asset in purchase order
    pub fn lots(&self) -> impl Iterator<Item = &TaxLot> {
        self.matchers.values().flat_map(|m| m.lots().iter())
    }

    pub fn open_lots(&self) -> impl Iterator<Item = &TaxLot> {
        self.lots().filter(|l| l.is_open())
    }

    pub fn lots_for(&self, asset: &AssetId) -> &[TaxLot] {
        self.matchers.get(asset).map(|m| m.lots()).unwrap_or(&[])
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.matchers.keys()
    }

    /// Open quantity of an asset
    pub fn quantity(&self, asset: &AssetId) -> Decimal {
        self.matchers
            .get(asset)
            .map(FifoMatcher::remaining_quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

/// (FMV - purchase price) x quantity, where FMV = price / (1 - discount%).
fn espp_bargain_element(price: Decimal, discount_percent: Decimal, quantity: Decimal) -> Option<Decimal> {
    let hundred = Decimal::ONE_HUNDRED;
    if discount_percent <= Decimal::ZERO || discount_percent >= hundred {
        return None;
    }
    let fair_market_value = price * hundred / (hundred - discount_percent);
    Some((fair_market_value - price) * quantity)
}
