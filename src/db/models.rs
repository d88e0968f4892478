use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

string_id!(
    /// Portfolio identifier
    PortfolioId
);
string_id!(
    /// Asset identifier (ticker or internal code)
    AssetId
);
numeric_id!(
    /// Transaction identifier; also the insertion order of the feed
    TransactionId
);
numeric_id!(
    /// Tax lot identifier (the id of the transaction that opened it)
    LotId
);
numeric_id!(LiabilityId);

/// Kind of a portfolio transaction.
///
/// Kind-specific data lives in the variant. `Unrecognized` carries feed
/// labels outside the known set so they can be reported instead of dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKind {
    Buy,
    Sell,
    Dividend,
    Interest,
    Fee,
    Tax,
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
    Split {
        /// New shares per old share (2 for a 2:1 split)
        ratio: Decimal,
    },
    Spinoff,
    Merger,
    Reinvestment,
    EsppPurchase {
        grant_date: NaiveDate,
        /// Discount on fair market value, as a percentage (15 = 15%)
        discount_percent: Decimal,
    },
    RsuVest {
        grant_date: Option<NaiveDate>,
        vesting_date: NaiveDate,
        shares_withheld: Decimal,
    },
    LiabilityPayment,
    Unrecognized {
        label: String,
    },
}

/// Optional per-kind columns, as stored alongside a kind label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindDetails {
    pub grant_date: Option<NaiveDate>,
    pub vesting_date: Option<NaiveDate>,
    pub discount_percent: Option<Decimal>,
    pub shares_withheld: Option<Decimal>,
    pub split_ratio: Option<Decimal>,
}

impl TransactionKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionKind::Buy => "buy",
            TransactionKind::Sell => "sell",
            TransactionKind::Dividend => "dividend",
            TransactionKind::Interest => "interest",
            TransactionKind::Fee => "fee",
            TransactionKind::Tax => "tax",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::Split { .. } => "split",
            TransactionKind::Spinoff => "spinoff",
            TransactionKind::Merger => "merger",
            TransactionKind::Reinvestment => "reinvestment",
            TransactionKind::EsppPurchase { .. } => "espp_purchase",
            TransactionKind::RsuVest { .. } => "rsu_vest",
            TransactionKind::LiabilityPayment => "liability_payment",
            TransactionKind::Unrecognized { label } => label,
        }
    }

    /// Build a kind from its stored label and optional detail columns.
    ///
    /// Unknown labels become `Unrecognized`; known labels missing required
    /// details are a parse error.
    pub fn from_label(label: &str, details: KindDetails) -> Result<Self, LedgerError> {
        let normalized = label.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match normalized.as_str() {
            "buy" => TransactionKind::Buy,
            "sell" => TransactionKind::Sell,
            "dividend" => TransactionKind::Dividend,
            "interest" => TransactionKind::Interest,
            "fee" => TransactionKind::Fee,
            "tax" => TransactionKind::Tax,
            "deposit" => TransactionKind::Deposit,
            "withdrawal" => TransactionKind::Withdrawal,
            "transfer_in" => TransactionKind::TransferIn,
            "transfer_out" => TransactionKind::TransferOut,
            "split" => TransactionKind::Split {
                ratio: details.split_ratio.ok_or_else(|| {
                    LedgerError::ParseError("split requires a ratio".to_string())
                })?,
            },
            "spinoff" => TransactionKind::Spinoff,
            "merger" => TransactionKind::Merger,
            "reinvestment" => TransactionKind::Reinvestment,
            "espp_purchase" => TransactionKind::EsppPurchase {
                grant_date: details.grant_date.ok_or_else(|| {
                    LedgerError::ParseError("espp_purchase requires a grant date".to_string())
                })?,
                discount_percent: details.discount_percent.unwrap_or(Decimal::ZERO),
            },
            "rsu_vest" => TransactionKind::RsuVest {
                grant_date: details.grant_date,
                vesting_date: details.vesting_date.ok_or_else(|| {
                    LedgerError::ParseError("rsu_vest requires a vesting date".to_string())
                })?,
                shares_withheld: details.shares_withheld.unwrap_or(Decimal::ZERO),
            },
            "liability_payment" => TransactionKind::LiabilityPayment,
            _ => TransactionKind::Unrecognized {
                label: label.trim().to_string(),
            },
        };
        Ok(kind)
    }

    /// Kinds that open, close or rescale tax lots and so need an asset
    pub fn affects_lots(&self) -> bool {
        matches!(
            self,
            TransactionKind::Buy
                | TransactionKind::Sell
                | TransactionKind::TransferIn
                | TransactionKind::TransferOut
                | TransactionKind::Split { .. }
                | TransactionKind::Spinoff
                | TransactionKind::Merger
                | TransactionKind::Reinvestment
                | TransactionKind::EsppPurchase { .. }
                | TransactionKind::RsuVest { .. }
        )
    }

    /// Detail columns for persistence
    pub fn details(&self) -> KindDetails {
        match self {
            TransactionKind::Split { ratio } => KindDetails {
                split_ratio: Some(*ratio),
                ..KindDetails::default()
            },
            TransactionKind::EsppPurchase {
                grant_date,
                discount_percent,
            } => KindDetails {
                grant_date: Some(*grant_date),
                discount_percent: Some(*discount_percent),
                ..KindDetails::default()
            },
            TransactionKind::RsuVest {
                grant_date,
                vesting_date,
                shares_withheld,
            } => KindDetails {
                grant_date: *grant_date,
                vesting_date: Some(*vesting_date),
                shares_withheld: Some(*shares_withheld),
                ..KindDetails::default()
            },
            _ => KindDetails::default(),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable portfolio transaction.
///
/// Pure cash events (dividend, interest, fee, tax, deposit, withdrawal,
/// liability payment) store their amount in `price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub portfolio_id: PortfolioId,
    pub asset_id: Option<AssetId>,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub fees: Decimal,
    pub currency: String,
}

impl Transaction {
    /// A transaction with zero amounts in USD; fill in the rest with the `with_*` helpers.
    pub fn new(
        id: i64,
        portfolio_id: PortfolioId,
        kind: TransactionKind,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId(id),
            portfolio_id,
            asset_id: None,
            kind,
            date,
            quantity: Decimal::ZERO,
            price: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            fees: Decimal::ZERO,
            currency: "USD".to_string(),
        }
    }

    pub fn with_asset(mut self, asset_id: AssetId) -> Self {
        self.asset_id = Some(asset_id);
        self
    }

    /// Set quantity, unit price and fees; total_amount becomes quantity x price.
    pub fn with_trade(mut self, quantity: Decimal, price: Decimal, fees: Decimal) -> Self {
        self.quantity = quantity;
        self.price = price;
        self.fees = fees;
        self.total_amount = quantity * price;
        self
    }

    /// Set the amount of a pure cash event
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.price = amount;
        self.total_amount = amount;
        self
    }
}

/// Price history point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub asset_id: AssetId,
    pub date: NaiveDate,
    pub price: Decimal,
}

/// Liability with its current balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liability {
    pub id: LiabilityId,
    pub name: String,
    pub balance: Decimal,
    pub start_date: NaiveDate,
}

/// Recorded payment against a liability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiabilityPayment {
    pub date: NaiveDate,
    pub principal_paid: Decimal,
    pub interest_paid: Decimal,
    pub remaining_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_label_roundtrip() {
        let kinds = [
            TransactionKind::Buy,
            TransactionKind::Sell,
            TransactionKind::Dividend,
            TransactionKind::Interest,
            TransactionKind::Fee,
            TransactionKind::Tax,
            TransactionKind::Deposit,
            TransactionKind::Withdrawal,
            TransactionKind::TransferIn,
            TransactionKind::TransferOut,
            TransactionKind::Split { ratio: dec!(2) },
            TransactionKind::Spinoff,
            TransactionKind::Merger,
            TransactionKind::Reinvestment,
            TransactionKind::EsppPurchase {
                grant_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                discount_percent: dec!(15),
            },
            TransactionKind::RsuVest {
                grant_date: None,
                vesting_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                shares_withheld: dec!(3),
            },
            TransactionKind::LiabilityPayment,
        ];
        for kind in kinds {
            let parsed = TransactionKind::from_label(kind.as_str(), kind.details()).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_kind_from_label_accepts_variants_of_spelling() {
        assert_eq!(
            TransactionKind::from_label(" Transfer-In ", KindDetails::default()).unwrap(),
            TransactionKind::TransferIn
        );
        assert_eq!(
            TransactionKind::from_label("BUY", KindDetails::default()).unwrap(),
            TransactionKind::Buy
        );
    }

    #[test]
    fn test_unknown_label_is_kept_as_unrecognized() {
        let kind = TransactionKind::from_label("airdrop", KindDetails::default()).unwrap();
        assert_eq!(
            kind,
            TransactionKind::Unrecognized {
                label: "airdrop".to_string()
            }
        );
        assert_eq!(kind.as_str(), "airdrop");
    }

    #[test]
    fn test_kind_missing_required_details_is_error() {
        assert!(TransactionKind::from_label("split", KindDetails::default()).is_err());
        assert!(TransactionKind::from_label("espp_purchase", KindDetails::default()).is_err());
        assert!(TransactionKind::from_label("rsu_vest", KindDetails::default()).is_err());
    }

    #[test]
    fn test_lot_kinds_need_an_asset() {
        assert!(TransactionKind::Sell.affects_lots());
        assert!(TransactionKind::Split { ratio: dec!(2) }.affects_lots());
        assert!(!TransactionKind::Deposit.affects_lots());
        assert!(!TransactionKind::Dividend.affects_lots());
        assert!(!TransactionKind::Unrecognized {
            label: "rebate".to_string()
        }
        .affects_lots());
    }

    #[test]
    fn test_transaction_serializes_decimals_as_strings() {
        let tx = Transaction::new(
            1,
            PortfolioId::new("main"),
            TransactionKind::Buy,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )
        .with_asset(AssetId::new("AAPL"))
        .with_trade(dec!(10), dec!(100.0000000001), dec!(5));

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["kind"], "buy");
        assert_eq!(json["price"], "100.0000000001");
        assert_eq!(json["asset_id"], "AAPL");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(AssetId::new("VTI").to_string(), "VTI");
        assert_eq!(TransactionId(7).to_string(), "#7");
    }
}
