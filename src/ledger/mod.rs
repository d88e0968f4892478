// Ledger module - cash impact classification and balance replay

pub mod cash;

pub use cash::{
    balance_at, balance_series, cash_impact, is_cash_affecting, sort_chronologically,
    BalancePoint, CashBalance, CashSeries,
};
