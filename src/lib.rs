//! Lotbook - portfolio ledger, tax-lot and valuation engine
//!
//! Turns an append-only transaction feed plus a price feed into historical
//! cash balances, FIFO tax lots with holding-period and ESPP disposition
//! rules, and time-weighted performance metrics. All money and quantity
//! values are exact decimals; engine functions are pure over their inputs.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod liability;
pub mod pricing;
pub mod reports;
pub mod tax;
pub mod utils;
