// Tax module - FIFO lots, holding periods, ESPP dispositions, gain estimates

pub mod analysis;
pub mod cost_basis;
pub mod disposition;
pub mod realized;

pub use analysis::{analyze, analyze_lots, GainBuckets, LotAnalysis, TaxAnalysis, TaxRates};
pub use cost_basis::{FifoMatcher, HoldingPeriod, LotBook, LotType, MatchedLot, SaleCostBasis, TaxLot};
pub use disposition::{check_disposition, DispositionCheck, DispositionReason};
pub use realized::{realized_gains_by_year, realized_gains_for_year, RealizedGainsReport};
