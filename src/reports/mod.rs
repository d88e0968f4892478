// Reports module - holdings, valuation series and performance analytics

pub mod performance;
pub mod portfolio;
pub mod valuation;

pub use performance::{
    summarize, year_over_year, PerformanceSettings, PerformanceSummary, YearOverYearMetric,
};
pub use portfolio::{calculate_holdings, Holding, PortfolioReport};
pub use valuation::{daily_dates, external_flow, value_series, ValuePoint, ValueSeries};
