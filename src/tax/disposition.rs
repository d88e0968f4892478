//! Qualifying/disqualifying disposition checks for equity compensation shares.
//!
//! A disposition qualifies only when the sale falls strictly after both
//! anniversaries: two years from grant and one year from purchase. The
//! anniversary day itself is not enough. This is independent of the general
//! 365-day holding period used for lot classification.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::LedgerError;
use crate::utils::dates::{is_strictly_after, years_after};

pub const GRANT_HOLDING_YEARS: u32 = 2;
pub const PURCHASE_HOLDING_YEARS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionReason {
    BothUnmet,
    GrantOnlyUnmet,
    PurchaseOnlyUnmet,
    Qualifying,
}

impl DispositionReason {
    fn from_requirements(meets_grant: bool, meets_purchase: bool) -> Self {
        match (meets_grant, meets_purchase) {
            (false, false) => DispositionReason::BothUnmet,
            (false, true) => DispositionReason::GrantOnlyUnmet,
            (true, false) => DispositionReason::PurchaseOnlyUnmet,
            (true, true) => DispositionReason::Qualifying,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispositionReason::BothUnmet => "both_unmet",
            DispositionReason::GrantOnlyUnmet => "grant_only_unmet",
            DispositionReason::PurchaseOnlyUnmet => "purchase_only_unmet",
            DispositionReason::Qualifying => "qualifying",
        }
    }

    /// Human-readable consequence of selling under this outcome
    pub fn tax_implication(&self) -> &'static str {
        match self {
            DispositionReason::Qualifying => {
                "Qualifying disposition: the gain above the discount is taxed at long-term capital gains rates."
            }
            DispositionReason::BothUnmet => {
                "Disqualifying disposition: held less than 2 years from grant and 1 year from purchase. The bargain element is taxed as ordinary income."
            }
            DispositionReason::GrantOnlyUnmet => {
                "Disqualifying disposition: held less than 2 years from grant. The bargain element is taxed as ordinary income."
            }
            DispositionReason::PurchaseOnlyUnmet => {
                "Disqualifying disposition: held less than 1 year from purchase. The bargain element is taxed as ordinary income."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispositionCheck {
    pub grant_date: NaiveDate,
    pub purchase_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub two_years_from_grant: NaiveDate,
    pub one_year_from_purchase: NaiveDate,
    pub meets_grant_requirement: bool,
    pub meets_purchase_requirement: bool,
    pub is_qualifying: bool,
    pub reason: DispositionReason,
    pub tax_implication: String,
}

/// Evaluate a sale of equity compensation shares.
///
/// Requires `grant < purchase <= sell`; anything else is rejected.
pub fn check_disposition(
    grant_date: NaiveDate,
    purchase_date: NaiveDate,
    sell_date: NaiveDate,
) -> Result<DispositionCheck, LedgerError> {
    if grant_date >= purchase_date {
        return Err(LedgerError::GrantNotBeforePurchase {
            grant: grant_date,
            purchase: purchase_date,
        });
    }
    if sell_date < purchase_date {
        return Err(LedgerError::SellBeforePurchase {
            sell: sell_date,
            purchase: purchase_date,
        });
    }

    let two_years_from_grant = years_after(grant_date, GRANT_HOLDING_YEARS)?;
    let one_year_from_purchase = years_after(purchase_date, PURCHASE_HOLDING_YEARS)?;

    let meets_grant_requirement = is_strictly_after(sell_date, two_years_from_grant);
    let meets_purchase_requirement = is_strictly_after(sell_date, one_year_from_purchase);
    let reason = DispositionReason::from_requirements(meets_grant_requirement, meets_purchase_requirement);

    Ok(DispositionCheck {
        grant_date,
        purchase_date,
        sell_date,
        two_years_from_grant,
        one_year_from_purchase,
        meets_grant_requirement,
        meets_purchase_requirement,
        is_qualifying: reason == DispositionReason::Qualifying,
        reason,
        tax_implication: reason.tax_implication().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_grant_requirement_unmet() {
        let check = check_disposition(date(2023, 6, 1), date(2023, 12, 1), date(2024, 12, 15)).unwrap();
        assert!(!check.meets_grant_requirement);
        assert!(check.meets_purchase_requirement);
        assert!(!check.is_qualifying);
        assert_eq!(check.reason, DispositionReason::GrantOnlyUnmet);
        assert_eq!(check.two_years_from_grant, date(2025, 6, 1));
        assert_eq!(check.one_year_from_purchase, date(2024, 12, 1));
    }

    #[test]
    fn test_anniversary_day_is_not_enough() {
        let on_anniversary = check_disposition(date(2022, 1, 10), date(2022, 6, 30), date(2024, 1, 10)).unwrap();
        assert!(!on_anniversary.meets_grant_requirement);

        let day_after = check_disposition(date(2022, 1, 10), date(2022, 6, 30), date(2024, 1, 11)).unwrap();
        assert!(day_after.meets_grant_requirement);
        assert!(day_after.is_qualifying);
        assert_eq!(day_after.reason, DispositionReason::Qualifying);
    }

    #[test]
    fn test_purchase_anniversary_is_exclusive() {
        let check = check_disposition(date(2020, 1, 1), date(2023, 3, 15), date(2024, 3, 15)).unwrap();
        assert!(check.meets_grant_requirement);
        assert!(!check.meets_purchase_requirement);
        assert_eq!(check.reason, DispositionReason::PurchaseOnlyUnmet);
    }

    #[test]
    fn test_both_unmet() {
        let check = check_disposition(date(2024, 1, 1), date(2024, 6, 1), date(2024, 7, 1)).unwrap();
        assert_eq!(check.reason, DispositionReason::BothUnmet);
        assert!(check.tax_implication.contains("ordinary income"));
    }

    #[test]
    fn test_leap_day_grant() {
        // Two years after 2024-02-29 is 2026-02-28
        let check = check_disposition(date(2024, 2, 29), date(2024, 8, 30), date(2026, 3, 1)).unwrap();
        assert_eq!(check.two_years_from_grant, date(2026, 2, 28));
        assert!(check.meets_grant_requirement);
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        assert!(matches!(
            check_disposition(date(2024, 1, 1), date(2024, 1, 1), date(2025, 1, 1)),
            Err(LedgerError::GrantNotBeforePurchase { .. })
        ));
        assert!(matches!(
            check_disposition(date(2023, 1, 1), date(2024, 1, 1), date(2023, 12, 31)),
            Err(LedgerError::SellBeforePurchase { .. })
        ));
        // selling on the purchase date is allowed
        assert!(check_disposition(date(2023, 1, 1), date(2024, 1, 1), date(2024, 1, 1)).is_ok());
    }
}
