//! Listing filter criteria and matching.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RATINGS, TERMS};
use crate::Error;

/// Listing payload keys the filters read.
mod keys {
    pub const RATING: &str = "prosper_rating";
    pub const BORROWER_RATE: &str = "borrower_rate";
    pub const FICO_SCORE: &str = "fico_score";
    pub const DEBT_TO_INCOME: &str = "dti_wprosper_loan";
    pub const MONTHS_EMPLOYED: &str = "months_employed";
    pub const INQUIRIES_LAST6_MONTHS: &str = "inquiries_last6_months";
    pub const DELINQUENCIES_LAST7_YEARS: &str = "delinquencies_last7_years";
    pub const LISTING_AMOUNT: &str = "listing_amount";
    pub const TERM: &str = "listing_term";
    pub const EMPLOYMENT_STATUS: &str = "employment_status_description";
    pub const INCOME_RANGE: &str = "income_range_description";
    pub const LISTING_CATEGORY: &str = "listing_category_id";
}

/// An inclusive range where either bound may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<T>,
}

impl<T> Default for Range<T> {
    fn default() -> Self {
        Self { min: None, max: None }
    }
}

impl<T: Copy + PartialOrd> Range<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    /// True when neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// True unless both bounds are set and `min > max`.
    pub fn is_ordered(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Numeric view used to compare integer ranges against JSON numbers.
trait AsF64: Copy {
    fn as_f64(self) -> f64;
}

impl AsF64 for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

impl AsF64 for i64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl<T: AsF64 + PartialOrd> Range<T> {
    /// An unbounded range admits anything, including a missing attribute.
    /// A bounded range requires the attribute to be present and in range.
    fn admits(&self, value: Option<f64>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(value) = value else {
            return false;
        };
        let as_f64 = Range { min: self.min.map(AsF64::as_f64), max: self.max.map(AsF64::as_f64) };
        as_f64.contains(value)
    }
}

/// Filter criteria for a strategy.
///
/// Empty include-lists and unbounded ranges accept every listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyFilters {
    /// Accepted letter ratings.
    pub ratings: Vec<String>,
    /// Borrower rate as a fraction (0.12 == 12%).
    pub borrower_rate: Range<f64>,
    pub fico_score: Range<i64>,
    /// Debt-to-income ratio including the new loan, as a fraction.
    pub debt_to_income: Range<f64>,
    pub months_employed: Range<i64>,
    pub inquiries_last6_months: Range<i64>,
    pub delinquencies_last7_years: Range<i64>,
    pub listing_amount: Range<f64>,
    /// Accepted loan terms in months.
    pub terms: Vec<i64>,
    pub employment_statuses: Vec<String>,
    pub income_ranges: Vec<String>,
    pub listing_categories: Vec<i64>,
}

impl StrategyFilters {
    /// Check the criteria are internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for unknown ratings or terms, inverted
    /// ranges, rates outside 0..=1, and negative counts.
    pub fn validate(&self) -> Result<(), Error> {
        for rating in &self.ratings {
            if !RATINGS.contains(&rating.as_str()) {
                return Err(Error::InvalidInput(format!("unknown rating: {rating}")));
            }
        }

        for term in &self.terms {
            if !TERMS.contains(term) {
                return Err(Error::InvalidInput(format!("unsupported term: {term} months")));
            }
        }

        check_ordered("borrower rate", &self.borrower_rate)?;
        check_ordered("FICO score", &self.fico_score)?;
        check_ordered("debt-to-income", &self.debt_to_income)?;
        check_ordered("months employed", &self.months_employed)?;
        check_ordered("inquiries (6 months)", &self.inquiries_last6_months)?;
        check_ordered("delinquencies (7 years)", &self.delinquencies_last7_years)?;
        check_ordered("listing amount", &self.listing_amount)?;

        for (label, range) in [("borrower rate", &self.borrower_rate), ("debt-to-income", &self.debt_to_income)] {
            let out_of_unit = |v: f64| !(0.0..=1.0).contains(&v);
            if range.min.is_some_and(out_of_unit) || range.max.is_some_and(out_of_unit) {
                return Err(Error::InvalidInput(format!("{label} must be between 0% and 100%")));
            }
        }

        for (label, range) in [
            ("FICO score", &self.fico_score),
            ("months employed", &self.months_employed),
            ("inquiries (6 months)", &self.inquiries_last6_months),
            ("delinquencies (7 years)", &self.delinquencies_last7_years),
        ] {
            if range.min.is_some_and(|v| v < 0) || range.max.is_some_and(|v| v < 0) {
                return Err(Error::InvalidInput(format!("{label} must not be negative")));
            }
        }

        if self.listing_amount.min.is_some_and(|v| v < 0.0) || self.listing_amount.max.is_some_and(|v| v < 0.0) {
            return Err(Error::InvalidInput("listing amount must not be negative".into()));
        }

        Ok(())
    }

    /// Upper-case ratings, then sort and dedupe every include-list.
    pub fn normalized(mut self) -> Self {
        self.ratings = self.ratings.iter().map(|r| r.trim().to_uppercase()).collect();
        self.ratings.sort_by_key(|r| RATINGS.iter().position(|known| *known == r.as_str()).unwrap_or(usize::MAX));
        self.ratings.dedup();
        self.terms.sort_unstable();
        self.terms.dedup();
        self.listing_categories.sort_unstable();
        self.listing_categories.dedup();
        for list in [&mut self.employment_statuses, &mut self.income_ranges] {
            list.retain(|s| !s.trim().is_empty());
            list.sort();
            list.dedup();
        }
        self
    }

    /// True when no criterion is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether a cached listing record satisfies every criterion.
    pub fn matches(&self, listing: &Value) -> bool {
        includes_str(&self.ratings, listing, keys::RATING)
            && self.borrower_rate.admits(number(listing, keys::BORROWER_RATE))
            && self.fico_score.admits(number(listing, keys::FICO_SCORE))
            && self.debt_to_income.admits(number(listing, keys::DEBT_TO_INCOME))
            && self.months_employed.admits(number(listing, keys::MONTHS_EMPLOYED))
            && self.inquiries_last6_months.admits(number(listing, keys::INQUIRIES_LAST6_MONTHS))
            && self.delinquencies_last7_years.admits(number(listing, keys::DELINQUENCIES_LAST7_YEARS))
            && self.listing_amount.admits(number(listing, keys::LISTING_AMOUNT))
            && includes_int(&self.terms, listing, keys::TERM)
            && includes_str(&self.employment_statuses, listing, keys::EMPLOYMENT_STATUS)
            && includes_str(&self.income_ranges, listing, keys::INCOME_RANGE)
            && includes_int(&self.listing_categories, listing, keys::LISTING_CATEGORY)
    }
}

fn check_ordered<T: Copy + PartialOrd>(label: &str, range: &Range<T>) -> Result<(), Error> {
    if range.is_ordered() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("{label}: minimum is greater than maximum")))
    }
}

/// Read a numeric attribute. Strings are accepted, and banded values such as
/// `"700-719"` compare by their lower bound.
fn number(listing: &Value, key: &str) -> Option<f64> {
    match listing.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.split('-').next()?.trim().parse().ok())
        }
        _ => None,
    }
}

fn includes_str(accepted: &[String], listing: &Value, key: &str) -> bool {
    if accepted.is_empty() {
        return true;
    }
    listing
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|v| accepted.iter().any(|a| a.eq_ignore_ascii_case(v.trim())))
}

fn includes_int(accepted: &[i64], listing: &Value, key: &str) -> bool {
    if accepted.is_empty() {
        return true;
    }
    number(listing, key).is_some_and(|v| accepted.iter().any(|a| *a as f64 == v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing() -> Value {
        json!({
            "listing_number": 10_450_221,
            "prosper_rating": "B",
            "borrower_rate": 0.1549,
            "fico_score": "700-719",
            "dti_wprosper_loan": 0.28,
            "months_employed": 52,
            "inquiries_last6_months": 1,
            "delinquencies_last7_years": 0,
            "listing_amount": 12000.0,
            "listing_term": 36,
            "employment_status_description": "Employed",
            "income_range_description": "$75,000-99,999",
            "listing_category_id": 1
        })
    }

    #[test]
    fn test_range_contains() {
        let r = Range::new(Some(1), Some(3));
        assert!(r.contains(1));
        assert!(r.contains(3));
        assert!(!r.contains(4));
        assert!(Range::<i64>::default().contains(i64::MIN));
        assert!(Range::new(None, Some(5)).contains(-10));
    }

    #[test]
    fn test_range_ordering() {
        assert!(Range::new(Some(2.0), Some(2.0)).is_ordered());
        assert!(!Range::new(Some(3.0), Some(2.0)).is_ordered());
        assert!(Range::new(Some(3.0), None).is_ordered());
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let filters = StrategyFilters::default();
        assert!(filters.is_empty());
        assert!(filters.matches(&listing()));
        assert!(filters.matches(&json!({})));
    }

    #[test]
    fn test_rating_filter() {
        let filters = StrategyFilters { ratings: vec!["A".into(), "B".into()], ..Default::default() };
        assert!(filters.matches(&listing()));

        let filters = StrategyFilters { ratings: vec!["AA".into()], ..Default::default() };
        assert!(!filters.matches(&listing()));
    }

    #[test]
    fn test_rate_range() {
        let filters = StrategyFilters { borrower_rate: Range::new(Some(0.15), Some(0.20)), ..Default::default() };
        assert!(filters.matches(&listing()));

        let filters = StrategyFilters { borrower_rate: Range::new(Some(0.16), None), ..Default::default() };
        assert!(!filters.matches(&listing()));
    }

    #[test]
    fn test_banded_fico_uses_lower_bound() {
        let filters = StrategyFilters { fico_score: Range::new(Some(700), None), ..Default::default() };
        assert!(filters.matches(&listing()));

        let filters = StrategyFilters { fico_score: Range::new(Some(710), None), ..Default::default() };
        assert!(!filters.matches(&listing()));
    }

    #[test]
    fn test_missing_attribute_fails_bounded_range() {
        let filters = StrategyFilters { months_employed: Range::new(Some(12), None), ..Default::default() };
        assert!(!filters.matches(&json!({"prosper_rating": "A"})));
    }

    #[test]
    fn test_categorical_lists() {
        let filters = StrategyFilters {
            terms: vec![36],
            employment_statuses: vec!["employed".into()],
            listing_categories: vec![1, 7],
            ..Default::default()
        };
        assert!(filters.matches(&listing()));

        let filters = StrategyFilters { terms: vec![60], ..Default::default() };
        assert!(!filters.matches(&listing()));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let filters = StrategyFilters { listing_amount: Range::new(Some(10_000.0), None), ..Default::default() };
        assert!(filters.matches(&json!({"listing_amount": "15000"})));
    }

    #[test]
    fn test_validate_rejects_unknown_rating_and_term() {
        let filters = StrategyFilters { ratings: vec!["Z".into()], ..Default::default() };
        assert!(filters.validate().is_err());

        let filters = StrategyFilters { terms: vec![48], ..Default::default() };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_validate_rate_bounds() {
        let filters = StrategyFilters { borrower_rate: Range::new(Some(12.0), None), ..Default::default() };
        assert!(matches!(filters.validate(), Err(Error::InvalidInput(msg)) if msg.contains("borrower rate")));
    }

    #[test]
    fn test_validate_negative_counts() {
        let filters = StrategyFilters { inquiries_last6_months: Range::new(None, Some(-1)), ..Default::default() };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_normalized_orders_ratings_by_grade() {
        let filters = StrategyFilters {
            ratings: vec!["c".into(), "AA".into(), "C".into()],
            terms: vec![60, 36, 60],
            ..Default::default()
        }
        .normalized();
        assert_eq!(filters.ratings, vec!["AA".to_string(), "C".to_string()]);
        assert_eq!(filters.terms, vec![36, 60]);
    }

    #[test]
    fn test_serde_skips_empty_bounds() {
        let filters = StrategyFilters { fico_score: Range::new(Some(680), None), ..Default::default() };
        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(json["fico_score"], json!({"min": 680}));
        let back: StrategyFilters = serde_json::from_value(json).unwrap();
        assert_eq!(back, filters);
    }
}
