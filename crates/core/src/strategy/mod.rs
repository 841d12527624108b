//! Investment strategies: named listing filters plus a per-note target amount.
//!
//! Strategies are only ever mutated by user action. The filter criteria are
//! stored as a single JSON document so new criteria can be added without a
//! schema migration.

mod filters;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

pub use filters::{Range, StrategyFilters};

/// Smallest amount the marketplace accepts for a single note.
pub const MIN_TARGET_AMOUNT: i64 = 25;

/// Default target amount for a new strategy.
pub const DEFAULT_TARGET_AMOUNT: i64 = MIN_TARGET_AMOUNT;

/// Maximum length of a strategy name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Letter ratings the marketplace assigns to listings, best first.
pub const RATINGS: &[&str] = &["AA", "A", "B", "C", "D", "E", "HR"];

/// Loan terms in months.
pub const TERMS: &[i64] = &[12, 36, 60];

/// A persisted strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: i64,
    pub name: String,
    pub target_amount: i64,
    pub active: bool,
    pub filters: StrategyFilters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-supplied fields for creating or replacing a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStrategy {
    pub name: String,
    #[serde(default = "default_target_amount")]
    pub target_amount: i64,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub filters: StrategyFilters,
}

fn default_target_amount() -> i64 {
    DEFAULT_TARGET_AMOUNT
}

impl NewStrategy {
    /// Create an inactive strategy with the default target amount and no filters.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_amount: DEFAULT_TARGET_AMOUNT,
            active: false,
            filters: StrategyFilters::default(),
        }
    }

    /// Validate user input before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("name must not be empty".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::InvalidInput(format!("name must be at most {MAX_NAME_LEN} characters")));
        }

        if self.target_amount < MIN_TARGET_AMOUNT {
            return Err(Error::InvalidInput(format!("target amount must be at least ${MIN_TARGET_AMOUNT}")));
        }

        self.filters.validate()
    }

    /// Trim the name and normalize filter lists.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.filters = self.filters.normalized();
        self
    }
}

impl From<&Strategy> for NewStrategy {
    fn from(strategy: &Strategy) -> Self {
        Self {
            name: strategy.name.clone(),
            target_amount: strategy.target_amount,
            active: strategy.active,
            filters: strategy.filters.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_defaults() {
        let s = NewStrategy::named("Prime");
        assert_eq!(s.target_amount, 25);
        assert!(!s.active);
        assert_eq!(s.filters, StrategyFilters::default());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_blank_name_rejected() {
        let s = NewStrategy::named("   ");
        assert!(matches!(s.validate(), Err(Error::InvalidInput(msg)) if msg.contains("name")));
    }

    #[test]
    fn test_long_name_rejected() {
        let s = NewStrategy::named("x".repeat(MAX_NAME_LEN + 1));
        assert!(s.validate().is_err());

        let s = NewStrategy::named("x".repeat(MAX_NAME_LEN));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_target_amount_minimum() {
        let s = NewStrategy { target_amount: 24, ..NewStrategy::named("Small") };
        assert!(matches!(s.validate(), Err(Error::InvalidInput(msg)) if msg.contains("target amount")));
    }

    #[test]
    fn test_filter_errors_surface() {
        let mut s = NewStrategy::named("Bad rates");
        s.filters.borrower_rate = Range::new(Some(0.2), Some(0.1));
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let s: NewStrategy = serde_json::from_str(r#"{"name":"Bare"}"#).unwrap();
        assert_eq!(s.target_amount, DEFAULT_TARGET_AMOUNT);
        assert!(!s.active);
    }

    #[test]
    fn test_normalized_trims_name() {
        let s = NewStrategy::named("  Prime  ").normalized();
        assert_eq!(s.name, "Prime");
    }
}
