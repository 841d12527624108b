//! Strategy form translation.
//!
//! HTML forms submit every field as text. Blank inputs mean "no limit" and
//! become `None`; rates and debt-to-income are entered as percentages and
//! stored as fractions.

use lendboard_core::strategy::{DEFAULT_TARGET_AMOUNT, RATINGS, TERMS};
use lendboard_core::{NewStrategy, Range, Strategy, StrategyFilters};
use serde::{Deserialize, Serialize};

/// Raw strategy form fields, as submitted and as re-rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyForm {
    pub name: String,
    pub target_amount: String,
    /// Checkbox; present only when checked.
    pub active: Option<String>,
    pub ratings: Vec<String>,
    pub terms: Vec<String>,
    pub borrower_rate_min: String,
    pub borrower_rate_max: String,
    pub fico_score_min: String,
    pub fico_score_max: String,
    pub debt_to_income_min: String,
    pub debt_to_income_max: String,
    pub months_employed_min: String,
    pub months_employed_max: String,
    pub inquiries_last6_months_min: String,
    pub inquiries_last6_months_max: String,
    pub delinquencies_last7_years_min: String,
    pub delinquencies_last7_years_max: String,
    pub listing_amount_min: String,
    pub listing_amount_max: String,
    /// Semicolon separated; income ranges contain commas.
    pub employment_statuses: String,
    /// Semicolon separated.
    pub income_ranges: String,
    /// Comma separated integers.
    pub listing_categories: String,
}

/// One min/max row of the form's range table.
#[derive(Debug, Serialize)]
pub struct RangeRow<'a> {
    pub label: &'static str,
    pub field: &'static str,
    pub unit: &'static str,
    pub min: &'a str,
    pub max: &'a str,
}

/// Blank -> `None`, otherwise an integer.
pub fn nullable_int(value: &str, label: &str) -> Result<Option<i64>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .replace(',', "")
        .parse()
        .map(Some)
        .map_err(|_| format!("{label}: \"{value}\" is not a whole number"))
}

/// Blank -> `None`, otherwise a number. A trailing `%` or leading `$` is ignored.
pub fn nullable_float(value: &str, label: &str) -> Result<Option<f64>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let cleaned = value.trim_start_matches('$').trim_end_matches('%').replace(',', "");
    match cleaned.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(format!("{label}: \"{value}\" is not a number")),
    }
}

fn percent_range(min: &str, max: &str, label: &str) -> Result<Range<f64>, String> {
    let to_fraction = |v: Option<f64>| v.map(|p| p / 100.0);
    Ok(Range::new(to_fraction(nullable_float(min, label)?), to_fraction(nullable_float(max, label)?)))
}

fn int_range(min: &str, max: &str, label: &str) -> Result<Range<i64>, String> {
    Ok(Range::new(nullable_int(min, label)?, nullable_int(max, label)?))
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value.split(separator).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn join_list<T: ToString>(values: &[T], separator: &str) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(separator)
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Render a fraction as a percentage without float noise (0.075 -> "7.5").
fn fraction_to_percent(value: Option<f64>) -> String {
    value
        .map(|f| {
            let pct = (f * 100.0 * 1e6).round() / 1e6;
            pct.to_string()
        })
        .unwrap_or_default()
}

impl StrategyForm {
    /// An empty form with the default target amount.
    pub fn blank() -> Self {
        Self { target_amount: DEFAULT_TARGET_AMOUNT.to_string(), ..Default::default() }
    }

    /// Parse the text fields into a strategy.
    ///
    /// Only syntax is checked here; range and rating validation happens in
    /// [`NewStrategy::validate`].
    pub fn to_new_strategy(&self) -> Result<NewStrategy, String> {
        let target_amount = nullable_int(&self.target_amount, "target amount")?.unwrap_or(DEFAULT_TARGET_AMOUNT);

        let terms = self
            .terms
            .iter()
            .map(|t| nullable_int(t, "term"))
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>, _>>()?;

        let listing_categories = split_list(&self.listing_categories, ',')
            .iter()
            .map(|c| nullable_int(c, "listing category"))
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>, _>>()?;

        let filters = StrategyFilters {
            ratings: self.ratings.clone(),
            borrower_rate: percent_range(&self.borrower_rate_min, &self.borrower_rate_max, "borrower rate")?,
            fico_score: int_range(&self.fico_score_min, &self.fico_score_max, "FICO score")?,
            debt_to_income: percent_range(&self.debt_to_income_min, &self.debt_to_income_max, "debt-to-income")?,
            months_employed: int_range(&self.months_employed_min, &self.months_employed_max, "months employed")?,
            inquiries_last6_months: int_range(
                &self.inquiries_last6_months_min,
                &self.inquiries_last6_months_max,
                "inquiries (6 months)",
            )?,
            delinquencies_last7_years: int_range(
                &self.delinquencies_last7_years_min,
                &self.delinquencies_last7_years_max,
                "delinquencies (7 years)",
            )?,
            listing_amount: Range::new(
                nullable_float(&self.listing_amount_min, "listing amount")?,
                nullable_float(&self.listing_amount_max, "listing amount")?,
            ),
            terms,
            employment_statuses: split_list(&self.employment_statuses, ';'),
            income_ranges: split_list(&self.income_ranges, ';'),
            listing_categories,
        };

        Ok(NewStrategy { name: self.name.clone(), target_amount, active: self.active.is_some(), filters })
    }

    /// Rows for the range table, in display order.
    pub fn range_rows(&self) -> Vec<RangeRow<'_>> {
        vec![
            RangeRow {
                label: "Borrower rate",
                field: "borrower_rate",
                unit: "%",
                min: &self.borrower_rate_min,
                max: &self.borrower_rate_max,
            },
            RangeRow {
                label: "FICO score",
                field: "fico_score",
                unit: "",
                min: &self.fico_score_min,
                max: &self.fico_score_max,
            },
            RangeRow {
                label: "Debt-to-income",
                field: "debt_to_income",
                unit: "%",
                min: &self.debt_to_income_min,
                max: &self.debt_to_income_max,
            },
            RangeRow {
                label: "Months employed",
                field: "months_employed",
                unit: "",
                min: &self.months_employed_min,
                max: &self.months_employed_max,
            },
            RangeRow {
                label: "Inquiries, last 6 months",
                field: "inquiries_last6_months",
                unit: "",
                min: &self.inquiries_last6_months_min,
                max: &self.inquiries_last6_months_max,
            },
            RangeRow {
                label: "Delinquencies, last 7 years",
                field: "delinquencies_last7_years",
                unit: "",
                min: &self.delinquencies_last7_years_min,
                max: &self.delinquencies_last7_years_max,
            },
            RangeRow {
                label: "Listing amount",
                field: "listing_amount",
                unit: "$",
                min: &self.listing_amount_min,
                max: &self.listing_amount_max,
            },
        ]
    }
}

impl From<&Strategy> for StrategyForm {
    fn from(strategy: &Strategy) -> Self {
        let f = &strategy.filters;
        Self {
            name: strategy.name.clone(),
            target_amount: strategy.target_amount.to_string(),
            active: strategy.active.then(|| "on".to_string()),
            ratings: f.ratings.clone(),
            terms: f.terms.iter().map(ToString::to_string).collect(),
            borrower_rate_min: fraction_to_percent(f.borrower_rate.min),
            borrower_rate_max: fraction_to_percent(f.borrower_rate.max),
            fico_score_min: opt_to_string(f.fico_score.min),
            fico_score_max: opt_to_string(f.fico_score.max),
            debt_to_income_min: fraction_to_percent(f.debt_to_income.min),
            debt_to_income_max: fraction_to_percent(f.debt_to_income.max),
            months_employed_min: opt_to_string(f.months_employed.min),
            months_employed_max: opt_to_string(f.months_employed.max),
            inquiries_last6_months_min: opt_to_string(f.inquiries_last6_months.min),
            inquiries_last6_months_max: opt_to_string(f.inquiries_last6_months.max),
            delinquencies_last7_years_min: opt_to_string(f.delinquencies_last7_years.min),
            delinquencies_last7_years_max: opt_to_string(f.delinquencies_last7_years.max),
            listing_amount_min: opt_to_string(f.listing_amount.min),
            listing_amount_max: opt_to_string(f.listing_amount.max),
            employment_statuses: join_list(&f.employment_statuses, "; "),
            income_ranges: join_list(&f.income_ranges, "; "),
            listing_categories: join_list(&f.listing_categories, ", "),
        }
    }
}

/// Choices offered as checkboxes.
pub fn rating_choices() -> &'static [&'static str] {
    RATINGS
}

pub fn term_choices() -> Vec<String> {
    TERMS.iter().map(ToString::to_string).collect()
}

/// Human-readable summary of a strategy's filters, one line per criterion.
pub fn describe_filters(filters: &StrategyFilters) -> Vec<String> {
    fn bounds<T: Copy>(range: &Range<T>, fmt: impl Fn(T) -> String) -> Option<String> {
        match (range.min, range.max) {
            (None, None) => None,
            (Some(min), None) => Some(format!("at least {}", fmt(min))),
            (None, Some(max)) => Some(format!("at most {}", fmt(max))),
            (Some(min), Some(max)) => Some(format!("{} to {}", fmt(min), fmt(max))),
        }
    }
    let pct = |v: f64| format!("{}%", fraction_to_percent(Some(v)));
    let plain = |v: i64| v.to_string();

    let mut lines = Vec::new();
    if !filters.ratings.is_empty() {
        lines.push(format!("Rating: {}", filters.ratings.join(", ")));
    }
    if !filters.terms.is_empty() {
        lines.push(format!("Term: {} months", join_list(&filters.terms, ", ")));
    }
    for (label, line) in [
        ("Borrower rate", bounds(&filters.borrower_rate, pct)),
        ("FICO score", bounds(&filters.fico_score, plain)),
        ("Debt-to-income", bounds(&filters.debt_to_income, pct)),
        ("Months employed", bounds(&filters.months_employed, plain)),
        ("Inquiries, last 6 months", bounds(&filters.inquiries_last6_months, plain)),
        ("Delinquencies, last 7 years", bounds(&filters.delinquencies_last7_years, plain)),
        ("Listing amount", bounds(&filters.listing_amount, |v: f64| format!("${v}"))),
    ] {
        if let Some(line) = line {
            lines.push(format!("{label}: {line}"));
        }
    }
    if !filters.employment_statuses.is_empty() {
        lines.push(format!("Employment: {}", filters.employment_statuses.join(", ")));
    }
    if !filters.income_ranges.is_empty() {
        lines.push(format!("Income: {}", filters.income_ranges.join(", ")));
    }
    if !filters.listing_categories.is_empty() {
        lines.push(format!("Category: {}", join_list(&filters.listing_categories, ", ")));
    }
    lines
}
