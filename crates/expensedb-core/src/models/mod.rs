use serde::{Deserialize, Serialize};

pub mod write;

pub type ExpenseId = i64;

/// A stored expense row, as every backend reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub note: String,
}

/// One row of a grouped aggregate over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub total_amount: f64,
    pub count: i64,
}

/// Closed interval of `YYYY-MM-DD` strings.
///
/// Bounds are compared lexicographically and never validated, so a reversed
/// range is legal and simply matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn contains(&self, date: &str) -> bool {
        self.start.as_str() <= date && date <= self.end.as_str()
    }
}
