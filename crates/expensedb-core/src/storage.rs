use crate::models::{write::NewExpense, CategorySummary, DateRange, Expense, ExpenseId};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("schema bootstrap failed: {0}")]
    Schema(String),
    #[error("{0}")]
    Query(String),
    #[error("{0}")]
    Other(String),
}

/// The capability set every expense store provides.
///
/// Implementations own their connection lifecycle; callers never hold a
/// connection across calls.
pub trait StorageBackend: Send + Sync {
    /// Short backend name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    /// Creates the `expenses` table if absent. Safe to call on every startup.
    fn ensure_schema(&self) -> Result<(), StorageError>;

    fn insert_expense(&self, expense: &NewExpense) -> Result<ExpenseId, StorageError>;

    /// Rows with `date` in the closed range, newest date first, then newest id first.
    fn list_expenses(&self, range: &DateRange) -> Result<Vec<Expense>, StorageError>;

    /// Per-category totals in the range, largest total first.
    fn summarize(&self, range: &DateRange, category: Option<&str>) -> Result<Vec<CategorySummary>, StorageError>;
}
