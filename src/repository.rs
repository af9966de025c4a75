use std::sync::Arc;

use expensedb_core::{CategorySummary, DateRange, Expense, ExpenseId, NewExpense};
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::{BackendKind, StorageConfig},
    storage::{InMemoryStorage, PostgresStorage, SqliteStorage, StorageBackend, StorageError},
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Invalid amount: {0} is not a number")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Insert arguments as they arrive from a caller, before coercion.
#[derive(Debug, Clone)]
pub struct AddExpense {
    pub date: String,
    pub amount: Value,
    pub category: String,
    pub subcategory: String,
    pub note: String,
}

/// Turns a loosely typed amount into a finite `f64`.
///
/// Numbers pass through; strings are trimmed and parsed. Everything else,
/// and anything non-finite, is rejected with the offending value in the error.
pub fn coerce_amount(raw: &Value) -> Result<f64, RepositoryError> {
    let amount = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match amount {
        Some(a) if a.is_finite() => Ok(a),
        _ => Err(RepositoryError::InvalidAmount(raw.to_string())),
    }
}

/// Builds the backend named by the configuration. No schema work happens here.
pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        BackendKind::Sqlite => {
            let path = config.sqlite_path();
            // Every call opens its own connection, so an in-memory database would start empty each time.
            if path.as_os_str() == ":memory:" {
                return Err(StorageError::Other(
                    "sqlite_path \":memory:\" is not supported; use backend = \"memory\"".to_string(),
                ));
            }
            Arc::new(SqliteStorage::new(path)?)
        }
        BackendKind::Postgres => {
            let url = config.postgres_url.as_deref().ok_or_else(|| {
                StorageError::Other(
                    "storage.postgres_url is required for the postgres backend".to_string(),
                )
            })?;
            Arc::new(PostgresStorage::new(url))
        }
        BackendKind::Memory => Arc::new(InMemoryStorage::new()),
    };
    Ok(backend)
}

#[derive(Clone)]
pub struct ExpenseRepository {
    backend: Arc<dyn StorageBackend>,
}

impl ExpenseRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Ensures the schema exists. Run once before serving; an error here is fatal.
    pub fn bootstrap(&self) -> Result<(), StorageError> {
        self.backend.ensure_schema().map_err(|e| {
            tracing::error!(backend = self.backend.name(), error = %e, "Database initialization failed");
            e
        })
    }

    pub fn add_expense(&self, input: AddExpense) -> Result<ExpenseId, RepositoryError> {
        let amount = coerce_amount(&input.amount)?;
        if input.category.is_empty() {
            return Err(RepositoryError::InvalidInput(
                "category must not be empty".to_string(),
            ));
        }

        let expense = NewExpense {
            date: input.date,
            amount,
            category: input.category,
            subcategory: input.subcategory,
            note: input.note,
        };
        Ok(self.backend.insert_expense(&expense)?)
    }

    pub fn list_expenses(&self, start_date: &str, end_date: &str) -> Result<Vec<Expense>, RepositoryError> {
        Ok(self.backend.list_expenses(&DateRange::new(start_date, end_date))?)
    }

    /// An empty category filter means no filter.
    pub fn summarize(
        &self,
        start_date: &str,
        end_date: &str,
        category: Option<&str>,
    ) -> Result<Vec<CategorySummary>, RepositoryError> {
        let category = category.filter(|c| !c.is_empty());
        Ok(self
            .backend
            .summarize(&DateRange::new(start_date, end_date), category)?)
    }
}
