//! Boundary between callers and the repository.
//!
//! Arguments arrive untyped, results leave as envelopes. A call never fails
//! outright: every error is reported as `{"status": "error", "message": ...}`.

use std::time::Instant;

use expensedb_core::{CategorySummary, Expense, ExpenseId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    catalog::CategoryCatalog,
    repository::{AddExpense, ExpenseRepository, RepositoryError},
    storage::StorageError,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Ok(T),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Added {
    pub status: &'static str,
    pub id: ExpenseId,
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error(ErrorBody {
            status: "error",
            message: message.into(),
        })
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "status": "error", "message": format!("Error: {}", e) })
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddExpenseArgs {
    pub date: String,
    pub amount: Value,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListExpensesArgs {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeArgs {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub category: Option<String>,
}

pub struct ExpenseService {
    repository: ExpenseRepository,
    catalog: CategoryCatalog,
}

impl ExpenseService {
    pub fn new(repository: ExpenseRepository, catalog: CategoryCatalog) -> Self {
        Self { repository, catalog }
    }

    pub async fn add_expense(&self, args: Value) -> Envelope<Added> {
        let args: AddExpenseArgs = match parse_args(args) {
            Ok(args) => args,
            Err(envelope) => return envelope,
        };
        let input = AddExpense {
            date: args.date,
            amount: args.amount,
            category: args.category,
            subcategory: args.subcategory.unwrap_or_default(),
            note: args.note.unwrap_or_default(),
        };

        let result = self
            .run("add_expense", move |repo| repo.add_expense(input))
            .await;
        match result {
            Ok(id) => Envelope::Ok(Added {
                status: "success",
                id,
                message: "Expense added successfully".to_string(),
            }),
            Err(RepositoryError::Storage(e)) => Envelope::error(format!("DB Error: {}", e)),
            Err(e) => Envelope::error(e.to_string()),
        }
    }

    pub async fn list_expenses(&self, args: Value) -> Envelope<Vec<Expense>> {
        let args: ListExpensesArgs = match parse_args(args) {
            Ok(args) => args,
            Err(envelope) => return envelope,
        };

        let result = self
            .run("list_expenses", move |repo| {
                repo.list_expenses(&args.start_date, &args.end_date)
            })
            .await;
        match result {
            Ok(rows) => Envelope::Ok(rows),
            Err(e) => Envelope::error(format!("Error: {}", e)),
        }
    }

    pub async fn summarize(&self, args: Value) -> Envelope<Vec<CategorySummary>> {
        let args: SummarizeArgs = match parse_args(args) {
            Ok(args) => args,
            Err(envelope) => return envelope,
        };

        let result = self
            .run("summarize", move |repo| {
                repo.summarize(&args.start_date, &args.end_date, args.category.as_deref())
            })
            .await;
        match result {
            Ok(rows) => Envelope::Ok(rows),
            Err(e) => Envelope::error(format!("Error: {}", e)),
        }
    }

    /// The `categories` resource body.
    pub async fn categories(&self) -> String {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || catalog.read())
            .await
            .unwrap_or_else(|e| {
                serde_json::json!({ "error": format!("Could not load categories: {}", e) })
                    .to_string()
            })
    }

    /// Runs one repository call on the blocking pool; the backends do synchronous I/O.
    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(ExpenseRepository) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let repo = self.repository.clone();
        let started = Instant::now();

        let result = match tokio::task::spawn_blocking(move || f(repo)).await {
            Ok(result) => result,
            Err(e) => Err(RepositoryError::Storage(StorageError::Other(format!(
                "{} task failed: {}",
                operation, e
            )))),
        };

        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::increment_counter!("expensedb_operations_total", "operation" => operation, "outcome" => outcome);
        metrics::histogram!(
            "expensedb_operation_duration_seconds",
            started.elapsed().as_secs_f64(),
            "operation" => operation
        );

        match &result {
            Ok(_) => tracing::debug!(operation, backend = self.repository.backend_name(), "Operation succeeded"),
            Err(e) => tracing::warn!(operation, backend = self.repository.backend_name(), error = %e, "Operation failed"),
        }
        result
    }
}

fn parse_args<A: DeserializeOwned, T>(args: Value) -> Result<A, Envelope<T>> {
    serde_json::from_value(args).map_err(|e| {
        tracing::warn!(error = %e, "Rejected call arguments");
        Envelope::error(format!("Invalid arguments: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::storage::InMemoryStorage;

    fn service() -> ExpenseService {
        ExpenseService::new(
            ExpenseRepository::new(Arc::new(InMemoryStorage::new())),
            CategoryCatalog::builtin(),
        )
    }

    #[tokio::test]
    async fn test_add_expense_envelope() {
        let svc = service();
        let result = svc
            .add_expense(json!({"date": "2024-01-01", "amount": 10, "category": "Food"}))
            .await;
        assert_eq!(
            result.to_json(),
            json!({"status": "success", "id": 1, "message": "Expense added successfully"})
        );
    }

    #[tokio::test]
    async fn test_invalid_amount_envelope() {
        let svc = service();
        let result = svc
            .add_expense(json!({"date": "2024-01-01", "amount": "abc", "category": "Food"}))
            .await;
        let body = result.to_json();
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("abc"));
    }

    #[tokio::test]
    async fn test_missing_arguments_envelope() {
        let svc = service();
        let result = svc.list_expenses(json!({"start_date": "2024-01-01"})).await;
        let body = result.to_json();
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Invalid arguments"));
    }

    #[tokio::test]
    async fn test_null_optional_fields_default_to_empty() {
        let svc = service();
        svc.add_expense(json!({
            "date": "2024-01-01", "amount": 1.5, "category": "Food",
            "subcategory": null, "note": null
        }))
        .await;
        let rows = svc
            .list_expenses(json!({"start_date": "2024-01-01", "end_date": "2024-01-01"}))
            .await
            .to_json();
        assert_eq!(rows[0]["subcategory"], "");
        assert_eq!(rows[0]["note"], "");
    }
}
