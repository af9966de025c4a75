use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use expensedb_core::{CategorySummary, DateRange, Expense, ExpenseId, NewExpense};

// Re-export core storage types so callers can use crate::storage::* for everything
pub use expensedb_core::storage::{StorageBackend, StorageError};
pub use expensedb_sqlite::SqliteStorage;
pub use expensedb_postgres::PostgresStorage;

/// Process-local backend. Nothing survives a restart.
pub struct InMemoryStorage {
    expenses: RwLock<BTreeMap<ExpenseId, Expense>>,
    sequence_counter: AtomicI64,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            expenses: RwLock::new(BTreeMap::new()),
            sequence_counter: AtomicI64::new(1),
        }
    }

    fn next_sequence(&self) -> ExpenseId {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<ExpenseId, Expense>>, StorageError> {
        self.expenses
            .read()
            .map_err(|_| StorageError::Other("expense store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<ExpenseId, Expense>>, StorageError> {
        self.expenses
            .write()
            .map_err(|_| StorageError::Other("expense store lock poisoned".to_string()))
    }
}

impl StorageBackend for InMemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn insert_expense(&self, expense: &NewExpense) -> Result<ExpenseId, StorageError> {
        let mut expenses = self.write()?;
        let id = self.next_sequence();
        expenses.insert(
            id,
            Expense {
                id,
                date: expense.date.clone(),
                amount: expense.amount,
                category: expense.category.clone(),
                subcategory: expense.subcategory.clone(),
                note: expense.note.clone(),
            },
        );
        tracing::debug!(id, "Expense inserted");
        Ok(id)
    }

    fn list_expenses(&self, range: &DateRange) -> Result<Vec<Expense>, StorageError> {
        let expenses = self.read()?;
        let mut result: Vec<Expense> = expenses
            .values()
            .filter(|e| range.contains(&e.date))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(result)
    }

    fn summarize(
        &self,
        range: &DateRange,
        category: Option<&str>,
    ) -> Result<Vec<CategorySummary>, StorageError> {
        let expenses = self.read()?;
        let mut groups: BTreeMap<&str, CategorySummary> = BTreeMap::new();
        for e in expenses.values() {
            if !range.contains(&e.date) || category.is_some_and(|c| c != e.category) {
                continue;
            }
            let group = groups.entry(e.category.as_str()).or_insert_with(|| CategorySummary {
                category: e.category.clone(),
                total_amount: 0.0,
                count: 0,
            });
            group.total_amount += e.amount;
            group.count += 1;
        }

        // BTreeMap iteration already gives category ASC for the tie-break
        let mut result: Vec<CategorySummary> = groups.into_values().collect();
        result.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_ids_increase() {
        let storage = InMemoryStorage::new();
        let a = storage.insert_expense(&NewExpense::new("2024-01-01", 1.0, "Food")).unwrap();
        let b = storage.insert_expense(&NewExpense::new("2024-01-01", 1.0, "Food")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_memory_list_ordering() {
        let storage = InMemoryStorage::new();
        let first = storage.insert_expense(&NewExpense::new("2024-01-01", 1.0, "Food")).unwrap();
        let second = storage.insert_expense(&NewExpense::new("2024-01-02", 2.0, "Food")).unwrap();
        let third = storage.insert_expense(&NewExpense::new("2024-01-02", 3.0, "Food")).unwrap();

        let ids: Vec<_> = storage
            .list_expenses(&DateRange::new("2024-01-01", "2024-01-02"))
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[test]
    fn test_memory_summarize_ties_sorted_by_category() {
        let storage = InMemoryStorage::new();
        storage.insert_expense(&NewExpense::new("2024-01-01", 5.0, "Travel")).unwrap();
        storage.insert_expense(&NewExpense::new("2024-01-01", 5.0, "Food")).unwrap();
        storage.insert_expense(&NewExpense::new("2024-01-01", 9.0, "Other")).unwrap();
        storage.insert_expense(&NewExpense::new("2024-01-01", 5.0, "apple")).unwrap();

        let categories: Vec<_> = storage
            .summarize(&DateRange::new("2024-01-01", "2024-01-01"), None)
            .unwrap()
            .into_iter()
            .map(|s| s.category)
            .collect();
        assert_eq!(categories, vec!["Other", "Food", "Travel", "apple"]);
    }

    #[test]
    fn test_memory_summarize_filter() {
        let storage = InMemoryStorage::new();
        storage.insert_expense(&NewExpense::new("2024-01-01", 5.0, "Travel")).unwrap();
        storage.insert_expense(&NewExpense::new("2024-01-02", 7.0, "Food")).unwrap();

        let range = DateRange::new("2024-01-01", "2024-01-31");
        let food = storage.summarize(&range, Some("Food")).unwrap();
        assert_eq!(
            food,
            vec![CategorySummary { category: "Food".to_string(), total_amount: 7.0, count: 1 }]
        );
        assert!(storage.summarize(&range, Some("Business")).unwrap().is_empty());
    }
}
