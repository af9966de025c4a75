//! PostgreSQL storage backend for ExpenseDB.
//!
//! A fresh `Client` is connected for every call and dropped on return.
//! Amounts are bound as `f64` so the `DOUBLE PRECISION` column never sees text.

use expensedb_core::{
    CategorySummary, DateRange, Expense, ExpenseId, NewExpense, StorageBackend, StorageError,
};
use postgres::{types::ToSql, Client, NoTls};

/// Key for `pg_advisory_xact_lock`, held while the schema is created so
/// processes starting together do not race on the catalog.
const SCHEMA_LOCK_KEY: i64 = 0x6578_7065_6e73_6573;

pub struct PostgresStorage {
    connection_string: String,
}

impl PostgresStorage {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    fn connect(&self) -> Result<Client, StorageError> {
        Client::connect(&self.connection_string, NoTls)
            .map_err(|e| StorageError::Connection(format!("PostgreSQL connection failed: {}", e)))
    }
}

fn query_error(e: postgres::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

fn schema_error(e: postgres::Error) -> StorageError {
    StorageError::Schema(e.to_string())
}

impl StorageBackend for PostgresStorage {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        let mut client = self.connect()?;
        let mut tx = client.transaction().map_err(schema_error)?;

        tx.execute("SELECT pg_advisory_xact_lock($1)", &[&SCHEMA_LOCK_KEY])
            .map_err(schema_error)?;
        tx.batch_execute(
            "
            CREATE TABLE IF NOT EXISTS expenses (
                id BIGSERIAL PRIMARY KEY,
                date TEXT NOT NULL,
                amount DOUBLE PRECISION NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT DEFAULT '',
                note TEXT DEFAULT ''
            );
            ",
        )
        .map_err(schema_error)?;
        tx.commit().map_err(schema_error)?;

        tracing::info!("PostgreSQL schema ready");
        Ok(())
    }

    fn insert_expense(&self, expense: &NewExpense) -> Result<ExpenseId, StorageError> {
        let mut client = self.connect()?;
        let row = client
            .query_one(
                "INSERT INTO expenses (date, amount, category, subcategory, note)
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &expense.date,
                    &expense.amount,
                    &expense.category,
                    &expense.subcategory,
                    &expense.note,
                ],
            )
            .map_err(query_error)?;

        let id: i64 = row.get(0);
        tracing::debug!(id, date = %expense.date, category = %expense.category, "Expense inserted");
        Ok(id)
    }

    fn list_expenses(&self, range: &DateRange) -> Result<Vec<Expense>, StorageError> {
        let mut client = self.connect()?;
        let rows = client
            .query(
                "SELECT id, date, amount, category, subcategory, note
                 FROM expenses
                 WHERE date BETWEEN $1 AND $2
                 ORDER BY date DESC, id DESC",
                &[&range.start, &range.end],
            )
            .map_err(query_error)?;

        Ok(rows
            .iter()
            .map(|row| Expense {
                id: row.get(0),
                date: row.get(1),
                amount: row.get(2),
                category: row.get(3),
                subcategory: row.get::<_, Option<String>>(4).unwrap_or_default(),
                note: row.get::<_, Option<String>>(5).unwrap_or_default(),
            })
            .collect())
    }

    fn summarize(
        &self,
        range: &DateRange,
        category: Option<&str>,
    ) -> Result<Vec<CategorySummary>, StorageError> {
        let mut client = self.connect()?;

        let mut query = String::from(
            "SELECT category, SUM(amount) AS total_amount, COUNT(*) AS count
             FROM expenses
             WHERE date BETWEEN $1 AND $2",
        );
        let mut args: Vec<&(dyn ToSql + Sync)> = vec![&range.start, &range.end];
        if let Some(category) = &category {
            query.push_str(" AND category = $3");
            args.push(category);
        }
        // Byte order on ties, matching SQLite's BINARY collation.
        query.push_str(" GROUP BY category ORDER BY total_amount DESC, category COLLATE \"C\" ASC");

        let rows = client.query(query.as_str(), &args).map_err(query_error)?;
        Ok(rows
            .iter()
            .map(|row| CategorySummary {
                category: row.get(0),
                total_amount: row.get(1),
                count: row.get(2),
            })
            .collect())
    }
}

/// These run only when `EXPENSEDB_TEST_POSTGRES_URL` points at a disposable database.
#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Option<PostgresStorage> {
        let url = std::env::var("EXPENSEDB_TEST_POSTGRES_URL").ok()?;
        let storage = PostgresStorage::new(url.clone());
        storage.ensure_schema().unwrap();
        let mut client = Client::connect(&url, NoTls).unwrap();
        client.batch_execute("TRUNCATE expenses RESTART IDENTITY").unwrap();
        Some(storage)
    }

    // A single test keeps the shared table free of cross-test interference.
    #[test]
    fn test_postgres_operations() {
        let Some(storage) = setup() else {
            eprintln!("EXPENSEDB_TEST_POSTGRES_URL not set, skipping");
            return;
        };

        let first = storage.insert_expense(&NewExpense::new("2024-01-01", 20.0, "Travel")).unwrap();
        let second = storage
            .insert_expense(&NewExpense::new("2024-01-02", 10.0, "Food").with_note("dinner"))
            .unwrap();
        let third = storage.insert_expense(&NewExpense::new("2024-01-02", 5.0, "Food")).unwrap();
        assert!(first < second && second < third);

        let rows = storage
            .list_expenses(&DateRange::new("2024-01-01", "2024-01-31"))
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![third, second, first]);
        assert_eq!(rows[1].note, "dinner");
        assert_eq!(rows[0].subcategory, "");

        let summary = storage
            .summarize(&DateRange::new("2024-01-01", "2024-01-31"), None)
            .unwrap();
        assert_eq!(
            summary,
            vec![
                CategorySummary { category: "Travel".to_string(), total_amount: 20.0, count: 1 },
                CategorySummary { category: "Food".to_string(), total_amount: 15.0, count: 2 },
            ]
        );

        let reversed = DateRange::new("2024-01-31", "2024-01-01");
        assert!(storage.list_expenses(&reversed).unwrap().is_empty());
        assert!(storage
            .summarize(&DateRange::new("2024-01-01", "2024-01-31"), Some("Healthcare"))
            .unwrap()
            .is_empty());

        storage.insert_expense(&NewExpense::new("2024-02-01", 5.0, "apple")).unwrap();
        storage.insert_expense(&NewExpense::new("2024-02-01", 5.0, "Banana")).unwrap();
        let tied: Vec<_> = storage
            .summarize(&DateRange::new("2024-02-01", "2024-02-29"), None)
            .unwrap()
            .into_iter()
            .map(|s| s.category)
            .collect();
        assert_eq!(tied, vec!["Banana", "apple"]);

        storage.ensure_schema().unwrap();
        assert_eq!(
            storage
                .list_expenses(&DateRange::new("2024-01-01", "2024-01-31"))
                .unwrap()
                .len(),
            3
        );
    }
}
