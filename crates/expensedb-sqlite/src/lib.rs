//! SQLite storage backend for ExpenseDB.
//!
//! Every call opens its own connection to the database file and drops it on
//! return, so no connection state survives between operations.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use expensedb_core::{
    CategorySummary, DateRange, Expense, ExpenseId, NewExpense, StorageBackend, StorageError,
};
use rusqlite::{params, params_from_iter, Connection};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Category written by the bootstrap write test. The row is deleted by id
/// inside the same transaction.
const SENTINEL_CATEGORY: &str = "__expensedb_write_check__";

pub struct SqliteStorage {
    path: PathBuf,
}

impl SqliteStorage {
    /// Points the backend at a database file, creating its parent directory.
    ///
    /// The file itself is created lazily by the first connection.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path).map_err(|e| {
            StorageError::Connection(format!("{}: {}", self.path.display(), e))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(query_error)?;
        Ok(conn)
    }
}

fn query_error(e: rusqlite::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

fn schema_error(e: rusqlite::Error) -> StorageError {
    StorageError::Schema(e.to_string())
}

fn row_to_expense(row: &rusqlite::Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        date: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        subcategory: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

impl StorageBackend for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        let mut conn = self.connect()?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(schema_error)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT DEFAULT '',
                note TEXT DEFAULT ''
            );
            ",
        )
        .map_err(schema_error)?;

        // Fail at startup rather than on the first write if the file is read-only.
        let tx = conn.transaction().map_err(schema_error)?;
        tx.execute(
            "INSERT INTO expenses (date, amount, category) VALUES ('2000-01-01', 0, ?1)",
            params![SENTINEL_CATEGORY],
        )
        .map_err(schema_error)?;
        let sentinel_id = tx.last_insert_rowid();
        tx.execute("DELETE FROM expenses WHERE id = ?1", params![sentinel_id])
            .map_err(schema_error)?;
        tx.commit().map_err(schema_error)?;

        tracing::info!(
            path = %self.path.display(),
            journal_mode = %journal_mode,
            "SQLite schema ready and writable"
        );
        Ok(())
    }

    fn insert_expense(&self, expense: &NewExpense) -> Result<ExpenseId, StorageError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO expenses (date, amount, category, subcategory, note) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                expense.date,
                expense.amount,
                expense.category,
                expense.subcategory,
                expense.note
            ],
        )
        .map_err(query_error)?;

        let id = conn.last_insert_rowid();
        tracing::debug!(id, date = %expense.date, category = %expense.category, "Expense inserted");
        Ok(id)
    }

    fn list_expenses(&self, range: &DateRange) -> Result<Vec<Expense>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, date, amount, category, subcategory, note
                 FROM expenses
                 WHERE date BETWEEN ?1 AND ?2
                 ORDER BY date DESC, id DESC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![range.start, range.end], row_to_expense)
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        Ok(rows)
    }

    fn summarize(
        &self,
        range: &DateRange,
        category: Option<&str>,
    ) -> Result<Vec<CategorySummary>, StorageError> {
        let conn = self.connect()?;

        let mut query = String::from(
            "SELECT category, SUM(amount) AS total_amount, COUNT(*) AS count
             FROM expenses
             WHERE date BETWEEN ?1 AND ?2",
        );
        let mut args = vec![range.start.as_str(), range.end.as_str()];
        if let Some(category) = category {
            query.push_str(" AND category = ?3");
            args.push(category);
        }
        query.push_str(" GROUP BY category ORDER BY total_amount DESC, category ASC");

        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok(CategorySummary {
                    category: row.get(0)?,
                    total_amount: row.get(1)?,
                    count: row.get(2)?,
                })
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        Ok(rows)
    }
}
