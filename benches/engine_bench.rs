use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use expensedb::repository::{AddExpense, ExpenseRepository};
use expensedb::storage::{InMemoryStorage, SqliteStorage, StorageBackend};
use serde_json::json;

const CATEGORIES: [&str; 4] = ["Food & Dining", "Transportation", "Travel", "Other"];

fn expense(i: usize) -> AddExpense {
    AddExpense {
        date: format!("2023-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
        amount: json!(format!("{}.{:02}", i % 200, i % 100)),
        category: CATEGORIES[i % CATEGORIES.len()].to_string(),
        subcategory: String::new(),
        note: format!("entry {}", i),
    }
}

fn seeded(backend: Arc<dyn StorageBackend>, rows: usize) -> ExpenseRepository {
    let repo = ExpenseRepository::new(backend);
    repo.bootstrap().unwrap();
    for i in 0..rows {
        repo.add_expense(expense(i)).unwrap();
    }
    repo
}

fn bench_memory(c: &mut Criterion) {
    let repo = seeded(Arc::new(InMemoryStorage::new()), 1000);

    c.bench_function("memory_add_expense", |b| {
        let mut i = 0;
        b.iter(|| {
            i += 1;
            black_box(repo.add_expense(expense(i)).unwrap())
        })
    });

    c.bench_function("memory_list_quarter", |b| {
        b.iter(|| black_box(repo.list_expenses("2023-01-01", "2023-03-31").unwrap()))
    });

    c.bench_function("memory_summarize_year", |b| {
        b.iter(|| black_box(repo.summarize("2023-01-01", "2023-12-31", None).unwrap()))
    });
}

fn bench_sqlite(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SqliteStorage::new(dir.path().join("bench.db")).unwrap());
    let repo = seeded(storage, 1000);

    c.bench_function("sqlite_list_quarter", |b| {
        b.iter(|| black_box(repo.list_expenses("2023-01-01", "2023-03-31").unwrap()))
    });

    c.bench_function("sqlite_summarize_year", |b| {
        b.iter(|| black_box(repo.summarize("2023-01-01", "2023-12-31", None).unwrap()))
    });
}

criterion_group!(benches, bench_memory, bench_sqlite);
criterion_main!(benches);
