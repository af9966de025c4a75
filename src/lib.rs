//! ExpenseDB: a personal expense ledger over pluggable relational backends.
//!
//! `repository::open_backend` picks SQLite, PostgreSQL or the in-memory store
//! from configuration; `service::ExpenseService` is what callers talk to.

pub mod catalog;
pub mod config;
pub mod display;
pub mod http;
pub mod repository;
pub mod service;
pub mod storage;

pub use expensedb_core::{CategorySummary, DateRange, Expense, ExpenseId, NewExpense};
