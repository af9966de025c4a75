//! Core types and traits for ExpenseDB storage backends.
//!
//! This crate provides the `StorageBackend` trait and all associated types,
//! enabling pluggable storage implementations in separate crates.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{CategorySummary, DateRange, Expense, ExpenseId};
pub use models::write::NewExpense;
pub use storage::{StorageBackend, StorageError};
