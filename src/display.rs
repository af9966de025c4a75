use std::fmt::Display;

use expensedb_core::{CategorySummary, Expense};
use prettytable::{row, Table};

pub struct ExpenseTable<'a>(pub &'a [Expense]);

pub struct SummaryTable<'a>(pub &'a [CategorySummary]);

impl Display for ExpenseTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Id", "Date", "Amount", "Category", "Subcategory", "Note"]);
        table.add_empty_row();

        for e in self.0 {
            table.add_row(row![
                e.id,
                e.date,
                format!("{:.2}", e.amount),
                e.category,
                e.subcategory,
                e.note
            ]);
        }

        write!(f, "\n{}\n", table)
    }
}

impl Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Category", "Total", "Count"]);
        table.add_empty_row();

        for item in self.0 {
            table.add_row(row![
                item.category,
                format!("{:.2}", item.total_amount),
                item.count
            ]);
        }

        write!(f, "\n{}\n", table)
    }
}
