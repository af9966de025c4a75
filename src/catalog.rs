//! The advisory category list served as a read-only JSON resource.
//!
//! Stored expenses are never checked against it.

use std::path::{Path, PathBuf};

use serde::Serialize;

pub const MIME_TYPE: &str = "application/json";

pub const DEFAULT_CATEGORIES: [&str; 10] = [
    "Food & Dining",
    "Transportation",
    "Shopping",
    "Entertainment",
    "Bills & Utilities",
    "Healthcare",
    "Travel",
    "Education",
    "Business",
    "Other",
];

#[derive(Serialize)]
struct CategoryList<'a> {
    categories: &'a [&'a str],
}

#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    override_path: Option<PathBuf>,
}

impl CategoryCatalog {
    pub fn new(override_path: impl Into<PathBuf>) -> Self {
        Self {
            override_path: Some(override_path.into()),
        }
    }

    /// A catalog that always serves the built-in list.
    pub fn builtin() -> Self {
        Self { override_path: None }
    }

    /// Returns the override file's text verbatim when it exists and holds valid
    /// JSON, otherwise the built-in list. Read fresh on every call.
    pub fn read(&self) -> String {
        match &self.override_path {
            Some(path) => read_override(path).unwrap_or_else(default_json),
            None => default_json(),
        }
    }
}

fn read_override(path: &Path) -> Option<String> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No category override, using defaults");
        return None;
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read category override");
            return None;
        }
    };

    if let Err(e) = serde_json::from_str::<serde_json::Value>(&contents) {
        tracing::warn!(path = %path.display(), error = %e, "Category override is not valid JSON");
        return None;
    }

    Some(contents)
}

fn default_json() -> String {
    let list = CategoryList {
        categories: &DEFAULT_CATEGORIES,
    };
    serde_json::to_string_pretty(&list).unwrap_or_else(|e| {
        // serde_json cannot fail on a static list of strings
        format!(r#"{{"error": "Could not load categories: {}"}}"#, e)
    })
}
