/// A validated expense ready to be written.
///
/// `amount` is already numeric here; loose inputs are coerced before a
/// backend ever sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub note: String,
}

impl NewExpense {
    pub fn new(date: impl Into<String>, amount: f64, category: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            amount,
            category: category.into(),
            subcategory: String::new(),
            note: String::new(),
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = subcategory.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}
