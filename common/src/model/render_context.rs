use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder names an offer-letter template may use.
///
/// Template authors write them as `{{ full_name }}`. The backend fills every
/// one of these keys when it builds a context, even when the underlying
/// record has no value.
pub const CONTEXT_KEYS: [&str; 15] = [
    "full_name",
    "first_name",
    "last_name",
    "student_no",
    "reg_no",
    "program_name",
    "program_code",
    "fees",
    "duration",
    "max_duration",
    "campus",
    "study_mode",
    "batch",
    "academic_year",
    "admission_date",
];

/// Values merged into a template at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// True when `key` is one of the [`CONTEXT_KEYS`].
pub fn is_known_key(key: &str) -> bool {
    CONTEXT_KEYS.contains(&key)
}
