use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategorySet {
    labels: Vec<String>,
}

pub fn normalize_label(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

impl CategorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_labels<I, S>(labels: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for raw in labels {
            let label = normalize_label(raw.as_ref());
            if !label.is_empty() && !out.contains(&label) {
                out.push(label);
            }
        }
        if out.is_empty() {
            return Err(ValidationError::EmptyCategories);
        }
        Ok(Self { labels: out })
    }

    pub fn add(&mut self, raw: &str) -> Result<String, ValidationError> {
        let label = normalize_label(raw);
        if label.is_empty() {
            return Err(ValidationError::EmptyCategoryLabel);
        }
        if self.contains(&label) {
            return Err(ValidationError::DuplicateCategory(label));
        }
        self.labels.push(label.clone());
        Ok(label)
    }

    pub fn remove(&mut self, raw: &str) -> Result<(), ValidationError> {
        let label = normalize_label(raw);
        let Some(idx) = self.labels.iter().position(|l| *l == label) else {
            return Err(ValidationError::UnknownCategory(label));
        };
        if self.labels.len() <= 1 {
            return Err(ValidationError::LastCategory);
        }
        self.labels.remove(idx);
        Ok(())
    }

    pub fn contains(&self, raw: &str) -> bool {
        let label = normalize_label(raw);
        self.labels.iter().any(|l| *l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

impl TryFrom<Vec<String>> for CategorySet {
    type Error = ValidationError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_labels(value)
    }
}

impl From<CategorySet> for Vec<String> {
    fn from(value: CategorySet) -> Self {
        value.labels
    }
}
