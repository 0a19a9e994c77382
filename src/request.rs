use crate::{categories::CategorySet, error::ValidationError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    UploadedFile { filepath: String },
    Inline { keywords: String },
}

#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub topic: String,
    pub confidence_threshold: u32,
    pub categories: CategorySet,
    pub classification_prompt: String,
    pub input: Option<InputSource>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessBody<'a> {
    pub topic: &'a str,
    pub confidence_threshold: u32,
    pub categories: &'a [String],
    pub classification_prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_input: Option<&'a str>,
}

impl ClassificationRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_form()?;
        match &self.input {
            None => return Err(ValidationError::MissingInput),
            Some(InputSource::UploadedFile { filepath }) if filepath.trim().is_empty() => {
                return Err(ValidationError::MissingInput);
            }
            Some(InputSource::Inline { keywords }) if keywords.trim().is_empty() => {
                return Err(ValidationError::MissingInput);
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Everything except the input source, which may still be pending upload.
    pub fn validate_form(&self) -> Result<(), ValidationError> {
        if self.topic.trim().is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        if self.categories.is_empty() {
            return Err(ValidationError::EmptyCategories);
        }
        if self.confidence_threshold > 100 {
            return Err(ValidationError::ThresholdOutOfRange(
                self.confidence_threshold,
            ));
        }
        Ok(())
    }

    pub fn body(&self) -> ProcessBody<'_> {
        let (filepath, manual_input) = match &self.input {
            Some(InputSource::UploadedFile { filepath }) => (Some(filepath.as_str()), None),
            Some(InputSource::Inline { keywords }) => (None, Some(keywords.as_str())),
            None => (None, None),
        };
        ProcessBody {
            topic: self.topic.trim(),
            confidence_threshold: self.confidence_threshold,
            categories: self.categories.as_slice(),
            classification_prompt: &self.classification_prompt,
            filepath,
            manual_input,
        }
    }
}
