use serde::{Deserialize, Serialize};

/// Clamp a confidence score into `0.0..=1.0`. Non-finite scores become 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One candidate partner/hours pair recovered from a schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedRow {
    pub name: String,
    pub hours: f64,
    /// Recognition confidence (0.0 = guessed, 1.0 = certain).
    pub confidence: f64,
}

impl ExtractedRow {
    pub fn new(name: impl Into<String>, hours: f64, confidence: f64) -> Self {
        Self {
            name: name.into(),
            hours,
            confidence: clamp_confidence(confidence),
        }
    }

    /// Case-insensitive identity used for deduplication.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Rows whose names are unique ignoring case. Built only by [`crate::sanitize_rows`].
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct SanitizedRows(pub(crate) Vec<ExtractedRow>);

impl SanitizedRows {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<ExtractedRow> {
        self.0
    }
}

impl std::ops::Deref for SanitizedRows {
    type Target = [ExtractedRow];

    fn deref(&self) -> &[ExtractedRow] {
        &self.0
    }
}
