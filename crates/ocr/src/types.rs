use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tipjar_core::{clamp_confidence, ExtractedRow};

use crate::config::Engine;

/// One recognized text fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTextBlock {
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
}

impl RawTextBlock {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self { text: text.into(), confidence: clamp_confidence(confidence) }
    }
}

/// Normalized result of one OCR run, whichever engine produced it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OcrOutcome {
    pub engine: Engine,
    pub rows: Vec<ExtractedRow>,
    pub blocks: Vec<RawTextBlock>,
    pub average_confidence: f64,
    /// Candidate rows the parser discarded as malformed.
    pub dropped: usize,
}

// ── Lenient decoding ──────────────────────────────────────────────────────────

/// List element that may fail to decode without failing the list around it.
#[derive(Debug, Clone, PartialEq)]
pub enum Lenient<T> {
    Valid(T),
    Malformed,
}

impl<T> Lenient<T> {
    pub fn into_valid(self) -> Option<T> {
        match self {
            Lenient::Valid(value) => Some(value),
            Lenient::Malformed => None,
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).map_or(Lenient::Malformed, Lenient::Valid))
    }
}

/// `null` decodes to the type's default instead of failing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Self-hosted service payload ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePayload {
    #[serde(default)]
    pub blocks: Option<Vec<Lenient<RawTextBlock>>>,
    #[serde(default)]
    pub rows: Option<Vec<Lenient<ServiceRow>>>,
    #[serde(default)]
    pub confidence: Option<ServiceConfidence>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceRow {
    #[serde(default)]
    pub name: String,
    pub hours: Option<f64>,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfidence {
    #[serde(default)]
    pub average: f64,
}

// ── Cloud analyze operation ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl OperationStatus {
    /// Unrecognized states are treated as still running.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "succeeded" => OperationStatus::Succeeded,
            "failed" => OperationStatus::Failed,
            "notStarted" => OperationStatus::NotStarted,
            _ => OperationStatus::Running,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOperation {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

impl AnalyzeOperation {
    pub fn status(&self) -> OperationStatus {
        OperationStatus::parse(&self.status)
    }

    /// Best available description of why the operation failed.
    pub fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone())
            .or_else(|| {
                self.analyze_result
                    .as_ref()
                    .and_then(|r| r.errors.iter().find_map(|e| e.message.clone()))
            })
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub row_count: Option<usize>,
    #[serde(default)]
    pub column_count: Option<usize>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub kind: Option<String>,
}

impl TableCell {
    pub fn is_column_header(&self) -> bool {
        self.kind.as_deref() == Some("columnHeader")
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().map(str::trim).unwrap_or("")
    }
}
