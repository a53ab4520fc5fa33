use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tipjar_core::{
    calculate_partner_payouts, calculate_summary, sanitize_rows, ExtractedRow, PartnerPayout,
    SanitizedRows, TipSummary,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::OcrClient;
use crate::error::OcrError;
use crate::transport::Transport;
use crate::types::OcrOutcome;
use crate::upload::UploadFile;

pub const DEFAULT_TOTAL_TIPS: f64 = 500.0;

/// Parse a tip-pool amount typed by a person. Anything but digits and `.` is
/// ignored, the longest leading number is used, and garbage becomes 0.
pub fn parse_tip_amount(raw: &str) -> f64 {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"^(\d+(\.\d*)?|\.\d+)").expect("invalid regex"));

    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    re.find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Everything needed to render the payout screen.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TipReport {
    pub total_tips: f64,
    pub summary: TipSummary,
    pub payouts: Vec<PartnerPayout>,
    pub rows: SanitizedRows,
    pub average_confidence: f64,
    pub dropped: usize,
    pub error: Option<String>,
}

/// Marks one upload. Results carrying an older generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct SessionState {
    applied: u64,
    rows: Vec<ExtractedRow>,
    total_tips: f64,
    average_confidence: f64,
    dropped: usize,
    error: Option<String>,
}

/// One person's working state: the latest rows and the tip pool.
///
/// Each upload takes a fresh [`Generation`]; only the newest upload may update the
/// rows, so a slow response can never overwrite a faster, later one.
pub struct TipSession<T: Transport> {
    client: OcrClient<T>,
    generation: AtomicU64,
    state: Mutex<SessionState>,
}

impl<T: Transport> TipSession<T> {
    pub fn new(client: OcrClient<T>) -> Self {
        Self {
            client,
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                applied: 0,
                rows: Vec::new(),
                total_tips: DEFAULT_TOTAL_TIPS,
                average_confidence: 0.0,
                dropped: 0,
                error: None,
            }),
        }
    }

    pub fn client(&self) -> &OcrClient<T> {
        &self.client
    }

    /// Reserve the next generation; everything older becomes stale.
    pub fn begin_upload(&self) -> Generation {
        Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation.load(Ordering::SeqCst) == generation.0
    }

    /// Run OCR on `file` and store the rows if no newer upload started meanwhile.
    /// Returns whether the result was applied.
    pub async fn upload(&self, file: &UploadFile) -> bool {
        let generation = self.begin_upload();
        let result = self.client.recognize(file).await;
        self.complete_upload(generation, result).await
    }

    /// Apply a finished OCR run. Stale generations are ignored.
    pub async fn complete_upload(
        &self,
        generation: Generation,
        result: Result<OcrOutcome, OcrError>,
    ) -> bool {
        if !self.is_current(generation) {
            debug!(generation = generation.0, "Discarding stale OCR result");
            return false;
        }

        let mut state = self.state.lock().await;
        if state.applied > generation.0 {
            return false;
        }
        state.applied = generation.0;

        match result {
            Ok(outcome) => {
                info!(
                    generation = generation.0,
                    rows = outcome.rows.len(),
                    dropped = outcome.dropped,
                    "Schedule rows updated"
                );
                state.rows = outcome.rows;
                state.average_confidence = outcome.average_confidence;
                state.dropped = outcome.dropped;
                state.error = None;
            }
            Err(e) => {
                warn!(generation = generation.0, error = %e, "OCR failed");
                state.rows.clear();
                state.average_confidence = 0.0;
                state.dropped = 0;
                state.error = Some(e.user_message().to_string());
            }
        }
        true
    }

    /// Replace the rows by hand, e.g. after OCR failed. Supersedes pending uploads.
    pub async fn enter_rows(&self, rows: Vec<ExtractedRow>) {
        let generation = self.begin_upload();
        let mut state = self.state.lock().await;
        state.applied = generation.0;
        state.rows = rows;
        state.average_confidence = 1.0;
        state.dropped = 0;
        state.error = None;
    }

    pub async fn set_total_tips(&self, total_tips: f64) {
        self.state.lock().await.total_tips = if total_tips.is_finite() { total_tips } else { 0.0 };
    }

    /// Lenient variant of [`Self::set_total_tips`] for typed input.
    pub async fn set_total_tips_from_input(&self, raw: &str) {
        self.set_total_tips(parse_tip_amount(raw)).await;
    }

    /// Recompute the payout picture from the current rows and tip pool.
    pub async fn report(&self) -> TipReport {
        let state = self.state.lock().await;
        let rows = sanitize_rows(state.rows.iter().cloned());
        TipReport {
            total_tips: state.total_tips,
            summary: calculate_summary(&rows, state.total_tips),
            payouts: calculate_partner_payouts(&rows, state.total_tips),
            rows,
            average_confidence: state.average_confidence,
            dropped: state.dropped,
            error: state.error.clone(),
        }
    }
}
