use thiserror::Error;

/// Shown to the user whenever OCR fails, whatever the cause.
pub const MANUAL_ENTRY_MESSAGE: &str =
    "We could not extract hours from that image. Please try again or enter them manually.";

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed ({0})")]
    RequestFailed(u16),
    #[error("OCR protocol error: {0}")]
    ProtocolError(String),
    #[error("OCR analysis failed: {0}")]
    EngineError(String),
    #[error("OCR succeeded but no partner rows were found")]
    EmptyResult,
    #[error("OCR timed out after {attempts} poll attempts")]
    Timeout { attempts: u32 },
    #[error("Cloud OCR selected but AZURE_OCR_ENDPOINT / AZURE_OCR_KEY are not set")]
    NotConfigured,
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Could not read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub fn user_message(&self) -> &'static str {
        MANUAL_ENTRY_MESSAGE
    }
}

impl From<reqwest::Error> for OcrError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            OcrError::Transport(format!("could not reach OCR engine: {e}"))
        } else {
            OcrError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_asks_for_manual_entry() {
        let errors = [
            OcrError::RequestFailed(500),
            OcrError::ProtocolError("missing header".into()),
            OcrError::EngineError("bad image".into()),
            OcrError::EmptyResult,
            OcrError::Timeout { attempts: 15 },
            OcrError::NotConfigured,
            OcrError::Transport("reset".into()),
        ];
        for e in errors {
            assert_eq!(e.user_message(), MANUAL_ENTRY_MESSAGE);
        }
    }

    #[test]
    fn display_includes_status() {
        assert_eq!(OcrError::RequestFailed(503).to_string(), "OCR request failed (503)");
    }
}
