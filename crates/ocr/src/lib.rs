pub mod client;
pub mod config;
pub mod error;
pub mod parse;
pub mod poll;
pub mod session;
pub mod transport;
pub mod types;
pub mod upload;

pub use client::OcrClient;
pub use config::{AzureCredentials, ConfigError, Engine, EngineSelection, OcrConfig};
pub use error::{OcrError, MANUAL_ENTRY_MESSAGE};
pub use parse::{ParseOutcome, Strategy};
pub use poll::{next_delay, PollState};
pub use session::{parse_tip_amount, Generation, TipReport, TipSession};
pub use transport::{HttpRequest, HttpResponse, MockTransport, ReqwestTransport, Transport};
pub use types::{Lenient, OcrOutcome, RawTextBlock, TableCell};
pub use upload::UploadFile;
