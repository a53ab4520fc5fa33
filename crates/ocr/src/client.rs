use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::{AzureCredentials, Engine, OcrConfig};
use crate::error::OcrError;
use crate::parse;
use crate::poll::{self, PollState};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::types::{AnalyzeOperation, OcrOutcome, ServicePayload};
use crate::upload::UploadFile;

const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";
const RETRY_AFTER: &str = "retry-after";
const MULTIPART_FIELD: &str = "file";

/// Resolved engine plus whatever it needs to be reached.
#[derive(Debug, Clone)]
enum Target {
    Service { url: String },
    Azure(AzureCredentials),
}

/// Sends schedule images to the configured OCR engine and normalizes the answer.
pub struct OcrClient<T: Transport> {
    transport: T,
    target: Target,
}

impl OcrClient<ReqwestTransport> {
    /// Client backed by a real HTTP stack.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let transport = ReqwestTransport::new(config.http_timeout)?;
        Self::new(config, transport)
    }
}

impl<T: Transport> OcrClient<T> {
    /// Fails with [`OcrError::NotConfigured`] when the cloud engine is requested
    /// without credentials.
    pub fn new(config: &OcrConfig, transport: T) -> Result<Self, OcrError> {
        let target = match config.resolve_engine() {
            Some(Engine::Service) => Target::Service { url: config.service_url.clone() },
            Some(Engine::Azure) => match &config.azure {
                Some(creds) => Target::Azure(creds.clone()),
                None => return Err(OcrError::NotConfigured),
            },
            None => return Err(OcrError::NotConfigured),
        };
        debug!(selection = %config.engine, ?target, "OCR client configured");
        Ok(Self { transport, target })
    }

    pub fn engine(&self) -> Engine {
        match self.target {
            Target::Service { .. } => Engine::Service,
            Target::Azure(_) => Engine::Azure,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run OCR over one upload.
    pub async fn recognize(&self, file: &UploadFile) -> Result<OcrOutcome, OcrError> {
        info!(
            engine = %self.engine(),
            file = %file.file_name,
            content_type = %file.content_type,
            bytes = file.bytes.len(),
            "Starting OCR"
        );
        let outcome = match &self.target {
            Target::Service { url } => self.recognize_service(url, file).await?,
            Target::Azure(creds) => self.recognize_azure(creds, file).await?,
        };
        info!(
            engine = %outcome.engine,
            rows = outcome.rows.len(),
            dropped = outcome.dropped,
            confidence = outcome.average_confidence,
            "OCR finished"
        );
        Ok(outcome)
    }

    // ── Self-hosted service ───────────────────────────────────────────────────

    async fn recognize_service(&self, url: &str, file: &UploadFile) -> Result<OcrOutcome, OcrError> {
        let response = self
            .transport
            .send(HttpRequest::PostMultipart {
                url: url.to_string(),
                field: MULTIPART_FIELD.to_string(),
                file_name: file.file_name.clone(),
                content_type: file.content_type.clone(),
                body: file.bytes.clone(),
            })
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "OCR service rejected upload");
            return Err(OcrError::RequestFailed(response.status));
        }

        let payload: ServicePayload = decode_json(&response)?;
        Ok(parse::normalize_service_payload(payload))
    }

    // ── Cloud analyze operation ───────────────────────────────────────────────

    async fn recognize_azure(
        &self,
        creds: &AzureCredentials,
        file: &UploadFile,
    ) -> Result<OcrOutcome, OcrError> {
        let mut state = self.submit(creds, file).await?;

        while let Some((location, delay, attempt)) =
            state.pending().map(|(l, d, a)| (l.to_string(), d, a))
        {
            tokio::time::sleep(delay).await;

            let response = self
                .transport
                .send(HttpRequest::Get {
                    url: location,
                    headers: key_header(creds),
                })
                .await?;
            if !response.is_success() {
                warn!(status = response.status, attempt, "Analyze poll rejected");
                return Err(OcrError::RequestFailed(response.status));
            }

            let operation: AnalyzeOperation = decode_json(&response)?;
            let hint = poll::parse_retry_after(response.header(RETRY_AFTER));
            debug!(
                attempt,
                status = %operation.status,
                delay_ms = delay.as_millis() as u64,
                "Polled analyze operation"
            );
            state = state.step(operation, hint);
        }

        match state {
            PollState::Succeeded(result) => {
                let outcome = parse::normalize_analyze_result(&result);
                if outcome.rows.is_empty() {
                    return Err(OcrError::EmptyResult);
                }
                Ok(outcome)
            }
            PollState::Failed(message) => Err(OcrError::EngineError(message)),
            PollState::TimedOut { attempts } => Err(OcrError::Timeout { attempts }),
            PollState::Submitted { .. } | PollState::Polling { .. } => {
                Err(OcrError::ProtocolError("poll loop ended while pending".into()))
            }
        }
    }

    async fn submit(&self, creds: &AzureCredentials, file: &UploadFile) -> Result<PollState, OcrError> {
        let response = self
            .transport
            .send(HttpRequest::PostBytes {
                url: creds.analyze_url(),
                headers: key_header(creds),
                content_type: file.content_type.clone(),
                body: file.bytes.clone(),
            })
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Analyze request rejected");
            return Err(OcrError::RequestFailed(response.status));
        }
        if response.status != 202 {
            return Err(OcrError::ProtocolError(format!(
                "expected 202 Accepted, got {}",
                response.status
            )));
        }

        let location = response
            .header(OPERATION_LOCATION)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| OcrError::ProtocolError("no Operation-Location in response".into()))?;
        let retry_after = poll::parse_retry_after(response.header(RETRY_AFTER));

        debug!(%location, ?retry_after, "Analyze operation accepted");
        Ok(PollState::submitted(location, retry_after))
    }
}

fn key_header(creds: &AzureCredentials) -> Vec<(String, String)> {
    vec![(API_KEY_HEADER.to_string(), creds.api_key.clone())]
}

fn decode_json<D: DeserializeOwned>(response: &HttpResponse) -> Result<D, OcrError> {
    serde_json::from_slice(&response.body)
        .map_err(|e| OcrError::ProtocolError(format!("invalid JSON body: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
