use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::OcrError;

/// An outgoing request to an OCR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequest {
    Get {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Raw body upload (cloud submit).
    PostBytes {
        url: String,
        headers: Vec<(String, String)>,
        content_type: String,
        body: Vec<u8>,
    },
    /// `multipart/form-data` with a single file field (self-hosted service).
    PostMultipart {
        url: String,
        field: String,
        file_name: String,
        content_type: String,
        body: Vec<u8>,
    },
}

impl HttpRequest {
    pub fn url(&self) -> &str {
        match self {
            HttpRequest::Get { url, .. }
            | HttpRequest::PostBytes { url, .. }
            | HttpRequest::PostMultipart { url, .. } => url,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let headers = match self {
            HttpRequest::Get { headers, .. } | HttpRequest::PostBytes { headers, .. } => headers,
            HttpRequest::PostMultipart { .. } => return None,
        };
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status, headers (names lowercased) and body of a completed exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self { status, ..Default::default() }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_json(mut self, value: &serde_json::Value) -> Self {
        self.body = value.to_string().into_bytes();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over the HTTP client used to reach OCR engines.
/// A failed `send` is final; callers never retry it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OcrError>;
}

// ── reqwest backend ───────────────────────────────────────────────────────────

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OcrError> {
        let builder = match request {
            HttpRequest::Get { url, headers } => {
                headers.into_iter().fold(self.client.get(url), |b, (k, v)| b.header(k, v))
            }
            HttpRequest::PostBytes { url, headers, content_type, body } => headers
                .into_iter()
                .fold(self.client.post(url), |b, (k, v)| b.header(k, v))
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body),
            HttpRequest::PostMultipart { url, field, file_name, content_type, body } => {
                let part = reqwest::multipart::Part::bytes(body)
                    .file_name(file_name)
                    .mime_str(&content_type)?;
                let form = reqwest::multipart::Form::new().part(field, part);
                self.client.post(url).multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_lowercase(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}

// ── Mock backend (used for tests) ─────────────────────────────────────────────

/// Replays canned responses in order and records every request it receives.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, OcrError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<HttpResponse, OcrError>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OcrError> {
        let url = request.url().to_string();
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(OcrError::Transport(format!("no scripted response for {url}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_headers_are_case_insensitive() {
        let resp = HttpResponse::new(202).with_header("Operation-Location", "https://x/op/1");
        assert_eq!(resp.header("operation-location"), Some("https://x/op/1"));
        assert_eq!(resp.header("OPERATION-LOCATION"), Some("https://x/op/1"));
        assert!(resp.is_success());
        assert!(!HttpResponse::new(404).is_success());
    }

    #[test]
    fn request_header_lookup() {
        let req = HttpRequest::Get {
            url: "https://x".into(),
            headers: vec![("Ocp-Apim-Subscription-Key".into(), "k".into())],
        };
        assert_eq!(req.header("ocp-apim-subscription-key"), Some("k"));
        assert_eq!(req.url(), "https://x");
    }

    #[tokio::test]
    async fn mock_replays_in_order_then_fails() {
        let mock = MockTransport::new([Ok(HttpResponse::new(200)), Ok(HttpResponse::new(500))]);
        let get = || HttpRequest::Get { url: "https://x".into(), headers: vec![] };

        assert_eq!(mock.send(get()).await.unwrap().status, 200);
        assert_eq!(mock.send(get()).await.unwrap().status, 500);
        assert!(matches!(mock.send(get()).await, Err(OcrError::Transport(_))));
        assert_eq!(mock.requests().len(), 3);
    }
}
