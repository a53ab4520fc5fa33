use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000/ocr";
pub const DEFAULT_AZURE_MODEL_ID: &str = "prebuilt-layout";
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-07-31";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown OCR engine '{0}' (expected service, azure or auto)")]
    InvalidEngine(String),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Which OCR engine the client should talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineSelection {
    Service,
    Azure,
    #[default]
    Auto,
}

impl std::str::FromStr for EngineSelection {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "service" => Ok(EngineSelection::Service),
            "azure" => Ok(EngineSelection::Azure),
            "auto" | "" => Ok(EngineSelection::Auto),
            other => Err(ConfigError::InvalidEngine(other.to_string())),
        }
    }
}

impl std::fmt::Display for EngineSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineSelection::Service => write!(f, "service"),
            EngineSelection::Azure => write!(f, "azure"),
            EngineSelection::Auto => write!(f, "auto"),
        }
    }
}

/// The engine actually used once `Auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Service,
    Azure,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Service => write!(f, "service"),
            Engine::Azure => write!(f, "azure"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    pub endpoint: String,
    pub api_key: String,
    pub model_id: String,
    pub api_version: String,
}

impl AzureCredentials {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_id: DEFAULT_AZURE_MODEL_ID.to_string(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        }
    }

    /// URL that starts an analyze operation.
    pub fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.model_id,
            self.api_version
        )
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub engine: EngineSelection,
    pub service_url: String,
    pub azure: Option<AzureCredentials>,
    pub http_timeout: Duration,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: EngineSelection::Auto,
            service_url: DEFAULT_SERVICE_URL.to_string(),
            azure: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl OcrConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from a fixed map (useful for testing).
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let engine = match get("OCR_ENGINE") {
            Some(raw) => raw.parse()?,
            None => EngineSelection::Auto,
        };

        let service_url = get("OCR_SERVICE_URL").unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());

        let azure = match (get("AZURE_OCR_ENDPOINT"), get("AZURE_OCR_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(AzureCredentials {
                endpoint,
                api_key,
                model_id: get("AZURE_OCR_MODEL_ID")
                    .unwrap_or_else(|| DEFAULT_AZURE_MODEL_ID.to_string()),
                api_version: get("AZURE_OCR_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            }),
            _ => None,
        };

        let http_timeout = match get("OCR_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue {
                    key: "OCR_HTTP_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => DEFAULT_HTTP_TIMEOUT,
        };

        Ok(Self {
            engine,
            service_url,
            azure,
            http_timeout,
        })
    }

    /// Resolve `Auto`: cloud when credentials are present, self-hosted otherwise.
    /// `None` means the cloud engine was requested without credentials.
    pub fn resolve_engine(&self) -> Option<Engine> {
        match (self.engine, self.azure.is_some()) {
            (EngineSelection::Service, _) => Some(Engine::Service),
            (EngineSelection::Azure, true) | (EngineSelection::Auto, true) => Some(Engine::Azure),
            (EngineSelection::Azure, false) => None,
            (EngineSelection::Auto, false) => Some(Engine::Service),
        }
    }
}
