use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Instruction sent alongside the catalog document.
pub const EXTRACTION_PROMPT: &str = "Analyze this window catalog PDF.
Find the technical data tables (often \"ELENCO PROFILI\").
Extract 10-20 main profiles (Frames/Telai and Sashes/Ante).

Return JSON with:
- artCode (e.g. PL 2001)
- description
- weight (gr/m)
- type ('frame' if Telaio, 'sash' if Anta, else 'other')";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub mime_type: String,
    pub payload_base64: String,
}

/// Raw extraction output. Items stay untyped until the pipeline validates them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionErrorKind {
    /// Missing or rejected credentials, bad endpoint settings.
    Configuration,
    /// Network failures and upstream 5xx; retrying later may help.
    Transient,
    /// The service could not read the document.
    UnreadableInput,
    /// A response arrived but held no usable rows.
    NoData,
    Timeout,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("extraction failed ({kind:?}): {message}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub message: String,
}

impl ExtractionError {
    pub fn new(kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::Configuration, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::Transient, message)
    }

    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::UnreadableInput, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::NoData, message)
    }

    /// Message safe to show an operator; never includes upstream payloads.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ExtractionErrorKind::Configuration => {
                "Extraction is not configured: the API key is missing or was rejected."
            }
            ExtractionErrorKind::Transient => {
                "The extraction service is unavailable. Please retry later."
            }
            ExtractionErrorKind::UnreadableInput => {
                "The PDF could not be read. It may be corrupted or unreadable."
            }
            ExtractionErrorKind::NoData => {
                "No data found in the PDF. Make sure it contains technical tables."
            }
            ExtractionErrorKind::Timeout => "The extraction service did not answer in time.",
        }
    }
}

/// The external capability that turns a base64 PDF into candidate rows.
#[async_trait]
pub trait CatalogExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResponse, ExtractionError>;
}

/// Structured-output contract every extractor must request from its backend.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "artCode": { "type": "STRING", "description": "Article code (e.g., PL 2001)" },
                        "description": { "type": "STRING", "description": "Short description" },
                        "weight": { "type": "NUMBER", "description": "Weight in gr/m" },
                        "type": {
                            "type": "STRING",
                            "description": "Type: 'frame' or 'sash'",
                            "enum": ["frame", "sash", "other"]
                        }
                    },
                    "required": ["artCode", "description", "weight", "type"]
                }
            }
        },
        "required": ["items"]
    })
}

/// Parses the JSON text produced under [`response_schema`].
pub fn parse_extraction_text(text: &str) -> Result<ExtractionResponse, ExtractionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::no_data("extraction returned an empty response"));
    }
    serde_json::from_str::<ExtractionResponse>(trimmed).map_err(|error| {
        ExtractionError::no_data(format!("extraction response is not valid JSON: {error}"))
    })
}
