use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use winquote_core::config::ExtractionConfig;
use winquote_core::import::{
    parse_extraction_text, response_schema, CatalogExtractor, ExtractionError,
    ExtractionErrorKind, ExtractionRequest, ExtractionResponse, EXTRACTION_PROMPT,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData { inline_data: InlineData },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Calls `{base_url}/models/{model}:generateContent` with the document inline.
#[derive(Clone)]
pub struct GeminiCatalogExtractor {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for GeminiCatalogExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiCatalogExtractor")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GeminiCatalogExtractor {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        // The pipeline applies its own deadline; this one only bounds stuck sockets.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.saturating_add(5)))
            .build()
            .map_err(|error| {
                ExtractionError::configuration(format!("http client setup failed: {error}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn api_key(&self) -> Result<&str, ExtractionError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().trim())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ExtractionError::configuration("API key missing"))
    }
}

fn build_request_body(request: &ExtractionRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: request.mime_type.clone(),
                        data: request.payload_base64.clone(),
                    },
                },
                Part::Text { text: EXTRACTION_PROMPT.to_string() },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: response_schema(),
        },
    }
}

/// Maps a non-success status to an error category. The upstream body is
/// never copied into the message.
fn classify_status(status: StatusCode) -> ExtractionError {
    match status {
        StatusCode::BAD_REQUEST => {
            ExtractionError::unreadable(format!("upstream rejected the document ({status})"))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ExtractionError::configuration(format!("API key rejected ({status})"))
        }
        StatusCode::NOT_FOUND => {
            ExtractionError::configuration(format!("model or endpoint not found ({status})"))
        }
        _ => ExtractionError::transient(format!("upstream returned {status}")),
    }
}

fn classify_transport(error: &reqwest::Error) -> ExtractionError {
    if error.is_timeout() {
        ExtractionError::new(ExtractionErrorKind::Timeout, "request to extraction service timed out")
    } else if error.is_builder() {
        ExtractionError::configuration("invalid extraction endpoint")
    } else {
        ExtractionError::transient("extraction service unreachable")
    }
}

/// Pulls the JSON text out of the first candidate and parses it as rows.
fn parse_generate_response(body: &str) -> Result<ExtractionResponse, ExtractionError> {
    let response: GenerateContentResponse = serde_json::from_str(body).map_err(|error| {
        ExtractionError::no_data(format!("unexpected response envelope: {error}"))
    })?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    parse_extraction_text(&text)
}

#[async_trait]
impl CatalogExtractor for GeminiCatalogExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError> {
        let api_key = self.api_key()?;
        let body = build_request_body(request);

        debug!(
            event_name = "extraction.request_sent",
            model = %self.model,
            payload_len = request.payload_base64.len(),
            "sending document to extraction service"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                let mapped = classify_transport(&error);
                warn!(
                    event_name = "extraction.transport_failed",
                    kind = ?mapped.kind,
                    "extraction request failed"
                );
                mapped
            })?;

        let status = response.status();
        if !status.is_success() {
            let mapped = classify_status(status);
            warn!(
                event_name = "extraction.upstream_rejected",
                status = status.as_u16(),
                kind = ?mapped.kind,
                "extraction service returned an error status"
            );
            return Err(mapped);
        }

        let text = response.text().await.map_err(|error| classify_transport(&error))?;
        let parsed = parse_generate_response(&text)?;
        debug!(
            event_name = "extraction.response_parsed",
            items = parsed.items.len(),
            "extraction response parsed"
        );
        Ok(parsed)
    }
}
