//! Gemini `generateContent` client.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CompletionClient;
use crate::config::{ApiKey, Settings};
use crate::diagnostics::{Result, StorycaseError};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";
/// `ErrorInfo.reason` Gemini sends (with HTTP 400) for an unknown or malformed key.
const API_KEY_INVALID: &str = "API_KEY_INVALID";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

impl ApiErrorBody {
    fn rejects_api_key(&self) -> bool {
        self.details
            .iter()
            .any(|detail| detail.reason.as_deref() == Some(API_KEY_INVALID))
    }
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, or why there is none.
    fn into_text(self) -> std::result::Result<String, String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(format!("prompt was blocked ({reason})"));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| "response has no candidates".to_string())?;
        let finish_reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            Err(format!("candidate has no text (finish reason: {finish_reason})"))
        } else {
            Ok(text)
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Blocking client for one Gemini model.
#[derive(Debug)]
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    api_key: ApiKey,
    json_mode: bool,
}

impl GeminiClient {
    pub fn new(settings: &Settings, api_key: ApiKey) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| StorycaseError::ServiceUnavailable {
                message: format!("cannot build HTTP client: {e}"),
                status: None,
                credential_rejected: false,
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            endpoint: endpoint(&settings.api_base, &settings.model),
            api_key,
            json_mode: settings.json_mode,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CompletionClient for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: self.json_mode.then_some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };

        debug!(endpoint = %self.endpoint, "sending generateContent request");
        let response = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&request)
            .send()
            .map_err(|e| StorycaseError::ServiceUnavailable {
                message: format!("request failed: {e}"),
                status: e.status().map(|s| s.as_u16()),
                credential_rejected: false,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| StorycaseError::ServiceUnavailable {
            message: format!("cannot read response body: {e}"),
            status: Some(status.as_u16()),
            credential_rejected: false,
            source: Some(Box::new(e)),
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "generateContent response received");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        reply_text(&body)
    }
}

fn endpoint(api_base: &str, model: &str) -> String {
    format!("{}/models/{}:generateContent", api_base.trim_end_matches('/'), model)
}

/// Maps a non-success response to `ServiceUnavailable`, preferring the service's own
/// error message.
fn status_error(status: StatusCode, body: &str) -> StorycaseError {
    let (detail, key_invalid) = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => {
            let key_invalid = envelope.error.rejects_api_key();
            (envelope.error.message, key_invalid)
        }
        Err(_) => (body.chars().take(200).collect(), false),
    };
    let message = if detail.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", detail.trim())
    };
    if key_invalid {
        StorycaseError::rejected_credential(message, Some(status.as_u16()))
    } else {
        StorycaseError::service(message, Some(status.as_u16()))
    }
}

/// Extracts the generated text from a success body.
fn reply_text(body: &str) -> Result<String> {
    let malformed = |reason: String| StorycaseError::MalformedResponse {
        story_id: None,
        reason,
        raw: body.to_string(),
    };
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| malformed(format!("unexpected response envelope: {e}")))?;
    response.into_text().map_err(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorKind;

    #[test]
    fn endpoint_joins_base_and_model() {
        assert_eq!(
            endpoint("https://example.test/v1beta/", "gemini-2.0-flash-001"),
            "https://example.test/v1beta/models/gemini-2.0-flash-001:generateContent"
        );
    }

    #[test]
    fn client_uses_configured_model() {
        let settings = Settings::default().with_model("gemini-1.5-pro");
        let client = GeminiClient::new(&settings, ApiKey::new("k")).unwrap();
        assert!(client.endpoint().ends_with("/models/gemini-1.5-pro:generateContent"));
    }

    #[test]
    fn request_serializes_in_gemini_shape() {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: "hi" }],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn reply_text_joins_parts_of_first_candidate() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "[{\"Title\":"}, {"text": "\"x\"}]"}]},
                        "finishReason": "STOP"}]}"#;
        assert_eq!(reply_text(body).unwrap(), r#"[{"Title":"x"}]"#);
    }

    #[test]
    fn blocked_prompt_is_malformed() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let err = reply_text(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(err.to_string().contains("SAFETY"));
        assert_eq!(err.raw_reply(), Some(body));
    }

    #[test]
    fn empty_candidate_is_malformed() {
        let body = r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#;
        let err = reply_text(body).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn error_status_uses_service_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#;
        let err = status_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert!(err.to_string().contains("API key not valid"));
        assert!(!err.is_credential_rejection());
    }

    #[test]
    fn invalid_api_key_reason_is_a_credential_rejection() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT",
            "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID",
                         "domain": "googleapis.com"}]}}"#;
        let err = status_error(StatusCode::BAD_REQUEST, body);
        assert!(err.is_credential_rejection());
        assert!(!err.is_row_recoverable());
    }

    #[test]
    fn forbidden_status_is_a_credential_rejection() {
        let err = status_error(StatusCode::FORBIDDEN, "");
        assert!(err.is_credential_rejection());
        assert!(err.to_string().contains("403"));
    }
}
