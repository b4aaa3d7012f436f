//! Dialogflow ES (v2) REST client.
//!
//! `POST {base}/v2/projects/{project}/agent/sessions/{session}:detectIntent`
//! with a bearer token. Audio is sent as base64 `inputAudio` with
//! `AUDIO_ENCODING_LINEAR_16`; sample rate is left to the WAV header.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use brew_schemas::{slot_bag_from_json, DetectedIntent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::gateway::{GatewayError, IntentDetector, QueryInput};

pub const DEFAULT_BASE_URL: &str = "https://dialogflow.googleapis.com";

const AUDIO_ENCODING: &str = "AUDIO_ENCODING_LINEAR_16";

/// Everything needed to build a [`DialogflowClient`].
///
/// The access token is resolved from the environment by the caller; it is
/// never logged.
#[derive(Clone)]
pub struct DialogflowSettings {
    pub base_url: String,
    pub project_id: String,
    pub session_id: String,
    pub language_code: String,
    pub timeout: Duration,
    pub access_token: Option<String>,
}

impl std::fmt::Debug for DialogflowSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogflowSettings")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("session_id", &self.session_id)
            .field("language_code", &self.language_code)
            .field("timeout", &self.timeout)
            .field("access_token", &self.access_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[derive(Clone)]
pub struct DialogflowClient {
    http: reqwest::Client,
    endpoint: String,
    language_code: String,
    access_token: String,
}

impl std::fmt::Debug for DialogflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogflowClient")
            .field("endpoint", &self.endpoint)
            .field("language_code", &self.language_code)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

impl DialogflowClient {
    pub fn new(settings: DialogflowSettings) -> Result<Self, GatewayError> {
        let access_token = match settings.access_token {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                return Err(GatewayError::Config(
                    "access token is not set".to_string(),
                ))
            }
        };

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("http client build failed: {e}")))?;

        Ok(Self {
            http,
            endpoint: detect_intent_url(
                &settings.base_url,
                &settings.project_id,
                &settings.session_id,
            ),
            language_code: settings.language_code,
            access_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, input: QueryInput) -> DetectIntentRequest {
        match input {
            QueryInput::Text(text) => DetectIntentRequest {
                query_input: WireQueryInput {
                    text: Some(WireTextInput {
                        text,
                        language_code: self.language_code.clone(),
                    }),
                    audio_config: None,
                },
                input_audio: None,
            },
            QueryInput::Audio(bytes) => DetectIntentRequest {
                query_input: WireQueryInput {
                    text: None,
                    audio_config: Some(WireAudioConfig {
                        audio_encoding: AUDIO_ENCODING,
                        language_code: self.language_code.clone(),
                    }),
                },
                input_audio: Some(BASE64.encode(bytes)),
            },
        }
    }
}

fn detect_intent_url(base_url: &str, project_id: &str, session_id: &str) -> String {
    format!(
        "{}/v2/projects/{}/agent/sessions/{}:detectIntent",
        base_url.trim_end_matches('/'),
        project_id,
        session_id
    )
}

#[async_trait]
impl IntentDetector for DialogflowClient {
    fn name(&self) -> &'static str {
        "dialogflow"
    }

    async fn detect_intent(&self, input: QueryInput) -> Result<DetectedIntent, GatewayError> {
        debug!(kind = input.kind(), "sending query to dialogflow to detect intent");
        let body = self.request_body(input);

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: DetectIntentResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::Decode(format!("unexpected detectIntent shape: {e}")))?;
        let qr = parsed.query_result.unwrap_or_default();

        Ok(DetectedIntent {
            fulfillment_text: qr.fulfillment_text,
            all_required_params_present: qr.all_required_params_present,
            parameters: slot_bag_from_json(&qr.parameters),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest {
    query_input: WireQueryInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireQueryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<WireTextInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_config: Option<WireAudioConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTextInput {
    text: String,
    language_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAudioConfig {
    audio_encoding: &'static str,
    language_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<WireQueryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireQueryResult {
    fulfillment_text: String,
    all_required_params_present: bool,
    parameters: Value,
}
