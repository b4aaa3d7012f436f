//! Gateway boundary: query input, error taxonomy, detector trait.

use std::fmt;

use async_trait::async_trait;
use brew_schemas::DetectedIntent;

// ---------------------------------------------------------------------------
// Query input
// ---------------------------------------------------------------------------

/// One customer utterance as received by the request handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    /// UTF-8 text.
    Text(String),
    /// Raw 16-bit linear PCM (WAV) bytes. Passed through untouched.
    Audio(Vec<u8>),
}

impl QueryInput {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryInput::Text(_) => "text",
            QueryInput::Audio(_) => "audio",
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an [`IntentDetector`] may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Client could not be built (missing token, bad base URL, ...).
    Config(String),
    /// Network or transport failure.
    Transport(String),
    /// No answer within the configured timeout.
    Timeout,
    /// The NLU service answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The handle was shut down.
    Closed,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "nlu config error: {msg}"),
            GatewayError::Transport(msg) => write!(f, "nlu transport error: {msg}"),
            GatewayError::Timeout => write!(f, "nlu request timed out"),
            GatewayError::Api { status, message } => {
                write!(f, "nlu api error status={status}: {message}")
            }
            GatewayError::Decode(msg) => write!(f, "nlu decode error: {msg}"),
            GatewayError::Closed => write!(f, "nlu client is shut down"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ---------------------------------------------------------------------------
// Detector trait
// ---------------------------------------------------------------------------

/// Intent detection contract.
///
/// Object-safe so the daemon can hold an `Arc<dyn IntentDetector>` and tests
/// can swap in a canned detector.
#[async_trait]
pub trait IntentDetector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect_intent(&self, input: QueryInput) -> Result<DetectedIntent, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_carries_status() {
        let e = GatewayError::Api {
            status: 403,
            message: "permission denied".to_string(),
        };
        assert_eq!(e.to_string(), "nlu api error status=403: permission denied");
    }

    #[test]
    fn query_input_kind() {
        assert_eq!(QueryInput::Text("hi".into()).kind(), "text");
        assert_eq!(QueryInput::Audio(vec![0, 1]).kind(), "audio");
    }
}
