//! NLU gateway: turns an utterance (text or audio) into a [`DetectedIntent`].
//!
//! The order path only sees the [`IntentDetector`] trait. The concrete
//! client talks to Dialogflow's REST `detectIntent` endpoint and is built
//! lazily through an [`NluHandle`].
//!
//! [`DetectedIntent`]: brew_schemas::DetectedIntent

pub mod dialogflow;
pub mod gateway;
pub mod handle;

pub use dialogflow::{DialogflowClient, DialogflowSettings, DEFAULT_BASE_URL};
pub use gateway::{GatewayError, IntentDetector, QueryInput};
pub use handle::NluHandle;
