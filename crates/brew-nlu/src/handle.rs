//! Lazily-built, shareable NLU client handle.
//!
//! The first detect call builds the client; later calls reuse it. A failed
//! build is not cached, so the next request tries again. After `shutdown()`
//! every call fails with [`GatewayError::Closed`].

use std::sync::Arc;

use async_trait::async_trait;
use brew_schemas::DetectedIntent;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dialogflow::{DialogflowClient, DialogflowSettings};
use crate::gateway::{GatewayError, IntentDetector, QueryInput};

type Factory = Box<dyn Fn() -> Result<Arc<dyn IntentDetector>, GatewayError> + Send + Sync>;

enum HandleState {
    Idle,
    Ready(Arc<dyn IntentDetector>),
    Closed,
}

pub struct NluHandle {
    factory: Factory,
    state: Mutex<HandleState>,
}

impl NluHandle {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn IntentDetector>, GatewayError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            state: Mutex::new(HandleState::Idle),
        }
    }

    /// Handle that builds a [`DialogflowClient`] on first use.
    pub fn dialogflow(settings: DialogflowSettings) -> Self {
        Self::new(move || {
            let client = DialogflowClient::new(settings.clone())?;
            Ok(Arc::new(client) as Arc<dyn IntentDetector>)
        })
    }

    pub async fn is_initialized(&self) -> bool {
        matches!(*self.state.lock().await, HandleState::Ready(_))
    }

    /// Drop the client. Idempotent.
    pub async fn shutdown(&self) {
        let mut g = self.state.lock().await;
        if matches!(*g, HandleState::Ready(_)) {
            info!("closing NLU client");
        }
        *g = HandleState::Closed;
    }

    async fn client(&self) -> Result<Arc<dyn IntentDetector>, GatewayError> {
        let mut g = self.state.lock().await;
        match &*g {
            HandleState::Ready(c) => {
                debug!("using existing NLU client");
                return Ok(c.clone());
            }
            HandleState::Closed => return Err(GatewayError::Closed),
            HandleState::Idle => {}
        }

        info!("lazily creating NLU client");
        let c = (self.factory)().map_err(|e| {
            warn!(error = %e, "creating NLU client failed");
            e
        })?;
        *g = HandleState::Ready(c.clone());
        Ok(c)
    }
}

#[async_trait]
impl IntentDetector for NluHandle {
    fn name(&self) -> &'static str {
        "nlu-handle"
    }

    async fn detect_intent(&self, input: QueryInput) -> Result<DetectedIntent, GatewayError> {
        // Lock is released before the network call.
        let client = self.client().await?;
        client.detect_intent(input).await
    }
}
