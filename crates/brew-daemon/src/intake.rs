//! Utterance intake: NLU detect → (maybe) order workflow.
//!
//! Shared by the HTTP handler and `brew order`. If the dialog is not yet
//! complete the fulfillment text is relayed and the workflow never runs.

use std::fmt;

use brew_nlu::{GatewayError, IntentDetector, QueryInput};
use brew_order::{OrderConfirmation, OrderFailure, OrderWorkflow};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Dialog incomplete; text for the customer, verbatim.
    Relay(String),
    Placed(OrderConfirmation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    Gateway(GatewayError),
    Order(OrderFailure),
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeError::Gateway(e) => write!(f, "{e}"),
            IntakeError::Order(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IntakeError {}

pub async fn process_utterance(
    nlu: &dyn IntentDetector,
    workflow: &OrderWorkflow,
    input: QueryInput,
    idempotency_key: Option<&str>,
) -> Result<IntakeOutcome, IntakeError> {
    let detected = nlu.detect_intent(input).await.map_err(|e| {
        error!(error = %e, detector = nlu.name(), "error calling NLU service");
        IntakeError::Gateway(e)
    })?;

    info!(
        fulfillment_text = %detected.fulfillment_text,
        all_required_params_present = detected.all_required_params_present,
        slots = detected.parameters.len(),
        "intent detected"
    );

    if !detected.is_order_ready() {
        return Ok(IntakeOutcome::Relay(detected.fulfillment_text));
    }

    workflow
        .run(&detected.parameters, idempotency_key)
        .await
        .map(IntakeOutcome::Placed)
        .map_err(IntakeError::Order)
}
