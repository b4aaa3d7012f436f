//! Axum router and all HTTP handlers for brew-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers (CORS, tracing) so tests can use the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use brew_nlu::QueryInput;
use brew_order::OrderFailure;
use brew_schemas::format_micros;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info};

use crate::{
    api_types::{HealthResponse, MenuItem, MenuResponse, OrderPlacedEvent},
    intake::{process_utterance, IntakeError, IntakeOutcome},
    state::{AppState, BusMsg},
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const ORDER_ID_HEADER: &str = "x-order-id";
pub const ORDER_REPLAYED_HEADER: &str = "x-order-replayed";

/// WAV uploads are larger than axum's 2 MiB default.
const MAX_ORDER_BODY_BYTES: usize = 16 * 1024 * 1024;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let index = ServeFile::new(state.static_dir.join("index.html"));
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/menu", get(menu))
        .route("/v1/stream", get(stream))
        .route("/v1/order", post(order))
        // Path used by older kiosk builds.
        .route("/order", post(order))
        .layer(DefaultBodyLimit::max(MAX_ORDER_BODY_BYTES))
        .route_service("/", index)
        .nest_service("/static", assets)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            store: st.workflow.store_backend().to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/menu
// ---------------------------------------------------------------------------

pub(crate) async fn menu(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let products = st
        .workflow
        .prices()
        .products()
        .map(|(product_id, micros)| MenuItem {
            product_id: product_id.to_string(),
            price: format_micros(micros),
        })
        .collect();

    (StatusCode::OK, Json(MenuResponse { products }))
}

// ---------------------------------------------------------------------------
// POST /v1/order
// ---------------------------------------------------------------------------

/// Take one utterance (text or WAV), run it through NLU and, when the
/// dialog is complete, through the order workflow.
///
/// Business failures (declined, bad slot, unknown product, duplicate key)
/// answer 200 with an `Error processing order: ...` body. Storage failures
/// answer 500, NLU failures 502.
pub(crate) async fn order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let input = match query_input(&headers, body) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let key = match idempotency_key(&headers) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let outcome = process_utterance(st.nlu.as_ref(), &st.workflow, input, key.as_deref()).await;

    match outcome {
        Ok(IntakeOutcome::Relay(text)) => (StatusCode::OK, text).into_response(),
        Ok(IntakeOutcome::Placed(done)) => {
            st.publish(BusMsg::OrderPlaced(OrderPlacedEvent::from_order(
                &done.order,
                done.replayed,
            )));

            let mut resp = (StatusCode::OK, done.message).into_response();
            if let Ok(v) = HeaderValue::from_str(&done.order.order_id.to_string()) {
                resp.headers_mut().insert(HeaderName::from_static(ORDER_ID_HEADER), v);
            }
            if done.replayed {
                resp.headers_mut().insert(
                    HeaderName::from_static(ORDER_REPLAYED_HEADER),
                    HeaderValue::from_static("true"),
                );
            }
            resp
        }
        Err(IntakeError::Gateway(_)) => {
            (StatusCode::BAD_GATEWAY, "Error calling NLU service").into_response()
        }
        Err(IntakeError::Order(f)) => {
            if f.needs_reconciliation() {
                st.publish(BusMsg::LogLine {
                    level: "ERROR".to_string(),
                    msg: format!("account charged but order not saved: {f}"),
                });
            }
            let status = match f {
                OrderFailure::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::OK,
            };
            info!(code = f.code(), status = status.as_u16(), "order not placed");
            (status, format!("Error processing order: {f}")).into_response()
        }
    }
}

/// Content type decides the query kind. Parameters (`; charset=...`) are ignored.
fn query_input(headers: &HeaderMap, body: Bytes) -> Result<QueryInput, Response> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();

    match media_type.as_str() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => {
            if body.is_empty() {
                return Err((StatusCode::BAD_REQUEST, "Unable to get audio bytes").into_response());
            }
            Ok(QueryInput::Audio(body.to_vec()))
        }
        "text/plain" => {
            let text = String::from_utf8(body.to_vec()).map_err(|_| {
                (StatusCode::BAD_REQUEST, "Order text must be UTF-8").into_response()
            })?;
            if text.trim().is_empty() {
                return Err((StatusCode::BAD_REQUEST, "Order text is empty").into_response());
            }
            Ok(QueryInput::Text(text))
        }
        other => {
            error!(content_type = %other, "unsupported order content type");
            Err((
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be text/plain or audio/wav",
            )
                .into_response())
        }
    }
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, Response> {
    let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = raw
        .to_str()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Idempotency-Key must be ASCII").into_response())?
        .trim();
    if key.is_empty() {
        return Ok(None);
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err((StatusCode::BAD_REQUEST, "Idempotency-Key is too long").into_response());
    }
    Ok(Some(key.to_string()))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
