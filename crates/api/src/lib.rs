//! HTTP service for the flexibility negotiation engine.
//!
//! Receives protocol callbacks, starts negotiation flows and serves the
//! audit trail, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{CallbackHandler, Orchestrator, OutboundClient, Transport};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use transaction_store::TransactionStore;

use config::Config;
use routes::AppState;

/// Prefix under which the counterparty delivers callbacks.
pub const CALLBACK_PREFIX: &str = "/beckn/callbacks";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<T: Transport + 'static>(
    state: Arc<AppState<T>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<T>))
        .route(
            &format!("{CALLBACK_PREFIX}/{{action}}"),
            post(routes::callbacks::receive::<T>),
        )
        .route("/audit/{reference}", get(routes::audit::get::<T>))
        .route("/transactions", get(routes::transactions::list::<T>))
        .route("/transactions/{id}", get(routes::transactions::get::<T>))
        .route(
            "/transactions/{id}/status",
            post(routes::transactions::query_status::<T>),
        )
        .route("/flows", post(routes::flows::start::<T>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires one store into the callback handler and the orchestrator.
pub fn create_default_state<T: Transport>(transport: T, config: &Config) -> Arc<AppState<T>> {
    let store = TransactionStore::new();
    let client = OutboundClient::new(
        transport,
        store.clone(),
        config.protocol.clone(),
        config.client.clone(),
    );

    Arc::new(AppState {
        callbacks: CallbackHandler::new(store.clone()),
        orchestrator: Orchestrator::new(client, config.orchestrator.clone()),
        store,
    })
}
