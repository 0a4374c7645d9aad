//! Lookup API Server
//!
//! HTTP front-end over the batch lookup engine. Single lookups and batches
//! both go through the engine, so they share dedup and the checked-set with
//! any batch job running in the same process.

use crate::application::BatchLookupEngine;
use crate::domain::entities::{BatchEntry, BatchReport, EntryStatus, LookupResult};
use crate::domain::errors::BatchError;
use crate::domain::ports::Resolver;
use crate::domain::services::{FlatRecord, ResultFormatter};
use crate::domain::value_objects::{Identifier, Namespace};
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Batch lookup request body.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub namespace: Namespace,
    pub identifiers: Vec<String>,
}

/// One entry of a batch response.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    #[serde(flatten)]
    pub entry: BatchEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<FlatRecord>,
}

/// Batch lookup response.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub namespace: Namespace,
    pub entries: Vec<EntryResponse>,
    pub malformed: Vec<String>,
    pub report: BatchReport,
    pub cancelled: bool,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ip_resolver: bool,
    pub mac_resolver: bool,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<BatchLookupEngine>,
    pub ip_resolver: Option<Arc<dyn Resolver>>,
    pub mac_resolver: Option<Arc<dyn Resolver>>,
}

impl ApiState {
    pub fn new(
        engine: Arc<BatchLookupEngine>,
        ip_resolver: Option<Arc<dyn Resolver>>,
        mac_resolver: Option<Arc<dyn Resolver>>,
    ) -> Self {
        Self {
            engine,
            ip_resolver,
            mac_resolver,
        }
    }

    fn resolver(&self, namespace: Namespace) -> Option<&Arc<dyn Resolver>> {
        match namespace {
            Namespace::Ip => self.ip_resolver.as_ref(),
            Namespace::Mac => self.mac_resolver.as_ref(),
        }
    }
}

/// Build the router. Exposed separately from `ApiServer` for tests.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ip/:ip", post(ip_handler))
        .route("/oui/:mac", post(oui_handler))
        .route("/api/v1/batch", post(batch_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for interactive lookups.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self { listen_addr, state }
    }

    /// Run until the controller signals shutdown.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("lookup API listening on {}", self.listen_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}

// Handler functions

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "detail": message.into() })),
    )
        .into_response()
}

fn batch_error(err: BatchError) -> Response {
    tracing::error!("lookup batch failed: {}", err);
    detail(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "netlookup is running" }))
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ip_resolver: state.ip_resolver.is_some(),
        mac_resolver: state.mac_resolver.is_some(),
    })
}

async fn ip_handler(State(state): State<ApiState>, Path(ip): Path<String>) -> Response {
    single_lookup(&state, Namespace::Ip, ip).await
}

async fn oui_handler(State(state): State<ApiState>, Path(mac): Path<String>) -> Response {
    single_lookup(&state, Namespace::Mac, mac).await
}

async fn single_lookup(state: &ApiState, namespace: Namespace, raw: String) -> Response {
    if let Err(e) = Identifier::parse(namespace, &raw) {
        return detail(StatusCode::BAD_REQUEST, e.to_string());
    }
    let Some(resolver) = state.resolver(namespace) else {
        return detail(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{} resolver is not configured", namespace),
        );
    };

    let outcome = match state
        .engine
        .run_batch(&[raw.as_str()], namespace, resolver.as_ref())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return batch_error(e),
    };

    let Some(entry) = outcome.entries.into_iter().next() else {
        return detail(StatusCode::BAD_REQUEST, format!("invalid {} identifier", namespace));
    };

    if matches!(entry.status, EntryStatus::AlreadyChecked) {
        return (StatusCode::OK, Json(entry)).into_response();
    }
    if matches!(entry.status, EntryStatus::NotAttempted) {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "shutting down");
    }

    match entry.status.lookup() {
        Some(LookupResult::Failure { reason }) => detail(StatusCode::BAD_REQUEST, reason.clone()),
        Some(lookup) => {
            let record = ResultFormatter::format(namespace, &entry.identifier, lookup);
            (StatusCode::OK, Json(record)).into_response()
        }
        None => detail(StatusCode::INTERNAL_SERVER_ERROR, "lookup produced no result"),
    }
}

async fn batch_handler(State(state): State<ApiState>, Json(req): Json<BatchRequest>) -> Response {
    let Some(resolver) = state.resolver(req.namespace) else {
        return detail(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{} resolver is not configured", req.namespace),
        );
    };

    let outcome = match state
        .engine
        .run_batch(&req.identifiers, req.namespace, resolver.as_ref())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return batch_error(e),
    };

    let entries = outcome
        .entries
        .into_iter()
        .map(|entry| {
            let record = entry
                .status
                .lookup()
                .map(|lookup| ResultFormatter::format(outcome.namespace, &entry.identifier, lookup));
            EntryResponse { entry, record }
        })
        .collect();

    Json(BatchResponse {
        namespace: outcome.namespace,
        entries,
        malformed: outcome.malformed,
        report: outcome.report,
        cancelled: outcome.cancelled,
    })
    .into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapCheckedSetStore;
    use crate::config::Config;

    fn state_without_resolvers() -> ApiState {
        let engine = BatchLookupEngine::new(Arc::new(DashMapCheckedSetStore::new()), &Config::default());
        ApiState::new(Arc::new(engine), None, None)
    }

    #[test]
    fn test_resolver_selection() {
        let state = state_without_resolvers();
        assert!(state.resolver(Namespace::Ip).is_none());
        assert!(state.resolver(Namespace::Mac).is_none());
    }

    #[test]
    fn test_batch_request_deserialize() {
        let req: BatchRequest = serde_json::from_str(
            r#"{"namespace":"mac","identifiers":["aa:bb:cc:11:22:33"]}"#,
        )
        .unwrap();
        assert_eq!(req.namespace, Namespace::Mac);
        assert_eq!(req.identifiers.len(), 1);
    }

    #[tokio::test]
    async fn test_single_lookup_without_resolver() {
        let state = state_without_resolvers();
        let response = single_lookup(&state, Namespace::Ip, "8.8.8.8".to_string()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_single_lookup_malformed() {
        let state = state_without_resolvers();
        let response = single_lookup(&state, Namespace::Ip, "nope".to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
