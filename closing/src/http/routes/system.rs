use std::sync::Arc;

use axum::{extract::Extension, http::header, http::StatusCode, response::IntoResponse};
use serde_json::json;

use closebook_ledger::LedgerStore;

use crate::http::{dto, AppState};

pub async fn health<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
) -> axum::response::Response {
    let state = app.state();
    let status = if state.accepts_requests() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    dto::success(
        status,
        json!({
            "status": if state.accepts_requests() { "ok" } else { "unavailable" },
            "state": state,
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub async fn metrics<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
) -> axum::response::Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        app.service.metrics().to_prometheus(),
    )
        .into_response()
}
