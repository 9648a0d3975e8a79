use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Query,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use closebook_ledger::LedgerStore;

use crate::http::{dto, errors, AppState};

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/execute", post(execute::<S>))
        .route("/preview", get(preview::<S>))
        .route("/last-info", get(last_info::<S>))
        .route("/history", get(history::<S>))
}

pub async fn execute<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    body: Result<Json<dto::ExecuteClosingRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let (start, end) = match dto::date_range(&body.start_date, &body.end_date) {
        Ok(r) => r,
        Err(e) => return errors::ledger_error(e),
    };

    match app
        .service
        .execute(start, end, body.description.as_deref().unwrap_or_default())
        .await
    {
        Ok(result) => dto::success(StatusCode::OK, result),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn preview<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::DateRangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let (start, end) = match dto::date_range(&query.start_date, &query.end_date) {
        Ok(r) => r,
        Err(e) => return errors::ledger_error(e),
    };

    match app.service.preview(start, end).await {
        Ok(preview) => dto::success(StatusCode::OK, preview),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn last_info<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
) -> axum::response::Response {
    match app.service.last_closing_info().await {
        Ok(info) => dto::success(StatusCode::OK, info),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn history<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::HistoryQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };

    match app.service.history(query.limit).await {
        Ok(history) => dto::success(StatusCode::OK, history),
        Err(e) => errors::ledger_error(e),
    }
}
