use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use closebook_common::{parse_date, PeriodId};
use closebook_ledger::LedgerStore;

use crate::http::{dto, errors, AppState};

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/", get(list_periods::<S>))
        .route("/check-date", get(check_date::<S>))
        .route("/:id/lock", post(lock_period::<S>))
        .route("/:id/reopen", post(reopen_period::<S>))
}

fn period_id(path: Result<Path<String>, PathRejection>) -> Result<PeriodId, axum::response::Response> {
    let Path(raw) = path.map_err(errors::path_rejection)?;
    PeriodId::parse(&raw).map_err(|_| errors::invalid_id("period", &raw))
}

pub async fn list_periods<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::PeriodListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return errors::ledger_error(e),
    };

    match app.service.list_periods(&filter).await {
        Ok(page) => dto::success(StatusCode::OK, page),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn check_date<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::CheckDateQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let date = match parse_date(&query.date, "date") {
        Ok(d) => d,
        Err(e) => return errors::ledger_error(e),
    };

    match app.service.period_for_date(date).await {
        Ok(period) => dto::success(
            StatusCode::OK,
            dto::CheckDateResponse {
                date,
                is_closed: period.is_some(),
                period,
            },
        ),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn lock_period<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    path: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let id = match period_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match app.service.lock(id).await {
        Ok(period) => dto::success(StatusCode::OK, period),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn reopen_period<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<dto::ReopenRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let id = match period_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    if body.reason.trim().is_empty() {
        return errors::ledger_error(closebook_common::LedgerError::invalid_field(
            "a reason is required to reopen a period",
            "reason",
        ));
    }

    match app.service.reopen(id, body.reason.trim()).await {
        Ok(result) => dto::success(StatusCode::OK, result),
        Err(e) => errors::ledger_error(e),
    }
}
