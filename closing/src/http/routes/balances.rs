use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::Utc;

use closebook_common::DateRange;
use closebook_ledger::LedgerStore;

use crate::http::{dto, errors, AppState};

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/", get(list::<S>))
        .route("/rebuild", post(rebuild::<S>))
        .route("/verify", get(verify::<S>))
}

pub async fn list<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::BalancesQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let cutoff = match query.to_cutoff() {
        Ok(c) => c,
        Err(e) => return errors::ledger_error(e),
    };

    match app.service.ledger().balances(cutoff).await {
        Ok(balances) => dto::success(StatusCode::OK, balances),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn rebuild<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }

    match app.service.rebuild_balances().await {
        Ok(summary) => dto::success(StatusCode::OK, summary),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn verify<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
) -> axum::response::Response {
    match app.service.ledger().verify().await {
        Ok(report) => dto::success(StatusCode::OK, report),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn trial_balance<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::TrialBalanceQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let as_of = match query.as_of(Utc::now().date_naive()) {
        Ok(d) => d,
        Err(e) => return errors::ledger_error(e),
    };

    match app.service.ledger().trial_balance(as_of).await {
        Ok(tb) => dto::success(StatusCode::OK, tb),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn income_statement<S: LedgerStore>(
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

    match app.service.ledger().income_statement(DateRange { start, end }).await {
        Ok(statement) => dto::success(StatusCode::OK, statement),
        Err(e) => errors::ledger_error(e),
    }
}
