use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use closebook_common::AccountId;
use closebook_ledger::{LedgerStore, NewAccount};

use crate::http::{dto, errors, AppState};

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/", get(list_accounts::<S>).post(create_account::<S>))
        .route("/:id", delete(delete_account::<S>))
}

pub async fn list_accounts<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::AccountListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };

    match app.service.ledger().list_accounts(query.include_deleted).await {
        Ok(accounts) => dto::success(StatusCode::OK, accounts),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn create_account<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match app.service.ledger().create_account(body).await {
        Ok(account) => dto::success(StatusCode::CREATED, account),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn delete_account<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    path: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let Path(raw) = match path {
        Ok(p) => p,
        Err(e) => return errors::path_rejection(e),
    };
    let Ok(id) = AccountId::parse(&raw) else {
        return errors::invalid_id("account", &raw);
    };

    match app.service.ledger().delete_account(id).await {
        Ok(account) => dto::success(StatusCode::OK, account),
        Err(e) => errors::ledger_error(e),
    }
}
