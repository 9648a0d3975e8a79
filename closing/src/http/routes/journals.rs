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

use closebook_common::JournalId;
use closebook_ledger::LedgerStore;

use crate::http::{dto, errors, AppState};

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/", get(list_entries::<S>).post(create_entry::<S>))
        .route("/:id", get(get_entry::<S>))
        .route("/:id/post", post(post_entry::<S>))
        .route("/:id/void", post(void_entry::<S>))
}

fn journal_id(path: Result<Path<String>, PathRejection>) -> Result<JournalId, axum::response::Response> {
    let Path(raw) = path.map_err(errors::path_rejection)?;
    JournalId::parse(&raw).map_err(|_| errors::invalid_id("journal", &raw))
}

pub async fn create_entry<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    body: Result<Json<dto::CreateJournalRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let auto_post = body.auto_post;
    let request = match body.to_entry() {
        Ok(r) => r,
        Err(e) => return errors::ledger_error(e),
    };

    match app.service.ledger().create_entry(request, auto_post).await {
        Ok(entry) => {
            if auto_post {
                app.service.metrics().entry_posted();
            }
            dto::success(StatusCode::CREATED, entry)
        }
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn list_entries<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    query: Result<Query<dto::JournalListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return errors::ledger_error(e),
    };

    match app.service.ledger().list_entries(&filter).await {
        Ok(entries) => dto::success(StatusCode::OK, entries),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn get_entry<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    path: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    let id = match journal_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match app.service.ledger().get_entry(id).await {
        Ok(entry) => dto::success(StatusCode::OK, entry),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn post_entry<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    path: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let id = match journal_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match app.service.post_entry(id).await {
        Ok(entry) => dto::success(StatusCode::OK, entry),
        Err(e) => errors::ledger_error(e),
    }
}

pub async fn void_entry<S: LedgerStore>(
    Extension(app): Extension<Arc<AppState<S>>>,
    path: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    if let Err(resp) = app.ensure_accepting() {
        return resp;
    }
    let id = match journal_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match app.service.void_entry(id).await {
        Ok(entry) => dto::success(StatusCode::OK, entry),
        Err(e) => errors::ledger_error(e),
    }
}
