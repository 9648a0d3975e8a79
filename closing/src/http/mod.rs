//! HTTP API wiring.
//!
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request types and the response envelope
//! - `errors.rs`: error responses

use std::sync::Arc;

use axum::{Extension, Router};
use parking_lot::RwLock;
use tower_http::trace::TraceLayer;

use closebook_ledger::LedgerStore;

use crate::service::PeriodClosingService;
use crate::state::ServiceState;

pub mod dto;
pub mod errors;
pub mod routes;

/// Shared state handed to every handler.
pub struct AppState<S> {
    pub service: PeriodClosingService<S>,
    state: RwLock<ServiceState>,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(service: PeriodClosingService<S>) -> Self {
        Self {
            service,
            state: RwLock::new(ServiceState::Starting),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ServiceState) {
        *self.state.write() = state;
    }

    /// Reject writes unless the service is running.
    pub(crate) fn ensure_accepting(&self) -> Result<(), axum::response::Response> {
        let state = self.state();
        if state.accepts_requests() {
            Ok(())
        } else {
            Err(errors::unavailable(state))
        }
    }
}

/// Build the full HTTP router.
pub fn build_app<S: LedgerStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .nest("/api/v1", routes::router::<S>())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
