use axum::{routing::get, Router};

use closebook_ledger::LedgerStore;

pub mod accounts;
pub mod balances;
pub mod closing;
pub mod journals;
pub mod periods;
pub mod system;

/// Router for everything under `/api/v1`.
pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/health", get(system::health::<S>))
        .route("/metrics", get(system::metrics::<S>))
        .nest("/period-closing", closing::router::<S>())
        .route("/fiscal-closing/history", get(closing::history::<S>))
        .nest("/periods", periods::router::<S>())
        .nest("/accounts", accounts::router::<S>())
        .nest("/journals", journals::router::<S>())
        .nest("/balances", balances::router::<S>())
        .route("/reports/trial-balance", get(balances::trial_balance::<S>))
        .route("/reports/income-statement", get(balances::income_statement::<S>))
}
