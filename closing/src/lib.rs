//! Closebook Period Closing
//!
//! Moves revenue and expense balances into retained earnings at period end,
//! validates the result inside the same transaction and manages the
//! OPEN, CLOSED and LOCKED lifecycle of accounting periods.

pub mod builder;
pub mod config;
pub mod http;
pub mod metrics;
pub mod service;
pub mod state;
pub mod validator;

pub use builder::{ClosingLine, ClosingPlan};
pub use config::{ClosingConfig, StoreBackend};
pub use metrics::Metrics;
pub use service::PeriodClosingService;
pub use state::ServiceState;
pub use validator::ClosingValidator;
