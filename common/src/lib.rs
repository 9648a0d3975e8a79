//! Closebook Common Types
//!
//! This crate contains shared types used across the closebook general ledger,
//! including identifiers, amount helpers, accounting periods and the error type.

pub mod identifiers;
pub mod amount;
pub mod period;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use amount::*;
pub use period::*;
pub use error::*;
pub use time::*;
