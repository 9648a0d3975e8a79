use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Value};
use tracing::error;

use closebook_common::{ErrorCategory, LedgerError};

use crate::state::ServiceState;

pub fn json_error(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    details: Option<Value>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

pub fn status_for(err: &LedgerError) -> StatusCode {
    match err.category() {
        ErrorCategory::Invalid => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Integrity => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn ledger_error(err: LedgerError) -> axum::response::Response {
    let status = status_for(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, code = err.error_code(), "Request failed");
    }
    json_error(status, err.error_code(), err.to_string(), err.details())
}

pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text(), None)
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text(), None)
}

pub fn path_rejection(rejection: PathRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text(), None)
}

pub fn invalid_id(kind: &str, value: &str) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "INVALID_REQUEST",
        format!("{value} is not a valid {kind} id"),
        Some(json!({ "field": "id" })),
    )
}

pub fn unavailable(state: ServiceState) -> axum::response::Response {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "SERVICE_UNAVAILABLE",
        format!("service is {}", state.as_str()),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use closebook_common::{AccountId, PeriodId, UnbalancedAccount, ValidationCheck};
    use rust_decimal::Decimal;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&LedgerError::invalid("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&LedgerError::PeriodNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&LedgerError::PeriodLocked(PeriodId::new())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&LedgerError::DatabaseError("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let failed = LedgerError::ValidationFailed {
            accounts: vec![UnbalancedAccount {
                account_id: AccountId::new(),
                code: "4101".into(),
                name: "Sales".into(),
                check: ValidationCheck::ZeroBalance,
                expected: Decimal::ZERO,
                actual: Decimal::ONE,
            }],
        };
        assert_eq!(status_for(&failed), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ledger_error(failed).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
