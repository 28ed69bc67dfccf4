use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::api::error::ErrorKind;
use crate::edit::EditError;

pub type ApiObject<T> = (StatusCode, Json<T>);

const VALIDATION_ERROR_CODE: &str = "validation_error";
const INTERNAL_ERROR_CODE: &str = "internal_error";

/// Every failed call answers with this body, so clients can branch on
/// `error_code` without parsing `error`.
#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
    error_kind: ErrorKind,
    error_code: &'static str,
}

fn error_body(
    status: StatusCode,
    kind: ErrorKind,
    code: &'static str,
    message: String,
) -> ApiObject<Value> {
    (
        status,
        into_json(ErrorBody {
            ok: false,
            error: message,
            error_kind: kind,
            error_code: code,
        }),
    )
}

pub fn map_edit_error(error: EditError) -> ApiObject<Value> {
    let (status, kind) = match &error {
        EditError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorKind::Validation),
        EditError::Busy | EditError::EmptyHistory | EditError::Superseded => {
            (StatusCode::CONFLICT, ErrorKind::Conflict)
        }
        EditError::NothingToDownload => (StatusCode::NOT_FOUND, ErrorKind::Validation),
        EditError::RemoteEdit(_) => (StatusCode::BAD_GATEWAY, ErrorKind::Provider),
    };
    error_body(status, kind, error.code(), error.to_string())
}

/// Request shape problems caught before the orchestrator sees the request.
pub fn validation_error(message: impl Into<String>) -> ApiObject<Value> {
    error_body(
        StatusCode::BAD_REQUEST,
        ErrorKind::Validation,
        VALIDATION_ERROR_CODE,
        message.into(),
    )
}

/// Blocking-task failures. The detail goes to the log only.
pub fn task_failure(task: &'static str, cause: impl fmt::Display) -> ApiObject<Value> {
    error!(task, cause = %cause, "session task did not complete");
    error_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Infra,
        INTERNAL_ERROR_CODE,
        String::from("Internal server error"),
    )
}

pub fn into_json(payload: impl Serialize) -> Json<Value> {
    match serde_json::to_value(payload) {
        Ok(value) => Json(value),
        Err(e) => {
            error!(error = %e, "response body failed to serialize");
            Json(json!({
                "ok": false,
                "error": "Internal server error",
                "error_kind": ErrorKind::Infra,
                "error_code": INTERNAL_ERROR_CODE,
            }))
        }
    }
}
