use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use custody_application::AppError;
use custody_domain::TransitionError;

#[derive(Debug)]
pub enum HttpError {
    Unauthorized,
    Forbidden,
    BadRequest { code: &'static str, message: String },
    NotFound(String),
    Conflict { code: &'static str, message: String },
    Internal(String),
}

impl HttpError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::BadRequest {
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden => StatusCode::FORBIDDEN,
            HttpError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Conflict { .. } => StatusCode::CONFLICT,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TransitionError> for HttpError {
    fn from(value: TransitionError) -> Self {
        let code = value.code();
        let message = value.to_string();
        match value {
            TransitionError::NotFound(_) => HttpError::NotFound(message),
            TransitionError::InvalidTransition { .. }
            | TransitionError::TerminalState { .. }
            | TransitionError::TimestampRegression { .. } => HttpError::Conflict { code, message },
            TransitionError::TimestampInFuture { .. }
            | TransitionError::ReportNotAccepted { .. }
            | TransitionError::InvalidLocation(_)
            | TransitionError::InvalidActor(_) => HttpError::BadRequest { code, message },
        }
    }
}

impl From<AppError> for HttpError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::Unauthorized => HttpError::Unauthorized,
            AppError::Forbidden => HttpError::Forbidden,
            AppError::BadRequest(msg) => HttpError::bad_request(msg),
            AppError::NotFound(msg) => HttpError::NotFound(msg),
            AppError::Conflict(msg) => HttpError::Conflict {
                code: "write_conflict",
                message: msg,
            },
            AppError::Transition(err) => err.into(),
            AppError::Registration(err) => HttpError::BadRequest {
                code: "invalid_shipment",
                message: err.to_string(),
            },
            AppError::Internal(err) => {
                error!("request failed: {:#}", err);
                HttpError::Internal("internal error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(value: JsonRejection) -> Self {
        HttpError::bad_request(value.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    error: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            HttpError::Unauthorized => ("unauthorized", "unauthorized".to_string()),
            HttpError::Forbidden => ("forbidden", "administrator role required".to_string()),
            HttpError::BadRequest { code, message } => (code, message),
            HttpError::NotFound(msg) => ("not_found", msg),
            HttpError::Conflict { code, message } => (code, message),
            HttpError::Internal(msg) => ("internal", msg),
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                code,
                error: message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_domain::{ShipmentId, ShipmentStatus};

    #[test]
    fn transition_errors_map_to_statuses() {
        let cases = [
            (TransitionError::NotFound(ShipmentId::new()), StatusCode::NOT_FOUND),
            (
                TransitionError::InvalidTransition {
                    from: ShipmentStatus::Created,
                    to: ShipmentStatus::Sorting,
                },
                StatusCode::CONFLICT,
            ),
            (
                TransitionError::TerminalState {
                    status: ShipmentStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (
                TransitionError::ReportNotAccepted {
                    stage: ShipmentStatus::Delivered,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                TransitionError::InvalidLocation("latitude".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                TransitionError::TimestampInFuture {
                    requested: chrono::Utc::now() + chrono::Duration::days(1),
                    now: chrono::Utc::now(),
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError::from(AppError::from(err)).status(), status);
        }
    }

    #[test]
    fn gate_refusals_keep_their_status() {
        assert_eq!(
            HttpError::from(AppError::Unauthorized).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(HttpError::from(AppError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            HttpError::from(AppError::Internal(anyhow::anyhow!("db down"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = HttpError::from(AppError::Internal(anyhow::anyhow!(
            "error returned from database: password authentication failed"
        )));
        match err {
            HttpError::Internal(message) => assert_eq!(message, "internal error"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
