use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use subcast_schema::ErrorBody;
use thiserror::Error as ThisError;
use tracing::{error, warn};

#[derive(Debug, ThisError)]
pub enum SubcastError {
    /// User-facing validation failure, rendered as a 400 with `code`.
    #[error("{message}")]
    Jsonable { code: &'static str, message: String },

    #[error("Bad event queue id: {0}")]
    BadEventQueueId(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A caller passed objects that violate an action's preconditions.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Event queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl SubcastError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        SubcastError::Jsonable {
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn insufficient_permission() -> Self {
        SubcastError::Jsonable {
            code: "UNAUTHORIZED_PRINCIPAL",
            message: "Insufficient permission".to_string(),
        }
    }

    pub fn admin_required() -> Self {
        SubcastError::Jsonable {
            code: "UNAUTHORIZED_PRINCIPAL",
            message: "Must be an organization administrator".to_string(),
        }
    }

    /// Stable machine-readable code for logs and tests.
    pub fn code(&self) -> &'static str {
        match self {
            SubcastError::Jsonable { code, .. } => code,
            SubcastError::BadEventQueueId(_) => "BAD_EVENT_QUEUE_ID",
            SubcastError::Unauthorized(_) => "UNAUTHORIZED",
            SubcastError::NotFound(_) => "NOT_FOUND",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for SubcastError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::BytesRejection(e) => {
                SubcastError::UnexpectedError(format!("Failed to read request body: {e}"))
            }
            other => SubcastError::bad_request(other.body_text()),
        }
    }
}

impl From<QueryRejection> for SubcastError {
    fn from(rejection: QueryRejection) -> Self {
        SubcastError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for SubcastError {
    fn from(rejection: PathRejection) -> Self {
        SubcastError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for SubcastError {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        let (status, body) = match self {
            SubcastError::Jsonable { code, message } => {
                (StatusCode::BAD_REQUEST, ErrorBody::new(code, message))
            }
            SubcastError::BadEventQueueId(queue_id) => {
                let mut body =
                    ErrorBody::new(code, format!("Bad event queue ID: {queue_id}"));
                body.queue_id = Some(queue_id);
                (StatusCode::BAD_REQUEST, body)
            }
            SubcastError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new(code, reason))
            }
            SubcastError::NotFound(what) => (StatusCode::NOT_FOUND, ErrorBody::new(code, what)),
            internal @ (SubcastError::ContractViolation(_)
            | SubcastError::QueueUnavailable(_)
            | SubcastError::JsonError(_)
            | SubcastError::IoError(_)
            | SubcastError::UnexpectedError(_)
            | SubcastError::RactorError(_)
            | SubcastError::DatabaseError(_)) => {
                error!(error = %internal, "request failed with an internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(code, "An internal server error occurred."),
                )
            }
        };
        if status.is_client_error() {
            warn!(code, msg = %body.msg, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: SubcastError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_render_as_400_with_code() {
        let (status, body) = render(SubcastError::bad_request("Invalid channel ID")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"], "error");
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["msg"], "Invalid channel ID");
    }

    #[tokio::test]
    async fn bad_queue_id_echoes_the_queue() {
        let (status, body) = render(SubcastError::BadEventQueueId("q1".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_EVENT_QUEUE_ID");
        assert_eq!(body["queue_id"], "q1");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) =
            render(SubcastError::ContractViolation("stream 4 not in realm 1".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["msg"], "An internal server error occurred.");
    }
}
