use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use db::DbErr;
use serde_json::json;
use services::services::error::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Service(err) => match err {
                ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
                ServiceError::IncompleteTasks { .. } => (StatusCode::BAD_REQUEST, "ConflictError"),
                ServiceError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "AuthError"),
                ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
                ServiceError::RateLimited { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "RateLimitError")
                }
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
                ServiceError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
                ServiceError::Database(DbErr::RecordNotFound(_)) => {
                    (StatusCode::NOT_FOUND, "NotFoundError")
                }
                ServiceError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
                ServiceError::Password(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PasswordError"),
                ServiceError::Token(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TokenError"),
                ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            },
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "AuthError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ApiError::Service(ServiceError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();

        let error_message = if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
            "Server error".to_string()
        } else {
            match &self {
                ApiError::Service(ServiceError::Database(DbErr::RecordNotFound(msg))) => {
                    msg.clone()
                }
                _ => self.to_string(),
            }
        };

        let mut response = (status_code, Json(json!({ "error": error_message }))).into_response();
        if let Some(secs) = self.retry_after_secs() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let response = ApiError::from(ServiceError::RateLimited {
            retry_after_secs: 42,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from(42u64)
        );
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("42 seconds"));
    }

    #[tokio::test]
    async fn incomplete_tasks_is_a_bad_request() {
        let response = ApiError::from(ServiceError::IncompleteTasks { count: 2 }).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(
            json["error"],
            "Cannot complete project with 2 undone tasks. All tasks must be completed first."
        );
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let response = ApiError::from(ServiceError::Database(DbErr::Custom("disk on fire".into())))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Server error");
    }

    #[tokio::test]
    async fn conflict_and_forbidden_keep_their_messages() {
        let response =
            ApiError::from(ServiceError::Conflict("Email already exists".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "Email already exists");

        let response = ApiError::from(ServiceError::forbidden("Forbidden")).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
