use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    NotFound { kind: &'static str, message: String },

    #[error("{message}")]
    BadRequest { kind: &'static str, message: String },

    #[error("Store deadline exceeded")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            kind: "ValidationError",
            message: message.into(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { kind, .. } | AppError::BadRequest { kind, .. } => *kind,
            AppError::Timeout => "Timeout",
            AppError::Internal(_) => "StoreUnavailable",
        }
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        let kind = e.kind();
        let message = e.to_string();
        match e {
            DomainError::NotFound(_) | DomainError::EmptyCatalog(_) => {
                AppError::NotFound { kind, message }
            }
            DomainError::ReferenceNotFound(_)
            | DomainError::Validation(_)
            | DomainError::InvalidWindow(_) => AppError::BadRequest { kind, message },
            DomainError::Timeout => AppError::Timeout,
            DomainError::StoreUnavailable(detail) => AppError::Internal(detail),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Timeout | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Internal(detail) => {
                log::error!("Request failed: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": message,
            "kind": self.kind(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    #[test]
    fn not_found_returns_404() {
        let err: AppError = DomainError::NotFound("order".to_string()).into();
        assert_eq!(err.error_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn empty_catalog_returns_404() {
        let err: AppError = DomainError::EmptyCatalog("food".to_string()).into();
        assert_eq!(err.error_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn input_errors_return_400() {
        for e in [
            DomainError::Validation("quantity".to_string()),
            DomainError::ReferenceNotFound("table".to_string()),
            DomainError::InvalidWindow("start".to_string()),
        ] {
            let err: AppError = e.into();
            assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn store_failures_return_500() {
        let timeout: AppError = DomainError::Timeout.into();
        assert_eq!(
            timeout.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let down: AppError = DomainError::StoreUnavailable("refused".to_string()).into();
        assert!(matches!(down, AppError::Internal(_)));
        assert_eq!(
            down.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn display_keeps_domain_message() {
        let err: AppError = DomainError::NotFound("menu".to_string()).into();
        assert_eq!(err.to_string(), "menu not found");
        assert_eq!(
            AppError::Internal("msg".to_string()).to_string(),
            "Internal error: msg"
        );
    }

    #[actix_web::test]
    async fn body_carries_kind_and_hides_internal_detail() {
        let err: AppError = DomainError::StoreUnavailable("password=secret".to_string()).into();
        let body = to_bytes(err.error_response().into_body())
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["kind"], "StoreUnavailable");
        assert_eq!(json["error"], "Internal server error");

        let err: AppError = DomainError::Validation("quantity is required".to_string()).into();
        let body = to_bytes(err.error_response().into_body())
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["kind"], "ValidationError");
        assert_eq!(json["error"], "Invalid input: quantity is required");
    }
}
