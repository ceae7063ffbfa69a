use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::StoreError;
use crate::progression::ProgressionError;
use crate::services::progress::ProgressServiceError;

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse {
        success: true,
        data,
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    is_operational: bool,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
        }
    }
}

impl From<ProgressionError> for AppError {
    fn from(err: ProgressionError) -> Self {
        match err {
            ProgressionError::UnknownChallenge(id) => {
                Self::not_found(format!("Défi introuvable: {id}"))
            }
            ProgressionError::InvalidCurve { .. } | ProgressionError::InvalidCatalog(_) => {
                Self::internal(err.to_string())
            }
            other => Self::validation(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::not_found(format!("Apprenant introuvable: {id}")),
            StoreError::Conflict(id) => Self::conflict(format!("Apprenant déjà existant: {id}")),
            StoreError::Sqlx(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                Self::service_unavailable("Base de données indisponible")
            }
            other => {
                tracing::error!(error = %other, "store error");
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<ProgressServiceError> for AppError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::Validation(message) => Self::validation(message),
            ProgressServiceError::Progression(err) => err.into(),
            ProgressServiceError::Store(err) => err.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(format!("Corps de requête invalide: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(format!("Paramètres invalides: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            "Erreur interne du serveur".to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progression_errors_map_to_validation() {
        let err = AppError::from(ProgressionError::NegativeXp(-5));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = AppError::from(ProgressionError::InvalidScore(120));
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_unknown_challenge_is_not_found() {
        let err = AppError::from(ProgressionError::UnknownChallenge("nope".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_errors() {
        assert_eq!(
            AppError::from(StoreError::NotFound("u1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::Conflict("u1".into())).code(),
            "CONFLICT"
        );
        assert_eq!(
            AppError::from(StoreError::Sqlx(sqlx::Error::PoolTimedOut)).code(),
            "SERVICE_UNAVAILABLE"
        );
        assert_eq!(
            AppError::from(StoreError::Decode("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
