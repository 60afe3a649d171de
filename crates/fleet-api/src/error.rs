use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fleet_db::DbError;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

pub const INVALID_VEHICLE_ID: &str = "Invalid Vehicle Id";
pub const MISSING_REQUIRED_FIELD: &str = "Invalid Request. A required field is missing.";
pub const NO_VALID_FIELDS: &str = "Invalid Request. The update does not contain any valid fields.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Not Found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        tracing::debug!(%errors, "request validation failed");
        Self::Validation(MISSING_REQUIRED_FIELD.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Database(err) => {
                tracing::error!(error = %err, "database operation failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
