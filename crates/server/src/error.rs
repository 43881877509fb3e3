use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use services::services::{
    chat::ChatError, identity::IdentityError, recipes::RecipeServiceError,
    validation::ValidationErrors,
};
use thiserror::Error;
use utils::response::ApiResponse;

const IMAGE_CODES: [&str; 4] = [
    "INVALID_RECIPE_IMAGE",
    "INVALID_COMMENT_IMAGE",
    "FILE_TOO_LARGE",
    "INVALID_FILE_TYPE",
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Recipe(#[from] RecipeServiceError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("invalid form: {0}")]
    InvalidForm(String),
    #[error(transparent)]
    Path(#[from] PathRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error(transparent)]
    Json(#[from] JsonRejection),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Recipe(errors.into())
    }
}

struct ErrorBody {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ErrorBody {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl ApiError {
    /// Status code and wire error code this error is reported with.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        let body = self.body();
        (body.status, body.code)
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Recipe(err) => recipe_error_body(err),
            ApiError::Chat(ChatError::Unavailable) => ErrorBody::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "AI_UNAVAILABLE",
                "The cooking assistant is not available right now",
            ),
            ApiError::Chat(ChatError::InvalidConversation(reason)) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", *reason)
            }
            ApiError::Chat(ChatError::Api(e)) => {
                tracing::error!(error = %e, "Chat completion failed");
                ErrorBody::new(
                    StatusCode::BAD_GATEWAY,
                    "AI_ERROR",
                    "The cooking assistant failed to answer",
                )
            }
            ApiError::Identity(e) => {
                tracing::debug!(error = %e, "Rejected request credentials");
                ErrorBody::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Authentication required")
            }
            ApiError::InvalidForm(message) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "INVALID_FORM", message.clone())
            }
            ApiError::Path(e) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.body_text())
            }
            ApiError::Query(e) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.body_text())
            }
            ApiError::Json(e) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.body_text())
            }
        }
    }
}

fn recipe_error_body(err: &RecipeServiceError) -> ErrorBody {
    match err {
        RecipeServiceError::Validation(errors) => {
            let only_image = !errors.0.is_empty()
                && errors.0.iter().all(|e| IMAGE_CODES.contains(&e.code));
            let (code, message) = if only_image {
                ("INVALID_IMAGE", "The uploaded image was rejected")
            } else {
                ("VALIDATION_FAILED", "One or more fields are invalid")
            };
            ErrorBody::new(StatusCode::BAD_REQUEST, code, message).with_details(json!(errors.0))
        }
        RecipeServiceError::MissingFields(fields) => ErrorBody::new(
            StatusCode::BAD_REQUEST,
            "MISSING_FIELDS",
            format!("Missing required fields: {}", fields.join(", ")),
        )
        .with_details(json!(fields)),
        RecipeServiceError::MissingData(field) => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "MISSING_DATA", field.message.clone())
                .with_details(json!([field]))
        }
        RecipeServiceError::InvalidIngredients(field) => ErrorBody::new(
            StatusCode::BAD_REQUEST,
            "INVALID_INGREDIENTS_FORMAT",
            field.message.clone(),
        )
        .with_details(json!([field])),
        RecipeServiceError::NotFound => {
            ErrorBody::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Recipe not found")
        }
        RecipeServiceError::DraftNotFound => ErrorBody::new(
            StatusCode::NOT_FOUND,
            "DRAFT_NOT_FOUND",
            "Draft not found or expired",
        ),
        RecipeServiceError::DraftForbidden => ErrorBody::new(
            StatusCode::FORBIDDEN,
            "UNAUTHORIZED_DRAFT",
            "You are not authorized to submit this draft",
        ),
        RecipeServiceError::Forbidden => ErrorBody::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Only the author can modify this recipe",
        ),
        RecipeServiceError::Generation(e) => {
            tracing::error!(error = %e, "Recipe generation failed");
            ErrorBody::new(StatusCode::BAD_GATEWAY, "AI_ERROR", "Failed to generate the recipe")
        }
        RecipeServiceError::Storage(e) => {
            tracing::error!(error = %e, "Object storage error");
            ErrorBody::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Failed to store the image",
            )
        }
        RecipeServiceError::Database(e) => {
            tracing::error!(error = %e, "Database error");
            ErrorBody::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Failed to save data",
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        let response = match body.details {
            Some(details) => ApiResponse::<(), Value>::error_with_details(body.code, body.message, details),
            None => ApiResponse::<(), Value>::error(body.code, body.message),
        };
        (body.status, Json(response)).into_response()
    }
}
