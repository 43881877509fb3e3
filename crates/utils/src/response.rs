use serde::{Deserialize, Serialize};

/// JSON envelope shared by every endpoint.
///
/// Successful responses carry `data`; failures carry a fixed `error` code,
/// a human readable `message` and optionally structured `details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T, E = serde_json::Value> {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<E>,
}

impl<T, E> ApiResponse<T, E> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            details: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(code.into()),
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn error_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: E,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::error(code, message)
        }
    }
}
