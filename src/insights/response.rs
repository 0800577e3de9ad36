use serde::Serialize;

use crate::error::Error;

/// Successful response envelope: `{"status": "success", "data": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// Failure envelope. Client errors carry their message and status
/// `"error"`; anything else is reported as a `"fatal"` internal error
/// without leaking details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: &'static str,
    pub status_code: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_error(err: &Error) -> Self {
        let status_code = err.status_code();
        if err.is_client_error() || matches!(err, Error::NotFound(_) | Error::Timeout(_)) {
            Self {
                status: "error",
                status_code,
                message: err.to_string(),
            }
        } else {
            Self {
                status: "fatal",
                status_code,
                message: "internal server error".to_string(),
            }
        }
    }
}
