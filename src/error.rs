use thiserror::Error;

/// Failures of one catalog search request.
///
/// Transport failures (`Connect`, `Timeout`, `Parse`), HTTP status failures
/// and business failures (HTTP 200 with a failure code in the body) all lead
/// to the same rollback; they differ only in the message shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid response body: {0}")]
    Parse(String),

    #[error("HTTP {status}")]
    Status {
        status: u16,
        /// `msg` or `error` field from the response body, if any.
        detail: Option<String>,
    },

    #[error("catalog error {code}: {msg}")]
    Business { code: String, msg: String },
}

impl SearchError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SearchError::Connect(_) | SearchError::Timeout | SearchError::Parse(_)
        )
    }

    /// Single human-readable message for display.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Connect(_) => {
                "Network connection failed, please check your connection".to_owned()
            }
            SearchError::Timeout => "The request timed out, please try again later".to_owned(),
            SearchError::Parse(_) => "Failed to read the server response".to_owned(),
            SearchError::Status { detail: Some(detail), .. } if !detail.trim().is_empty() => {
                detail.clone()
            }
            SearchError::Status { status, .. } => status_message(*status),
            SearchError::Business { msg, .. } if !msg.trim().is_empty() => msg.clone(),
            SearchError::Business { .. } => {
                "The operation failed, please try again later".to_owned()
            }
        }
    }
}

fn status_message(status: u16) -> String {
    match status {
        400 => "Invalid request parameters".to_owned(),
        401 => "Unauthorized".to_owned(),
        403 => "Access denied".to_owned(),
        404 => "The requested resource was not found".to_owned(),
        500 => "Internal server error".to_owned(),
        502 => "Gateway error".to_owned(),
        503 => "Service temporarily unavailable".to_owned(),
        _ => format!("Request failed ({status})"),
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout
        } else if err.is_decode() {
            SearchError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            SearchError::Status {
                status: status.as_u16(),
                detail: None,
            }
        } else {
            SearchError::Connect(err.to_string())
        }
    }
}
