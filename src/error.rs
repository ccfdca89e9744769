use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("authorization window could not be opened for {url}")]
    PopupBlocked { url: String },

    #[error("authorize request failed (status={status:?}): {}", display_detail(.detail))]
    AuthorizeRequestFailed {
        status: Option<u16>,
        detail: Option<String>,
    },

    #[error("credential exchange failed (status={status:?}): {}", display_detail(.detail))]
    CredentialExchangeFailed {
        status: Option<u16>,
        detail: Option<String>,
    },

    #[error("credential exchange returned no credentials")]
    CredentialsEmpty,

    #[error("item fetch failed (status={status:?}): {}", display_detail(.detail))]
    ItemFetchFailed {
        status: Option<u16>,
        detail: Option<String>,
    },

    #[error("invalid response shape: {message}")]
    InvalidResponseShape { message: String },

    #[error("authorization window still open after {timeout:?}")]
    PollTimeout { timeout: Duration },
}

/// Coarse classification used to pick a user-facing default message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    PopupBlocked,
    AuthorizeRequestFailed,
    CredentialExchangeFailed,
    CredentialsEmpty,
    ItemFetchFailed,
    InvalidResponseShape,
    PollTimeout,
}

impl ConnectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Url(_) | Self::Json(_) | Self::Config { .. } => {
                ErrorKind::Configuration
            }
            Self::PopupBlocked { .. } => ErrorKind::PopupBlocked,
            Self::AuthorizeRequestFailed { .. } => ErrorKind::AuthorizeRequestFailed,
            Self::CredentialExchangeFailed { .. } => ErrorKind::CredentialExchangeFailed,
            Self::CredentialsEmpty => ErrorKind::CredentialsEmpty,
            Self::ItemFetchFailed { .. } => ErrorKind::ItemFetchFailed,
            Self::InvalidResponseShape { .. } => ErrorKind::InvalidResponseShape,
            Self::PollTimeout { .. } => ErrorKind::PollTimeout,
        }
    }

    /// Human-readable text supplied by the collaborator, if it sent any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::AuthorizeRequestFailed { detail, .. }
            | Self::CredentialExchangeFailed { detail, .. }
            | Self::ItemFetchFailed { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

fn display_detail(detail: &Option<String>) -> &str {
    detail.as_deref().unwrap_or("no detail")
}

/// Pulls `detail` out of an error body shaped like `{"detail": "..."}`.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_string_detail() {
        assert_eq!(
            extract_detail(r#"{"detail": "No credentials found"}"#).as_deref(),
            Some("No credentials found")
        );
    }

    #[test]
    fn ignores_structured_or_missing_detail() {
        assert_eq!(extract_detail(r#"{"detail": [{"loc": ["body"]}]}"#), None);
        assert_eq!(extract_detail(r#"{"error": "nope"}"#), None);
        assert_eq!(extract_detail("Internal Server Error"), None);
        assert_eq!(extract_detail(r#"{"detail": "  "}"#), None);
    }

    #[test]
    fn detail_only_comes_from_collaborator_failures() {
        let err = ConnectError::ItemFetchFailed {
            status: Some(400),
            detail: Some("Invalid credentials".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::ItemFetchFailed);
        assert_eq!(err.detail(), Some("Invalid credentials"));

        let err = ConnectError::PopupBlocked {
            url: "https://example.com".to_string(),
        };
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn local_json_failures_are_not_response_shape_errors() {
        let err: ConnectError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ConnectError::Json(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.detail(), None);
    }
}
