//! Error types for live chat ingestion and moderation.
//!
//! Errors raised inside a background loop have no caller waiting on them, so they are only ever
//! delivered through the error handlers. Errors from direct command calls are returned to the
//! caller and never pushed to the error handlers.

use crate::handlers::EventCategory;
use http::StatusCode;
use jiff::Timestamp;
use serde::Deserialize;
use std::fmt;

pub type Result<T, E = ChatError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Local input to a moderation command was rejected before any request was made.
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bearer credential could not be obtained.
    #[error("obtain access token: {0:#}")]
    Credential(eyre::Report),

    #[error("decode live chat payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The broadcast went offline; no further fetches will succeed.
    #[error("live chat has ended{}", .offline_at.as_ref().map(|t| format!(" at {t}")).unwrap_or_default())]
    ChatEnded { offline_at: Option<Timestamp> },

    #[error("live chat stream closed by server")]
    StreamClosed,

    #[error("{category} handler panicked: {message}")]
    HandlerFault {
        category: EventCategory,
        message: String,
    },

    #[error("live chat reader is already running")]
    AlreadyRunning,
}

impl ChatError {
    pub(crate) fn validation(field: &'static str, reason: &'static str) -> Self {
        Self::Validation { field, reason }
    }

    /// Whether this error means the chat session is over for good.
    pub fn is_chat_ended(&self) -> bool {
        match self {
            Self::ChatEnded { .. } => true,
            Self::Api(api) => api.reason == ApiErrorReason::ChatEnded,
            _ => false,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// The classified API reason, if this error came from a non-success response.
    pub fn api_reason(&self) -> Option<&ApiErrorReason> {
        match self {
            Self::Api(api) => Some(&api.reason),
            _ => None,
        }
    }
}

/// A non-success response from the YouTube API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("YouTube API request failed with status {status} ({reason}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub reason: ApiErrorReason,
    pub message: String,
}

/// Why the API rejected a request.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/errors>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorReason {
    ChatEnded,
    ChatDisabled,
    ChatNotFound,
    QuotaExceeded,
    RateLimited,
    Forbidden,
    Unauthorized,
    BadRequest,
    Other(String),
}

impl ApiErrorReason {
    /// Maps a Google error `reason` string, falling back to the status code for unknown reasons.
    pub fn classify(reason: Option<&str>, status: StatusCode) -> Self {
        match reason {
            Some("liveChatEnded") => Self::ChatEnded,
            Some("liveChatDisabled") => Self::ChatDisabled,
            Some("liveChatNotFound") => Self::ChatNotFound,
            Some("quotaExceeded" | "dailyLimitExceeded") => Self::QuotaExceeded,
            Some("rateLimitExceeded" | "userRateLimitExceeded") => Self::RateLimited,
            Some("forbidden" | "insufficientPermissions" | "liveChatModerationForbidden") => {
                Self::Forbidden
            }
            Some("authError" | "unauthorized") => Self::Unauthorized,
            reason => match status {
                StatusCode::UNAUTHORIZED => Self::Unauthorized,
                StatusCode::FORBIDDEN => Self::Forbidden,
                StatusCode::NOT_FOUND => Self::ChatNotFound,
                StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
                StatusCode::BAD_REQUEST => Self::BadRequest,
                _ => Self::Other(reason.unwrap_or("unknown").to_string()),
            },
        }
    }
}

impl fmt::Display for ApiErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChatEnded => write!(f, "liveChatEnded"),
            Self::ChatDisabled => write!(f, "liveChatDisabled"),
            Self::ChatNotFound => write!(f, "liveChatNotFound"),
            Self::QuotaExceeded => write!(f, "quotaExceeded"),
            Self::RateLimited => write!(f, "rateLimitExceeded"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::BadRequest => write!(f, "badRequest"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// The standard Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    reason: Option<String>,
}

impl ApiError {
    /// Builds an error from a failed response's status and body text.
    ///
    /// Bodies that are not a Google error envelope are kept verbatim as the message.
    pub fn from_response_body(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let reason = envelope
                    .error
                    .errors
                    .iter()
                    .find_map(|item| item.reason.as_deref());
                Self {
                    status,
                    reason: ApiErrorReason::classify(reason, status),
                    message: envelope.error.message,
                }
            }
            Err(_) => Self {
                status,
                reason: ApiErrorReason::classify(None, status),
                message: body.trim().to_string(),
            },
        }
    }
}
