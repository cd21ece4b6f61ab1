use serde::Serialize;
use thiserror::Error;

/// Why a submission or a poll loop ended without a result.
///
/// Every variant is terminal. None of them is retried automatically; a retry
/// is always a fresh submission started by the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// 401/403 from the server. Handled by redirecting to `login_url`.
    #[error("You need to login to use this feature")]
    AuthRequired { login_url: String },

    /// Network failure or an unexpected non-2xx status.
    #[error("{0}")]
    Transport(String),

    /// Status endpoint answered 404; the job expired or never existed.
    #[error("Job not found. It may have expired.")]
    NotFound,

    #[error("Server error. Please try again.")]
    ServerError { status: u16 },

    /// The server processed the job and reported `failed`.
    #[error("{0}")]
    DomainFailure(String),

    /// The reply was 2xx but its body was not the JSON we expect.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The poll budget ran out before the job reached a terminal status.
    #[error("Processing is taking longer than expected. Please try again later.")]
    Timeout { ticks: u32 },
}

impl FailureReason {
    pub fn http_status(status: u16) -> Self {
        FailureReason::Transport(format!("Network response was not ok: {status}"))
    }

    /// Whether the caller should offer a "try again" affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::Timeout { .. }
                | FailureReason::ServerError { .. }
                | FailureReason::Transport(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::AuthRequired { .. } => "auth_required",
            FailureReason::Transport(_) => "transport",
            FailureReason::NotFound => "not_found",
            FailureReason::ServerError { .. } => "server_error",
            FailureReason::DomainFailure(_) => "domain_failure",
            FailureReason::Malformed(_) => "malformed",
            FailureReason::Timeout { .. } => "timeout",
        }
    }
}
