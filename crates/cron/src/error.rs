use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    ChronoParse(#[from] chrono::ParseError),

    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("crontab command failed: {message}")]
    Crontab { message: String },

    /// Schedule cannot be represented in the crontab. User-facing; the
    /// message surfaces verbatim through the RPC boundary.
    #[error("{message}")]
    Infeasible { message: String },

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn infeasible(message: impl Into<String>) -> Self {
        Self::Infeasible {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn crontab(message: impl Into<String>) -> Self {
        Self::Crontab {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound {
            job_id: job_id.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True for errors a client can fix by changing the request.
    #[must_use]
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Self::Infeasible { .. } | Self::JobNotFound { .. } | Self::Message { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
