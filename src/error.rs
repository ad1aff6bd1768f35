use thiserror::Error;

/// Failures raised by the calendar, pacing and announcement stages.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("course belongs to another account")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("export failed: {0}")]
    Export(String),
}

impl PlanError {
    /// Stable error code carried in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden => "forbidden",
            Self::Validation(_) => "bad_params",
            Self::Persistence(_) => "db_failed",
            Self::Export(_) => "export_failed",
        }
    }
}
