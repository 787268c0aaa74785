use thiserror::Error;

use crate::models::{RecordId, SetId, SetStatus};

/// All errors that can occur in dupescope.
#[derive(Debug, Error)]
pub enum DupescopeError {
    #[error("Invalid match config: {0}")]
    InvalidConfig(String),

    #[error("Cannot {action} set {set}: status is {status}")]
    InvalidTransition {
        set: SetId,
        status: SetStatus,
        action: &'static str,
    },

    #[error("Duplicate set not found: {0}")]
    SetNotFound(SetId),

    #[error("Record {record} is not a member of set {set}")]
    MemberNotFound { set: SetId, record: RecordId },

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Record id appears more than once in input: {0}")]
    DuplicateRecordId(RecordId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl DupescopeError {
    /// True for the not-found family (unknown set, member or record).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SetNotFound(_) | Self::MemberNotFound { .. } | Self::RecordNotFound(_)
        )
    }
}

/// Exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, DupescopeError>;
