//! Unified error type for the social engine.
//!
//! Every failure carries a stable machine-readable code (see [`SocialError::code`]);
//! display strings are the humanized form shown to users.

use thiserror::Error;

/// All errors that can occur in gitsocial operations.
#[derive(Error, Debug)]
pub enum SocialError {
    /// Git process failed to spawn or exited non-zero without a more
    /// specific classification.
    #[error("git error: {0}")]
    Git(String),

    /// Reading a ref, commit, or config value failed.
    #[error("failed to read {what}: {message}")]
    Read { what: String, message: String },

    /// Writing a config value or file failed.
    #[error("failed to write {what}: {message}")]
    Write { what: String, message: String },

    /// Creating a commit object failed.
    #[error("failed to create commit: {0}")]
    Commit(String),

    /// Updating a ref to a new commit failed.
    #[error("failed to update ref '{reference}': {message}")]
    Ref { reference: String, message: String },

    /// Deleting a ref failed.
    #[error("failed to delete ref '{reference}': {message}")]
    Delete { reference: String, message: String },

    /// Listing refs by prefix failed.
    #[error("failed to enumerate refs under '{prefix}': {message}")]
    Enumerate { prefix: String, message: String },

    /// A single repository fetch failed.
    #[error("fetch failed for '{url}': {message}")]
    Fetch { url: String, message: String },

    /// A batch fetch finished with failures.
    #[error("fetched {fetched} repositories, {failed} failed")]
    FetchFailed { fetched: usize, failed: usize },

    /// ensure_data_for_date_range could not make the window available.
    #[error("could not ensure data for '{url}': {message}")]
    EnsureData { url: String, message: String },

    /// Timeline assembly failed.
    #[error("timeline error: {0}")]
    Timeline(String),

    /// The named list does not exist.
    #[error("list not found: {0}")]
    ListNotFound(String),

    /// Repository-level validation failed (bad URL, unknown repository).
    #[error("repository error: {0}")]
    Repo(String),

    /// Isolated clone initialization failed.
    #[error("failed to initialize repository: {0}")]
    Init(String),

    /// Protocol-level validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O error (storage root access, directory creation).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error outside the tolerant read paths.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Specialized result for social operations.
pub type Result<T> = std::result::Result<T, SocialError>;

impl SocialError {
    /// Stable machine-readable code carried on every failure envelope.
    pub fn code(&self) -> &'static str {
        match self {
            SocialError::Git(_) => "GIT_ERROR",
            SocialError::Read { .. } => "READ_ERROR",
            SocialError::Write { .. } => "WRITE_ERROR",
            SocialError::Commit(_) => "COMMIT_ERROR",
            SocialError::Ref { .. } => "REF_ERROR",
            SocialError::Delete { .. } => "DELETE_ERROR",
            SocialError::Enumerate { .. } => "ENUM_ERROR",
            SocialError::Fetch { .. } => "FETCH_ERROR",
            SocialError::FetchFailed { .. } => "FETCH_FAILED",
            SocialError::EnsureData { .. } => "ENSURE_DATA_ERROR",
            SocialError::Timeline(_) => "TIMELINE_ERROR",
            SocialError::ListNotFound(_) => "LIST_NOT_FOUND",
            SocialError::Repo(_) => "REPO_ERROR",
            SocialError::Init(_) => "INIT_ERROR",
            SocialError::Validation(_) => "VALIDATION_ERROR",
            SocialError::Io(_) | SocialError::Json(_) => "UNKNOWN_ERROR",
        }
    }
}
