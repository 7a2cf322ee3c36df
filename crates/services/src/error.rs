//! Shared error types for the services crate.

use thiserror::Error;

use mastery_core::model::AnswerValidationError;
use storage::repository::StorageError;

/// Errors emitted by `ProgressService`.
///
/// Missing and partial *data* never surfaces here; only a nonexistent input
/// argument (unknown student or group, or one owned by another tenant) is
/// `NotFound`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("referenced student or group does not exist")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AnswerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("referenced student or question does not exist")]
    NotFound,
    #[error(transparent)]
    Validation(#[from] AnswerValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
