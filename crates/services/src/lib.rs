#![forbid(unsafe_code)]

pub mod answer_service;
pub mod error;
pub mod progress_service;

pub use mastery_core::Clock;

pub use answer_service::AnswerService;
pub use error::{AnswerError, ProgressError};
pub use progress_service::{GroupMastery, GroupProgress, ProgressService, StudentMastery};
