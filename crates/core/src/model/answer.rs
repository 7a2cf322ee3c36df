use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::{OptionId, OrganizationId, QuizId, StudentId};
use crate::model::question::{Question, QuestionPayload, QuestionRef, QuestionVariant};

/// A recorded response by one student to one question within one quiz.
///
/// Exactly one of `selected_option` / `answer_data` is populated, selected by
/// the question's variant. `answer_data` is kept as an opaque JSON value so
/// rows written by older clients stay readable; the correctness evaluator
/// treats malformed contents as simply not-correct.
///
/// Identity is the tuple (organization, student, question, quiz); storage
/// enforces uniqueness over it and resubmissions overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub organization: OrganizationId,
    pub student: StudentId,
    pub question: QuestionRef,
    pub quiz: QuizId,
    pub selected_option: Option<OptionId>,
    pub answer_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validation failures for an answer submission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerValidationError {
    #[error("an option reference is required for multiple choice questions")]
    MissingOption,

    #[error("an option reference must not be set for {0} questions")]
    UnexpectedOption(QuestionVariant),

    #[error("answer data is required for {0} questions")]
    MissingData(QuestionVariant),

    #[error("answer data must not be set for multiple choice questions")]
    UnexpectedData,

    #[error("answer data has the wrong shape for {0} questions")]
    MalformedData(QuestionVariant),

    #[error("answer references question {submitted}, validated against {resolved}")]
    QuestionMismatch {
        submitted: QuestionRef,
        resolved: QuestionRef,
    },
}

/// An answer submission before validation against its question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerDraft {
    pub student: StudentId,
    pub question: QuestionRef,
    pub quiz: QuizId,
    pub selected_option: Option<OptionId>,
    pub answer_data: Option<Value>,
}

impl AnswerDraft {
    /// Validates the draft against the resolved question: exactly one answer
    /// slot populated, chosen by the question's variant, and the structured
    /// payload shaped correctly for that variant.
    ///
    /// # Errors
    ///
    /// Returns `AnswerValidationError` when the wrong slot is populated or
    /// the payload shape does not match the variant.
    pub fn validate(self, question: &Question) -> Result<ValidatedAnswer, AnswerValidationError> {
        let resolved = question.reference();
        if self.question != resolved {
            return Err(AnswerValidationError::QuestionMismatch {
                submitted: self.question,
                resolved,
            });
        }

        let variant = question.variant();
        match variant {
            QuestionVariant::MultipleChoice => {
                if self.answer_data.is_some() {
                    return Err(AnswerValidationError::UnexpectedData);
                }
                if self.selected_option.is_none() {
                    return Err(AnswerValidationError::MissingOption);
                }
            }
            QuestionVariant::Order | QuestionVariant::Connect | QuestionVariant::Number => {
                if self.selected_option.is_some() {
                    return Err(AnswerValidationError::UnexpectedOption(variant));
                }
                let data = self
                    .answer_data
                    .as_ref()
                    .ok_or(AnswerValidationError::MissingData(variant))?;
                check_data_shape(data, &question.payload)
                    .map_err(|()| AnswerValidationError::MalformedData(variant))?;
            }
        }

        Ok(ValidatedAnswer {
            organization: question.organization,
            student: self.student,
            question: resolved,
            quiz: self.quiz,
            selected_option: self.selected_option,
            answer_data: self.answer_data,
        })
    }
}

/// An answer that passed validation and is ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnswer {
    pub organization: OrganizationId,
    pub student: StudentId,
    pub question: QuestionRef,
    pub quiz: QuizId,
    pub selected_option: Option<OptionId>,
    pub answer_data: Option<Value>,
}

impl ValidatedAnswer {
    /// Stamps the answer into a persistable record.
    #[must_use]
    pub fn into_record(self, now: DateTime<Utc>) -> AnswerRecord {
        AnswerRecord {
            organization: self.organization,
            student: self.student,
            question: self.question,
            quiz: self.quiz,
            selected_option: self.selected_option,
            answer_data: self.answer_data,
            created_at: now,
            updated_at: now,
        }
    }
}

fn check_data_shape(data: &Value, payload: &QuestionPayload) -> Result<(), ()> {
    match payload {
        QuestionPayload::MultipleChoice { .. } => Err(()),
        QuestionPayload::Order { .. } => {
            let entries = data.as_array().ok_or(())?;
            if entries.iter().all(|entry| entry.as_u64().is_some()) {
                Ok(())
            } else {
                Err(())
            }
        }
        QuestionPayload::Connect { .. } => {
            let entries = data.as_array().ok_or(())?;
            for entry in entries {
                let pair = entry.as_array().ok_or(())?;
                if pair.len() != 2 || pair.iter().any(|end| end.as_u64().is_none()) {
                    return Err(());
                }
            }
            Ok(())
        }
        QuestionPayload::Number { .. } => {
            let value = data.as_f64().ok_or(())?;
            if value.is_finite() { Ok(()) } else { Err(()) }
        }
    }
}
