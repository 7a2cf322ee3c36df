use mastery_core::Clock;
use mastery_core::model::{AnswerDraft, AnswerRecord, OrganizationId};
use storage::repository::Storage;

use crate::error::AnswerError;

/// Validated answer submission with create-or-overwrite semantics.
#[derive(Clone)]
pub struct AnswerService {
    storage: Storage,
    clock: Clock,
}

impl AnswerService {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock) -> Self {
        Self { storage, clock }
    }

    /// Records a student's answer to a question.
    ///
    /// The question reference is resolved first; the draft is then checked
    /// against the question's variant (exactly one answer slot, correctly
    /// shaped payload) and upserted. A resubmission for the same
    /// (student, question, quiz) identity overwrites the previous row.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::NotFound` when the student or question does not
    /// exist in this organization, `AnswerError::Validation` when the draft
    /// does not match the question's variant, `AnswerError::Storage` on
    /// repository failures.
    pub async fn submit_answer(
        &self,
        organization: OrganizationId,
        draft: AnswerDraft,
    ) -> Result<AnswerRecord, AnswerError> {
        self.storage
            .groups
            .get_student(organization, draft.student)
            .await?
            .ok_or(AnswerError::NotFound)?;

        let question = self
            .storage
            .questions
            .get_question(organization, draft.question)
            .await?
            .ok_or(AnswerError::NotFound)?;

        let validated = draft.validate(&question)?;
        let record = validated.into_record(self.clock.now());
        tracing::debug!(
            student = %record.student,
            question = %record.question,
            quiz = %record.quiz,
            "storing answer"
        );
        Ok(self.storage.answers.upsert_answer(&record).await?)
    }
}
