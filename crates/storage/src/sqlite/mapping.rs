use mastery_core::model::{
    AnswerRecord, OptionId, OrganizationId, QuestionId, QuestionRef, QuestionVariant, QuizId,
    StudentId,
};
use serde_json::Value;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn answer_data_to_text(data: Option<&Value>) -> Result<Option<String>, StorageError> {
    data.map(|v| serde_json::to_string(v).map_err(ser)).transpose()
}

fn answer_data_from_text(text: Option<String>) -> Result<Option<Value>, StorageError> {
    text.map(|t| serde_json::from_str(&t).map_err(ser)).transpose()
}

/// Maps a `student_answers` row back into a record.
///
/// Returns `Ok(None)` when the stored variant tag is unrecognized: such rows
/// come from deleted or legacy question kinds and must degrade to "not
/// answered" rather than fail a whole aggregation.
pub(crate) fn map_answer_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Option<AnswerRecord>, StorageError> {
    let tag: String = row.try_get("question_variant").map_err(ser)?;
    let Some(variant) = QuestionVariant::parse(&tag) else {
        tracing::debug!(tag, "skipping answer row with unknown question variant");
        return Ok(None);
    };

    let question_id = QuestionId::new(i64_to_u64(
        "question_id",
        row.try_get::<i64, _>("question_id").map_err(ser)?,
    )?);

    Ok(Some(AnswerRecord {
        organization: OrganizationId::new(i64_to_u64(
            "organization_id",
            row.try_get::<i64, _>("organization_id").map_err(ser)?,
        )?),
        student: StudentId::new(i64_to_u64(
            "student_id",
            row.try_get::<i64, _>("student_id").map_err(ser)?,
        )?),
        question: QuestionRef::new(variant, question_id),
        quiz: QuizId::new(i64_to_u64(
            "quiz_id",
            row.try_get::<i64, _>("quiz_id").map_err(ser)?,
        )?),
        selected_option: row
            .try_get::<Option<i64>, _>("selected_option_id")
            .map_err(ser)?
            .map(|v| i64_to_u64("selected_option_id", v).map(OptionId::new))
            .transpose()?,
        answer_data: answer_data_from_text(
            row.try_get::<Option<String>, _>("answer_data").map_err(ser)?,
        )?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    }))
}

/// Appends `?N, ?N+1, ...` placeholders for an IN list, starting at `first`.
/// Returns the next free placeholder index.
pub(crate) fn push_placeholders(sql: &mut String, first: usize, count: usize) -> usize {
    for i in 0..count {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        sql.push_str(&(first + i).to_string());
    }
    first + count
}
