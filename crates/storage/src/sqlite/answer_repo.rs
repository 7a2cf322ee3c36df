use std::collections::BTreeMap;

use mastery_core::model::{AnswerRecord, OrganizationId, QuestionRef, QuestionVariant, StudentId};

use super::{
    SqliteRepository,
    mapping::{answer_data_to_text, map_answer_row, push_placeholders, u64_to_i64},
};
use crate::repository::{AnswerRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

const ANSWER_COLUMNS: &str = "organization_id, student_id, question_variant, question_id, \
     quiz_id, selected_option_id, answer_data, created_at, updated_at";

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn upsert_answer(&self, answer: &AnswerRecord) -> Result<AnswerRecord, StorageError> {
        let org = u64_to_i64("organization_id", answer.organization.value())?;
        let student = u64_to_i64("student_id", answer.student.value())?;
        let question_id = u64_to_i64("question_id", answer.question.id.value())?;
        let quiz = u64_to_i64("quiz_id", answer.quiz.value())?;
        let selected_option = answer
            .selected_option
            .map(|o| u64_to_i64("selected_option_id", o.value()))
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO student_answers (
                organization_id, student_id, question_variant, question_id, quiz_id,
                selected_option_id, answer_data, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(organization_id, student_id, question_variant, question_id, quiz_id)
            DO UPDATE SET
                -- keep created_at from the original insert
                selected_option_id = excluded.selected_option_id,
                answer_data = excluded.answer_data,
                updated_at = excluded.updated_at
            ",
        )
        .bind(org)
        .bind(student)
        .bind(answer.question.variant.as_str())
        .bind(question_id)
        .bind(quiz)
        .bind(selected_option)
        .bind(answer_data_to_text(answer.answer_data.as_ref())?)
        .bind(answer.created_at)
        .bind(answer.updated_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        let sql = format!(
            "SELECT {ANSWER_COLUMNS} FROM student_answers \
             WHERE organization_id = ?1 AND student_id = ?2 AND question_variant = ?3 \
               AND question_id = ?4 AND quiz_id = ?5"
        );
        let row = sqlx::query(&sql)
            .bind(org)
            .bind(student)
            .bind(answer.question.variant.as_str())
            .bind(question_id)
            .bind(quiz)
            .fetch_one(self.pool())
            .await
            .map_err(conn)?;

        map_answer_row(&row)?.ok_or(StorageError::NotFound)
    }

    async fn list_by_student_and_refs(
        &self,
        organization: OrganizationId,
        student: StudentId,
        refs: &[QuestionRef],
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        self.list_by_students_and_refs(organization, &[student], refs)
            .await
    }

    async fn list_by_students_and_refs(
        &self,
        organization: OrganizationId,
        students: &[StudentId],
        refs: &[QuestionRef],
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        if students.is_empty() || refs.is_empty() {
            return Ok(Vec::new());
        }

        // One query for the whole student set: refs grouped per variant so
        // the WHERE clause stays a handful of IN lists.
        let mut ids_by_variant: BTreeMap<QuestionVariant, Vec<i64>> = BTreeMap::new();
        for reference in refs {
            ids_by_variant
                .entry(reference.variant)
                .or_default()
                .push(u64_to_i64("question_id", reference.id.value())?);
        }

        let mut sql = format!(
            "SELECT {ANSWER_COLUMNS} FROM student_answers \
             WHERE organization_id = ?1 AND student_id IN ("
        );
        let mut next = push_placeholders(&mut sql, 2, students.len());
        sql.push_str(") AND (");
        for (i, ids) in ids_by_variant.values().enumerate() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            sql.push_str(&format!("(question_variant = ?{next} AND question_id IN ("));
            next = push_placeholders(&mut sql, next + 1, ids.len());
            sql.push_str("))");
        }
        sql.push_str(") ORDER BY student_id, question_variant, question_id, quiz_id");

        let mut q = sqlx::query(&sql).bind(u64_to_i64("organization_id", organization.value())?);
        for student in students {
            q = q.bind(u64_to_i64("student_id", student.value())?);
        }
        for (variant, ids) in &ids_by_variant {
            q = q.bind(variant.as_str());
            for id in ids {
                q = q.bind(id);
            }
        }

        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;
        tracing::debug!(
            students = students.len(),
            refs = refs.len(),
            rows = rows.len(),
            "listed answers by refs"
        );

        let mut answers = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(answer) = map_answer_row(&row)? {
                answers.push(answer);
            }
        }
        Ok(answers)
    }
}
