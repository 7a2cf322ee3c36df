use std::collections::HashMap;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use mastery_core::model::{
    ChoiceOption, ConnectOption, Connection, LearningObjectiveId, OptionId, OrderOption,
    OrganizationId, Question, QuestionId, QuestionPayload, QuestionRef, QuestionVariant, QuizId,
    TopicId,
};

use super::{
    SqliteRepository,
    mapping::{i64_to_u64, push_placeholders, ser, u64_to_i64},
};
use crate::repository::{QuestionRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

const QUESTION_COLUMNS: &str =
    "id, question_variant, organization_id, topic_id, quiz_id, text, ord, correct_answer, tolerance";

struct OptionRow {
    id: OptionId,
    text: String,
    is_correct: Option<bool>,
    correct_order: Option<i64>,
    position_x: Option<f64>,
    position_y: Option<f64>,
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let org = u64_to_i64("organization_id", question.organization.value())?;
        let id = u64_to_i64("question_id", question.id.value())?;
        let variant = question.variant().as_str();
        let topic = u64_to_i64("topic_id", question.topic.value())?;
        let quiz = question
            .quiz
            .map(|q| u64_to_i64("quiz_id", q.value()))
            .transpose()?;
        let (correct_answer, tolerance) = match &question.payload {
            QuestionPayload::Number {
                correct_answer,
                tolerance,
            } => (Some(*correct_answer), Some(*tolerance)),
            _ => (None, None),
        };

        let mut tx = self.pool().begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, question_variant, organization_id, topic_id, quiz_id,
                text, ord, correct_answer, tolerance
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id, question_variant, organization_id) DO UPDATE SET
                topic_id = excluded.topic_id,
                quiz_id = excluded.quiz_id,
                text = excluded.text,
                ord = excluded.ord,
                correct_answer = excluded.correct_answer,
                tolerance = excluded.tolerance
            ",
        )
        .bind(id)
        .bind(variant)
        .bind(org)
        .bind(topic)
        .bind(quiz)
        .bind(question.text.as_str())
        .bind(i64::from(question.order))
        .bind(correct_answer)
        .bind(tolerance)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // Payload rows are replaced wholesale on every write.
        sqlx::query(
            r"
            DELETE FROM question_learning_objectives
            WHERE question_id = ?1 AND question_variant = ?2 AND organization_id = ?3
            ",
        )
        .bind(id)
        .bind(variant)
        .bind(org)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for objective in &question.learning_objectives {
            sqlx::query(
                r"
                INSERT INTO question_learning_objectives (
                    question_id, question_variant, organization_id, learning_objective_id
                )
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(id)
            .bind(variant)
            .bind(org)
            .bind(u64_to_i64("learning_objective_id", objective.value())?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        sqlx::query(
            r"
            DELETE FROM question_options
            WHERE question_id = ?1 AND question_variant = ?2 AND organization_id = ?3
            ",
        )
        .bind(id)
        .bind(variant)
        .bind(org)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        match &question.payload {
            QuestionPayload::MultipleChoice { options } => {
                for option in options {
                    sqlx::query(
                        r"
                        INSERT INTO question_options (
                            id, organization_id, question_id, question_variant, text, is_correct
                        )
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        ",
                    )
                    .bind(u64_to_i64("option_id", option.id.value())?)
                    .bind(org)
                    .bind(id)
                    .bind(variant)
                    .bind(option.text.as_str())
                    .bind(option.is_correct)
                    .execute(&mut *tx)
                    .await
                    .map_err(conn)?;
                }
            }
            QuestionPayload::Order { options } => {
                for option in options {
                    sqlx::query(
                        r"
                        INSERT INTO question_options (
                            id, organization_id, question_id, question_variant, text, correct_order
                        )
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        ",
                    )
                    .bind(u64_to_i64("option_id", option.id.value())?)
                    .bind(org)
                    .bind(id)
                    .bind(variant)
                    .bind(option.text.as_str())
                    .bind(i64::from(option.correct_order))
                    .execute(&mut *tx)
                    .await
                    .map_err(conn)?;
                }
            }
            QuestionPayload::Connect {
                options,
                connections,
            } => {
                for option in options {
                    sqlx::query(
                        r"
                        INSERT INTO question_options (
                            id, organization_id, question_id, question_variant, text,
                            position_x, position_y
                        )
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                        ",
                    )
                    .bind(u64_to_i64("option_id", option.id.value())?)
                    .bind(org)
                    .bind(id)
                    .bind(variant)
                    .bind(option.text.as_str())
                    .bind(option.position_x)
                    .bind(option.position_y)
                    .execute(&mut *tx)
                    .await
                    .map_err(conn)?;
                }

                sqlx::query(
                    r"
                    DELETE FROM connect_connections
                    WHERE organization_id = ?1 AND question_id = ?2
                    ",
                )
                .bind(org)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;

                for connection in connections {
                    sqlx::query(
                        r"
                        INSERT INTO connect_connections (
                            organization_id, question_id, from_option_id, to_option_id
                        )
                        VALUES (?1, ?2, ?3, ?4)
                        ",
                    )
                    .bind(org)
                    .bind(id)
                    .bind(u64_to_i64("from_option_id", connection.from.value())?)
                    .bind(u64_to_i64("to_option_id", connection.to.value())?)
                    .execute(&mut *tx)
                    .await
                    .map_err(conn)?;
                }
            }
            QuestionPayload::Number { .. } => {}
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_question(
        &self,
        organization: OrganizationId,
        reference: QuestionRef,
    ) -> Result<Option<Question>, StorageError> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions \
             WHERE id = ?1 AND question_variant = ?2 AND organization_id = ?3"
        );
        let row = sqlx::query(&sql)
            .bind(u64_to_i64("question_id", reference.id.value())?)
            .bind(reference.variant.as_str())
            .bind(u64_to_i64("organization_id", organization.value())?)
            .fetch_optional(self.pool())
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let questions = self
            .assemble_questions(organization, reference.variant, vec![row])
            .await?;
        Ok(questions.into_iter().next())
    }

    async fn list_by_topics(
        &self,
        organization: OrganizationId,
        topics: &[TopicId],
        variant: QuestionVariant,
    ) -> Result<Vec<Question>, StorageError> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions \
             WHERE organization_id = ?1 AND question_variant = ?2 AND topic_id IN ("
        );
        push_placeholders(&mut sql, 3, topics.len());
        sql.push_str(") ORDER BY ord ASC, id ASC");

        let mut q = sqlx::query(&sql)
            .bind(u64_to_i64("organization_id", organization.value())?)
            .bind(variant.as_str());
        for topic in topics {
            q = q.bind(u64_to_i64("topic_id", topic.value())?);
        }

        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;
        self.assemble_questions(organization, variant, rows).await
    }
}

impl SqliteRepository {
    /// Attaches options, connections and learning objectives to a page of
    /// question rows with one batched query per payload table.
    async fn assemble_questions(
        &self,
        organization: OrganizationId,
        variant: QuestionVariant,
        rows: Vec<SqliteRow>,
    ) -> Result<Vec<Question>, StorageError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let org = u64_to_i64("organization_id", organization.value())?;
        let ids: Vec<i64> = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(ser))
            .collect::<Result<_, _>>()?;

        let mut options = self.load_options(org, variant, &ids).await?;
        let mut objectives = self.load_objectives(org, variant, &ids).await?;
        let mut connections = if variant == QuestionVariant::Connect {
            self.load_connections(org, &ids).await?
        } else {
            HashMap::new()
        };

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_id: i64 = row.try_get("id").map_err(ser)?;
            let id = QuestionId::new(i64_to_u64("question_id", raw_id)?);
            let option_rows = options.remove(&raw_id).unwrap_or_default();

            let payload = match variant {
                QuestionVariant::MultipleChoice => QuestionPayload::MultipleChoice {
                    options: option_rows
                        .into_iter()
                        .map(|o| ChoiceOption {
                            id: o.id,
                            text: o.text,
                            is_correct: o.is_correct.unwrap_or(false),
                        })
                        .collect(),
                },
                QuestionVariant::Order => QuestionPayload::Order {
                    options: option_rows
                        .into_iter()
                        .map(|o| {
                            let correct_order = o.correct_order.ok_or_else(|| {
                                StorageError::Serialization("missing correct_order".into())
                            })?;
                            Ok(OrderOption {
                                id: o.id,
                                text: o.text,
                                correct_order: u32::try_from(correct_order).map_err(|_| {
                                    StorageError::Serialization(format!(
                                        "invalid correct_order: {correct_order}"
                                    ))
                                })?,
                            })
                        })
                        .collect::<Result<_, StorageError>>()?,
                },
                QuestionVariant::Connect => QuestionPayload::Connect {
                    options: option_rows
                        .into_iter()
                        .map(|o| ConnectOption {
                            id: o.id,
                            text: o.text,
                            position_x: o.position_x.unwrap_or(0.0),
                            position_y: o.position_y.unwrap_or(0.0),
                        })
                        .collect(),
                    connections: connections.remove(&raw_id).unwrap_or_default(),
                },
                QuestionVariant::Number => QuestionPayload::Number {
                    correct_answer: row
                        .try_get::<Option<f64>, _>("correct_answer")
                        .map_err(ser)?
                        .ok_or_else(|| {
                            StorageError::Serialization("missing correct_answer".into())
                        })?,
                    // Unset tolerance means exact match.
                    tolerance: row
                        .try_get::<Option<f64>, _>("tolerance")
                        .map_err(ser)?
                        .unwrap_or(0.0),
                },
            };

            let order_i64: i64 = row.try_get("ord").map_err(ser)?;
            questions.push(Question {
                id,
                organization,
                topic: TopicId::new(i64_to_u64(
                    "topic_id",
                    row.try_get::<i64, _>("topic_id").map_err(ser)?,
                )?),
                quiz: row
                    .try_get::<Option<i64>, _>("quiz_id")
                    .map_err(ser)?
                    .map(|v| i64_to_u64("quiz_id", v).map(QuizId::new))
                    .transpose()?,
                text: row.try_get("text").map_err(ser)?,
                order: u32::try_from(order_i64)
                    .map_err(|_| StorageError::Serialization(format!("invalid ord: {order_i64}")))?,
                learning_objectives: objectives.remove(&raw_id).unwrap_or_default(),
                payload,
            });
        }

        Ok(questions)
    }

    async fn load_options(
        &self,
        org: i64,
        variant: QuestionVariant,
        question_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<OptionRow>>, StorageError> {
        let mut sql = String::from(
            "SELECT id, question_id, text, is_correct, correct_order, position_x, position_y \
             FROM question_options \
             WHERE organization_id = ?1 AND question_variant = ?2 AND question_id IN (",
        );
        push_placeholders(&mut sql, 3, question_ids.len());
        sql.push_str(") ORDER BY id ASC");

        let mut q = sqlx::query(&sql).bind(org).bind(variant.as_str());
        for id in question_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;

        let mut by_question: HashMap<i64, Vec<OptionRow>> = HashMap::new();
        for row in rows {
            let question_id: i64 = row.try_get("question_id").map_err(ser)?;
            by_question.entry(question_id).or_default().push(OptionRow {
                id: OptionId::new(i64_to_u64(
                    "option_id",
                    row.try_get::<i64, _>("id").map_err(ser)?,
                )?),
                text: row.try_get("text").map_err(ser)?,
                is_correct: row.try_get("is_correct").map_err(ser)?,
                correct_order: row.try_get("correct_order").map_err(ser)?,
                position_x: row.try_get("position_x").map_err(ser)?,
                position_y: row.try_get("position_y").map_err(ser)?,
            });
        }
        Ok(by_question)
    }

    async fn load_objectives(
        &self,
        org: i64,
        variant: QuestionVariant,
        question_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<LearningObjectiveId>>, StorageError> {
        let mut sql = String::from(
            "SELECT question_id, learning_objective_id FROM question_learning_objectives \
             WHERE organization_id = ?1 AND question_variant = ?2 AND question_id IN (",
        );
        push_placeholders(&mut sql, 3, question_ids.len());
        sql.push_str(") ORDER BY learning_objective_id ASC");

        let mut q = sqlx::query(&sql).bind(org).bind(variant.as_str());
        for id in question_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;

        let mut by_question: HashMap<i64, Vec<LearningObjectiveId>> = HashMap::new();
        for row in rows {
            let question_id: i64 = row.try_get("question_id").map_err(ser)?;
            by_question
                .entry(question_id)
                .or_default()
                .push(LearningObjectiveId::new(i64_to_u64(
                    "learning_objective_id",
                    row.try_get::<i64, _>("learning_objective_id").map_err(ser)?,
                )?));
        }
        Ok(by_question)
    }

    async fn load_connections(
        &self,
        org: i64,
        question_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Connection>>, StorageError> {
        let mut sql = String::from(
            "SELECT question_id, from_option_id, to_option_id FROM connect_connections \
             WHERE organization_id = ?1 AND question_id IN (",
        );
        push_placeholders(&mut sql, 2, question_ids.len());
        sql.push_str(") ORDER BY from_option_id ASC, to_option_id ASC");

        let mut q = sqlx::query(&sql).bind(org);
        for id in question_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;

        let mut by_question: HashMap<i64, Vec<Connection>> = HashMap::new();
        for row in rows {
            let question_id: i64 = row.try_get("question_id").map_err(ser)?;
            by_question
                .entry(question_id)
                .or_default()
                .push(Connection {
                    from: OptionId::new(i64_to_u64(
                        "from_option_id",
                        row.try_get::<i64, _>("from_option_id").map_err(ser)?,
                    )?),
                    to: OptionId::new(i64_to_u64(
                        "to_option_id",
                        row.try_get::<i64, _>("to_option_id").map_err(ser)?,
                    )?),
                });
        }
        Ok(by_question)
    }
}
