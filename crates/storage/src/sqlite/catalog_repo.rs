use sqlx::Row;

use mastery_core::model::{
    Course, Lesson, LessonId, Module, ModuleId, OrganizationId, Topic, TopicId,
};

use super::{
    SqliteRepository,
    mapping::{i64_to_u64, push_placeholders, ser, u64_to_i64},
};
use crate::repository::{CatalogRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, organization_id, name, description)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id, organization_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description
            ",
        )
        .bind(u64_to_i64("course_id", course.id.value())?)
        .bind(u64_to_i64("organization_id", course.organization.value())?)
        .bind(course.name.as_str())
        .bind(course.description.as_str())
        .execute(self.pool())
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO modules (id, organization_id, course_id, name, description)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id, organization_id) DO UPDATE SET
                course_id = excluded.course_id,
                name = excluded.name,
                description = excluded.description
            ",
        )
        .bind(u64_to_i64("module_id", module.id.value())?)
        .bind(u64_to_i64("organization_id", module.organization.value())?)
        .bind(u64_to_i64("course_id", module.course.value())?)
        .bind(module.name.as_str())
        .bind(module.description.as_str())
        .execute(self.pool())
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (id, organization_id, module_id, name, description)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id, organization_id) DO UPDATE SET
                module_id = excluded.module_id,
                name = excluded.name,
                description = excluded.description
            ",
        )
        .bind(u64_to_i64("lesson_id", lesson.id.value())?)
        .bind(u64_to_i64("organization_id", lesson.organization.value())?)
        .bind(u64_to_i64("module_id", lesson.module.value())?)
        .bind(lesson.name.as_str())
        .bind(lesson.description.as_str())
        .execute(self.pool())
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topics (id, organization_id, lesson_id, name, description)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id, organization_id) DO UPDATE SET
                lesson_id = excluded.lesson_id,
                name = excluded.name,
                description = excluded.description
            ",
        )
        .bind(u64_to_i64("topic_id", topic.id.value())?)
        .bind(u64_to_i64("organization_id", topic.organization.value())?)
        .bind(u64_to_i64("lesson_id", topic.lesson.value())?)
        .bind(topic.name.as_str())
        .bind(topic.description.as_str())
        .execute(self.pool())
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_topic(
        &self,
        organization: OrganizationId,
        id: TopicId,
    ) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query(
            "SELECT id, organization_id, lesson_id, name, description FROM topics \
             WHERE id = ?1 AND organization_id = ?2",
        )
        .bind(u64_to_i64("topic_id", id.value())?)
        .bind(u64_to_i64("organization_id", organization.value())?)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        row.map(|row| {
            Ok(Topic {
                id: TopicId::new(i64_to_u64(
                    "topic_id",
                    row.try_get::<i64, _>("id").map_err(ser)?,
                )?),
                organization: OrganizationId::new(i64_to_u64(
                    "organization_id",
                    row.try_get::<i64, _>("organization_id").map_err(ser)?,
                )?),
                lesson: LessonId::new(i64_to_u64(
                    "lesson_id",
                    row.try_get::<i64, _>("lesson_id").map_err(ser)?,
                )?),
                name: row.try_get("name").map_err(ser)?,
                description: row.try_get("description").map_err(ser)?,
            })
        })
        .transpose()
    }

    async fn topics_for_modules(
        &self,
        organization: OrganizationId,
        modules: &[ModuleId],
    ) -> Result<Vec<TopicId>, StorageError> {
        if modules.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT DISTINCT t.id
            FROM topics t
            JOIN lessons l
              ON l.id = t.lesson_id AND l.organization_id = t.organization_id
            WHERE t.organization_id = ?1 AND l.module_id IN (
            ",
        );
        push_placeholders(&mut sql, 2, modules.len());
        sql.push_str(") ORDER BY t.id ASC");

        let mut q = sqlx::query(&sql).bind(u64_to_i64("organization_id", organization.value())?);
        for module in modules {
            q = q.bind(u64_to_i64("module_id", module.value())?);
        }
        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;

        rows.iter()
            .map(|row| {
                Ok(TopicId::new(i64_to_u64(
                    "topic_id",
                    row.try_get::<i64, _>("id").map_err(ser)?,
                )?))
            })
            .collect()
    }
}
