use std::collections::HashMap;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use mastery_core::model::{
    CourseId, ModuleId, OrganizationId, Student, StudentGroup, StudentGroupId, StudentId,
};

use super::{
    SqliteRepository,
    mapping::{i64_to_u64, push_placeholders, ser, u64_to_i64},
};
use crate::repository::{GroupRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn map_student_row(
    row: &SqliteRow,
    groups: Vec<StudentGroupId>,
) -> Result<Student, StorageError> {
    Ok(Student {
        id: StudentId::new(i64_to_u64(
            "student_id",
            row.try_get::<i64, _>("id").map_err(ser)?,
        )?),
        organization: OrganizationId::new(i64_to_u64(
            "organization_id",
            row.try_get::<i64, _>("organization_id").map_err(ser)?,
        )?),
        first_name: row.try_get("first_name").map_err(ser)?,
        last_name: row.try_get("last_name").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        groups,
    })
}

fn map_group_row(row: &SqliteRow, modules: Vec<ModuleId>) -> Result<StudentGroup, StorageError> {
    let year: i64 = row.try_get("year").map_err(ser)?;
    Ok(StudentGroup {
        id: StudentGroupId::new(i64_to_u64(
            "group_id",
            row.try_get::<i64, _>("id").map_err(ser)?,
        )?),
        organization: OrganizationId::new(i64_to_u64(
            "organization_id",
            row.try_get::<i64, _>("organization_id").map_err(ser)?,
        )?),
        course: CourseId::new(i64_to_u64(
            "course_id",
            row.try_get::<i64, _>("course_id").map_err(ser)?,
        )?),
        name: row.try_get("name").map_err(ser)?,
        year: i32::try_from(year)
            .map_err(|_| StorageError::Serialization(format!("invalid year: {year}")))?,
        modules,
    })
}

#[async_trait::async_trait]
impl GroupRepository for SqliteRepository {
    async fn upsert_group(&self, group: &StudentGroup) -> Result<(), StorageError> {
        let org = u64_to_i64("organization_id", group.organization.value())?;
        let id = u64_to_i64("group_id", group.id.value())?;

        let mut tx = self.pool().begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO student_groups (id, organization_id, course_id, name, year)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id, organization_id) DO UPDATE SET
                course_id = excluded.course_id,
                name = excluded.name,
                year = excluded.year
            ",
        )
        .bind(id)
        .bind(org)
        .bind(u64_to_i64("course_id", group.course.value())?)
        .bind(group.name.as_str())
        .bind(i64::from(group.year))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM group_modules WHERE group_id = ?1 AND organization_id = ?2")
            .bind(id)
            .bind(org)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for module in &group.modules {
            sqlx::query(
                r"
                INSERT INTO group_modules (group_id, organization_id, module_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(id)
            .bind(org)
            .bind(u64_to_i64("module_id", module.value())?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_group(
        &self,
        organization: OrganizationId,
        id: StudentGroupId,
    ) -> Result<Option<StudentGroup>, StorageError> {
        let org = u64_to_i64("organization_id", organization.value())?;
        let row = sqlx::query(
            "SELECT id, organization_id, course_id, name, year FROM student_groups \
             WHERE id = ?1 AND organization_id = ?2",
        )
        .bind(u64_to_i64("group_id", id.value())?)
        .bind(org)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_id: i64 = row.try_get("id").map_err(ser)?;
        let modules = self
            .load_group_modules(org, &[raw_id])
            .await?
            .remove(&raw_id)
            .unwrap_or_default();
        Ok(Some(map_group_row(&row, modules)?))
    }

    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError> {
        let org = u64_to_i64("organization_id", student.organization.value())?;
        let id = u64_to_i64("student_id", student.id.value())?;

        let mut tx = self.pool().begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO students (id, organization_id, first_name, last_name, email)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id, organization_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email
            ",
        )
        .bind(id)
        .bind(org)
        .bind(student.first_name.as_str())
        .bind(student.last_name.as_str())
        .bind(student.email.as_str())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM group_students WHERE student_id = ?1 AND organization_id = ?2")
            .bind(id)
            .bind(org)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for group in &student.groups {
            sqlx::query(
                r"
                INSERT INTO group_students (group_id, organization_id, student_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(u64_to_i64("group_id", group.value())?)
            .bind(org)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_student(
        &self,
        organization: OrganizationId,
        id: StudentId,
    ) -> Result<Option<Student>, StorageError> {
        let org = u64_to_i64("organization_id", organization.value())?;
        let raw_id = u64_to_i64("student_id", id.value())?;
        let row = sqlx::query(
            "SELECT id, organization_id, first_name, last_name, email FROM students \
             WHERE id = ?1 AND organization_id = ?2",
        )
        .bind(raw_id)
        .bind(org)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let groups = self
            .load_student_groups(org, &[raw_id])
            .await?
            .remove(&raw_id)
            .unwrap_or_default();
        Ok(Some(map_student_row(&row, groups)?))
    }

    async fn list_students(
        &self,
        organization: OrganizationId,
        group: StudentGroupId,
    ) -> Result<Vec<Student>, StorageError> {
        let org = u64_to_i64("organization_id", organization.value())?;
        let rows = sqlx::query(
            r"
            SELECT s.id, s.organization_id, s.first_name, s.last_name, s.email
            FROM students s
            JOIN group_students gs
              ON gs.student_id = s.id AND gs.organization_id = s.organization_id
            WHERE gs.group_id = ?1 AND gs.organization_id = ?2
            ORDER BY s.last_name ASC, s.first_name ASC, s.id ASC
            ",
        )
        .bind(u64_to_i64("group_id", group.value())?)
        .bind(org)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let ids: Vec<i64> = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(ser))
            .collect::<Result<_, _>>()?;
        let mut memberships = self.load_student_groups(org, &ids).await?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_id: i64 = row.try_get("id").map_err(ser)?;
            let groups = memberships.remove(&raw_id).unwrap_or_default();
            students.push(map_student_row(&row, groups)?);
        }
        Ok(students)
    }

    async fn groups_for_student(
        &self,
        organization: OrganizationId,
        student: StudentId,
    ) -> Result<Vec<StudentGroup>, StorageError> {
        let org = u64_to_i64("organization_id", organization.value())?;
        let rows = sqlx::query(
            r"
            SELECT g.id, g.organization_id, g.course_id, g.name, g.year
            FROM student_groups g
            JOIN group_students gs
              ON gs.group_id = g.id AND gs.organization_id = g.organization_id
            WHERE gs.student_id = ?1 AND gs.organization_id = ?2
            ORDER BY g.year ASC, g.name ASC, g.id ASC
            ",
        )
        .bind(u64_to_i64("student_id", student.value())?)
        .bind(org)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let ids: Vec<i64> = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(ser))
            .collect::<Result<_, _>>()?;
        let mut modules = self.load_group_modules(org, &ids).await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_id: i64 = row.try_get("id").map_err(ser)?;
            groups.push(map_group_row(&row, modules.remove(&raw_id).unwrap_or_default())?);
        }
        Ok(groups)
    }
}

impl SqliteRepository {
    async fn load_group_modules(
        &self,
        org: i64,
        group_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ModuleId>>, StorageError> {
        if group_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut sql = String::from(
            "SELECT group_id, module_id FROM group_modules \
             WHERE organization_id = ?1 AND group_id IN (",
        );
        push_placeholders(&mut sql, 2, group_ids.len());
        sql.push_str(") ORDER BY module_id ASC");

        let mut q = sqlx::query(&sql).bind(org);
        for id in group_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;

        let mut by_group: HashMap<i64, Vec<ModuleId>> = HashMap::new();
        for row in rows {
            let group_id: i64 = row.try_get("group_id").map_err(ser)?;
            by_group
                .entry(group_id)
                .or_default()
                .push(ModuleId::new(i64_to_u64(
                    "module_id",
                    row.try_get::<i64, _>("module_id").map_err(ser)?,
                )?));
        }
        Ok(by_group)
    }

    async fn load_student_groups(
        &self,
        org: i64,
        student_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<StudentGroupId>>, StorageError> {
        if student_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut sql = String::from(
            "SELECT student_id, group_id FROM group_students \
             WHERE organization_id = ?1 AND student_id IN (",
        );
        push_placeholders(&mut sql, 2, student_ids.len());
        sql.push_str(") ORDER BY group_id ASC");

        let mut q = sqlx::query(&sql).bind(org);
        for id in student_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;

        let mut by_student: HashMap<i64, Vec<StudentGroupId>> = HashMap::new();
        for row in rows {
            let student_id: i64 = row.try_get("student_id").map_err(ser)?;
            by_student
                .entry(student_id)
                .or_default()
                .push(StudentGroupId::new(i64_to_u64(
                    "group_id",
                    row.try_get::<i64, _>("group_id").map_err(ser)?,
                )?));
        }
        Ok(by_student)
    }
}
