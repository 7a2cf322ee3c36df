use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the course hierarchy, the four question table families, students
/// and groups with their join tables, the answers table with its compound
/// uniqueness constraint, and the hot-path indexes.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS courses (
                    id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    PRIMARY KEY (id, organization_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS modules (
                    id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    course_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    PRIMARY KEY (id, organization_id),
                    FOREIGN KEY (course_id, organization_id)
                        REFERENCES courses(id, organization_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lessons (
                    id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    module_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    PRIMARY KEY (id, organization_id),
                    FOREIGN KEY (module_id, organization_id)
                        REFERENCES modules(id, organization_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS topics (
                    id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    lesson_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    PRIMARY KEY (id, organization_id),
                    FOREIGN KEY (lesson_id, organization_id)
                        REFERENCES lessons(id, organization_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // One row per question regardless of variant; variant-specific
        // payload lives in the option/connection tables or inline columns.
        // Ids are only unique per variant, hence the variant in every key.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER NOT NULL,
                    question_variant TEXT NOT NULL
                        CHECK (question_variant IN
                            ('multiple_choice', 'order', 'connect', 'number')),
                    organization_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    quiz_id INTEGER,
                    text TEXT NOT NULL,
                    ord INTEGER NOT NULL DEFAULT 0,
                    correct_answer REAL,
                    tolerance REAL,
                    PRIMARY KEY (id, question_variant, organization_id),
                    FOREIGN KEY (topic_id, organization_id)
                        REFERENCES topics(id, organization_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_learning_objectives (
                    question_id INTEGER NOT NULL,
                    question_variant TEXT NOT NULL,
                    organization_id INTEGER NOT NULL,
                    learning_objective_id INTEGER NOT NULL,
                    PRIMARY KEY (question_id, question_variant, organization_id,
                                 learning_objective_id),
                    FOREIGN KEY (question_id, question_variant, organization_id)
                        REFERENCES questions(id, question_variant, organization_id)
                        ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // Options for multiple-choice, order and connect questions. The
        // variant decides which of the payload columns are meaningful, and
        // each variant keeps its own option id space.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_options (
                    id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    question_variant TEXT NOT NULL,
                    text TEXT NOT NULL,
                    is_correct INTEGER,
                    correct_order INTEGER,
                    position_x REAL,
                    position_y REAL,
                    PRIMARY KEY (id, question_variant, organization_id),
                    FOREIGN KEY (question_id, question_variant, organization_id)
                        REFERENCES questions(id, question_variant, organization_id)
                        ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS connect_connections (
                    organization_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    from_option_id INTEGER NOT NULL,
                    to_option_id INTEGER NOT NULL,
                    PRIMARY KEY (organization_id, question_id, from_option_id,
                                 to_option_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS students (
                    id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    email TEXT NOT NULL DEFAULT '',
                    PRIMARY KEY (id, organization_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS student_groups (
                    id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    course_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    year INTEGER NOT NULL,
                    PRIMARY KEY (id, organization_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS group_modules (
                    group_id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    module_id INTEGER NOT NULL,
                    PRIMARY KEY (group_id, organization_id, module_id),
                    FOREIGN KEY (group_id, organization_id)
                        REFERENCES student_groups(id, organization_id)
                        ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS group_students (
                    group_id INTEGER NOT NULL,
                    organization_id INTEGER NOT NULL,
                    student_id INTEGER NOT NULL,
                    PRIMARY KEY (group_id, organization_id, student_id),
                    FOREIGN KEY (group_id, organization_id)
                        REFERENCES student_groups(id, organization_id)
                        ON DELETE CASCADE,
                    FOREIGN KEY (student_id, organization_id)
                        REFERENCES students(id, organization_id)
                        ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // The compound uniqueness constraint makes the upsert atomic: two
        // concurrent submissions for the same identity resolve to one row.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS student_answers (
                    organization_id INTEGER NOT NULL,
                    student_id INTEGER NOT NULL,
                    question_variant TEXT NOT NULL,
                    question_id INTEGER NOT NULL,
                    quiz_id INTEGER NOT NULL,
                    selected_option_id INTEGER,
                    answer_data TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (organization_id, student_id, question_variant,
                                 question_id, quiz_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_org_topic
                    ON questions (organization_id, topic_id, question_variant);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_options_org_question
                    ON question_options (organization_id, question_variant, question_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_answers_org_student
                    ON student_answers (organization_id, student_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_topics_org_lesson
                    ON topics (organization_id, lesson_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
