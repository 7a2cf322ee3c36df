use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use mastery_core::model::{
    AnswerRecord, Course, CourseId, Lesson, LessonId, Module, ModuleId, OrganizationId, Question,
    QuestionRef, QuestionVariant, QuizId, Student, StudentGroup, StudentGroupId, StudentId, Topic,
    TopicId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read/write access to the four question variant stores.
///
/// All lookups are organization-scoped: a reference from another tenant
/// resolves to nothing rather than erroring.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or update a question of any variant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Resolve a polymorphic question reference. `None` when the id does not
    /// exist in that variant's store for this organization.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures, never for a missing row.
    async fn get_question(
        &self,
        organization: OrganizationId,
        reference: QuestionRef,
    ) -> Result<Option<Question>, StorageError>;

    /// List all questions of one variant owned by the given topics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_by_topics(
        &self,
        organization: OrganizationId,
        topics: &[TopicId],
        variant: QuestionVariant,
    ) -> Result<Vec<Question>, StorageError>;
}

/// Persisted student answers, keyed by (organization, student, question, quiz).
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Atomic create-or-overwrite on the compound identity. The stored
    /// record is returned; on overwrite the original `created_at` wins.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the answer cannot be stored.
    async fn upsert_answer(&self, answer: &AnswerRecord) -> Result<AnswerRecord, StorageError>;

    /// One student's answers whose question reference is in `refs`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_by_student_and_refs(
        &self,
        organization: OrganizationId,
        student: StudentId,
        refs: &[QuestionRef],
    ) -> Result<Vec<AnswerRecord>, StorageError>;

    /// Batch form over a student set; the group aggregation path. One call,
    /// not one per student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_by_students_and_refs(
        &self,
        organization: OrganizationId,
        students: &[StudentId],
        refs: &[QuestionRef],
    ) -> Result<Vec<AnswerRecord>, StorageError>;
}

/// Students and student groups.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Persist or update a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the group cannot be stored.
    async fn upsert_group(&self, group: &StudentGroup) -> Result<(), StorageError>;

    /// Fetch a group by id, `None` when missing or owned by another tenant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_group(
        &self,
        organization: OrganizationId,
        id: StudentGroupId,
    ) -> Result<Option<StudentGroup>, StorageError>;

    /// Persist or update a student, including group membership.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the student cannot be stored.
    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError>;

    /// Fetch a student by id, `None` when missing or owned by another tenant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_student(
        &self,
        organization: OrganizationId,
        id: StudentId,
    ) -> Result<Option<Student>, StorageError>;

    /// Members of a group, ordered by (last name, first name).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_students(
        &self,
        organization: OrganizationId,
        group: StudentGroupId,
    ) -> Result<Vec<Student>, StorageError>;

    /// Groups a student belongs to, ordered by (year, name).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn groups_for_student(
        &self,
        organization: OrganizationId,
        student: StudentId,
    ) -> Result<Vec<StudentGroup>, StorageError>;
}

/// Read/write access to the course hierarchy (authoring CRUD lives outside
/// this system; the engine needs the records and the module→topic walk).
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the module cannot be stored.
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the topic cannot be stored.
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError>;

    /// Fetch a topic by id, `None` when missing or owned by another tenant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_topic(
        &self,
        organization: OrganizationId,
        id: TopicId,
    ) -> Result<Option<Topic>, StorageError>;

    /// Distinct topics reachable from the given modules (via their lessons),
    /// ascending by topic id. The group scope resolution.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn topics_for_modules(
        &self,
        organization: OrganizationId,
        modules: &[ModuleId],
    ) -> Result<Vec<TopicId>, StorageError>;
}

type AnswerKey = (OrganizationId, StudentId, QuestionRef, QuizId);

#[derive(Default)]
struct InMemoryState {
    courses: HashMap<(OrganizationId, CourseId), Course>,
    modules: HashMap<(OrganizationId, ModuleId), Module>,
    lessons: HashMap<(OrganizationId, LessonId), Lesson>,
    topics: HashMap<(OrganizationId, TopicId), Topic>,
    questions: HashMap<(OrganizationId, QuestionRef), Question>,
    students: HashMap<(OrganizationId, StudentId), Student>,
    groups: HashMap<(OrganizationId, StudentGroupId), StudentGroup>,
    answers: HashMap<AnswerKey, AnswerRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .questions
            .insert((question.organization, question.reference()), question.clone());
        Ok(())
    }

    async fn get_question(
        &self,
        organization: OrganizationId,
        reference: QuestionRef,
    ) -> Result<Option<Question>, StorageError> {
        let state = self.lock()?;
        Ok(state.questions.get(&(organization, reference)).cloned())
    }

    async fn list_by_topics(
        &self,
        organization: OrganizationId,
        topics: &[TopicId],
        variant: QuestionVariant,
    ) -> Result<Vec<Question>, StorageError> {
        let wanted: HashSet<TopicId> = topics.iter().copied().collect();
        let state = self.lock()?;
        let mut found: Vec<Question> = state
            .questions
            .values()
            .filter(|q| {
                q.organization == organization
                    && q.variant() == variant
                    && wanted.contains(&q.topic)
            })
            .cloned()
            .collect();
        found.sort_by_key(|q| (q.order, q.id));
        Ok(found)
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn upsert_answer(&self, answer: &AnswerRecord) -> Result<AnswerRecord, StorageError> {
        let key = (
            answer.organization,
            answer.student,
            answer.question,
            answer.quiz,
        );
        let mut state = self.lock()?;
        let mut stored = answer.clone();
        if let Some(existing) = state.answers.get(&key) {
            stored.created_at = existing.created_at;
        }
        state.answers.insert(key, stored.clone());
        Ok(stored)
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
        let wanted_students: HashSet<StudentId> = students.iter().copied().collect();
        let wanted_refs: HashSet<QuestionRef> = refs.iter().copied().collect();
        let state = self.lock()?;
        let mut found: Vec<AnswerRecord> = state
            .answers
            .values()
            .filter(|a| {
                a.organization == organization
                    && wanted_students.contains(&a.student)
                    && wanted_refs.contains(&a.question)
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.student, a.question, a.quiz));
        Ok(found)
    }
}

#[async_trait]
impl GroupRepository for InMemoryRepository {
    async fn upsert_group(&self, group: &StudentGroup) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .groups
            .insert((group.organization, group.id), group.clone());
        Ok(())
    }

    async fn get_group(
        &self,
        organization: OrganizationId,
        id: StudentGroupId,
    ) -> Result<Option<StudentGroup>, StorageError> {
        let state = self.lock()?;
        Ok(state.groups.get(&(organization, id)).cloned())
    }

    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .students
            .insert((student.organization, student.id), student.clone());
        Ok(())
    }

    async fn get_student(
        &self,
        organization: OrganizationId,
        id: StudentId,
    ) -> Result<Option<Student>, StorageError> {
        let state = self.lock()?;
        Ok(state.students.get(&(organization, id)).cloned())
    }

    async fn list_students(
        &self,
        organization: OrganizationId,
        group: StudentGroupId,
    ) -> Result<Vec<Student>, StorageError> {
        let state = self.lock()?;
        let mut found: Vec<Student> = state
            .students
            .values()
            .filter(|s| s.organization == organization && s.groups.contains(&group))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(found)
    }

    async fn groups_for_student(
        &self,
        organization: OrganizationId,
        student: StudentId,
    ) -> Result<Vec<StudentGroup>, StorageError> {
        let state = self.lock()?;
        let Some(student) = state.students.get(&(organization, student)) else {
            return Ok(Vec::new());
        };
        let mut found: Vec<StudentGroup> = student
            .groups
            .iter()
            .filter_map(|gid| state.groups.get(&(organization, *gid)).cloned())
            .collect();
        found.sort_by(|a, b| (a.year, &a.name, a.id).cmp(&(b.year, &b.name, b.id)));
        Ok(found)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .courses
            .insert((course.organization, course.id), course.clone());
        Ok(())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .modules
            .insert((module.organization, module.id), module.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .lessons
            .insert((lesson.organization, lesson.id), lesson.clone());
        Ok(())
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .topics
            .insert((topic.organization, topic.id), topic.clone());
        Ok(())
    }

    async fn get_topic(
        &self,
        organization: OrganizationId,
        id: TopicId,
    ) -> Result<Option<Topic>, StorageError> {
        let state = self.lock()?;
        Ok(state.topics.get(&(organization, id)).cloned())
    }

    async fn topics_for_modules(
        &self,
        organization: OrganizationId,
        modules: &[ModuleId],
    ) -> Result<Vec<TopicId>, StorageError> {
        let wanted: HashSet<ModuleId> = modules.iter().copied().collect();
        let state = self.lock()?;
        let in_scope: HashSet<LessonId> = state
            .lessons
            .values()
            .filter(|l| l.organization == organization && wanted.contains(&l.module))
            .map(|l| l.id)
            .collect();
        let mut topics: Vec<TopicId> = state
            .topics
            .values()
            .filter(|t| t.organization == organization && in_scope.contains(&t.lesson))
            .map(|t| t.id)
            .collect();
        topics.sort();
        topics.dedup();
        Ok(topics)
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub groups: Arc<dyn GroupRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let answers: Arc<dyn AnswerRepository> = Arc::new(repo.clone());
        let groups: Arc<dyn GroupRepository> = Arc::new(repo);
        Self {
            catalog,
            questions,
            answers,
            groups,
        }
    }
}
