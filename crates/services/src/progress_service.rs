//! On-demand mastery computation for students and student groups.
//!
//! Nothing here is cached or persisted: every call recomputes from current
//! answers and current question definitions, so edits to content are
//! reflected on the next read.

use serde::{Deserialize, Serialize};

use mastery_core::model::{
    OrganizationId, QuestionVariant, Student, StudentGroup, StudentGroupId, StudentId, TopicId,
};
use mastery_core::progress::{self, QuestionIndex, TopicProgress, percentage};
use storage::repository::Storage;

use crate::error::ProgressError;

/// One group member's binary mastery summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentMastery {
    pub student: Student,
    pub mastered_topics: u32,
    pub total_topics: u32,
    pub percentage: f64,
}

/// Group-level progress: topic scope size plus one summary per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProgress {
    pub group: StudentGroup,
    pub total_topics: u32,
    pub students: Vec<StudentMastery>,
}

/// One student's mastery summary within one of their groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMastery {
    pub group: StudentGroup,
    pub mastered_topics: u32,
    pub total_topics: u32,
    pub percentage: f64,
}

/// Storage-backed progress aggregation.
#[derive(Clone)]
pub struct ProgressService {
    storage: Storage,
}

impl ProgressService {
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Batch-fetches every variant's questions for the topic set and builds
    /// the reference index all aggregation starts from.
    async fn question_index(
        &self,
        organization: OrganizationId,
        topics: &[TopicId],
    ) -> Result<QuestionIndex, ProgressError> {
        let mut questions = Vec::new();
        for variant in QuestionVariant::ALL {
            questions.extend(
                self.storage
                    .questions
                    .list_by_topics(organization, topics, variant)
                    .await?,
            );
        }
        Ok(QuestionIndex::from_questions(questions))
    }

    /// Per-topic answered/correct/total counts for one student, topics in
    /// caller order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` if the student does not exist in
    /// this organization, `ProgressError::Storage` on repository failures.
    pub async fn topic_progress(
        &self,
        organization: OrganizationId,
        student: StudentId,
        topics: &[TopicId],
    ) -> Result<Vec<TopicProgress>, ProgressError> {
        self.storage
            .groups
            .get_student(organization, student)
            .await?
            .ok_or(ProgressError::NotFound)?;

        let index = self.question_index(organization, topics).await?;
        let answers = self
            .storage
            .answers
            .list_by_student_and_refs(organization, student, &index.refs())
            .await?;
        tracing::debug!(
            student = %student,
            topics = topics.len(),
            questions = index.len(),
            answers = answers.len(),
            "computing topic progress"
        );

        Ok(progress::topic_progress(topics, &index, &answers))
    }

    /// Group-level rollup: one batched question fetch and one batched answer
    /// fetch for the whole member set, then a per-student fold.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` if the group does not exist in this
    /// organization, `ProgressError::Storage` on repository failures.
    pub async fn group_progress(
        &self,
        organization: OrganizationId,
        group: StudentGroupId,
    ) -> Result<GroupProgress, ProgressError> {
        let group = self
            .storage
            .groups
            .get_group(organization, group)
            .await?
            .ok_or(ProgressError::NotFound)?;

        let topics = self
            .storage
            .catalog
            .topics_for_modules(organization, &group.modules)
            .await?;
        let total_topics = u32::try_from(topics.len()).unwrap_or(u32::MAX);

        let students = self.storage.groups.list_students(organization, group.id).await?;
        let index = self.question_index(organization, &topics).await?;
        let member_ids: Vec<StudentId> = students.iter().map(|s| s.id).collect();
        let answers = self
            .storage
            .answers
            .list_by_students_and_refs(organization, &member_ids, &index.refs())
            .await?;
        tracing::debug!(
            group = %group.id,
            students = students.len(),
            topics = topics.len(),
            answers = answers.len(),
            "computing group progress"
        );

        let mastered = progress::mastered_topics_by_student(&index, &answers);
        let students = students
            .into_iter()
            .map(|student| {
                let count = mastered
                    .get(&student.id)
                    .map_or(0, |topics| u32::try_from(topics.len()).unwrap_or(u32::MAX));
                StudentMastery {
                    mastered_topics: count,
                    total_topics,
                    percentage: percentage(count, total_topics),
                    student,
                }
            })
            .collect();

        Ok(GroupProgress {
            group,
            total_topics,
            students,
        })
    }

    /// The single-student view over each of their groups.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` if the student does not exist in
    /// this organization, `ProgressError::Storage` on repository failures.
    pub async fn student_groups_progress(
        &self,
        organization: OrganizationId,
        student: StudentId,
    ) -> Result<Vec<GroupMastery>, ProgressError> {
        let student = self
            .storage
            .groups
            .get_student(organization, student)
            .await?
            .ok_or(ProgressError::NotFound)?;

        let groups = self
            .storage
            .groups
            .groups_for_student(organization, student.id)
            .await?;

        let mut summaries = Vec::with_capacity(groups.len());
        for group in groups {
            let topics = self
                .storage
                .catalog
                .topics_for_modules(organization, &group.modules)
                .await?;
            let total_topics = u32::try_from(topics.len()).unwrap_or(u32::MAX);

            let index = self.question_index(organization, &topics).await?;
            let answers = self
                .storage
                .answers
                .list_by_student_and_refs(organization, student.id, &index.refs())
                .await?;

            let mastered = progress::mastered_topics_by_student(&index, &answers);
            let count = mastered
                .get(&student.id)
                .map_or(0, |topics| u32::try_from(topics.len()).unwrap_or(u32::MAX));

            summaries.push(GroupMastery {
                group,
                mastered_topics: count,
                total_topics,
                percentage: percentage(count, total_topics),
            });
        }
        Ok(summaries)
    }
}
