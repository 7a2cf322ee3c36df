use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LessonId, ModuleId, OrganizationId, TopicId};

/// A course: the root of the content hierarchy for one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub organization: OrganizationId,
    pub name: String,
    pub description: String,
}

/// A module within a course. Student groups reference modules to define
/// which topics count toward their mastery scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub organization: OrganizationId,
    pub course: CourseId,
    pub name: String,
    pub description: String,
}

/// A lesson within a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub organization: OrganizationId,
    pub module: ModuleId,
    pub name: String,
    pub description: String,
}

/// A topic within a lesson: the scoping unit for mastery computation.
/// Learning objectives appear only as id tags on questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub organization: OrganizationId,
    pub lesson: LessonId,
    pub name: String,
    pub description: String,
}
