use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, ModuleId, OrganizationId, StudentGroupId, StudentId};

/// A learner enrolled in zero or more student groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub organization: OrganizationId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub groups: Vec<StudentGroupId>,
}

impl Student {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A group of students enrolled in one course for a given year.
///
/// The referenced modules define which topics count toward the group's
/// mastery scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentGroup {
    pub id: StudentGroupId,
    pub organization: OrganizationId,
    pub course: CourseId,
    pub name: String,
    pub year: i32,
    pub modules: Vec<ModuleId>,
}
