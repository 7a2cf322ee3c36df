use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new id from a raw value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value.
            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map($name::new).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

define_id!(
    /// Unique identifier for an Organization (tenant).
    OrganizationId
);
define_id!(
    /// Unique identifier for a Course.
    CourseId
);
define_id!(
    /// Unique identifier for a Module.
    ModuleId
);
define_id!(
    /// Unique identifier for a Lesson.
    LessonId
);
define_id!(
    /// Unique identifier for a Topic.
    TopicId
);
define_id!(
    /// Unique identifier for a Learning Objective.
    LearningObjectiveId
);
define_id!(
    /// Unique identifier for a Quiz.
    QuizId
);
define_id!(
    /// Unique identifier for a Question within one variant's id space.
    ///
    /// Question ids are only unique per variant; a full question identity is a
    /// `QuestionRef` (variant tag + id).
    QuestionId
);
define_id!(
    /// Unique identifier for an answer Option of any question variant.
    OptionId
);
define_id!(
    /// Unique identifier for a Student.
    StudentId
);
define_id!(
    /// Unique identifier for a StudentGroup.
    StudentGroupId
);
