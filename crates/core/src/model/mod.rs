mod answer;
mod hierarchy;
mod ids;
mod question;
mod student;

pub use answer::{AnswerDraft, AnswerRecord, AnswerValidationError};
pub use hierarchy::{Course, Lesson, Module, Topic};
pub use ids::{
    CourseId, LearningObjectiveId, LessonId, ModuleId, OptionId, OrganizationId, ParseIdError,
    QuestionId, QuizId, StudentGroupId, StudentId, TopicId,
};
pub use question::{
    ChoiceOption, ConnectOption, Connection, OrderOption, Question, QuestionPayload, QuestionRef,
    QuestionVariant,
};
pub use student::{Student, StudentGroup};
