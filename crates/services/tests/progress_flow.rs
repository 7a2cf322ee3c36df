//! End-to-end pass over SQLite: seed content, submit answers through the
//! service layer, read progress back.

use serde_json::json;

use mastery_core::model::{
    AnswerDraft, ChoiceOption, Connection, ConnectOption, Course, CourseId, Lesson, LessonId,
    Module, ModuleId, OptionId, OrderOption, OrganizationId, Question, QuestionId,
    QuestionPayload, QuizId, Student, StudentGroup, StudentGroupId, StudentId, Topic, TopicId,
};
use mastery_core::time::fixed_clock;
use services::{AnswerService, ProgressService};
use storage::repository::Storage;

const ORG: OrganizationId = OrganizationId::new(1);

async fn storage(name: &str) -> Storage {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    Storage::sqlite(&url).await.expect("sqlite storage")
}

fn question(id: u64, topic: u64, order: u32, payload: QuestionPayload) -> Question {
    Question {
        id: QuestionId::new(id),
        organization: ORG,
        topic: TopicId::new(topic),
        quiz: Some(QuizId::new(1)),
        text: format!("Question {id}"),
        order,
        learning_objectives: Vec::new(),
        payload,
    }
}

/// Course -> module -> lesson -> two topics, with one question of each
/// variant in topic 1 and a single multiple-choice question in topic 2.
async fn seed_content(storage: &Storage) -> Vec<Question> {
    storage
        .catalog
        .upsert_course(&Course {
            id: CourseId::new(1),
            organization: ORG,
            name: "Course".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    storage
        .catalog
        .upsert_module(&Module {
            id: ModuleId::new(1),
            organization: ORG,
            course: CourseId::new(1),
            name: "Module".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    storage
        .catalog
        .upsert_lesson(&Lesson {
            id: LessonId::new(1),
            organization: ORG,
            module: ModuleId::new(1),
            name: "Lesson".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    for id in [1, 2] {
        storage
            .catalog
            .upsert_topic(&Topic {
                id: TopicId::new(id),
                organization: ORG,
                lesson: LessonId::new(1),
                name: format!("Topic {id}"),
                description: String::new(),
            })
            .await
            .unwrap();
    }

    let questions = vec![
        question(
            1,
            1,
            1,
            QuestionPayload::MultipleChoice {
                options: vec![
                    ChoiceOption {
                        id: OptionId::new(11),
                        text: "right".into(),
                        is_correct: true,
                    },
                    ChoiceOption {
                        id: OptionId::new(12),
                        text: "wrong".into(),
                        is_correct: false,
                    },
                ],
            },
        ),
        question(
            1,
            1,
            2,
            QuestionPayload::Order {
                options: vec![
                    OrderOption {
                        id: OptionId::new(21),
                        text: "A".into(),
                        correct_order: 1,
                    },
                    OrderOption {
                        id: OptionId::new(22),
                        text: "B".into(),
                        correct_order: 2,
                    },
                ],
            },
        ),
        question(
            1,
            1,
            3,
            QuestionPayload::Connect {
                options: vec![
                    ConnectOption {
                        id: OptionId::new(31),
                        text: "left".into(),
                        position_x: 0.0,
                        position_y: 0.0,
                    },
                    ConnectOption {
                        id: OptionId::new(32),
                        text: "right".into(),
                        position_x: 100.0,
                        position_y: 0.0,
                    },
                ],
                connections: vec![Connection {
                    from: OptionId::new(31),
                    to: OptionId::new(32),
                }],
            },
        ),
        question(
            1,
            1,
            4,
            QuestionPayload::Number {
                correct_answer: 12.0,
                tolerance: 0.5,
            },
        ),
        question(
            2,
            2,
            1,
            QuestionPayload::MultipleChoice {
                options: vec![ChoiceOption {
                    id: OptionId::new(41),
                    text: "only".into(),
                    is_correct: true,
                }],
            },
        ),
    ];
    for q in &questions {
        storage.questions.upsert_question(q).await.unwrap();
    }
    questions
}

async fn seed_people(storage: &Storage, student_ids: &[u64]) -> StudentGroupId {
    let group = StudentGroup {
        id: StudentGroupId::new(1),
        organization: ORG,
        course: CourseId::new(1),
        name: "Cohort".into(),
        year: 2026,
        modules: vec![ModuleId::new(1)],
    };
    storage.groups.upsert_group(&group).await.unwrap();

    for &id in student_ids {
        storage
            .groups
            .upsert_student(&Student {
                id: StudentId::new(id),
                organization: ORG,
                first_name: format!("Student{id}"),
                last_name: "Demo".into(),
                email: String::new(),
                groups: vec![group.id],
            })
            .await
            .unwrap();
    }
    group.id
}

fn draft(
    student: u64,
    question: &Question,
    selected_option: Option<u64>,
    answer_data: Option<serde_json::Value>,
) -> AnswerDraft {
    AnswerDraft {
        student: StudentId::new(student),
        question: question.reference(),
        quiz: QuizId::new(1),
        selected_option: selected_option.map(OptionId::new),
        answer_data,
    }
}

#[tokio::test]
async fn answers_flow_into_topic_progress() {
    let storage = storage("memdb_flow_topic").await;
    let questions = seed_content(&storage).await;
    seed_people(&storage, &[1]).await;

    let answers = AnswerService::new(storage.clone(), fixed_clock());
    let progress = ProgressService::new(storage);

    // Four answers in topic 1: mc correct, order wrong, connect correct
    // (reversed direction), number correct on the tolerance boundary.
    answers
        .submit_answer(ORG, draft(1, &questions[0], Some(11), None))
        .await
        .unwrap();
    answers
        .submit_answer(ORG, draft(1, &questions[1], None, Some(json!([22, 21]))))
        .await
        .unwrap();
    answers
        .submit_answer(ORG, draft(1, &questions[2], None, Some(json!([[32, 31]]))))
        .await
        .unwrap();
    answers
        .submit_answer(ORG, draft(1, &questions[3], None, Some(json!(12.5))))
        .await
        .unwrap();

    let topics = [TopicId::new(1), TopicId::new(2)];
    let progress = progress
        .topic_progress(ORG, StudentId::new(1), &topics)
        .await
        .unwrap();

    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0].topic, TopicId::new(1));
    assert_eq!(progress[0].total_questions, 4);
    assert_eq!(progress[0].questions_answered, 4);
    assert_eq!(progress[0].questions_correct, 3);
    assert_eq!(progress[0].percentage, 75.0);

    assert_eq!(progress[1].topic, TopicId::new(2));
    assert_eq!(progress[1].questions_answered, 0);
    assert_eq!(progress[1].total_questions, 1);
    assert_eq!(progress[1].percentage, 0.0);
}

#[tokio::test]
async fn resubmission_updates_progress_in_place() {
    let storage = storage("memdb_flow_resubmit").await;
    let questions = seed_content(&storage).await;
    seed_people(&storage, &[1]).await;

    let answers = AnswerService::new(storage.clone(), fixed_clock());
    let progress = ProgressService::new(storage);

    answers
        .submit_answer(ORG, draft(1, &questions[0], Some(12), None))
        .await
        .unwrap();
    let before = progress
        .topic_progress(ORG, StudentId::new(1), &[TopicId::new(1)])
        .await
        .unwrap();
    assert_eq!(before[0].questions_answered, 1);
    assert_eq!(before[0].questions_correct, 0);

    answers
        .submit_answer(ORG, draft(1, &questions[0], Some(11), None))
        .await
        .unwrap();
    let after = progress
        .topic_progress(ORG, StudentId::new(1), &[TopicId::new(1)])
        .await
        .unwrap();
    assert_eq!(after[0].questions_answered, 1);
    assert_eq!(after[0].questions_correct, 1);
}

#[tokio::test]
async fn group_progress_spans_students_and_topics() {
    let storage = storage("memdb_flow_group").await;
    let questions = seed_content(&storage).await;
    let group = seed_people(&storage, &[1, 2]).await;

    let answers = AnswerService::new(storage.clone(), fixed_clock());
    let progress = ProgressService::new(storage);

    // Student 1 masters both topics; student 2 answers only topic 1, wrong.
    answers
        .submit_answer(ORG, draft(1, &questions[0], Some(11), None))
        .await
        .unwrap();
    answers
        .submit_answer(ORG, draft(1, &questions[4], Some(41), None))
        .await
        .unwrap();
    answers
        .submit_answer(ORG, draft(2, &questions[0], Some(12), None))
        .await
        .unwrap();

    let rollup = progress.group_progress(ORG, group).await.unwrap();
    assert_eq!(rollup.total_topics, 2);
    assert_eq!(rollup.students.len(), 2);

    let by_student: Vec<(u64, u32, f64)> = rollup
        .students
        .iter()
        .map(|s| (s.student.id.value(), s.mastered_topics, s.percentage))
        .collect();
    assert!(by_student.contains(&(1, 2, 100.0)));
    assert!(by_student.contains(&(2, 0, 0.0)));

    let single = progress
        .student_groups_progress(ORG, StudentId::new(1))
        .await
        .unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].mastered_topics, 2);
    assert_eq!(single[0].total_topics, 2);
    assert_eq!(single[0].percentage, 100.0);
}
