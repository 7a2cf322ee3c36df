use chrono::Duration;
use serde_json::json;

use mastery_core::model::{
    AnswerRecord, ChoiceOption, ConnectOption, Connection, Course, CourseId, Lesson, LessonId,
    Module, ModuleId, OptionId, OrderOption, OrganizationId, Question, QuestionId,
    QuestionPayload, QuestionRef, QuestionVariant, QuizId, Student, StudentGroup, StudentGroupId,
    StudentId, Topic, TopicId,
};
use mastery_core::time::fixed_now;
use storage::repository::{
    AnswerRepository, CatalogRepository, GroupRepository, QuestionRepository,
};
use storage::sqlite::SqliteRepository;

const ORG: u64 = 1;

fn org() -> OrganizationId {
    OrganizationId::new(ORG)
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_hierarchy(repo: &SqliteRepository, topics: u64) {
    repo.upsert_course(&Course {
        id: CourseId::new(1),
        organization: org(),
        name: "Safety".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    repo.upsert_module(&Module {
        id: ModuleId::new(1),
        organization: org(),
        course: CourseId::new(1),
        name: "Basics".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    repo.upsert_lesson(&Lesson {
        id: LessonId::new(1),
        organization: org(),
        module: ModuleId::new(1),
        name: "Lesson 1".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    for id in 1..=topics {
        repo.upsert_topic(&Topic {
            id: TopicId::new(id),
            organization: org(),
            lesson: LessonId::new(1),
            name: format!("Topic {id}"),
            description: String::new(),
        })
        .await
        .unwrap();
    }
}

fn base_question(id: u64, topic: u64, payload: QuestionPayload) -> Question {
    Question {
        id: QuestionId::new(id),
        organization: org(),
        topic: TopicId::new(topic),
        quiz: Some(QuizId::new(1)),
        text: format!("Question {id}"),
        order: 1,
        learning_objectives: Vec::new(),
        payload,
    }
}

#[tokio::test]
async fn question_roundtrip_covers_all_variants() {
    let repo = connect("memdb_question_roundtrip").await;
    seed_hierarchy(&repo, 1).await;

    let questions = vec![
        base_question(
            1,
            1,
            QuestionPayload::MultipleChoice {
                options: vec![
                    ChoiceOption {
                        id: OptionId::new(1),
                        text: "yes".into(),
                        is_correct: true,
                    },
                    ChoiceOption {
                        id: OptionId::new(2),
                        text: "no".into(),
                        is_correct: false,
                    },
                ],
            },
        ),
        base_question(
            1,
            1,
            QuestionPayload::Order {
                options: vec![
                    OrderOption {
                        id: OptionId::new(3),
                        text: "first".into(),
                        correct_order: 1,
                    },
                    OrderOption {
                        id: OptionId::new(4),
                        text: "second".into(),
                        correct_order: 2,
                    },
                ],
            },
        ),
        base_question(
            1,
            1,
            QuestionPayload::Connect {
                options: vec![
                    ConnectOption {
                        id: OptionId::new(5),
                        text: "left".into(),
                        position_x: 0.0,
                        position_y: 10.0,
                    },
                    ConnectOption {
                        id: OptionId::new(6),
                        text: "right".into(),
                        position_x: 100.0,
                        position_y: 10.0,
                    },
                ],
                connections: vec![Connection {
                    from: OptionId::new(5),
                    to: OptionId::new(6),
                }],
            },
        ),
        base_question(
            1,
            1,
            QuestionPayload::Number {
                correct_answer: 42.0,
                tolerance: 0.5,
            },
        ),
    ];

    for question in &questions {
        repo.upsert_question(question).await.unwrap();
    }

    // Same numeric id in every variant's store; each resolves to its own row.
    for question in &questions {
        let fetched = repo
            .get_question(org(), question.reference())
            .await
            .unwrap()
            .expect("question should exist");
        assert_eq!(&fetched, question);
    }
}

#[tokio::test]
async fn question_upsert_replaces_payload() {
    let repo = connect("memdb_question_upsert").await;
    seed_hierarchy(&repo, 1).await;

    let mut question = base_question(
        1,
        1,
        QuestionPayload::MultipleChoice {
            options: vec![ChoiceOption {
                id: OptionId::new(1),
                text: "old".into(),
                is_correct: false,
            }],
        },
    );
    repo.upsert_question(&question).await.unwrap();

    question.text = "Updated".into();
    question.payload = QuestionPayload::MultipleChoice {
        options: vec![
            ChoiceOption {
                id: OptionId::new(1),
                text: "new".into(),
                is_correct: true,
            },
            ChoiceOption {
                id: OptionId::new(2),
                text: "added".into(),
                is_correct: false,
            },
        ],
    };
    repo.upsert_question(&question).await.unwrap();

    let fetched = repo
        .get_question(org(), question.reference())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, question);

    let listed = repo
        .list_by_topics(org(), &[TopicId::new(1)], QuestionVariant::MultipleChoice)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn questions_are_invisible_across_organizations() {
    let repo = connect("memdb_question_tenancy").await;
    seed_hierarchy(&repo, 1).await;

    let question = base_question(
        1,
        1,
        QuestionPayload::Number {
            correct_answer: 1.0,
            tolerance: 0.0,
        },
    );
    repo.upsert_question(&question).await.unwrap();

    let other = repo
        .get_question(OrganizationId::new(2), question.reference())
        .await
        .unwrap();
    assert!(other.is_none());

    let listed = repo
        .list_by_topics(
            OrganizationId::new(2),
            &[TopicId::new(1)],
            QuestionVariant::Number,
        )
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn answer_upsert_is_create_or_overwrite() {
    let repo = connect("memdb_answer_upsert").await;

    let reference = QuestionRef::new(QuestionVariant::Order, QuestionId::new(7));
    let first = AnswerRecord {
        organization: org(),
        student: StudentId::new(1),
        question: reference,
        quiz: QuizId::new(1),
        selected_option: None,
        answer_data: Some(json!([3, 1, 2])),
        created_at: fixed_now(),
        updated_at: fixed_now(),
    };
    let stored = repo.upsert_answer(&first).await.unwrap();
    assert_eq!(stored.answer_data, Some(json!([3, 1, 2])));

    let mut second = first.clone();
    second.answer_data = Some(json!([1, 2, 3]));
    second.created_at = fixed_now() + Duration::hours(2);
    second.updated_at = fixed_now() + Duration::hours(2);
    let overwritten = repo.upsert_answer(&second).await.unwrap();

    assert_eq!(overwritten.answer_data, Some(json!([1, 2, 3])));
    assert_eq!(overwritten.created_at, first.created_at);
    assert_eq!(overwritten.updated_at, second.updated_at);

    let listed = repo
        .list_by_student_and_refs(org(), StudentId::new(1), &[reference])
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn answers_list_in_one_batch_per_student_set() {
    let repo = connect("memdb_answer_batch").await;

    let mc_ref = QuestionRef::new(QuestionVariant::MultipleChoice, QuestionId::new(1));
    let number_ref = QuestionRef::new(QuestionVariant::Number, QuestionId::new(1));
    let unrelated = QuestionRef::new(QuestionVariant::Connect, QuestionId::new(9));

    for (student, reference) in [(1, mc_ref), (1, number_ref), (2, mc_ref), (3, unrelated)] {
        let answer = AnswerRecord {
            organization: org(),
            student: StudentId::new(student),
            question: reference,
            quiz: QuizId::new(1),
            selected_option: (reference.variant == QuestionVariant::MultipleChoice)
                .then(|| OptionId::new(1)),
            answer_data: (reference.variant != QuestionVariant::MultipleChoice)
                .then(|| json!(1)),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        };
        repo.upsert_answer(&answer).await.unwrap();
    }

    let listed = repo
        .list_by_students_and_refs(
            org(),
            &[StudentId::new(1), StudentId::new(2), StudentId::new(3)],
            &[mc_ref, number_ref],
        )
        .await
        .unwrap();

    // Three matching rows; student 3's answer references a question outside
    // the requested set. The same numeric id under two variants stays two
    // distinct questions.
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|a| a.question != unrelated));
}

#[tokio::test]
async fn topics_resolve_from_modules_through_lessons() {
    let repo = connect("memdb_topic_scope").await;
    seed_hierarchy(&repo, 2).await;

    // A second module with its own lesson and topic.
    repo.upsert_module(&Module {
        id: ModuleId::new(2),
        organization: org(),
        course: CourseId::new(1),
        name: "Advanced".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    repo.upsert_lesson(&Lesson {
        id: LessonId::new(2),
        organization: org(),
        module: ModuleId::new(2),
        name: "Lesson 2".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    repo.upsert_topic(&Topic {
        id: TopicId::new(10),
        organization: org(),
        lesson: LessonId::new(2),
        name: "Deep dive".into(),
        description: String::new(),
    })
    .await
    .unwrap();

    let first = repo
        .topics_for_modules(org(), &[ModuleId::new(1)])
        .await
        .unwrap();
    assert_eq!(first, vec![TopicId::new(1), TopicId::new(2)]);

    let both = repo
        .topics_for_modules(org(), &[ModuleId::new(1), ModuleId::new(2)])
        .await
        .unwrap();
    assert_eq!(both, vec![TopicId::new(1), TopicId::new(2), TopicId::new(10)]);
}

#[tokio::test]
async fn groups_and_students_roundtrip_with_memberships() {
    let repo = connect("memdb_groups").await;
    seed_hierarchy(&repo, 1).await;

    let group = StudentGroup {
        id: StudentGroupId::new(1),
        organization: org(),
        course: CourseId::new(1),
        name: "2025 cohort".into(),
        year: 2025,
        modules: vec![ModuleId::new(1)],
    };
    repo.upsert_group(&group).await.unwrap();

    for (id, first, last) in [(1, "Noor", "Visser"), (2, "Ada", "Boer")] {
        repo.upsert_student(&Student {
            id: StudentId::new(id),
            organization: org(),
            first_name: first.into(),
            last_name: last.into(),
            email: format!("{first}@example.org").to_lowercase(),
            groups: vec![group.id],
        })
        .await
        .unwrap();
    }

    let fetched = repo.get_group(org(), group.id).await.unwrap().unwrap();
    assert_eq!(fetched, group);

    let students = repo.list_students(org(), group.id).await.unwrap();
    let names: Vec<String> = students.iter().map(Student::full_name).collect();
    assert_eq!(names, vec!["Ada Boer", "Noor Visser"]);

    let groups = repo
        .groups_for_student(org(), StudentId::new(1))
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].modules, vec![ModuleId::new(1)]);
}
