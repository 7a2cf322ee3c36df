use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::json;

use mastery_core::model::{
    AnswerRecord, ChoiceOption, ConnectOption, Connection, Course, CourseId, Lesson, LessonId,
    Module, ModuleId, OptionId, OrderOption, OrganizationId, Question, QuestionId,
    QuestionPayload, QuizId, Student, StudentGroup, StudentGroupId, StudentId, Topic, TopicId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    organization: OrganizationId,
    students: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidOrg { raw: String },
    InvalidStudents { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidOrg { raw } => write!(f, "invalid --org value: {raw}"),
            ArgsError::InvalidStudents { raw } => write!(f, "invalid --students value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("MASTERY_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut organization = std::env::var("MASTERY_ORG_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| OrganizationId::new(1), OrganizationId::new);
        let mut students = std::env::var("MASTERY_STUDENTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--org" => {
                    let value = require_value(&mut args, "--org")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidOrg { raw: value.clone() })?;
                    organization = OrganizationId::new(parsed);
                }
                "--students" => {
                    let value = require_value(&mut args, "--students")?;
                    students = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidStudents { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            organization,
            students,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --org <id>                Organization id to seed (default: 1)");
    eprintln!("  --students <n>            Number of demo students (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  MASTERY_DB_URL, MASTERY_ORG_ID, MASTERY_STUDENTS");
}

fn demo_questions(org: OrganizationId, topic: TopicId, quiz: QuizId) -> Vec<Question> {
    let base = |id: u64, text: &str, order: u32, payload: QuestionPayload| Question {
        id: QuestionId::new(id),
        organization: org,
        topic,
        quiz: Some(quiz),
        text: text.into(),
        order,
        learning_objectives: Vec::new(),
        payload,
    };

    vec![
        base(
            1,
            "Which number comes after three?",
            1,
            QuestionPayload::MultipleChoice {
                options: vec![
                    ChoiceOption {
                        id: OptionId::new(1),
                        text: "Four".into(),
                        is_correct: true,
                    },
                    ChoiceOption {
                        id: OptionId::new(2),
                        text: "Five".into(),
                        is_correct: false,
                    },
                ],
            },
        ),
        base(
            1,
            "Put the steps in order",
            2,
            QuestionPayload::Order {
                options: vec![
                    OrderOption {
                        id: OptionId::new(3),
                        text: "Check".into(),
                        correct_order: 1,
                    },
                    OrderOption {
                        id: OptionId::new(4),
                        text: "Call".into(),
                        correct_order: 2,
                    },
                    OrderOption {
                        id: OptionId::new(5),
                        text: "Care".into(),
                        correct_order: 3,
                    },
                ],
            },
        ),
        base(
            1,
            "Match the term to its definition",
            3,
            QuestionPayload::Connect {
                options: vec![
                    ConnectOption {
                        id: OptionId::new(6),
                        text: "AED".into(),
                        position_x: 0.0,
                        position_y: 0.0,
                    },
                    ConnectOption {
                        id: OptionId::new(7),
                        text: "Defibrillator".into(),
                        position_x: 200.0,
                        position_y: 0.0,
                    },
                ],
                connections: vec![Connection {
                    from: OptionId::new(6),
                    to: OptionId::new(7),
                }],
            },
        ),
        base(
            1,
            "How many compressions per minute?",
            4,
            QuestionPayload::Number {
                correct_answer: 110.0,
                tolerance: 10.0,
            },
        ),
    ]
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    let org = args.organization;

    storage
        .catalog
        .upsert_course(&Course {
            id: CourseId::new(1),
            organization: org,
            name: "First Aid".into(),
            description: "Demo course".into(),
        })
        .await?;
    storage
        .catalog
        .upsert_module(&Module {
            id: ModuleId::new(1),
            organization: org,
            course: CourseId::new(1),
            name: "Emergency Basics".into(),
            description: String::new(),
        })
        .await?;
    storage
        .catalog
        .upsert_lesson(&Lesson {
            id: LessonId::new(1),
            organization: org,
            module: ModuleId::new(1),
            name: "Responding to an incident".into(),
            description: String::new(),
        })
        .await?;
    storage
        .catalog
        .upsert_topic(&Topic {
            id: TopicId::new(1),
            organization: org,
            lesson: LessonId::new(1),
            name: "CPR".into(),
            description: String::new(),
        })
        .await?;
    storage
        .catalog
        .upsert_topic(&Topic {
            id: TopicId::new(2),
            organization: org,
            lesson: LessonId::new(1),
            name: "Recovery position".into(),
            description: String::new(),
        })
        .await?;

    let quiz = QuizId::new(1);
    let questions = demo_questions(org, TopicId::new(1), quiz);
    for question in &questions {
        storage.questions.upsert_question(question).await?;
    }

    let group = StudentGroup {
        id: StudentGroupId::new(1),
        organization: org,
        course: CourseId::new(1),
        name: "Demo cohort".into(),
        year: 2026,
        modules: vec![ModuleId::new(1)],
    };
    storage.groups.upsert_group(&group).await?;

    let names = [
        ("Ada", "Boer"),
        ("Jan", "Visser"),
        ("Noor", "Smit"),
        ("Pim", "Bakker"),
        ("Sara", "Mulder"),
    ];
    for i in 0..args.students {
        let (first, last) = names[(i as usize) % names.len()];
        storage
            .groups
            .upsert_student(&Student {
                id: StudentId::new(u64::from(i + 1)),
                organization: org,
                first_name: first.into(),
                last_name: last.into(),
                email: format!("{}.{}@example.org", first, last).to_lowercase(),
                groups: vec![group.id],
            })
            .await?;
    }

    // First student answers the multiple-choice and number questions.
    if args.students > 0 {
        let student = StudentId::new(1);
        storage
            .answers
            .upsert_answer(&AnswerRecord {
                organization: org,
                student,
                question: questions[0].reference(),
                quiz,
                selected_option: Some(OptionId::new(1)),
                answer_data: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        storage
            .answers
            .upsert_answer(&AnswerRecord {
                organization: org,
                student,
                question: questions[3].reference(),
                quiz,
                selected_option: None,
                answer_data: Some(json!(105)),
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    println!(
        "Seeded organization {} with {} questions, 1 group and {} students into {}",
        org.value(),
        questions.len(),
        args.students,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
