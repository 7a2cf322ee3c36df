//! Pure aggregation folds behind the progress services.
//!
//! Services batch-fetch questions and answers once, build a
//! [`QuestionIndex`], and fold here; nothing in this module touches storage.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::evaluate;
use crate::model::{AnswerRecord, Question, QuestionRef, StudentId, TopicId};

/// Batched lookup from polymorphic question reference to the question and
/// its owning topic. Built once per computation from all fetched variants.
#[derive(Debug, Clone, Default)]
pub struct QuestionIndex {
    by_ref: HashMap<QuestionRef, Question>,
}

impl QuestionIndex {
    #[must_use]
    pub fn from_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let by_ref = questions
            .into_iter()
            .map(|question| (question.reference(), question))
            .collect();
        Self { by_ref }
    }

    #[must_use]
    pub fn get(&self, reference: QuestionRef) -> Option<&Question> {
        self.by_ref.get(&reference)
    }

    /// All known references, in a deterministic order suitable for batched
    /// answer queries.
    #[must_use]
    pub fn refs(&self) -> Vec<QuestionRef> {
        let mut refs: Vec<QuestionRef> = self.by_ref.keys().copied().collect();
        refs.sort();
        refs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }

    /// Question counts per topic across all variants.
    #[must_use]
    pub fn totals_by_topic(&self) -> HashMap<TopicId, u32> {
        let mut totals = HashMap::new();
        for question in self.by_ref.values() {
            *totals.entry(question.topic).or_insert(0) += 1;
        }
        totals
    }
}

/// Per-topic answered/correct/total counts and percentage for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub topic: TopicId,
    pub questions_answered: u32,
    pub questions_correct: u32,
    pub total_questions: u32,
    pub percentage: f64,
}

/// Ratio as a percentage rounded to two decimals; 0 when the denominator is
/// 0, never NaN.
#[must_use]
pub fn percentage(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let raw = f64::from(numerator) / f64::from(denominator) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Folds one student's answers into per-topic progress.
///
/// Topics come back in caller order. Counts are per distinct question, not
/// per answer row: a question answered in two quizzes is one answered
/// question, correct if any of its answers is correct. Answers whose
/// reference is not in the index (deleted questions, corrupted tags) are
/// skipped entirely.
#[must_use]
pub fn topic_progress(
    topics: &[TopicId],
    index: &QuestionIndex,
    answers: &[AnswerRecord],
) -> Vec<TopicProgress> {
    let mut answered: HashSet<QuestionRef> = HashSet::new();
    let mut correct: HashSet<QuestionRef> = HashSet::new();

    for answer in answers {
        let Some(question) = index.get(answer.question) else {
            continue;
        };
        answered.insert(answer.question);
        if evaluate::is_correct(answer, question) {
            correct.insert(answer.question);
        }
    }

    let mut answered_by_topic: HashMap<TopicId, u32> = HashMap::new();
    for reference in &answered {
        if let Some(question) = index.get(*reference) {
            *answered_by_topic.entry(question.topic).or_insert(0) += 1;
        }
    }
    let mut correct_by_topic: HashMap<TopicId, u32> = HashMap::new();
    for reference in &correct {
        if let Some(question) = index.get(*reference) {
            *correct_by_topic.entry(question.topic).or_insert(0) += 1;
        }
    }
    let totals = index.totals_by_topic();

    topics
        .iter()
        .map(|&topic| {
            let questions_answered = answered_by_topic.get(&topic).copied().unwrap_or(0);
            let questions_correct = correct_by_topic.get(&topic).copied().unwrap_or(0);
            TopicProgress {
                topic,
                questions_answered,
                questions_correct,
                total_questions: totals.get(&topic).copied().unwrap_or(0),
                percentage: percentage(questions_correct, questions_answered),
            }
        })
        .collect()
}

/// Folds a batch of answers (possibly spanning many students) into each
/// student's set of mastered topics.
///
/// A topic is mastered once the student has at least one correct answer to
/// any question belonging to it.
#[must_use]
pub fn mastered_topics_by_student(
    index: &QuestionIndex,
    answers: &[AnswerRecord],
) -> HashMap<StudentId, HashSet<TopicId>> {
    let mut mastered: HashMap<StudentId, HashSet<TopicId>> = HashMap::new();
    for answer in answers {
        let Some(question) = index.get(answer.question) else {
            continue;
        };
        if evaluate::is_correct(answer, question) {
            mastered
                .entry(answer.student)
                .or_default()
                .insert(question.topic);
        }
    }
    mastered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ChoiceOption, OptionId, OrganizationId, QuestionId, QuestionPayload, QuizId,
    };
    use crate::time::fixed_now;

    fn mc_question(id: u64, topic: u64, correct_option: u64, wrong_option: u64) -> Question {
        Question {
            id: QuestionId::new(id),
            organization: OrganizationId::new(1),
            topic: TopicId::new(topic),
            quiz: Some(QuizId::new(1)),
            text: format!("Q{id}"),
            order: 0,
            learning_objectives: Vec::new(),
            payload: QuestionPayload::MultipleChoice {
                options: vec![
                    ChoiceOption {
                        id: OptionId::new(correct_option),
                        text: "right".into(),
                        is_correct: true,
                    },
                    ChoiceOption {
                        id: OptionId::new(wrong_option),
                        text: "wrong".into(),
                        is_correct: false,
                    },
                ],
            },
        }
    }

    fn answer(student: u64, question: &Question, option: u64, quiz: u64) -> AnswerRecord {
        AnswerRecord {
            organization: OrganizationId::new(1),
            student: StudentId::new(student),
            question: question.reference(),
            quiz: QuizId::new(quiz),
            selected_option: Some(OptionId::new(option)),
            answer_data: None,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn percentage_is_zero_safe_and_bounded() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 2), 50.0);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn one_correct_of_two_answered_is_fifty_percent() {
        let q1 = mc_question(1, 1, 1, 2);
        let q2 = mc_question(2, 1, 3, 4);
        let index = QuestionIndex::from_questions([q1.clone(), q2.clone()]);

        let answers = vec![answer(1, &q1, 1, 1), answer(1, &q2, 4, 1)];
        let progress = topic_progress(&[TopicId::new(1)], &index, &answers);

        assert_eq!(progress.len(), 1);
        let topic = &progress[0];
        assert_eq!(topic.questions_answered, 2);
        assert_eq!(topic.questions_correct, 1);
        assert_eq!(topic.total_questions, 2);
        assert_eq!(topic.percentage, 50.0);
    }

    #[test]
    fn unattempted_topic_reports_zero_percent() {
        let q1 = mc_question(1, 1, 1, 2);
        let index = QuestionIndex::from_questions([q1]);

        let progress = topic_progress(&[TopicId::new(1)], &index, &[]);
        assert_eq!(progress[0].questions_answered, 0);
        assert_eq!(progress[0].total_questions, 1);
        assert_eq!(progress[0].percentage, 0.0);
    }

    #[test]
    fn topics_keep_caller_order() {
        let q1 = mc_question(1, 2, 1, 2);
        let index = QuestionIndex::from_questions([q1]);

        let order = [TopicId::new(3), TopicId::new(2), TopicId::new(1)];
        let progress = topic_progress(&order, &index, &[]);
        let topics: Vec<TopicId> = progress.iter().map(|p| p.topic).collect();
        assert_eq!(topics, order);
    }

    #[test]
    fn answered_counts_distinct_questions_not_rows() {
        let q1 = mc_question(1, 1, 1, 2);
        let index = QuestionIndex::from_questions([q1.clone()]);

        // Same question answered in two different quizzes.
        let answers = vec![answer(1, &q1, 2, 1), answer(1, &q1, 1, 2)];
        let progress = topic_progress(&[TopicId::new(1)], &index, &answers);

        assert_eq!(progress[0].questions_answered, 1);
        assert_eq!(progress[0].questions_correct, 1);
    }

    #[test]
    fn orphaned_answers_are_skipped_without_error() {
        let q1 = mc_question(1, 1, 1, 2);
        let deleted = mc_question(99, 1, 5, 6);
        let index = QuestionIndex::from_questions([q1.clone()]);

        let answers = vec![answer(1, &q1, 1, 1), answer(1, &deleted, 5, 1)];
        let progress = topic_progress(&[TopicId::new(1)], &index, &answers);

        assert_eq!(progress[0].questions_answered, 1);
        assert_eq!(progress[0].questions_correct, 1);
        assert_eq!(progress[0].total_questions, 1);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let q1 = mc_question(1, 1, 1, 2);
        let q2 = mc_question(2, 2, 3, 4);
        let index = QuestionIndex::from_questions([q1.clone(), q2]);
        let answers = vec![answer(1, &q1, 1, 1)];
        let topics = [TopicId::new(1), TopicId::new(2)];

        let first = topic_progress(&topics, &index, &answers);
        let second = topic_progress(&topics, &index, &answers);
        assert_eq!(first, second);
    }

    #[test]
    fn mastery_requires_a_single_correct_answer_per_topic() {
        let q1 = mc_question(1, 1, 1, 2);
        let q2 = mc_question(2, 2, 3, 4);
        let q3 = mc_question(3, 3, 5, 6);
        let index = QuestionIndex::from_questions([q1.clone(), q2.clone(), q3.clone()]);

        // Correct in topics 1 and 2, wrong in topic 3.
        let answers = vec![
            answer(1, &q1, 1, 1),
            answer(1, &q2, 3, 1),
            answer(1, &q3, 6, 1),
        ];
        let mastered = mastered_topics_by_student(&index, &answers);

        let topics = mastered.get(&StudentId::new(1)).unwrap();
        assert_eq!(topics.len(), 2);
        assert!(topics.contains(&TopicId::new(1)));
        assert!(topics.contains(&TopicId::new(2)));
        assert_eq!(percentage(topics.len() as u32, 3), 66.67);
    }

    #[test]
    fn mastery_is_monotonic_in_correct_answers() {
        let q1 = mc_question(1, 1, 1, 2);
        let q2 = mc_question(2, 2, 3, 4);
        let index = QuestionIndex::from_questions([q1.clone(), q2.clone()]);

        let mut answers = vec![answer(1, &q1, 1, 1)];
        let before = mastered_topics_by_student(&index, &answers)
            .remove(&StudentId::new(1))
            .unwrap_or_default();

        answers.push(answer(1, &q2, 3, 1));
        let after = mastered_topics_by_student(&index, &answers)
            .remove(&StudentId::new(1))
            .unwrap_or_default();

        assert!(after.is_superset(&before));
        assert!(after.len() >= before.len());
    }

    #[test]
    fn mastery_groups_answers_by_student() {
        let q1 = mc_question(1, 1, 1, 2);
        let index = QuestionIndex::from_questions([q1.clone()]);

        let answers = vec![answer(1, &q1, 1, 1), answer(2, &q1, 2, 1)];
        let mastered = mastered_topics_by_student(&index, &answers);

        assert!(mastered.contains_key(&StudentId::new(1)));
        // Student 2 answered wrong; no mastered set at all.
        assert!(!mastered.contains_key(&StudentId::new(2)));
    }
}
