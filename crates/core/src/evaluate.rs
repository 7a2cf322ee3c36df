//! Variant-specific answer correctness rules.
//!
//! `is_correct` is total over well-formed records: a missing, malformed, or
//! mismatched payload is "not correct", never an error. Historical answer
//! rows must stay meaningful after content edits, so nothing here panics or
//! returns `Result`.

use serde_json::Value;

use crate::model::{AnswerRecord, OptionId, Question, QuestionPayload};

/// Returns whether the recorded answer is correct for the given question.
///
/// The question must be the one the answer references; a variant or id
/// mismatch yields `false`, matching the treatment of unresolvable
/// references.
#[must_use]
pub fn is_correct(answer: &AnswerRecord, question: &Question) -> bool {
    if answer.question != question.reference() {
        return false;
    }

    match &question.payload {
        QuestionPayload::MultipleChoice { .. } => answer
            .selected_option
            .and_then(|id| question.choice_option(id))
            .is_some_and(|option| option.is_correct),

        QuestionPayload::Order { .. } => {
            let Some(submitted) = answer.answer_data.as_ref().and_then(submitted_order) else {
                return false;
            };
            submitted == question.correct_order_ids()
        }

        QuestionPayload::Connect { .. } => {
            let Some(data) = answer.answer_data.as_ref() else {
                return false;
            };
            let Some(entries) = data.as_array() else {
                return false;
            };
            // Entries that are not a 2-element id pair are dropped rather
            // than failing the submission; the remaining set must match the
            // correct pairs exactly.
            let submitted: std::collections::HashSet<(OptionId, OptionId)> = entries
                .iter()
                .filter_map(submitted_pair)
                .collect();
            submitted == question.correct_pairs()
        }

        QuestionPayload::Number {
            correct_answer,
            tolerance,
        } => {
            let Some(submitted) = answer.answer_data.as_ref().and_then(submitted_number) else {
                return false;
            };
            (submitted - correct_answer).abs() <= *tolerance
        }
    }
}

fn submitted_order(data: &Value) -> Option<Vec<OptionId>> {
    data.as_array()?
        .iter()
        .map(|entry| entry.as_u64().map(OptionId::new))
        .collect()
}

fn submitted_pair(entry: &Value) -> Option<(OptionId, OptionId)> {
    let pair = entry.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let from = OptionId::new(pair[0].as_u64()?);
    let to = OptionId::new(pair[1].as_u64()?);
    Some(if from <= to { (from, to) } else { (to, from) })
}

fn submitted_number(data: &Value) -> Option<f64> {
    let value = match data {
        Value::Number(n) => n.as_f64()?,
        // Legacy clients stored numbers as JSON strings.
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
