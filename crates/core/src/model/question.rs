use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ids::{LearningObjectiveId, OptionId, OrganizationId, QuestionId, QuizId, TopicId};

/// The four question kinds supported by the platform.
///
/// Stored and transmitted as a stable string tag. Each variant owns its own
/// question id space, so `(variant, id)` is the only complete question
/// identity; see [`QuestionRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionVariant {
    MultipleChoice,
    Order,
    Connect,
    Number,
}

impl QuestionVariant {
    pub const ALL: [QuestionVariant; 4] = [
        QuestionVariant::MultipleChoice,
        QuestionVariant::Order,
        QuestionVariant::Connect,
        QuestionVariant::Number,
    ];

    /// Stable tag used in storage and wire payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionVariant::MultipleChoice => "multiple_choice",
            QuestionVariant::Order => "order",
            QuestionVariant::Connect => "connect",
            QuestionVariant::Number => "number",
        }
    }

    /// Parses a stored tag. Unknown tags yield `None` rather than an error so
    /// legacy rows with a corrupted tag degrade to "unanswerable" instead of
    /// failing whole aggregations.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "multiple_choice" => Some(QuestionVariant::MultipleChoice),
            "order" => Some(QuestionVariant::Order),
            "connect" => Some(QuestionVariant::Connect),
            "number" => Some(QuestionVariant::Number),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polymorphic question identity: variant tag plus per-variant numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionRef {
    pub variant: QuestionVariant,
    pub id: QuestionId,
}

impl QuestionRef {
    #[must_use]
    pub fn new(variant: QuestionVariant, id: QuestionId) -> Self {
        Self { variant, id }
    }
}

impl fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.variant, self.id)
    }
}

/// An answer choice for a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

/// An item to be placed in sequence for an order question.
/// `correct_order` is the 1-based target position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOption {
    pub id: OptionId,
    pub text: String,
    pub correct_order: u32,
}

/// A positioned endpoint for a connect question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOption {
    pub id: OptionId,
    pub text: String,
    pub position_x: f64,
    pub position_y: f64,
}

/// A correct connection between two connect options. Stored as an ordered
/// pair but compared as unordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: OptionId,
    pub to: OptionId,
}

impl Connection {
    /// Normalizes the pair to (min, max) so direction never matters.
    #[must_use]
    pub fn normalized(self) -> (OptionId, OptionId) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}

/// Variant-specific question payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum QuestionPayload {
    MultipleChoice {
        options: Vec<ChoiceOption>,
    },
    Order {
        options: Vec<OrderOption>,
    },
    Connect {
        options: Vec<ConnectOption>,
        connections: Vec<Connection>,
    },
    Number {
        correct_answer: f64,
        tolerance: f64,
    },
}

impl QuestionPayload {
    #[must_use]
    pub fn variant(&self) -> QuestionVariant {
        match self {
            QuestionPayload::MultipleChoice { .. } => QuestionVariant::MultipleChoice,
            QuestionPayload::Order { .. } => QuestionVariant::Order,
            QuestionPayload::Connect { .. } => QuestionVariant::Connect,
            QuestionPayload::Number { .. } => QuestionVariant::Number,
        }
    }
}

/// A question of any variant: common fields plus the variant payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub organization: OrganizationId,
    pub topic: TopicId,
    pub quiz: Option<QuizId>,
    pub text: String,
    pub order: u32,
    pub learning_objectives: Vec<LearningObjectiveId>,
    pub payload: QuestionPayload,
}

impl Question {
    /// The variant tag, derived from the payload (never stored separately).
    #[must_use]
    pub fn variant(&self) -> QuestionVariant {
        self.payload.variant()
    }

    /// The polymorphic identity of this question.
    #[must_use]
    pub fn reference(&self) -> QuestionRef {
        QuestionRef::new(self.variant(), self.id)
    }

    /// Looks up a choice option by id. `None` for non-multiple-choice
    /// questions or unknown ids.
    #[must_use]
    pub fn choice_option(&self, id: OptionId) -> Option<&ChoiceOption> {
        match &self.payload {
            QuestionPayload::MultipleChoice { options } => options.iter().find(|o| o.id == id),
            _ => None,
        }
    }

    /// Option ids in the expected sequence for an order question, sorted
    /// ascending by `correct_order` with option id as tie-break.
    ///
    /// Empty for other variants.
    #[must_use]
    pub fn correct_order_ids(&self) -> Vec<OptionId> {
        match &self.payload {
            QuestionPayload::Order { options } => {
                let mut sorted: Vec<&OrderOption> = options.iter().collect();
                sorted.sort_by_key(|o| (o.correct_order, o.id));
                sorted.iter().map(|o| o.id).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The set of correct connections as normalized (min, max) pairs.
    ///
    /// Empty for other variants.
    #[must_use]
    pub fn correct_pairs(&self) -> HashSet<(OptionId, OptionId)> {
        match &self.payload {
            QuestionPayload::Connect { connections, .. } => {
                connections.iter().map(|c| c.normalized()).collect()
            }
            _ => HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_tags_roundtrip() {
        for variant in QuestionVariant::ALL {
            assert_eq!(QuestionVariant::parse(variant.as_str()), Some(variant));
        }
    }

    #[test]
    fn unknown_variant_tag_parses_to_none() {
        assert_eq!(QuestionVariant::parse("essay"), None);
        assert_eq!(QuestionVariant::parse(""), None);
    }

    #[test]
    fn connection_normalizes_direction() {
        let forward = Connection {
            from: OptionId::new(1),
            to: OptionId::new(2),
        };
        let backward = Connection {
            from: OptionId::new(2),
            to: OptionId::new(1),
        };
        assert_eq!(forward.normalized(), backward.normalized());
    }

    #[test]
    fn correct_order_sorts_by_target_position() {
        let question = Question {
            id: QuestionId::new(1),
            organization: OrganizationId::new(1),
            topic: TopicId::new(1),
            quiz: None,
            text: "Arrange".into(),
            order: 0,
            learning_objectives: Vec::new(),
            payload: QuestionPayload::Order {
                options: vec![
                    OrderOption {
                        id: OptionId::new(30),
                        text: "third".into(),
                        correct_order: 3,
                    },
                    OrderOption {
                        id: OptionId::new(10),
                        text: "first".into(),
                        correct_order: 1,
                    },
                    OrderOption {
                        id: OptionId::new(20),
                        text: "second".into(),
                        correct_order: 2,
                    },
                ],
            },
        };

        assert_eq!(
            question.correct_order_ids(),
            vec![OptionId::new(10), OptionId::new(20), OptionId::new(30)]
        );
    }

    #[test]
    fn reference_carries_variant_and_id() {
        let question = Question {
            id: QuestionId::new(9),
            organization: OrganizationId::new(1),
            topic: TopicId::new(1),
            quiz: None,
            text: "Pi?".into(),
            order: 0,
            learning_objectives: Vec::new(),
            payload: QuestionPayload::Number {
                correct_answer: 3.14,
                tolerance: 0.01,
            },
        };

        let reference = question.reference();
        assert_eq!(reference.variant, QuestionVariant::Number);
        assert_eq!(reference.id, QuestionId::new(9));
        assert_eq!(reference.to_string(), "number:9");
    }
}
