use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Stage, TemplateId, UnitId};

/// Ordered map from question id to the applicant's tagged answer.
pub type AnswerSet = BTreeMap<String, AnswerValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Number,
    SingleChoice,
    MultiChoice,
}

impl QuestionKind {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::Number => "number",
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultiChoice => "multi_choice",
        }
    }
}

/// One entry of a stage's question schema. Treated as data by the core;
/// only required-field and option-membership rules are interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    pub required: bool,
    pub order: u32,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min_value: Option<i64>,
    #[serde(default)]
    pub max_value: Option<i64>,
}

/// Tagged answer value so the core never needs runtime type inspection
/// of an opaque blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Number(i64),
    Choice(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Number(_) => false,
            AnswerValue::Choice(choice) => choice.trim().is_empty(),
            AnswerValue::Choices(choices) => choices.is_empty(),
        }
    }
}

/// Versioned question schema for one (unit, stage). Exactly one version
/// is active at a time; submissions must reference the active one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub id: TemplateId,
    pub unit: UnitId,
    pub stage: Stage,
    pub version: u32,
    pub is_active: bool,
    pub questions: Vec<Question>,
}

/// Why a single answer failed submit-time validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerProblem {
    MissingRequired,
    WrongKind { expected: QuestionKind },
    UnknownQuestion,
    UnknownOption { value: String },
    TooLong { max: usize },
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerIssue {
    pub question_id: String,
    pub problem: AnswerProblem,
}

impl FormTemplate {
    /// Questions sorted by their declared display order.
    pub fn questions_in_order(&self) -> Vec<&Question> {
        let mut ordered: Vec<&Question> = self.questions.iter().collect();
        ordered.sort_by_key(|question| question.order);
        ordered
    }

    /// Full submit-time validation: required answers present and
    /// non-empty, kinds matching the declared question type, choice
    /// values restricted to the declared option set, bounds honored.
    /// Drafts never go through this; partial answer sets are expected
    /// there.
    pub fn validate(&self, answers: &AnswerSet) -> Result<(), Vec<AnswerIssue>> {
        let mut issues = Vec::new();

        for question in &self.questions {
            match answers.get(&question.id) {
                None => {
                    if question.required {
                        issues.push(AnswerIssue {
                            question_id: question.id.clone(),
                            problem: AnswerProblem::MissingRequired,
                        });
                    }
                }
                Some(answer) if question.required && answer.is_empty() => {
                    issues.push(AnswerIssue {
                        question_id: question.id.clone(),
                        problem: AnswerProblem::MissingRequired,
                    });
                }
                Some(answer) => {
                    if let Some(problem) = check_answer(question, answer) {
                        issues.push(AnswerIssue {
                            question_id: question.id.clone(),
                            problem,
                        });
                    }
                }
            }
        }

        for question_id in answers.keys() {
            if !self.questions.iter().any(|q| &q.id == question_id) {
                issues.push(AnswerIssue {
                    question_id: question_id.clone(),
                    problem: AnswerProblem::UnknownQuestion,
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn check_answer(question: &Question, answer: &AnswerValue) -> Option<AnswerProblem> {
    match (question.kind, answer) {
        (QuestionKind::Text, AnswerValue::Text(text)) => {
            if let Some(max) = question.max_length {
                if text.chars().count() > max {
                    return Some(AnswerProblem::TooLong { max });
                }
            }
            None
        }
        (QuestionKind::Number, AnswerValue::Number(value)) => {
            let below = question.min_value.is_some_and(|min| *value < min);
            let above = question.max_value.is_some_and(|max| *value > max);
            if below || above {
                return Some(AnswerProblem::OutOfRange);
            }
            None
        }
        (QuestionKind::SingleChoice, AnswerValue::Choice(choice)) => {
            if !question.options.contains(choice) {
                return Some(AnswerProblem::UnknownOption {
                    value: choice.clone(),
                });
            }
            None
        }
        (QuestionKind::MultiChoice, AnswerValue::Choices(choices)) => choices
            .iter()
            .find(|choice| !question.options.contains(*choice))
            .map(|choice| AnswerProblem::UnknownOption {
                value: choice.clone(),
            }),
        _ => Some(AnswerProblem::WrongKind {
            expected: question.kind,
        }),
    }
}
