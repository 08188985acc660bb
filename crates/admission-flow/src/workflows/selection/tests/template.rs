use crate::workflows::selection::template::{
    AnswerProblem, AnswerSet, AnswerValue, FormTemplate, Question, QuestionKind,
};

use super::common;

fn template() -> FormTemplate {
    FormTemplate {
        id: crate::workflows::selection::domain::TemplateId(1),
        unit: crate::workflows::selection::domain::UnitId(1),
        stage: crate::workflows::selection::domain::Stage::Questionnaire,
        version: 1,
        is_active: true,
        questions: vec![
            Question {
                id: "motivation".to_string(),
                text: "Why?".to_string(),
                kind: QuestionKind::Text,
                required: true,
                order: 2,
                options: vec![],
                max_length: Some(10),
                min_value: None,
                max_value: None,
            },
            Question {
                id: "age".to_string(),
                text: "Age".to_string(),
                kind: QuestionKind::Number,
                required: false,
                order: 1,
                options: vec![],
                max_length: None,
                min_value: Some(16),
                max_value: Some(30),
            },
            Question {
                id: "track".to_string(),
                text: "Track".to_string(),
                kind: QuestionKind::SingleChoice,
                required: false,
                order: 3,
                options: vec!["design".to_string(), "media".to_string()],
                max_length: None,
                min_value: None,
                max_value: None,
            },
        ],
    }
}

#[test]
fn questions_come_back_in_display_order() {
    let ordered: Vec<_> = template()
        .questions_in_order()
        .into_iter()
        .map(|question| question.id.clone())
        .collect();
    assert_eq!(ordered, vec!["age", "motivation", "track"]);
}

#[test]
fn complete_answers_validate() {
    let store = common::MemoryStore::default();
    let template =
        common::questionnaire_template(&store, crate::workflows::selection::domain::UnitId(1));
    assert!(template.validate(&common::complete_answers()).is_ok());
}

#[test]
fn missing_required_answer_is_reported() {
    let issues = template().validate(&AnswerSet::new()).unwrap_err();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].question_id, "motivation");
    assert_eq!(issues[0].problem, AnswerProblem::MissingRequired);
}

#[test]
fn whitespace_only_required_answer_counts_as_missing() {
    let mut answers = AnswerSet::new();
    answers.insert("motivation".to_string(), AnswerValue::Text("   ".to_string()));
    let issues = template().validate(&answers).unwrap_err();
    assert_eq!(issues[0].problem, AnswerProblem::MissingRequired);
}

#[test]
fn wrong_answer_kind_is_reported() {
    let mut answers = AnswerSet::new();
    answers.insert("motivation".to_string(), AnswerValue::Number(5));
    let issues = template().validate(&answers).unwrap_err();
    assert_eq!(
        issues[0].problem,
        AnswerProblem::WrongKind {
            expected: QuestionKind::Text
        }
    );
}

#[test]
fn text_over_max_length_is_reported() {
    let mut answers = AnswerSet::new();
    answers.insert(
        "motivation".to_string(),
        AnswerValue::Text("much too long an answer".to_string()),
    );
    let issues = template().validate(&answers).unwrap_err();
    assert_eq!(issues[0].problem, AnswerProblem::TooLong { max: 10 });
}

#[test]
fn number_outside_bounds_is_reported() {
    let mut answers = AnswerSet::new();
    answers.insert("motivation".to_string(), AnswerValue::Text("ok".to_string()));
    answers.insert("age".to_string(), AnswerValue::Number(42));
    let issues = template().validate(&answers).unwrap_err();
    assert_eq!(issues[0].question_id, "age");
    assert_eq!(issues[0].problem, AnswerProblem::OutOfRange);
}

#[test]
fn choice_outside_option_set_is_reported() {
    let mut answers = AnswerSet::new();
    answers.insert("motivation".to_string(), AnswerValue::Text("ok".to_string()));
    answers.insert(
        "track".to_string(),
        AnswerValue::Choice("sound".to_string()),
    );
    let issues = template().validate(&answers).unwrap_err();
    assert_eq!(
        issues[0].problem,
        AnswerProblem::UnknownOption {
            value: "sound".to_string()
        }
    );
}

#[test]
fn answers_to_unknown_questions_are_reported() {
    let mut answers = AnswerSet::new();
    answers.insert("motivation".to_string(), AnswerValue::Text("ok".to_string()));
    answers.insert("color".to_string(), AnswerValue::Text("blue".to_string()));
    let issues = template().validate(&answers).unwrap_err();
    assert!(issues
        .iter()
        .any(|issue| issue.question_id == "color"
            && issue.problem == AnswerProblem::UnknownQuestion));
}
