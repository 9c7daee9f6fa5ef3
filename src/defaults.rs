use serde::Serialize;

use crate::store::{Assistant, Contract, Exam, Question};

pub const EXAM_TYPE: &str = "regular";
pub const EXAM_SOURCE: &str = "internal";
pub const PASS_SCORE: f64 = 60.0;
pub const QUESTION_KIND: &str = "choice";
pub const QUESTION_CHOICES: u32 = 5;
pub const ASSISTANT_ROLE: &str = "assistant";

/// Exam with every optional field resolved to its display value. All
/// read paths go through this so the fallbacks live in one place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamView {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub exam_type: String,
    pub source: String,
    pub pass_score: f64,
    pub date: Option<String>,
    pub status: String,
    pub total_questions: usize,
    pub total_points: f64,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub number: u32,
    pub label: String,
    pub kind: String,
    pub points: f64,
    pub answer: String,
    pub choices: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractView {
    pub status: String,
    pub hourly_rate: f64,
    pub weekly_hours: i64,
    pub started_on: Option<String>,
    pub ended_on: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantView {
    pub id: String,
    pub name: String,
    pub role: String,
    pub subjects: Vec<String>,
    pub class_ids: Vec<String>,
    pub contract: ContractView,
}

pub fn exam_pass_score(exam: &Exam) -> f64 {
    exam.pass_score.unwrap_or(PASS_SCORE)
}

pub fn question_label(question: &Question) -> String {
    question
        .label
        .clone()
        .unwrap_or_else(|| format!("Q{}", question.number))
}

pub fn question_choices(question: &Question) -> u32 {
    question.choices.unwrap_or(QUESTION_CHOICES)
}

/// Fixed label alphabet for a choice question: "1" through the choice
/// count. Distribution tallies only ever bucket into these.
pub fn choice_labels(question: &Question) -> Vec<String> {
    (1..=question_choices(question))
        .map(|n| n.to_string())
        .collect()
}

pub fn resolve_question(question: &Question) -> QuestionView {
    QuestionView {
        number: question.number,
        label: question_label(question),
        kind: question
            .kind
            .clone()
            .unwrap_or_else(|| QUESTION_KIND.to_string()),
        points: question.points,
        answer: question.answer.clone(),
        choices: question_choices(question),
    }
}

pub fn resolve_exam(exam: &Exam) -> ExamView {
    ExamView {
        id: exam.id.clone(),
        class_id: exam.class_id.clone(),
        title: exam.title.clone(),
        exam_type: exam
            .exam_type
            .clone()
            .unwrap_or_else(|| EXAM_TYPE.to_string()),
        source: exam
            .source
            .clone()
            .unwrap_or_else(|| EXAM_SOURCE.to_string()),
        pass_score: exam_pass_score(exam),
        date: exam.date.clone(),
        status: exam.status.as_str().to_string(),
        total_questions: exam.questions.len(),
        total_points: exam.questions.iter().map(|q| q.points).sum(),
        questions: exam.questions.iter().map(resolve_question).collect(),
    }
}

/// An unsigned contract still renders: zeroed figures, "unsigned" status.
pub fn resolve_contract(contract: Option<&Contract>) -> ContractView {
    match contract {
        None => ContractView {
            status: "unsigned".to_string(),
            hourly_rate: 0.0,
            weekly_hours: 0,
            started_on: None,
            ended_on: None,
        },
        Some(c) => ContractView {
            status: if c.ended_on.is_some() {
                "ended".to_string()
            } else {
                "active".to_string()
            },
            hourly_rate: c.hourly_rate.unwrap_or(0.0),
            weekly_hours: c.weekly_hours.unwrap_or(0),
            started_on: c.started_on.clone(),
            ended_on: c.ended_on.clone(),
        },
    }
}

pub fn resolve_assistant(assistant: &Assistant) -> AssistantView {
    AssistantView {
        id: assistant.id.clone(),
        name: assistant.name.clone(),
        role: assistant
            .role
            .clone()
            .unwrap_or_else(|| ASSISTANT_ROLE.to_string()),
        subjects: assistant.subjects.clone().unwrap_or_default(),
        class_ids: assistant.class_ids.clone(),
        contract: resolve_contract(assistant.contract.as_ref()),
    }
}
