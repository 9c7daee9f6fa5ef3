use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::flow::InquiryStatus;

/// A student's submitted choices, keyed by question number.
/// Sparse: unanswered questions have no entry.
pub type AnswerMap = BTreeMap<u32, String>;

#[derive(Debug, Clone)]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub school: Option<String>,
    pub grade_label: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub number: u32,
    pub label: Option<String>,
    pub kind: Option<String>,
    pub points: f64,
    pub answer: String,
    pub choices: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamStatus {
    Drafted,
    Graded,
}

impl ExamStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "drafted" => Some(Self::Drafted),
            "graded" => Some(Self::Graded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drafted => "drafted",
            Self::Graded => "graded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Exam {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub exam_type: Option<String>,
    pub source: Option<String>,
    pub pass_score: Option<f64>,
    pub date: Option<String>,
    pub status: ExamStatus,
    pub questions: Vec<Question>,
}

/// Grading record for one (exam, student) pair. The score is always the
/// calculator's sum over `answers`; every writer recomputes it before
/// storing.
#[derive(Debug, Clone, Serialize)]
pub struct ExamResult {
    pub answers: AnswerMap,
    pub score: f64,
    pub locked: bool,
}

#[derive(Debug, Clone)]
pub struct InquiryMessage {
    pub author: String,
    pub staff: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Inquiry {
    pub id: String,
    pub class_id: Option<String>,
    pub student_id: Option<String>,
    pub title: String,
    pub status: InquiryStatus,
    pub messages: Vec<InquiryMessage>,
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub hourly_rate: Option<f64>,
    pub weekly_hours: Option<i64>,
    pub started_on: Option<String>,
    pub ended_on: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Assistant {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub contract: Option<Contract>,
    pub class_ids: Vec<String>,
}

/// A report-card send in flight. Its user-visible state is derived from
/// `queued_at`/`deliver_after_ms` and the clock, never stored.
#[derive(Debug, Clone)]
pub struct CardDelivery {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub queued_at: DateTime<Utc>,
    pub deliver_after_ms: i64,
}

#[derive(Debug, Default)]
pub struct ClassStore {
    items: Vec<ClassGroup>,
}

impl ClassStore {
    pub fn insert(&mut self, class: ClassGroup) {
        self.items.push(class);
    }

    pub fn list(&self) -> &[ClassGroup] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&ClassGroup> {
        self.items.iter().find(|c| c.id == id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|c| c.id != id);
        self.items.len() != before
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Default)]
pub struct StudentStore {
    items: Vec<Student>,
}

impl StudentStore {
    pub fn insert(&mut self, student: Student) {
        self.items.push(student);
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.items.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Student> {
        self.items.iter_mut().find(|s| s.id == id)
    }

    /// Roster of one class in display order.
    pub fn roster(&self, class_id: &str) -> Vec<&Student> {
        let mut rows: Vec<&Student> = self
            .items
            .iter()
            .filter(|s| s.class_id == class_id)
            .collect();
        rows.sort_by_key(|s| s.sort_order);
        rows
    }

    pub fn next_sort_order(&self, class_id: &str) -> i64 {
        self.items
            .iter()
            .filter(|s| s.class_id == class_id)
            .map(|s| s.sort_order)
            .max()
            .map(|n| n + 1)
            .unwrap_or(0)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|s| s.id != id);
        self.items.len() != before
    }

    pub fn remove_class(&mut self, class_id: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .items
            .iter()
            .filter(|s| s.class_id == class_id)
            .map(|s| s.id.clone())
            .collect();
        self.items.retain(|s| s.class_id != class_id);
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Default)]
pub struct ExamStore {
    items: Vec<Exam>,
}

impl ExamStore {
    pub fn insert(&mut self, exam: Exam) {
        self.items.push(exam);
    }

    pub fn get(&self, id: &str) -> Option<&Exam> {
        self.items.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Exam> {
        self.items.iter_mut().find(|e| e.id == id)
    }

    pub fn list(&self, class_id: Option<&str>, status: Option<ExamStatus>) -> Vec<&Exam> {
        self.items
            .iter()
            .filter(|e| class_id.map(|c| e.class_id == c).unwrap_or(true))
            .filter(|e| status.map(|s| e.status == s).unwrap_or(true))
            .collect()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|e| e.id != id);
        self.items.len() != before
    }

    pub fn remove_class(&mut self, class_id: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .items
            .iter()
            .filter(|e| e.class_id == class_id)
            .map(|e| e.id.clone())
            .collect();
        self.items.retain(|e| e.class_id != class_id);
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Sole owner of grading records, keyed by (exam, student). Missing keys
/// are created, never reported as errors, and the store performs no lock
/// enforcement or referential checks of its own.
#[derive(Debug, Default)]
pub struct ResultStore {
    items: BTreeMap<(String, String), ExamResult>,
}

impl ResultStore {
    /// Insert or replace. An omitted `locked` preserves the existing flag
    /// and defaults to false on creation.
    pub fn upsert_result(
        &mut self,
        exam_id: &str,
        student_id: &str,
        answers: AnswerMap,
        score: f64,
        locked: Option<bool>,
    ) {
        let key = (exam_id.to_string(), student_id.to_string());
        let prior = self.items.get(&key).map(|r| r.locked).unwrap_or(false);
        self.items.insert(
            key,
            ExamResult {
                answers,
                score,
                locked: locked.unwrap_or(prior),
            },
        );
    }

    /// Flip only the lock flag; an absent key becomes an empty result.
    pub fn set_locked(&mut self, exam_id: &str, student_id: &str, locked: bool) {
        let key = (exam_id.to_string(), student_id.to_string());
        match self.items.get_mut(&key) {
            Some(r) => r.locked = locked,
            None => {
                self.items.insert(
                    key,
                    ExamResult {
                        answers: AnswerMap::new(),
                        score: 0.0,
                        locked,
                    },
                );
            }
        }
    }

    pub fn get(&self, exam_id: &str, student_id: &str) -> Option<&ExamResult> {
        self.items
            .get(&(exam_id.to_string(), student_id.to_string()))
    }

    /// Pure projection of one exam's results, student id -> record.
    pub fn exam_results(&self, exam_id: &str) -> BTreeMap<&str, &ExamResult> {
        self.items
            .iter()
            .filter(|((e, _), _)| e == exam_id)
            .map(|((_, s), r)| (s.as_str(), r))
            .collect()
    }

    /// Recompute every stored score for one exam after its key changes.
    pub fn rescore_exam(&mut self, exam_id: &str, score: impl Fn(&AnswerMap) -> f64) -> usize {
        let mut touched = 0;
        for ((e, _), r) in self.items.iter_mut() {
            if e == exam_id {
                r.score = score(&r.answers);
                touched += 1;
            }
        }
        touched
    }

    pub fn remove_exam(&mut self, exam_id: &str) {
        self.items.retain(|(e, _), _| e != exam_id);
    }

    pub fn remove_student(&mut self, student_id: &str) {
        self.items.retain(|(_, s), _| s != student_id);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Default)]
pub struct InquiryStore {
    items: Vec<Inquiry>,
}

impl InquiryStore {
    pub fn insert(&mut self, inquiry: Inquiry) {
        self.items.push(inquiry);
    }

    pub fn get(&self, id: &str) -> Option<&Inquiry> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Inquiry> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn list(&self, status: Option<InquiryStatus>) -> Vec<&Inquiry> {
        self.items
            .iter()
            .filter(|i| status.map(|s| i.status == s).unwrap_or(true))
            .collect()
    }

    pub fn remove_class(&mut self, class_id: &str) {
        self.items.retain(|i| i.class_id.as_deref() != Some(class_id));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Default)]
pub struct AssistantStore {
    items: Vec<Assistant>,
}

impl AssistantStore {
    pub fn insert(&mut self, assistant: Assistant) {
        self.items.push(assistant);
    }

    pub fn get(&self, id: &str) -> Option<&Assistant> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Assistant> {
        self.items.iter_mut().find(|a| a.id == id)
    }

    pub fn list(&self) -> &[Assistant] {
        &self.items
    }

    pub fn unassign_class(&mut self, class_id: &str) {
        for a in &mut self.items {
            a.class_ids.retain(|c| c != class_id);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Default)]
pub struct DeliveryStore {
    items: Vec<CardDelivery>,
}

impl DeliveryStore {
    pub fn insert(&mut self, delivery: CardDelivery) {
        self.items.push(delivery);
    }

    pub fn list(&self, class_id: Option<&str>) -> Vec<&CardDelivery> {
        self.items
            .iter()
            .filter(|d| class_id.map(|c| d.class_id == c).unwrap_or(true))
            .collect()
    }

    pub fn remove_class(&mut self, class_id: &str) {
        self.items.retain(|d| d.class_id != class_id);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
