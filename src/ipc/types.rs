use serde::Deserialize;

use crate::flow::Clock;
use crate::store::{
    AssistantStore, ClassStore, DeliveryStore, ExamStore, InquiryStore, ResultStore, StudentStore,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the daemon knows, owned in one place and threaded mutably
/// through the handlers. No handler keeps state of its own.
pub struct AppState {
    pub classes: ClassStore,
    pub students: StudentStore,
    pub exams: ExamStore,
    pub results: ResultStore,
    pub inquiries: InquiryStore,
    pub assistants: AssistantStore,
    pub deliveries: DeliveryStore,
    pub clock: Box<dyn Clock>,
}

impl AppState {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            classes: ClassStore::default(),
            students: StudentStore::default(),
            exams: ExamStore::default(),
            results: ResultStore::default(),
            inquiries: InquiryStore::default(),
            assistants: AssistantStore::default(),
            deliveries: DeliveryStore::default(),
            clock,
        }
    }

    /// Drop every store wholesale. The clock survives a reset.
    pub fn reset(&mut self) {
        self.classes = ClassStore::default();
        self.students = StudentStore::default();
        self.exams = ExamStore::default();
        self.results = ResultStore::default();
        self.inquiries = InquiryStore::default();
        self.assistants = AssistantStore::default();
        self.deliveries = DeliveryStore::default();
    }
}
