pub mod answers;
pub mod assistants;
pub mod classes;
pub mod core;
pub mod exams;
pub mod inquiries;
pub mod reports;
pub mod students;
