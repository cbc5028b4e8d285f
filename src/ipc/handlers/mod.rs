pub mod core;
pub mod curriculum;
pub mod engine;
pub mod exchange;
pub mod grades;
pub mod reports;
pub mod students;
