pub mod classes;
pub mod core;
pub mod fees;
pub mod grades;
pub mod pupils;
pub mod reports;
pub mod setup;
pub mod teachers;
