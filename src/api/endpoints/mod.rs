//! API endpoint handlers.

pub mod audit;
pub mod diagnoses;
pub mod diseases;
pub mod health;
pub mod recommendations;
pub mod reports;
pub mod stats;
pub mod tasks;
