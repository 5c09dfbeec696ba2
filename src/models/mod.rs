pub mod clinical;
pub mod context;
pub mod conversation;
pub mod entity;
pub mod enums;

pub use clinical::*;
pub use context::*;
pub use conversation::*;
pub use entity::*;
pub use enums::{ClinicalSignificance, InterviewStage, Sex, TurnRole, UrgencyLevel};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid value for {field}: {value}")]
    InvalidEnum { field: String, value: String },
}
