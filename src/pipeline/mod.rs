//! Per-turn analysis pipeline: sanitize → normalize → extract → classify
//! intent → reason → assess risk, plus report synthesis at the end of a session.

pub mod arena;
pub mod extraction;
pub mod intent;
pub mod normalize;
pub mod provider;
pub mod reasoning;
pub mod report;
pub mod safety;
pub mod types;

pub use arena::{EvidenceView, TurnArena};
pub use types::TurnWarning;
