pub mod consultations;
pub mod health;
