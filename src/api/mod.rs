//! HTTP API over the interview engine.
//!
//! Routes are nested under `/api/` and exchange JSON. Errors use the shape
//! `{"error": {"code", "message"}}`.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::intake_api_router;
pub use server::{start_api_server, ApiServer, ServerInfo};
pub use types::ApiContext;
