//! Processing lifecycle: claims, the state machine runner, and the
//! layered read views.

pub mod claims;
pub mod record;
pub mod runner;

pub use claims::ClaimMap;
pub use record::{fetch_record, fetch_structured_view, FileRecord};
pub use runner::Orchestrator;
