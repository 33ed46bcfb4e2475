// Repack pipeline: one request in, one filtered guide out

pub mod orchestrator;
pub mod run_request;
pub mod state;

pub use orchestrator::{PipelineOrchestrator, RunOutcome, RunSummary};
pub use run_request::RunRequest;
pub use state::{OutputRoute, PipelineState};
