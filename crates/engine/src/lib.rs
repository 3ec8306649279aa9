//! Engine crate – shared orchestration logic for deskpack.
//!
//! This crate contains the dev-session supervisor and the packaging pipeline
//! behind a plain library API. It does NOT parse CLI arguments or install a
//! tracing subscriber, so it can be driven by the `deskpack` binary or by
//! tests directly.

pub mod config;
#[cfg(unix)]
pub mod control;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod probe;
pub mod project;
pub mod resources;
pub mod runner;
pub mod scaffold;
pub mod supervisor;
pub mod transform;
pub mod workspace;

// Re-exports for convenience
pub use config::OrchestratorConfig;
pub use error::{EngineError, EngineResult};
pub use pipeline::{PipelineError, Stage};
pub use project::ProjectLayout;
pub use supervisor::Supervisor;
