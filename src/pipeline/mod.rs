//! The generation pipeline: context, stage contract and runner.

pub mod context;
pub mod runner;
pub mod stage;
pub mod stages;

pub use context::GenContext;
pub use runner::{PipelineRunner, RunOutcome};
pub use stage::{StageHandler, StageOutput};
