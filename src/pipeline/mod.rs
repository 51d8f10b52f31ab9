//! Manifest-driven pipeline execution.
//!
//! | Submodule | What it owns                                          |
//! |-----------|-------------------------------------------------------|
//! | `result`  | `StepResult`/`PhaseResult`/`PipelineResult`, `Gate`   |
//! | `step`    | subprocess execution with deadline, env requirements  |
//! | `runner`  | phase parallel/sequential semantics, abort propagation|

pub mod result;
pub mod runner;
pub mod step;

pub use result::{
    ErrorCategory, Gate, PhaseResult, PhaseStatus, PipelineResult, RunSummary, StepResult,
    StepStatus,
};
pub use runner::{RunContext, run_phase, run_pipeline};
pub use step::{check_requirements, execute_step};
