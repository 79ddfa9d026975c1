//! Open Marketing ROI Kit — pipeline orchestration shared by the CLI and
//! integration tests.

pub mod pipeline;

pub use pipeline::{run_pipeline, PipelineOutput};
