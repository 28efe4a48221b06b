// Library half of the CLI: the comparison pipeline and column suggestions,
// shared by the binary and the integration tests.

pub mod pipeline;
pub mod suggest;

pub use pipeline::{prepare, run_comparison, CompareRequest, PipelineError};
