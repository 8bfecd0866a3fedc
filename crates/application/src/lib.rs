pub mod pipeline;
pub mod ports;
pub mod refresh;
pub mod single_flight;

pub use pipeline::{PipelineConfig, PipelineResult, QueryPipeline};
pub use refresh::{select_candidates, SweepConfig};
