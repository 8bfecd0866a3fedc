pub mod compiler;
pub mod engine;
pub mod snapshot;

pub use compiler::compile_snapshot;
pub use engine::BlockFilterEngine;
pub use snapshot::BlockSnapshot;
