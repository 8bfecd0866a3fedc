pub mod client;
pub mod health;
pub mod pool;
pub mod query_builder;

pub use pool::UpstreamPool;
