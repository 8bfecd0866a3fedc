pub mod analytics;
pub mod blocklist;
pub mod cache;
pub mod codec;
pub mod l1;
pub mod listener;
pub mod local_records;
pub mod upstream;

pub use analytics::BoundedAnalyticsSink;
pub use blocklist::BlockFilterEngine;
pub use cache::L0Cache;
pub use codec::HickoryCodec;
pub use l1::{RedisHitCounter, RedisL1Cache, RedisRefreshLock};
pub use listener::spawn_all as spawn_listeners;
pub use local_records::StaticRecords;
pub use upstream::UpstreamPool;
