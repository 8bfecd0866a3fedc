pub mod analytics;
pub mod blocklist;
pub mod codec;
pub mod hit_counter;
pub mod l0_cache;
pub mod l1_cache;
pub mod local_records;
pub mod refresh_lock;
pub mod upstream;

pub use analytics::AnalyticsSinkPort;
pub use blocklist::{BlockDecision, BlocklistPort};
pub use codec::{CodecPort, DecodedRequest, SynthAnswer};
pub use hit_counter::HitCounterPort;
pub use l0_cache::{L0CachePort, L0Stats};
pub use l1_cache::L1CachePort;
pub use local_records::LocalRecordsPort;
pub use refresh_lock::RefreshLockPort;
pub use upstream::{UpstreamPort, UpstreamResolution};
