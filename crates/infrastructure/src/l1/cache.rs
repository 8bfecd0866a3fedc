use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sentinel_dns_application::ports::L1CachePort;
use sentinel_dns_domain::{CacheEntry, DomainError, Fingerprint};
use tracing::warn;

/// Shared L1 cache (C4) backed by Redis. Entries are stored as JSON under
/// `dns:<name>:<qtype>:<qclass>` with an expiry covering the fresh window
/// plus the stale-serving extension, so a follower instance that only ever
/// reads L1 still observes stale-but-servable entries.
#[derive(Clone)]
pub struct RedisL1Cache {
    conn: ConnectionManager,
}

impl RedisL1Cache {
    pub async fn connect(url: &str) -> Result<Self, DomainError> {
        let client = redis::Client::open(url)
            .map_err(|e| DomainError::L1Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| DomainError::L1Unavailable(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl L1CachePort for RedisL1Cache {
    async fn get(&self, fp: &Fingerprint) -> Option<CacheEntry> {
        let mut conn = self.conn.clone();
        let key = fp.l1_key();
        let raw: Option<Vec<u8>> = match conn.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, %key, "l1 get failed, treating as miss");
                return None;
            }
        };
        raw.and_then(|bytes| match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, %key, "l1 entry deserialize failed, treating as miss");
                None
            }
        })
    }

    async fn set(&self, fp: &Fingerprint, entry: &CacheEntry) {
        let key = fp.l1_key();
        let bytes = match serde_json::to_vec(entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, %key, "l1 entry serialize failed, skipping write");
                return;
            }
        };
        let ttl_s = (entry.ttl_s as u64 + entry.stale_until_s as u64).max(1);
        let mut conn = self.conn.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(&key, bytes, ttl_s).await {
            warn!(error = %e, %key, "l1 set failed");
        }
    }
}
