use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ExistenceCheck, SetExpiry, SetOptions};
use sentinel_dns_application::ports::RefreshLockPort;
use sentinel_dns_domain::Fingerprint;
use std::time::Duration;
use tracing::warn;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Cross-instance refresh lock (part of C8), backed by `SET NX EX` for
/// acquisition and a compare-and-delete Lua script for release so an
/// instance never clears a lock another instance has since re-acquired
/// after this one's TTL expired.
#[derive(Clone)]
pub struct RedisRefreshLock {
    conn: ConnectionManager,
    lock_ttl: Duration,
}

impl RedisRefreshLock {
    pub fn new(conn: ConnectionManager, lock_ttl: Duration) -> Self {
        Self { conn, lock_ttl }
    }
}

#[async_trait]
impl RefreshLockPort for RedisRefreshLock {
    async fn try_acquire(&self, fp: &Fingerprint, instance_id: &str) -> bool {
        let key = fp.lock_key();
        let opts = SetOptions::default()
            .with_expiration(SetExpiry::EX(self.lock_ttl.as_secs().max(1)))
            .conditional_set(ExistenceCheck::NX);
        let mut conn = self.conn.clone();
        match conn.set_options::<_, _, Option<String>>(&key, instance_id, opts).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, %key, "refresh lock acquire failed");
                false
            }
        }
    }

    async fn release(&self, fp: &Fingerprint, instance_id: &str) -> bool {
        let key = fp.lock_key();
        let mut conn = self.conn.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);
        match script
            .key(key.clone())
            .arg(instance_id)
            .invoke_async::<i64>(&mut conn)
            .await
        {
            Ok(n) => n > 0,
            Err(e) => {
                warn!(error = %e, %key, "refresh lock release failed");
                false
            }
        }
    }

    fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }
}
