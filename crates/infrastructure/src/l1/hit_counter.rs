use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sentinel_dns_application::ports::HitCounterPort;
use sentinel_dns_domain::Fingerprint;
use tracing::warn;

use super::gross_up;

/// Redis-backed hit counter (C5). Counts live under `dnsmeta:hits:<FP>` with
/// a sliding expiry set on first increment in each window. When
/// `sample_rate < 1.0`, only a fraction of hits increment the counter and the
/// observed count is grossed up so `is_hot` compares against the true rate.
#[derive(Clone)]
pub struct RedisHitCounter {
    conn: ConnectionManager,
    hit_window_s: u64,
    sweep_hit_window_s: u64,
    sample_rate: f64,
    hot_threshold: u64,
}

impl RedisHitCounter {
    pub fn new(
        conn: ConnectionManager,
        hit_window_s: u64,
        sweep_hit_window_s: u64,
        sample_rate: f64,
        hot_threshold: u64,
    ) -> Self {
        Self {
            conn,
            hit_window_s,
            sweep_hit_window_s,
            sample_rate: sample_rate.clamp(0.0, 1.0),
            hot_threshold,
        }
    }

    async fn peek_key(&self, key: &str) -> u64 {
        let mut conn = self.conn.clone();
        let count: Option<i64> = match conn.get(key).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, %key, "hit counter peek failed");
                return 0;
            }
        };
        gross_up(count.unwrap_or(0).max(0) as u64, self.sample_rate)
    }
}

#[async_trait]
impl HitCounterPort for RedisHitCounter {
    async fn record_hit(&self, fp: &Fingerprint) -> u64 {
        if self.sample_rate < 1.0 && fastrand::f64() > self.sample_rate {
            return self.peek(fp).await;
        }
        let key = fp.hits_key();
        let mut conn = self.conn.clone();
        let count: i64 = match conn.incr(&key, 1).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, %key, "hit counter incr failed");
                return 0;
            }
        };
        if count == 1 {
            if let Err(e) = conn.expire::<_, ()>(&key, self.hit_window_s as i64).await {
                warn!(error = %e, %key, "hit counter expire failed");
            }
        }

        let sweep_key = fp.sweep_hits_key();
        let mut sweep_conn = self.conn.clone();
        let sweep_count: Result<i64, _> = sweep_conn.incr(&sweep_key, 1).await;
        match sweep_count {
            Ok(1) => {
                if let Err(e) = sweep_conn
                    .expire::<_, ()>(&sweep_key, self.sweep_hit_window_s as i64)
                    .await
                {
                    warn!(error = %e, key = %sweep_key, "sweep hit counter expire failed");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, key = %sweep_key, "sweep hit counter incr failed"),
        }

        gross_up(count.max(0) as u64, self.sample_rate)
    }

    async fn peek(&self, fp: &Fingerprint) -> u64 {
        self.peek_key(&fp.hits_key()).await
    }

    async fn peek_sweep_window(&self, fp: &Fingerprint) -> u64 {
        self.peek_key(&fp.sweep_hits_key()).await
    }

    fn is_hot(&self, count: u64) -> bool {
        count >= self.hot_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::super::gross_up;

    #[test]
    fn gross_up_scales_sampled_count() {
        assert_eq!(gross_up(5, 0.5), 10);
        assert_eq!(gross_up(5, 1.0), 5);
        assert_eq!(gross_up(5, 0.0), 5);
    }
}
