use sentinel_dns_domain::outcome::QueryRecord;

/// Analytics sink (§6.4): `Submit(queryRecord) -> ok`, non-blocking, backed
/// by a bounded queue. The pipeline never awaits or blocks on this.
pub trait AnalyticsSinkPort: Send + Sync {
    fn submit(&self, record: QueryRecord) -> bool;
}
