use async_trait::async_trait;
use sentinel_dns_domain::{DomainError, Fingerprint};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct UpstreamResolution {
    pub wire: Vec<u8>,
    pub rcode: u8,
    pub upstream_addr: String,
    pub min_answer_ttl: u32,
    pub is_negative: bool,
    pub soa_ttl: u32,
}

/// Upstream pool (C6) + clients (C7), exposed to the pipeline as a single
/// operation: pick an upstream per the configured strategy, exchange, apply
/// health bookkeeping, and return the answer or a classified error.
#[async_trait]
pub trait UpstreamPort: Send + Sync {
    async fn resolve(
        &self,
        fp: &Fingerprint,
        deadline: Instant,
    ) -> Result<UpstreamResolution, DomainError>;
}
