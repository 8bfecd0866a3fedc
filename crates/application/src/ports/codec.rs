use sentinel_dns_domain::{CacheEntry, DomainError, Fingerprint};
use std::net::IpAddr;

/// A decoded incoming question, independent of the wire library used to
/// parse it.
#[derive(Debug, Clone)]
pub struct DecodedRequest {
    pub id: u16,
    pub fingerprint: Fingerprint,
    pub edns_bufsize: Option<u16>,
    pub is_tcp: bool,
}

/// What a synthesised (non-cached) answer should contain.
#[derive(Debug, Clone, Copy)]
pub enum SynthAnswer {
    Nxdomain,
    Servfail,
    Formerr,
    Sinkhole(IpAddr),
}

/// Message codec (C1): parse/serialise DNS wire messages.
pub trait CodecPort: Send + Sync {
    fn decode(&self, bytes: &[u8], is_tcp: bool) -> Result<DecodedRequest, DomainError>;

    /// Rewrite the transaction id of a cached wire response and truncate for
    /// UDP if it exceeds the requester's negotiated buffer size.
    fn encode_from_cache(&self, req: &DecodedRequest, entry: &CacheEntry) -> Vec<u8>;

    fn encode_synthetic(&self, req: &DecodedRequest, answer: SynthAnswer, ttl: u32) -> Vec<u8>;

    /// Best-effort FORMERR for messages too malformed to decode into a
    /// `DecodedRequest` at all. Recovers the transaction id directly from
    /// the first two wire bytes (RFC 1035 message header), if present.
    fn encode_raw_formerr(&self, raw: &[u8]) -> Vec<u8>;
}
