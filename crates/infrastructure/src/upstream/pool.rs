use super::client::{create_transport, Transport};
use super::health::UpstreamHealth;
use super::query_builder::build_query;
use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RData;
use sentinel_dns_application::ports::{UpstreamPort, UpstreamResolution};
use sentinel_dns_domain::config::UpstreamsConfig;
use sentinel_dns_domain::upstream::ResolverStrategy;
use sentinel_dns_domain::{DomainError, Fingerprint};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Standard RFC 1035 §4.1.1 response codes the pipeline reasons about
/// numerically (e.g. `2` for SERVFAIL); anything else collapses to its
/// closest documented meaning.
fn rcode_to_u8(rcode: ResponseCode) -> u8 {
    match rcode {
        ResponseCode::NoError => 0,
        ResponseCode::FormErr => 1,
        ResponseCode::ServFail => 2,
        ResponseCode::NXDomain => 3,
        ResponseCode::NotImp => 4,
        ResponseCode::Refused => 5,
        _ => 2,
    }
}

struct Entry {
    name: String,
    transport: Transport,
    health: UpstreamHealth,
}

/// Upstream pool (C6): picks a server per the configured strategy, exchanges
/// one query via its `Transport` (C7), and feeds the outcome back into that
/// server's `UpstreamHealth`.
pub struct UpstreamPool {
    entries: Vec<Entry>,
    strategy: ResolverStrategy,
    timeout: Duration,
    round_robin: AtomicUsize,
}

impl UpstreamPool {
    pub fn new(config: &UpstreamsConfig) -> Result<Self, DomainError> {
        if config.servers.is_empty() {
            return Err(DomainError::ConfigMissing(
                "upstreams.servers must not be empty".into(),
            ));
        }
        let backoff = Duration::from_secs(config.upstream_backoff_s);
        let entries = config
            .servers
            .iter()
            .map(|descriptor| {
                create_transport(descriptor).map(|transport| Entry {
                    name: descriptor.name.clone(),
                    transport,
                    health: UpstreamHealth::new(backoff),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries,
            strategy: config.resolver_strategy,
            timeout: Duration::from_millis(config.upstream_timeout_ms),
            round_robin: AtomicUsize::new(0),
        })
    }

    /// Candidate order for this attempt, per strategy. Falls back to the
    /// least-recently-failed entry when every entry is currently unhealthy
    /// rather than refusing to query at all.
    fn candidate_order(&self, now: Instant) -> Vec<usize> {
        let healthy: Vec<usize> = (0..self.entries.len())
            .filter(|&i| self.entries[i].health.is_healthy(now))
            .collect();

        if healthy.is_empty() {
            let mut order: Vec<usize> = (0..self.entries.len()).collect();
            order.sort_by_key(|&i| self.entries[i].health.next_retry_at());
            return order;
        }

        match self.strategy {
            ResolverStrategy::Failover => healthy,
            ResolverStrategy::LoadBalance => {
                let start = self.round_robin.fetch_add(1, Ordering::Relaxed) % healthy.len();
                healthy
                    .iter()
                    .cycle()
                    .skip(start)
                    .take(healthy.len())
                    .copied()
                    .collect()
            }
            ResolverStrategy::Weighted => {
                let mut weighted: Vec<(usize, f64)> = healthy
                    .iter()
                    .map(|&i| (i, self.entries[i].health.weight()))
                    .collect();
                let total: f64 = weighted.iter().map(|(_, w)| w).sum();
                let mut pick = fastrand::f64() * total;
                let mut order = Vec::with_capacity(weighted.len());
                while let Some(pos) = weighted.iter().position(|(_, w)| {
                    pick -= w;
                    pick <= 0.0
                }) {
                    order.push(weighted.remove(pos).0);
                    pick = fastrand::f64() * weighted.iter().map(|(_, w)| w).sum::<f64>();
                }
                order.extend(weighted.into_iter().map(|(i, _)| i));
                order
            }
        }
    }

    fn parse_response(
        wire: &[u8],
        upstream_addr: &str,
    ) -> Result<UpstreamResolution, DomainError> {
        let message = Message::from_vec(wire).map_err(|e| DomainError::UpstreamProtocol {
            upstream: upstream_addr.to_string(),
            message: e.to_string(),
        })?;

        let rcode = message.response_code();
        let mut min_answer_ttl = u32::MAX;
        for record in message.answers() {
            min_answer_ttl = min_answer_ttl.min(record.ttl());
        }
        let is_negative = message.answers().is_empty();
        let soa_ttl = message
            .name_servers()
            .iter()
            .find_map(|r| match r.data() {
                RData::SOA(soa) => Some(soa.minimum().min(r.ttl())),
                _ => None,
            })
            .unwrap_or(0);

        Ok(UpstreamResolution {
            wire: wire.to_vec(),
            rcode: rcode_to_u8(rcode),
            upstream_addr: upstream_addr.to_string(),
            min_answer_ttl: if min_answer_ttl == u32::MAX { 0 } else { min_answer_ttl },
            is_negative,
            soa_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, MessageType, OpCode};

    fn servfail_wire() -> Vec<u8> {
        let mut message = Message::new(42, MessageType::Response, OpCode::Query);
        message.set_response_code(ResponseCode::ServFail);
        message.to_vec().expect("encodes")
    }

    #[test]
    fn servfail_is_a_successful_resolution_not_an_error() {
        let resolution = UpstreamPool::parse_response(&servfail_wire(), "1.1.1.1:53")
            .expect("SERVFAIL is a valid upstream answer, not a transport failure");

        assert_eq!(resolution.rcode, 2);
        assert!(resolution.is_negative);
    }
}

#[async_trait]
impl UpstreamPort for UpstreamPool {
    async fn resolve(
        &self,
        fp: &Fingerprint,
        deadline: Instant,
    ) -> Result<UpstreamResolution, DomainError> {
        let now = Instant::now();
        let order = self.candidate_order(now);
        let (query_id, wire) = build_query(fp);

        let mut last_err = DomainError::UpstreamsExhausted;
        for idx in order {
            let entry = &self.entries[idx];
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DomainError::DeadlineExceeded);
            }
            let per_attempt = remaining.min(self.timeout);

            let attempt_start = Instant::now();
            match entry.transport.send(&wire, per_attempt).await {
                Ok(mut response) => {
                    if response.len() >= 2 {
                        response[0] = (query_id >> 8) as u8;
                        response[1] = (query_id & 0xff) as u8;
                    }
                    match Self::parse_response(&response, &entry.name) {
                        Ok(resolution) => {
                            entry.health.record_success(attempt_start.elapsed());
                            return Ok(resolution);
                        }
                        Err(e) => {
                            if e.is_upstream_failure() {
                                entry.health.record_failure(Instant::now());
                            }
                            debug!(upstream = %entry.name, error = %e, "upstream returned an error response");
                            last_err = e;
                        }
                    }
                }
                Err(e) => {
                    entry.health.record_failure(Instant::now());
                    warn!(upstream = %entry.name, error = %e, "upstream transport failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
