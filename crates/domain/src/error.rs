use thiserror::Error;

/// Internal error taxonomy, independent of wire rcodes. Every variant maps
/// to a documented recovery policy (§7) applied by the caller; none of these
/// ever reach a client directly — the pipeline always converts them into a
/// DNS response.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("malformed DNS message: {0}")]
    MalformedMessage(String),

    #[error("configuration error: {0}")]
    ConfigMissing(String),

    #[error("L1 cache unavailable: {0}")]
    L1Unavailable(String),

    #[error("upstream {upstream} timed out after {elapsed_ms}ms")]
    UpstreamTimeout { upstream: String, elapsed_ms: u64 },

    #[error("upstream {upstream} protocol error: {message}")]
    UpstreamProtocol { upstream: String, message: String },

    #[error("analytics sink saturated, record dropped")]
    SinkBackpressure,

    #[error("query deadline exceeded")]
    DeadlineExceeded,

    #[error("all upstreams exhausted")]
    UpstreamsExhausted,
}

impl DomainError {
    /// Whether this error should mark the originating upstream unhealthy.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            DomainError::UpstreamTimeout { .. } | DomainError::UpstreamProtocol { .. }
        )
    }
}
