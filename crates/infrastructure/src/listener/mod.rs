pub mod tcp;
#[cfg(feature = "dns-over-https")]
pub mod https;
#[cfg(any(feature = "dns-over-tls", feature = "dns-over-https"))]
pub mod tls;
pub mod udp;

use sentinel_dns_application::pipeline::QueryPipeline;
use sentinel_dns_domain::config::ListenConfig;
use sentinel_dns_domain::upstream::Protocol;
use sentinel_dns_domain::DomainError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Starts one acceptor task per `[[listen]]` entry (C11). Returns as soon as
/// every acceptor is bound; each accept loop runs until `shutdown` fires.
/// The returned [`TaskTracker`] tracks every acceptor and every per-query
/// task it spawns — call `.close()` then `.wait()` on it after cancelling
/// `shutdown` to drain in-flight queries before the process exits.
pub async fn spawn_all(
    entries: &[ListenConfig],
    pipeline: Arc<QueryPipeline>,
    read_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<TaskTracker, DomainError> {
    let tracker = TaskTracker::new();
    for entry in entries {
        let addr: SocketAddr = entry
            .address
            .parse()
            .map_err(|e| DomainError::ConfigMissing(format!("invalid listen address {}: {e}", entry.address)))?;

        match entry.protocol {
            Protocol::Udp => {
                let socket = udp::bind_tuned_udp(addr, entry.reuseport)
                    .map_err(|e| DomainError::ConfigMissing(format!("udp bind {addr}: {e}")))?;
                info!(%addr, "udp listener bound");
                let pipeline = pipeline.clone();
                tracker.spawn(udp::serve(socket, pipeline, tracker.clone(), shutdown.clone()));
            }
            Protocol::Tcp => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|e| DomainError::ConfigMissing(format!("tcp bind {addr}: {e}")))?;
                info!(%addr, "tcp listener bound");
                let pipeline = pipeline.clone();
                tracker.spawn(tcp::serve(listener, pipeline, read_timeout, tracker.clone(), shutdown.clone()));
            }
            Protocol::Tls => {
                #[cfg(feature = "dns-over-tls")]
                {
                    let cert = entry.tls_cert_path.as_deref().ok_or_else(|| {
                        DomainError::ConfigMissing(format!("listener {addr} requires tls_cert_path"))
                    })?;
                    let key = entry.tls_key_path.as_deref().ok_or_else(|| {
                        DomainError::ConfigMissing(format!("listener {addr} requires tls_key_path"))
                    })?;
                    let config = tls::load_server_config(cert, key)?;
                    let acceptor = tokio_rustls::TlsAcceptor::from(std::sync::Arc::new(config));
                    let listener = TcpListener::bind(addr)
                        .await
                        .map_err(|e| DomainError::ConfigMissing(format!("dot bind {addr}: {e}")))?;
                    info!(%addr, "dot listener bound");
                    let pipeline = pipeline.clone();
                    tracker.spawn(tls::serve(
                        listener,
                        acceptor,
                        pipeline,
                        read_timeout,
                        tracker.clone(),
                        shutdown.clone(),
                    ));
                }
                #[cfg(not(feature = "dns-over-tls"))]
                {
                    return Err(DomainError::ConfigMissing(format!(
                        "listener {addr} requires protocol tls but dns-over-tls feature is disabled"
                    )));
                }
            }
            Protocol::Https => {
                #[cfg(feature = "dns-over-https")]
                {
                    let cert = entry.tls_cert_path.as_deref().ok_or_else(|| {
                        DomainError::ConfigMissing(format!("listener {addr} requires tls_cert_path"))
                    })?;
                    let key = entry.tls_key_path.as_deref().ok_or_else(|| {
                        DomainError::ConfigMissing(format!("listener {addr} requires tls_key_path"))
                    })?;
                    let config = tls::load_server_config(cert, key)?;
                    let acceptor = tokio_rustls::TlsAcceptor::from(std::sync::Arc::new(config));
                    let listener = TcpListener::bind(addr)
                        .await
                        .map_err(|e| DomainError::ConfigMissing(format!("doh bind {addr}: {e}")))?;
                    info!(%addr, "doh listener bound");
                    let pipeline = pipeline.clone();
                    tracker.spawn(https::serve(
                        listener,
                        acceptor,
                        pipeline,
                        read_timeout,
                        tracker.clone(),
                        shutdown.clone(),
                    ));
                }
                #[cfg(not(feature = "dns-over-https"))]
                {
                    return Err(DomainError::ConfigMissing(format!(
                        "listener {addr} requires protocol https but dns-over-https feature is disabled"
                    )));
                }
            }
        }
    }
    tracker.close();
    Ok(tracker)
}
