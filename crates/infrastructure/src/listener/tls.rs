use sentinel_dns_application::pipeline::QueryPipeline;
use sentinel_dns_domain::DomainError;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

const REPLY_QUEUE_DEPTH: usize = 32;

/// DoT (DNS-over-TLS, RFC 7858): TCP framing wrapped in TLS, so the record
/// framing is identical to the plain TCP listener once the handshake
/// completes.
pub fn load_server_config(cert_path: &str, key_path: &str) -> Result<ServerConfig, DomainError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;
    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| DomainError::ConfigMissing(format!("invalid TLS certificate/key: {e}")))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let file = File::open(Path::new(path))
        .map_err(|e| DomainError::ConfigMissing(format!("cannot open cert {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DomainError::ConfigMissing(format!("cannot parse cert {path}: {e}")))
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, DomainError> {
    let file = File::open(Path::new(path))
        .map_err(|e| DomainError::ConfigMissing(format!("cannot open key {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| DomainError::ConfigMissing(format!("cannot parse key {path}: {e}")))?
        .ok_or_else(|| DomainError::ConfigMissing(format!("no private key found in {path}")))
}

/// Accept loop for one DoT listen address. Each connection stays open for
/// `read_timeout`, serving any number of length-prefixed queries; every
/// query is handled by its own task so a slow pipeline.handle() for one
/// query never blocks reading the next. Replies funnel through a
/// per-connection channel into a single writer task, so writes to the
/// socket are never interleaved.
pub async fn serve(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    pipeline: Arc<QueryPipeline>,
    read_timeout: Duration,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = listener.accept() => match result {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "dot accept failed");
                    continue;
                }
            },
        };
        let acceptor = acceptor.clone();
        let pipeline = pipeline.clone();
        let tracker_inner = tracker.clone();
        tracker.spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "dot handshake failed");
                    return;
                }
            };
            if let Err(e) = serve_connection(tls_stream, pipeline, read_timeout, tracker_inner).await {
                debug!(peer = %peer, error = %e, "dot connection closed");
            }
        });
    }
}

async fn serve_connection<S>(
    stream: S,
    pipeline: Arc<QueryPipeline>,
    read_timeout: Duration,
    tracker: TaskTracker,
) -> std::io::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(REPLY_QUEUE_DEPTH);

    let writer_task = tracker.spawn(async move {
        while let Some(wire) = rx.recv().await {
            let reply_len = (wire.len() as u16).to_be_bytes();
            if writer.write_all(&reply_len).await.is_err() {
                break;
            }
            if writer.write_all(&wire).await.is_err() {
                break;
            }
        }
    });

    let result = read_queries(&mut reader, read_timeout, &pipeline, &tracker, &tx).await;
    drop(tx);
    let _ = writer_task.await;
    result
}

async fn read_queries<S>(
    reader: &mut ReadHalf<S>,
    read_timeout: Duration,
    pipeline: &Arc<QueryPipeline>,
    tracker: &TaskTracker,
    tx: &mpsc::Sender<Vec<u8>>,
) -> std::io::Result<()>
where
    S: tokio::io::AsyncRead + Unpin,
{
    loop {
        let mut len_buf = [0u8; 2];
        let read = tokio::time::timeout(read_timeout, reader.read_exact(&mut len_buf)).await;
        match read {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(Err(e)) => return Err(e),
            Err(_) => return Ok(()),
        }
        let msg_len = u16::from_be_bytes(len_buf) as usize;
        let mut msg = vec![0u8; msg_len];
        reader.read_exact(&mut msg).await?;

        let pipeline = pipeline.clone();
        let tx = tx.clone();
        tracker.spawn(async move {
            let result = pipeline.handle(&msg, true).await;
            let _ = tx.send(result.wire).await;
        });
    }
}
