use base64::Engine;
use sentinel_dns_application::pipeline::QueryPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// DoH (RFC 8484) server: minimal HTTP/1.1 parsing for POST
/// `application/dns-message` and GET `?dns=<base64url>`, one query per
/// connection. No HTTP/2 or connection reuse — a DoH client tolerates the
/// fallback, and the alternative is pulling in a general-purpose HTTP
/// server stack for a single endpoint. One request per connection means
/// there's no sequential-queuing concern within a connection the way TCP/DoT
/// have: the next accept is never blocked on this request's pipeline.handle().
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
                    warn!(error = %e, "doh accept failed");
                    continue;
                }
            },
        };
        let acceptor = acceptor.clone();
        let pipeline = pipeline.clone();
        tracker.spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "doh handshake failed");
                    return;
                }
            };
            if let Err(e) = serve_request(tls_stream, pipeline, read_timeout).await {
                debug!(peer = %peer, error = %e, "doh request failed");
            }
        });
    }
}

async fn serve_request<S>(
    mut stream: S,
    pipeline: Arc<QueryPipeline>,
    read_timeout: Duration,
) -> std::io::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let request = tokio::time::timeout(read_timeout, read_http_request(&mut stream)).await??;

    let dns_message = match parse_dns_message(&request) {
        Some(wire) => wire,
        None => {
            write_response(&mut stream, 400, "Bad Request", b"").await?;
            return Ok(());
        }
    };

    let result = pipeline.handle(&dns_message, true).await;
    write_dns_response(&mut stream, &result.wire).await
}

struct HttpRequest {
    method: String,
    target: String,
    body: Vec<u8>,
}

async fn read_http_request<S>(stream: &mut S) -> std::io::Result<HttpRequest>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break Some(pos + 4);
        }
        if buf.len() > 64 * 1024 {
            break None;
        }
    };
    let header_end = header_end.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "no http header terminator")
    })?;

    let head = String::from_utf8_lossy(&buf[..header_end]);
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let content_length: usize = lines
        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest { method, target, body })
}

fn parse_dns_message(req: &HttpRequest) -> Option<Vec<u8>> {
    match req.method.as_str() {
        "POST" => Some(req.body.clone()),
        "GET" => {
            let query = req.target.split_once('?').map(|(_, q)| q)?;
            let encoded = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("dns="))?;
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(encoded)
                .ok()
        }
        _ => None,
    }
}

async fn write_dns_response<S>(stream: &mut S, wire: &[u8]) -> std::io::Result<()>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/dns-message\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        wire.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(wire).await?;
    stream.flush().await
}

async fn write_response<S>(stream: &mut S, status: u16, reason: &str, body: &[u8]) -> std::io::Result<()>
where
    S: tokio::io::AsyncWrite + Unpin,
{
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await
}
