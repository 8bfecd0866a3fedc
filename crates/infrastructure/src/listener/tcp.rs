use sentinel_dns_application::pipeline::QueryPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

const REPLY_QUEUE_DEPTH: usize = 32;

/// Accept loop for one TCP listen address. Each connection stays open for
/// `read_timeout`, serving any number of length-prefixed queries; every
/// query is handled by its own task so a slow pipeline.handle() for one
/// query never blocks reading the next. Replies are written in completion
/// order via a per-connection channel into a single writer task, so writes
/// to the socket are never interleaved.
pub async fn serve(
    listener: TcpListener,
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
                    warn!(error = %e, "tcp accept failed");
                    continue;
                }
            },
        };
        let pipeline = pipeline.clone();
        let tracker_inner = tracker.clone();
        tracker.spawn(async move {
            if let Err(e) = serve_connection(stream, pipeline, read_timeout, tracker_inner).await {
                debug!(peer = %peer, error = %e, "tcp connection closed");
            }
        });
    }
}

async fn serve_connection(
    stream: TcpStream,
    pipeline: Arc<QueryPipeline>,
    read_timeout: Duration,
    tracker: TaskTracker,
) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
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

async fn read_queries(
    reader: &mut tokio::net::tcp::OwnedReadHalf,
    read_timeout: Duration,
    pipeline: &Arc<QueryPipeline>,
    tracker: &TaskTracker,
    tx: &mpsc::Sender<Vec<u8>>,
) -> std::io::Result<()> {
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
