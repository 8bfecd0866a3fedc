use sentinel_dns_application::pipeline::QueryPipeline;
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, warn};

const RECV_BUFFER_BYTES: usize = 8 * 1024 * 1024;
const SEND_BUFFER_BYTES: usize = 4 * 1024 * 1024;
const MAX_DATAGRAM: usize = 4096;

/// Binds a tuned UDP socket the way the teacher's DNS listener does: bigger
/// kernel buffers than the OS default, optional SO_REUSEPORT for sharding
/// load across acceptor tasks.
pub fn bind_tuned_udp(addr: SocketAddr, reuseport: bool) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::DGRAM, Some(SockProtocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    if reuseport {
        socket.set_reuse_port(true)?;
    }
    let _ = reuseport;
    socket.set_recv_buffer_size(RECV_BUFFER_BYTES)?;
    socket.set_send_buffer_size(SEND_BUFFER_BYTES)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Accept loop for one UDP listen address: read a datagram, spawn a worker
/// to run the pipeline, write the reply back to the originating peer. Exits
/// once `shutdown` fires; already-spawned workers keep running and are
/// drained by `tracker` from the caller.
pub async fn serve(socket: UdpSocket, pipeline: Arc<QueryPipeline>, tracker: TaskTracker, shutdown: CancellationToken) {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "udp recv_from failed");
                    continue;
                }
            },
        };
        let datagram = buf[..len].to_vec();
        let pipeline = pipeline.clone();
        let socket = socket.clone();
        tracker.spawn(async move {
            let result = pipeline.handle(&datagram, false).await;
            if let Err(e) = socket.send_to(&result.wire, peer).await {
                error!(peer = %peer, error = %e, "udp send_to failed");
            }
        });
    }
}
