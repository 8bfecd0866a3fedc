use async_trait::async_trait;
use sentinel_dns_domain::upstream::Protocol;
use sentinel_dns_domain::{DomainError, UpstreamDescriptor};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Send one DNS wire query and return the raw wire response (C7).
#[async_trait]
pub trait DnsClient: Send + Sync {
    async fn send(&self, wire: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError>;
}

pub struct UdpClient {
    addr: String,
}

impl UdpClient {
    pub fn new(addr: String) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl DnsClient for UdpClient {
    async fn send(&self, wire: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError> {
        let bind_addr = if self.addr.contains(']') || self.addr.matches(':').count() > 1 {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| protocol_error(&self.addr, &e.to_string()))?;

        tokio::time::timeout(timeout, socket.send_to(wire, &self.addr))
            .await
            .map_err(|_| timeout_error(&self.addr, timeout))?
            .map_err(|e| protocol_error(&self.addr, &e.to_string()))?;

        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let (len, _from) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| timeout_error(&self.addr, timeout))?
            .map_err(|e| protocol_error(&self.addr, &e.to_string()))?;
        buf.truncate(len);
        debug!(upstream = %self.addr, bytes = len, "udp response received");
        Ok(buf)
    }
}

pub struct TcpClient {
    addr: String,
}

impl TcpClient {
    pub fn new(addr: String) -> Self {
        Self { addr }
    }
}

/// Write a 2-byte length-prefixed DNS message and read the length-prefixed
/// reply, per RFC 1035 §4.2.2.
pub async fn exchange_length_prefixed<S>(
    stream: &mut S,
    wire: &[u8],
    timeout: Duration,
    peer: &str,
) -> Result<Vec<u8>, DomainError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let len = u16::try_from(wire.len())
        .map_err(|_| DomainError::UpstreamProtocol { upstream: peer.to_string(), message: "query too large for TCP framing".into() })?;
    let fut = async {
        stream.write_all(&len.to_be_bytes()).await?;
        stream.write_all(wire).await?;
        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await?;
        let reply_len = u16::from_be_bytes(len_buf) as usize;
        let mut reply = vec![0u8; reply_len];
        stream.read_exact(&mut reply).await?;
        Ok::<Vec<u8>, std::io::Error>(reply)
    };
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| timeout_error(peer, timeout))?
        .map_err(|e| protocol_error(peer, &e.to_string()))
}

#[async_trait]
impl DnsClient for TcpClient {
    async fn send(&self, wire: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError> {
        let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| timeout_error(&self.addr, timeout))?
            .map_err(|e| protocol_error(&self.addr, &e.to_string()))?;
        exchange_length_prefixed(&mut stream, wire, timeout, &self.addr).await
    }
}

fn timeout_error(upstream: &str, elapsed: Duration) -> DomainError {
    DomainError::UpstreamTimeout {
        upstream: upstream.to_string(),
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

fn protocol_error(upstream: &str, message: &str) -> DomainError {
    DomainError::UpstreamProtocol {
        upstream: upstream.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "dns-over-tls")]
pub mod tls {
    use super::*;
    use std::sync::Arc;
    use tokio_rustls::rustls::pki_types::ServerName;
    use tokio_rustls::rustls::{ClientConfig, RootCertStore};
    use tokio_rustls::TlsConnector;

    pub struct TlsClient {
        addr: String,
        sni: String,
        connector: TlsConnector,
    }

    impl TlsClient {
        pub fn new(addr: String, sni: String) -> Self {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let config = ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();
            Self {
                addr,
                sni,
                connector: TlsConnector::from(Arc::new(config)),
            }
        }
    }

    #[async_trait]
    impl DnsClient for TlsClient {
        async fn send(&self, wire: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError> {
            let tcp = tokio::time::timeout(timeout, TcpStream::connect(&self.addr))
                .await
                .map_err(|_| timeout_error(&self.addr, timeout))?
                .map_err(|e| protocol_error(&self.addr, &e.to_string()))?;
            let server_name = ServerName::try_from(self.sni.clone())
                .map_err(|e| protocol_error(&self.addr, &format!("invalid SNI: {e}")))?;
            let mut stream = tokio::time::timeout(timeout, self.connector.connect(server_name, tcp))
                .await
                .map_err(|_| timeout_error(&self.addr, timeout))?
                .map_err(|e| protocol_error(&self.addr, &format!("TLS handshake failed: {e}")))?;
            exchange_length_prefixed(&mut stream, wire, timeout, &self.addr).await
        }
    }
}

#[cfg(feature = "dns-over-https")]
pub mod https {
    use super::*;
    use base64::Engine;
    use std::sync::Arc;
    use tokio_rustls::rustls::pki_types::ServerName;
    use tokio_rustls::rustls::{ClientConfig, RootCertStore};
    use tokio_rustls::TlsConnector;

    /// Minimal RFC 8484 DoH client: a hand-rolled HTTP/1.1 POST over TLS. No
    /// general-purpose HTTP stack is pulled in since this is the only HTTP
    /// traffic this crate ever originates.
    pub struct HttpsClient {
        host: String,
        port: u16,
        path: String,
        connector: TlsConnector,
    }

    impl HttpsClient {
        /// `url` is a `https://host[:port]/path` DoH endpoint.
        pub fn new(url: &str) -> Result<Self, DomainError> {
            let rest = url
                .strip_prefix("https://")
                .ok_or_else(|| protocol_error(url, "DoH url must start with https://"))?;
            let (authority, path) = rest.split_once('/').map_or((rest, ""), |(a, p)| (a, p));
            let (host, port) = authority
                .split_once(':')
                .map(|(h, p)| (h.to_string(), p.parse().unwrap_or(443)))
                .unwrap_or_else(|| (authority.to_string(), 443));
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let config = ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();
            Ok(Self {
                host,
                port,
                path: format!("/{path}"),
                connector: TlsConnector::from(Arc::new(config)),
            })
        }
    }

    #[async_trait]
    impl DnsClient for HttpsClient {
        async fn send(&self, wire: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError> {
            let peer = format!("{}:{}", self.host, self.port);
            let tcp = tokio::time::timeout(timeout, TcpStream::connect(&peer))
                .await
                .map_err(|_| timeout_error(&peer, timeout))?
                .map_err(|e| protocol_error(&peer, &e.to_string()))?;
            let server_name = ServerName::try_from(self.host.clone())
                .map_err(|e| protocol_error(&peer, &format!("invalid SNI: {e}")))?;
            let mut stream = tokio::time::timeout(timeout, self.connector.connect(server_name, tcp))
                .await
                .map_err(|_| timeout_error(&peer, timeout))?
                .map_err(|e| protocol_error(&peer, &format!("TLS handshake failed: {e}")))?;

            let request = format!(
                "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/dns-message\r\nAccept: application/dns-message\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                self.path,
                self.host,
                wire.len(),
            );

            let fut = async {
                stream.write_all(request.as_bytes()).await?;
                stream.write_all(wire).await?;
                let mut response = Vec::new();
                stream.read_to_end(&mut response).await?;
                Ok::<Vec<u8>, std::io::Error>(response)
            };
            let response = tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| timeout_error(&peer, timeout))?
                .map_err(|e| protocol_error(&peer, &e.to_string()))?;

            parse_http_body(&response).ok_or_else(|| protocol_error(&peer, "malformed DoH HTTP response"))
        }
    }

    fn parse_http_body(response: &[u8]) -> Option<Vec<u8>> {
        let header_end = response.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
        Some(response[header_end..].to_vec())
    }

    #[allow(dead_code)]
    fn encode_base64url(bytes: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Enum-dispatched client so the hot path avoids a vtable call.
pub enum Transport {
    Udp(UdpClient),
    Tcp(TcpClient),
    #[cfg(feature = "dns-over-tls")]
    Tls(tls::TlsClient),
    #[cfg(feature = "dns-over-https")]
    Https(https::HttpsClient),
}

impl Transport {
    pub async fn send(&self, wire: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError> {
        match self {
            Transport::Udp(c) => c.send(wire, timeout).await,
            Transport::Tcp(c) => c.send(wire, timeout).await,
            #[cfg(feature = "dns-over-tls")]
            Transport::Tls(c) => c.send(wire, timeout).await,
            #[cfg(feature = "dns-over-https")]
            Transport::Https(c) => c.send(wire, timeout).await,
        }
    }
}

pub fn create_transport(descriptor: &UpstreamDescriptor) -> Result<Transport, DomainError> {
    match descriptor.protocol {
        Protocol::Udp => Ok(Transport::Udp(UdpClient::new(descriptor.address.clone()))),
        Protocol::Tcp => Ok(Transport::Tcp(TcpClient::new(descriptor.address.clone()))),
        Protocol::Tls => {
            #[cfg(feature = "dns-over-tls")]
            {
                let sni = descriptor
                    .address
                    .rsplit_once(':')
                    .map(|(host, _)| host.to_string())
                    .unwrap_or_else(|| descriptor.address.clone());
                Ok(Transport::Tls(tls::TlsClient::new(descriptor.address.clone(), sni)))
            }
            #[cfg(not(feature = "dns-over-tls"))]
            {
                Err(DomainError::ConfigMissing(format!(
                    "upstream {} requires protocol tls but dns-over-tls feature is disabled",
                    descriptor.name
                )))
            }
        }
        Protocol::Https => {
            #[cfg(feature = "dns-over-https")]
            {
                https::HttpsClient::new(&descriptor.address).map(Transport::Https)
            }
            #[cfg(not(feature = "dns-over-https"))]
            {
                Err(DomainError::ConfigMissing(format!(
                    "upstream {} requires protocol https but dns-over-https feature is disabled",
                    descriptor.name
                )))
            }
        }
    }
}
