use crate::upstream::Protocol;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub address: String,
    pub protocol: Protocol,
    #[serde(default)]
    pub reuseport: bool,
    /// TLS cert/key paths for `Protocol::Tls`; certificate acquisition is an
    /// external collaborator, this just names the files to load.
    #[serde(default)]
    pub tls_cert_path: Option<String>,
    #[serde(default)]
    pub tls_key_path: Option<String>,
}
