//! Failure notifications emitted by the proxy engine

use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// A raw transport session ended abnormally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportFailure {
    /// SNI announced by the client, if any
    pub server_name: Option<String>,
    /// The engine's error description
    pub error: Option<String>,
}

impl TransportFailure {
    pub fn new(server_name: Option<String>, error: Option<String>) -> Self {
        Self { server_name, error }
    }

    /// Whether the error description names a TLS-layer failure
    pub fn is_tls_error(&self) -> bool {
        self.error
            .as_deref()
            .is_some_and(|msg| msg.to_ascii_uppercase().contains("TLS"))
    }

    pub fn server_name(&self) -> Option<&str> {
        non_empty(self.server_name.as_deref())
    }
}

/// Negotiation state attached to a failed handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationContext {
    /// Server name recorded on the upstream side of the negotiation
    pub server_name: Option<String>,
}

/// A TLS handshake failed, possibly before a transport session existed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeFailure {
    /// Explicit server-name hint
    pub server_name: Option<String>,
    pub context: Option<NegotiationContext>,
    /// Address of the server the proxy tried to reach
    pub peer: Option<IpAddr>,
}

/// Who a handshake failure should be attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerIdentity {
    Hostname(String),
    /// Much coarser than a hostname; used only when nothing better is known
    PeerIp(IpAddr),
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerIdentity::Hostname(host) => f.write_str(host),
            ServerIdentity::PeerIp(ip) => write!(f, "{}", ip),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("no server name, negotiation context or peer address available")]
    NoIdentity,
}

impl HandshakeFailure {
    /// Resolve the server identity: hint, then context, then peer IP
    pub fn identity(&self) -> Result<ServerIdentity, ExtractionError> {
        if let Some(name) = non_empty(self.server_name.as_deref()) {
            return Ok(ServerIdentity::Hostname(name.to_string()));
        }

        let context_name = self
            .context
            .as_ref()
            .and_then(|ctx| non_empty(ctx.server_name.as_deref()));
        if let Some(name) = context_name {
            return Ok(ServerIdentity::Hostname(name.to_string()));
        }

        self.peer
            .map(ServerIdentity::PeerIp)
            .ok_or(ExtractionError::NoIdentity)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
