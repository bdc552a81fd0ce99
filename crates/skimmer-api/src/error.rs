use thiserror::Error;

/// Top-level error type for the `skimmer-api` crate.
///
/// Covers every failure mode across the three surfaces this crate speaks:
/// the SOTAmat HTTPS API, the WSJT-X UDP protocol, and the SparkSDR
/// WebSocket. `skimmer-core` maps these into recovery decisions.
#[derive(Debug, Error)]
pub enum Error {
    // ── SOTAmat API ─────────────────────────────────────────────────
    /// Credential check rejected by the server.
    #[error("Authentication failed (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    /// Spot submission answered with a non-2xx status.
    #[error("Submission rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // ── WSJT-X UDP ──────────────────────────────────────────────────
    /// Binding the UDP port or joining the multicast group failed.
    #[error("Failed to bind UDP {address}:{port}: {source}")]
    UdpBind {
        address: String,
        port: u16,
        multicast: bool,
        #[source]
        source: std::io::Error,
    },

    /// Reading from an already-bound socket failed.
    #[error("UDP receive failed: {0}")]
    UdpReceive(#[source] std::io::Error),

    /// Datagram did not follow the WSJT-X framing rules.
    #[error("Malformed WSJT-X datagram: {reason}")]
    Frame { reason: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket read or write failed after the connection was up.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the upstream transport could not be established
    /// at all (as opposed to failing mid-stream).
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, Self::UdpBind { .. } | Self::WebSocketConnect(_))
    }

    /// HTTP status carried by a server-side rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Rejected { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_failure_is_transport_unavailable() {
        let err = Error::UdpBind {
            address: "127.0.0.1".into(),
            port: 2237,
            multicast: false,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.is_transport_unavailable());
        assert!(err.to_string().contains("127.0.0.1:2237"));
    }

    #[test]
    fn rejection_carries_status() {
        let err = Error::Rejected {
            status: 503,
            body: "maintenance".into(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_transport_unavailable());
    }
}
