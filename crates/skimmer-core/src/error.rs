// ── Core error types ──
//
// Errors surfaced by skimmer-core. The `From<skimmer_api::Error>` impl
// sorts protocol and HTTP failures into the categories the supervisor
// acts on: transport unavailable, transport failed mid-stream, bad event,
// rejected submission.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Upstream link ────────────────────────────────────────────────
    /// The upstream source could not be opened at all.
    #[error("Cannot open {endpoint}: {reason}")]
    TransportUnavailable {
        endpoint: String,
        multicast: bool,
        reason: String,
    },

    /// An open source failed while reading.
    #[error("Upstream transport failed: {reason}")]
    TransportFailed { reason: String },

    /// One inbound frame could not be understood.
    #[error("Malformed inbound event: {reason}")]
    MalformedEvent { reason: String },

    // ── SOTAmat server ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Submission failed: {message}")]
    SubmissionFailed {
        message: String,
        /// HTTP status code (if the server answered).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for bind/connect failures.
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable { .. })
    }

    /// Returns `true` when the failure was joining a multicast group.
    pub fn is_multicast_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable {
                multicast: true,
                ..
            }
        )
    }
}

// ── Conversion from protocol-layer errors ────────────────────────────

impl From<skimmer_api::Error> for CoreError {
    fn from(err: skimmer_api::Error) -> Self {
        use skimmer_api::Error as Api;

        match err {
            Api::Authentication { status, body } => CoreError::AuthenticationFailed {
                message: if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
            },
            Api::Rejected { status, body } => CoreError::SubmissionFailed {
                message: body,
                status: Some(status),
            },
            Api::Transport(e) => CoreError::SubmissionFailed {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            Api::UdpBind {
                address,
                port,
                multicast,
                source,
            } => CoreError::TransportUnavailable {
                endpoint: format!("UDP {address}:{port}"),
                multicast,
                reason: source.to_string(),
            },
            Api::WebSocketConnect(reason) => CoreError::TransportUnavailable {
                endpoint: "SparkSDR websocket".into(),
                multicast: false,
                reason,
            },
            Api::UdpReceive(e) => CoreError::TransportFailed {
                reason: e.to_string(),
            },
            Api::WebSocket(reason) => CoreError::TransportFailed { reason },
            Api::Frame { reason } => CoreError::MalformedEvent { reason },
            Api::Deserialization { message, .. } => CoreError::MalformedEvent { reason: message },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            Api::HttpClient(message) => CoreError::Config { message },
        }
    }
}
