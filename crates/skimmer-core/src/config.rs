// ── Runtime skimmer configuration ──
//
// Describes *what* to watch and *where* to report. Built by the binary
// from the config crate's layered sources; the core never reads files
// or the environment itself.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 2237;
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_HEARTBEAT_CHECK: Duration = Duration::from_secs(10);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the upstream decoder is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// WSJT-X datagrams sent to one exclusive UDP port.
    #[default]
    Unicast,
    /// WSJT-X datagrams on a shared multicast group.
    Multicast,
    /// SparkSDR spot push over a WebSocket.
    WebSocket,
}

impl TransportMode {
    /// Name of the decoder program on the other end.
    pub fn source_name(self) -> &'static str {
        match self {
            Self::Unicast | Self::Multicast => "WSJT-X",
            Self::WebSocket => "SparkSDR",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unicast => "direct UDP",
            Self::Multicast => "multicast UDP",
            Self::WebSocket => "websocket",
        })
    }
}

/// Everything the supervisor and dispatcher need for one process run.
#[derive(Debug, Clone)]
pub struct SkimmerConfig {
    /// Operator callsign, doubles as the SOTAmat account name.
    pub callsign: String,
    pub password: SecretString,
    /// Maidenhead locator of the receiving antenna.
    pub gridsquare: String,
    /// Host the decoder listens on (UDP modes: an IP literal).
    pub address: String,
    pub port: u16,
    pub transport: TransportMode,
    /// SOTAmat server root.
    pub api_url: Url,
    pub request_timeout: Duration,
    /// Silence longer than this forces a reconnect.
    pub heartbeat_timeout: Duration,
    /// Fixed pause between a disconnect and the next attempt.
    pub reconnect_interval: Duration,
    /// Period of the liveness check.
    pub heartbeat_check_interval: Duration,
    /// How long teardown waits for the read worker to exit.
    pub shutdown_grace: Duration,
    /// Echo every decoded message, not just the relayed ones.
    pub debug: bool,
    /// Log every inbound protocol event.
    pub log_frames: bool,
}

impl SkimmerConfig {
    /// Config with the given identity and default connection tuning.
    pub fn new(
        callsign: impl Into<String>,
        password: SecretString,
        gridsquare: impl Into<String>,
        api_url: Url,
    ) -> Self {
        Self {
            callsign: callsign.into(),
            password,
            gridsquare: gridsquare.into(),
            address: DEFAULT_ADDRESS.into(),
            port: DEFAULT_PORT,
            transport: TransportMode::default(),
            api_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            heartbeat_check_interval: DEFAULT_HEARTBEAT_CHECK,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            debug: false,
            log_frames: false,
        }
    }

    /// One-line summary for the banner and the per-attempt log line.
    pub fn describe_link(&self) -> String {
        format!(
            "{} to {} via {} at {}:{} with grid {}",
            self.callsign,
            self.transport.source_name(),
            self.transport,
            self.address,
            self.port,
            self.gridsquare
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SkimmerConfig {
        SkimmerConfig::new(
            "AB6D",
            "pw".to_string().into(),
            "CM97",
            Url::parse("https://sotamat.com").unwrap(),
        )
    }

    #[test]
    fn defaults_match_wsjtx_unicast() {
        let cfg = config();
        assert_eq!(cfg.transport, TransportMode::Unicast);
        assert_eq!(cfg.port, 2237);
        assert_eq!(cfg.address, "127.0.0.1");
        assert_eq!(cfg.heartbeat_timeout, Duration::from_secs(30));
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(15));
    }

    #[test]
    fn describes_sparksdr_link() {
        let mut cfg = config();
        cfg.transport = TransportMode::WebSocket;
        cfg.port = 4649;
        assert_eq!(
            cfg.describe_link(),
            "AB6D to SparkSDR via websocket at 127.0.0.1:4649 with grid CM97"
        );
    }
}
