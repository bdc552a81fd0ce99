// ── Upstream sources ──
//
// A source yields canonical events from one open upstream connection.
// A connector opens a fresh source per connection attempt, so the
// supervisor can be written once against both decoders.

mod sparksdr;
mod wsjtx;

use async_trait::async_trait;

use crate::config::{SkimmerConfig, TransportMode};
use crate::error::CoreError;
use crate::model::InboundEvent;

pub use sparksdr::{SparkSdrConnector, SparkSdrSource, events_from_frame};
pub use wsjtx::{WsjtxConnector, WsjtxSource, event_from_message};

/// One open upstream connection.
#[async_trait]
pub trait SpotSource: Send {
    /// Wait for the next canonical event.
    ///
    /// `Ok(None)` is a normal end of stream (peer closed). `Err` is a
    /// transport failure; undecodable frames are skipped internally and
    /// never end the stream.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, CoreError>;

    /// Release the underlying transport.
    async fn close(&mut self) {}
}

/// Opens sources on demand.
#[async_trait]
pub trait SourceConnector: Send + Sync + 'static {
    /// Human-readable endpoint, used in log lines.
    fn describe(&self) -> String;

    /// Open a new source. Failure to bind or connect is reported as
    /// [`CoreError::TransportUnavailable`].
    async fn connect(&self) -> Result<Box<dyn SpotSource>, CoreError>;
}

// ── UpstreamConnector ────────────────────────────────────────────────

/// The connector selected by configuration.
#[derive(Debug, Clone)]
pub enum UpstreamConnector {
    Wsjtx(WsjtxConnector),
    SparkSdr(SparkSdrConnector),
}

impl UpstreamConnector {
    pub fn from_config(config: &SkimmerConfig) -> Result<Self, CoreError> {
        match config.transport {
            TransportMode::Unicast | TransportMode::Multicast => {
                let address = config.address.parse().map_err(|e| CoreError::Config {
                    message: format!("WSJT-X address '{}' is not an IP address: {e}", config.address),
                })?;
                Ok(Self::Wsjtx(WsjtxConnector::new(
                    address,
                    config.port,
                    config.transport == TransportMode::Multicast,
                )))
            }
            TransportMode::WebSocket => Ok(Self::SparkSdr(SparkSdrConnector::new(
                &config.address,
                config.port,
            )?)),
        }
    }
}

#[async_trait]
impl SourceConnector for UpstreamConnector {
    fn describe(&self) -> String {
        match self {
            Self::Wsjtx(c) => c.describe(),
            Self::SparkSdr(c) => c.describe(),
        }
    }

    async fn connect(&self) -> Result<Box<dyn SpotSource>, CoreError> {
        match self {
            Self::Wsjtx(c) => c.connect().await,
            Self::SparkSdr(c) => c.connect().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use url::Url;

    use super::*;

    fn config(transport: TransportMode, address: &str) -> SkimmerConfig {
        let password: SecretString = "pw".to_string().into();
        let mut cfg = SkimmerConfig::new(
            "AB6D",
            password,
            "CM97",
            Url::parse("https://sotamat.com").unwrap(),
        );
        cfg.transport = transport;
        cfg.address = address.into();
        cfg
    }

    #[test]
    fn selects_wsjtx_for_udp_modes() {
        let c = UpstreamConnector::from_config(&config(TransportMode::Multicast, "224.0.0.1")).unwrap();
        assert!(matches!(c, UpstreamConnector::Wsjtx(_)));
        assert_eq!(c.describe(), "WSJT-X multicast 224.0.0.1:2237");
    }

    #[test]
    fn selects_sparksdr_for_websocket() {
        let c = UpstreamConnector::from_config(&config(TransportMode::WebSocket, "localhost")).unwrap();
        assert!(matches!(c, UpstreamConnector::SparkSdr(_)));
        assert_eq!(c.describe(), "SparkSDR ws://localhost:2237/Spark");
    }

    #[test]
    fn udp_requires_ip_literal() {
        let err = UpstreamConnector::from_config(&config(TransportMode::Unicast, "localhost")).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
