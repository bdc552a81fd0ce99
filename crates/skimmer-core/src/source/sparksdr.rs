// SparkSDR WebSocket source. Each spot in a frame is preceded by a status
// event so the session's dial frequency and mode follow the spot that
// carried them.

use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use skimmer_api::sparksdr::{self, SparkConnection, SparkSpot};

use super::{SourceConnector, SpotSource};
use crate::error::CoreError;
use crate::model::{InboundEvent, LinkStatus, ReceptionSpot};

/// Map one text frame to canonical events.
///
/// Every frame that parses as JSON leads with a liveness pulse, so a
/// quiet band still keeps the link alive. Frames that are not JSON are
/// logged and produce nothing.
pub fn events_from_frame(text: &str) -> Vec<InboundEvent> {
    let pulse = InboundEvent::Status(LinkStatus::pulse());
    match sparksdr::parse_frame(text) {
        Ok(Some(spots)) => std::iter::once(pulse)
            .chain(spots.into_iter().flat_map(spot_events))
            .collect(),
        Ok(None) => {
            warn!("SparkSDR frame has no spots array, ignoring");
            vec![pulse]
        }
        Err(e) => {
            let e = CoreError::from(e);
            warn!(error = %e, "ignoring unreadable SparkSDR frame");
            Vec::new()
        }
    }
}

fn spot_events(spot: SparkSpot) -> [InboundEvent; 2] {
    let status = LinkStatus {
        dial_frequency: Some(spot.dial_frequency()),
        mode: Some(spot.mode.clone()),
    };
    let reception = ReceptionSpot {
        snr: spot.snr_db(),
        delta_time: spot.dt,
        delta_frequency: spot.delta_frequency(),
        mode: spot.mode,
        message: spot.msg,
    };
    [InboundEvent::Status(status), InboundEvent::Spot(reception)]
}

// ── Connector ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SparkSdrConnector {
    url: Url,
}

impl SparkSdrConnector {
    pub fn new(address: &str, port: u16) -> Result<Self, CoreError> {
        let url = sparksdr::spark_url(address, port).map_err(|e| CoreError::Config {
            message: format!("SparkSDR address '{address}': {e}"),
        })?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SourceConnector for SparkSdrConnector {
    fn describe(&self) -> String {
        format!("SparkSDR {}", self.url)
    }

    async fn connect(&self) -> Result<Box<dyn SpotSource>, CoreError> {
        let conn = SparkConnection::connect(&self.url)
            .await
            .map_err(|e| CoreError::TransportUnavailable {
                endpoint: self.url.to_string(),
                multicast: false,
                reason: e.to_string(),
            })?;
        Ok(Box::new(SparkSdrSource::new(conn)))
    }
}

// ── Source ───────────────────────────────────────────────────────────

pub struct SparkSdrSource {
    conn: Option<SparkConnection>,
    pending: VecDeque<InboundEvent>,
}

impl SparkSdrSource {
    pub fn new(conn: SparkConnection) -> Self {
        Self {
            conn: Some(conn),
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl SpotSource for SparkSdrSource {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, CoreError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let Some(conn) = self.conn.as_mut() else {
                return Ok(None);
            };

            match conn.next_text().await? {
                Some(text) => self.pending.extend(events_from_frame(&text)),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
            debug!("SparkSDR websocket closed");
        }
        self.pending.clear();
    }
}
