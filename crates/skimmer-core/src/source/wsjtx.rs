// WSJT-X UDP source: binds the socket per attempt and turns datagrams
// into canonical events.

use std::net::IpAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use skimmer_api::wsjtx::{self, MAX_DATAGRAM_SIZE, WsjtxMessage};

use super::{SourceConnector, SpotSource};
use crate::error::CoreError;
use crate::model::{InboundEvent, LinkStatus, ReceptionSpot};

/// Map a decoded WSJT-X message to a canonical event.
///
/// Heartbeat and Status prove liveness; Decode carries a spot. Close and
/// unhandled types produce nothing.
pub fn event_from_message(message: WsjtxMessage) -> Option<InboundEvent> {
    match message {
        WsjtxMessage::Heartbeat(_) => Some(InboundEvent::Status(LinkStatus::pulse())),
        WsjtxMessage::Status(status) => Some(InboundEvent::Status(LinkStatus {
            dial_frequency: Some(status.dial_frequency),
            mode: Some(status.mode),
        })),
        WsjtxMessage::Decode(decode) => Some(InboundEvent::Spot(ReceptionSpot {
            snr: decode.snr,
            delta_time: decode.delta_time,
            delta_frequency: i64::from(decode.delta_frequency),
            mode: decode.mode,
            message: decode.message,
        })),
        WsjtxMessage::Close { id } => {
            info!(client = %id, "WSJT-X announced it is closing");
            None
        }
        WsjtxMessage::Other { .. } => None,
    }
}

// ── Connector ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WsjtxConnector {
    address: IpAddr,
    port: u16,
    multicast: bool,
}

impl WsjtxConnector {
    pub fn new(address: IpAddr, port: u16, multicast: bool) -> Self {
        Self {
            address,
            port,
            multicast,
        }
    }
}

#[async_trait]
impl SourceConnector for WsjtxConnector {
    fn describe(&self) -> String {
        let kind = if self.multicast { "multicast" } else { "UDP" };
        format!("WSJT-X {kind} {}:{}", self.address, self.port)
    }

    async fn connect(&self) -> Result<Box<dyn SpotSource>, CoreError> {
        let socket = wsjtx::bind_socket(self.address, self.port, self.multicast).await?;
        Ok(Box::new(WsjtxSource::new(socket)))
    }
}

// ── Source ───────────────────────────────────────────────────────────

pub struct WsjtxSource {
    socket: Option<UdpSocket>,
    buf: Vec<u8>,
}

impl WsjtxSource {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket: Some(socket),
            buf: vec![0; MAX_DATAGRAM_SIZE],
        }
    }
}

#[async_trait]
impl SpotSource for WsjtxSource {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, CoreError> {
        loop {
            let Some(socket) = self.socket.as_ref() else {
                return Ok(None);
            };

            let (len, from) = socket
                .recv_from(&mut self.buf)
                .await
                .map_err(|e| CoreError::from(skimmer_api::Error::UdpReceive(e)))?;

            let datagram = self.buf.get(..len).unwrap_or_default();
            match wsjtx::decode(datagram) {
                Ok(message) => {
                    if let Some(event) = event_from_message(message) {
                        return Ok(Some(event));
                    }
                }
                Err(e) => {
                    warn!(%from, len, error = %e, "skipping undecodable WSJT-X datagram");
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("WSJT-X UDP socket released");
        }
    }
}
