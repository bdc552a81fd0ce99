//! SparkSDR WebSocket spot stream.
//!
//! SparkSDR exposes a WebSocket at `ws://<host>:<port>/Spark`. After a
//! `subscribeToSpots` command it pushes JSON text frames shaped like
//! `{ "spots": [ { "snr": .., "dt": .., "msg": .., "tunedfrequency": ..,
//! "frequency": .., "mode": .. }, ... ] }`. Frames without a `spots` array
//! (command acknowledgements and the like) are reported as `None` by
//! [`parse_frame`] so callers can log and skip them.
//!
//! # Example
//!
//! ```rust,ignore
//! use skimmer_api::sparksdr::{spark_url, parse_frame, SparkConnection};
//!
//! let url = spark_url("127.0.0.1", 4649)?;
//! let mut conn = SparkConnection::connect(&url).await?;
//!
//! while let Some(text) = conn.next_text().await? {
//!     if let Ok(Some(spots)) = parse_frame(&text) {
//!         for spot in spots {
//!             println!("{} {}", spot.snr_db(), spot.msg);
//!         }
//!     }
//! }
//! ```

use std::net::Ipv6Addr;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;

/// Fixed endpoint path of the SparkSDR server.
pub const SPARK_PATH: &str = "/Spark";

/// Sent once right after the socket opens.
pub const SUBSCRIBE_COMMAND: &str = r#"{"cmd":"subscribeToSpots","Enable":true}"#;

/// Build the SparkSDR WebSocket URL for a host and port.
pub fn spark_url(address: &str, port: u16) -> Result<Url, Error> {
    let host = match address.parse::<Ipv6Addr>() {
        Ok(v6) => format!("[{v6}]"),
        Err(_) => address.to_owned(),
    };
    Ok(Url::parse(&format!("ws://{host}:{port}{SPARK_PATH}"))?)
}

// ── SparkSpot ────────────────────────────────────────────────────────

/// One element of a frame's `spots` array.
///
/// SparkSDR sends every number as a JSON number that may carry a
/// fraction, so all numeric fields are read as `f64`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SparkSpot {
    pub snr: f64,
    /// Time offset in seconds.
    pub dt: f64,
    /// Decoded text.
    pub msg: String,
    /// Receiver dial frequency in Hz.
    pub tunedfrequency: f64,
    /// Absolute frequency of the decoded signal in Hz.
    pub frequency: f64,
    pub mode: String,
}

impl SparkSpot {
    /// SNR truncated to whole dB.
    #[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
    pub fn snr_db(&self) -> i32 {
        self.snr as i32
    }

    /// Dial frequency in whole Hz.
    #[allow(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn dial_frequency(&self) -> u64 {
        self.tunedfrequency as u64
    }

    /// Signal offset from the dial frequency in whole Hz.
    #[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
    pub fn delta_frequency(&self) -> i64 {
        (self.frequency - self.tunedfrequency) as i64
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SparkEnvelope {
    #[serde(default)]
    spots: Option<Vec<serde_json::Value>>,
}

/// Parse a text frame.
///
/// Returns `Ok(None)` when the frame has no `spots` array. Array elements
/// missing a required field are logged and dropped; the rest of the frame
/// is still returned.
pub fn parse_frame(text: &str) -> Result<Option<Vec<SparkSpot>>, Error> {
    let envelope: SparkEnvelope =
        serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })?;

    let Some(raw) = envelope.spots else {
        return Ok(None);
    };

    let spots = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<SparkSpot>(value) {
            Ok(spot) => Some(spot),
            Err(e) => {
                warn!(error = %e, "unable to extract required SparkSDR spot parameters");
                None
            }
        })
        .collect();

    Ok(Some(spots))
}

// ── SparkConnection ──────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One open, subscribed SparkSDR WebSocket.
///
/// Does not reconnect on its own: when the server goes away
/// [`next_text`](Self::next_text) returns `Ok(None)` and the owner decides
/// what happens next.
pub struct SparkConnection {
    stream: WsStream,
}

impl SparkConnection {
    /// Open the socket and send the spot subscription.
    pub async fn connect(url: &Url) -> Result<Self, Error> {
        info!(url = %url, "connecting to SparkSDR");

        let (mut stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        stream
            .send(Message::text(SUBSCRIBE_COMMAND))
            .await
            .map_err(|e| Error::WebSocketConnect(format!("subscription failed: {e}")))?;

        info!("SparkSDR connection established, subscribed to spots");
        Ok(Self { stream })
    }

    /// Wait for the next text frame.
    ///
    /// `Ok(None)` means the server closed the socket or the stream ended.
    pub async fn next_text(&mut self) -> Result<Option<String>, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "SparkSDR frame");
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite answers pings automatically
                    trace!("SparkSDR ping");
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        info!(code = %cf.code, reason = %cf.reason, "SparkSDR close frame received");
                    } else {
                        info!("SparkSDR close frame received (no payload)");
                    }
                    return Ok(None);
                }
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
                None => {
                    info!("SparkSDR stream ended");
                    return Ok(None);
                }
                Some(Ok(_)) => {
                    // Binary, Pong, Frame -- ignore
                }
            }
        }
    }

    /// Send a close frame. Errors are irrelevant at this point.
    pub async fn close(&mut self) {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => {}
            Err(e) => debug!(error = %e, "SparkSDR close failed"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_spark_url() {
        let url = spark_url("127.0.0.1", 4649).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:4649/Spark");

        let url = spark_url("sdr.local", 2237).unwrap();
        assert_eq!(url.host_str(), Some("sdr.local"));
    }

    #[test]
    fn brackets_ipv6_hosts() {
        let url = spark_url("::1", 4649).unwrap();
        assert_eq!(url.as_str(), "ws://[::1]:4649/Spark");
    }

    #[test]
    fn parses_spots_frame() {
        let raw = serde_json::json!({
            "cmd": "spotResponse",
            "spots": [{
                "snr": -7.0,
                "dt": 0.25,
                "msg": "SOTAMAT W1A/P",
                "tunedfrequency": 14_074_000.0,
                "frequency": 14_075_520.0,
                "mode": "FT8",
                "receiver": 0
            }]
        });

        let spots = parse_frame(&raw.to_string()).unwrap().unwrap();
        assert_eq!(spots.len(), 1);
        let spot = &spots[0];
        assert_eq!(spot.snr_db(), -7);
        assert_eq!(spot.dial_frequency(), 14_074_000);
        assert_eq!(spot.delta_frequency(), 1520);
        assert_eq!(spot.msg, "SOTAMAT W1A/P");
    }

    #[test]
    fn frame_without_spots_is_none() {
        let raw = serde_json::json!({ "cmd": "subscribeToSpotsResponse", "Enable": true });
        assert!(parse_frame(&raw.to_string()).unwrap().is_none());
    }

    #[test]
    fn incomplete_spot_is_dropped_rest_kept() {
        let raw = serde_json::json!({
            "spots": [
                { "snr": 3, "dt": 0.1, "msg": "CQ AB6D CN89" },
                {
                    "snr": 3, "dt": 0.1, "msg": "CQ K1ABC FN42",
                    "tunedfrequency": 7_074_000, "frequency": 7_074_900, "mode": "FT8"
                }
            ]
        });

        let spots = parse_frame(&raw.to_string()).unwrap().unwrap();
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].msg, "CQ K1ABC FN42");
    }

    #[test]
    fn malformed_json_is_error() {
        let result = parse_frame("not json at all");
        assert!(matches!(result, Err(Error::Deserialization { .. })));
    }

    #[test]
    fn snr_truncates_toward_zero() {
        let spot = SparkSpot {
            snr: -7.9,
            dt: 0.0,
            msg: String::new(),
            tunedfrequency: 0.0,
            frequency: 0.0,
            mode: String::new(),
        };
        assert_eq!(spot.snr_db(), -7);
    }
}
