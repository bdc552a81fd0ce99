//! WSJT-X UDP protocol: socket binding and datagram decoding.
//!
//! WSJT-X serializes its messages with Qt's `QDataStream` (big-endian).
//! Every datagram starts with the same header:
//!
//! ```text
//! ┌────────────┬────────────┬────────────┬──────────────────────┐
//! │ magic u32  │ schema u32 │ type u32   │ id utf8              │
//! │ 0xADBCCBDA │ 2 or 3     │ 0,1,2,6... │ u32 len + bytes      │
//! └────────────┴────────────┴────────────┴──────────────────────┘
//! ```
//!
//! Only the message types a spot relay cares about are decoded in full:
//! Heartbeat (0), Status (1), Decode (2) and Close (6). Everything else is
//! surfaced as [`WsjtxMessage::Other`] so callers can ignore it.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::Error;

/// Magic number opening every WSJT-X datagram.
pub const MAGIC: u32 = 0xADBC_CBDA;

/// Highest schema revision this decoder understands.
pub const MAX_SCHEMA: u32 = 3;

/// Largest datagram WSJT-X will ever send.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

const TYPE_HEARTBEAT: u32 = 0;
const TYPE_STATUS: u32 = 1;
const TYPE_DECODE: u32 = 2;
const TYPE_CLOSE: u32 = 6;

/// `QByteArray` length marking a null string.
const NULL_STRING: u32 = 0xFFFF_FFFF;

// ── Messages ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum WsjtxMessage {
    Heartbeat(HeartbeatMessage),
    Status(StatusMessage),
    Decode(DecodeMessage),
    Close { id: String },
    /// Any message type not decoded here.
    Other { id: String, message_type: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatMessage {
    pub id: String,
    pub max_schema: u32,
    pub version: String,
    pub revision: String,
}

/// Leading fields of a Status message. The remainder (DX call, TX flags,
/// grids, ...) is irrelevant to spotting and left unread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub id: String,
    /// Dial frequency in Hz.
    pub dial_frequency: u64,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeMessage {
    pub id: String,
    pub is_new: bool,
    /// Milliseconds since midnight UTC.
    pub time_ms: u32,
    pub snr: i32,
    /// Time offset in seconds.
    pub delta_time: f64,
    /// Audio offset from the dial frequency in Hz.
    pub delta_frequency: u32,
    pub mode: String,
    pub message: String,
    pub low_confidence: bool,
    pub off_air: bool,
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode one datagram.
pub fn decode(datagram: &[u8]) -> Result<WsjtxMessage, Error> {
    let mut r = Reader::new(datagram);

    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(frame_error(format!("bad magic 0x{magic:08X}")));
    }

    let schema = r.u32()?;
    if schema == 0 || schema > MAX_SCHEMA {
        return Err(frame_error(format!("unsupported schema {schema}")));
    }

    let message_type = r.u32()?;
    let id = r.utf8()?;

    let message = match message_type {
        TYPE_HEARTBEAT => WsjtxMessage::Heartbeat(HeartbeatMessage {
            id,
            max_schema: r.u32()?,
            // Older clients stop after the schema number.
            version: r.utf8_or_default()?,
            revision: r.utf8_or_default()?,
        }),
        TYPE_STATUS => WsjtxMessage::Status(StatusMessage {
            id,
            dial_frequency: r.u64()?,
            mode: r.utf8()?,
        }),
        TYPE_DECODE => WsjtxMessage::Decode(DecodeMessage {
            id,
            is_new: r.bool()?,
            time_ms: r.u32()?,
            snr: r.i32()?,
            delta_time: r.f64()?,
            delta_frequency: r.u32()?,
            mode: r.utf8()?,
            message: r.utf8()?,
            low_confidence: r.bool_or_default()?,
            off_air: r.bool_or_default()?,
        }),
        TYPE_CLOSE => WsjtxMessage::Close { id },
        other => WsjtxMessage::Other {
            id,
            message_type: other,
        },
    };

    Ok(message)
}

fn frame_error(reason: impl Into<String>) -> Error {
    Error::Frame {
        reason: reason.into(),
    }
}

/// Cursor over a `QDataStream` buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                frame_error(format!(
                    "truncated: wanted {n} bytes at offset {}, have {}",
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let buf: &'a [u8] = self.buf;
        let bytes = &buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn bool(&mut self) -> Result<bool, Error> {
        Ok(self.array::<1>()?[0] != 0)
    }

    fn bool_or_default(&mut self) -> Result<bool, Error> {
        if self.is_exhausted() {
            return Ok(false);
        }
        self.bool()
    }

    fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    fn utf8(&mut self) -> Result<String, Error> {
        let len = self.u32()?;
        if len == NULL_STRING {
            return Ok(String::new());
        }
        let len = usize::try_from(len).map_err(|_| frame_error("string length overflow"))?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| frame_error(format!("invalid utf-8: {e}")))
    }

    fn utf8_or_default(&mut self) -> Result<String, Error> {
        if self.is_exhausted() {
            return Ok(String::new());
        }
        self.utf8()
    }
}

// ── Socket ───────────────────────────────────────────────────────────

/// Bind the UDP socket WSJT-X sends to.
///
/// Unicast binds `address:port` exclusively, so a second listener on the
/// same port fails with `AddrInUse`. Multicast binds the wildcard address
/// with address reuse and joins the `address` group, letting several
/// listeners share one WSJT-X instance.
pub async fn bind_socket(address: IpAddr, port: u16, multicast: bool) -> Result<UdpSocket, Error> {
    let bind_error = |source: std::io::Error| Error::UdpBind {
        address: address.to_string(),
        port,
        multicast,
        source,
    };

    let socket = if multicast {
        let std_socket = bind_multicast(address, port).map_err(bind_error)?;
        UdpSocket::from_std(std_socket).map_err(bind_error)?
    } else {
        UdpSocket::bind(SocketAddr::new(address, port))
            .await
            .map_err(bind_error)?
    };

    debug!(%address, port, multicast, "WSJT-X UDP socket bound");
    Ok(socket)
}

fn bind_multicast(group: IpAddr, port: u16) -> std::io::Result<std::net::UdpSocket> {
    let (domain, any) = match group {
        IpAddr::V4(_) => (Domain::IPV4, IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        IpAddr::V6(_) => (Domain::IPV6, IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::new(any, port).into())?;

    match group {
        IpAddr::V4(g) => socket.join_multicast_v4(&g, &Ipv4Addr::UNSPECIFIED)?,
        IpAddr::V6(g) => socket.join_multicast_v6(&g, 0)?,
    }

    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

// ── Tests ────────────────────────────────────────────────────────────
