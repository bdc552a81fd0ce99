// ── Canonical event model ──
//
// Protocol-independent records produced by the source adapters and
// consumed by the supervisor's ingestion path.

/// One decoded transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceptionSpot {
    /// Signal-to-noise ratio in whole dB.
    pub snr: i32,
    /// Time alignment offset in seconds.
    pub delta_time: f64,
    /// Audio offset from the dial frequency in Hz.
    pub delta_frequency: i64,
    pub mode: String,
    /// Raw decoded text.
    pub message: String,
}

/// Session metadata update.
///
/// Both fields empty is a bare liveness pulse (a WSJT-X heartbeat).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub dial_frequency: Option<u64>,
    pub mode: Option<String>,
}

impl LinkStatus {
    /// A status that only proves the link is alive.
    pub fn pulse() -> Self {
        Self::default()
    }

    pub fn is_pulse(&self) -> bool {
        self.dial_frequency.is_none() && self.mode.is_none()
    }
}

/// Anything a source hands to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Spot(ReceptionSpot),
    Status(LinkStatus),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spot(_) => "spot",
            Self::Status(s) if s.is_pulse() => "heartbeat",
            Self::Status(_) => "status",
        }
    }
}

/// Dial frequency and mode as last reported by the decoder.
///
/// Survives reconnects: a fresh connection keeps reporting against the
/// previous values until its first status arrives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub dial_frequency: u64,
    pub mode: String,
}

impl SessionState {
    /// Merge a status update. Absent fields keep their previous value.
    pub fn apply(&mut self, status: &LinkStatus) {
        if let Some(freq) = status.dial_frequency {
            self.dial_frequency = freq;
        }
        if let Some(ref mode) = status.mode {
            self.mode.clone_from(mode);
        }
    }

    /// Absolute carrier frequency for a spot at `delta` Hz above the dial.
    pub fn absolute_frequency(&self, delta: i64) -> i64 {
        i64::try_from(self.dial_frequency)
            .unwrap_or(i64::MAX)
            .saturating_add(delta)
    }
}
