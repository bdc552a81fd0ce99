// ── Link liveness ──
//
// Shared between the ingestion loop (which records activity) and the
// heartbeat timer (which checks for silence). Both sides go through the
// narrow methods on `LinkMonitor`; nothing else touches the state.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Per-attempt connection bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    /// An event has arrived since the attempt began and the link has
    /// not been declared dead.
    pub connected: bool,
    pub last_activity: Instant,
    pub last_connect_attempt: Instant,
}

/// What `record_activity` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// First event of this attempt: the link is now connected.
    FirstContact,
    /// Liveness refreshed on an already connected link.
    Refreshed,
    /// The link was already declared dead; the event must be dropped.
    Discarded,
}

/// Result of one periodic liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatCheck {
    /// No event yet this attempt, or the link is already down.
    NotConnected,
    Alive,
    /// Silence exceeded the timeout. Reported once per attempt.
    Expired { silent_for: Duration },
}

#[derive(Debug)]
struct LinkInner {
    state: ConnectionState,
    /// Set once the timer has declared this attempt dead.
    expired: bool,
}

/// Mutex-guarded liveness state for the current connection attempt.
#[derive(Debug)]
pub struct LinkMonitor {
    inner: Mutex<LinkInner>,
    timeout: Duration,
}

impl LinkMonitor {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            inner: Mutex::new(LinkInner {
                state: ConnectionState {
                    connected: false,
                    last_activity: now,
                    last_connect_attempt: now,
                },
                expired: false,
            }),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reset for a fresh attempt.
    pub fn begin_attempt(&self, now: Instant) {
        let mut inner = self.inner.lock().expect("link monitor lock poisoned");
        inner.state = ConnectionState {
            connected: false,
            last_activity: now,
            last_connect_attempt: now,
        };
        inner.expired = false;
    }

    /// Note an inbound event.
    pub fn record_activity(&self, now: Instant) -> Activity {
        let mut inner = self.inner.lock().expect("link monitor lock poisoned");
        if inner.expired {
            return Activity::Discarded;
        }
        inner.state.last_activity = now;
        if inner.state.connected {
            Activity::Refreshed
        } else {
            inner.state.connected = true;
            Activity::FirstContact
        }
    }

    /// Compare the last activity against the timeout.
    ///
    /// Transitions a connected link to expired at most once; later checks
    /// before the next `begin_attempt` return `NotConnected`.
    pub fn check(&self, now: Instant) -> HeartbeatCheck {
        let mut inner = self.inner.lock().expect("link monitor lock poisoned");
        if !inner.state.connected || inner.expired {
            return HeartbeatCheck::NotConnected;
        }

        let silent_for = now.saturating_duration_since(inner.state.last_activity);
        if silent_for > self.timeout {
            inner.state.connected = false;
            inner.expired = true;
            HeartbeatCheck::Expired { silent_for }
        } else {
            HeartbeatCheck::Alive
        }
    }

    /// Mark the link down after teardown.
    pub fn mark_disconnected(&self) {
        self.inner
            .lock()
            .expect("link monitor lock poisoned")
            .state
            .connected = false;
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.inner.lock().expect("link monitor lock poisoned").state
    }
}
