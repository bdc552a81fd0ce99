// ── Connection supervisor ──
//
// Owns the upstream connection lifecycle: connect, read, detect silence,
// tear down, pause, reconnect. Forever, until shutdown. Inbound events
// flow through `Pipeline::ingest`, which updates liveness, session state
// and the delta-time averager, then classifies and dispatches spots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::averager::CircularAverager;
use crate::classifier::classify;
use crate::config::{SkimmerConfig, TransportMode};
use crate::dispatcher::ReportDispatcher;
use crate::error::CoreError;
use crate::link::{Activity, ConnectionState, HeartbeatCheck, LinkMonitor};
use crate::model::{InboundEvent, ReceptionSpot, SessionState};
use crate::source::{SourceConnector, SpotSource};

// ── SupervisorState ──────────────────────────────────────────────────

/// Supervisor state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    /// Transport opened or being opened; no event seen yet.
    Connecting,
    /// At least one event arrived on the current connection.
    Connected,
    /// Torn down, waiting out the reconnect interval.
    Disconnected,
}

// ── IngestStats ──────────────────────────────────────────────────────

/// Counters since the supervisor was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    pub attempts: u64,
    pub events: u64,
    pub spots: u64,
    /// Spots that matched the SOTAmat grammar and were dispatched.
    pub matched: u64,
    pub heartbeat_losses: u64,
    pub transport_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    events: AtomicU64,
    spots: AtomicU64,
    matched: AtomicU64,
    heartbeat_losses: AtomicU64,
    transport_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> IngestStats {
        IngestStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            spots: self.spots.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            heartbeat_losses: self.heartbeat_losses.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
        }
    }
}

/// How one connection cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    TransportUnavailable,
    TransportFailed,
    HeartbeatLost,
    StreamEnded,
    /// The read worker saw its token cancelled.
    Cancelled,
    /// The heartbeat monitor exited without being asked to.
    MonitorFailed,
    Shutdown,
}

const UNICAST_HINT: &str = "Failed to connect to unicast port. Only one WSJT-X client can listen \
     at a time, or configure WSJT-X and sotamat-skimmer for multicast.";
const MULTICAST_HINT: &str = "Unknown failure connecting to multicast network port.";
const WEBSOCKET_HINT: &str = "Is SparkSDR running with its WebSocket server enabled?";

// ── Pipeline ─────────────────────────────────────────────────────────

/// State shared by the supervisor, its read worker and the heartbeat timer.
struct Pipeline {
    config: SkimmerConfig,
    link: LinkMonitor,
    averager: CircularAverager,
    session: Mutex<SessionState>,
    dispatcher: ReportDispatcher,
    counters: Counters,
    state: watch::Sender<SupervisorState>,
    /// Cancels the current connection's read worker.
    active: Mutex<Option<CancellationToken>>,
}

impl Pipeline {
    fn set_state(&self, state: SupervisorState) {
        self.state.send_replace(state);
    }

    fn source_name(&self) -> &'static str {
        self.config.transport.source_name()
    }

    fn set_active(&self, token: Option<CancellationToken>) {
        *self.active.lock().expect("active token lock poisoned") = token;
    }

    fn cancel_active(&self) {
        if let Some(token) = self.active.lock().expect("active token lock poisoned").as_ref() {
            token.cancel();
        }
    }

    /// Process one inbound event, in arrival order.
    fn ingest(&self, event: InboundEvent) {
        match self.link.record_activity(Instant::now()) {
            Activity::Discarded => {
                trace!(kind = event.kind(), "dropping event from expired connection");
                return;
            }
            Activity::FirstContact => {
                self.set_state(SupervisorState::Connected);
                info!(
                    "Connected to {}! Listening for SOTAmat messages",
                    self.source_name()
                );
            }
            Activity::Refreshed => {}
        }

        Counters::bump(&self.counters.events);
        if self.config.log_frames {
            info!(kind = event.kind(), ?event, "inbound event");
        } else {
            trace!(kind = event.kind(), ?event, "inbound event");
        }

        match event {
            InboundEvent::Status(status) => {
                self.session
                    .lock()
                    .expect("session lock poisoned")
                    .apply(&status);
            }
            InboundEvent::Spot(spot) => self.ingest_spot(&spot),
        }
    }

    fn ingest_spot(&self, spot: &ReceptionSpot) {
        Counters::bump(&self.counters.spots);
        let average_dt = self.averager.push(spot.delta_time);

        if self.config.debug {
            info!(
                snr = spot.snr,
                dt = format_args!("{:.2}", spot.delta_time),
                avg_dt = format_args!("{average_dt:.2}"),
                "decoded: {}",
                spot.message
            );
        } else {
            trace!(snr = spot.snr, avg_dt = average_dt, message = %spot.message, "decoded");
        }

        let Some(matched) = classify(&spot.message) else {
            return;
        };

        Counters::bump(&self.counters.matched);
        info!(
            station = %matched.station,
            "SOTAmat message received, sending to server: {}",
            matched.text
        );

        let session = self.session.lock().expect("session lock poisoned").clone();
        drop(self.dispatcher.submit(spot, &session));
    }
}

// ── ConnectionSupervisor ─────────────────────────────────────────────

/// Drives one upstream connection at a time, reconnecting forever.
pub struct ConnectionSupervisor<C> {
    connector: Arc<C>,
    pipeline: Arc<Pipeline>,
}

impl<C: SourceConnector> ConnectionSupervisor<C> {
    /// Create a supervisor. Does NOT connect -- call [`run()`](Self::run).
    pub fn new(config: SkimmerConfig, connector: C, dispatcher: ReportDispatcher) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);
        let link = LinkMonitor::new(config.heartbeat_timeout, Instant::now());

        Self {
            connector: Arc::new(connector),
            pipeline: Arc::new(Pipeline {
                config,
                link,
                averager: CircularAverager::default(),
                session: Mutex::new(SessionState::default()),
                dispatcher,
                counters: Counters::default(),
                state,
                active: Mutex::new(None),
            }),
        }
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.pipeline.state.subscribe()
    }

    pub fn stats(&self) -> IngestStats {
        self.pipeline.counters.snapshot()
    }

    /// Rolling mean of recent decode time offsets.
    pub fn average_delta_time(&self) -> Option<f64> {
        self.pipeline.averager.average()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.pipeline.link.snapshot()
    }

    pub fn session(&self) -> SessionState {
        self.pipeline
            .session
            .lock()
            .expect("session lock poisoned")
            .clone()
    }

    // ── Main loop ────────────────────────────────────────────────

    /// Supervise until `shutdown` is cancelled.
    ///
    /// Connection problems never end the loop. The only error is an
    /// internal fault: the heartbeat monitor dying.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), CoreError> {
        let monitor_token = shutdown.child_token();
        let monitor_fault = CancellationToken::new();
        let monitor = tokio::spawn(heartbeat_task(
            Arc::clone(&self.pipeline),
            monitor_token.clone(),
            monitor_fault.clone(),
        ));
        let reconnect_interval = self.pipeline.config.reconnect_interval;
        let monitor_died =
            || CoreError::Internal("heartbeat monitor stopped unexpectedly".into());

        let result = loop {
            let outcome = self.connect_cycle(&shutdown, &monitor_fault).await;
            self.pipeline.link.mark_disconnected();
            self.pipeline.set_state(SupervisorState::Disconnected);

            if outcome == CycleOutcome::Shutdown || shutdown.is_cancelled() {
                break Ok(());
            }
            if outcome == CycleOutcome::MonitorFailed {
                break Err(monitor_died());
            }

            info!(
                ?outcome,
                "connection cycle ended, pausing {}s before next attempt",
                reconnect_interval.as_secs()
            );

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break Ok(()),
                () = monitor_fault.cancelled() => break Err(monitor_died()),
                () = tokio::time::sleep(reconnect_interval) => {}
            }
        };

        monitor_token.cancel();
        if let Err(e) = monitor.await {
            warn!(error = %e, "heartbeat monitor ended abnormally");
        }
        debug!("supervisor stopped");
        result
    }

    /// One connect, read, teardown cycle.
    async fn connect_cycle(
        &self,
        shutdown: &CancellationToken,
        monitor_fault: &CancellationToken,
    ) -> CycleOutcome {
        let pipeline = &self.pipeline;

        pipeline.link.begin_attempt(Instant::now());
        Counters::bump(&pipeline.counters.attempts);
        pipeline.set_state(SupervisorState::Connecting);
        info!(
            endpoint = %self.connector.describe(),
            "Connecting {}",
            pipeline.config.describe_link()
        );

        let connected = tokio::select! {
            biased;
            () = shutdown.cancelled() => return CycleOutcome::Shutdown,
            () = monitor_fault.cancelled() => return CycleOutcome::MonitorFailed,
            res = self.connector.connect() => res,
        };
        let source = match connected {
            Ok(source) => source,
            Err(e) => return self.connect_failed(&e),
        };

        let cancel = shutdown.child_token();
        pipeline.set_active(Some(cancel.clone()));

        let mut worker = tokio::spawn(read_loop(
            Arc::clone(pipeline),
            source,
            cancel.clone(),
        ));

        let outcome = tokio::select! {
            joined = &mut worker => match joined {
                Ok(CycleOutcome::Cancelled) => cancellation_cause(shutdown),
                Ok(outcome) => outcome,
                Err(e) => {
                    Counters::bump(&pipeline.counters.transport_failures);
                    error!(error = %e, "read worker failed");
                    CycleOutcome::TransportFailed
                }
            },
            () = cancel.cancelled() => {
                let outcome = cancellation_cause(shutdown);
                self.await_worker(&mut worker).await;
                outcome
            }
            () = monitor_fault.cancelled() => {
                cancel.cancel();
                self.await_worker(&mut worker).await;
                CycleOutcome::MonitorFailed
            }
        };

        pipeline.set_active(None);
        cancel.cancel();
        outcome
    }

    /// Give a cancelled worker the grace period to close its transport.
    async fn await_worker(&self, worker: &mut JoinHandle<CycleOutcome>) {
        let grace = self.pipeline.config.shutdown_grace;
        debug!("waiting up to {}s for read worker to stop", grace.as_secs());

        match tokio::time::timeout(grace, &mut *worker).await {
            Ok(Ok(_)) => debug!("read worker stopped"),
            Ok(Err(e)) => warn!(error = %e, "read worker ended abnormally"),
            Err(_) => {
                warn!(
                    "read worker did not stop within {}s; abandoning it and continuing",
                    grace.as_secs()
                );
                worker.abort();
            }
        }
    }

    fn connect_failed(&self, err: &CoreError) -> CycleOutcome {
        let pipeline = &self.pipeline;
        Counters::bump(&pipeline.counters.transport_failures);
        error!(
            endpoint = %self.connector.describe(),
            error = %err,
            "failed to connect to {}",
            pipeline.source_name()
        );

        match connect_hint(err, pipeline.config.transport) {
            Some(hint) => {
                warn!("{hint}");
                CycleOutcome::TransportUnavailable
            }
            None => CycleOutcome::TransportFailed,
        }
    }
}

/// Operator advice for a source that could not be opened at all.
fn connect_hint(err: &CoreError, transport: TransportMode) -> Option<&'static str> {
    if !err.is_transport_unavailable() {
        return None;
    }
    if err.is_multicast_failure() {
        return Some(MULTICAST_HINT);
    }
    Some(match transport {
        TransportMode::WebSocket => WEBSOCKET_HINT,
        TransportMode::Unicast | TransportMode::Multicast => UNICAST_HINT,
    })
}

/// A cancelled connection was either shut down or declared dead by the
/// heartbeat timer.
fn cancellation_cause(shutdown: &CancellationToken) -> CycleOutcome {
    if shutdown.is_cancelled() {
        CycleOutcome::Shutdown
    } else {
        CycleOutcome::HeartbeatLost
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Read events until the stream ends, fails, or `cancel` fires; then
/// close the source.
async fn read_loop(
    pipeline: Arc<Pipeline>,
    mut source: Box<dyn SpotSource>,
    cancel: CancellationToken,
) -> CycleOutcome {
    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break CycleOutcome::Cancelled,
            next = source.next_event() => next,
        };

        match next {
            Ok(Some(event)) => pipeline.ingest(event),
            Ok(None) => {
                info!("{} closed the connection", pipeline.source_name());
                break CycleOutcome::StreamEnded;
            }
            Err(e) => {
                Counters::bump(&pipeline.counters.transport_failures);
                warn!(error = %e, "{} connection failed", pipeline.source_name());
                break CycleOutcome::TransportFailed;
            }
        }
    };

    source.close().await;
    outcome
}

/// Periodically check for silence and cancel the active connection when
/// the heartbeat timeout is exceeded.
///
/// `fault` is cancelled if the task ends for any reason other than
/// `cancel`, panics included.
async fn heartbeat_task(pipeline: Arc<Pipeline>, cancel: CancellationToken, fault: CancellationToken) {
    let guard = fault.drop_guard();
    let mut interval = tokio::time::interval(pipeline.config.heartbeat_check_interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let HeartbeatCheck::Expired { silent_for } = pipeline.link.check(Instant::now()) {
                    Counters::bump(&pipeline.counters.heartbeat_losses);
                    error!(
                        silent_secs = silent_for.as_secs(),
                        "No heartbeat from {} in {}s. Connection lost.",
                        pipeline.source_name(),
                        pipeline.link.timeout().as_secs()
                    );
                    pipeline.cancel_active();
                }
            }
        }
    }
    drop(guard.disarm());
}
