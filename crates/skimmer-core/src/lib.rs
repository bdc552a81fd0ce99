// skimmer-core: supervision and ingestion between skimmer-api and the binary.

pub mod averager;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod model;
pub mod source;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use averager::CircularAverager;
pub use classifier::{CanonicalSpot, classify};
pub use config::{SkimmerConfig, TransportMode};
pub use dispatcher::ReportDispatcher;
pub use error::CoreError;
pub use link::{Activity, ConnectionState, HeartbeatCheck, LinkMonitor};
pub use model::{InboundEvent, LinkStatus, ReceptionSpot, SessionState};
pub use source::{SourceConnector, SpotSource, UpstreamConnector};
pub use supervisor::{ConnectionSupervisor, IngestStats, SupervisorState};
