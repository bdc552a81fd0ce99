// skimmer-api: SOTAmat ingestion client and upstream decoder protocol layers

pub mod client;
pub mod error;
pub mod sparksdr;
pub mod transport;
pub mod wsjtx;

pub use client::{SotamatClient, SpotReport};
pub use error::Error;
pub use transport::TransportConfig;
