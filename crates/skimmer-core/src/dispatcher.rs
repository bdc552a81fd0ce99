// ── Report dispatcher ──
//
// Fire-and-forget submission of matched spots to the SOTAmat server,
// plus the one-time credential check made before monitoring starts.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use skimmer_api::transport::TransportConfig;
use skimmer_api::{SotamatClient, SpotReport};

use crate::config::SkimmerConfig;
use crate::error::CoreError;
use crate::model::{ReceptionSpot, SessionState};

/// Software identity sent with every submission.
pub const SOFTWARE_ID: &str = concat!("SOTAmatSkimmer V", env!("CARGO_PKG_VERSION"));

/// Sends spots to the SOTAmat server.
///
/// Cheaply cloneable; every clone shares one HTTP connection pool.
#[derive(Clone)]
pub struct ReportDispatcher {
    client: Arc<SotamatClient>,
    gridsquare: String,
}

impl ReportDispatcher {
    pub fn new(client: SotamatClient, gridsquare: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            gridsquare: gridsquare.into(),
        }
    }

    /// Build the HTTP client from the skimmer configuration.
    pub fn from_config(config: &SkimmerConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_timeout(config.request_timeout);
        let client = SotamatClient::new(
            config.api_url.clone(),
            config.callsign.clone(),
            config.password.clone(),
            &transport,
        )?;
        Ok(Self::new(client, config.gridsquare.clone()))
    }

    /// Check the operator's credentials. Any failure is logged and
    /// reported as `false`.
    pub async fn authenticate(&self) -> bool {
        match self.client.authenticate().await {
            Ok(()) => {
                info!(callsign = %self.client.username(), "SOTAmat credentials accepted");
                true
            }
            Err(skimmer_api::Error::Authentication { status, body }) => {
                error!(status, "SOTAmat server rejected the credentials");
                if !body.trim().is_empty() {
                    error!("{}", body.trim());
                }
                false
            }
            Err(e) => {
                error!(error = %e, "failed to reach SOTAmat server while authenticating");
                false
            }
        }
    }

    /// Resolve a spot against the current session into a server report.
    pub fn build_report(&self, spot: &ReceptionSpot, session: &SessionState) -> SpotReport {
        SpotReport {
            snr: spot.snr,
            delta_time: spot.delta_time,
            mode: session.mode.clone(),
            message: spot.message.clone(),
            gridsquare: self.gridsquare.clone(),
            frequency: session.absolute_frequency(spot.delta_frequency),
            software: SOFTWARE_ID.to_owned(),
        }
    }

    /// Submit a spot in a detached task.
    ///
    /// Returns immediately. Failures are logged inside the task and never
    /// retried. The handle is only useful to tests; callers drop it.
    pub fn submit(&self, spot: &ReceptionSpot, session: &SessionState) -> JoinHandle<()> {
        let report = self.build_report(spot, session);
        let client = Arc::clone(&self.client);

        tokio::spawn(async move {
            match client.post_message(&report).await {
                Ok(()) => debug!(message = %report.message, "SOTAmat server accepted spot"),
                Err(e) => {
                    let e = CoreError::from(e);
                    warn!(message = %report.message, error = %e, "SOTAmat server did not accept spot");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use url::Url;

    use super::*;

    fn dispatcher() -> ReportDispatcher {
        let password: SecretString = "pw".to_string().into();
        let client = SotamatClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            "AB6D".into(),
            password,
            &TransportConfig::default(),
        )
        .unwrap();
        ReportDispatcher::new(client, "CM97")
    }

    #[test]
    fn report_uses_session_mode_and_absolute_frequency() {
        let spot = ReceptionSpot {
            snr: -9,
            delta_time: 0.123,
            delta_frequency: 1500,
            mode: "~".into(),
            message: "SOTAMAT W1A/P".into(),
        };
        let session = SessionState {
            dial_frequency: 14_074_000,
            mode: "FT8".into(),
        };

        let report = dispatcher().build_report(&spot, &session);
        assert_eq!(report.mode, "FT8");
        assert_eq!(report.frequency, 14_075_500);
        assert_eq!(report.gridsquare, "CM97");
        assert!(report.software.starts_with("SOTAmatSkimmer V"));
    }
}
