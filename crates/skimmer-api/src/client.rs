// SOTAmat ingestion API client
//
// Two form-encoded POST endpoints: a credential check made once at
// startup, and the spot submission endpoint. A 2xx answer is success;
// anything else carries a human-readable body that is surfaced to the
// operator through the error.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const AUTHENTICATE_PATH: &str = "/wp-json/sotawp/v1/authenticate";
const POST_MESSAGE_PATH: &str = "/wp-json/sotawp/v1/postmessage";

/// One spot as the server expects it.
///
/// `frequency` is the absolute carrier frequency in Hz (dial + delta),
/// already resolved by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotReport {
    pub snr: i32,
    pub delta_time: f64,
    pub mode: String,
    pub message: String,
    pub gridsquare: String,
    pub frequency: i64,
    pub software: String,
}

impl SpotReport {
    /// Form fields in submission order, credentials excluded.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("snr", self.snr.to_string()),
            ("deltatime", format!("{:.2}", self.delta_time)),
            ("mode", self.mode.clone()),
            ("message", self.message.clone()),
            ("gridsquare", self.gridsquare.clone()),
            ("frequency", self.frequency.to_string()),
            ("software", self.software.clone()),
        ]
    }
}

/// HTTP client for the SOTAmat server.
///
/// Holds the operator's credentials; every request carries them as form
/// fields. Cheap to share behind an `Arc` -- all methods take `&self`.
pub struct SotamatClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
}

impl SotamatClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, username, password))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: String,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username,
            password,
        }
    }

    /// The operator callsign used as the account name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Validate the operator's credentials.
    ///
    /// `POST /wp-json/sotawp/v1/authenticate` with `username` + `password`.
    pub async fn authenticate(&self) -> Result<(), Error> {
        let url = self.base_url.join(AUTHENTICATE_PATH)?;
        debug!("authenticating {} at {}", self.username, url);

        let resp = self
            .http
            .post(url)
            .form(&self.credential_fields())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                status: status.as_u16(),
                body,
            });
        }

        debug!("authentication successful");
        Ok(())
    }

    /// Submit one spot.
    ///
    /// `POST /wp-json/sotawp/v1/postmessage` with the credentials followed
    /// by [`SpotReport::form_fields`].
    pub async fn post_message(&self, report: &SpotReport) -> Result<(), Error> {
        let url = self.base_url.join(POST_MESSAGE_PATH)?;

        let mut fields = self.credential_fields();
        fields.extend(report.form_fields());

        trace!(message = %report.message, frequency = report.frequency, "posting spot");

        let resp = self.http.post(url).form(&fields).send().await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        trace!(body = %body, "spot accepted");
        Ok(())
    }

    fn credential_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.username.clone()),
            ("password", self.password.expose_secret().to_owned()),
        ]
    }
}
