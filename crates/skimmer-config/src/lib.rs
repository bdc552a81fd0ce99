//! Layered configuration for sotamat-skimmer.
//!
//! Built-in defaults, then an optional TOML file, then `SOTAMAT_*`
//! environment variables. The binary merges its command-line flags on
//! top and hands the result to [`FileConfig::into_skimmer_config`], which
//! validates everything and produces the core's `SkimmerConfig`.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use skimmer_core::config::{
    DEFAULT_ADDRESS, DEFAULT_HEARTBEAT_CHECK, DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_PORT,
    DEFAULT_RECONNECT_INTERVAL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_GRACE,
};
use skimmer_core::{SkimmerConfig, TransportMode};

/// Prefix of every environment variable read by the loader.
pub const ENV_PREFIX: &str = "SOTAMAT_";

/// Production SOTAmat server.
pub const DEFAULT_API_URL: &str = "https://sotamat.com";

/// Settings read from the environment verbatim. The typed `Env`
/// provider would turn `SOTAMAT_PASSWORD=0123` into the number 123.
const IDENTITY_KEYS: [&str; 3] = ["callsign", "password", "gridsquare"];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting(s): {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// Flat settings table, as read from file and environment.
///
/// Identity fields are optional here so that a missing value can be
/// reported by name instead of as a generic deserialization failure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub callsign: Option<String>,
    /// Plaintext; prefer `SOTAMAT_PASSWORD`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub password: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub gridsquare: Option<String>,
    pub address: String,
    pub port: u16,
    pub multicast: bool,
    pub sparksdr: bool,
    pub heartbeat_timeout_secs: u64,
    pub reconnect_interval_secs: u64,
    pub heartbeat_check_secs: u64,
    pub shutdown_grace_secs: u64,
    pub request_timeout_secs: u64,
    pub api_url: String,
    pub debug: bool,
    pub log_frames: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            callsign: None,
            password: None,
            gridsquare: None,
            address: DEFAULT_ADDRESS.into(),
            port: DEFAULT_PORT,
            multicast: false,
            sparksdr: false,
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT.as_secs(),
            reconnect_interval_secs: DEFAULT_RECONNECT_INTERVAL.as_secs(),
            heartbeat_check_secs: DEFAULT_HEARTBEAT_CHECK.as_secs(),
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            api_url: DEFAULT_API_URL.into(),
            debug: false,
            log_frames: false,
        }
    }
}

/// Accept any scalar for a text setting, so an unquoted `password = 1234`
/// in TOML still reads as the string "1234".
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_owned()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_char<E: de::Error>(self, v: char) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, inner: D2) -> Result<Self::Value, D2::Error> {
            inner.deserialize_any(self)
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "sotamat", "sotamat-skimmer").map_or_else(
        || PathBuf::from("sotamat-skimmer.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then `path` (if it exists), then the environment.
///
/// Callers may merge further providers (command-line overrides) before
/// extracting.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&IDENTITY_KEYS))
        .merge(Serialized::defaults(identity_from_env()))
}

/// `SOTAMAT_CALLSIGN`, `SOTAMAT_PASSWORD` and `SOTAMAT_GRIDSQUARE` as raw
/// strings.
fn identity_from_env() -> BTreeMap<&'static str, String> {
    IDENTITY_KEYS
        .iter()
        .filter_map(|key| {
            Env::var(&format!("{ENV_PREFIX}{}", key.to_ascii_uppercase())).map(|v| (*key, v))
        })
        .collect()
}

/// Extract and return the merged settings.
pub fn extract(figment: &Figment) -> Result<FileConfig, ConfigError> {
    Ok(figment.extract()?)
}

/// Load from `path`, or the platform config path when `None`.
pub fn load_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    extract(&figment(&path))
}

// ── Validation ──────────────────────────────────────────────────────

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn seconds(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(invalid(field, "must be at least 1 second"));
    }
    Ok(Duration::from_secs(secs))
}

impl FileConfig {
    /// Which transport the flags select.
    pub fn transport(&self) -> Result<TransportMode, ConfigError> {
        match (self.multicast, self.sparksdr) {
            (true, true) => Err(invalid(
                "transport",
                "multicast and sparksdr cannot be combined; SparkSDR is reached over a websocket",
            )),
            (true, false) => Ok(TransportMode::Multicast),
            (false, true) => Ok(TransportMode::WebSocket),
            (false, false) => Ok(TransportMode::Unicast),
        }
    }

    /// Validate and convert into the core configuration.
    pub fn into_skimmer_config(self) -> Result<SkimmerConfig, ConfigError> {
        let transport = self.transport()?;

        let callsign = required(self.callsign);
        let password = required(self.password);
        let gridsquare = required(self.gridsquare);

        let mut missing = Vec::new();
        if callsign.is_none() {
            missing.push("callsign");
        }
        if password.is_none() {
            missing.push("password");
        }
        if gridsquare.is_none() {
            missing.push("gridsquare");
        }
        let (Some(callsign), Some(password), Some(gridsquare)) = (callsign, password, gridsquare)
        else {
            return Err(ConfigError::MissingFields { fields: missing });
        };

        let address = self.address.trim().to_owned();
        if address.is_empty() {
            return Err(invalid("address", "must not be empty"));
        }
        if transport != TransportMode::WebSocket {
            let ip: IpAddr = address.parse().map_err(|_| {
                invalid("address", format!("'{address}' is not an IP address"))
            })?;
            if transport == TransportMode::Multicast && !ip.is_multicast() {
                return Err(invalid(
                    "address",
                    format!("'{address}' is not a multicast group (e.g. 224.0.0.1)"),
                ));
            }
        }

        if self.port == 0 {
            return Err(invalid("port", "must not be 0"));
        }

        let api_url = Url::parse(&self.api_url)
            .map_err(|e| invalid("api_url", format!("'{}': {e}", self.api_url)))?;

        Ok(SkimmerConfig {
            callsign,
            password: SecretString::from(password),
            gridsquare,
            address,
            port: self.port,
            transport,
            api_url,
            request_timeout: seconds("request_timeout_secs", self.request_timeout_secs)?,
            heartbeat_timeout: seconds("heartbeat_timeout_secs", self.heartbeat_timeout_secs)?,
            reconnect_interval: seconds("reconnect_interval_secs", self.reconnect_interval_secs)?,
            heartbeat_check_interval: seconds("heartbeat_check_secs", self.heartbeat_check_secs)?,
            shutdown_grace: seconds("shutdown_grace_secs", self.shutdown_grace_secs)?,
            debug: self.debug,
            log_frames: self.log_frames,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use figment::Jail;
    use secrecy::ExposeSecret;

    use super::*;

    fn complete() -> FileConfig {
        FileConfig {
            callsign: Some("AB6D".into()),
            password: Some("hunter2".into()),
            gridsquare: Some("CM97".into()),
            ..FileConfig::default()
        }
    }

    #[test]
    fn defaults_convert_to_unicast() {
        let cfg = complete().into_skimmer_config().unwrap();
        assert_eq!(cfg.transport, TransportMode::Unicast);
        assert_eq!(cfg.port, 2237);
        assert_eq!(cfg.callsign, "AB6D");
        assert_eq!(cfg.password.expose_secret(), "hunter2");
        assert_eq!(cfg.api_url.as_str(), "https://sotamat.com/");
        assert_eq!(cfg.heartbeat_timeout, Duration::from_secs(30));
    }

    #[test]
    fn reports_every_missing_field() {
        let cfg = FileConfig {
            callsign: Some("  ".into()),
            ..FileConfig::default()
        };
        match cfg.into_skimmer_config() {
            Err(ConfigError::MissingFields { fields }) => {
                assert_eq!(fields, vec!["callsign", "password", "gridsquare"]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn multicast_and_sparksdr_conflict() {
        let cfg = FileConfig {
            multicast: true,
            sparksdr: true,
            ..complete()
        };
        let err = cfg.into_skimmer_config().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "transport"));
    }

    #[test]
    fn multicast_needs_group_address() {
        let cfg = FileConfig {
            multicast: true,
            ..complete()
        };
        assert!(cfg.into_skimmer_config().is_err());

        let cfg = FileConfig {
            multicast: true,
            address: "224.0.0.1".into(),
            ..complete()
        };
        assert_eq!(
            cfg.into_skimmer_config().unwrap().transport,
            TransportMode::Multicast
        );
    }

    #[test]
    fn sparksdr_accepts_host_names() {
        let cfg = FileConfig {
            sparksdr: true,
            address: "localhost".into(),
            ..complete()
        };
        assert_eq!(
            cfg.into_skimmer_config().unwrap().transport,
            TransportMode::WebSocket
        );

        let cfg = FileConfig {
            address: "localhost".into(),
            ..complete()
        };
        assert!(cfg.into_skimmer_config().is_err());
    }

    #[test]
    fn zero_durations_rejected() {
        let cfg = FileConfig {
            reconnect_interval_secs: 0,
            ..complete()
        };
        let err = cfg.into_skimmer_config().unwrap_err();
        assert!(err.to_string().contains("reconnect_interval_secs"));
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "skimmer.toml",
                r#"
                    callsign = "W1AW"
                    gridsquare = "FN31"
                    port = 2238
                "#,
            )?;
            jail.set_env("SOTAMAT_PASSWORD", "from-env");
            jail.set_env("SOTAMAT_GRIDSQUARE", "CM97");

            let cfg = load_config(Some(Path::new("skimmer.toml"))).unwrap();
            assert_eq!(cfg.callsign.as_deref(), Some("W1AW"));
            assert_eq!(cfg.password.as_deref(), Some("from-env"));
            assert_eq!(cfg.gridsquare.as_deref(), Some("CM97"));
            assert_eq!(cfg.port, 2238);
            assert_eq!(cfg.address, "127.0.0.1");
            Ok(())
        });
    }

    #[test]
    fn numeric_looking_identity_from_env_stays_text() {
        Jail::expect_with(|jail| {
            jail.set_env("SOTAMAT_CALLSIGN", "1234");
            jail.set_env("SOTAMAT_PASSWORD", "0012345678");
            jail.set_env("SOTAMAT_GRIDSQUARE", "1.50");

            let cfg = load_config(Some(Path::new("absent.toml"))).unwrap();
            assert_eq!(cfg.callsign.as_deref(), Some("1234"));
            assert_eq!(cfg.password.as_deref(), Some("0012345678"));
            assert_eq!(cfg.gridsquare.as_deref(), Some("1.50"));

            let core = cfg.into_skimmer_config().unwrap();
            assert_eq!(core.password.expose_secret(), "0012345678");
            Ok(())
        });
    }

    #[test]
    fn boolean_looking_password_from_env_stays_text() {
        Jail::expect_with(|jail| {
            jail.set_env("SOTAMAT_CALLSIGN", "AB6D");
            jail.set_env("SOTAMAT_PASSWORD", "true");
            jail.set_env("SOTAMAT_GRIDSQUARE", "CM97");

            let cfg = load_config(Some(Path::new("absent.toml"))).unwrap();
            assert_eq!(cfg.password.as_deref(), Some("true"));
            Ok(())
        });
    }

    #[test]
    fn unquoted_numeric_password_in_file_is_accepted() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "skimmer.toml",
                r#"
                    callsign = "AB6D"
                    password = 12345678
                    gridsquare = "CM97"
                "#,
            )?;

            let cfg = load_config(Some(Path::new("skimmer.toml"))).unwrap();
            assert_eq!(cfg.password.as_deref(), Some("12345678"));
            Ok(())
        });
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = extract(&figment(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::Figment(_))
        ));
    }
}
