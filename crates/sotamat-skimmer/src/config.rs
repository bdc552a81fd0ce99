//! Command-line overrides on top of the layered configuration.

use std::path::PathBuf;

use figment::providers::Serialized;
use serde::Serialize;

use skimmer_core::SkimmerConfig;

use crate::cli::Cli;
use crate::error::CliError;

/// Flags the operator actually passed. Absent flags are skipped so the
/// file and environment values underneath survive the merge.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    callsign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gridsquare: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multicast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sparksdr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_frames: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    heartbeat_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reconnect_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            callsign: cli.callsign.clone(),
            password: cli.password.clone(),
            gridsquare: cli.gridsquare.clone(),
            address: cli.address.clone(),
            port: cli.port,
            // Boolean flags can only switch a setting on.
            multicast: cli.multicast.then_some(true),
            sparksdr: cli.sparksdr.then_some(true),
            debug: cli.debug.then_some(true),
            log_frames: cli.log.then_some(true),
            heartbeat_timeout_secs: cli.heartbeat_timeout,
            reconnect_interval_secs: cli.reconnect_interval,
            api_url: cli.api_url.clone(),
        }
    }
}

/// Resolve the final configuration: defaults, file, environment, flags.
pub fn resolve(cli: &Cli) -> Result<SkimmerConfig, CliError> {
    let path: PathBuf = match cli.config {
        Some(ref path) => {
            if !path.exists() {
                return Err(CliError::ConfigNotFound {
                    path: path.display().to_string(),
                });
            }
            path.clone()
        }
        None => skimmer_config::config_path(),
    };

    let figment =
        skimmer_config::figment(&path).merge(Serialized::defaults(CliOverrides::from(cli)));
    let file = skimmer_config::extract(&figment)?;
    Ok(file.into_skimmer_config()?)
}
