//! Clap derive structures for the `sotamat-skimmer` binary.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

/// Long options older skimmer releases took with a single dash
/// (`-port=2238`, `-sparksdr`).
const SINGLE_DASH_LONGS: [&str; 9] = [
    "port",
    "sparksdr",
    "multicast",
    "address",
    "callsign",
    "password",
    "gridsquare",
    "debug",
    "log",
];

/// sotamat-skimmer -- relay SOTAmat messages from WSJT-X or SparkSDR
#[derive(Debug, Parser)]
#[command(
    name = "sotamat-skimmer",
    version,
    about = "Relay SOTAmat messages heard by WSJT-X or SparkSDR to the SOTAmat server",
    long_about = "Connects to WSJT-X (UDP) or SparkSDR (websocket), watches every decode, \
        and forwards SOTAmat messages to https://sotamat.com.\n\n\
        Callsign, password and gridsquare are required. They may also be set with the \
        SOTAMAT_CALLSIGN, SOTAMAT_PASSWORD and SOTAMAT_GRIDSQUARE environment variables \
        or in the config file. Every setting has a SOTAMAT_<NAME> variable.",
    after_help = "Examples:\n  \
        sotamat-skimmer -c AA1ABC -p mysecret -g CM89\n  \
        sotamat-skimmer -c AA1ABC -p mysecret -g CM89 -a 224.0.0.1 --multicast\n  \
        sotamat-skimmer -c AA1ABC -p mysecret -g CM89 --sparksdr --port 4649\n\n\
        The single-dash long forms of older releases (-port=4649, -sparksdr) are \
        still accepted."
)]
pub struct Cli {
    /// SOTAmat account callsign
    #[arg(long, short = 'c')]
    pub callsign: Option<String>,

    /// SOTAmat account password
    #[arg(long, short = 'p')]
    pub password: Option<String>,

    /// Gridsquare of the receiving antenna (for a remote SDR, the SDR's
    /// antenna, not your home)
    #[arg(long, short = 'g')]
    pub gridsquare: Option<String>,

    /// Address of WSJT-X (IP or multicast group) or the SparkSDR host
    /// [default: 127.0.0.1]
    #[arg(long, short = 'a')]
    pub address: Option<String>,

    /// UDP or websocket port [default: 2237]
    #[arg(long)]
    pub port: Option<u16>,

    /// Join the WSJT-X multicast group instead of binding the unicast port
    #[arg(long, short = 'm')]
    pub multicast: bool,

    /// Connect to a SparkSDR websocket instead of WSJT-X
    #[arg(long)]
    pub sparksdr: bool,

    /// Echo every decoded message
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Log every protocol event
    #[arg(long, short = 'l')]
    pub log: bool,

    /// Seconds of silence before the connection is considered lost
    /// [default: 30]
    #[arg(long, value_name = "SECS")]
    pub heartbeat_timeout: Option<u64>,

    /// Seconds to wait before reconnecting [default: 15]
    #[arg(long, value_name = "SECS")]
    pub reconnect_interval: Option<u64>,

    /// SOTAmat server root
    #[arg(long, value_name = "URL", hide = true)]
    pub api_url: Option<String>,

    /// Config file [default: platform config dir]/config.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Rewrite single-dash long options (`-port=2238`) to `--port=2238` so
/// existing launch scripts keep working. Nothing after `--` is touched.
pub fn normalize_legacy_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            let Some(body) = text.strip_prefix('-').filter(|b| !b.starts_with('-')) else {
                return arg;
            };
            let name = body.split_once('=').map_or(body, |(name, _)| name);
            if SINGLE_DASH_LONGS.contains(&name) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::parse_from([
            "sotamat-skimmer",
            "-c",
            "AB6D",
            "-p=secret",
            "-g",
            "CM97",
            "-a",
            "224.0.0.1",
            "--port",
            "2238",
            "-m",
            "-d",
        ]);
        assert_eq!(cli.callsign.as_deref(), Some("AB6D"));
        assert_eq!(cli.password.as_deref(), Some("secret"));
        assert_eq!(cli.port, Some(2238));
        assert!(cli.multicast);
        assert!(cli.debug);
        assert!(!cli.sparksdr);
    }

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn single_dash_long_options_are_rewritten() {
        let args = normalize_legacy_args(os_args(&[
            "sotamat-skimmer",
            "-c=AB6D",
            "-port=4649",
            "-sparksdr",
            "-d",
        ]));
        assert_eq!(
            args,
            os_args(&["sotamat-skimmer", "-c=AB6D", "--port=4649", "--sparksdr", "-d"])
        );

        let cli = Cli::parse_from(args);
        assert_eq!(cli.port, Some(4649));
        assert!(cli.sparksdr);
        assert!(cli.password.is_none());
    }

    #[test]
    fn arguments_after_double_dash_are_left_alone() {
        let args = os_args(&["sotamat-skimmer", "--", "-port=1"]);
        assert_eq!(normalize_legacy_args(args.clone()), args);
    }
}
