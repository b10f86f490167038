// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;
use tracing::level_filters::LevelFilter;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/evpnd/evpnd.yaml";

/// A logging directive: either a bare level (e.g. `debug`), which becomes the default,
/// or a comma-separated list of `target=level` items with an optional bare level.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLevelArg {
    default: LevelFilter,
    targets: Vec<(String, LevelFilter)>,
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    LevelFilter::from_str(level).map_err(|_| {
        format!("Invalid log level '{level}': use one of off,error,warn,info,debug,trace")
    })
}

impl FromStr for LogLevelArg {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut default = LevelFilter::INFO;
        let mut targets = Vec::new();
        for item in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.split_once('=') {
                Some((target, level)) => {
                    if target.is_empty() {
                        return Err(format!("Missing target in '{item}'"));
                    }
                    targets.push((target.to_owned(), parse_level(level)?));
                }
                None => default = parse_level(item)?,
            }
        }
        Ok(Self { default, targets })
    }
}

impl LogLevelArg {
    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.default
    }

    /// The directive string, in the syntax of `tracing_subscriber::EnvFilter`
    #[must_use]
    pub fn directives(&self) -> String {
        let mut out = vec![self.default.to_string().to_lowercase()];
        out.extend(
            self.targets
                .iter()
                .map(|(target, level)| format!("{target}={}", level.to_string().to_lowercase())),
        );
        out.join(",")
    }
}

impl Default for LogLevelArg {
    fn default() -> Self {
        Self {
            default: LevelFilter::INFO,
            targets: vec![],
        }
    }
}

#[derive(Parser)]
#[command(name = "evpnd")]
#[command(version = "0.1")]
#[command(about = "EVPN (L2 VNI) control plane daemon", long_about = None)]
pub struct CmdArgs {
    #[arg(
        long,
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "YAML file with the EVPN configuration"
    )]
    config: PathBuf,

    #[arg(
        long,
        value_name = "LEVEL",
        value_parser = LogLevelArg::from_str,
        help = "Log level, optionally per target, as a comma-separated sequence of [target=]level, with level one in [off,error,warn,info,debug,trace].
E.g. --log-level warn,evpnd_evpn=debug"
    )]
    log_level: Option<LogLevelArg>,

    #[arg(
        long,
        default_value_t = false,
        help = "Show the EVPN state once the configuration has been applied"
    )]
    show: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Validate the configuration and exit"
    )]
    check_config: bool,
}

impl CmdArgs {
    #[must_use]
    pub fn config_path(&self) -> &PathBuf {
        &self.config
    }

    #[must_use]
    pub fn log_level(&self) -> LogLevelArg {
        let level = self.log_level.clone().unwrap_or_default();
        debug!("Log directives: {}", level.directives());
        level
    }

    #[must_use]
    pub fn show(&self) -> bool {
        self.show
    }

    #[must_use]
    pub fn check_config(&self) -> bool {
        self.check_config
    }
}
