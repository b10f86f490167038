// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod drivers;

use args::{CmdArgs, LogLevelArg, Parser};
use drivers::{LogDataplane, LogTransport};
use evpn::{ConfigError, EsTable, EvpnConfig, EvpnEngine};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Error, Debug)]
enum DaemonError {
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Failed to parse {0}: {1}")]
    Parse(PathBuf, serde_yaml_ng::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to set signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

fn init_logging(level: &LogLevelArg) {
    // RUST_LOG overrides the command line
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directives()));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true);
    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("Failed to initialize tracing subscriber: {e}");
    }
}

fn load_config(path: &Path) -> Result<EvpnConfig, DaemonError> {
    let yaml =
        std::fs::read_to_string(path).map_err(|e| DaemonError::Read(path.to_path_buf(), e))?;
    let config: EvpnConfig =
        serde_yaml_ng::from_str(&yaml).map_err(|e| DaemonError::Parse(path.to_path_buf(), e))?;
    config.validate()?;
    info!(
        "Loaded configuration from {} with {} instances",
        path.display(),
        config.instances.len()
    );
    Ok(config)
}

fn run(args: &CmdArgs) -> Result<(), DaemonError> {
    let config = load_config(args.config_path())?;
    if args.check_config() {
        info!("Configuration is valid");
        return Ok(());
    }

    let mut engine = EvpnEngine::new(
        config.domain()?,
        LogDataplane::new(),
        LogTransport::new(),
        EsTable::new(),
    );
    engine.apply_config(&config)?;
    if args.show() {
        println!("{engine}");
        println!("{}", engine.dplane());
    }

    let (stop_tx, stop_rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;
    info!("evpnd running. Press Ctrl-C to stop");
    let _ = stop_rx.recv();

    info!("Shutting down: removing all EVPN instances");
    engine.cleanup_all();
    info!(
        "Sent {} notifications to peer",
        engine.peer().transport().sent()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();
    init_logging(&args.log_level());
    info!("Starting evpnd...");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, yaml: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("evpnd-{}-{name}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let path = write_config("good", "instances:\n  - vni: 100\n  - vni: 200\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.instances.len(), 2);
        std::fs::remove_file(&path).unwrap();

        let path = write_config("dup", "instances:\n  - vni: 100\n  - vni: 100\n");
        assert!(matches!(
            load_config(&path),
            Err(DaemonError::Config(ConfigError::DuplicateVni(_)))
        ));
        std::fs::remove_file(&path).unwrap();

        let path = write_config("bad", "instances: 3\n");
        assert!(matches!(load_config(&path), Err(DaemonError::Parse(..))));
        std::fs::remove_file(&path).unwrap();

        let missing = Path::new("/nonexistent/evpnd.yaml");
        assert!(matches!(load_config(missing), Err(DaemonError::Read(..))));
    }
}
