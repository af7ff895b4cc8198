//! Loads a `Configuration` from a JSON file and overlays CLI flags on top
//! of it. The engine core never touches `serde_json` directly — only this
//! front-end does.

use flowcore_engine::config::{Configuration, DeviceType, InternalFormatKind};

use crate::cli::Cli;

#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_configuration(device: &str) -> Configuration {
    Configuration {
        asio_device_name: device.to_string(),
        device_type: DeviceType::GenericOsc,
        sample_rate: 48_000.0,
        buffer_size: 256,
        target_ip: "127.0.0.1".to_string(),
        target_port: 9000,
        receive_port: 9001,
        internal_format: InternalFormatKind::F32,
        internal_layout: "stereo".to_string(),
        nodes: Vec::new(),
        connections: Vec::new(),
        commands: Vec::new(),
    }
}

/// Builds the `Configuration` the engine will run with: starts from
/// `--config`'s JSON file (or hardware-driven defaults under
/// `--auto-config`), then lets the narrower CLI flags override individual
/// fields.
pub fn load(cli: &Cli) -> Result<Configuration, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError(format!("failed to read {path}: {e}")))?;
            serde_json::from_str::<Configuration>(&text)
                .map_err(|e| ConfigError(format!("failed to parse {path}: {e}")))?
        }
        None if cli.auto_config => default_configuration(cli.device.as_deref().unwrap_or("default")),
        None => {
            return Err(ConfigError(
                "no --config file given and --auto-config not set".to_string(),
            ))
        }
    };

    if let Some(device) = &cli.device {
        config.asio_device_name = device.clone();
    }
    if let Some(ip) = &cli.ip {
        config.target_ip = ip.clone();
    }
    if let Some(port) = cli.port {
        config.target_port = port;
    }
    if let Some(receive_port) = cli.receive_port {
        config.receive_port = receive_port;
    }
    if let Some(sample_rate) = cli.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(buffer_size) = cli.buffer_size {
        config.buffer_size = buffer_size;
    }

    Ok(config)
}
