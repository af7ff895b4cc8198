mod cli;
mod config_loader;
mod logging;

use std::process::ExitCode;
use std::time::Duration;

use flowcore_engine::device::DeviceState;
use flowcore_engine::engine::device_type_str;
use flowcore_engine::osc::Transport;
use flowcore_engine::{Engine, EngineError};
use tracing::{error, info};

use cli::Cli;

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 1;
const EXIT_HARDWARE_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

pub fn main() -> ExitCode {
    let cli = match Cli::parse(std::env::args()) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let _logging_guard = logging::init(cli.debug);

    let config = match config_loader::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut engine = Engine::new();
    if let Err(e) = engine.apply_configuration(&config) {
        error!(error = %e, "failed to build graph from configuration");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let runtime = match engine.ensure_runtime() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let initial_state = DeviceState::new(&config.asio_device_name, device_type_str(config.device_type));
    if let Err(e) = engine.start_osc(&runtime, &config, Transport::Udp, initial_state) {
        error!(error = %e, "failed to start OSC control plane");
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }

    engine.apply_commands(&config.commands, |result| {
        if let Err(e) = result {
            error!(error = %e, "failed to apply configured commands");
        }
    });

    if let Err(e) = engine.start() {
        error!(error = %e, "failed to start engine");
        let code = match e {
            EngineError::HardwareLoadError(_) | EngineError::HardwareInitError(_) => EXIT_HARDWARE_ERROR,
            _ => EXIT_RUNTIME_ERROR,
        };
        return ExitCode::from(code);
    }

    info!("flowcore running, press Ctrl-C to stop");
    if let Err(e) = runtime.block_on(tokio::signal::ctrl_c()) {
        error!(error = %e, "failed waiting for shutdown signal");
    }

    info!("shutting down");
    if let Err(e) = engine.stop(Duration::from_secs(5)) {
        error!(error = %e, "error during shutdown");
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }

    ExitCode::from(EXIT_OK)
}
