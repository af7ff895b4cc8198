use thiserror::Error;

/// Every failure mode the engine core can raise.
///
/// Builder/lifecycle operations return this synchronously. Per-block and
/// per-packet failures are logged at their call site and never reach here —
/// none of these variants are fatal to the process by themselves; the CLI
/// front-end decides the process exit code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("unknown node type: {0}")]
    UnknownType(String),

    #[error("pad index {index} out of range for node {node} ({available} pads)")]
    PadIndexOutOfRange {
        node: String,
        index: usize,
        available: usize,
    },

    #[error("connecting {from} -> {to} would create a cycle")]
    WouldCreateCycle { from: String, to: String },

    #[error("node name already in use: {0}")]
    DuplicateName(String),

    #[error("input pad {node}:{index} already has a connection")]
    PadAlreadyConnected { node: String, index: usize },

    #[error("node {0} is not configured")]
    NotConfigured(String),

    #[error("node {0} is busy (started) and cannot be reconfigured")]
    Busy(String),

    #[error("node {0} is already running")]
    AlreadyRunning(String),

    #[error("failed to load hardware driver: {0}")]
    HardwareLoadError(String),

    #[error("failed to initialize hardware session: {0}")]
    HardwareInitError(String),

    #[error("OSC decode error: {0}")]
    OscDecodeError(String),

    #[error("OSC address error: {0}")]
    OscAddressError(String),

    #[error("OSC send error: {0}")]
    OscSendError(String),

    #[error("query timed out")]
    QueryTimeout,
}

pub type EngineResult<T> = Result<T, EngineError>;
