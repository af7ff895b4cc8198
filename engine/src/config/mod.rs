pub mod model;

pub use model::{
    ConnectionConfig, ControlCommand, Configuration, DeviceType, InternalFormatKind, NodeConfig,
};
