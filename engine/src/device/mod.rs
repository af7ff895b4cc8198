pub mod manager;
pub mod parameter_plane;
pub mod state;

pub use manager::{DeviceStateManager, BATCH_SPACING, DEFAULT_ECHO_TIMEOUT, MAX_BATCH_SIZE};
pub use parameter_plane::{OscParameterPlane, ParameterPlane};
pub use state::{DeviceState, DriftedParameter, Status};
