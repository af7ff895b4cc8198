pub mod bridge;
pub mod session;

pub use bridge::HardwareSessionBridge;
pub use session::{HardwareSession, NullHardwareSession};
