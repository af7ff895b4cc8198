//! The observed-state side of the reconciliation layer.

use std::collections::HashMap;
use std::time::Instant;

use crate::osc::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    Connected,
    Initialized,
    Running,
    Error,
}

impl Status {
    /// Whether `self -> next` is a legal transition:
    /// `Disconnected -> Connected -> Initialized -> Running`, with `Error`
    /// reachable from any state and recoverable only back to
    /// `Disconnected`.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (_, Error) => true,
            (Error, Disconnected) => true,
            (Disconnected, Connected) => true,
            (Connected, Initialized) => true,
            (Initialized, Running) => true,
            (s, n) if s == n => true,
            _ => false,
        }
    }
}

/// A device parameter whose device-side echo has not arrived within the
/// reconciliation timeout. Cleared once a matching `on_parameter_event`
/// fires.
#[derive(Debug, Clone)]
pub struct DriftedParameter {
    pub address: String,
    pub sent_at: Instant,
    pub expected: Value,
}

#[derive(Debug, Clone)]
pub struct DeviceState {
    pub name: String,
    pub device_type: String,
    pub status: Status,
    pub input_channel_count: usize,
    pub output_channel_count: usize,
    pub current_sample_rate: u32,
    pub current_block_size: usize,
    pub property_map: HashMap<String, String>,
    pub parameter_map: HashMap<String, Value>,
}

impl DeviceState {
    pub fn new(name: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            status: Status::Disconnected,
            input_channel_count: 0,
            output_channel_count: 0,
            current_sample_rate: 0,
            current_block_size: 0,
            property_map: HashMap::new(),
            parameter_map: HashMap::new(),
        }
    }

    /// Applies `next` if the transition is legal, otherwise leaves
    /// `status` unchanged and returns `false`.
    pub fn transition_to(&mut self, next: Status) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Healthy iff status is not Error, sample_rate and block_size are
    /// both positive, and (if this is a hardware device) at least one
    /// channel direction has a non-zero count.
    pub fn is_healthy(&self) -> bool {
        if self.status == Status::Error {
            return false;
        }
        if self.current_sample_rate == 0 || self.current_block_size == 0 {
            return false;
        }
        self.input_channel_count > 0 || self.output_channel_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_linear_order() {
        assert!(Status::Disconnected.can_transition_to(Status::Connected));
        assert!(!Status::Disconnected.can_transition_to(Status::Running));
        assert!(Status::Connected.can_transition_to(Status::Initialized));
        assert!(!Status::Initialized.can_transition_to(Status::Connected));
    }

    #[test]
    fn error_reachable_from_anywhere_and_recovers_to_disconnected() {
        assert!(Status::Running.can_transition_to(Status::Error));
        assert!(Status::Error.can_transition_to(Status::Disconnected));
        assert!(!Status::Error.can_transition_to(Status::Running));
    }

    #[test]
    fn health_requires_positive_rate_block_size_and_channels() {
        let mut state = DeviceState::new("dev", "GENERIC_OSC");
        assert!(!state.is_healthy());
        state.current_sample_rate = 48_000;
        state.current_block_size = 256;
        assert!(!state.is_healthy());
        state.input_channel_count = 2;
        assert!(state.is_healthy());
        state.status = Status::Error;
        assert!(!state.is_healthy());
    }
}
