//! `DeviceStateManager`: the diff-and-apply reconciliation loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::ControlCommand;
use crate::device::parameter_plane::ParameterPlane;
use crate::device::state::{DeviceState, DriftedParameter, Status};
use crate::error::EngineResult;
use crate::osc::Value;

/// Messages per bundle when batching `apply_configuration`'s diff.
pub const MAX_BATCH_SIZE: usize = 50;
/// Spacing between successive batches.
pub const BATCH_SPACING: Duration = Duration::from_millis(20);
/// Default echo timeout before a sent parameter is marked drifted.
pub const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_secs(2);

fn json_to_osc_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int32(i as i32))
            } else {
                n.as_f64().map(|f| Value::Float32(f as f32))
            }
        }
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Bool(true) => Some(Value::True),
        serde_json::Value::Bool(false) => Some(Value::False),
        serde_json::Value::Null => Some(Value::Nil),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < 1e-9,
        _ => a == b,
    }
}

/// Owns the observed `DeviceState` and reconciles it against a desired
/// `Configuration`'s commands through a `ParameterPlane`. Listeners
/// registered via `add_listener` are notified, in registration order, of
/// every `on_parameter_event`.
pub struct DeviceStateManager<P: ParameterPlane> {
    state: Mutex<DeviceState>,
    plane: Arc<P>,
    drifted: Mutex<HashMap<String, DriftedParameter>>,
    echo_timeout: Duration,
    listeners: Mutex<Vec<Box<dyn FnMut(&str, &Value) + Send>>>,
}

impl<P: ParameterPlane + 'static> DeviceStateManager<P> {
    pub fn new(initial: DeviceState, plane: Arc<P>) -> Self {
        Self {
            state: Mutex::new(initial),
            plane,
            drifted: Mutex::new(HashMap::new()),
            echo_timeout: DEFAULT_ECHO_TIMEOUT,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn with_echo_timeout(mut self, timeout: Duration) -> Self {
        self.echo_timeout = timeout;
        self
    }

    pub fn add_listener(&self, listener: Box<dyn FnMut(&str, &Value) + Send>) {
        self.listeners.lock().unwrap().push(listener);
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.lock().unwrap().clone()
    }

    /// `diff(current, target) -> set<(address, value)>`: only the
    /// commands whose current observed value differs from (or is absent
    /// from) the target.
    pub fn diff(&self, target: &[ControlCommand]) -> Vec<(String, Value)> {
        let state = self.state.lock().unwrap();
        let mut changed = Vec::new();
        for command in target {
            let Some(first_arg) = command.args.first() else {
                continue;
            };
            let Some(desired) = json_to_osc_value(first_arg) else {
                continue;
            };
            let matches_current = state
                .parameter_map
                .get(&command.address)
                .map(|current| values_equal(current, &desired))
                .unwrap_or(false);
            if !matches_current {
                changed.push((command.address.clone(), desired));
            }
        }
        changed
    }

    /// Sends only the changed parameters, batched into bundles of at most
    /// `MAX_BATCH_SIZE` with `BATCH_SPACING` between batches, then
    /// invokes `callback` with overall success/failure. State is updated
    /// only once the device echoes each change (`on_parameter_event`),
    /// never optimistically here.
    pub fn apply_configuration(
        &self,
        target: &[ControlCommand],
        callback: impl FnOnce(EngineResult<()>) + Send + 'static,
    ) {
        let changed = self.diff(target);
        if changed.is_empty() {
            callback(Ok(()));
            return;
        }

        let now = Instant::now();
        {
            let mut drifted = self.drifted.lock().unwrap();
            for (address, value) in &changed {
                drifted.insert(
                    address.clone(),
                    DriftedParameter {
                        address: address.clone(),
                        sent_at: now,
                        expected: value.clone(),
                    },
                );
            }
        }

        let mut result = Ok(());
        for (batch_index, batch) in changed.chunks(MAX_BATCH_SIZE).enumerate() {
            let messages = batch
                .iter()
                .map(|(addr, value)| (addr.clone(), vec![value.clone()]))
                .collect();
            if let Err(e) = self.plane.send_bundle(messages) {
                warn!(error = %e, "failed to send device-state apply batch");
                result = Err(e);
                break;
            }
            if batch_index > 0 {
                std::thread::sleep(BATCH_SPACING);
            }
        }
        callback(result);
    }

    /// Updates the observed parameter in state, clears any drift record
    /// for it, and notifies listeners in registration order. This is the
    /// only path by which `parameter_map` changes after an
    /// `apply_configuration` send (the reconciliation protocol "waits for
    /// the device to echo the change").
    pub fn on_parameter_event(&self, address: &str, value: Value) {
        {
            let mut state = self.state.lock().unwrap();
            state.parameter_map.insert(address.to_string(), value.clone());
        }
        self.drifted.lock().unwrap().remove(address);
        for listener in self.listeners.lock().unwrap().iter_mut() {
            listener(address, &value);
        }
    }

    /// Parameters whose echo has not arrived within the echo timeout.
    pub fn drifted_parameters(&self) -> Vec<String> {
        let now = Instant::now();
        let timeout = self.echo_timeout;
        self.drifted
            .lock()
            .unwrap()
            .values()
            .filter(|d| now.duration_since(d.sent_at) > timeout)
            .map(|d| d.address.clone())
            .collect()
    }

    /// Healthy iff the base `DeviceState::is_healthy()` holds and no
    /// parameter is currently drifted.
    pub fn health_check(&self) -> bool {
        self.state.lock().unwrap().is_healthy() && self.drifted_parameters().is_empty()
    }

    /// Recovery from `Error` resets status to `Disconnected`; the caller
    /// is expected to call `query_full_state` afterward.
    pub fn recover_from_error(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.status == Status::Error {
            state.status = Status::Disconnected;
            true
        } else {
            false
        }
    }

    /// Issues a refresh command followed by a per-address query batch
    /// (e.g. per-channel volume/mute/pan), spaced by `BATCH_SPACING`,
    /// aggregating replies directly into this manager's `DeviceState` and
    /// invoking `callback` once every query has resolved (or timed out).
    pub fn query_full_state(
        self: &Arc<Self>,
        refresh_address: &str,
        parameter_addresses: Vec<String>,
        callback: impl FnOnce(EngineResult<DeviceState>) + Send + 'static,
    ) {
        if let Err(e) = self.plane.send(refresh_address, vec![]) {
            callback(Err(e));
            return;
        }
        info!(count = parameter_addresses.len(), "querying full device state");
        if parameter_addresses.is_empty() {
            callback(Ok(self.snapshot()));
            return;
        }

        let remaining = Arc::new(Mutex::new(parameter_addresses.len()));
        let callback = Arc::new(Mutex::new(Some(callback)));
        for address in parameter_addresses {
            let manager = self.clone();
            let remaining = remaining.clone();
            let callback = callback.clone();
            self.plane.query(
                &address,
                self.echo_timeout,
                Box::new(move |result| {
                    if let Ok(value) = result {
                        manager.state.lock().unwrap().parameter_map.insert(address, value);
                    }
                    let mut left = remaining.lock().unwrap();
                    *left -= 1;
                    if *left == 0 {
                        if let Some(cb) = callback.lock().unwrap().take() {
                            cb(Ok(manager.snapshot()));
                        }
                    }
                }),
            );
            std::thread::sleep(BATCH_SPACING);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockPlane {
        sent: Mutex<Vec<(String, Vec<Value>)>>,
        bundles_sent: AtomicUsize,
    }

    impl MockPlane {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                bundles_sent: AtomicUsize::new(0),
            }
        }
    }

    impl ParameterPlane for MockPlane {
        fn send(&self, address: &str, args: Vec<Value>) -> EngineResult<()> {
            self.sent.lock().unwrap().push((address.to_string(), args));
            Ok(())
        }

        fn query(
            &self,
            _address: &str,
            _timeout: Duration,
            callback: Box<dyn FnOnce(EngineResult<Value>) + Send>,
        ) {
            callback(Ok(Value::Float32(0.5)));
        }

        fn on_event(&self, _listener: Box<dyn FnMut(&str, Value) + Send>) {}

        fn send_bundle(&self, messages: Vec<(String, Vec<Value>)>) -> EngineResult<()> {
            self.bundles_sent.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().extend(messages);
            Ok(())
        }
    }

    fn command(address: &str, value: f64) -> ControlCommand {
        ControlCommand {
            address: address.to_string(),
            args: vec![serde_json::json!(value)],
        }
    }

    #[test]
    fn diff_only_includes_changed_parameters() {
        let plane = Arc::new(MockPlane::new());
        let mut state = DeviceState::new("dev", "GENERIC_OSC");
        state.parameter_map.insert("/ch/1/volume".into(), Value::Float32(0.5));
        let manager = DeviceStateManager::new(state, plane);

        let target = vec![command("/ch/1/volume", 0.5), command("/ch/2/mute", 1.0)];
        let changed = manager.diff(&target);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, "/ch/2/mute");
    }

    #[test]
    fn apply_configuration_sends_exactly_one_bundle_for_the_diff() {
        let plane = Arc::new(MockPlane::new());
        let mut state = DeviceState::new("dev", "GENERIC_OSC");
        state.parameter_map.insert("/ch/1/volume".into(), Value::Float32(0.5));
        let manager = DeviceStateManager::new(state, plane.clone());

        let target = vec![command("/ch/1/volume", 0.5), command("/ch/2/mute", 1.0)];
        let mut observed = None;
        manager.apply_configuration(&target, |result| observed = Some(result));
        assert!(observed.unwrap().is_ok());
        assert_eq!(plane.bundles_sent.load(Ordering::SeqCst), 1);
        assert_eq!(plane.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn on_parameter_event_clears_drift_and_notifies_listeners() {
        let plane = Arc::new(MockPlane::new());
        let state = DeviceState::new("dev", "GENERIC_OSC");
        let manager = Arc::new(DeviceStateManager::new(state, plane));
        let observed = Arc::new(Mutex::new(None));
        let observed_clone = observed.clone();
        manager.add_listener(Box::new(move |addr, value| {
            *observed_clone.lock().unwrap() = Some((addr.to_string(), value.clone()));
        }));

        manager.apply_configuration(&[command("/ch/2/mute", 1.0)], |_| {});
        assert_eq!(manager.drifted_parameters().len(), 0); // not yet past timeout

        manager.on_parameter_event("/ch/2/mute", Value::True);
        assert_eq!(
            *observed.lock().unwrap(),
            Some(("/ch/2/mute".to_string(), Value::True))
        );
    }

    #[test]
    fn health_check_fails_while_parameters_are_drifted() {
        let plane = Arc::new(MockPlane::new());
        let mut state = DeviceState::new("dev", "GENERIC_OSC");
        state.current_sample_rate = 48_000;
        state.current_block_size = 256;
        state.input_channel_count = 2;
        let manager = DeviceStateManager::new(state, plane).with_echo_timeout(Duration::from_millis(0));

        assert!(manager.health_check());
        manager.apply_configuration(&[command("/ch/1/volume", 0.9)], |_| {});
        std::thread::sleep(Duration::from_millis(5));
        assert!(!manager.health_check());
    }
}
