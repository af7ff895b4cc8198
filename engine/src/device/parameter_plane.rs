//! The "parameter plane" capability: a reference to an OSC controller (or,
//! more abstractly, anything that exposes `send(address, args)`,
//! `query(address, callback)`, and `on_event(callback)`). `DeviceStateManager`
//! is built against this trait rather than the concrete OSC server so a
//! test double can stand in for the reconciliation tests.

use std::time::Duration;

use crate::error::EngineResult;
use crate::osc::Value;

pub trait ParameterPlane: Send + Sync {
    fn send(&self, address: &str, args: Vec<Value>) -> EngineResult<()>;

    /// Issues a query and invokes `callback` once with the result — either
    /// the device's reply or a timeout error. Never blocks the caller.
    fn query(&self, address: &str, timeout: Duration, callback: Box<dyn FnOnce(EngineResult<Value>) + Send>);

    /// Registers a listener invoked for every observed parameter event
    /// (an incoming OSC message the dispatcher routed to the "observed
    /// parameter changed" method). Listeners are called in registration
    /// order.
    fn on_event(&self, listener: Box<dyn FnMut(&str, Value) + Send>);

    /// Sends `messages` as a single immediate-execution bundle, batched
    /// into bundles of at most `MAX_BATCH_SIZE` messages. Callers are
    /// responsible for keeping each batch at or under that size; this
    /// just performs one wire send.
    fn send_bundle(&self, messages: Vec<(String, Vec<Value>)>) -> EngineResult<()>;
}

/// The concrete `ParameterPlane` backed by a running OSC `Server`.
pub struct OscParameterPlane {
    server: std::sync::Arc<crate::osc::Server>,
    runtime: tokio::runtime::Handle,
    listeners: std::sync::Mutex<Vec<Box<dyn FnMut(&str, Value) + Send>>>,
}

impl OscParameterPlane {
    pub fn new(server: std::sync::Arc<crate::osc::Server>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            server,
            runtime,
            listeners: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Invoked by the dispatcher's parameter-event method. Not part of
    /// `ParameterPlane` itself — this is the feed side `on_event`
    /// listeners observe.
    pub fn notify_event(&self, address: &str, value: Value) {
        let mut listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter_mut() {
            listener(address, value.clone());
        }
    }
}

impl ParameterPlane for OscParameterPlane {
    fn send(&self, address: &str, args: Vec<Value>) -> EngineResult<()> {
        use crate::osc::{OscMessage, OscPacket};
        self.server
            .send_packet(&OscPacket::Message(OscMessage::new(address, args)))
    }

    fn query(
        &self,
        address: &str,
        timeout: Duration,
        callback: Box<dyn FnOnce(EngineResult<Value>) + Send>,
    ) {
        let server = self.server.clone();
        let address = address.to_string();
        self.runtime.spawn(async move {
            let result = server.query(&address, timeout).await;
            callback(result);
        });
    }

    fn on_event(&self, listener: Box<dyn FnMut(&str, Value) + Send>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn send_bundle(&self, messages: Vec<(String, Vec<Value>)>) -> EngineResult<()> {
        use crate::osc::{OscBundle, OscElement, OscMessage, OscPacket, TimeTag};
        let bundle = OscBundle {
            time_tag: TimeTag::IMMEDIATE,
            elements: messages
                .into_iter()
                .map(|(address, args)| OscElement::Message(OscMessage::new(address, args)))
                .collect(),
        };
        self.server.send_packet(&OscPacket::Bundle(bundle))
    }
}
