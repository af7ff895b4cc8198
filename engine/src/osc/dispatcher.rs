//! Pattern-based method dispatch over decoded OSC packets. One
//! `Dispatcher` is shared (behind a mutex) between the server's receive
//! loop and whoever registers methods.

use crate::osc::codec::{OscBundle, OscElement, OscMessage, OscPacket};
use crate::osc::pattern;
use crate::osc::value::TimeTag;

pub type MethodId = u64;

struct Method {
    id: MethodId,
    pattern: String,
    /// Empty means "accept any type tag string".
    type_spec: String,
    handler: Box<dyn FnMut(&OscMessage) + Send>,
}

/// Registers handlers and routes every incoming `OscMessage`/`OscBundle`
/// to the ones whose pattern and type spec match, invoking every matching
/// method in registration order.
pub struct Dispatcher {
    methods: Vec<Method>,
    next_id: MethodId,
    default_handler: Option<Box<dyn FnMut(&OscMessage) + Send>>,
    bundle_start: Option<Box<dyn FnMut(TimeTag) + Send>>,
    bundle_end: Option<Box<dyn FnMut() + Send>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            next_id: 0,
            default_handler: None,
            bundle_start: None,
            bundle_end: None,
        }
    }

    /// `type_spec`: empty string accepts any argument types; otherwise it
    /// must be a prefix of the incoming message's type tag string
    /// (including the leading `,`).
    pub fn add_method(
        &mut self,
        pattern: impl Into<String>,
        type_spec: impl Into<String>,
        handler: Box<dyn FnMut(&OscMessage) + Send>,
    ) -> MethodId {
        let id = self.next_id;
        self.next_id += 1;
        self.methods.push(Method {
            id,
            pattern: pattern.into(),
            type_spec: type_spec.into(),
            handler,
        });
        id
    }

    pub fn remove_method(&mut self, id: MethodId) {
        self.methods.retain(|m| m.id != id);
    }

    pub fn set_default_handler(&mut self, handler: Box<dyn FnMut(&OscMessage) + Send>) {
        self.default_handler = Some(handler);
    }

    pub fn set_bundle_start_handler(&mut self, handler: Box<dyn FnMut(TimeTag) + Send>) {
        self.bundle_start = Some(handler);
    }

    pub fn set_bundle_end_handler(&mut self, handler: Box<dyn FnMut() + Send>) {
        self.bundle_end = Some(handler);
    }

    pub fn dispatch_packet(&mut self, packet: &OscPacket) {
        match packet {
            OscPacket::Message(m) => self.dispatch_message(m),
            OscPacket::Bundle(b) => self.dispatch_bundle(b),
        }
    }

    fn dispatch_bundle(&mut self, bundle: &OscBundle) {
        if let Some(start) = self.bundle_start.as_mut() {
            start(bundle.time_tag);
        }
        for element in &bundle.elements {
            match element {
                OscElement::Message(m) => self.dispatch_message(m),
                OscElement::Bundle(b) => self.dispatch_bundle(b),
            }
        }
        if let Some(end) = self.bundle_end.as_mut() {
            end();
        }
    }

    fn dispatch_message(&mut self, msg: &OscMessage) {
        let incoming_types = msg.type_tag_string();
        let mut matched_any = false;
        for method in self.methods.iter_mut() {
            if !pattern::matches(&method.pattern, &msg.address) {
                continue;
            }
            if !method.type_spec.is_empty() && !incoming_types.starts_with(&method.type_spec) {
                continue;
            }
            matched_any = true;
            (method.handler)(msg);
        }
        if !matched_any {
            if let Some(default) = self.default_handler.as_mut() {
                default(msg);
            }
        }
    }
}
