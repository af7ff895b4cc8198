//! The owning adapter between a `HardwareSession`'s driver callback and
//! `Graph::process_block`.
//!
//! Rather than a process-global driver handle reached through a static,
//! one `HardwareSessionBridge` owns the session trait object and brackets
//! its lifetime to the lifetime of the bridge itself.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::graph::Graph;
use crate::hw::session::HardwareSession;

/// Owns the loaded driver session and the double-buffer index the driver
/// callback and the graph thread coordinate through.
///
/// The hardware callback thread writes into buffer slot N while the
/// engine reads slot N-1: `current` is the slot index the *next*
/// `process_block` should operate on; the driver callback is expected to
/// call `advance()` once per hardware period.
pub struct HardwareSessionBridge {
    session: Box<dyn HardwareSession>,
    current: Arc<AtomicU8>,
    active_inputs: Vec<usize>,
    active_outputs: Vec<usize>,
}

impl HardwareSessionBridge {
    pub fn new(session: Box<dyn HardwareSession>) -> Self {
        Self {
            session,
            current: Arc::new(AtomicU8::new(0)),
            active_inputs: Vec::new(),
            active_outputs: Vec::new(),
        }
    }

    pub fn load(&mut self, name: &str) -> EngineResult<()> {
        self.session
            .load(name)
            .map_err(|e| EngineError::HardwareLoadError(e.to_string()))
    }

    pub fn initialize(&mut self, preferred_rate: u32, preferred_block_size: usize) -> EngineResult<()> {
        self.session
            .initialize(preferred_rate, preferred_block_size)
            .map_err(|e| EngineError::HardwareInitError(e.to_string()))
    }

    /// Recomputes which hardware channels are actually wired to a
    /// `hardware_source`/`hardware_sink` node's pads and calls
    /// `prepare_buffers` with that set — done once at configure time and
    /// again whenever the active pad wiring changes, not per block.
    pub fn prepare_for_graph(&mut self, graph: &Graph) -> EngineResult<()> {
        let (inputs, outputs) = graph.active_hardware_channels();
        self.active_inputs = inputs;
        self.active_outputs = outputs;
        self.session
            .prepare_buffers(&self.active_inputs, &self.active_outputs)
    }

    pub fn start(&mut self) -> EngineResult<()> {
        info!(
            in_channels = self.active_inputs.len(),
            out_channels = self.active_outputs.len(),
            "starting hardware session"
        );
        self.session.start()
    }

    /// Silences the driver callback before returning, so the caller can
    /// safely join the audio thread afterward.
    pub fn stop(&mut self) -> EngineResult<()> {
        self.session.stop()
    }

    pub fn native_format(&self) -> crate::buffer::NativeFormat {
        self.session.native_format()
    }

    /// Called from the driver's callback once per hardware period. Runs
    /// one `process_block` against the slot the driver just finished
    /// filling, then flips the double-buffer index for the next period.
    pub fn on_callback(&mut self, graph: &mut Graph) {
        let buffer_index = self.current.load(Ordering::Acquire);
        graph.process_block(buffer_index, Some(self.session.as_mut()));
        self.current.store(1 - buffer_index, Ordering::Release);
    }

    pub fn current_buffer_index(&self) -> u8 {
        self.current.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for HardwareSessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSessionBridge")
            .field("active_inputs", &self.active_inputs)
            .field("active_outputs", &self.active_outputs)
            .finish()
    }
}
