use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::{AudioBuffer, ChannelLayout, Layout, SampleFormat};
use crate::error::{EngineError, EngineResult};
use crate::graph::pad::Pad;

/// A newtype index into `Graph`'s node arena. Nodes reference each other
/// (via connections) through this id rather than through shared ownership,
/// resolving through the arena in place of cyclic `Rc`/`Arc` ownership
/// between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    HardwareSource,
    HardwareSink,
    FileSource,
    FileSink,
    FilterChain,
}

impl NodeKind {
    pub fn is_source(self) -> bool {
        matches!(self, NodeKind::HardwareSource | NodeKind::FileSource)
    }

    pub fn is_sink(self) -> bool {
        matches!(self, NodeKind::HardwareSink | NodeKind::FileSink)
    }

    pub fn is_intermediate(self) -> bool {
        !self.is_source() && !self.is_sink()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Created,
    Configured,
    Started,
    Stopped,
    Destroyed,
}

/// The (sample_rate, block_size, format, layout) a node was configured
/// with. Invariant for the lifetime of a graph run once `start()` succeeds
/// — changing it requires a full stop -> reconfigure -> start cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeFormat {
    pub sample_rate: u32,
    pub block_size: usize,
    pub internal_format: SampleFormat,
    pub internal_layout: Layout,
}

/// A capability a `filter_chain` node delegates DSP work to. The engine
/// ships no built-in DSP algorithms — this trait is the seam a caller
/// plugs an external filter implementation into.
pub trait FilterChain: Send {
    fn process(&mut self, inputs: &[Arc<AudioBuffer>], outputs: &mut [Option<Arc<AudioBuffer>>]);
}

pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub params: HashMap<String, String>,
    pub input_pads: Vec<Pad>,
    pub output_pads: Vec<Pad>,
    pub state: NodeState,
    pub runtime_format: Option<RuntimeFormat>,
    pub channel_layout: Option<ChannelLayout>,
    pub creation_index: usize,
    pub filter_chain: Option<Box<dyn FilterChain>>,
    /// For `hardware_source`/`hardware_sink` nodes: the hardware channel
    /// index each pad is bound to (parallel to `input_pads`/`output_pads`).
    pub hw_channels: Vec<usize>,
    pub media_source: Option<Box<dyn crate::media::MediaSource>>,
    pub media_sink: Option<Box<dyn crate::media::MediaSink>>,
}

impl Node {
    pub fn new(
        id: NodeId,
        name: String,
        kind: NodeKind,
        params: HashMap<String, String>,
        input_pad_count: usize,
        output_pad_count: usize,
        creation_index: usize,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            params,
            input_pads: (0..input_pad_count).map(Pad::input).collect(),
            output_pads: (0..output_pad_count).map(Pad::output).collect(),
            state: NodeState::Created,
            runtime_format: None,
            channel_layout: None,
            creation_index,
            filter_chain: None,
            hw_channels: Vec::new(),
            media_source: None,
            media_sink: None,
        }
    }

    pub fn configure(
        &mut self,
        format: RuntimeFormat,
        layout: ChannelLayout,
    ) -> EngineResult<()> {
        if self.state == NodeState::Started {
            return Err(EngineError::Busy(self.name.clone()));
        }
        self.runtime_format = Some(format);
        self.channel_layout = Some(layout);
        self.state = NodeState::Configured;
        Ok(())
    }

    pub fn start(&mut self) -> EngineResult<()> {
        match self.state {
            NodeState::Created => Err(EngineError::NotConfigured(self.name.clone())),
            NodeState::Started => Err(EngineError::AlreadyRunning(self.name.clone())),
            _ => {
                self.state = NodeState::Started;
                Ok(())
            }
        }
    }

    pub fn stop(&mut self) -> EngineResult<()> {
        self.state = NodeState::Stopped;
        Ok(())
    }

    pub fn destroy(&mut self) {
        self.state = NodeState::Destroyed;
    }

    pub fn layout(&self) -> Layout {
        self.runtime_format
            .map(|f| f.internal_layout)
            .unwrap_or(Layout::Interleaved)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish()
    }
}
