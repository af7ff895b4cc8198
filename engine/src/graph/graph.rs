use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::warn;

use crate::buffer::{self, AudioBuffer, ChannelLayout, ChannelPolicy, Layout, SampleFormat};
use crate::error::{EngineError, EngineResult};
use crate::graph::connection::Connection;
use crate::graph::node::{Node, NodeId, NodeKind, NodeState, RuntimeFormat};
use crate::hw::session::HardwareSession;
use crate::param_queue::ParamUpdateConsumer;
use crate::routing::would_create_cycle;

/// The node set, connections, and derived topological schedule.
///
/// Arena-indexed by `NodeId` (never by shared pointer) so node-to-node
/// references never form an ownership cycle.
pub struct Graph {
    nodes: Vec<Option<Node>>,
    name_index: HashMap<String, NodeId>,
    connections: Vec<Connection>,
    /// Topological order over intermediate (filter_chain) nodes only.
    topo_order: Vec<NodeId>,
    next_creation_index: usize,
    format: Option<RuntimeFormat>,
    channel_layout: Option<ChannelLayout>,
    param_updates: Option<ParamUpdateConsumer>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            name_index: HashMap::new(),
            connections: Vec::new(),
            topo_order: Vec::new(),
            next_creation_index: 0,
            format: None,
            channel_layout: None,
            param_updates: None,
        }
    }

    /// Wires the consumer half of a parameter-update queue into the graph;
    /// `process_block` drains it at the top of every tick. Replaces any
    /// previously attached consumer.
    pub fn attach_param_queue(&mut self, consumer: ParamUpdateConsumer) {
        self.param_updates = Some(consumer);
    }

    /// Applies every pending parameter update to its target node's params
    /// map. Called at the top of `process_block`; a no-op if no queue was
    /// attached, or once it runs dry for this tick.
    fn drain_param_updates(&mut self) {
        let Some(consumer) = self.param_updates.as_mut() else {
            return;
        };
        let mut updates = Vec::new();
        consumer.drain(|update| updates.push(update));
        for update in updates {
            if let Some(node) = self.node_mut(update.node) {
                node.params.insert(update.key, update.value);
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.name_index.get(name).and_then(|id| self.node(*id))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.name_index.get(name).copied()
    }

    pub fn create_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        params: HashMap<String, String>,
        input_pads: usize,
        output_pads: usize,
    ) -> EngineResult<NodeId> {
        if self.name_index.contains_key(name) {
            return Err(EngineError::DuplicateName(name.to_string()));
        }
        let id = NodeId(self.nodes.len());
        let node = Node::new(
            id,
            name.to_string(),
            kind,
            params,
            input_pads,
            output_pads,
            self.next_creation_index,
        );
        self.next_creation_index += 1;
        self.nodes.push(Some(node));
        self.name_index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn bind_hardware_channels(&mut self, name: &str, channels: Vec<usize>) -> EngineResult<()> {
        let node = self
            .name_index
            .get(name)
            .copied()
            .and_then(|id| self.node_mut(id))
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        node.hw_channels = channels;
        Ok(())
    }

    pub fn attach_media_source(
        &mut self,
        name: &str,
        source: Box<dyn crate::media::MediaSource>,
    ) -> EngineResult<()> {
        let node = self
            .name_index
            .get(name)
            .copied()
            .and_then(|id| self.node_mut(id))
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        node.media_source = Some(source);
        Ok(())
    }

    pub fn attach_media_sink(
        &mut self,
        name: &str,
        sink: Box<dyn crate::media::MediaSink>,
    ) -> EngineResult<()> {
        let node = self
            .name_index
            .get(name)
            .copied()
            .and_then(|id| self.node_mut(id))
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        node.media_sink = Some(sink);
        Ok(())
    }

    pub fn attach_filter_chain(
        &mut self,
        name: &str,
        filter: Box<dyn crate::graph::node::FilterChain>,
    ) -> EngineResult<()> {
        let node = self
            .name_index
            .get(name)
            .copied()
            .and_then(|id| self.node_mut(id))
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        node.filter_chain = Some(filter);
        Ok(())
    }

    fn pad_count(&self, id: NodeId, output: bool) -> usize {
        self.node(id)
            .map(|n| if output { n.output_pads.len() } else { n.input_pads.len() })
            .unwrap_or(0)
    }

    pub fn connect(
        &mut self,
        source_name: &str,
        source_pad: usize,
        sink_name: &str,
        sink_pad: usize,
        format_conversion_allowed: bool,
    ) -> EngineResult<()> {
        let source_id = self
            .name_index
            .get(source_name)
            .copied()
            .ok_or_else(|| EngineError::UnknownNode(source_name.to_string()))?;
        let sink_id = self
            .name_index
            .get(sink_name)
            .copied()
            .ok_or_else(|| EngineError::UnknownNode(sink_name.to_string()))?;

        let source_pads = self.pad_count(source_id, true);
        if source_pad >= source_pads {
            return Err(EngineError::PadIndexOutOfRange {
                node: source_name.to_string(),
                index: source_pad,
                available: source_pads,
            });
        }
        let sink_pads = self.pad_count(sink_id, false);
        if sink_pad >= sink_pads {
            return Err(EngineError::PadIndexOutOfRange {
                node: sink_name.to_string(),
                index: sink_pad,
                available: sink_pads,
            });
        }
        if self
            .node(sink_id)
            .map(|n| n.input_pads[sink_pad].is_connected())
            .unwrap_or(false)
        {
            return Err(EngineError::PadAlreadyConnected {
                node: sink_name.to_string(),
                index: sink_pad,
            });
        }

        if would_create_cycle(&source_id, &sink_id, |node| self.consumer_neighbors(*node)) {
            return Err(EngineError::WouldCreateCycle {
                from: source_name.to_string(),
                to: sink_name.to_string(),
            });
        }

        self.connections.push(Connection {
            source_node: source_id,
            source_pad,
            sink_node: sink_id,
            sink_pad,
            format_conversion_allowed,
        });
        if let Some(sink) = self.node_mut(sink_id) {
            sink.input_pads[sink_pad].source = Some((source_id, source_pad));
        }
        self.recompute_topo_order();
        Ok(())
    }

    pub fn disconnect(
        &mut self,
        source_name: &str,
        source_pad: usize,
        sink_name: &str,
        sink_pad: usize,
    ) -> EngineResult<()> {
        let source_id = self
            .name_index
            .get(source_name)
            .copied()
            .ok_or_else(|| EngineError::UnknownNode(source_name.to_string()))?;
        let sink_id = self
            .name_index
            .get(sink_name)
            .copied()
            .ok_or_else(|| EngineError::UnknownNode(sink_name.to_string()))?;
        self.connections.retain(|c| {
            !(c.source_node == source_id
                && c.source_pad == source_pad
                && c.sink_node == sink_id
                && c.sink_pad == sink_pad)
        });
        if let Some(sink) = self.node_mut(sink_id) {
            if let Some(pad) = sink.input_pads.get_mut(sink_pad) {
                pad.source = None;
            }
        }
        self.recompute_topo_order();
        Ok(())
    }

    /// Nodes whose input is fed directly from an output pad of `node`.
    fn consumer_neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|c| c.source_node == node)
            .map(|c| c.sink_node)
            .collect()
    }

    /// Kahn's algorithm over intermediate (filter_chain) nodes, breaking
    /// ties by node-creation order — always popping the lowest-creation-index
    /// zero-indegree node keeps the tie-break exact rather than incidental
    /// to a particular queue implementation.
    fn recompute_topo_order(&mut self) {
        let intermediate_ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter_map(|n| n.as_ref())
            .filter(|n| n.kind.is_intermediate())
            .map(|n| n.id)
            .collect();

        let mut indegree: HashMap<NodeId, usize> =
            intermediate_ids.iter().map(|id| (*id, 0)).collect();
        for c in &self.connections {
            if indegree.contains_key(&c.sink_node) && indegree.contains_key(&c.source_node) {
                *indegree.get_mut(&c.sink_node).unwrap() += 1;
            }
        }

        let mut ready: Vec<NodeId> = intermediate_ids
            .iter()
            .copied()
            .filter(|id| indegree[id] == 0)
            .collect();
        ready.sort_by_key(|id| self.node(*id).map(|n| n.creation_index).unwrap_or(usize::MAX));

        let mut order = Vec::with_capacity(intermediate_ids.len());
        let mut pending = ready.into_iter().collect::<VecDeque<_>>();
        while let Some(id) = pending.pop_front() {
            order.push(id);
            let mut newly_ready = Vec::new();
            for c in &self.connections {
                if c.source_node == id && indegree.contains_key(&c.sink_node) {
                    let e = indegree.get_mut(&c.sink_node).unwrap();
                    *e -= 1;
                    if *e == 0 {
                        newly_ready.push(c.sink_node);
                    }
                }
            }
            newly_ready.sort_by_key(|id| self.node(*id).map(|n| n.creation_index).unwrap_or(usize::MAX));
            // Re-sort the whole pending deque so the lowest creation index
            // among ALL currently-ready nodes is popped next, not just
            // among nodes that became ready this step.
            let mut all: Vec<NodeId> = pending.into_iter().chain(newly_ready).collect();
            all.sort_by_key(|id| self.node(*id).map(|n| n.creation_index).unwrap_or(usize::MAX));
            pending = all.into_iter().collect();
        }
        self.topo_order = order;
    }

    pub fn configure_all(
        &mut self,
        sample_rate: u32,
        block_size: usize,
        internal_format: SampleFormat,
        internal_layout: Layout,
        channel_layout: ChannelLayout,
    ) -> EngineResult<()> {
        let fmt = RuntimeFormat {
            sample_rate,
            block_size,
            internal_format,
            internal_layout,
        };
        for slot in self.nodes.iter_mut() {
            if let Some(node) = slot {
                node.configure(fmt, channel_layout.clone())?;
            }
        }
        self.format = Some(fmt);
        self.channel_layout = Some(channel_layout);
        Ok(())
    }

    /// Sources -> intermediates (topological order) -> sinks.
    pub fn start(&mut self) -> EngineResult<()> {
        let order = self.start_order();
        for id in order {
            if let Some(node) = self.node_mut(id) {
                node.start()?;
            }
        }
        Ok(())
    }

    /// Reverse of `start()`'s order.
    pub fn stop(&mut self) -> EngineResult<()> {
        let mut order = self.start_order();
        order.reverse();
        for id in order {
            if let Some(node) = self.node_mut(id) {
                node.stop()?;
            }
        }
        Ok(())
    }

    fn start_order(&self) -> Vec<NodeId> {
        let mut sources: Vec<NodeId> = self
            .nodes
            .iter()
            .filter_map(|n| n.as_ref())
            .filter(|n| n.kind.is_source())
            .map(|n| n.id)
            .collect();
        sources.sort_by_key(|id| self.node(*id).unwrap().creation_index);
        let mut sinks: Vec<NodeId> = self
            .nodes
            .iter()
            .filter_map(|n| n.as_ref())
            .filter(|n| n.kind.is_sink())
            .map(|n| n.id)
            .collect();
        sinks.sort_by_key(|id| self.node(*id).unwrap().creation_index);
        let mut order = sources;
        order.extend(self.topo_order.iter().copied());
        order.extend(sinks);
        order
    }

    fn internal_format(&self) -> (SampleFormat, Layout, ChannelLayout) {
        let fmt = self.format.unwrap_or(RuntimeFormat {
            sample_rate: 48_000,
            block_size: 512,
            internal_format: SampleFormat::F32,
            internal_layout: Layout::Interleaved,
        });
        let layout = self.channel_layout.clone().unwrap_or(ChannelLayout::stereo());
        (fmt.internal_format, fmt.internal_layout, layout)
    }

    fn silence(&self) -> Arc<AudioBuffer> {
        let (format, layout, channel_layout) = self.internal_format();
        let frames = self.format.map(|f| f.block_size).unwrap_or(512);
        let rate = self.format.map(|f| f.sample_rate).unwrap_or(48_000);
        AudioBuffer::silence(format, layout, channel_layout, rate, frames)
    }

    /// The heart of the runtime: pull hardware input, run every
    /// intermediate in topological order, push hardware output, and let
    /// file source/sink nodes observe/enqueue. `hw` is `None` when driving
    /// the graph from the file-processing loop with no hardware present.
    pub fn process_block(&mut self, buffer_index: u8, hw: Option<&mut dyn HardwareSession>) {
        self.drain_param_updates();
        self.pull_hardware_sources(buffer_index, hw.as_deref());
        self.observe_file_sources();
        self.run_intermediates();
        if let Some(hw) = hw {
            self.push_hardware_sinks(buffer_index, hw);
        }
        self.drain_file_sinks();
    }

    fn pull_hardware_sources(&mut self, buffer_index: u8, hw: Option<&dyn HardwareSession>) {
        let (format, layout, _) = self.internal_format();
        let native_format = hw.map(|h| h.native_format());
        let frames = self.format.map(|f| f.block_size).unwrap_or(512);
        let rate = self.format.map(|f| f.sample_rate).unwrap_or(48_000);

        let source_ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter_map(|n| n.as_ref())
            .filter(|n| n.kind == NodeKind::HardwareSource)
            .map(|n| n.id)
            .collect();

        for id in source_ids {
            let Some(hw) = hw else { continue };
            let Some(node) = self.node_mut(id) else { continue };
            let native_fmt = native_format.unwrap();
            let channel_layout = node
                .channel_layout
                .clone()
                .unwrap_or_else(ChannelLayout::stereo);
            let num_out_pads = node.output_pads.len();
            for pad_idx in 0..num_out_pads {
                let hw_channel = node.hw_channels.get(pad_idx).copied();
                let buf = match hw_channel.and_then(|ch| hw.read_input(ch, buffer_index)) {
                    Some(bytes) => {
                        let mut native = AudioBuffer::new(
                            match native_fmt {
                                crate::buffer::NativeFormat::S16Le => SampleFormat::S16,
                                crate::buffer::NativeFormat::S24Le => SampleFormat::S24In32,
                                crate::buffer::NativeFormat::S32Le => SampleFormat::S32,
                                crate::buffer::NativeFormat::F32Le => SampleFormat::F32,
                                crate::buffer::NativeFormat::F64Le => SampleFormat::F64,
                            },
                            Layout::Interleaved,
                            ChannelLayout::mono(),
                            rate,
                            frames,
                        );
                        if let crate::buffer::BufferData::Interleaved(region) = &mut native.data {
                            let take = region.len().min(bytes.len());
                            region[..take].copy_from_slice(&bytes[..take]);
                        }
                        Arc::new(buffer::convert(
                            &native,
                            format,
                            layout,
                            ChannelLayout::mono(),
                            ChannelPolicy::SumExtrasIntoFirst,
                        ))
                    }
                    None => {
                        if hw_channel.is_some() {
                            warn!(node = %node.name, pad = pad_idx, "null hardware input buffer, filling silence");
                        }
                        AudioBuffer::silence(format, layout, channel_layout.clone(), rate, frames)
                    }
                };
                node.output_pads[pad_idx].slot = Some(buf);
            }
        }
    }

    fn observe_file_sources(&mut self) {
        for slot in self.nodes.iter_mut() {
            let Some(node) = slot else { continue };
            if node.kind != NodeKind::FileSource {
                continue;
            }
            for pad in node.output_pads.iter_mut() {
                if let Some(source) = node.media_source.as_mut() {
                    if let Some(buf) = source.try_next() {
                        pad.slot = Some(buf);
                        continue;
                    }
                }
                // No fresh block: leave the previous slot's silence
                // fallback in place rather than fabricate new silence
                // every tick when idle.
            }
        }
    }

    fn run_intermediates(&mut self) {
        let (format, layout, channel_layout) = self.internal_format();
        let frames = self.format.map(|f| f.block_size).unwrap_or(512);
        let rate = self.format.map(|f| f.sample_rate).unwrap_or(48_000);

        let order = self.topo_order.clone();
        for id in order {
            // Gather inputs from each connected producer's current slot.
            let input_count = self.node(id).map(|n| n.input_pads.len()).unwrap_or(0);
            let mut inputs = Vec::with_capacity(input_count);
            for pad_idx in 0..input_count {
                let source = self.node(id).and_then(|n| n.input_pads[pad_idx].source);
                let buf = match source {
                    Some((src_node, src_pad)) => self
                        .node(src_node)
                        .and_then(|n| n.output_pads.get(src_pad))
                        .and_then(|p| p.slot.clone())
                        .unwrap_or_else(|| {
                            AudioBuffer::silence(format, layout, channel_layout.clone(), rate, frames)
                        }),
                    None => AudioBuffer::silence(format, layout, channel_layout.clone(), rate, frames),
                };
                inputs.push(buf);
            }

            let Some(node) = self.node_mut(id) else { continue };
            for (idx, buf) in inputs.iter().enumerate() {
                node.input_pads[idx].slot = Some(buf.clone());
            }
            let output_count = node.output_pads.len();
            let mut outputs: Vec<Option<Arc<AudioBuffer>>> = vec![None; output_count];
            let failed = if let Some(filter) = node.filter_chain.as_mut() {
                filter.process(&inputs, &mut outputs);
                false
            } else {
                // No filter attached: a configured-but-unimplemented
                // filter_chain node is a per-node failure for this tick.
                true
            };
            if failed {
                warn!(node = %node.name, "filter_chain node has no attached filter; publishing silence");
            }
            for (idx, out) in outputs.into_iter().enumerate() {
                node.output_pads[idx].slot = Some(out.unwrap_or_else(|| {
                    AudioBuffer::silence(format, layout, channel_layout.clone(), rate, frames)
                }));
            }
        }
    }

    fn push_hardware_sinks(&mut self, buffer_index: u8, hw: &mut dyn HardwareSession) {
        let native_format = hw.native_format();
        let sink_ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter_map(|n| n.as_ref())
            .filter(|n| n.kind == NodeKind::HardwareSink)
            .map(|n| n.id)
            .collect();

        for id in sink_ids {
            let Some(node) = self.node(id) else { continue };
            let num_in_pads = node.input_pads.len();
            for pad_idx in 0..num_in_pads {
                let hw_channel = node.hw_channels.get(pad_idx).copied();
                let Some(hw_channel) = hw_channel else { continue };
                let internal = node.input_pads[pad_idx]
                    .source
                    .and_then(|(src, src_pad)| {
                        self.node(src).and_then(|n| n.output_pads.get(src_pad)).and_then(|p| p.slot.clone())
                    });
                let Some(internal) = internal else {
                    // No upstream producer: silence, never indeterminate.
                    continue;
                };
                let native_sample_format = match native_format {
                    crate::buffer::NativeFormat::S16Le => SampleFormat::S16,
                    crate::buffer::NativeFormat::S24Le => SampleFormat::S24In32,
                    crate::buffer::NativeFormat::S32Le => SampleFormat::S32,
                    crate::buffer::NativeFormat::F32Le => SampleFormat::F32,
                    crate::buffer::NativeFormat::F64Le => SampleFormat::F64,
                };
                let native = buffer::convert(
                    &internal,
                    native_sample_format,
                    Layout::Interleaved,
                    ChannelLayout::mono(),
                    ChannelPolicy::SumExtrasIntoFirst,
                );
                if let crate::buffer::BufferData::Interleaved(bytes) = &native.data {
                    hw.write_output(hw_channel, buffer_index, bytes);
                }
            }
        }
    }

    fn drain_file_sinks(&mut self) {
        for slot in self.nodes.iter_mut() {
            let Some(node) = slot else { continue };
            if node.kind != NodeKind::FileSink {
                continue;
            }
            for pad_idx in 0..node.input_pads.len() {
                let source = node.input_pads[pad_idx].source;
                let buf = match source {
                    Some((src, src_pad)) => node.input_pads[pad_idx].slot.clone().or_else(|| {
                        let _ = (src, src_pad);
                        None
                    }),
                    None => None,
                };
                if let (Some(buf), Some(sink)) = (buf, node.media_sink.as_mut()) {
                    sink.push(buf);
                }
            }
        }
    }

    /// The hardware channel indices currently bound to any
    /// `hardware_source` output pad / `hardware_sink` input pad,
    /// deduplicated. Used by the bridge to call `prepare_buffers`.
    pub fn active_hardware_channels(&self) -> (Vec<usize>, Vec<usize>) {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for node in self.nodes.iter().filter_map(|n| n.as_ref()) {
            match node.kind {
                NodeKind::HardwareSource => inputs.extend(node.hw_channels.iter().copied()),
                NodeKind::HardwareSink => outputs.extend(node.hw_channels.iter().copied()),
                _ => {}
            }
        }
        inputs.sort_unstable();
        inputs.dedup();
        outputs.sort_unstable();
        outputs.dedup();
        (inputs, outputs)
    }

    pub fn topo_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn node_state(&self, name: &str) -> Option<NodeState> {
        self.node_by_name(name).map(|n| n.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_queue::{param_update_channel, ParamUpdate};
    use std::collections::HashMap;

    #[test]
    fn connecting_an_already_connected_input_pad_is_rejected() {
        let mut g = Graph::new();
        g.create_node("a", NodeKind::HardwareSource, HashMap::new(), 0, 1).unwrap();
        g.create_node("b", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
        g.create_node("c", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
        g.connect("a", 0, "b", 0, false).unwrap();
        let err = g.connect("c", 0, "b", 0, false).unwrap_err();
        assert_eq!(
            err,
            EngineError::PadAlreadyConnected {
                node: "b".to_string(),
                index: 0,
            }
        );
    }

    #[test]
    fn connecting_would_create_cycle_is_rejected() {
        let mut g = Graph::new();
        g.create_node("a", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
        g.create_node("b", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
        g.connect("a", 0, "b", 0, false).unwrap();
        assert!(matches!(
            g.connect("b", 0, "a", 0, false),
            Err(EngineError::WouldCreateCycle { .. })
        ));
    }

    #[test]
    fn topo_order_breaks_ties_by_creation_order() {
        let mut g = Graph::new();
        // Both "first" and "second" start with zero indegree; "first" was
        // created earlier and must be scheduled first.
        g.create_node("first", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
        g.create_node("second", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
        let order: Vec<&str> = g
            .topo_order()
            .iter()
            .map(|id| g.node(*id).unwrap().name.as_str())
            .collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn process_block_drains_queued_param_updates_before_running_intermediates() {
        let mut g = Graph::new();
        let id = g
            .create_node("chain", NodeKind::FilterChain, HashMap::new(), 1, 1)
            .unwrap();
        let (mut producer, consumer) = param_update_channel();
        g.attach_param_queue(consumer);
        producer.push(ParamUpdate {
            node: id,
            key: "gain".to_string(),
            value: "0.25".to_string(),
        });

        g.configure_all(
            48_000,
            64,
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout::stereo(),
        )
        .unwrap();
        g.process_block(0, None);

        assert_eq!(g.node(id).unwrap().params.get("gain").map(String::as_str), Some("0.25"));
    }
}
