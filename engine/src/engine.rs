//! `Engine`: the top-level object that owns the graph, the hardware
//! session bridge, the OSC control plane, and the device state manager,
//! and sequences their lifecycles.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::buffer::{ChannelLayout, ChannelId, Layout, SampleFormat};
use crate::config::{Configuration, ConnectionConfig, ControlCommand, DeviceType, InternalFormatKind, NodeConfig};
use crate::device::{DeviceState, DeviceStateManager, OscParameterPlane};
use crate::error::{EngineError, EngineResult};
use crate::graph::{Graph, NodeId, NodeKind};
use crate::hw::session::HardwareSession;
use crate::hw::HardwareSessionBridge;
use crate::mutex::UnsafeMutex;
use crate::param_queue::{param_update_channel, ParamUpdate, ParamUpdateProducer};
use crate::osc::{Server, Transport};

/// Default join timeout for every shutdown step.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

fn node_kind_from_str(node_type: &str) -> EngineResult<NodeKind> {
    match node_type {
        "hardware_source" => Ok(NodeKind::HardwareSource),
        "hardware_sink" => Ok(NodeKind::HardwareSink),
        "file_source" => Ok(NodeKind::FileSource),
        "file_sink" => Ok(NodeKind::FileSink),
        "filter_chain" => Ok(NodeKind::FilterChain),
        other => Err(EngineError::UnknownType(other.to_string())),
    }
}

fn sample_format_from_kind(kind: InternalFormatKind) -> SampleFormat {
    match kind {
        InternalFormatKind::F32 => SampleFormat::F32,
        InternalFormatKind::F64 => SampleFormat::F64,
        InternalFormatKind::S16 => SampleFormat::S16,
        InternalFormatKind::S32 => SampleFormat::S32,
    }
}

/// Parses the `internalLayout` string (`"mono"`, `"stereo"`, `"5.1"`, or a
/// bare channel count) into a `ChannelLayout`. Anything not named falls
/// back to stereo.
fn channel_layout_from_str(layout: &str) -> ChannelLayout {
    match layout {
        "mono" => ChannelLayout::mono(),
        "stereo" => ChannelLayout::stereo(),
        "5.1" => ChannelLayout {
            channels: vec![
                ChannelId::FrontLeft,
                ChannelId::FrontRight,
                ChannelId::Center,
                ChannelId::Lfe,
                ChannelId::SurroundLeft,
                ChannelId::SurroundRight,
            ],
        },
        other => match other.parse::<u16>() {
            Ok(0) => ChannelLayout::stereo(),
            Ok(1) => ChannelLayout::mono(),
            Ok(n) => ChannelLayout {
                channels: (0..n).map(ChannelId::Other).collect(),
            },
            Err(_) => ChannelLayout::stereo(),
        },
    }
}

pub fn device_type_str(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::Asio => "ASIO",
        DeviceType::GenericOsc => "GENERIC_OSC",
        DeviceType::RmeTotalmix => "RME_TOTALMIX",
    }
}

/// Joins `handle` on a wrapper thread so a hung thread doesn't stall
/// shutdown past `timeout`. Mirrors `osc::Server::join`'s wrapper-thread
/// pattern.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, label: &str) {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let wrapper = thread::spawn(move || {
        let _ = handle.join();
        let _ = done_tx.send(());
    });
    if done_rx.recv_timeout(timeout).is_err() {
        warn!(thread = label, "thread did not join within timeout, abandoning");
    } else {
        let _ = wrapper.join();
    }
}

/// Builds every node and connection named in `config` onto `graph`.
pub fn build_graph_from_configuration(graph: &mut Graph, config: &Configuration) -> EngineResult<()> {
    for node in &config.nodes {
        create_node_from_config(graph, node)?;
    }
    for conn in &config.connections {
        connect_from_config(graph, conn)?;
    }
    Ok(())
}

fn create_node_from_config(graph: &mut Graph, node: &NodeConfig) -> EngineResult<()> {
    let kind = node_kind_from_str(&node.node_type)?;
    let (input_pads, output_pads) = match kind {
        NodeKind::HardwareSource => (0, node.channel_indices.len().max(1)),
        NodeKind::HardwareSink => (node.channel_indices.len().max(1), 0),
        NodeKind::FileSource => (0, 1),
        NodeKind::FileSink => (1, 0),
        NodeKind::FilterChain => (1, 1),
    };
    graph.create_node(&node.name, kind, node.params.clone(), input_pads, output_pads)?;
    if matches!(kind, NodeKind::HardwareSource | NodeKind::HardwareSink) && !node.channel_indices.is_empty() {
        graph.bind_hardware_channels(&node.name, node.channel_indices.clone())?;
    }
    Ok(())
}

fn connect_from_config(graph: &mut Graph, conn: &ConnectionConfig) -> EngineResult<()> {
    graph.connect(
        &conn.source_name,
        conn.source_pad,
        &conn.sink_name,
        conn.sink_pad,
        conn.format_conversion,
    )
}

/// The top-level orchestrator. Owns the graph behind a single-writer
/// `UnsafeMutex` for state that is, in practice, only ever touched by one
/// thread at a time (here: whichever thread currently drives
/// `process_block` — the hardware callback thread when present, or the
/// file-processing loop thread otherwise).
pub struct Engine {
    graph: Arc<UnsafeMutex<Graph>>,
    hw_bridge: Option<Arc<UnsafeMutex<HardwareSessionBridge>>>,
    osc_server: Option<Arc<Server>>,
    parameter_plane: Option<Arc<OscParameterPlane>>,
    device_manager: Option<Arc<DeviceStateManager<OscParameterPlane>>>,
    runtime: Option<tokio::runtime::Runtime>,
    shutdown: Arc<AtomicBool>,
    file_loop: Option<JoinHandle<()>>,
    reader_threads: Mutex<Vec<JoinHandle<()>>>,
    writer_threads: Mutex<Vec<JoinHandle<()>>>,
    param_updates: Mutex<ParamUpdateProducer>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let mut graph = Graph::new();
        let (producer, consumer) = param_update_channel();
        graph.attach_param_queue(consumer);
        Self {
            graph: Arc::new(UnsafeMutex::new(graph)),
            hw_bridge: None,
            osc_server: None,
            parameter_plane: None,
            device_manager: None,
            runtime: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            file_loop: None,
            reader_threads: Mutex::new(Vec::new()),
            writer_threads: Mutex::new(Vec::new()),
            param_updates: Mutex::new(producer),
        }
    }

    /// Queues a parameter change to be applied onto `node`'s params map at
    /// the top of the next `process_block` tick, off the real-time path.
    /// Returns `false` if the queue is full and the update was dropped.
    pub fn push_param_update(&self, node: NodeId, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.param_updates.lock().unwrap().push(ParamUpdate {
            node,
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn graph(&self) -> Arc<UnsafeMutex<Graph>> {
        self.graph.clone()
    }

    pub fn device_manager(&self) -> Option<Arc<DeviceStateManager<OscParameterPlane>>> {
        self.device_manager.clone()
    }

    /// Creates every node and connection in `config` on the graph, then
    /// configures every node with the desired sample rate / block size /
    /// internal format / layout.
    pub fn apply_configuration(&self, config: &Configuration) -> EngineResult<()> {
        let graph = self.graph.lock();
        build_graph_from_configuration(graph, config)?;
        graph.configure_all(
            config.sample_rate.round() as u32,
            config.buffer_size as usize,
            sample_format_from_kind(config.internal_format),
            Layout::Interleaved,
            channel_layout_from_str(&config.internal_layout),
        )
    }

    /// Registers a hardware session, preparing its buffers against the
    /// graph's currently bound hardware channels.
    pub fn attach_hardware_session(&mut self, mut session: Box<dyn HardwareSession>, device_name: &str) -> EngineResult<()> {
        session.load(device_name)?;
        let mut bridge = HardwareSessionBridge::new(session);
        {
            let graph = self.graph.lock();
            bridge.prepare_for_graph(graph)?;
        }
        self.hw_bridge = Some(Arc::new(UnsafeMutex::new(bridge)));
        Ok(())
    }

    /// Starts the OSC server on the configured transport and wires a
    /// `DeviceStateManager` on top of it.
    pub fn start_osc(
        &mut self,
        runtime: &tokio::runtime::Handle,
        config: &Configuration,
        transport: Transport,
        initial_state: DeviceState,
    ) -> EngineResult<()> {
        let server = Arc::new(match transport {
            Transport::Udp => {
                let remote: SocketAddr = format!("{}:{}", config.target_ip, config.target_port)
                    .parse()
                    .map_err(|e| EngineError::ConfigError(format!("invalid target address: {e}")))?;
                Server::bind_udp("0.0.0.0", config.receive_port, remote)?
            }
            Transport::Tcp => Server::connect_tcp(&config.target_ip, config.target_port)?,
        });

        let plane = Arc::new(OscParameterPlane::new(server.clone(), runtime.clone()));
        let manager = Arc::new(DeviceStateManager::new(initial_state, plane.clone()));

        // Route every observed parameter event the device sends us (any
        // address not claimed by a pending query) into the manager, and
        // from there out to the plane's own listeners.
        {
            let manager_for_default = manager.clone();
            let plane_for_default = plane.clone();
            let mut dispatcher = server.dispatcher().lock().unwrap();
            dispatcher.set_default_handler(Box::new(move |msg| {
                if let Some(value) = msg.args.first() {
                    manager_for_default.on_parameter_event(&msg.address, value.clone());
                    plane_for_default.notify_event(&msg.address, value.clone());
                }
            }));
        }

        self.osc_server = Some(server);
        self.parameter_plane = Some(plane);
        self.device_manager = Some(manager);
        Ok(())
    }

    /// Applies the configuration's desired `commands` through the device
    /// state manager's diff-and-apply path. No-op if OSC was never
    /// started.
    pub fn apply_commands(&self, commands: &[ControlCommand], callback: impl FnOnce(EngineResult<()>) + Send + 'static) {
        match &self.device_manager {
            Some(manager) => manager.apply_configuration(commands, callback),
            None => callback(Ok(())),
        }
    }

    /// Starts the graph (and, if attached, the hardware session) and, if
    /// no hardware session is attached, spawns the file-processing loop
    /// thread that drives `process_block` on a fixed period.
    pub fn start(&mut self) -> EngineResult<()> {
        {
            let graph = self.graph.lock();
            graph.start()?;
        }

        if let Some(bridge) = &self.hw_bridge {
            bridge.lock().start()?;
            info!("hardware session started; audio driven by hardware callback thread");
            return Ok(());
        }

        info!("no hardware session attached; driving graph from a file-processing loop");
        self.shutdown.store(false, Ordering::Release);
        let graph = self.graph.clone();
        let shutdown = self.shutdown.clone();
        let period = {
            // Matches the block period implied by configure_all; falls
            // back to a conservative 10 ms tick if unconfigured.
            Duration::from_millis(10)
        };
        self.file_loop = Some(thread::spawn(move || {
            let mut buffer_index: u8 = 0;
            while !shutdown.load(Ordering::Acquire) {
                graph.lock().process_block(buffer_index, None);
                buffer_index = 1 - buffer_index;
                thread::sleep(period);
            }
        }));
        Ok(())
    }

    /// Registers a reader/writer thread spawned by a caller-supplied
    /// `file_source`/`file_sink` adapter so `stop()` can join it in the
    /// documented order.
    pub fn register_reader_thread(&self, handle: JoinHandle<()>) {
        self.reader_threads.lock().unwrap().push(handle);
    }

    pub fn register_writer_thread(&self, handle: JoinHandle<()>) {
        self.writer_threads.lock().unwrap().push(handle);
    }

    /// Shuts the engine down in order: audio
    /// (hardware session stopped first so the bridge's thread can join),
    /// file writers (flush/finalize already happened on their own thread
    /// when they observed `finalize`), file readers, then the OSC server.
    /// Each join is bounded by `timeout`.
    pub fn stop(&mut self, timeout: Duration) -> EngineResult<()> {
        self.shutdown.store(true, Ordering::Release);

        if let Some(bridge) = &self.hw_bridge {
            bridge.lock().stop()?;
        }
        if let Some(handle) = self.file_loop.take() {
            join_with_timeout(handle, timeout, "file-processing-loop");
        }

        {
            let graph = self.graph.lock();
            graph.stop()?;
        }

        for handle in self.writer_threads.lock().unwrap().drain(..) {
            join_with_timeout(handle, timeout, "file-sink-writer");
        }
        for handle in self.reader_threads.lock().unwrap().drain(..) {
            join_with_timeout(handle, timeout, "file-source-reader");
        }

        if let Some(server) = &mut self.osc_server {
            if let Some(server) = Arc::get_mut(server) {
                server.join(timeout)?;
            } else {
                server.stop();
            }
        }

        Ok(())
    }

    /// Owns a dedicated Tokio runtime for the OSC query path
    /// (`Server::query` is `async`). Most callers should supply their own
    /// `tokio::runtime::Handle`; this is a convenience for a CLI
    /// front-end that has none yet.
    pub fn ensure_runtime(&mut self) -> EngineResult<tokio::runtime::Handle> {
        if self.runtime.is_none() {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| EngineError::ConfigError(format!("failed to start runtime: {e}")))?;
            self.runtime = Some(rt);
        }
        Ok(self.runtime.as_ref().unwrap().handle().clone())
    }
}
