//! End-to-end scenarios exercising the graph runtime, OSC stack, and device
//! state manager together through their public APIs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowcore_engine::buffer::{ChannelLayout, Layout, NativeFormat, SampleFormat};
use flowcore_engine::config::ControlCommand;
use flowcore_engine::device::{DeviceState, DeviceStateManager, ParameterPlane};
use flowcore_engine::error::EngineResult;
use flowcore_engine::graph::{FilterChain, Graph, NodeKind};
use flowcore_engine::hw::HardwareSession;
use flowcore_engine::osc::{Dispatcher, OscBundle, OscElement, OscMessage, OscPacket, TimeTag, Value};

/// A hardware session test double that hands channel 0 a full-scale 1 kHz
/// sine on every read and channel 1 silence, and captures every write.
struct SineHardwareSession {
    sample_rate: u32,
    block_size: usize,
    phase: f32,
    input_bytes: [Vec<u8>; 2],
    pub written: Mutex<HashMap<usize, Vec<Vec<f32>>>>,
}

impl SineHardwareSession {
    fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            phase: 0.0,
            input_bytes: [Vec::new(), Vec::new()],
            written: Mutex::new(HashMap::new()),
        }
    }

    fn fill_inputs(&mut self) {
        let mut phase = self.phase;
        let step = 2.0 * std::f32::consts::PI * 1000.0 / self.sample_rate as f32;
        let mut ch0 = Vec::with_capacity(self.block_size * 4);
        for _ in 0..self.block_size {
            let sample = phase.sin();
            ch0.extend_from_slice(&sample.to_le_bytes());
            phase += step;
        }
        self.phase = phase;
        self.input_bytes[0] = ch0;
        self.input_bytes[1] = vec![0u8; self.block_size * 4];
    }
}

impl HardwareSession for SineHardwareSession {
    fn load(&mut self, _name: &str) -> EngineResult<()> {
        Ok(())
    }
    fn initialize(&mut self, _rate: u32, _block_size: usize) -> EngineResult<()> {
        Ok(())
    }
    fn channel_counts(&self) -> (usize, usize) {
        (2, 2)
    }
    fn supported_rates(&self) -> Vec<u32> {
        vec![self.sample_rate]
    }
    fn native_format(&self) -> NativeFormat {
        NativeFormat::F32Le
    }
    fn prepare_buffers(&mut self, _active_in: &[usize], _active_out: &[usize]) -> EngineResult<()> {
        Ok(())
    }
    fn start(&mut self) -> EngineResult<()> {
        Ok(())
    }
    fn stop(&mut self) -> EngineResult<()> {
        Ok(())
    }
    fn read_input(&self, channel: usize, _buffer_index: u8) -> Option<&[u8]> {
        self.input_bytes.get(channel).map(|v| v.as_slice())
    }
    fn write_output(&mut self, channel: usize, _buffer_index: u8, bytes: &[u8]) {
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        self.written.lock().unwrap().entry(channel).or_default().push(samples);
    }
}

/// Scenario 1 — minimal hardware passthrough: src:0 -> snk:0 direct
/// connection, a 1 kHz sine on input channel 0 must reach output channel 0
/// unchanged (both sides F32, no quantization to account for); input
/// channel 1 is fed but never wired to a sink, so nothing should be
/// written for hardware output channel 1.
#[test]
fn minimal_hardware_passthrough_preserves_the_waveform() {
    let mut graph = Graph::new();
    graph
        .create_node("src", NodeKind::HardwareSource, HashMap::new(), 0, 2)
        .unwrap();
    graph
        .create_node("snk", NodeKind::HardwareSink, HashMap::new(), 2, 0)
        .unwrap();
    graph.bind_hardware_channels("src", vec![0, 1]).unwrap();
    graph.bind_hardware_channels("snk", vec![0, 1]).unwrap();
    graph.connect("src", 0, "snk", 0, false).unwrap();

    graph
        .configure_all(48_000, 64, SampleFormat::F32, Layout::Interleaved, ChannelLayout::stereo())
        .unwrap();
    graph.start().unwrap();

    let mut hw = SineHardwareSession::new(48_000, 64);
    hw.fill_inputs();
    graph.process_block(0, Some(&mut hw));

    let written = hw.written.lock().unwrap();
    let out_ch0 = written.get(&0).expect("channel 0 should have been written");
    assert_eq!(out_ch0.len(), 1);
    assert_eq!(out_ch0[0].len(), 64);

    let mut phase = 0.0f32;
    let step = 2.0 * std::f32::consts::PI * 1000.0 / 48_000.0;
    for &sample in &out_ch0[0] {
        assert!(
            (sample - phase.sin()).abs() < 1e-5,
            "passthrough must preserve the sine within float precision"
        );
        phase += step;
    }
    assert!(!written.contains_key(&1));
}

/// Scenario 4 — topological scheduling: P -> Q and P -> R; P must run
/// before both Q and R, and the deterministic tie-break (creation order)
/// must put Q ahead of R since it was created first.
struct RecordingFilter {
    name: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl FilterChain for RecordingFilter {
    fn process(
        &mut self,
        inputs: &[Arc<flowcore_engine::buffer::AudioBuffer>],
        outputs: &mut [Option<Arc<flowcore_engine::buffer::AudioBuffer>>],
    ) {
        self.order.lock().unwrap().push(self.name);
        for (idx, buf) in outputs.iter_mut().enumerate() {
            *buf = inputs.get(idx.min(inputs.len().saturating_sub(1))).cloned();
        }
    }
}

#[test]
fn topological_scheduling_runs_producers_before_consumers_in_creation_order() {
    let mut graph = Graph::new();
    graph.create_node("p", NodeKind::FilterChain, HashMap::new(), 1, 2).unwrap();
    graph.create_node("q", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
    graph.create_node("r", NodeKind::FilterChain, HashMap::new(), 1, 1).unwrap();
    graph.connect("p", 0, "q", 0, false).unwrap();
    graph.connect("p", 1, "r", 0, false).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    graph
        .attach_filter_chain("p", Box::new(RecordingFilter { name: "p", order: order.clone() }))
        .unwrap();
    graph
        .attach_filter_chain("q", Box::new(RecordingFilter { name: "q", order: order.clone() }))
        .unwrap();
    graph
        .attach_filter_chain("r", Box::new(RecordingFilter { name: "r", order: order.clone() }))
        .unwrap();

    graph
        .configure_all(48_000, 64, SampleFormat::F32, Layout::Interleaved, ChannelLayout::stereo())
        .unwrap();
    graph.start().unwrap();
    graph.process_block(0, None);

    let seen = order.lock().unwrap().clone();
    assert_eq!(seen, vec!["p", "q", "r"]);
}

/// Scenario 3 — bundle ordering: a bundle containing A=/a i=1, B=/b f=2.0,
/// C=/a i=3 must fire bundle-start once, then each message handler in
/// encoded order, then bundle-end once.
#[test]
fn bundle_dispatch_fires_handlers_in_encoded_order_bracketed_by_bundle_markers() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut dispatcher = Dispatcher::new();
    {
        let log = log.clone();
        dispatcher.set_bundle_start_handler(Box::new(move |_tag: TimeTag| {
            log.lock().unwrap().push("bundle-start".to_string())
        }));
    }
    {
        let log = log.clone();
        dispatcher.set_bundle_end_handler(Box::new(move || log.lock().unwrap().push("bundle-end".to_string())));
    }
    {
        let log = log.clone();
        dispatcher.add_method(
            "/a",
            "i",
            Box::new(move |msg: &OscMessage| log.lock().unwrap().push(format!("/a {:?}", msg.args))),
        );
    }
    {
        let log = log.clone();
        dispatcher.add_method(
            "/b",
            "f",
            Box::new(move |msg: &OscMessage| log.lock().unwrap().push(format!("/b {:?}", msg.args))),
        );
    }

    let bundle = OscBundle {
        time_tag: TimeTag { seconds: 0, fraction: 1 },
        elements: vec![
            OscElement::Message(OscMessage::new("/a", vec![Value::Int32(1)])),
            OscElement::Message(OscMessage::new("/b", vec![Value::Float32(2.0)])),
            OscElement::Message(OscMessage::new("/a", vec![Value::Int32(3)])),
        ],
    };
    dispatcher.dispatch_packet(&OscPacket::Bundle(bundle));

    let seen = log.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "bundle-start".to_string(),
            "/a [Int32(1)]".to_string(),
            "/b [Float32(2.0)]".to_string(),
            "/a [Int32(3)]".to_string(),
            "bundle-end".to_string(),
        ]
    );
}

/// Scenario 2 — OSC parameter echo: a method on `/volume/*` with type spec
/// `f` fires exactly once for `/volume/1 0.5`; a method on `/volume/2`
/// never fires.
#[test]
fn address_pattern_dispatch_invokes_only_the_matching_method() {
    let hits = Arc::new(Mutex::new(0));
    let misses = Arc::new(Mutex::new(0));

    let mut dispatcher = Dispatcher::new();
    {
        let hits = hits.clone();
        dispatcher.add_method("/volume/*", "f", Box::new(move |_msg: &OscMessage| *hits.lock().unwrap() += 1));
    }
    {
        let misses = misses.clone();
        dispatcher.add_method("/volume/2", "f", Box::new(move |_msg: &OscMessage| *misses.lock().unwrap() += 1));
    }

    dispatcher.dispatch_packet(&OscPacket::Message(OscMessage::new("/volume/1", vec![Value::Float32(0.5)])));

    assert_eq!(*hits.lock().unwrap(), 1);
    assert_eq!(*misses.lock().unwrap(), 0);
}

/// A minimal in-memory `ParameterPlane` standing in for a real OSC device,
/// so `DeviceStateManager`'s diff-and-apply path can be exercised without a
/// socket.
struct RecordingPlane {
    pub sent: Mutex<Vec<(String, Vec<Value>)>>,
    pub bundles_sent: AtomicUsize,
}

impl ParameterPlane for RecordingPlane {
    fn send(&self, address: &str, args: Vec<Value>) -> EngineResult<()> {
        self.sent.lock().unwrap().push((address.to_string(), args));
        Ok(())
    }

    fn query(&self, _address: &str, _timeout: Duration, callback: Box<dyn FnOnce(EngineResult<Value>) + Send>) {
        callback(Ok(Value::Float32(0.0)));
    }

    fn on_event(&self, _listener: Box<dyn FnMut(&str, Value) + Send>) {}

    fn send_bundle(&self, messages: Vec<(String, Vec<Value>)>) -> EngineResult<()> {
        self.bundles_sent.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().extend(messages);
        Ok(())
    }
}

/// Scenario 5 — diff-apply: only the parameter that actually differs from
/// the current state is sent, as exactly one bundle.
#[test]
fn diff_apply_sends_only_the_changed_parameter() {
    let mut state = DeviceState::new("device", "GENERIC_OSC");
    state.parameter_map.insert("/ch/1/volume".to_string(), Value::Float32(0.5));

    let plane = Arc::new(RecordingPlane { sent: Mutex::new(Vec::new()), bundles_sent: AtomicUsize::new(0) });
    let manager = DeviceStateManager::new(state, plane.clone());

    let commands = vec![
        ControlCommand { address: "/ch/1/volume".to_string(), args: vec![serde_json::json!(0.5)] },
        ControlCommand { address: "/ch/2/mute".to_string(), args: vec![serde_json::json!(1)] },
    ];

    let done = Arc::new(Mutex::new(false));
    {
        let done = done.clone();
        manager.apply_configuration(&commands, move |result| {
            result.unwrap();
            *done.lock().unwrap() = true;
        });
    }

    assert!(*done.lock().unwrap());
    assert_eq!(plane.bundles_sent.load(Ordering::SeqCst), 1);
    let sent = plane.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/ch/2/mute");
}

/// Boundary: a connection whose producer pad never gets a buffer filled
/// in (no hardware channel bound) yields silence, never indeterminate
/// content.
#[test]
fn missing_upstream_producer_yields_silence_not_garbage() {
    let mut graph = Graph::new();
    graph.create_node("src", NodeKind::HardwareSource, HashMap::new(), 0, 1).unwrap();
    graph.create_node("snk", NodeKind::HardwareSink, HashMap::new(), 1, 0).unwrap();
    graph.bind_hardware_channels("snk", vec![0]).unwrap();
    graph.connect("src", 0, "snk", 0, false).unwrap();
    // "src" has no bound hardware channel, so its output pad never gets a
    // buffer filled in from real hardware data.

    graph
        .configure_all(48_000, 32, SampleFormat::F32, Layout::Interleaved, ChannelLayout::stereo())
        .unwrap();
    graph.start().unwrap();

    let mut hw = SineHardwareSession::new(48_000, 32);
    hw.fill_inputs();
    graph.process_block(0, Some(&mut hw));

    let written = hw.written.lock().unwrap();
    let out_ch0 = &written[&0][0];
    assert!(out_ch0.iter().all(|&s| s == 0.0), "unbound source pad must publish silence, never garbage");
}

/// Boundary: `block_size = 1` still produces exactly one frame per pad.
#[test]
fn block_size_of_one_still_processes_correctly() {
    let mut graph = Graph::new();
    graph.create_node("src", NodeKind::HardwareSource, HashMap::new(), 0, 1).unwrap();
    graph.create_node("snk", NodeKind::HardwareSink, HashMap::new(), 1, 0).unwrap();
    graph.bind_hardware_channels("src", vec![0]).unwrap();
    graph.bind_hardware_channels("snk", vec![0]).unwrap();
    graph.connect("src", 0, "snk", 0, false).unwrap();
    graph
        .configure_all(48_000, 1, SampleFormat::F32, Layout::Interleaved, ChannelLayout::stereo())
        .unwrap();
    graph.start().unwrap();

    let mut hw = SineHardwareSession::new(48_000, 1);
    hw.fill_inputs();
    graph.process_block(0, Some(&mut hw));

    let written = hw.written.lock().unwrap();
    assert_eq!(written[&0][0].len(), 1);
}
