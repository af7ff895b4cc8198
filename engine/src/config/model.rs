//! `Configuration`: the desired-state record the CLI front-end loads from
//! JSON via `serde_json` and hands to the core. The core never parses
//! JSON itself — it only ever sees an already-built `Configuration` value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "ASIO")]
    Asio,
    #[serde(rename = "GENERIC_OSC")]
    GenericOsc,
    #[serde(rename = "RME_TOTALMIX")]
    RmeTotalmix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalFormatKind {
    F32,
    F64,
    S16,
    S32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(rename = "channelIndices", default)]
    pub channel_indices: Vec<usize>,
    #[serde(rename = "filterGraph", default)]
    pub filter_graph: Option<String>,
    #[serde(rename = "filePath", default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(rename = "sourceName")]
    pub source_name: String,
    #[serde(rename = "sourcePad")]
    pub source_pad: usize,
    #[serde(rename = "sinkName")]
    pub sink_name: String,
    #[serde(rename = "sinkPad")]
    pub sink_pad: usize,
    #[serde(rename = "formatConversion")]
    pub format_conversion: bool,
}

/// A single desired parameter command: an OSC address plus typed
/// arguments. `serde_json::Value` stands in for OSC's `Value` sum type at
/// the JSON boundary — the loader converts each element to an
/// `osc::Value` before it reaches the OSC codec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlCommand {
    pub address: String,
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub asio_device_name: String,
    pub device_type: DeviceType,
    pub sample_rate: f64,
    pub buffer_size: u32,
    pub target_ip: String,
    pub target_port: u16,
    pub receive_port: u16,
    pub internal_format: InternalFormatKind,
    pub internal_layout: String,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub commands: Vec<ControlCommand>,
}

impl Configuration {
    pub fn node_by_name(&self, name: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.name == name)
    }
}
