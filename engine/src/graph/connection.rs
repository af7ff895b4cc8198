use crate::graph::node::NodeId;

/// An edge `(source_node, source_pad_index, sink_node, sink_pad_index)`.
/// `format_conversion_allowed` controls whether the graph is permitted to
/// insert an implicit format converter when the two endpoints' declared
/// formats differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub source_node: NodeId,
    pub source_pad: usize,
    pub sink_node: NodeId,
    pub sink_pad: usize,
    pub format_conversion_allowed: bool,
}
