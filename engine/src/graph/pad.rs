use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::graph::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadDirection {
    Input,
    Output,
}

/// An input or output slot on a node, identified by `(node, direction,
/// index)`. An input pad carries at most one incoming connection (its
/// `source`); an output pad may fan out to many consumers, though this
/// repo's graph-builder never produces more than one consumer per output
/// pad in its current node set.
#[derive(Debug, Clone)]
pub struct Pad {
    pub index: usize,
    pub direction: PadDirection,
    /// For an input pad: the (node, output pad index) it is wired from.
    pub source: Option<(NodeId, usize)>,
    /// The buffer this pad published (output) or received (input) for the
    /// current tick. Cleared and repopulated every `process_block` call.
    pub slot: Option<Arc<AudioBuffer>>,
}

impl Pad {
    pub fn input(index: usize) -> Self {
        Self {
            index,
            direction: PadDirection::Input,
            source: None,
            slot: None,
        }
    }

    pub fn output(index: usize) -> Self {
        Self {
            index,
            direction: PadDirection::Output,
            source: None,
            slot: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }
}
