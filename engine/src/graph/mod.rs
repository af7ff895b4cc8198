pub mod connection;
pub mod graph;
pub mod node;
pub mod pad;

pub use connection::Connection;
pub use graph::Graph;
pub use node::{FilterChain, Node, NodeId, NodeKind, NodeState, RuntimeFormat};
pub use pad::{Pad, PadDirection};
