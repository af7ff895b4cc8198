//! Lock-free parameter-update handoff between the control thread and the
//! audio-adjacent thread that owns the graph: a lock-free SPSC queue the
//! audio thread polls once per block, non-blockingly. Built on the same
//! `ringbuf` SPSC queue `media.rs` uses for block handoff.

use std::collections::HashMap;

use crate::graph::NodeId;

/// Queue depth for the parameter-update channel. A handful of updates can
/// pile up between two block ticks; anything beyond this is dropped
/// (`try_push` failing) rather than applied out of order.
pub const PARAM_QUEUE_CAPACITY: usize = 64;

/// A single parameter change destined for one node.
#[derive(Debug, Clone)]
pub struct ParamUpdate {
    pub node: NodeId,
    pub key: String,
    pub value: String,
}

/// The control-thread-facing half. `push` never blocks; a full queue
/// silently drops the update rather than stalling the sender.
pub struct ParamUpdateProducer {
    producer: ringbuf::HeapProd<ParamUpdate>,
}

impl ParamUpdateProducer {
    pub fn push(&mut self, update: ParamUpdate) -> bool {
        use ringbuf::traits::Producer;
        self.producer.try_push(update).is_ok()
    }
}

/// The audio-adjacent-thread-facing half. `drain_into` is polled once per
/// block and applies every pending update to the given params map
/// in-place, never allocating beyond what `HashMap::insert` already does
/// for a new key.
pub struct ParamUpdateConsumer {
    consumer: ringbuf::HeapCons<ParamUpdate>,
}

impl ParamUpdateConsumer {
    /// Pops every update currently queued and calls `apply` with each one,
    /// in FIFO order. Returns the number applied.
    pub fn drain(&mut self, mut apply: impl FnMut(ParamUpdate)) -> usize {
        use ringbuf::traits::Consumer;
        let mut count = 0;
        while let Some(update) = self.consumer.try_pop() {
            apply(update);
            count += 1;
        }
        count
    }

    /// Convenience drain that applies updates directly onto a
    /// `node -> (key -> value)` params table, the shape `Node::params`
    /// uses.
    pub fn drain_into(&mut self, tables: &mut HashMap<NodeId, HashMap<String, String>>) -> usize {
        self.drain(|update| {
            tables.entry(update.node).or_default().insert(update.key, update.value);
        })
    }
}

/// Builds a connected `(ParamUpdateProducer, ParamUpdateConsumer)` pair
/// sharing one bounded ring buffer.
pub fn param_update_channel() -> (ParamUpdateProducer, ParamUpdateConsumer) {
    use ringbuf::traits::Split;
    let rb = ringbuf::HeapRb::<ParamUpdate>::new(PARAM_QUEUE_CAPACITY);
    let (producer, consumer) = rb.split();
    (
        ParamUpdateProducer { producer },
        ParamUpdateConsumer { consumer },
    )
}
