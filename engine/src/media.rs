//! External collaborator traits for `file_source` / `file_sink` nodes.
//!
//! Media demuxers, decoders, encoders, and resamplers stay out of the
//! engine core: the core only ever sees a "media source" that produces
//! frames and a "media sink" that accepts frames. These traits are that
//! seam. `ChannelMediaSource`/`ChannelMediaSink` are the one concrete
//! adapter this repo ships, backed by the same `ringbuf` SPSC queue used
//! for the parameter-update channel — reader/writer threads push/pop
//! through exactly this kind of queue.

use std::sync::Arc;

use crate::buffer::AudioBuffer;

/// Produces decoded, internal-format blocks. Implementations run on their
/// own reader thread and must never block the caller of
/// `try_next` — `try_next` is polled once per tick from the node's
/// `process_block` step and must return `None` rather than wait when no
/// block is ready yet.
pub trait MediaSource: Send {
    fn try_next(&mut self) -> Option<Arc<AudioBuffer>>;
}

/// Accepts decoded, internal-format blocks for eventual encode+write on a
/// dedicated writer thread. `push` must never block the audio-adjacent
/// caller; a full queue should apply backpressure the way the owning
/// writer thread's bounded queue does, not by blocking here.
pub trait MediaSink: Send {
    fn push(&mut self, buffer: Arc<AudioBuffer>);
    /// Flush and finalize any open output (e.g. a file), called once
    /// during the stop/shutdown sequence so file writers flush and
    /// finalize cleanly.
    fn finalize(&mut self);
}

/// Queue depth for the bounded reader/writer handoff (capacity ~= 4 blocks).
pub const MEDIA_QUEUE_CAPACITY: usize = 4;

/// A `MediaSource` fed by a producer thread through a bounded SPSC queue.
pub struct ChannelMediaSource {
    consumer: ringbuf::HeapCons<Arc<AudioBuffer>>,
}

impl ChannelMediaSource {
    pub fn new(consumer: ringbuf::HeapCons<Arc<AudioBuffer>>) -> Self {
        Self { consumer }
    }
}

impl MediaSource for ChannelMediaSource {
    fn try_next(&mut self) -> Option<Arc<AudioBuffer>> {
        use ringbuf::traits::Consumer;
        self.consumer.try_pop()
    }
}

/// A `MediaSink` whose writer thread drains the other end of the same
/// bounded SPSC queue.
pub struct ChannelMediaSink {
    producer: ringbuf::HeapProd<Arc<AudioBuffer>>,
    finalized: bool,
}

impl ChannelMediaSink {
    pub fn new(producer: ringbuf::HeapProd<Arc<AudioBuffer>>) -> Self {
        Self {
            producer,
            finalized: false,
        }
    }
}

impl MediaSink for ChannelMediaSink {
    fn push(&mut self, buffer: Arc<AudioBuffer>) {
        use ringbuf::traits::Producer;
        // Backpressure here would block the tick that's keeping the audio
        // thread alive; dropping the oldest-pending block is preferable
        // to stalling. The writer thread is expected to keep pace with
        // MEDIA_QUEUE_CAPACITY blocks of slack.
        let _ = self.producer.try_push(buffer);
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}

/// Builds a connected `(ChannelMediaSource, ChannelMediaSink)` pair sharing
/// one bounded ring buffer, for wiring a file-source/file-sink node to its
/// reader/writer thread.
pub fn channel_media_pair() -> (ChannelMediaSource, ChannelMediaSink) {
    use ringbuf::traits::Split;
    let rb = ringbuf::HeapRb::<Arc<AudioBuffer>>::new(MEDIA_QUEUE_CAPACITY);
    let (prod, cons) = rb.split();
    (ChannelMediaSource::new(cons), ChannelMediaSink::new(prod))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ChannelLayout, Layout, SampleFormat};

    #[test]
    fn empty_source_yields_none() {
        let (mut src, _sink) = channel_media_pair();
        assert!(src.try_next().is_none());
    }

    #[test]
    fn pushed_block_is_observed() {
        let (mut src, mut sink) = channel_media_pair();
        let buf = Arc::new(AudioBuffer::new(
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout::stereo(),
            48_000,
            16,
        ));
        sink.push(buf.clone());
        let got = src.try_next().expect("block should be available");
        assert_eq!(got.frames, buf.frames);
    }
}
