use std::sync::Arc;

/// One of the fixed set of sample formats a buffer can carry, in either
/// planar or interleaved arrangement (`Layout`, tracked separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SampleFormat {
    S16,
    /// Signed 24-bit, packed in a 32-bit slot.
    S24In32,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16 => 2,
            SampleFormat::S24In32 => 4,
            SampleFormat::S32 => 4,
            SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Planar,
    Interleaved,
}

/// A named channel position. `Other` carries an opaque index for layouts
/// the glossary doesn't name (e.g. the extra channels of "5.1").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ChannelId {
    FrontLeft,
    FrontRight,
    Center,
    Lfe,
    SurroundLeft,
    SurroundRight,
    Other(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    pub channels: Vec<ChannelId>,
}

impl ChannelLayout {
    pub fn mono() -> Self {
        Self {
            channels: vec![ChannelId::FrontLeft],
        }
    }

    pub fn stereo() -> Self {
        Self {
            channels: vec![ChannelId::FrontLeft, ChannelId::FrontRight],
        }
    }

    pub fn count(&self) -> usize {
        self.channels.len()
    }
}

/// Either a single interleaved byte region or one byte region per channel.
///
/// Invariant (enforced by `AudioBuffer::new`): `region_bytes = frames *
/// bytes_per_sample * (interleaved ? channels : 1)` for every region.
#[derive(Debug, Clone)]
pub enum BufferData {
    Interleaved(Vec<u8>),
    Planar(Vec<Vec<u8>>),
}

/// A fixed-frame-count block of audio, immutable once published.
///
/// Created by source nodes or by connection format-converters; shared by
/// `Arc` between exactly one producer and one consumer per tick. Never
/// mutated after it is handed to a consumer — `AudioBuffer` carries no
/// interior mutability, so the type system enforces the never-mutated-
/// after-publication invariant.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub format: SampleFormat,
    pub layout: Layout,
    pub channel_layout: ChannelLayout,
    pub sample_rate: u32,
    pub frames: usize,
    pub data: BufferData,
}

impl AudioBuffer {
    pub fn new(
        format: SampleFormat,
        layout: Layout,
        channel_layout: ChannelLayout,
        sample_rate: u32,
        frames: usize,
    ) -> Self {
        let bps = format.bytes_per_sample();
        let channels = channel_layout.count();
        let data = match layout {
            Layout::Interleaved => BufferData::Interleaved(vec![0u8; frames * bps * channels]),
            Layout::Planar => BufferData::Planar(vec![vec![0u8; frames * bps]; channels]),
        };
        Self {
            format,
            layout,
            channel_layout,
            sample_rate,
            frames,
            data,
        }
    }

    /// A buffer of the given shape, filled with digital silence. Used when
    /// an upstream producer has nothing ready for this tick — the output
    /// slot is always silence-filled, never indeterminate content.
    pub fn silence(
        format: SampleFormat,
        layout: Layout,
        channel_layout: ChannelLayout,
        sample_rate: u32,
        frames: usize,
    ) -> Arc<Self> {
        Arc::new(Self::new(format, layout, channel_layout, sample_rate, frames))
    }

    pub fn channels(&self) -> usize {
        self.channel_layout.count()
    }

    pub fn region_bytes_expected(&self) -> usize {
        self.frames * self.format.bytes_per_sample()
    }
}
