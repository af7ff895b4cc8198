//! Sample-format and channel-layout conversion primitives.
//!
//! Read each native sample by dividing by `2^(N-1)` (scale-on-read), write
//! by multiplying by `2^(N-1) - 1` and clamping (scale-and-clamp-on-write),
//! uniformly across the full internal/native format set.

use super::format::{AudioBuffer, BufferData, ChannelLayout, Layout, SampleFormat};

fn read_sample(format: SampleFormat, bytes: &[u8]) -> f64 {
    match format {
        SampleFormat::S16 => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]);
            v as f64 / 32_768.0
        }
        SampleFormat::S24In32 => {
            let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            // Sign-extend from 24 bits.
            let v = (raw << 8) >> 8;
            v as f64 / 8_388_608.0
        }
        SampleFormat::S32 => {
            let v = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            v as f64 / 2_147_483_648.0
        }
        SampleFormat::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        SampleFormat::F64 => f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]),
    }
}

fn write_sample(format: SampleFormat, value: f64, out: &mut [u8]) {
    match format {
        SampleFormat::S16 => {
            let clamped = value.clamp(-1.0, 1.0);
            let scaled = (clamped * 32_767.0).round() as i32;
            let v = scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            out[0..2].copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::S24In32 => {
            let clamped = value.clamp(-1.0, 1.0);
            let scaled = (clamped * 8_388_607.0).round() as i32;
            let v = scaled.clamp(-8_388_608, 8_388_607);
            out[0..4].copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::S32 => {
            let clamped = value.clamp(-1.0, 1.0);
            let scaled = (clamped * 2_147_483_647.0).round();
            let v = scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            out[0..4].copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::F32 => {
            out[0..4].copy_from_slice(&(value as f32).to_le_bytes());
        }
        SampleFormat::F64 => {
            out[0..8].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// Channel-count-change policy for connections whose producer/consumer
/// channel counts differ: extras are summed into the first channel when
/// narrowing, or the first channel is duplicated into extras when widening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    SumExtrasIntoFirst,
    DuplicateFirstIntoExtras,
}

/// Converts `src` into a freshly allocated buffer with `dst_format` /
/// `dst_layout` / `dst_channels`, applying `policy` if the channel count
/// changes. `dst_channels` may differ from `src.channels()`.
pub fn convert(
    src: &AudioBuffer,
    dst_format: SampleFormat,
    dst_layout: Layout,
    dst_channel_layout: ChannelLayout,
    policy: ChannelPolicy,
) -> AudioBuffer {
    let src_channels = src.channels();
    let dst_channels = dst_channel_layout.count();
    let frames = src.frames;

    // Read every source sample into an [channel][frame] f64 grid first;
    // frames is bounded by block_size (at most a few thousand) so this is
    // an acceptable allocation outside the real-time audio thread — this
    // helper is only ever called from configure-time converters or the
    // hardware bridge's dedicated conversion step, never from inside a
    // node's `process()`.
    let mut grid: Vec<Vec<f64>> = vec![vec![0.0; frames]; src_channels];
    let src_bps = src.format.bytes_per_sample();
    match &src.data {
        BufferData::Interleaved(bytes) => {
            for frame in 0..frames {
                for ch in 0..src_channels {
                    let offset = (frame * src_channels + ch) * src_bps;
                    grid[ch][frame] = read_sample(src.format, &bytes[offset..offset + src_bps]);
                }
            }
        }
        BufferData::Planar(regions) => {
            for (ch, region) in regions.iter().enumerate() {
                for frame in 0..frames {
                    let offset = frame * src_bps;
                    grid[ch][frame] = read_sample(src.format, &region[offset..offset + src_bps]);
                }
            }
        }
    }

    let resampled_grid = remap_channels(grid, src_channels, dst_channels, policy);

    let mut dst = AudioBuffer::new(
        dst_format,
        dst_layout,
        dst_channel_layout,
        src.sample_rate,
        frames,
    );
    let dst_bps = dst_format.bytes_per_sample();
    match &mut dst.data {
        BufferData::Interleaved(bytes) => {
            for frame in 0..frames {
                for ch in 0..dst_channels {
                    let offset = (frame * dst_channels + ch) * dst_bps;
                    write_sample(dst_format, resampled_grid[ch][frame], &mut bytes[offset..offset + dst_bps]);
                }
            }
        }
        BufferData::Planar(regions) => {
            for (ch, region) in regions.iter_mut().enumerate() {
                for frame in 0..frames {
                    let offset = frame * dst_bps;
                    write_sample(dst_format, resampled_grid[ch][frame], &mut region[offset..offset + dst_bps]);
                }
            }
        }
    }
    dst
}

fn remap_channels(
    grid: Vec<Vec<f64>>,
    src_channels: usize,
    dst_channels: usize,
    policy: ChannelPolicy,
) -> Vec<Vec<f64>> {
    if src_channels == dst_channels {
        return grid;
    }
    let frames = grid.first().map(|c| c.len()).unwrap_or(0);
    let mut out = vec![vec![0.0; frames]; dst_channels];

    if dst_channels < src_channels {
        // Narrowing: kept channels pass through, extras summed into channel 0.
        for ch in 0..dst_channels {
            out[ch] = grid[ch].clone();
        }
        if matches!(policy, ChannelPolicy::SumExtrasIntoFirst) {
            for extra in grid.iter().skip(dst_channels) {
                for (f, sample) in extra.iter().enumerate() {
                    out[0][f] += sample;
                }
            }
        }
    } else {
        // Widening: kept channels pass through, extras duplicate channel 0.
        for (ch, channel) in grid.iter().enumerate() {
            out[ch] = channel.clone();
        }
        if matches!(policy, ChannelPolicy::DuplicateFirstIntoExtras) && !grid.is_empty() {
            for out_channel in out.iter_mut().skip(src_channels) {
                *out_channel = grid[0].clone();
            }
        }
    }
    out
}

/// Planar <-> interleaved re-layout with no format or channel-count change.
pub fn relayout(src: &AudioBuffer, dst_layout: Layout) -> AudioBuffer {
    convert(
        src,
        src.format,
        dst_layout,
        src.channel_layout.clone(),
        ChannelPolicy::SumExtrasIntoFirst,
    )
}

#[cfg(test)]
mod tests {
    use super::super::format::ChannelId;
    use super::*;

    #[test]
    fn f32_round_trips_through_s16() {
        let mut src = AudioBuffer::new(
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout::mono(),
            48_000,
            4,
        );
        let values: [f32; 4] = [0.0, 0.5, -0.5, 1.0];
        if let BufferData::Interleaved(bytes) = &mut src.data {
            for (i, v) in values.iter().enumerate() {
                bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
        let as_s16 = convert(
            &src,
            SampleFormat::S16,
            Layout::Interleaved,
            ChannelLayout::mono(),
            ChannelPolicy::SumExtrasIntoFirst,
        );
        let back = convert(
            &as_s16,
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout::mono(),
            ChannelPolicy::SumExtrasIntoFirst,
        );
        let BufferData::Interleaved(bytes) = &back.data else {
            panic!()
        };
        for (i, expected) in values.iter().enumerate() {
            let got = f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
            assert!((got - expected).abs() < 1e-3, "{got} vs {expected}");
        }
    }

    #[test]
    fn widening_duplicates_first_channel() {
        let mut src = AudioBuffer::new(
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout::mono(),
            48_000,
            2,
        );
        if let BufferData::Interleaved(bytes) = &mut src.data {
            bytes[0..4].copy_from_slice(&0.25f32.to_le_bytes());
            bytes[4..8].copy_from_slice(&(-0.25f32).to_le_bytes());
        }
        let stereo = convert(
            &src,
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout::stereo(),
            ChannelPolicy::DuplicateFirstIntoExtras,
        );
        let BufferData::Interleaved(bytes) = &stereo.data else {
            panic!()
        };
        let l0 = f32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let r0 = f32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert!((l0 - r0).abs() < 1e-6);
    }

    #[test]
    fn narrowing_sums_extras_into_first() {
        let mut src = AudioBuffer::new(
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout {
                channels: vec![
                    ChannelId::FrontLeft,
                    ChannelId::FrontRight,
                    ChannelId::Center,
                ],
            },
            48_000,
            1,
        );
        if let BufferData::Interleaved(bytes) = &mut src.data {
            bytes[0..4].copy_from_slice(&0.1f32.to_le_bytes());
            bytes[4..8].copy_from_slice(&0.2f32.to_le_bytes());
            bytes[8..12].copy_from_slice(&0.3f32.to_le_bytes());
        }
        let mono = convert(
            &src,
            SampleFormat::F32,
            Layout::Interleaved,
            ChannelLayout::mono(),
            ChannelPolicy::SumExtrasIntoFirst,
        );
        let BufferData::Interleaved(bytes) = &mono.data else {
            panic!()
        };
        let v = f32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert!((v - 0.4).abs() < 1e-5);
    }
}
