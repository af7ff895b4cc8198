//! `HardwareSession`: the abstract hardware driver capability the engine
//! core consumes. Real driver SDK bindings are out of scope here — this
//! trait, plus the in-repo `NullHardwareSession` test double, is the whole
//! of what the core assumes about a real driver.

use crate::buffer::NativeFormat;
use crate::error::EngineResult;

/// A loaded hardware driver session. One `CallbackRegistration` per
/// `start()`; dropping it (or calling `stop()`) must silence the driver's
/// callback before `stop()` returns — the bridge relies on this to safely
/// join the audio thread, since the hardware session must be stopped
/// before the bridge tears anything else down.
pub trait HardwareSession: Send + Sync {
    fn load(&mut self, name: &str) -> EngineResult<()>;
    fn initialize(&mut self, preferred_rate: u32, preferred_block_size: usize) -> EngineResult<()>;
    fn channel_counts(&self) -> (usize, usize);
    fn supported_rates(&self) -> Vec<u32>;
    fn native_format(&self) -> NativeFormat;
    fn prepare_buffers(&mut self, active_in: &[usize], active_out: &[usize]) -> EngineResult<()>;
    fn start(&mut self) -> EngineResult<()>;
    fn stop(&mut self) -> EngineResult<()>;

    /// Raw bytes for `channel` of the current (`buffer_index`) side, or
    /// `None` if the channel has no buffer this tick (bridge fills silence).
    fn read_input(&self, channel: usize, buffer_index: u8) -> Option<&[u8]>;

    /// Writes raw native-format bytes for `channel` of the current
    /// (`buffer_index`) side.
    fn write_output(&mut self, channel: usize, buffer_index: u8, bytes: &[u8]);
}

/// A hardware session that always reports silence and never fails. Used
/// by tests and by the file-only processing loop's "no hardware present"
/// path, where `process_block` is called once per iteration of the
/// file-processing loop instead of once per hardware callback.
#[derive(Debug, Default)]
pub struct NullHardwareSession {
    pub in_channels: usize,
    pub out_channels: usize,
    pub rate: u32,
    pub block_size: usize,
}

impl NullHardwareSession {
    pub fn new(in_channels: usize, out_channels: usize, rate: u32, block_size: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            rate,
            block_size,
        }
    }
}

impl HardwareSession for NullHardwareSession {
    fn load(&mut self, _name: &str) -> EngineResult<()> {
        Ok(())
    }

    fn initialize(&mut self, preferred_rate: u32, preferred_block_size: usize) -> EngineResult<()> {
        self.rate = preferred_rate;
        self.block_size = preferred_block_size;
        Ok(())
    }

    fn channel_counts(&self) -> (usize, usize) {
        (self.in_channels, self.out_channels)
    }

    fn supported_rates(&self) -> Vec<u32> {
        vec![self.rate]
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

    fn read_input(&self, _channel: usize, _buffer_index: u8) -> Option<&[u8]> {
        None
    }

    fn write_output(&mut self, _channel: usize, _buffer_index: u8, _bytes: &[u8]) {}
}
