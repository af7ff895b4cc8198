pub mod convert;
pub mod format;
pub mod native;

pub use convert::{convert, relayout, ChannelPolicy};
pub use format::{AudioBuffer, BufferData, ChannelId, ChannelLayout, Layout, SampleFormat};
pub use native::NativeFormat;
