pub mod codec;
pub mod dispatcher;
pub mod pattern;
pub mod server;
pub mod value;

pub use codec::{OscBundle, OscElement, OscMessage, OscPacket};
pub use dispatcher::{Dispatcher, MethodId};
pub use server::{Server, Transport};
pub use value::{TimeTag, Value};
