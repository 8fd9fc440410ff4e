pub mod channel;
pub mod consts;
pub mod error;
pub mod message;
pub mod net;
pub mod protocol;
pub mod queue;

#[cfg(test)]
mod test;

pub use channel::{ChannelID, ChannelSettings};
pub use error::{QueueError, Result};
pub use message::NetworkMessage;
pub use net::transport::{PacketTag, TaggedPacket, Transport};
pub use queue::{config::QueueConfig, MessageQueue, QueueStats};
