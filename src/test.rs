use crate::{
    channel::{ChannelRegistry, ChannelSettings},
    net::memory::MemoryTransport,
    queue::MessageQueue,
};

/// Channel 0 reliable and ordered, channel 1 unreliable, channel 2 reliable
/// keeping its last acked message
pub(crate) fn registry() -> ChannelRegistry {
    let mut channels = ChannelRegistry::new();
    for (id, settings) in layout() {
        channels.configure(id, settings).unwrap();
    }
    channels
}

pub(crate) fn queue() -> MessageQueue<MemoryTransport> {
    let _ = tracing_subscriber::fmt::try_init();
    let mut queue = MessageQueue::new(MemoryTransport::new());
    for (id, settings) in layout() {
        queue.configure_channel(id, settings).unwrap();
    }
    queue
}

fn layout() -> [(u8, ChannelSettings); 3] {
    [
        (0, ChannelSettings::reliable_ordered()),
        (1, ChannelSettings::unreliable()),
        (2, ChannelSettings::new(true, false, true)),
    ]
}
