use std::{collections::VecDeque, time::Duration};

use crate::{
    channel::ChannelRegistry,
    error::{QueueError, Result},
    message::NetworkMessage,
    net::transport::{PacketTag, TaggedPacket},
    protocol::{encode_messages, serialized_size},
};

use super::pending::{PendingPacket, PendingPackets};

/// Messages chosen for one packet
#[derive(Debug)]
pub struct PackedMessages {
    pub msgs: Vec<NetworkMessage>,
    pub size: usize,
    pub reliable: bool,
}

/// Moves messages out of `pending` into one packet of at most `max_size`
/// bytes. The first message that fits fixes the packet's reliability; later
/// messages of the other class, or that no longer fit, stay pending in their
/// original order.
pub fn select_messages(
    pending: &mut VecDeque<NetworkMessage>,
    channels: &ChannelRegistry,
    max_size: usize,
) -> Result<PackedMessages> {
    let mut msgs = Vec::new();
    let mut size = 0;
    let mut packet_reliable = None;
    let mut smallest_rejected = None;
    let mut invalid = None;

    let mut remaining = VecDeque::with_capacity(pending.len());
    for msg in pending.drain(..) {
        let settings = channels.settings_of(msg.channel());
        if packet_reliable.is_some_and(|reliable| reliable != settings.reliable) {
            remaining.push_back(msg);
            continue;
        }

        let msg_size = match serialized_size(&msg, settings.ordered) {
            Ok(msg_size) => msg_size,
            Err(e) => {
                invalid.get_or_insert(e);
                remaining.push_back(msg);
                continue;
            }
        };
        if size + msg_size > max_size {
            smallest_rejected = Some(smallest_rejected.map_or(msg_size, |s: usize| s.min(msg_size)));
            remaining.push_back(msg);
            continue;
        }

        size += msg_size;
        packet_reliable = Some(settings.reliable);
        msgs.push(msg);
    }
    *pending = remaining;

    let Some(reliable) = packet_reliable else {
        if let Some(e) = invalid {
            return Err(e);
        }
        return Err(QueueError::PacketTooSmall {
            size: smallest_rejected.unwrap_or(0),
            max: max_size,
        });
    };

    Ok(PackedMessages {
        msgs,
        size,
        reliable,
    })
}

/// Packs the next packet from `pending`, serializes it and starts tracking
/// it under a fresh tag.
pub fn create_packet(
    pending: &mut VecDeque<NetworkMessage>,
    channels: &ChannelRegistry,
    tracker: &mut PendingPackets,
    max_size: usize,
    now: Duration,
) -> Result<TaggedPacket> {
    let packed = select_messages(pending, channels, max_size)?;
    let data = encode_messages(&packed.msgs, channels, packed.size)?;

    let tag = PacketTag::next();
    tracing::trace!(
        "Packed {} messages into packet {tag} ({} bytes, reliable: {})",
        packed.msgs.len(),
        packed.size,
        packed.reliable
    );
    tracker.insert(
        tag,
        PendingPacket::new(packed.msgs, packed.size, packed.reliable, now),
    );

    Ok(TaggedPacket::new(tag, data))
}
