use std::{collections::BTreeMap, time::Duration};

use crate::{channel::ChannelRegistry, message::NetworkMessage, net::transport::PacketTag};

/// A sent packet still waiting for its ack
#[derive(Debug)]
pub struct PendingPacket {
    pub msgs: Vec<NetworkMessage>,
    pub size: usize,
    pub reliable: bool,
    pub time_sent: Duration,
    /// Transport sequence the packet went out under, once known
    pub seq: Option<u16>,
}

impl PendingPacket {
    pub fn new(msgs: Vec<NetworkMessage>, size: usize, reliable: bool, time_sent: Duration) -> Self {
        Self {
            msgs,
            size,
            reliable,
            time_sent,
            seq: None,
        }
    }

    fn is_stale(&self, now: Duration, timeout: Duration) -> bool {
        now.saturating_sub(self.time_sent) > timeout
    }
}

/// Stale packets taken out of tracking by [`PendingPackets::collect_timed_out`]
#[derive(Debug, Default)]
pub struct TimedOut {
    /// Reliable packets, oldest tag first, to be sent again
    pub resend: Vec<PendingPacket>,
    /// Unreliable packets that were forgotten
    pub expired: usize,
}

/// Every packet sent and not yet acknowledged or timed out, by tag
#[derive(Debug, Default)]
pub struct PendingPackets {
    packets: BTreeMap<PacketTag, PendingPacket>,
}

impl PendingPackets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: PacketTag, packet: PendingPacket) {
        self.packets.insert(tag, packet);
    }

    pub fn get(&self, tag: PacketTag) -> Option<&PendingPacket> {
        self.packets.get(&tag)
    }

    pub fn set_seq(&mut self, tag: PacketTag, seq: Option<u16>) {
        if let Some(packet) = self.packets.get_mut(&tag) {
            packet.seq = seq;
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Resolves an ack against the packet sent under `tag`. Unknown tags,
    /// including ones already acked or timed out, are ignored.
    pub fn on_ack(&mut self, tag: PacketTag, channels: &mut ChannelRegistry) -> bool {
        let Some(packet) = self.packets.remove(&tag) else {
            tracing::trace!("Ignoring ack for unknown tag {tag}");
            return false;
        };

        tracing::debug!("Packet {tag} acked with {} messages", packet.msgs.len());
        for msg in packet.msgs {
            if channels.record_ack(msg.channel(), msg.seq()) {
                // dropped unless the channel keeps its last acked message
                let _ = channels.store_last_ack(msg);
            }
        }
        true
    }

    /// Takes every packet older than `timeout` out of tracking.
    pub fn collect_timed_out(&mut self, now: Duration, timeout: Duration) -> TimedOut {
        let stale: Vec<PacketTag> = self
            .packets
            .iter()
            .filter(|(_, packet)| packet.is_stale(now, timeout))
            .map(|(tag, _)| *tag)
            .collect();

        let mut timed_out = TimedOut::default();
        for tag in stale {
            let Some(packet) = self.packets.remove(&tag) else {
                continue;
            };
            if packet.reliable {
                tracing::debug!("Resending packet {tag} after {:?}", now - packet.time_sent);
                timed_out.resend.push(packet);
            } else {
                tracing::debug!("Forgetting unreliable packet {tag}");
                timed_out.expired += 1;
            }
        }
        timed_out
    }
}
