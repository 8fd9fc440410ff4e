use std::{collections::VecDeque, time::Duration};

use bytes::Bytes;

use super::transport::{AckListener, ListenerId, PacketTag, TaggedPacket, Transport};

/// A transport that keeps everything in memory: inbound packets are pushed
/// in by hand, sent packets pile up in an outbox, and acks are fired with
/// [`MemoryTransport::ack`].
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Bytes>,
    outbox: Vec<TaggedPacket>,
    listeners: Vec<AckListener>,
    latency: Duration,
    next_seq: u16,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn set_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    pub fn push_inbound(&mut self, packet: impl Into<Bytes>) {
        self.inbound.push_back(packet.into());
    }

    /// Empties the outbox
    pub fn take_sent(&mut self) -> Vec<TaggedPacket> {
        std::mem::take(&mut self.outbox)
    }

    pub fn sent(&self) -> &[TaggedPacket] {
        &self.outbox
    }

    /// Reports `tag` as delivered to every registered listener
    pub fn ack(&mut self, tag: PacketTag) {
        self.listeners.retain(|listener| listener.on_packet_acked(tag));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Transport for MemoryTransport {
    fn receive(&mut self) -> Option<Bytes> {
        self.inbound.pop_front()
    }

    fn send_tagged(&mut self, packets: &mut [TaggedPacket]) -> std::io::Result<()> {
        for packet in packets.iter_mut() {
            self.next_seq = self.next_seq.wrapping_add(1);
            packet.seq = Some(self.next_seq);
            tracing::trace!(
                "Memory transport sending {} bytes under tag {}",
                packet.payload.len(),
                packet.tag
            );
        }
        self.outbox.extend_from_slice(packets);
        Ok(())
    }

    fn add_ack_listener(&mut self, listener: AckListener) {
        self.listeners.push(listener);
    }

    fn remove_ack_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|listener| listener.id() != id);
    }

    fn latency(&self) -> Duration {
        self.latency
    }
}
