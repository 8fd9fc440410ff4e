pub mod config;
pub mod packer;
pub mod pending;

use std::{collections::VecDeque, time::Duration};

use tokio::sync::mpsc::{self, UnboundedReceiver};

use self::{
    config::QueueConfig,
    packer::create_packet,
    pending::{PendingPacket, PendingPackets},
};

use crate::{
    channel::{ChannelID, ChannelRegistry, ChannelSettings},
    error::{QueueError, Result},
    message::NetworkMessage,
    net::{
        sequence::WireSequence,
        transport::{AckListener, ListenerId, PacketTag, TaggedPacket, Transport},
    },
    protocol::{decode_messages, encode_messages, serialized_size},
};

/// Counters describing what a queue has done so far
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub packets_sent: u64,
    pub packets_resent: u64,
    /// Unreliable packets that timed out without an ack
    pub packets_expired: u64,
    pub packets_acked: u64,
    pub malformed_packets: u64,
    pub messages_received: u64,
}

/// Multiplexes channels of messages over one [`Transport`], packing them
/// into packets and resending reliable ones until acknowledged.
///
/// Everything happens on the caller's thread; acks reported by the transport
/// are applied the next time the queue is driven.
pub struct MessageQueue<T: Transport> {
    transport: T,
    config: QueueConfig,
    channels: ChannelRegistry,

    pending_msgs: VecDeque<NetworkMessage>,
    pending_packets: PendingPackets,

    listener_id: ListenerId,
    acks: UnboundedReceiver<PacketTag>,

    stats: QueueStats,
}

impl<T: Transport> MessageQueue<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, QueueConfig::default())
    }

    pub fn with_config(mut transport: T, config: QueueConfig) -> Self {
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let listener = AckListener::new(ack_tx);
        let listener_id = listener.id();
        transport.add_ack_listener(listener);
        tracing::debug!("Message queue registered ack listener {listener_id}");

        MessageQueue {
            transport,
            config,
            channels: ChannelRegistry::new(),
            pending_msgs: VecDeque::new(),
            pending_packets: PendingPackets::new(),
            listener_id,
            acks: ack_rx,
            stats: QueueStats::default(),
        }
    }

    pub fn configure_channel(&mut self, channel: ChannelID, settings: ChannelSettings) -> Result<()> {
        self.channels.configure(channel, settings)
    }

    /// Queues `msg` on `channel`, returning the sequence number it was given.
    pub fn enqueue(&mut self, mut msg: NetworkMessage, channel: ChannelID) -> Result<u32> {
        let settings = self.channels.settings(channel)?;
        let size = serialized_size(&msg, settings.ordered)?;
        if size > self.config.max_packet_size {
            return Err(QueueError::PacketTooSmall {
                size,
                max: self.config.max_packet_size,
            });
        }

        msg.channel = channel;
        msg.seq = self.channels.next_sequence(channel)?;
        tracing::trace!("Enqueued message {} on channel {channel}", msg.seq);

        let seq = msg.seq;
        self.pending_msgs.push_back(msg);
        Ok(seq)
    }

    /// Resends stale reliable packets and sends every pending message,
    /// returning how many packets went to the transport.
    pub fn send_all(&mut self) -> Result<usize> {
        let now = self.config.start_time.elapsed();
        self.send_all_at(now)
    }

    /// [`MessageQueue::send_all`] with `now` measured from the config's
    /// `start_time`.
    pub fn send_all_at(&mut self, now: Duration) -> Result<usize> {
        self.process_acks();

        let mut to_send = Vec::new();
        self.check_resend(now, &mut to_send)?;
        let resent = to_send.len();

        let mut packing = Ok(());
        while !self.pending_msgs.is_empty() {
            match create_packet(
                &mut self.pending_msgs,
                &self.channels,
                &mut self.pending_packets,
                self.config.max_packet_size,
                now,
            ) {
                Ok(packet) => to_send.push(packet),
                Err(e) => {
                    packing = Err(e);
                    break;
                }
            }
        }

        if !to_send.is_empty() {
            self.submit(&mut to_send, resent)?;
        }
        packing.map(|_| to_send.len())
    }

    fn submit(&mut self, to_send: &mut [TaggedPacket], resent: usize) -> Result<()> {
        if let Err(e) = self.transport.send_tagged(to_send) {
            // still tracked, so reliable packets go out again on timeout
            tracing::warn!("Transport failed to send {} packets: {e}", to_send.len());
            return Err(e.into());
        }

        for packet in to_send.iter() {
            self.pending_packets.set_seq(packet.tag, packet.seq);
        }
        self.stats.packets_sent += to_send.len() as u64;
        self.stats.packets_resent += resent as u64;
        tracing::debug!("Sent {} packets ({resent} resends)", to_send.len());
        Ok(())
    }

    fn check_resend(&mut self, now: Duration, collect: &mut Vec<TaggedPacket>) -> Result<()> {
        let timeout = self.config.resend_timeout(self.transport.latency());
        let timed_out = self.pending_packets.collect_timed_out(now, timeout);
        self.stats.packets_expired += timed_out.expired as u64;

        for stale in timed_out.resend {
            let data = encode_messages(&stale.msgs, &self.channels, stale.size)?;
            let tag = PacketTag::next();
            collect.push(TaggedPacket::resend(tag, data, stale.seq));
            self.pending_packets
                .insert(tag, PendingPacket::new(stale.msgs, stale.size, true, now));
        }
        Ok(())
    }

    /// Drains the transport and returns every message received, in arrival
    /// order. Malformed packets are dropped and counted.
    pub fn receive_all(&mut self) -> Vec<NetworkMessage> {
        self.process_acks();

        let mut result = Vec::new();
        while let Some(packet) = self.transport.receive() {
            let len = packet.len();
            match decode_messages(packet, &self.channels) {
                Ok(msgs) => result.extend(msgs.into_iter().map(|msg| self.restore_seq(msg))),
                Err(e) => {
                    self.stats.malformed_packets += 1;
                    tracing::warn!("Dropping malformed packet of {len} bytes: {e}");
                }
            }
        }
        self.stats.messages_received += result.len() as u64;
        result
    }

    fn restore_seq(&mut self, mut msg: NetworkMessage) -> NetworkMessage {
        if self.channels.settings_of(msg.channel).ordered {
            let wire = WireSequence::from_sequence(msg.seq);
            msg.seq = self.channels.expand_received(msg.channel, wire);
        }
        msg
    }

    /// Applies an ack for the packet sent under `tag`. Unknown or already
    /// resolved tags are ignored.
    pub fn on_packet_acked(&mut self, tag: PacketTag) {
        if self.pending_packets.on_ack(tag, &mut self.channels) {
            self.stats.packets_acked += 1;
        }
    }

    fn process_acks(&mut self) {
        while let Ok(tag) = self.acks.try_recv() {
            self.on_packet_acked(tag);
        }
    }

    /// The last acknowledged message of a channel configured to keep it
    pub fn last_acked(&mut self, channel: ChannelID) -> Result<Option<&NetworkMessage>> {
        self.process_acks();
        self.channels.last_ack(channel)
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn pending_messages(&self) -> usize {
        self.pending_msgs.len()
    }

    pub fn pending_packets(&self) -> usize {
        self.pending_packets.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> Drop for MessageQueue<T> {
    fn drop(&mut self) {
        self.transport.remove_ack_listener(self.listener_id);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use super::*;
    use crate::{net::memory::MemoryTransport, test::queue};

    const LATER: Duration = Duration::from_millis(300);

    #[test]
    fn enqueue_assigns_sequences_per_channel() {
        let mut queue = queue();
        assert_eq!(queue.enqueue(NetworkMessage::new("a"), 0).unwrap(), 1);
        assert_eq!(queue.enqueue(NetworkMessage::new("b"), 0).unwrap(), 2);
        assert_eq!(queue.enqueue(NetworkMessage::new("c"), 1).unwrap(), 1);
        assert_eq!(queue.pending_messages(), 3);
    }

    #[test]
    fn enqueue_errors_leave_state_alone() {
        let mut queue = queue();
        assert!(matches!(
            queue.enqueue(NetworkMessage::new("x"), 5),
            Err(QueueError::ChannelNotConfigured(5))
        ));
        assert!(matches!(
            queue.enqueue(NetworkMessage::new("x"), 32),
            Err(QueueError::InvalidChannelId(32))
        ));
        assert!(matches!(
            queue.enqueue(NetworkMessage::new(vec![0u8; 40_000]), 0),
            Err(QueueError::MessageTooLarge { .. })
        ));
        assert!(matches!(
            queue.enqueue(NetworkMessage::new(vec![0u8; 2000]), 0),
            Err(QueueError::PacketTooSmall { size: 2005, max: 1200 })
        ));
        assert_eq!(queue.pending_messages(), 0);
        assert_eq!(queue.channels().get(0).unwrap().last_seq(), 0);
    }

    #[test]
    fn duplicate_channel_configuration() {
        let mut queue = queue();
        assert!(matches!(
            queue.configure_channel(0, ChannelSettings::unreliable()),
            Err(QueueError::ChannelAlreadyConfigured(0))
        ));
    }

    #[test]
    fn nothing_to_send_is_a_no_op() {
        let mut queue = queue();
        assert_eq!(queue.send_all_at(Duration::ZERO).unwrap(), 0);
        assert!(queue.transport().sent().is_empty());
    }

    #[test]
    fn reliable_packet_resent_with_same_content() {
        let mut queue = queue();
        queue.enqueue(NetworkMessage::new(vec![1u8; 10]), 0).unwrap();
        assert_eq!(queue.send_all_at(Duration::ZERO).unwrap(), 1);
        let first = queue.transport_mut().take_sent().remove(0);
        assert_eq!(first.payload.len(), 14);

        assert_eq!(queue.send_all_at(LATER).unwrap(), 1);
        let resent = queue.transport_mut().take_sent().remove(0);
        assert_ne!(resent.tag, first.tag);
        assert_eq!(resent.payload, first.payload);
        assert_eq!(resent.resend_of, first.seq);
        assert_eq!(queue.stats().packets_resent, 1);

        // the original tag is gone; acking it changes nothing
        queue.on_packet_acked(first.tag);
        assert_eq!(queue.pending_packets(), 1);
        assert_eq!(queue.stats().packets_acked, 0);
    }

    #[test]
    fn resent_once_per_window() {
        let mut queue = queue();
        queue.enqueue(NetworkMessage::new("payload"), 0).unwrap();
        queue.send_all_at(Duration::ZERO).unwrap();
        queue.transport_mut().take_sent();

        assert_eq!(queue.send_all_at(Duration::from_millis(150)).unwrap(), 1);
        assert_eq!(queue.send_all_at(Duration::from_millis(200)).unwrap(), 0);
        assert_eq!(queue.send_all_at(Duration::from_millis(251)).unwrap(), 1);
    }

    #[test]
    fn latency_stretches_the_timeout() {
        let mut queue = queue();
        queue.transport_mut().set_latency(Duration::from_millis(200));
        queue.enqueue(NetworkMessage::new("slow"), 0).unwrap();
        queue.send_all_at(Duration::ZERO).unwrap();

        assert_eq!(queue.send_all_at(Duration::from_millis(300)).unwrap(), 0);
        assert_eq!(queue.send_all_at(Duration::from_millis(401)).unwrap(), 1);
    }

    #[test]
    fn unreliable_packet_is_dropped_after_timeout() {
        let mut queue = queue();
        queue.enqueue(NetworkMessage::new(vec![0u8; 5]), 1).unwrap();
        queue.send_all_at(Duration::ZERO).unwrap();
        assert_eq!(queue.transport_mut().take_sent()[0].payload.len(), 7);

        assert_eq!(queue.send_all_at(LATER).unwrap(), 0);
        assert_eq!(queue.pending_packets(), 0);
        assert_eq!(queue.stats().packets_expired, 1);
    }

    #[test]
    fn acks_from_the_transport_resolve_packets() {
        let mut queue = queue();
        queue.enqueue(NetworkMessage::new("kept"), 2).unwrap();
        queue.send_all_at(Duration::ZERO).unwrap();
        let tag = queue.transport_mut().take_sent()[0].tag;

        queue.transport_mut().ack(tag);
        let kept = queue.last_acked(2).unwrap().cloned().unwrap();
        assert_eq!(kept.payload().as_ref(), b"kept");
        assert_eq!(queue.pending_packets(), 0);
        assert_eq!(queue.send_all_at(LATER).unwrap(), 0);
    }

    #[test]
    fn records_transport_sequence() {
        let mut queue = queue();
        queue.enqueue(NetworkMessage::new("seq"), 0).unwrap();
        queue.send_all_at(Duration::ZERO).unwrap();
        let sent = queue.transport_mut().take_sent().remove(0);
        assert!(sent.seq.is_some());
        assert_eq!(queue.pending_packets.get(sent.tag).unwrap().seq, sent.seq);
    }

    #[test]
    fn malformed_packets_do_not_stop_draining() {
        let mut queue = queue();
        queue.transport_mut().push_inbound(vec![1u8, 1, b'a']);
        queue.transport_mut().push_inbound(vec![1u8, 9, b'b']);
        queue.transport_mut().push_inbound(vec![1u8, 1, b'c']);

        let msgs = queue.receive_all();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].payload().as_ref(), b"c");
        assert_eq!(queue.stats().malformed_packets, 1);
        assert_eq!(queue.stats().messages_received, 2);
    }

    struct Shared(Rc<RefCell<MemoryTransport>>);

    impl Transport for Shared {
        fn receive(&mut self) -> Option<bytes::Bytes> {
            self.0.borrow_mut().receive()
        }

        fn send_tagged(&mut self, packets: &mut [TaggedPacket]) -> std::io::Result<()> {
            self.0.borrow_mut().send_tagged(packets)
        }

        fn add_ack_listener(&mut self, listener: AckListener) {
            self.0.borrow_mut().add_ack_listener(listener)
        }

        fn remove_ack_listener(&mut self, id: ListenerId) {
            self.0.borrow_mut().remove_ack_listener(id)
        }

        fn latency(&self) -> Duration {
            self.0.borrow().latency()
        }
    }

    #[test]
    fn drop_unregisters_listener() {
        let inner = Rc::new(RefCell::new(MemoryTransport::new()));
        let queue = MessageQueue::new(Shared(inner.clone()));
        assert_eq!(inner.borrow().listener_count(), 1);
        drop(queue);
        assert_eq!(inner.borrow().listener_count(), 0);
    }
}
