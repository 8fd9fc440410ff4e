use std::{
    fmt::Display,
    sync::atomic::{AtomicU32, AtomicU64, Ordering},
    time::Duration,
};

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

static NEXT_PACKET_TAG: AtomicU64 = AtomicU64::new(0);
static NEXT_LISTENER_ID: AtomicU32 = AtomicU32::new(0);

/// Identifies one transmitted packet; echoed back by the transport on ack
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Debug)]
pub struct PacketTag(pub u64);

impl PacketTag {
    /// Hands out a tag never used before in this process
    pub(crate) fn next() -> Self {
        Self(NEXT_PACKET_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for PacketTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<PacketTag> for u64 {
    fn from(value: PacketTag) -> Self {
        value.0
    }
}

/// One outbound packet handed to [`Transport::send_tagged`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedPacket {
    pub tag: PacketTag,
    pub payload: Bytes,
    /// Transport sequence of the stale transmission this packet replaces
    pub resend_of: Option<u16>,
    /// Transport sequence assigned by `send_tagged`
    pub seq: Option<u16>,
}

impl TaggedPacket {
    pub fn new(tag: PacketTag, payload: Bytes) -> Self {
        Self {
            tag,
            payload,
            resend_of: None,
            seq: None,
        }
    }

    pub fn resend(tag: PacketTag, payload: Bytes, resend_of: Option<u16>) -> Self {
        Self {
            resend_of,
            ..Self::new(tag, payload)
        }
    }
}

#[derive(Eq, PartialEq, Hash, Copy, Clone, Debug)]
pub struct ListenerId(pub u32);

impl Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Registration handle through which a transport reports acknowledged tags
#[derive(Debug, Clone)]
pub struct AckListener {
    id: ListenerId,
    sender: UnboundedSender<PacketTag>,
}

impl AckListener {
    pub(crate) fn new(sender: UnboundedSender<PacketTag>) -> Self {
        Self {
            id: ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed)),
            sender,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns false once the listening queue is gone.
    pub fn on_packet_acked(&self, tag: PacketTag) -> bool {
        self.sender.send(tag).is_ok()
    }
}

/// The unreliable, tagged, ack-notifying connection a queue sits on top of.
///
/// All calls must return immediately.
pub trait Transport {
    /// Pulls one raw inbound packet, if any is waiting
    fn receive(&mut self) -> Option<Bytes>;

    /// Submits packets for transmission, filling in each packet's `seq`
    fn send_tagged(&mut self, packets: &mut [TaggedPacket]) -> std::io::Result<()>;

    fn add_ack_listener(&mut self, listener: AckListener);

    fn remove_ack_listener(&mut self, id: ListenerId);

    /// Current round trip estimate
    fn latency(&self) -> Duration;
}
