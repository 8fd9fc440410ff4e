use crate::{
    consts::MAX_CHANNELS,
    error::{QueueError, Result},
    message::NetworkMessage,
    net::sequence::{is_newer, WireSequence},
};

/// An ID to identify the channel with
pub type ChannelID = u8;

/// Delivery contract of one channel, fixed once configured
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Lost messages are sent again until acknowledged
    pub reliable: bool,
    /// Messages carry a sequence number on the wire
    pub ordered: bool,
    /// The last acknowledged message is kept around
    pub keep_last_sent: bool,
}

impl ChannelSettings {
    pub fn new(reliable: bool, ordered: bool, keep_last_sent: bool) -> Self {
        Self {
            reliable,
            ordered,
            keep_last_sent,
        }
    }

    pub fn reliable_ordered() -> Self {
        Self::new(true, true, false)
    }

    pub fn unreliable() -> Self {
        Self::default()
    }
}

/// Represents a single channel slot of a queue
#[derive(Debug, Default)]
pub struct Channel {
    pub(crate) settings: Option<ChannelSettings>,

    pub(crate) last_seq: u32,
    pub(crate) last_ack_seq: u32,
    pub(crate) last_ack: Option<NetworkMessage>,

    pub(crate) last_recv_seq: u32,
}

impl Channel {
    pub fn settings(&self) -> Option<ChannelSettings> {
        self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.settings.is_some()
    }

    pub fn last_seq(&self) -> u32 {
        self.last_seq
    }

    pub fn last_ack_seq(&self) -> u32 {
        self.last_ack_seq
    }

    pub fn last_ack(&self) -> Option<&NetworkMessage> {
        self.last_ack.as_ref()
    }
}

/// Fixed table of every channel slot, indexed by channel number
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: [Channel; MAX_CHANNELS],
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| Channel::default()),
        }
    }

    pub fn get(&self, id: ChannelID) -> Result<&Channel> {
        self.channels
            .get(usize::from(id))
            .ok_or(QueueError::InvalidChannelId(id))
    }

    fn get_mut(&mut self, id: ChannelID) -> Result<&mut Channel> {
        self.channels
            .get_mut(usize::from(id))
            .ok_or(QueueError::InvalidChannelId(id))
    }

    pub fn configure(&mut self, id: ChannelID, settings: ChannelSettings) -> Result<()> {
        let channel = self.get_mut(id)?;
        if channel.is_initialized() {
            return Err(QueueError::ChannelAlreadyConfigured(id));
        }
        channel.settings = Some(settings);
        tracing::debug!("Configured channel {id}: {settings:?}");
        Ok(())
    }

    pub fn settings(&self, id: ChannelID) -> Result<ChannelSettings> {
        self.get(id)?
            .settings
            .ok_or(QueueError::ChannelNotConfigured(id))
    }

    /// Settings of a channel known to be in range and configured, as on
    /// messages that already went through `enqueue`.
    pub(crate) fn settings_of(&self, id: ChannelID) -> ChannelSettings {
        self.settings(id).unwrap_or_default()
    }

    pub fn next_sequence(&mut self, id: ChannelID) -> Result<u32> {
        let channel = self.get_mut(id)?;
        if !channel.is_initialized() {
            return Err(QueueError::ChannelNotConfigured(id));
        }
        channel.last_seq = channel.last_seq.wrapping_add(1);
        Ok(channel.last_seq)
    }

    /// Records an acknowledged sequence, returning whether it advanced the
    /// channel's ack state.
    pub fn record_ack(&mut self, id: ChannelID, seq: u32) -> bool {
        let Ok(channel) = self.get_mut(id) else {
            return false;
        };
        if !is_newer(seq, channel.last_ack_seq) {
            return false;
        }
        channel.last_ack_seq = seq;
        true
    }

    /// Keeps `msg` as the channel's last acknowledged message if the channel
    /// asks for it. Returns the message back otherwise.
    pub(crate) fn store_last_ack(&mut self, msg: NetworkMessage) -> Option<NetworkMessage> {
        let keep = self.settings_of(msg.channel()).keep_last_sent;
        match self.get_mut(msg.channel()) {
            Ok(channel) if keep => {
                channel.last_ack = Some(msg);
                None
            }
            _ => Some(msg),
        }
    }

    pub fn last_ack(&self, id: ChannelID) -> Result<Option<&NetworkMessage>> {
        Ok(self.get(id)?.last_ack())
    }

    /// Rebuilds a full sequence number from its wire form using the newest
    /// sequence received on the channel so far.
    pub(crate) fn expand_received(&mut self, id: ChannelID, wire: WireSequence) -> u32 {
        let Ok(channel) = self.get_mut(id) else {
            return u16::from(wire).into();
        };
        let seq = wire.to_sequence(channel.last_recv_seq);
        if is_newer(seq, channel.last_recv_seq) {
            channel.last_recv_seq = seq;
        }
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_once() {
        let mut registry = ChannelRegistry::new();
        registry.configure(3, ChannelSettings::reliable_ordered()).unwrap();
        assert!(matches!(
            registry.configure(3, ChannelSettings::unreliable()),
            Err(QueueError::ChannelAlreadyConfigured(3))
        ));
        assert_eq!(registry.settings(3).unwrap(), ChannelSettings::reliable_ordered());
    }

    #[test]
    fn out_of_range_channel() {
        let mut registry = ChannelRegistry::new();
        assert!(matches!(
            registry.configure(32, ChannelSettings::default()),
            Err(QueueError::InvalidChannelId(32))
        ));
        assert!(matches!(
            registry.next_sequence(200),
            Err(QueueError::InvalidChannelId(200))
        ));
    }

    #[test]
    fn sequence_needs_configuration() {
        let mut registry = ChannelRegistry::new();
        assert!(matches!(
            registry.next_sequence(0),
            Err(QueueError::ChannelNotConfigured(0))
        ));
        registry.configure(0, ChannelSettings::default()).unwrap();
        assert_eq!(registry.next_sequence(0).unwrap(), 1);
        assert_eq!(registry.next_sequence(0).unwrap(), 2);
    }

    #[test]
    fn sequence_wraps() {
        let mut registry = ChannelRegistry::new();
        registry.configure(1, ChannelSettings::default()).unwrap();
        registry.channels[1].last_seq = u32::MAX;
        assert_eq!(registry.next_sequence(1).unwrap(), 0);
    }

    #[test]
    fn channels_are_isolated() {
        let mut registry = ChannelRegistry::new();
        registry.configure(0, ChannelSettings::default()).unwrap();
        registry.configure(1, ChannelSettings::default()).unwrap();
        for _ in 0..5 {
            registry.next_sequence(0).unwrap();
        }
        assert!(registry.record_ack(0, 5));
        assert_eq!(registry.get(1).unwrap().last_seq(), 0);
        assert_eq!(registry.get(1).unwrap().last_ack_seq(), 0);
    }

    #[test]
    fn ack_never_moves_backward() {
        let mut registry = ChannelRegistry::new();
        registry.configure(0, ChannelSettings::default()).unwrap();
        assert!(registry.record_ack(0, 10));
        assert!(!registry.record_ack(0, 7));
        assert!(!registry.record_ack(0, 10));
        assert_eq!(registry.get(0).unwrap().last_ack_seq(), 10);
    }

    #[test]
    fn ack_advances_across_wraparound() {
        let mut registry = ChannelRegistry::new();
        registry.configure(0, ChannelSettings::default()).unwrap();
        registry.channels[0].last_ack_seq = 0xFFFF_FFFE;
        assert!(registry.record_ack(0, 4));
        assert_eq!(registry.get(0).unwrap().last_ack_seq(), 4);
        assert!(!registry.record_ack(0, 0xFFFF_FFFE));
    }

    #[test]
    fn last_ack_kept_only_when_asked() {
        let mut registry = ChannelRegistry::new();
        registry.configure(0, ChannelSettings::new(true, false, true)).unwrap();
        registry.configure(1, ChannelSettings::new(true, false, false)).unwrap();

        let kept = NetworkMessage::with_header(0, 1, "kept");
        assert!(registry.store_last_ack(kept.clone()).is_none());
        assert_eq!(registry.last_ack(0).unwrap(), Some(&kept));

        let returned = NetworkMessage::with_header(1, 1, "dropped");
        assert_eq!(registry.store_last_ack(returned.clone()), Some(returned));
        assert_eq!(registry.last_ack(1).unwrap(), None);
    }

    #[test]
    fn expands_received_sequences() {
        let mut registry = ChannelRegistry::new();
        registry.configure(0, ChannelSettings::reliable_ordered()).unwrap();
        registry.channels[0].last_recv_seq = 0x0001_FFFF;
        assert_eq!(registry.expand_received(0, WireSequence::from(0x0001)), 0x0002_0001);
        // an older straggler does not pull the reference back
        assert_eq!(registry.expand_received(0, WireSequence::from(0xFFF0)), 0x0001_FFF0);
        assert_eq!(registry.channels[0].last_recv_seq, 0x0002_0001);
    }
}
