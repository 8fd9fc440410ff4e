//! Wire format of a packet: messages written back to back, each as
//!
//! ```text
//! channel (1) | seq (2, LE, ordered channels only) | length (1 or 2) | payload
//! ```
//!
//! Lengths below 128 take one byte. Longer lengths take two bytes, high byte
//! first, with the top bit of the first byte set as the extension marker.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    channel::{ChannelID, ChannelRegistry},
    consts::{LONG_LENGTH_FLAG, MAX_CHANNELS, MAX_MESSAGE_LEN, SHORT_LENGTH_LIMIT},
    error::{EncodingError, QueueError, Result},
    message::NetworkMessage,
    net::sequence::WireSequence,
};

/// Header written in front of every message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub channel: ChannelID,
    pub seq: Option<WireSequence>,
    pub length: u16,
}

impl MessageHeader {
    pub fn new(msg: &NetworkMessage, ordered: bool) -> Result<Self> {
        let length = checked_length(msg.len())?;
        Ok(Self {
            channel: msg.channel(),
            seq: ordered.then(|| WireSequence::from_sequence(msg.seq())),
            length,
        })
    }

    pub fn size(&self) -> usize {
        header_size(self.length.into(), self.seq.is_some())
    }

    pub fn write<B: BufMut>(&self, output: &mut B) {
        output.put_u8(self.channel);
        if let Some(seq) = self.seq {
            output.put_u16_le(seq.into());
        }
        if usize::from(self.length) < SHORT_LENGTH_LIMIT {
            output.put_u8(self.length as u8);
        } else {
            output.put_u8((self.length >> 8) as u8 | LONG_LENGTH_FLAG);
            output.put_u8((self.length & 0xFF) as u8);
        }
    }

    /// Reads one header; the channel's settings decide whether a sequence
    /// number follows the channel byte.
    pub fn read<B: Buf>(
        input: &mut B,
        channels: &ChannelRegistry,
    ) -> std::result::Result<Self, EncodingError> {
        need(input, 1)?;
        let channel = input.get_u8();
        if usize::from(channel) >= MAX_CHANNELS {
            return Err(EncodingError::InvalidChannel(channel));
        }
        let ordered = channels
            .settings(channel)
            .map_err(|_| EncodingError::UnknownChannel(channel))?
            .ordered;

        let seq = if ordered {
            need(input, 2)?;
            Some(WireSequence::from(input.get_u16_le()))
        } else {
            None
        };

        need(input, 1)?;
        let first = input.get_u8();
        let length = if first & LONG_LENGTH_FLAG != 0 {
            need(input, 1)?;
            u16::from(first & !LONG_LENGTH_FLAG) << 8 | u16::from(input.get_u8())
        } else {
            first.into()
        };

        Ok(Self {
            channel,
            seq,
            length,
        })
    }
}

fn need<B: Buf>(input: &B, len: usize) -> std::result::Result<(), EncodingError> {
    let available = input.remaining();
    if available < len {
        return Err(EncodingError::NotEnoughData(len, available));
    }
    Ok(())
}

fn checked_length(len: usize) -> Result<u16> {
    if len > MAX_MESSAGE_LEN {
        return Err(QueueError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(len as u16)
}

pub fn header_size(payload_len: usize, ordered: bool) -> usize {
    let seq = if ordered { 2 } else { 0 };
    let length = if payload_len < SHORT_LENGTH_LIMIT { 1 } else { 2 };
    1 + seq + length
}

/// Header plus payload size of `msg` on a channel with the given ordering
pub fn serialized_size(msg: &NetworkMessage, ordered: bool) -> Result<usize> {
    checked_length(msg.len())?;
    Ok(header_size(msg.len(), ordered) + msg.len())
}

/// Writes `msgs` back to back into one buffer of exactly `total_size` bytes.
///
/// # Panics
///
/// If `total_size` is not the serialized size of `msgs`.
pub fn encode_messages(
    msgs: &[NetworkMessage],
    channels: &ChannelRegistry,
    total_size: usize,
) -> Result<Bytes> {
    let mut output = BytesMut::with_capacity(total_size);
    for msg in msgs {
        let ordered = channels.settings_of(msg.channel()).ordered;
        let header = MessageHeader::new(msg, ordered)?;
        header.write(&mut output);
        output.put_slice(msg.payload());
    }
    assert_eq!(
        output.len(),
        total_size,
        "packet size does not match its messages"
    );
    tracing::trace!("Encoded {} messages into {} bytes", msgs.len(), total_size);
    Ok(output.freeze())
}

/// Splits a packet back into its messages. Sequence numbers come back as
/// their 16 bit wire value.
pub fn decode_messages(
    packet: Bytes,
    channels: &ChannelRegistry,
) -> std::result::Result<Vec<NetworkMessage>, EncodingError> {
    let mut input = packet;
    let mut msgs = Vec::new();
    while input.has_remaining() {
        let header = MessageHeader::read(&mut input, channels)?;
        let length = usize::from(header.length);
        need(&input, length)?;
        let payload = input.split_to(length);
        let seq = header.seq.map(u16::from).unwrap_or(0);
        msgs.push(NetworkMessage::with_header(header.channel, seq.into(), payload));
    }
    tracing::trace!("Decoded {} messages", msgs.len());
    Ok(msgs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::registry;

    #[test]
    fn ordered_short_header() {
        let channels = registry();
        let msg = NetworkMessage::with_header(0, 0x0102_0304, vec![9u8; 10]);
        assert_eq!(serialized_size(&msg, true).unwrap(), 14);

        let bytes = encode_messages(std::slice::from_ref(&msg), &channels, 14).unwrap();
        assert_eq!(&bytes[..4], &[0, 0x04, 0x03, 10]);
        assert_eq!(&bytes[4..], &[9u8; 10]);
    }

    #[test]
    fn unordered_short_header() {
        let channels = registry();
        let msg = NetworkMessage::with_header(1, 5, vec![1u8, 2, 3, 4, 5]);
        let bytes = encode_messages(std::slice::from_ref(&msg), &channels, 7).unwrap();
        assert_eq!(&bytes[..], &[1, 5, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn long_length_field() {
        let channels = registry();
        let msg = NetworkMessage::with_header(1, 0, vec![0u8; 300]);
        let size = serialized_size(&msg, false).unwrap();
        assert_eq!(size, 1 + 2 + 300);

        let bytes = encode_messages(std::slice::from_ref(&msg), &channels, size).unwrap();
        assert_eq!(&bytes[..3], &[1, 0x80 | 0x01, 0x2C]);

        let decoded = decode_messages(bytes, &channels).unwrap();
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn length_boundaries() {
        assert_eq!(header_size(127, false), 2);
        assert_eq!(header_size(128, false), 3);
        assert_eq!(header_size(MAX_MESSAGE_LEN, true), 5);

        let msg = NetworkMessage::new(vec![0u8; MAX_MESSAGE_LEN + 1]);
        assert!(matches!(
            serialized_size(&msg, false),
            Err(QueueError::MessageTooLarge { size: 32768, max: 32767 })
        ));
    }

    #[test]
    fn several_messages_keep_order() {
        let channels = registry();
        let msgs = vec![
            NetworkMessage::with_header(0, 1, "first"),
            NetworkMessage::with_header(1, 0, vec![7u8; 200]),
            NetworkMessage::with_header(0, 2, ""),
        ];
        let total = msgs
            .iter()
            .map(|m| serialized_size(m, m.channel() == 0).unwrap())
            .sum();
        let bytes = encode_messages(&msgs, &channels, total).unwrap();
        assert_eq!(decode_messages(bytes, &channels).unwrap(), msgs);
    }

    #[test]
    #[should_panic(expected = "packet size does not match")]
    fn wrong_total_size_is_a_bug() {
        let channels = registry();
        let msg = NetworkMessage::with_header(1, 0, "abc");
        let _ = encode_messages(&[msg], &channels, 99);
    }

    #[test]
    fn truncated_header() {
        let channels = registry();
        let err = decode_messages(Bytes::from_static(&[0, 0x01]), &channels).unwrap_err();
        assert!(matches!(err, EncodingError::NotEnoughData(2, 1)));

        let err = decode_messages(Bytes::from_static(&[1, 0x81]), &channels).unwrap_err();
        assert!(matches!(err, EncodingError::NotEnoughData(1, 0)));
    }

    #[test]
    fn payload_overruns_packet() {
        let channels = registry();
        let err = decode_messages(Bytes::from_static(&[1, 4, b'a', b'b']), &channels).unwrap_err();
        assert!(matches!(err, EncodingError::NotEnoughData(4, 2)));
    }

    #[test]
    fn bad_channels() {
        let channels = registry();
        assert!(matches!(
            decode_messages(Bytes::from_static(&[40, 0]), &channels),
            Err(EncodingError::InvalidChannel(40))
        ));
        assert!(matches!(
            decode_messages(Bytes::from_static(&[9, 0]), &channels),
            Err(EncodingError::UnknownChannel(9))
        ));
    }

    #[test]
    fn empty_packet_has_no_messages() {
        let channels = registry();
        assert!(decode_messages(Bytes::new(), &channels).unwrap().is_empty());
    }
}
