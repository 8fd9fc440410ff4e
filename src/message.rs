use bytes::{Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    channel::ChannelID,
    error::EncodingError,
    net::{deserializer::PayloadDeserializer, serializer::PayloadSerializer},
};

/// An application payload together with the channel and sequence number the
/// queue assigned to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMessage {
    pub(crate) channel: ChannelID,
    pub(crate) seq: u32,
    payload: Bytes,
}

impl NetworkMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self::with_header(0, 0, payload)
    }

    pub fn with_header(channel: ChannelID, seq: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            seq,
            payload: payload.into(),
        }
    }

    /// Builds a message whose payload is `value` in the compact binary
    /// payload format.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodingError> {
        let mut ser = PayloadSerializer {
            output: BytesMut::new(),
            size: 0,
        };
        value.serialize(&mut ser)?;
        tracing::trace!("Serialized payload of {} bytes", ser.size);
        Ok(Self::new(ser.output.freeze()))
    }

    /// Reads the payload back as a `T` written by [`NetworkMessage::from_serialize`].
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, EncodingError> {
        let mut deser = PayloadDeserializer {
            input: &self.payload[..],
            consumed: 0,
        };
        T::deserialize(&mut deser)
    }

    pub fn channel(&self) -> ChannelID {
        self.channel
    }

    /// Sequence number on the channel; only carried on the wire by ordered
    /// channels
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
