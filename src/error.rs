use serde::{de::Error as DeError, ser::Error as SerError};
use std::num::TryFromIntError;
use std::str::Utf8Error;

use thiserror::*;

use crate::channel::ChannelID;

pub type Result<T> = std::result::Result<T, QueueError>;

/// An error for the message queue
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed packet: {0}")]
    MalformedPacket(#[from] EncodingError),

    #[error("Bad config: {0}")]
    BadConfig(String),

    #[error("Invalid channel id: {0}")]
    InvalidChannelId(ChannelID),

    #[error("Channel {0} has not been set up")]
    ChannelNotConfigured(ChannelID),

    #[error("Channel {0} already set")]
    ChannelAlreadyConfigured(ChannelID),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Was not able to fit any messages into packet: {size} bytes (max {max})")]
    PacketTooSmall { size: usize, max: usize },
}

/// An error that happens during encoding or decoding of wire data
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Not enough data, {0} > {1}")]
    NotEnoughData(usize, usize),
    #[error("Channel {0} is out of range")]
    InvalidChannel(u8),
    #[error("Channel {0} is not configured on this end")]
    UnknownChannel(u8),
    #[error("Invalid string data")]
    BadUtf8(#[from] Utf8Error),
    #[error("Invalid integer conversion")]
    IntConversion(#[from] TryFromIntError),
    #[error("Invalid option tag {0}")]
    InvalidOption(u8),
    #[error("Unsupported by the payload format: {0}")]
    Unsupported(&'static str),
    #[error("Serde error: {0}")]
    Custom(String),
}

impl SerError for EncodingError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EncodingError::Custom(msg.to_string())
    }
}

impl DeError for EncodingError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EncodingError::Custom(msg.to_string())
    }
}
