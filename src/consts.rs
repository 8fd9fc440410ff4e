use std::time::Duration;

/// Number of fixed channel slots on every queue
pub const MAX_CHANNELS: usize = 32;
/// Default byte budget of one outbound packet
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1200;
/// Largest packet budget a queue can be configured with
pub const MAXIMUM_PACKET_SIZE: usize = 0xFFFF;
/// Largest payload the two byte length field can describe
pub const MAX_MESSAGE_LEN: usize = 0x7FFF;
/// Payloads below this length use the one byte length field
pub const SHORT_LENGTH_LIMIT: usize = 0x80;
/// Marker bit set on the first byte of a two byte length field
pub const LONG_LENGTH_FLAG: u8 = 0x80;
/// Header of an ordered message with a long length: channel, sequence, length
pub const MAX_HEADER_SIZE: usize = 5;
/// Lower bound of the resend timeout
pub const MIN_RESEND_TIMEOUT: Duration = Duration::from_millis(100);
/// Latency multiplier applied when sizing the resend timeout
pub const RESEND_LATENCY_MULTIPLIER: u32 = 2;
