use std::time::{Duration, Instant};

use crate::{
    consts::{
        DEFAULT_MAX_PACKET_SIZE, MAXIMUM_PACKET_SIZE, MAX_HEADER_SIZE, MIN_RESEND_TIMEOUT,
        RESEND_LATENCY_MULTIPLIER,
    },
    error::{QueueError, Result},
};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_packet_size: usize,
    pub min_resend_timeout: Duration,
    pub latency_multiplier: u32,
    pub start_time: Instant,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            min_resend_timeout: MIN_RESEND_TIMEOUT,
            latency_multiplier: RESEND_LATENCY_MULTIPLIER,
            start_time: Instant::now(),
        }
    }
}

impl QueueConfig {
    pub fn new(max_packet_size: usize) -> Result<Self> {
        if max_packet_size <= MAX_HEADER_SIZE {
            return Err(QueueError::BadConfig(format!(
                "packet size {max_packet_size} cannot hold a single message"
            )));
        }
        if max_packet_size > MAXIMUM_PACKET_SIZE {
            return Err(QueueError::BadConfig(format!(
                "packet size {max_packet_size} is above {MAXIMUM_PACKET_SIZE}"
            )));
        }
        Ok(QueueConfig {
            max_packet_size,
            ..Default::default()
        })
    }

    /// How long a sent packet may stay unacknowledged given the current
    /// latency estimate
    pub fn resend_timeout(&self, latency: Duration) -> Duration {
        self.min_resend_timeout
            .max(latency.saturating_mul(self.latency_multiplier))
    }
}
