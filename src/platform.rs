//! Platform services the driver is built on.
//!
//! The driver never touches a peripheral directly. A [`Uart`] provides
//! transmission plus one interrupt-style receive operation that is armed with
//! a capacity, fills in the background, and can be aborted; a [`Delay`]
//! provides blocking microsecond waits.

use crate::constants::*;
use crate::error::{Result, XBeeError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Blocking delay with microsecond granularity
pub trait Delay {
    fn delay_us(&mut self, us: u32);

    fn delay(&mut self, duration: Duration) {
        let us = u32::try_from(duration.as_micros()).unwrap_or(u32::MAX);
        self.delay_us(us);
    }
}

/// Result of a single transmit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Sent,
    /// The channel did not accept the bytes; nothing was sent
    Busy,
}

/// Serial line with a single background receive operation.
///
/// The receive side follows a strict single-producer/single-consumer
/// discipline: the operation fills its storage while active, and the caller
/// only reads it back after [`Uart::abort_receive`] has taken effect and
/// [`Uart::rx_active`] reports false.
pub trait Uart {
    /// Send all of `data` or nothing
    fn transmit(&mut self, data: &[u8], timeout: Duration) -> Result<TxStatus>;

    /// Bytes received since the operation was armed
    fn received(&mut self) -> Result<usize>;

    fn rx_active(&mut self) -> Result<bool>;

    /// Request the in-flight receive operation to stop
    fn abort_receive(&mut self) -> Result<()>;

    /// Copy the bytes gathered by the stopped operation into `dst`
    fn read_received(&mut self, dst: &mut [u8]) -> Result<usize>;

    /// Arm a new receive operation for up to `capacity` bytes
    fn start_receive(&mut self, capacity: usize) -> Result<()>;

    fn baud_rate(&self) -> u32;

    fn set_baud_rate(&mut self, rate: u32) -> Result<()>;
}

/// Bounded retry applied when the transmitter reports busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_us: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: TX_MAX_ATTEMPTS,
            backoff_us: TX_BACKOFF_US,
        }
    }
}

/// Transmit `data`, retrying while the channel is busy
pub fn transmit_blocking<U: Uart, D: Delay>(
    uart: &mut U,
    delay: &mut D,
    data: &[u8],
    timeout: Duration,
    policy: RetryPolicy,
) -> Result<()> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match uart.transmit(data, timeout)? {
            TxStatus::Sent => return Ok(()),
            TxStatus::Busy => {
                debug!("Transmitter busy (attempt {}/{})", attempt, attempts);
                if attempt < attempts {
                    delay.delay_us(policy.backoff_us);
                }
            }
        }
    }
    Err(XBeeError::TransmitStalled { attempts })
}
