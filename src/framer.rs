//! Reply framing by receive quiescence.
//!
//! Command mode replies carry neither a length nor a reliable terminator, so
//! a reply is considered complete once the received-byte count of the armed
//! receive operation stops moving for a number of consecutive polls.

use crate::constants::*;
use crate::error::Result;
use crate::platform::{Delay, Uart};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Polling parameters of the framer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramerConfig {
    pub poll_interval_us: u32,
    /// Unchanged polls that end a frame (lower bound, see [`Framer::tune_for_rate`])
    pub idle_polls: u32,
    pub abort_wait_polls: u32,
}

impl Default for FramerConfig {
    fn default() -> Self {
        FramerConfig {
            poll_interval_us: POLL_INTERVAL_US,
            idle_polls: IDLE_POLLS,
            abort_wait_polls: ABORT_WAIT_POLLS,
        }
    }
}

impl FramerConfig {
    /// Idle polls needed so the idle window spans a few character times at `rate`
    pub fn idle_polls_for_rate(&self, rate: u32) -> u32 {
        if rate == 0 {
            return self.idle_polls;
        }
        let window_us = BITS_PER_CHARACTER * IDLE_CHARACTER_TIMES * 1_000_000 / rate;
        let poll = self.poll_interval_us.max(1);
        self.idle_polls.max(window_us.div_ceil(poll))
    }
}

/// Fixed-capacity storage for one captured reply
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    storage: Box<[u8]>,
    fill: usize,
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        FrameBuffer {
            storage: vec![0u8; capacity].into_boxed_slice(),
            fill: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn len(&self) -> usize {
        self.fill
    }

    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    /// Valid bytes of the last capture
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage[..self.fill]
    }

    fn clear(&mut self) {
        self.fill = 0;
    }
}

/// Result of one capture attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// A reply of this many bytes is in the frame buffer
    Frame(usize),
    /// Nothing arrived
    Empty,
    /// The reply did not fit and was dropped
    Overflow { received: usize },
}

impl Capture {
    pub fn len(&self) -> usize {
        match self {
            Capture::Frame(n) => *n,
            _ => 0,
        }
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, Capture::Frame(_))
    }
}

/// Quiescence framer owning the frame buffer
#[derive(Debug, Clone)]
pub struct Framer {
    config: FramerConfig,
    idle_polls: u32,
    buffer: FrameBuffer,
}

impl Framer {
    pub fn new(config: FramerConfig, capacity: usize) -> Self {
        Framer {
            config,
            idle_polls: config.idle_polls,
            buffer: FrameBuffer::with_capacity(capacity),
        }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Idle polls currently used to end a frame
    pub fn idle_polls(&self) -> u32 {
        self.idle_polls
    }

    /// Stretch the idle window to the character time of a new line rate
    pub fn tune_for_rate(&mut self, rate: u32) {
        self.idle_polls = self.config.idle_polls_for_rate(rate);
    }

    /// Capture one reply from the armed receive operation.
    ///
    /// Worst case the call blocks for `idle_polls` poll intervals per byte up
    /// to the buffer capacity, plus the abort wait. On return the receive
    /// operation is always armed for the next reply.
    pub fn capture<U: Uart, D: Delay>(&mut self, uart: &mut U, delay: &mut D) -> Result<Capture> {
        self.buffer.clear();

        let mut seen = uart.received()?;
        if seen == 0 {
            // Keep a live operation running: restarting it could discard a
            // byte landing between the check and the abort.
            if !uart.rx_active()? {
                uart.start_receive(self.capacity())?;
            }
            return Ok(Capture::Empty);
        }

        let mut idle = 0;
        while idle < self.idle_polls && seen <= self.capacity() {
            delay.delay_us(self.config.poll_interval_us);
            let count = uart.received()?;
            if count == seen {
                idle += 1;
            } else {
                seen = count;
                idle = 0;
            }
        }

        let outcome = self.finalize(uart, delay);
        let rearmed = uart.start_receive(self.capacity());
        let outcome = outcome?;
        rearmed?;
        Ok(outcome)
    }

    fn finalize<U: Uart, D: Delay>(&mut self, uart: &mut U, delay: &mut D) -> Result<Capture> {
        uart.abort_receive()?;

        let mut waited = 0;
        while uart.rx_active()? {
            if waited == self.config.abort_wait_polls {
                warn!("Receive operation did not stop, dropping frame");
                return Ok(Capture::Empty);
            }
            delay.delay_us(self.config.poll_interval_us);
            waited += 1;
        }

        let received = uart.received()?;
        if received > self.capacity() {
            warn!(
                "Reply of {} bytes exceeds frame capacity {}, dropped",
                received,
                self.capacity()
            );
            return Ok(Capture::Overflow { received });
        }

        let n = uart.read_received(&mut self.buffer.storage[..received])?;
        self.buffer.fill = n;
        debug!("Captured frame of {} bytes", n);
        if n == 0 {
            return Ok(Capture::Empty);
        }
        Ok(Capture::Frame(n))
    }
}
