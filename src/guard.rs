//! Command mode entry and exit.
//!
//! Entry is the guard sequence: silence, three escape characters, silence.
//! The module only honours the burst when no other byte is on the line
//! within the guard time on either side. Exit is the plain `ATCN` command.

use crate::constants::*;
use crate::error::Result;
use crate::platform::{transmit_blocking, Delay, RetryPolicy, Uart};
use crate::types::DeviceSettings;
use log::debug;
use std::time::Duration;

/// Guard time, jitter margin and escape character of the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardTiming {
    pub guard_time: Duration,
    pub margin: Duration,
    pub escape_char: u8,
}

impl GuardTiming {
    pub fn new(guard_time: Duration, margin: Duration, escape_char: u8) -> Self {
        GuardTiming {
            guard_time,
            margin,
            escape_char,
        }
    }

    /// Timing from the module's `GT` and `CC` parameters
    pub fn from_settings(settings: &DeviceSettings, margin: Duration) -> Self {
        Self::new(
            Duration::from_millis(settings.guard_time as u64),
            margin,
            settings.command_char,
        )
    }

    /// Silence kept on each side of the escape burst
    pub fn silence(&self) -> Duration {
        self.guard_time + self.margin
    }

    pub fn escape_sequence(&self) -> [u8; ESCAPE_COUNT] {
        [self.escape_char; ESCAPE_COUNT]
    }
}

/// Drives the escape sequence and the exit command on one line
#[derive(Debug, Clone, Copy)]
pub struct GuardSequence {
    pub timing: GuardTiming,
    pub tx_timeout: Duration,
    pub retry: RetryPolicy,
}

impl GuardSequence {
    pub fn new(timing: GuardTiming, tx_timeout: Duration, retry: RetryPolicy) -> Self {
        GuardSequence {
            timing,
            tx_timeout,
            retry,
        }
    }

    /// Send the guard sequence. No reply is read here; the caller verifies
    /// entry through the acknowledgement of what it sends next.
    pub fn enter<U: Uart, D: Delay>(&self, uart: &mut U, delay: &mut D) -> Result<()> {
        debug!(
            "Entering command mode at {} baud ({:?} guard)",
            uart.baud_rate(),
            self.timing.silence()
        );
        delay.delay(self.timing.silence());
        transmit_blocking(
            uart,
            delay,
            &self.timing.escape_sequence(),
            self.tx_timeout,
            self.retry,
        )?;
        delay.delay(self.timing.silence());
        Ok(())
    }

    /// Leave command mode
    pub fn exit<U: Uart, D: Delay>(&self, uart: &mut U, delay: &mut D) -> Result<()> {
        debug!("Leaving command mode");
        transmit_blocking(uart, delay, EXIT_COMMAND, self.tx_timeout, self.retry)
    }
}
