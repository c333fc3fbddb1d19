//! Serial rate discovery.
//!
//! The module's interface rate is unknown. The configured rate is tried
//! first, then every candidate from highest to lowest, each exactly once. A
//! trial is a full guard sequence followed by one capture; only a frame
//! carrying `OK` counts as an answer. Partial or garbled frames are treated
//! as silence and never retried at the same rate.

use crate::error::Result;
use crate::platform::{Delay, Uart};
use crate::protocol::XBee;
use crate::types::{ExpectedReply, SyncReport};
use chrono::Utc;
use log::{debug, info, warn};

/// Trial order: `current` first, then the candidates highest first, each once
pub fn trial_order(current: u32, candidates: &[u32]) -> Vec<u32> {
    let mut rest: Vec<u32> = candidates.iter().copied().filter(|&r| r != current).collect();
    rest.sort_unstable_by(|a, b| b.cmp(a));
    rest.dedup();

    let mut order = Vec::with_capacity(rest.len() + 1);
    order.push(current);
    order.extend(rest);
    order
}

impl<U: Uart, D: Delay> XBee<U, D> {
    /// Find the module's interface rate and leave the line configured at it.
    ///
    /// On success the module is sent back to transparent mode. On failure
    /// the line is left at the last rate tried.
    pub fn synchronize(&mut self) -> Result<SyncReport> {
        self.link.synchronized = false;
        let current = self.uart.baud_rate();
        let order = trial_order(current, &self.config.candidate_rates);

        let total = order.len();
        let mut attempts = Vec::with_capacity(total);
        let mut found = None;
        for rate in order {
            if rate != self.uart.baud_rate() {
                self.set_line_rate(rate)?;
            }
            attempts.push(rate);
            info!("Trying {} baud ({}/{})", rate, attempts.len(), total);
            if self.try_current_rate()? {
                found = Some(rate);
                break;
            }
        }

        if let Some(rate) = found {
            self.exit_command_mode()?;
            self.link.synchronized = true;
            self.link.active_rate = rate;
            info!("Synchronized at {} baud after {} trials", rate, attempts.len());
        } else {
            self.link.active_rate = self.uart.baud_rate();
            warn!("Synchronization failed after {} trials", attempts.len());
        }

        let report = SyncReport {
            rate: found,
            attempts,
            completed_at: Utc::now(),
        };
        self.last_sync = Some(report.clone());
        Ok(report)
    }

    fn try_current_rate(&mut self) -> Result<bool> {
        self.discard_pending()?;
        self.enter_command_mode()?;
        let capture = self.capture()?;
        let acknowledged = capture.is_frame() && ExpectedReply::Ok.matches(self.frame());
        debug!("Trial at {} baud: {:?}, ack={}", self.uart.baud_rate(), capture, acknowledged);
        Ok(acknowledged)
    }
}
