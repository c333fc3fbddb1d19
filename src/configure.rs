//! Command mode configuration of a synchronized module.

use crate::constants::*;
use crate::error::{Result, XBeeError};
use crate::platform::{Delay, Uart};
use crate::protocol::XBee;
use crate::types::*;
use log::{debug, info, warn};

impl<U: Uart, D: Delay> XBee<U, D> {
    /// Enter command mode and consume the acknowledgement of the escape
    /// burst, so the first reply captured afterwards belongs to a command.
    ///
    /// Returns false when the module did not answer. It is then still in
    /// transparent mode and anything sent would go out as payload.
    fn open_session(&mut self) -> Result<bool> {
        if !self.link.synchronized {
            return Err(XBeeError::NotSynchronized);
        }
        self.discard_pending()?;
        self.enter_command_mode()?;
        let capture = self.capture()?;
        let entered = capture.is_frame() && ExpectedReply::Ok.matches(self.frame());
        if !entered {
            warn!("Command mode entry not acknowledged ({:?})", capture);
        }
        Ok(entered)
    }

    /// Make sure the module holds `mode.parameter = mode.value`.
    ///
    /// The current value is queried first and only written, persisted (and
    /// optionally followed by a soft reset) when it differs. Any step that
    /// is not acknowledged ends the session and reports the failed step.
    pub fn ensure_mode(&mut self, mode: &ModeRequirement) -> Result<ModeOutcome> {
        if !self.open_session()? {
            return Ok(ModeOutcome::Failed(ModeStep::Enter));
        }
        let value = mode.value_text();

        if self.exchange(&CommandExchange::query(&mode.parameter, &value))? {
            info!("{} already set to {}", mode.parameter, value);
            self.settings.set_parameter(&mode.parameter, mode.value);
            self.exit_command_mode()?;
            return Ok(ModeOutcome::Unchanged);
        }

        info!("Setting {} to {}", mode.parameter, value);
        if !self.exchange(&CommandExchange::set(&mode.parameter, &value))? {
            return self.abandon(ModeStep::Set);
        }
        if !self.exchange(&CommandExchange::command(PERSIST_COMMAND))? {
            return self.abandon(ModeStep::Persist);
        }
        if self.config.soft_reset {
            if !self.exchange(&CommandExchange::command(SOFT_RESET_COMMAND))? {
                return self.abandon(ModeStep::SoftReset);
            }
            // The reset leaves command mode on its own.
            debug!("Module reset, command mode closed");
        } else {
            self.exit_command_mode()?;
        }

        self.settings.set_parameter(&mode.parameter, mode.value);
        Ok(ModeOutcome::Changed)
    }

    fn abandon(&mut self, step: ModeStep) -> Result<ModeOutcome> {
        warn!("{:?} step not acknowledged, leaving command mode", step);
        self.exit_command_mode()?;
        Ok(ModeOutcome::Failed(step))
    }

    /// Read the parameters of [`READABLE_PARAMETERS`] into the settings record.
    ///
    /// Returns the names that got no usable reply; their stored values are
    /// left untouched. If command mode cannot be entered nothing is sent and
    /// every name is returned.
    pub fn read_local_settings(&mut self) -> Result<Vec<&'static str>> {
        if !self.open_session()? {
            return Ok(READABLE_PARAMETERS.to_vec());
        }

        let mut missing = Vec::new();
        for name in READABLE_PARAMETERS {
            let exchange = CommandExchange::read(name);
            let capture = self.request(&exchange.request)?;
            let value = if capture.is_frame() && exchange.expect.matches(self.frame()) {
                parse_hex_reply(self.frame())
            } else {
                None
            };
            match value {
                Some(v) if self.settings.set_parameter(name, v) => debug!("{} = {:X}", name, v),
                _ => {
                    warn!("No usable reply for {}", name);
                    missing.push(name);
                }
            }
        }
        self.exit_command_mode()?;

        if !missing.contains(&"BD") {
            match self.settings.interface_baud_rate() {
                Some(rate) if rate != self.link.active_rate => warn!(
                    "Module reports {} baud but answers at {} baud",
                    rate, self.link.active_rate
                ),
                None => warn!("Unknown BD code {:X}", self.settings.interface_rate),
                _ => {}
            }
        }
        Ok(missing)
    }
}
