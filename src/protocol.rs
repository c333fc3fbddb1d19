use crate::constants::*;
use crate::error::Result;
use crate::framer::{Capture, Framer};
use crate::guard::{GuardSequence, GuardTiming};
use crate::platform::{transmit_blocking, Delay, Uart};
use crate::serial::{SerialUart, StdDelay};
use crate::types::*;
use log::{debug, info, warn};
use std::time::Duration;

/// Main XBee command mode interface.
///
/// Owns one serial line, its delay source, the frame buffer and the link
/// state. Independent modules are driven through independent values.
pub struct XBee<U: Uart, D: Delay> {
    pub(crate) uart: U,
    pub(crate) delay: D,
    pub(crate) settings: DeviceSettings,
    pub(crate) config: XBeeConfig,
    pub(crate) framer: Framer,
    pub(crate) link: LinkState,
    pub(crate) last_sync: Option<SyncReport>,
    print_tx: bool,
    print_rx: bool,
}

impl XBee<SerialUart, StdDelay> {
    /// Open a serial port at the module's factory rate
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_at(port_name, DEFAULT_RATE)
    }

    /// Open a serial port at a given starting rate
    pub fn open_at(port_name: &str, rate: u32) -> Result<Self> {
        let uart = SerialUart::open(port_name, rate)?;
        XBee::new(uart, StdDelay)
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        SerialUart::list_ports()
    }
}

impl<U: Uart, D: Delay> XBee<U, D> {
    /// Create an interface with default configuration and settings
    pub fn new(uart: U, delay: D) -> Result<Self> {
        Self::with_config(uart, delay, XBeeConfig::default(), DeviceSettings::default())
    }

    /// Create an interface and arm the receive operation
    pub fn with_config(
        mut uart: U,
        delay: D,
        config: XBeeConfig,
        settings: DeviceSettings,
    ) -> Result<Self> {
        let rate = uart.baud_rate();
        let mut framer = Framer::new(config.framer, FRAME_CAPACITY);
        framer.tune_for_rate(rate);
        uart.start_receive(framer.capacity())?;

        Ok(XBee {
            uart,
            delay,
            settings,
            config,
            framer,
            link: LinkState {
                synchronized: false,
                active_rate: rate,
            },
            last_sync: None,
            print_tx: false,
            print_rx: false,
        })
    }

    /// Enable/disable hex dumps of TX/RX traffic
    pub fn set_debug_print(&mut self, tx: bool, rx: bool) {
        self.print_tx = tx;
        self.print_rx = rx;
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn config(&self) -> &XBeeConfig {
        &self.config
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Report of the last synchronization run
    pub fn last_sync_report(&self) -> Option<&SyncReport> {
        self.last_sync.as_ref()
    }

    /// Bytes of the last captured frame
    pub fn frame(&self) -> &[u8] {
        self.framer.buffer().as_bytes()
    }

    pub fn framer(&self) -> &Framer {
        &self.framer
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    /// Release the serial line and delay source
    pub fn into_parts(self) -> (U, D) {
        (self.uart, self.delay)
    }

    pub(crate) fn guard(&self) -> GuardSequence {
        let timing = GuardTiming::from_settings(
            &self.settings,
            Duration::from_millis(self.config.guard_margin_ms),
        );
        GuardSequence::new(
            timing,
            Duration::from_millis(self.config.tx_timeout_ms),
            self.config.retry,
        )
    }

    /// Send the guard sequence (blind, see [`GuardSequence::enter`])
    pub fn enter_command_mode(&mut self) -> Result<()> {
        let guard = self.guard();
        if self.print_tx {
            debug!("Sending:  {}", hex(&guard.timing.escape_sequence()));
        }
        guard.enter(&mut self.uart, &mut self.delay)
    }

    /// Send `ATCN`
    pub fn exit_command_mode(&mut self) -> Result<()> {
        if self.print_tx {
            debug!("Sending:  {}", hex(EXIT_COMMAND));
        }
        self.guard().exit(&mut self.uart, &mut self.delay)
    }

    /// Send raw bytes to the module
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.print_tx {
            debug!("Sending:  {}", hex(data));
        }
        transmit_blocking(
            &mut self.uart,
            &mut self.delay,
            data,
            Duration::from_millis(self.config.tx_timeout_ms),
            self.config.retry,
        )
    }

    /// Capture the next reply into the frame buffer
    pub fn capture(&mut self) -> Result<Capture> {
        let capture = self.framer.capture(&mut self.uart, &mut self.delay)?;
        if self.print_rx {
            match capture {
                Capture::Frame(_) => debug!("Received: {}", hex(self.frame())),
                Capture::Empty => debug!("Received: nothing"),
                Capture::Overflow { received } => {
                    debug!("Received: {} bytes, over capacity", received)
                }
            }
        }
        Ok(capture)
    }

    /// Drop whatever arrived since the last capture
    pub(crate) fn discard_pending(&mut self) -> Result<()> {
        let stale = self.framer.capture(&mut self.uart, &mut self.delay)?;
        if stale != Capture::Empty {
            debug!("Discarded stale input: {:?}", stale);
        }
        Ok(())
    }

    /// Send a command and capture its reply after the response delay
    pub(crate) fn request(&mut self, request: &[u8]) -> Result<Capture> {
        self.send(request)?;
        self.delay
            .delay(Duration::from_millis(self.config.response_delay_ms));
        self.capture()
    }

    /// Run one command exchange, returning whether the reply matched
    pub fn exchange(&mut self, exchange: &CommandExchange) -> Result<bool> {
        let capture = self.request(&exchange.request)?;
        let matched = capture.is_frame() && exchange.expect.matches(self.frame());
        if !matched {
            debug!(
                "No expected reply to {:?} ({:?})",
                String::from_utf8_lossy(&exchange.request).trim_end(),
                capture
            );
        }
        Ok(matched)
    }

    /// Switch the local line to another rate
    pub(crate) fn set_line_rate(&mut self, rate: u32) -> Result<()> {
        self.uart.set_baud_rate(rate)?;
        self.framer.tune_for_rate(rate);
        Ok(())
    }

    /// Synchronize with the module and bring it into the configured mode
    pub fn initialize(&mut self) -> Result<InitStatus> {
        let report = self.synchronize()?;
        let Some(rate) = report.rate else {
            warn!("No response at any of {:?}", report.attempts);
            return Ok(InitStatus::LinkSyncFailed);
        };
        info!("Module answers at {} baud", rate);

        let mode = self.config.mode.clone();
        let status = match self.ensure_mode(&mode)? {
            ModeOutcome::Unchanged => InitStatus::SynchronizedReady,
            ModeOutcome::Changed => InitStatus::ModeConfigChanged,
            ModeOutcome::Failed(step) => {
                warn!("Could not set {}={} ({:?} step)", mode.parameter, mode.value_text(), step);
                InitStatus::ModeConfigFailed
            }
        };
        info!("Initialization finished: {:?}", status);
        Ok(status)
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
