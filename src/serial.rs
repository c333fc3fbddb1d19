//! Host adapter over the `serialport` crate.
//!
//! A desktop serial port has no receive interrupt, so the armed receive
//! operation is emulated: every progress query drains whatever the OS has
//! buffered into the operation's storage.

use crate::constants::*;
use crate::error::{Result, XBeeError};
use crate::platform::{Delay, TxStatus, Uart};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

/// [`Uart`] backed by an OS serial port
pub struct SerialUart {
    port: Box<dyn SerialPort>,
    rate: u32,
    rx: Vec<u8>,
    active: bool,
}

impl SerialUart {
    /// Open a serial port at the given rate
    pub fn open(port_name: &str, rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, rate)
            .timeout(Duration::from_millis(TX_TIMEOUT_MS))
            .open()?;
        Ok(Self::from_port(port))
    }

    /// Wrap an already opened port
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        let rate = port.baud_rate().unwrap_or(STANDARD_RATES[0]);
        SerialUart {
            port,
            rate,
            rx: Vec::with_capacity(FRAME_CAPACITY),
            active: false,
        }
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }

    fn pump(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(());
        }
        let mut chunk = vec![0u8; available];
        match self.port.read(&mut chunk) {
            Ok(n) => {
                self.rx.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Uart for SerialUart {
    fn transmit(&mut self, data: &[u8], timeout: Duration) -> Result<TxStatus> {
        self.port.set_timeout(timeout)?;
        let mut written = 0;
        while written < data.len() {
            match self.port.write(&data[written..]) {
                Ok(0) if written == 0 => return Ok(TxStatus::Busy),
                Ok(0) => return Err(XBeeError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut && written == 0 => {
                    return Ok(TxStatus::Busy)
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.port.flush()?;
        Ok(TxStatus::Sent)
    }

    fn received(&mut self) -> Result<usize> {
        self.pump()?;
        Ok(self.rx.len())
    }

    fn rx_active(&mut self) -> Result<bool> {
        Ok(self.active)
    }

    fn abort_receive(&mut self) -> Result<()> {
        self.pump()?;
        self.active = false;
        Ok(())
    }

    fn read_received(&mut self, dst: &mut [u8]) -> Result<usize> {
        let n = self.rx.len().min(dst.len());
        dst[..n].copy_from_slice(&self.rx[..n]);
        Ok(n)
    }

    fn start_receive(&mut self, capacity: usize) -> Result<()> {
        self.rx.clear();
        self.rx.reserve(capacity);
        self.active = true;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.rate
    }

    fn set_baud_rate(&mut self, rate: u32) -> Result<()> {
        self.port.set_baud_rate(rate)?;
        self.port.clear(ClearBuffer::All)?;
        self.rate = rate;
        Ok(())
    }
}

/// [`Delay`] using the OS scheduler
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(us as u64));
    }
}
