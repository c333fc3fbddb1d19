//! # XBee Command Mode Library
//!
//! A Rust library for bringing up XBee radio modules through their AT
//! command mode over an asynchronous serial line.
//!
//! ## Features
//!
//! - Discover the module's interface rate with no prior knowledge
//! - Enter and leave command mode with the timed guard sequence
//! - Frame replies by receive quiescence, with bounded latency
//! - Query, set and persist the operating mode the application needs
//! - Read back the local module's settings
//! - Platform independent: any [`Uart`] + [`Delay`] pair, with a
//!   `serialport` adapter for desktop hosts
//!
//! ## Example
//!
//! ```no_run
//! use xbee_cmd::{InitStatus, XBee};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut xbee = XBee::open("/dev/ttyUSB0")?;
//!     match xbee.initialize()? {
//!         InitStatus::LinkSyncFailed => println!("No module found"),
//!         status => println!("{:?} at {} baud", status, xbee.link_state().active_rate),
//!     }
//!     Ok(())
//! }
//! ```

pub mod configure;
pub mod constants;
pub mod error;
pub mod framer;
pub mod guard;
pub mod platform;
pub mod protocol;
pub mod serial;
pub mod sync;
pub mod types;

pub use error::{Result, XBeeError};
pub use framer::{Capture, FrameBuffer, Framer, FramerConfig};
pub use guard::{GuardSequence, GuardTiming};
pub use platform::{transmit_blocking, Delay, RetryPolicy, TxStatus, Uart};
pub use protocol::XBee;
pub use serial::{SerialUart, StdDelay};
pub use types::*;
