//! Protocol constants for XBee command mode communication.
//!
//! This module defines the wire strings, timing parameters and serial rate
//! tables used while synchronizing with and configuring a module.

/// Capacity of the frame buffer and of every armed receive operation
pub const FRAME_CAPACITY: usize = 200;

/// Interval between two polls of the received-byte count
pub const POLL_INTERVAL_US: u32 = 100;

/// Consecutive unchanged polls after which a reply is considered complete
pub const IDLE_POLLS: u32 = 10;

/// Minimum idle window expressed in character times
pub const IDLE_CHARACTER_TIMES: u32 = 3;

/// Polls spent waiting for an aborted receive operation to stop
pub const ABORT_WAIT_POLLS: u32 = 100;

/// Margin added to the guard time on both sides of the escape burst
pub const GUARD_MARGIN_MS: u64 = 100;

/// Number of escape characters in the command mode sequence
pub const ESCAPE_COUNT: usize = 3;

/// Default escape character (`CC`)
pub const DEFAULT_COMMAND_CHAR: u8 = 0x2B;

/// Default guard time (`GT`), in milliseconds
pub const DEFAULT_GUARD_TIME_MS: u16 = 0x3E8;

/// Default command mode timeout (`CT`), in units of 100 ms
pub const DEFAULT_COMMAND_TIMEOUT: u16 = 0x64;

/// Command prefix shared by every AT command
pub const AT_PREFIX: &str = "AT";

/// Terminator appended to every command
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Leaves command mode
pub const EXIT_COMMAND: &[u8] = b"ATCN\r";

/// Positive acknowledgement token
pub const ACK_TOKEN: &[u8] = b"OK";

/// Write parameters to non-volatile memory
pub const PERSIST_COMMAND: &str = "WR";

/// Software reset
pub const SOFT_RESET_COMMAND: &str = "FR";

/// Per-attempt transmit timeout
pub const TX_TIMEOUT_MS: u64 = 10;

/// Attempts made before a busy transmitter is reported as stalled
pub const TX_MAX_ATTEMPTS: u32 = 1000;

/// Delay between two transmit attempts on a busy channel
pub const TX_BACKOFF_US: u32 = 100;

/// Time the module is given to answer a command before capture starts
pub const RESPONSE_DELAY_MS: u64 = 50;

/// Factory default interface rate of the module
pub const DEFAULT_RATE: u32 = 9_600;

/// Candidate serial rates, highest first
pub const STANDARD_RATES: [u32; 9] = [
    230_400, 115_200, 57_600, 38_400, 19_200, 9_600, 4_800, 2_400, 1_200,
];

/// Rates selected by the `BD` parameter, indexed by code
pub const BD_RATES: [u32; 9] = [
    1_200, 2_400, 4_800, 9_600, 19_200, 38_400, 57_600, 115_200, 230_400,
];

/// Bits on the wire per character (start, 8 data, stop)
pub const BITS_PER_CHARACTER: u32 = 10;

/// Map a `BD` parameter code to its serial rate
pub fn rate_for_code(code: u32) -> Option<u32> {
    BD_RATES.get(code as usize).copied()
}

/// Map a serial rate to its `BD` parameter code
pub fn code_for_rate(rate: u32) -> Option<u32> {
    BD_RATES.iter().position(|&r| r == rate).map(|i| i as u32)
}
