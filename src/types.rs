use crate::constants::*;
use crate::framer::FramerConfig;
use crate::platform::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameters of the local module that can be read back in command mode.
pub const READABLE_PARAMETERS: [&str; 9] = ["CH", "ID", "MY", "CE", "AP", "BD", "CT", "GT", "CC"];

/// Stored module parameters, named as in the module's user guide.
///
/// The record is inert: only `GT` and `CC` are consumed by the guard sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Operating Channel
    #[serde(rename = "CH")]
    pub channel: u8,
    /// Network ID
    #[serde(rename = "ID")]
    pub network_id: u16,
    /// Source Address
    #[serde(rename = "MY")]
    pub source_address: u16,
    /// Coordinator Enable
    #[serde(rename = "CE")]
    pub coordinator_enable: u8,
    /// API Mode Enable
    #[serde(rename = "AP")]
    pub api_mode: u8,
    /// Interface Data Rate (code, see [`rate_for_code`])
    #[serde(rename = "BD")]
    pub interface_rate: u32,
    /// Command Mode Timeout (x100 ms)
    #[serde(rename = "CT")]
    pub command_timeout: u16,
    /// Silence Period (x1 ms)
    #[serde(rename = "GT")]
    pub guard_time: u16,
    /// Command Character
    #[serde(rename = "CC")]
    pub command_char: u8,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            channel: 0,
            network_id: 0,
            source_address: 0,
            coordinator_enable: 0,
            api_mode: 0,
            interface_rate: 0,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            guard_time: DEFAULT_GUARD_TIME_MS,
            command_char: DEFAULT_COMMAND_CHAR,
        }
    }
}

impl DeviceSettings {
    /// CE = 1 marks the network coordinator, CE = 0 an end device
    pub fn is_coordinator(&self) -> bool {
        self.coordinator_enable != 0
    }

    /// Store a value read from the module. Returns false for unknown names
    /// and for values that do not fit the field.
    pub fn set_parameter(&mut self, name: &str, value: u32) -> bool {
        fn narrow<T: TryFrom<u32>>(value: u32, field: &mut T) -> bool {
            match T::try_from(value) {
                Ok(v) => {
                    *field = v;
                    true
                }
                Err(_) => false,
            }
        }

        match name {
            "CH" => narrow(value, &mut self.channel),
            "ID" => narrow(value, &mut self.network_id),
            "MY" => narrow(value, &mut self.source_address),
            "CE" => narrow(value, &mut self.coordinator_enable),
            "AP" => narrow(value, &mut self.api_mode),
            "BD" => narrow(value, &mut self.interface_rate),
            "CT" => narrow(value, &mut self.command_timeout),
            "GT" => narrow(value, &mut self.guard_time),
            "CC" => narrow(value, &mut self.command_char),
            _ => false,
        }
    }

    /// Interface rate selected by the stored `BD` code
    pub fn interface_baud_rate(&self) -> Option<u32> {
        rate_for_code(self.interface_rate)
    }
}

/// Serial link state, owned by the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkState {
    pub synchronized: bool,
    pub active_rate: u32,
}

/// Outcome of a synchronization run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Rate the module answered at, `None` when every candidate failed
    pub rate: Option<u32>,
    /// Rates tried, in order
    pub attempts: Vec<u32>,
    pub completed_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn is_synchronized(&self) -> bool {
        self.rate.is_some()
    }
}

/// Command that could not be completed during mode configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeStep {
    /// The escape sequence was not acknowledged, no command was sent
    Enter,
    Set,
    Persist,
    SoftReset,
}

/// Result of bringing the module into the required operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeOutcome {
    /// The parameter already held the required value
    Unchanged,
    /// The parameter was written and persisted
    Changed,
    /// A step was not acknowledged
    Failed(ModeStep),
}

/// Status reported by the initialization entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InitStatus {
    SynchronizedReady,
    LinkSyncFailed,
    ModeConfigFailed,
    ModeConfigChanged,
}

/// How a captured frame is checked against a command's reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedReply {
    /// `OK` anywhere in the frame
    Ok,
    /// Token starting exactly at `offset`
    TokenAt { token: Vec<u8>, offset: usize },
    /// A CR-delimited line equal to the value (case-insensitive)
    Value(Vec<u8>),
    /// A distinguishing byte at a known offset
    ByteAt { offset: usize, byte: u8 },
    /// A numeric parameter value in hex
    Hex,
}

impl ExpectedReply {
    pub fn matches(&self, frame: &[u8]) -> bool {
        match self {
            ExpectedReply::Ok => contains(frame, ACK_TOKEN),
            ExpectedReply::TokenAt { token, offset } => frame
                .get(*offset..offset.saturating_add(token.len()))
                .map_or(false, |window| window == token.as_slice()),
            ExpectedReply::Value(value) => frame
                .split(|&b| b == COMMAND_TERMINATOR)
                .map(|line| line.trim_ascii())
                .any(|line| !line.is_empty() && line.eq_ignore_ascii_case(value)),
            ExpectedReply::ByteAt { offset, byte } => frame.get(*offset) == Some(byte),
            ExpectedReply::Hex => parse_hex_reply(frame).is_some(),
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Parse a numeric reply: the first non-empty line, in hex
pub fn parse_hex_reply(frame: &[u8]) -> Option<u32> {
    let line = frame
        .split(|&b| b == COMMAND_TERMINATOR)
        .map(|line| line.trim_ascii())
        .find(|line| !line.is_empty())?;
    let text = std::str::from_utf8(line).ok()?;
    u32::from_str_radix(text, 16).ok()
}

/// One command sent verbatim plus the check applied to its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExchange {
    pub request: Vec<u8>,
    pub expect: ExpectedReply,
}

impl CommandExchange {
    pub fn new(request: impl Into<Vec<u8>>, expect: ExpectedReply) -> Self {
        CommandExchange {
            request: request.into(),
            expect,
        }
    }

    /// `AT<name>\r`, expecting the given value back
    pub fn query(name: &str, value: &str) -> Self {
        Self::new(
            command_bytes(name, ""),
            ExpectedReply::Value(value.as_bytes().to_vec()),
        )
    }

    /// `AT<name><value>\r`, expecting `OK`
    pub fn set(name: &str, value: &str) -> Self {
        Self::new(command_bytes(name, value), ExpectedReply::Ok)
    }

    /// `AT<name>\r`, expecting the parameter value in hex
    pub fn read(name: &str) -> Self {
        Self::new(command_bytes(name, ""), ExpectedReply::Hex)
    }

    /// `AT<name>\r`, expecting `OK`
    pub fn command(name: &str) -> Self {
        Self::new(command_bytes(name, ""), ExpectedReply::Ok)
    }
}

fn command_bytes(name: &str, argument: &str) -> Vec<u8> {
    let mut bytes = format!("{AT_PREFIX}{name}{argument}").into_bytes();
    bytes.push(COMMAND_TERMINATOR);
    bytes
}

/// Operating mode the application needs, as a parameter/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRequirement {
    pub parameter: String,
    pub value: u32,
}

impl ModeRequirement {
    /// Value as the module prints it
    pub fn value_text(&self) -> String {
        format!("{:X}", self.value)
    }
}

impl Default for ModeRequirement {
    fn default() -> Self {
        ModeRequirement {
            parameter: "AP".to_string(),
            value: 1,
        }
    }
}

/// Host-side configuration of the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XBeeConfig {
    /// Rates tried after the configured one, highest first
    pub candidate_rates: Vec<u32>,
    pub framer: FramerConfig,
    pub guard_margin_ms: u64,
    pub response_delay_ms: u64,
    pub tx_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub mode: ModeRequirement,
    /// Issue `ATFR` after persisting a changed mode
    pub soft_reset: bool,
}

impl Default for XBeeConfig {
    fn default() -> Self {
        XBeeConfig {
            candidate_rates: STANDARD_RATES.to_vec(),
            framer: FramerConfig::default(),
            guard_margin_ms: GUARD_MARGIN_MS,
            response_delay_ms: RESPONSE_DELAY_MS,
            tx_timeout_ms: TX_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            mode: ModeRequirement::default(),
            soft_reset: false,
        }
    }
}
