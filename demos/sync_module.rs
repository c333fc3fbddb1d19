//! Sync Module Example
//!
//! Finds the interface rate of an XBee module on a serial port, makes sure
//! it runs in the configured mode and reads back its local settings:
//! - Listing and selecting serial ports
//! - Loading an optional JSON driver configuration
//! - Link synchronization and mode configuration
//! - Debug output for the AT traffic
//!
//! Usage:
//!   cargo run --example sync_module                           # Interactive mode
//!   cargo run --example sync_module -- /dev/ttyUSB0
//!   cargo run --example sync_module -- /dev/ttyUSB0 xbee.json
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example sync_module

use inquire::Select;
use log::{info, warn};
use xbee_cmd::constants::DEFAULT_RATE;
use xbee_cmd::{InitStatus, Result, SerialUart, StdDelay, XBee, XBeeConfig, XBeeError};

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let ports = XBee::list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| XBeeError::Parse(format!("Selection cancelled: {}", e)))?;

    // Extract just the port name (before " - ")
    let port_name = selection.split(" - ").next().unwrap().to_string();
    Ok(port_name)
}

fn load_config(path: Option<String>) -> Result<XBeeConfig> {
    let Some(path) = path else {
        return Ok(XBeeConfig::default());
    };
    let text = std::fs::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|e| XBeeError::Parse(format!("{}: {}", path, e)))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let port_name = args.next().map(Ok).unwrap_or_else(select_port)?;
    let config = load_config(args.next())?;

    info!("Opening {} at {} baud...", port_name, DEFAULT_RATE);
    let uart = SerialUart::open(&port_name, DEFAULT_RATE)?;
    let mut xbee = XBee::with_config(uart, StdDelay, config, Default::default())?;
    xbee.set_debug_print(true, true);

    let status = xbee.initialize()?;
    let link = xbee.link_state();
    match status {
        InitStatus::LinkSyncFailed => {
            warn!("✗ Module did not answer at any rate");
            return Ok(());
        }
        InitStatus::ModeConfigFailed => warn!("✗ Module answers but refused the mode"),
        InitStatus::ModeConfigChanged => info!("✓ Mode written to the module"),
        InitStatus::SynchronizedReady => info!("✓ Module ready"),
    }
    info!("Link at {} baud", link.active_rate);

    if let Some(report) = xbee.last_sync_report() {
        info!("Rates tried: {:?}", report.attempts);
    }

    info!("=== Local Settings ===");
    let missing = xbee.read_local_settings()?;
    if !missing.is_empty() {
        warn!("No reply for {:?}", missing);
    }
    let settings = xbee.settings();
    info!("Channel:     {:#04X}", settings.channel);
    info!("Network ID:  {:#06X}", settings.network_id);
    info!("Address:     {:#06X}", settings.source_address);
    info!("Coordinator: {}", settings.is_coordinator());
    info!("API mode:    {}", settings.api_mode);
    match settings.interface_baud_rate() {
        Some(rate) => info!("Interface:   {} baud", rate),
        None => info!("Interface:   code {:X}", settings.interface_rate),
    }
    info!("Guard time:  {} ms", settings.guard_time);

    Ok(())
}
