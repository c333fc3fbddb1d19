//! Simulated XBee module on virtual time.
//!
//! `SimUart` and `SimDelay` share one `Sim`. Time only moves when the driver
//! delays, so guard sequences of seconds run instantly. The module honours
//! the escape burst only with `GT` of silence on both sides, answers AT
//! commands in command mode, and ignores everything sent at the wrong rate.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use xbee_cmd::constants::code_for_rate;
use xbee_cmd::{Delay, Result, TxStatus, Uart, XBee, XBeeConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Wait(u32),
    Tx(Vec<u8>),
    Busy,
    Rate(u32),
}

pub struct Module {
    pub rate: u32,
    pub params: HashMap<String, u32>,
    pub stored: HashMap<String, u32>,
    pub reject_set: HashSet<String>,
    /// Parameters whose query is answered with `ERROR`
    pub reject_query: HashSet<String>,
    pub reject_write: bool,
    pub reject_reset: bool,
    /// Never answers anything
    pub silent: bool,
    pub command_mode: bool,
    pub resets: usize,
}

impl Module {
    pub fn new(rate: u32) -> Self {
        let mut params = HashMap::new();
        params.insert("CH".to_string(), 0x0C);
        params.insert("ID".to_string(), 0x3332);
        params.insert("MY".to_string(), 0);
        params.insert("CE".to_string(), 0);
        params.insert("AP".to_string(), 0);
        params.insert("BD".to_string(), code_for_rate(rate).unwrap_or(3));
        params.insert("CT".to_string(), 0x64);
        params.insert("GT".to_string(), 0x3E8);
        params.insert("CC".to_string(), 0x2B);
        Module {
            rate,
            stored: params.clone(),
            params,
            reject_set: HashSet::new(),
            reject_query: HashSet::new(),
            reject_write: false,
            reject_reset: false,
            silent: false,
            command_mode: false,
            resets: 0,
        }
    }

    fn guard_us(&self) -> u64 {
        self.params.get("GT").copied().unwrap_or(0x3E8) as u64 * 1000
    }

    fn escape(&self) -> u8 {
        self.params.get("CC").copied().unwrap_or(0x2B) as u8
    }

    fn respond(&mut self, line: &[u8]) -> Vec<u8> {
        let text = String::from_utf8_lossy(line).to_string();
        let Some(body) = text.strip_prefix("AT") else {
            return b"ERROR\r".to_vec();
        };
        match body {
            "" | "AC" => b"OK\r".to_vec(),
            "CN" => {
                self.command_mode = false;
                b"OK\r".to_vec()
            }
            "WR" if self.reject_write => b"ERROR\r".to_vec(),
            "WR" => {
                self.stored = self.params.clone();
                b"OK\r".to_vec()
            }
            "FR" if self.reject_reset => b"ERROR\r".to_vec(),
            "FR" => {
                self.command_mode = false;
                self.resets += 1;
                self.params = self.stored.clone();
                b"OK\r".to_vec()
            }
            _ if body.len() >= 2 => {
                let name = body[..2].to_ascii_uppercase();
                let argument = &body[2..];
                let Some(current) = self.params.get(&name).copied() else {
                    return b"ERROR\r".to_vec();
                };
                if argument.is_empty() && self.reject_query.contains(&name) {
                    return b"ERROR\r".to_vec();
                }
                if argument.is_empty() {
                    return format!("{:X}\r", current).into_bytes();
                }
                if self.reject_set.contains(&name) {
                    return b"ERROR\r".to_vec();
                }
                match u32::from_str_radix(argument, 16) {
                    Ok(value) => {
                        self.params.insert(name, value);
                        b"OK\r".to_vec()
                    }
                    Err(_) => b"ERROR\r".to_vec(),
                }
            }
            _ => b"ERROR\r".to_vec(),
        }
    }
}

pub struct Sim {
    pub now_us: u64,
    pub host_rate: u32,
    pub module: Module,
    /// Bytes the host reads back when it transmits at a mismatched rate
    pub noise: HashMap<u32, Vec<u8>>,
    /// Upcoming transmit attempts that report busy
    pub busy: u32,
    /// Time between two delivered reply bytes, 0 delivers at once
    pub byte_gap_us: u64,
    pub events: Vec<Event>,
    pub arm_count: usize,
    pub abort_count: usize,
    last_tx_us: Option<u64>,
    escape_run: usize,
    quiet_before_escape: bool,
    line: Vec<u8>,
    outgoing: VecDeque<u8>,
    next_byte_us: u64,
    rx: Vec<u8>,
    rx_active: bool,
}

impl Sim {
    pub fn new(host_rate: u32, module: Module) -> Self {
        Sim {
            now_us: 0,
            host_rate,
            module,
            noise: HashMap::new(),
            busy: 0,
            byte_gap_us: 0,
            events: Vec::new(),
            arm_count: 0,
            abort_count: 0,
            last_tx_us: None,
            escape_run: 0,
            quiet_before_escape: false,
            line: Vec::new(),
            outgoing: VecDeque::new(),
            next_byte_us: 0,
            rx: Vec::new(),
            rx_active: false,
        }
    }

    pub fn rx_armed(&self) -> bool {
        self.rx_active
    }

    /// Queue bytes from the module to the host
    pub fn push_reply(&mut self, bytes: &[u8]) {
        if self.outgoing.is_empty() {
            self.next_byte_us = self.now_us + self.byte_gap_us;
        }
        self.outgoing.extend(bytes.iter().copied());
        self.deliver();
    }

    /// Everything the host put on the line, as text
    pub fn sent(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Tx(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn escape_bursts(&self) -> usize {
        self.sent().iter().filter(|s| s.as_str() == "+++").count()
    }

    pub fn rate_changes(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Rate(rate) => Some(*rate),
                _ => None,
            })
            .collect()
    }

    fn advance(&mut self, us: u32) {
        self.now_us += us as u64;
        self.check_escape();
        self.deliver();
    }

    fn check_escape(&mut self) {
        let guard = self.module.guard_us();
        let quiet_after = self
            .last_tx_us
            .map_or(false, |t| self.now_us - t >= guard);
        if !self.module.command_mode
            && self.escape_run == 3
            && self.quiet_before_escape
            && quiet_after
        {
            self.module.command_mode = true;
            self.escape_run = 0;
            self.push_reply(b"OK\r");
        }
    }

    fn deliver(&mut self) {
        while !self.outgoing.is_empty() && (self.byte_gap_us == 0 || self.next_byte_us <= self.now_us) {
            if let Some(b) = self.outgoing.pop_front() {
                if self.rx_active {
                    self.rx.push(b);
                }
            }
            self.next_byte_us += self.byte_gap_us;
        }
    }

    fn module_receive(&mut self, b: u8) {
        if self.module.command_mode {
            if b == b'\r' {
                let line = std::mem::take(&mut self.line);
                let reply = self.module.respond(&line);
                self.push_reply(&reply);
            } else {
                self.line.push(b);
            }
        } else if b == self.module.escape() {
            if self.escape_run == 0 {
                let guard = self.module.guard_us();
                self.quiet_before_escape = self.last_tx_us.map_or(true, |t| self.now_us - t >= guard);
            }
            self.escape_run += 1;
        } else {
            self.escape_run = 0;
        }
        self.last_tx_us = Some(self.now_us);
    }

    fn transmit(&mut self, data: &[u8]) -> TxStatus {
        if self.busy > 0 {
            self.busy -= 1;
            self.events.push(Event::Busy);
            return TxStatus::Busy;
        }
        self.events.push(Event::Tx(data.to_vec()));

        if self.module.silent {
            return TxStatus::Sent;
        }
        if self.host_rate != self.module.rate {
            self.escape_run = 0;
            self.last_tx_us = Some(self.now_us);
            if let Some(noise) = self.noise.get(&self.host_rate).cloned() {
                self.push_reply(&noise);
            }
            return TxStatus::Sent;
        }
        for &b in data {
            self.module_receive(b);
        }
        TxStatus::Sent
    }
}

pub struct SimUart(pub Rc<RefCell<Sim>>);

pub struct SimDelay(pub Rc<RefCell<Sim>>);

impl Uart for SimUart {
    fn transmit(&mut self, data: &[u8], _timeout: Duration) -> Result<TxStatus> {
        Ok(self.0.borrow_mut().transmit(data))
    }

    fn received(&mut self) -> Result<usize> {
        let mut sim = self.0.borrow_mut();
        sim.deliver();
        Ok(sim.rx.len())
    }

    fn rx_active(&mut self) -> Result<bool> {
        Ok(self.0.borrow().rx_active)
    }

    fn abort_receive(&mut self) -> Result<()> {
        let mut sim = self.0.borrow_mut();
        sim.abort_count += 1;
        sim.rx_active = false;
        Ok(())
    }

    fn read_received(&mut self, dst: &mut [u8]) -> Result<usize> {
        let sim = self.0.borrow();
        let n = sim.rx.len().min(dst.len());
        dst[..n].copy_from_slice(&sim.rx[..n]);
        Ok(n)
    }

    fn start_receive(&mut self, _capacity: usize) -> Result<()> {
        let mut sim = self.0.borrow_mut();
        sim.rx.clear();
        sim.rx_active = true;
        sim.arm_count += 1;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.0.borrow().host_rate
    }

    fn set_baud_rate(&mut self, rate: u32) -> Result<()> {
        let mut sim = self.0.borrow_mut();
        sim.host_rate = rate;
        sim.outgoing.clear();
        sim.escape_run = 0;
        sim.events.push(Event::Rate(rate));
        Ok(())
    }
}

impl Delay for SimDelay {
    fn delay_us(&mut self, us: u32) {
        let mut sim = self.0.borrow_mut();
        sim.events.push(Event::Wait(us));
        sim.advance(us);
    }
}

pub fn sim(host_rate: u32, module: Module) -> (Rc<RefCell<Sim>>, SimUart, SimDelay) {
    let sim = Rc::new(RefCell::new(Sim::new(host_rate, module)));
    (sim.clone(), SimUart(sim.clone()), SimDelay(sim))
}

pub fn xbee(
    host_rate: u32,
    module: Module,
    config: XBeeConfig,
) -> (Rc<RefCell<Sim>>, XBee<SimUart, SimDelay>) {
    let (sim, uart, delay) = sim(host_rate, module);
    let xbee = XBee::with_config(uart, delay, config, Default::default()).unwrap();
    (sim, xbee)
}

/// Interface already synchronized with a module at `rate`, event log cleared
pub fn synced(module: Module, config: XBeeConfig) -> (Rc<RefCell<Sim>>, XBee<SimUart, SimDelay>) {
    let rate = module.rate;
    let (sim, mut xbee) = xbee(rate, module, config);
    let report = xbee.synchronize().unwrap();
    assert_eq!(report.rate, Some(rate));
    sim.borrow_mut().events.clear();
    (sim, xbee)
}
