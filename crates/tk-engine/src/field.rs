//! Field I/O interface.
//!
//! Hardware bus drivers live outside the engine; blocks reach them through
//! [`FieldIo`], addressed by numeric module and channel. [`SimulatedField`]
//! is an in-memory implementation used by the CLI and tests.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;
use tk_core::Word;

/// Module/channel address of one field point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelAddr {
    pub module: u16,
    pub channel: u16,
}

impl ChannelAddr {
    pub fn new(module: u16, channel: u16) -> Self {
        Self { module, channel }
    }
}

impl fmt::Display for ChannelAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.channel)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("no such channel {addr}")]
    NoSuchChannel { addr: ChannelAddr },

    #[error("module {module} not responding")]
    Timeout { module: u16 },
}

/// Primitive field operations used by I/O blocks.
pub trait FieldIo {
    fn analog_input(&mut self, addr: ChannelAddr) -> Result<Word, FieldError>;
    fn digital_input(&mut self, addr: ChannelAddr) -> Result<bool, FieldError>;
    fn analog_output(&mut self, addr: ChannelAddr) -> Result<Word, FieldError>;
    fn digital_output(&mut self, addr: ChannelAddr) -> Result<bool, FieldError>;
    fn set_analog_output(&mut self, addr: ChannelAddr, value: Word) -> Result<(), FieldError>;
    fn set_digital_output(&mut self, addr: ChannelAddr, value: bool) -> Result<(), FieldError>;
}

/// In-memory field: unknown channels read as zero, offline modules time out.
#[derive(Debug, Clone, Default)]
pub struct SimulatedField {
    analog_in: HashMap<ChannelAddr, Word>,
    digital_in: HashMap<ChannelAddr, bool>,
    analog_out: HashMap<ChannelAddr, Word>,
    digital_out: HashMap<ChannelAddr, bool>,
    offline: HashSet<u16>,
}

impl SimulatedField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_analog_input(&mut self, addr: ChannelAddr, value: Word) {
        self.analog_in.insert(addr, value);
    }

    pub fn set_digital_input(&mut self, addr: ChannelAddr, value: bool) {
        self.digital_in.insert(addr, value);
    }

    /// Take a module off the bus (reads and writes time out) or bring it back.
    pub fn set_offline(&mut self, module: u16, offline: bool) {
        if offline {
            self.offline.insert(module);
        } else {
            self.offline.remove(&module);
        }
    }

    /// Digital outputs currently driven, sorted by address.
    pub fn digital_outputs(&self) -> Vec<(ChannelAddr, bool)> {
        let mut out: Vec<_> = self.digital_out.iter().map(|(a, v)| (*a, *v)).collect();
        out.sort();
        out
    }

    /// Analog outputs currently driven, sorted by address.
    pub fn analog_outputs(&self) -> Vec<(ChannelAddr, Word)> {
        let mut out: Vec<_> = self.analog_out.iter().map(|(a, v)| (*a, *v)).collect();
        out.sort();
        out
    }

    fn online(&self, addr: ChannelAddr) -> Result<(), FieldError> {
        if self.offline.contains(&addr.module) {
            Err(FieldError::Timeout {
                module: addr.module,
            })
        } else {
            Ok(())
        }
    }
}

impl FieldIo for SimulatedField {
    fn analog_input(&mut self, addr: ChannelAddr) -> Result<Word, FieldError> {
        self.online(addr)?;
        Ok(self.analog_in.get(&addr).copied().unwrap_or(0))
    }

    fn digital_input(&mut self, addr: ChannelAddr) -> Result<bool, FieldError> {
        self.online(addr)?;
        Ok(self.digital_in.get(&addr).copied().unwrap_or(false))
    }

    fn analog_output(&mut self, addr: ChannelAddr) -> Result<Word, FieldError> {
        self.online(addr)?;
        self.analog_out
            .get(&addr)
            .copied()
            .ok_or(FieldError::NoSuchChannel { addr })
    }

    fn digital_output(&mut self, addr: ChannelAddr) -> Result<bool, FieldError> {
        self.online(addr)?;
        self.digital_out
            .get(&addr)
            .copied()
            .ok_or(FieldError::NoSuchChannel { addr })
    }

    fn set_analog_output(&mut self, addr: ChannelAddr, value: Word) -> Result<(), FieldError> {
        self.online(addr)?;
        self.analog_out.insert(addr, value);
        Ok(())
    }

    fn set_digital_output(&mut self, addr: ChannelAddr, value: bool) -> Result<(), FieldError> {
        self.online(addr)?;
        self.digital_out.insert(addr, value);
        Ok(())
    }
}
