//! Persisted counter state: two native-endian `i64` words, `count` then
//! `rate`, with no header.

use std::fs;
use std::io;
use std::path::Path;

use tk_core::Word;

pub const STATE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterState {
    pub count: Word,
    pub rate: Word,
}

impl CounterState {
    pub fn to_bytes(self) -> [u8; STATE_LEN] {
        let mut buf = [0u8; STATE_LEN];
        buf[..8].copy_from_slice(&self.count.to_ne_bytes());
        buf[8..].copy_from_slice(&self.rate.to_ne_bytes());
        buf
    }

    /// `None` unless `bytes` is exactly one state image.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let image: &[u8; STATE_LEN] = bytes.try_into().ok()?;
        let (count, rate) = image.split_at(8);
        Some(Self {
            count: Word::from_ne_bytes(count.try_into().ok()?),
            rate: Word::from_ne_bytes(rate.try_into().ok()?),
        })
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {STATE_LEN} bytes, found {}", bytes.len()),
            )
        })
    }

    pub fn store(self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }
}
