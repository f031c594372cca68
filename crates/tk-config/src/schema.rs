//! Plant file schema.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

fn default_tick_ms() -> u64 {
    1000
}

fn default_multiple() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plant {
    pub name: String,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_multiple")]
    pub multiple: u32,
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Directives in file order; each entry is a single-key map.
    #[serde(default)]
    pub config: Vec<BTreeMap<String, Scalar>>,
}

/// A directive value as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Bool(bool),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{}", u8::from(*v)),
            // `{:?}` keeps `3.0` distinct from `3`
            Scalar::Float(v) => write!(f, "{v:?}"),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl BlockDef {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            config: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.config.push(BTreeMap::from([(key.into(), value.into())]));
        self
    }
}
