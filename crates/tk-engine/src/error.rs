//! Engine error types.
//!
//! Load-time problems are [`BuildError`]s wrapped with the offending block in
//! [`EngineError::Load`]; they abort the whole configuration load. Problems
//! raised while a block runs are [`RunError`]s: the block has already applied
//! its fallback, the scheduler only logs them.

use thiserror::Error;
use tk_core::Word;

use crate::field::FieldError;

pub type BuildResult<T> = Result<T, BuildError>;
pub type EngineResult<T> = Result<T, EngineError>;
pub type RunResult<T> = Result<T, RunError>;

/// A configuration directive (or the commit gate) rejected a block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("unknown key '{key}'")]
    UnknownKey { key: String },

    #[error("'{key}' is already defined")]
    Redefined { key: String },

    #[error("malformed number '{value}' for '{key}'")]
    MalformedNumber { key: String, value: String },

    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },

    #[error("breakpoints out of order: {what}")]
    OutOfOrder { what: String },

    #[error("missing required {what}")]
    Missing { what: &'static str },

    #[error("outputs already declared, '{key}' applied twice")]
    OutputsAlreadyDeclared { key: String },

    #[error("unresolved reference '{reference}' for '{key}'")]
    UnresolvedReference { key: String, reference: String },
}

impl BuildError {
    pub fn invalid(key: &str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }

    pub fn redefined(key: &str) -> Self {
        Self::Redefined {
            key: key.to_string(),
        }
    }
}

/// Engine-level errors: registry, loader and scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown block type '{name}'")]
    UnknownBlockType { name: String },

    #[error("block type '{name}' registered twice")]
    DuplicateBlockType { name: &'static str },

    #[error("block '{name}' declared twice")]
    DuplicateBlock { name: String },

    #[error("invalid block name '{name}': {reason}")]
    InvalidBlockName { name: String, reason: &'static str },

    #[error("block '{block}': {source}")]
    Load {
        block: String,
        #[source]
        source: BuildError,
    },

    #[error("configuration load was aborted by an earlier error")]
    LoadAborted,

    #[error("register arena is frozen")]
    ArenaFrozen,

    #[error("unknown register '{name}'")]
    UnknownRegister { name: String },

    #[error("invalid schedule: {what}")]
    InvalidSchedule { what: &'static str },
}

/// Failure reported by a block's run operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("field I/O: {0}")]
    Field(#[from] FieldError),

    #[error("input '{input}' is not boolean: {value}")]
    NotBoolean { input: &'static str, value: Word },

    #[error("value {value} outside table range, clamped to {clamped}")]
    OutOfRange { value: Word, clamped: Word },

    #[error("state file '{path}': {message}")]
    Persist { path: String, message: String },
}
