//! Configuration loader: drives the builder protocol.
//!
//! Each [`BlockRecord`] goes through registry lookup, allocation of the
//! builder and its static outputs, directive application in file order and
//! commit. The first error poisons the loader; nothing of a failed load can
//! be run.

use std::collections::HashSet;

use tk_core::{parse_word, BlockId, Word};
use tracing::{debug, info};

use crate::block::{BuildCtx, OutputSet, RunOp, Table, Value};
use crate::error::{BuildError, BuildResult, EngineError, EngineResult};
use crate::register::RegisterArena;
use crate::registry::{PendingBlock, Registry};
use crate::wiring::OutputDirectory;

/// Reserved key setting an instance's rate multiplier.
pub const MULTIPLE_KEY: &str = "multiple";

/// One `key: value` configuration directive, value still in source form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
}

impl Directive {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// A block declaration as produced by the configuration reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub name: String,
    pub kind: String,
    pub directives: Vec<Directive>,
}

impl BlockRecord {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            directives: Vec::new(),
        }
    }

    /// Builder-style directive append.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.directives.push(Directive::new(key, value));
        self
    }
}

/// A committed block.
pub struct BlockInstance {
    pub id: BlockId,
    pub name: String,
    pub kind: &'static str,
    pub multiple: u32,
    pub outputs: OutputSet,
    pub(crate) op: Box<dyn RunOp>,
}

impl std::fmt::Debug for BlockInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockInstance")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("multiple", &self.multiple)
            .field("outputs", &self.outputs.names())
            .finish()
    }
}

/// A fully loaded, wired configuration ready for the scheduler.
#[derive(Debug)]
pub struct Program {
    pub(crate) arena: RegisterArena,
    pub(crate) directory: OutputDirectory,
    pub(crate) blocks: Vec<BlockInstance>,
}

impl Program {
    pub fn blocks(&self) -> &[BlockInstance] {
        &self.blocks
    }

    /// Current value of a named register (`block.output` or `block`).
    pub fn register(&self, name: &str) -> Option<Word> {
        self.directory
            .resolve(name)
            .and_then(|id| self.arena.peek(id))
    }

    /// Operator override of a named register.
    pub fn force(&mut self, name: &str, value: Word) -> EngineResult<()> {
        let id = self
            .directory
            .resolve(name)
            .ok_or_else(|| EngineError::UnknownRegister {
                name: name.to_string(),
            })?;
        self.arena.force(id, value);
        Ok(())
    }

    /// All named registers with their values, in declaration order.
    pub fn snapshot(&self) -> Vec<(String, Word)> {
        self.directory
            .iter()
            .map(|(name, id)| (name.to_string(), self.arena.peek(id).unwrap_or(0)))
            .collect()
    }

    pub fn register_count(&self) -> usize {
        self.arena.len()
    }
}

pub struct Loader<'r> {
    registry: &'r Registry,
    arena: RegisterArena,
    directory: OutputDirectory,
    blocks: Vec<BlockInstance>,
    names: HashSet<String>,
    aborted: bool,
}

impl<'r> Loader<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            arena: RegisterArena::new(),
            directory: OutputDirectory::new(),
            blocks: Vec::new(),
            names: HashSet::new(),
            aborted: false,
        }
    }

    /// Load every record in order; the first failure aborts the load.
    pub fn load(registry: &'r Registry, records: &[BlockRecord]) -> EngineResult<Program> {
        let mut loader = Self::new(registry);
        for record in records {
            loader.declare(record)?;
        }
        loader.finish()
    }

    /// Instantiate, configure and commit one block.
    pub fn declare(&mut self, record: &BlockRecord) -> EngineResult<BlockId> {
        if self.aborted {
            return Err(EngineError::LoadAborted);
        }
        let result = self.declare_inner(record);
        if result.is_err() {
            self.aborted = true;
        }
        result
    }

    fn declare_inner(&mut self, record: &BlockRecord) -> EngineResult<BlockId> {
        let registry = self.registry;
        let ty = registry.lookup(&record.kind)?;
        validate_name(&record.name)?;
        if !self.names.insert(record.name.clone()) {
            return Err(EngineError::DuplicateBlock {
                name: record.name.clone(),
            });
        }

        let id = BlockId::from_usize(self.blocks.len());
        let mut pending = ty.alloc();
        let mut outputs = OutputSet::new();
        for output in ty.outputs() {
            let reg = self.arena.alloc()?;
            self.directory.publish(&record.name, output, reg.id());
            outputs.push(output.to_string(), reg);
        }

        let mut multiple = None;
        for directive in &record.directives {
            self.apply(record, pending.as_mut(), &mut outputs, &mut multiple, directive)
                .map_err(|source| EngineError::Load {
                    block: record.name.clone(),
                    source,
                })?;
        }

        let op = pending.commit(&outputs).map_err(|source| EngineError::Load {
            block: record.name.clone(),
            source,
        })?;

        debug!(
            block = %record.name,
            kind = ty.name(),
            outputs = outputs.len(),
            "block committed"
        );
        self.blocks.push(BlockInstance {
            id,
            name: record.name.clone(),
            kind: ty.name(),
            multiple: multiple.unwrap_or(1),
            outputs,
            op,
        });
        Ok(id)
    }

    fn apply(
        &mut self,
        record: &BlockRecord,
        pending: &mut dyn PendingBlock,
        outputs: &mut OutputSet,
        multiple: &mut Option<u32>,
        directive: &Directive,
    ) -> BuildResult<()> {
        let key = directive.key.as_str();
        let raw = directive.value.as_str();

        if key == MULTIPLE_KEY {
            let value = parse_number(key, raw)?;
            let value = u32::try_from(value)
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| BuildError::invalid(key, value, "must be a positive integer"))?;
            return crate::block::set_once(multiple, key, value);
        }

        let table = pending.table(key).ok_or_else(|| BuildError::UnknownKey {
            key: key.to_string(),
        })?;
        let value = match table {
            Table::Input => {
                let reg = self
                    .directory
                    .resolve_input(&self.arena, raw)
                    .ok_or_else(|| BuildError::UnresolvedReference {
                        key: key.to_string(),
                        reference: raw.to_string(),
                    })?;
                Value::Register(reg)
            }
            Table::Setpoint => Value::Int(parse_number(key, raw)?),
            Table::Text => Value::Text(raw),
        };

        let mut ctx = BuildCtx {
            block_name: &record.name,
            arena: &mut self.arena,
            directory: &mut self.directory,
            outputs,
        };
        pending.apply(key, value, &mut ctx)
    }

    /// Freeze the arena and hand over the program.
    pub fn finish(self) -> EngineResult<Program> {
        if self.aborted {
            return Err(EngineError::LoadAborted);
        }
        let mut arena = self.arena;
        arena.freeze();
        info!(
            blocks = self.blocks.len(),
            registers = arena.len(),
            "configuration loaded"
        );
        Ok(Program {
            arena,
            directory: self.directory,
            blocks: self.blocks,
        })
    }
}

fn parse_number(key: &str, raw: &str) -> BuildResult<Word> {
    parse_word(raw).ok_or_else(|| BuildError::MalformedNumber {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn validate_name(name: &str) -> EngineResult<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.contains('.') {
        "contains '.'"
    } else if name.chars().any(char::is_whitespace) {
        "contains whitespace"
    } else {
        return Ok(());
    };
    Err(EngineError::InvalidBlockName {
        name: name.to_string(),
        reason,
    })
}
