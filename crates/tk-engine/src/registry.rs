//! Block type registry.
//!
//! Maps type names to [`BlockType`] entries. A `BlockType` is the
//! type-erased form of a [`BlockKind`]: it knows how to allocate a fresh
//! builder and which keys the kind accepts.

use std::collections::HashMap;
use std::fmt;

use crate::block::{
    resolve_key, unknown_key, BlockKind, BuildCtx, OutputSet, RunOp, Slot, Table, Value,
};
use crate::error::{BuildResult, EngineError, EngineResult};

/// Builder state of one block being loaded, with its kind erased.
pub(crate) trait PendingBlock {
    fn table(&self, key: &str) -> Option<Table>;
    fn apply(&mut self, key: &str, value: Value<'_>, ctx: &mut BuildCtx<'_>) -> BuildResult<()>;
    fn commit(self: Box<Self>, outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>>;
}

struct Pending<K: BlockKind>(K);

impl<K: BlockKind> PendingBlock for Pending<K> {
    fn table(&self, key: &str) -> Option<Table> {
        resolve_key::<K>(key).map(|(table, _)| table)
    }

    fn apply(&mut self, key: &str, value: Value<'_>, ctx: &mut BuildCtx<'_>) -> BuildResult<()> {
        match (resolve_key::<K>(key), value) {
            (Some((Table::Input, field)), Value::Register(reg)) => self.0.input(field, key, reg),
            (Some((Table::Setpoint, field)), Value::Int(v)) => self.0.setpoint(field, key, v, ctx),
            (Some((Table::Text, field)), Value::Text(s)) => self.0.string(field, key, s),
            _ => Err(unknown_key(key)),
        }
    }

    fn commit(self: Box<Self>, outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        self.0.commit(outputs)
    }
}

fn keys<F>(slots: &'static [Slot<F>]) -> Vec<Option<&'static str>> {
    slots.iter().map(|slot| slot.key).collect()
}

/// Registry entry for one block kind.
#[derive(Clone)]
pub struct BlockType {
    name: &'static str,
    outputs: &'static [&'static str],
    inputs: Vec<Option<&'static str>>,
    setpoints: Vec<Option<&'static str>>,
    strings: Vec<Option<&'static str>>,
    make: fn() -> Box<dyn PendingBlock>,
}

impl BlockType {
    pub fn of<K: BlockKind>() -> Self {
        fn make<K: BlockKind>() -> Box<dyn PendingBlock> {
            Box::new(Pending(K::alloc()))
        }
        Self {
            name: K::NAME,
            outputs: K::OUTPUTS,
            inputs: keys(K::INPUTS),
            setpoints: keys(K::SETPOINTS),
            strings: keys(K::STRINGS),
            make: make::<K>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Statically named outputs.
    pub fn outputs(&self) -> &'static [&'static str] {
        self.outputs
    }

    /// Input keys; `None` is the variadic slot.
    pub fn inputs(&self) -> &[Option<&'static str>] {
        &self.inputs
    }

    pub fn setpoints(&self) -> &[Option<&'static str>] {
        &self.setpoints
    }

    pub fn strings(&self) -> &[Option<&'static str>] {
        &self.strings
    }

    pub(crate) fn alloc(&self) -> Box<dyn PendingBlock> {
        (self.make)()
    }
}

impl fmt::Debug for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockType")
            .field("name", &self.name)
            .field("outputs", &self.outputs)
            .field("inputs", &self.inputs)
            .field("setpoints", &self.setpoints)
            .field("strings", &self.strings)
            .finish()
    }
}

/// Roster of block types, in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<BlockType>,
    by_name: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ty: BlockType) -> EngineResult<()> {
        if self.by_name.contains_key(ty.name) {
            return Err(EngineError::DuplicateBlockType { name: ty.name });
        }
        self.by_name.insert(ty.name, self.types.len());
        self.types.push(ty);
        Ok(())
    }

    pub fn register_kind<K: BlockKind>(&mut self) -> EngineResult<()> {
        self.register(BlockType::of::<K>())
    }

    pub fn lookup(&self, name: &str) -> EngineResult<&BlockType> {
        self.by_name
            .get(name)
            .map(|&i| &self.types[i])
            .ok_or_else(|| EngineError::UnknownBlockType {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
