//! Block kinds, capability tables and the run-time interface.
//!
//! A block type is a [`BlockKind`]: a builder state with three capability
//! tables (inputs, setpoints, strings) mapping configuration keys to a typed
//! `Field`. A slot whose key is `None` is the table's variadic slot and
//! accepts any key, repeatedly. Committing a builder yields the block's
//! [`RunOp`], which the scheduler invokes once per tick with a [`BlockIo`].

use std::fmt;

use tk_core::Word;

use crate::error::{BuildError, BuildResult, RunResult};
use crate::field::FieldIo;
use crate::register::{InputRef, OutputRef, RegisterArena};
use crate::wiring::OutputDirectory;

/// Capability table a configuration key resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Input,
    Setpoint,
    Text,
}

/// One capability table entry.
#[derive(Debug, Clone, Copy)]
pub struct Slot<F: 'static> {
    pub key: Option<&'static str>,
    pub field: F,
}

impl<F> Slot<F> {
    pub const fn named(key: &'static str, field: F) -> Self {
        Self {
            key: Some(key),
            field,
        }
    }

    pub const fn variadic(field: F) -> Self {
        Self { key: None, field }
    }
}

/// A directive value after the loader interpreted it for its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Register(InputRef),
    Int(Word),
    Text(&'a str),
}

/// Timing of the current invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Global sweep counter, starting at 0.
    pub index: u64,
    /// Time covered by this invocation in milliseconds (nominal period x
    /// global multiplier x the block's own multiple).
    pub elapsed_ms: Word,
}

/// Output registers of one block instance, in declaration order.
#[derive(Debug, Default)]
pub struct OutputSet {
    names: Vec<String>,
    regs: Vec<OutputRef>,
    dynamic: bool,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: String, reg: OutputRef) {
        self.names.push(name);
        self.regs.push(reg);
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn regs(&self) -> &[OutputRef] {
        &self.regs
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

/// Load-time context handed to setpoint handlers.
pub struct BuildCtx<'a> {
    pub(crate) block_name: &'a str,
    pub(crate) arena: &'a mut RegisterArena,
    pub(crate) directory: &'a mut OutputDirectory,
    pub(crate) outputs: &'a mut OutputSet,
}

impl BuildCtx<'_> {
    pub fn block_name(&self) -> &str {
        self.block_name
    }

    /// Allocate a dynamically sized output set named `{prefix}0..{prefix}{count-1}`.
    ///
    /// Allowed once per instance; the names are published immediately so
    /// later declarations can reference them.
    pub fn declare_outputs(&mut self, key: &str, count: Word, prefix: &str) -> BuildResult<()> {
        if self.outputs.dynamic {
            return Err(BuildError::OutputsAlreadyDeclared {
                key: key.to_string(),
            });
        }
        if count <= 0 {
            return Err(BuildError::invalid(key, count, "output count must be positive"));
        }
        self.outputs.dynamic = true;
        for i in 0..count {
            let reg = self
                .arena
                .alloc()
                .map_err(|_| BuildError::invalid(key, count, "register arena is frozen"))?;
            let name = format!("{prefix}{i}");
            if !self.directory.publish(self.block_name, &name, reg.id()) {
                return Err(BuildError::invalid(key, &name, "output name clashes"));
            }
            self.outputs.push(name, reg);
        }
        Ok(())
    }
}

/// Per-invocation access to registers and field I/O.
pub struct BlockIo<'a> {
    arena: &'a mut RegisterArena,
    outputs: &'a [OutputRef],
    field: &'a mut dyn FieldIo,
}

impl<'a> BlockIo<'a> {
    pub fn new(
        arena: &'a mut RegisterArena,
        outputs: &'a [OutputRef],
        field: &'a mut dyn FieldIo,
    ) -> Self {
        Self {
            arena,
            outputs,
            field,
        }
    }

    #[inline]
    pub fn get(&self, input: InputRef) -> Word {
        self.arena.get(input)
    }

    /// Read an optional input, `default` when unwired.
    #[inline]
    pub fn get_or(&self, input: Option<InputRef>, default: Word) -> Word {
        input.map_or(default, |i| self.arena.get(i))
    }

    /// Current value of this block's output `index` (its previous write).
    #[inline]
    pub fn output(&self, index: usize) -> Word {
        self.outputs
            .get(index)
            .map_or(0, |reg| self.arena.read(reg))
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: Word) {
        if let Some(reg) = self.outputs.get(index) {
            self.arena.set(reg, value);
        }
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn field(&mut self) -> &mut dyn FieldIo {
        &mut *self.field
    }
}

/// The committed, runnable form of a block.
pub trait RunOp {
    fn run(&mut self, io: &mut BlockIo<'_>, tick: &Tick) -> RunResult<()>;
}

/// A block type: builder state plus capability tables.
pub trait BlockKind: Sized + 'static {
    type Field: Copy + fmt::Debug + 'static;

    const NAME: &'static str;
    /// Outputs allocated for every instance, before any directive.
    const OUTPUTS: &'static [&'static str] = &[];
    const INPUTS: &'static [Slot<Self::Field>] = &[];
    const SETPOINTS: &'static [Slot<Self::Field>] = &[];
    const STRINGS: &'static [Slot<Self::Field>] = &[];

    fn alloc() -> Self;

    fn input(&mut self, _field: Self::Field, key: &str, _reg: InputRef) -> BuildResult<()> {
        Err(unknown_key(key))
    }

    fn setpoint(
        &mut self,
        _field: Self::Field,
        key: &str,
        _value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        Err(unknown_key(key))
    }

    fn string(&mut self, _field: Self::Field, key: &str, _value: &str) -> BuildResult<()> {
        Err(unknown_key(key))
    }

    fn commit(self, outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>>;
}

/// Find the slot for `key`: exact keys in every table first (inputs,
/// setpoints, strings), then the variadic slots in the same order.
pub fn resolve_key<K: BlockKind>(key: &str) -> Option<(Table, K::Field)> {
    let tables = [
        (Table::Input, K::INPUTS),
        (Table::Setpoint, K::SETPOINTS),
        (Table::Text, K::STRINGS),
    ];
    let find = |wanted: Option<&str>| {
        tables.iter().find_map(|(table, slots)| {
            slots
                .iter()
                .find(|slot| slot.key == wanted)
                .map(|slot| (*table, slot.field))
        })
    };
    find(Some(key)).or_else(|| find(None))
}

pub fn unknown_key(key: &str) -> BuildError {
    BuildError::UnknownKey {
        key: key.to_string(),
    }
}

/// Store a single-valued field, rejecting re-definition.
pub fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> BuildResult<()> {
    if slot.is_some() {
        return Err(BuildError::redefined(key));
    }
    *slot = Some(value);
    Ok(())
}

/// Unwrap a required field at commit time.
pub fn require<T>(slot: Option<T>, what: &'static str) -> BuildResult<T> {
    slot.ok_or(BuildError::Missing { what })
}

/// Require a strictly positive setpoint.
pub fn positive(key: &str, value: Word) -> BuildResult<Word> {
    if value > 0 {
        Ok(value)
    } else {
        Err(BuildError::invalid(key, value, "must be positive"))
    }
}

/// Require a 0/1 configuration flag.
pub fn flag(key: &str, value: Word) -> BuildResult<bool> {
    tk_core::as_bool(value).ok_or_else(|| BuildError::invalid(key, value, "expected 0 or 1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum F {
        In,
        Gain,
        Any,
        Label,
    }

    struct Probe;

    impl RunOp for Probe {
        fn run(&mut self, _io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
            Ok(())
        }
    }

    impl BlockKind for Probe {
        type Field = F;
        const NAME: &'static str = "probe";
        const INPUTS: &'static [Slot<F>] = &[Slot::named("in", F::In), Slot::variadic(F::Any)];
        const SETPOINTS: &'static [Slot<F>] = &[Slot::named("gain", F::Gain)];
        const STRINGS: &'static [Slot<F>] = &[Slot::named("label", F::Label)];

        fn alloc() -> Self {
            Probe
        }

        fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
            Ok(Box::new(self))
        }
    }

    #[test]
    fn exact_keys_win_over_wildcards() {
        assert_eq!(resolve_key::<Probe>("in"), Some((Table::Input, F::In)));
        assert_eq!(resolve_key::<Probe>("gain"), Some((Table::Setpoint, F::Gain)));
        assert_eq!(resolve_key::<Probe>("label"), Some((Table::Text, F::Label)));
        assert_eq!(resolve_key::<Probe>("x7"), Some((Table::Input, F::Any)));
    }

    proptest! {
        #[test]
        fn other_keys_fall_to_the_variadic_input(key in "[a-z][a-z0-9_]{0,12}") {
            prop_assume!(!["in", "gain", "label"].contains(&key.as_str()));
            prop_assert_eq!(resolve_key::<Probe>(&key), Some((Table::Input, F::Any)));
        }
    }

    #[test]
    fn set_once_rejects_redefinition() {
        let mut slot = None;
        set_once(&mut slot, "span", 10).unwrap();
        assert_eq!(
            set_once(&mut slot, "span", 20),
            Err(BuildError::redefined("span"))
        );
        assert_eq!(slot, Some(10));
    }

    #[test]
    fn flag_accepts_only_bits() {
        assert_eq!(flag("hysteresis", 1), Ok(true));
        assert_eq!(flag("hysteresis", 0), Ok(false));
        assert!(flag("hysteresis", 2).is_err());
    }

    #[test]
    fn positive_keeps_the_key() {
        assert_eq!(positive("span", 5), Ok(5));
        assert_eq!(
            positive("span", 0),
            Err(BuildError::invalid("span", 0, "must be positive"))
        );
        assert!(positive("span", -1).is_err());
    }

    #[test]
    fn require_reports_missing_field() {
        assert_eq!(require(Some(3), "in"), Ok(3));
        assert_eq!(
            require::<Word>(None, "in"),
            Err(BuildError::Missing { what: "in" })
        );
    }
}

