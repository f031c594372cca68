//! Logical gates over 0/1 registers.
//!
//! Any other input value is a run error; the gate keeps its previous
//! output for that tick.

use std::marker::PhantomData;

use tk_core::{as_bool, from_bool, Word};
use tk_engine::{
    require, set_once, BlockIo, BlockKind, BuildError, BuildResult, InputRef, OutputSet, RunError,
    RunOp, RunResult, Slot, Tick,
};

fn read_bool(io: &BlockIo<'_>, input: InputRef, name: &'static str) -> RunResult<bool> {
    let value = io.get(input);
    as_bool(value).ok_or(RunError::NotBoolean { input: name, value })
}

/// Fold rule of a variadic gate.
pub trait Combine: 'static {
    const NAME: &'static str;
    const INIT: bool;
    fn combine(acc: bool, x: bool) -> bool;
}

pub struct And;
pub struct Or;
pub struct Xor;

impl Combine for And {
    const NAME: &'static str = "and";
    const INIT: bool = true;
    fn combine(acc: bool, x: bool) -> bool {
        acc && x
    }
}

impl Combine for Or {
    const NAME: &'static str = "or";
    const INIT: bool = false;
    fn combine(acc: bool, x: bool) -> bool {
        acc || x
    }
}

impl Combine for Xor {
    const NAME: &'static str = "xor";
    const INIT: bool = false;
    fn combine(acc: bool, x: bool) -> bool {
        acc ^ x
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnyInput;

/// Builder for `and`, `or` and `xor`: any input key, repeated.
pub struct GateBuilder<C> {
    inputs: Vec<InputRef>,
    rule: PhantomData<C>,
}

impl<C: Combine> BlockKind for GateBuilder<C> {
    type Field = AnyInput;
    const NAME: &'static str = C::NAME;
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<AnyInput>] = &[Slot::variadic(AnyInput)];

    fn alloc() -> Self {
        Self {
            inputs: Vec::new(),
            rule: PhantomData,
        }
    }

    fn input(&mut self, _field: AnyInput, _key: &str, reg: InputRef) -> BuildResult<()> {
        self.inputs.push(reg);
        Ok(())
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        if self.inputs.is_empty() {
            return Err(BuildError::Missing { what: "gate input" });
        }
        Ok(Box::new(Gate::<C> {
            inputs: self.inputs,
            rule: PhantomData,
        }))
    }
}

pub struct Gate<C> {
    inputs: Vec<InputRef>,
    rule: PhantomData<C>,
}

impl<C: Combine> RunOp for Gate<C> {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let mut acc = C::INIT;
        for input in &self.inputs {
            acc = C::combine(acc, read_bool(io, *input, "in")?);
        }
        io.set(0, from_bool(acc));
        Ok(())
    }
}

#[derive(Default)]
pub struct NotBuilder {
    input: Option<InputRef>,
}

impl BlockKind for NotBuilder {
    type Field = AnyInput;
    const NAME: &'static str = "not";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<AnyInput>] = &[Slot::named("in", AnyInput)];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: AnyInput, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.input, key, reg)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Not {
            input: require(self.input, "input 'in'")?,
        }))
    }
}

pub struct Not {
    input: InputRef,
}

impl RunOp for Not {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let x = read_bool(io, self.input, "in")?;
        io.set(0, from_bool(!x));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum IfField {
    Cond,
    Then,
    Else,
}

#[derive(Default)]
pub struct IfBuilder {
    cond: Option<InputRef>,
    then: Option<InputRef>,
    otherwise: Option<InputRef>,
}

impl BlockKind for IfBuilder {
    type Field = IfField;
    const NAME: &'static str = "if";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<IfField>] = &[
        Slot::named("cond", IfField::Cond),
        Slot::named("then", IfField::Then),
        Slot::named("else", IfField::Else),
    ];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, field: IfField, key: &str, reg: InputRef) -> BuildResult<()> {
        let slot = match field {
            IfField::Cond => &mut self.cond,
            IfField::Then => &mut self.then,
            IfField::Else => &mut self.otherwise,
        };
        set_once(slot, key, reg)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Select {
            cond: require(self.cond, "input 'cond'")?,
            then: require(self.then, "input 'then'")?,
            otherwise: require(self.otherwise, "input 'else'")?,
        }))
    }
}

/// `if`: copies `then` or `else` depending on `cond`.
pub struct Select {
    cond: InputRef,
    then: InputRef,
    otherwise: InputRef,
}

impl RunOp for Select {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let pick = if read_bool(io, self.cond, "cond")? {
            self.then
        } else {
            self.otherwise
        };
        let value: Word = io.get(pick);
        io.set(0, value);
        Ok(())
    }
}
