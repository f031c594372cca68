//! Discrete-position valve driven by open/close pulses.
//!
//! The motor runs while `open` or `close` is held; a full stroke takes
//! `span` ms. The command `in` is a speed where `input_multiple` means full
//! speed. Travel is accumulated in `pending` (ms of motor run still owed,
//! signed) and paid out one tick at a time, so opposite commands net out
//! and sub-tick remainders carry over.
//!
//! The tracked position is only an estimate. Whenever the command drives it
//! past an end stop the valve switches to absolute mode: the estimate snaps
//! to the end and a full stroke toward it is owed, which resynchronises the
//! real valve. Further pushes against the same stop add nothing until the
//! target comes back inside the range.

use tk_core::{from_bool, mul_div, Word};
use tk_engine::{
    positive, require, set_once, BlockIo, BlockKind, BuildCtx, BuildResult, InputRef, OutputSet,
    RunOp, RunResult, Slot, Tick,
};

const OPEN: usize = 0;
const CLOSE: usize = 1;
const POSITION: usize = 2;

#[derive(Debug, Clone, Copy)]
pub enum ValveField {
    In,
    Reset,
    Span,
    InputMultiple,
}

#[derive(Default)]
pub struct ValveBuilder {
    input: Option<InputRef>,
    reset: Option<InputRef>,
    span: Option<Word>,
    input_multiple: Option<Word>,
}

impl BlockKind for ValveBuilder {
    type Field = ValveField;
    const NAME: &'static str = "valve";
    const OUTPUTS: &'static [&'static str] = &["open", "close", "position"];
    const INPUTS: &'static [Slot<ValveField>] = &[
        Slot::named("in", ValveField::In),
        Slot::named("reset", ValveField::Reset),
    ];
    const SETPOINTS: &'static [Slot<ValveField>] = &[
        Slot::named("span", ValveField::Span),
        Slot::named("input_multiple", ValveField::InputMultiple),
    ];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, field: ValveField, key: &str, reg: InputRef) -> BuildResult<()> {
        match field {
            ValveField::Reset => set_once(&mut self.reset, key, reg),
            _ => set_once(&mut self.input, key, reg),
        }
    }

    fn setpoint(
        &mut self,
        field: ValveField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        let value = positive(key, value)?;
        match field {
            ValveField::Span => set_once(&mut self.span, key, value),
            _ => set_once(&mut self.input_multiple, key, value),
        }
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Valve::new(
            require(self.input, "input 'in'")?,
            self.reset,
            require(self.span, "setpoint 'span'")?,
            self.input_multiple.unwrap_or(1000),
        )))
    }
}

/// Valve state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valve {
    input: InputRef,
    reset: Option<InputRef>,
    span: Word,
    input_multiple: Word,
    position: Word,
    pending: Word,
    absolute: bool,
}

/// Pulse decision for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drive {
    pub open: bool,
    pub close: bool,
}

impl Valve {
    pub fn new(input: InputRef, reset: Option<InputRef>, span: Word, input_multiple: Word) -> Self {
        Self {
            input,
            reset,
            span,
            input_multiple,
            position: 0,
            pending: 0,
            absolute: false,
        }
    }

    pub fn position(&self) -> Word {
        self.position
    }

    pub fn pending(&self) -> Word {
        self.pending
    }

    pub fn clear(&mut self) {
        self.position = 0;
        self.pending = 0;
        self.absolute = false;
    }

    /// Advance by one invocation of `t` ms with command `command`.
    pub fn advance(&mut self, command: Word, t: Word) -> Drive {
        let travel = mul_div(command, t, self.input_multiple);
        let target = self.position.saturating_add(travel);

        if (0..=self.span).contains(&target) {
            self.absolute = false;
            self.pending = self.pending.saturating_add(target - self.position);
            self.position = target;
        } else if !self.absolute {
            let edge = target.clamp(0, self.span);
            self.absolute = true;
            self.position = edge;
            self.pending = if edge == 0 { -self.span } else { self.span };
        }

        if t > 0 && self.pending >= t {
            self.pending -= t;
            Drive {
                open: true,
                close: false,
            }
        } else if t > 0 && self.pending <= -t {
            self.pending += t;
            Drive {
                open: false,
                close: true,
            }
        } else {
            Drive::default()
        }
    }
}

impl RunOp for Valve {
    fn run(&mut self, io: &mut BlockIo<'_>, tick: &Tick) -> RunResult<()> {
        if io.get_or(self.reset, 0) != 0 {
            self.clear();
            io.set(OPEN, 0);
            io.set(CLOSE, 0);
            io.set(POSITION, 0);
            return Ok(());
        }
        let drive = self.advance(io.get(self.input), tick.elapsed_ms);
        io.set(OPEN, from_bool(drive.open));
        io.set(CLOSE, from_bool(drive.close));
        io.set(POSITION, self.position);
        Ok(())
    }
}
