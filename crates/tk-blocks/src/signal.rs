//! Signal conditioning blocks: hysteresis trigger, PD terms, weighted mean.

use tk_core::{from_bool, saturate, Word};
use tk_engine::{
    flag, require, set_once, BlockIo, BlockKind, BuildCtx, BuildError, BuildResult, InputRef,
    OutputSet, RunOp, RunResult, Slot, Tick,
};

#[derive(Debug, Clone, Copy)]
pub enum TriggerField {
    In,
    High,
    Low,
    Hysteresis,
}

#[derive(Default)]
pub struct TriggerBuilder {
    input: Option<InputRef>,
    high: Option<InputRef>,
    low: Option<InputRef>,
    hysteresis: Option<bool>,
}

impl BlockKind for TriggerBuilder {
    type Field = TriggerField;
    const NAME: &'static str = "trigger";
    const OUTPUTS: &'static [&'static str] = &["high", "low"];
    const INPUTS: &'static [Slot<TriggerField>] = &[
        Slot::named("in", TriggerField::In),
        Slot::named("high", TriggerField::High),
        Slot::named("low", TriggerField::Low),
    ];
    const SETPOINTS: &'static [Slot<TriggerField>] =
        &[Slot::named("hysteresis", TriggerField::Hysteresis)];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, field: TriggerField, key: &str, reg: InputRef) -> BuildResult<()> {
        match field {
            TriggerField::High => set_once(&mut self.high, key, reg),
            TriggerField::Low => set_once(&mut self.low, key, reg),
            _ => set_once(&mut self.input, key, reg),
        }
    }

    fn setpoint(
        &mut self,
        _field: TriggerField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        set_once(&mut self.hysteresis, key, flag(key, value)?)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Trigger {
            input: require(self.input, "input 'in'")?,
            high: require(self.high, "input 'high'")?,
            low: require(self.low, "input 'low'")?,
            hysteresis: self.hysteresis.unwrap_or(false),
            state: (false, false),
        }))
    }
}

pub struct Trigger {
    input: InputRef,
    high: InputRef,
    low: InputRef,
    hysteresis: bool,
    state: (bool, bool),
}

/// `(high, low)` for `x` against the thresholds, given the previous state.
pub fn trigger(
    x: Word,
    high: Word,
    low: Word,
    hysteresis: bool,
    prev: (bool, bool),
) -> (bool, bool) {
    if x >= high {
        (true, false)
    } else if x <= low {
        (false, true)
    } else if hysteresis {
        prev
    } else {
        (false, false)
    }
}

impl RunOp for Trigger {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let x = io.get(self.input);
        self.state = trigger(
            x,
            io.get(self.high),
            io.get(self.low),
            self.hysteresis,
            self.state,
        );
        io.set(0, from_bool(self.state.0));
        io.set(1, from_bool(self.state.1));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PdField {
    In,
    Target,
}

#[derive(Default)]
pub struct PdBuilder {
    input: Option<InputRef>,
    target: Option<Word>,
}

impl BlockKind for PdBuilder {
    type Field = PdField;
    const NAME: &'static str = "pd";
    const OUTPUTS: &'static [&'static str] = &["error", "diff"];
    const INPUTS: &'static [Slot<PdField>] = &[Slot::named("in", PdField::In)];
    const SETPOINTS: &'static [Slot<PdField>] = &[Slot::named("target", PdField::Target)];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: PdField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.input, key, reg)
    }

    fn setpoint(
        &mut self,
        _field: PdField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        set_once(&mut self.target, key, value)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Pd::new(
            require(self.input, "input 'in'")?,
            require(self.target, "setpoint 'target'")?,
        )))
    }
}

/// Proportional error and first difference against a fixed target.
pub struct Pd {
    input: InputRef,
    target: Word,
    previous: Option<Word>,
}

impl Pd {
    pub fn new(input: InputRef, target: Word) -> Self {
        Self {
            input,
            target,
            previous: None,
        }
    }

    /// `(error, diff)` for a new sample.
    pub fn update(&mut self, x: Word) -> (Word, Word) {
        let previous = self.previous.replace(x).unwrap_or(x);
        (x.saturating_sub(self.target), x.saturating_sub(previous))
    }
}

impl RunOp for Pd {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let (error, diff) = self.update(io.get(self.input));
        io.set(0, error);
        io.set(1, diff);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum WsumField {
    Value,
    Weight,
    Initial,
}

#[derive(Default)]
pub struct WsumBuilder {
    pairs: Vec<(InputRef, Option<InputRef>)>,
    initial: Option<Word>,
}

impl BlockKind for WsumBuilder {
    type Field = WsumField;
    const NAME: &'static str = "wsum";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<WsumField>] = &[
        Slot::named("value", WsumField::Value),
        Slot::named("weight", WsumField::Weight),
    ];
    const SETPOINTS: &'static [Slot<WsumField>] = &[Slot::named("initial", WsumField::Initial)];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, field: WsumField, key: &str, reg: InputRef) -> BuildResult<()> {
        match field {
            WsumField::Value => {
                if matches!(self.pairs.last(), Some((_, None))) {
                    return Err(BuildError::Missing {
                        what: "'weight' after each 'value'",
                    });
                }
                self.pairs.push((reg, None));
                Ok(())
            }
            _ => match self.pairs.last_mut() {
                Some((_, weight @ None)) => {
                    *weight = Some(reg);
                    Ok(())
                }
                Some(_) => Err(BuildError::redefined(key)),
                None => Err(BuildError::Missing {
                    what: "'value' before 'weight'",
                }),
            },
        }
    }

    fn setpoint(
        &mut self,
        _field: WsumField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        set_once(&mut self.initial, key, value)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        if self.pairs.is_empty() {
            return Err(BuildError::Missing { what: "input 'value'" });
        }
        let pairs = self
            .pairs
            .into_iter()
            .map(|(value, weight)| {
                weight
                    .map(|w| (value, w))
                    .ok_or(BuildError::Missing {
                        what: "'weight' after each 'value'",
                    })
            })
            .collect::<BuildResult<_>>()?;
        Ok(Box::new(Wsum {
            pairs,
            initial: self.initial.unwrap_or(0),
        }))
    }
}

pub struct Wsum {
    pairs: Vec<(InputRef, InputRef)>,
    initial: Word,
}

/// Running weighted mean of `(value, weight)` pairs starting from `initial`.
pub fn weighted_mean(initial: Word, pairs: impl IntoIterator<Item = (Word, Word)>) -> Word {
    let mut value = initial;
    let mut total: Word = 0;
    for (v, w) in pairs {
        total = total.saturating_add(w);
        if total != 0 {
            let shift = (i128::from(v) - i128::from(value)).saturating_mul(i128::from(w))
                / i128::from(total);
            value = saturate(i128::from(value).saturating_add(shift));
        }
    }
    value
}

impl RunOp for Wsum {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let out = weighted_mean(
            self.initial,
            self.pairs.iter().map(|(v, w)| (io.get(*v), io.get(*w))),
        );
        io.set(0, out);
        Ok(())
    }
}
