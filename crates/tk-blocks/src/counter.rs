//! Event counter and heat meter with persisted totals.
//!
//! Both count rising edges (0 to nonzero) of `in`. The plain counter adds one
//! per edge. The heat meter's `count` is accumulated energy rather than an
//! event tally: each edge adds `(supply - return) * pulse` in place of the
//! one, and `rate` becomes power. The state file holds exactly
//! `(count, rate)`, so no separate event count is kept. `rate` is the
//! last edge's quantity scaled to `rate_unit` ms, computed from the time
//! since the previous edge; no rate is derived until a second edge after
//! start-up. Totals are reloaded on the first tick and rewritten on every
//! edge when a `file` is configured.

use std::path::PathBuf;

use tk_core::{mul_div, Word};
use tk_engine::{
    positive, require, set_once, BlockIo, BlockKind, BuildCtx, BuildError, BuildResult, InputRef,
    OutputSet, RunError, RunOp, RunResult, Slot, Tick,
};
use tracing::debug;

use crate::persist::CounterState;

const COUNT: usize = 0;
const RATE: usize = 1;

/// Milliseconds per hour.
pub const DEFAULT_RATE_UNIT: Word = 3_600_000;

#[derive(Debug, Clone, Copy)]
pub enum CounterField {
    In,
    Supply,
    Return,
    Pulse,
    RateUnit,
    File,
}

const COUNTER_OUTPUTS: &[&str] = &["count", "rate"];
const FILE: &[Slot<CounterField>] = &[Slot::named("file", CounterField::File)];

/// Configuration shared by both counter kinds.
#[derive(Default)]
struct CommonBuilder {
    input: Option<InputRef>,
    rate_unit: Option<Word>,
    file: Option<PathBuf>,
}

impl CommonBuilder {
    fn rate_unit(&mut self, key: &str, value: Word) -> BuildResult<()> {
        set_once(&mut self.rate_unit, key, positive(key, value)?)
    }

    fn file(&mut self, key: &str, value: &str) -> BuildResult<()> {
        if value.is_empty() {
            return Err(BuildError::invalid(key, value, "empty path"));
        }
        set_once(&mut self.file, key, PathBuf::from(value))
    }

    fn finish(self, meter: Meter) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Counter {
            input: require(self.input, "input 'in'")?,
            meter,
            rate_unit: self.rate_unit.unwrap_or(DEFAULT_RATE_UNIT),
            file: self.file,
            started: false,
            level: false,
            seen_edge: false,
            elapsed_ms: 0,
            state: CounterState::default(),
        }))
    }
}

#[derive(Default)]
pub struct CounterBuilder(CommonBuilder);

impl BlockKind for CounterBuilder {
    type Field = CounterField;
    const NAME: &'static str = "counter";
    const OUTPUTS: &'static [&'static str] = COUNTER_OUTPUTS;
    const INPUTS: &'static [Slot<CounterField>] = &[Slot::named("in", CounterField::In)];
    const SETPOINTS: &'static [Slot<CounterField>] =
        &[Slot::named("rate_unit", CounterField::RateUnit)];
    const STRINGS: &'static [Slot<CounterField>] = FILE;

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: CounterField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.0.input, key, reg)
    }

    fn setpoint(
        &mut self,
        _field: CounterField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        self.0.rate_unit(key, value)
    }

    fn string(&mut self, _field: CounterField, key: &str, value: &str) -> BuildResult<()> {
        self.0.file(key, value)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        self.0.finish(Meter::Events)
    }
}

#[derive(Default)]
pub struct HeatCounterBuilder {
    common: CommonBuilder,
    supply: Option<InputRef>,
    ret: Option<InputRef>,
    pulse: Option<Word>,
}

impl BlockKind for HeatCounterBuilder {
    type Field = CounterField;
    const NAME: &'static str = "heat_counter";
    const OUTPUTS: &'static [&'static str] = COUNTER_OUTPUTS;
    const INPUTS: &'static [Slot<CounterField>] = &[
        Slot::named("in", CounterField::In),
        Slot::named("supply", CounterField::Supply),
        Slot::named("return", CounterField::Return),
    ];
    const SETPOINTS: &'static [Slot<CounterField>] = &[
        Slot::named("pulse", CounterField::Pulse),
        Slot::named("rate_unit", CounterField::RateUnit),
    ];
    const STRINGS: &'static [Slot<CounterField>] = FILE;

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, field: CounterField, key: &str, reg: InputRef) -> BuildResult<()> {
        match field {
            CounterField::Supply => set_once(&mut self.supply, key, reg),
            CounterField::Return => set_once(&mut self.ret, key, reg),
            _ => set_once(&mut self.common.input, key, reg),
        }
    }

    fn setpoint(
        &mut self,
        field: CounterField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        match field {
            CounterField::Pulse => set_once(&mut self.pulse, key, value),
            _ => self.common.rate_unit(key, value),
        }
    }

    fn string(&mut self, _field: CounterField, key: &str, value: &str) -> BuildResult<()> {
        self.common.file(key, value)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        let meter = Meter::Heat {
            supply: require(self.supply, "input 'supply'")?,
            ret: require(self.ret, "input 'return'")?,
            pulse: require(self.pulse, "setpoint 'pulse'")?,
        };
        self.common.finish(meter)
    }
}

/// What one edge is worth.
#[derive(Debug, Clone, Copy)]
enum Meter {
    Events,
    Heat {
        supply: InputRef,
        ret: InputRef,
        pulse: Word,
    },
}

impl Meter {
    fn quantity(&self, io: &BlockIo<'_>) -> Word {
        match *self {
            Meter::Events => 1,
            Meter::Heat { supply, ret, pulse } => {
                io.get(supply)
                    .saturating_sub(io.get(ret))
                    .saturating_mul(pulse)
            }
        }
    }
}

pub struct Counter {
    input: InputRef,
    meter: Meter,
    rate_unit: Word,
    file: Option<PathBuf>,
    started: bool,
    /// Trigger level seen on the previous tick.
    level: bool,
    seen_edge: bool,
    elapsed_ms: Word,
    state: CounterState,
}

impl Counter {
    fn restore(&mut self) -> RunResult<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        match CounterState::load(path) {
            Ok(state) => {
                debug!(path = %path.display(), count = state.count, "counter state restored");
                self.state = state;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no counter state, starting from zero");
                Ok(())
            }
            Err(err) => Err(RunError::Persist {
                path: path.display().to_string(),
                message: err.to_string(),
            }),
        }
    }

    fn save(&self) -> RunResult<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        self.state.store(path).map_err(|err| RunError::Persist {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }

    fn publish(&self, io: &mut BlockIo<'_>) {
        io.set(COUNT, self.state.count);
        io.set(RATE, self.state.rate);
    }
}

impl RunOp for Counter {
    fn run(&mut self, io: &mut BlockIo<'_>, tick: &Tick) -> RunResult<()> {
        let level = io.get(self.input) != 0;
        if !self.started {
            self.started = true;
            self.level = level;
            let restored = self.restore();
            self.publish(io);
            return restored;
        }

        self.elapsed_ms = self.elapsed_ms.saturating_add(tick.elapsed_ms);
        let rising = level && !self.level;
        self.level = level;
        if !rising {
            return Ok(());
        }

        let quantity = self.meter.quantity(io);
        self.state.count = self.state.count.saturating_add(quantity);
        if self.seen_edge {
            self.state.rate = mul_div(quantity, self.rate_unit, self.elapsed_ms);
        }
        self.seen_edge = true;
        self.elapsed_ms = 0;
        self.publish(io);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tk_engine::{OutputRef, RegisterArena, SimulatedField};

    struct Rig {
        arena: RegisterArena,
        trigger: OutputRef,
        outputs: Vec<OutputRef>,
        field: SimulatedField,
    }

    impl Rig {
        fn new() -> (Self, InputRef) {
            let mut arena = RegisterArena::new();
            let trigger = arena.alloc().unwrap();
            let input = arena.reader(trigger.id()).unwrap();
            let outputs = (0..2)
                .map(|_| arena.alloc().unwrap())
                .collect();
            let rig = Self {
                arena,
                trigger,
                outputs,
                field: SimulatedField::new(),
            };
            (rig, input)
        }

        fn tick(&mut self, op: &mut Counter, level: Word) -> RunResult<()> {
            self.arena.set(&self.trigger, level);
            let mut io = BlockIo::new(&mut self.arena, &self.outputs, &mut self.field);
            op.run(
                &mut io,
                &Tick {
                    index: 0,
                    elapsed_ms: 1000,
                },
            )
        }

        fn out(&self) -> (Word, Word) {
            (
                self.arena.read(&self.outputs[COUNT]),
                self.arena.read(&self.outputs[RATE]),
            )
        }
    }

    fn counter(input: InputRef, file: Option<PathBuf>) -> Counter {
        Counter {
            input,
            meter: Meter::Events,
            rate_unit: DEFAULT_RATE_UNIT,
            file,
            started: false,
            level: false,
            seen_edge: false,
            elapsed_ms: 0,
            state: CounterState::default(),
        }
    }

    #[test]
    fn counts_rising_edges_only() {
        let (mut rig, input) = Rig::new();
        let mut op = counter(input, None);
        // high on the first tick is the bootstrap level, not an edge
        for level in [1, 1, 0, 1, 1, 0, 0, 1] {
            rig.tick(&mut op, level).unwrap();
        }
        assert_eq!(rig.out().0, 2);
    }

    #[test]
    fn rate_from_time_between_edges() {
        let (mut rig, input) = Rig::new();
        let mut op = counter(input, None);
        rig.tick(&mut op, 0).unwrap();
        rig.tick(&mut op, 1).unwrap();
        assert_eq!(rig.out(), (1, 0));
        // next edge 4 s later: 1 event per 4000 ms is 900 per hour
        for level in [0, 0, 0, 1] {
            rig.tick(&mut op, level).unwrap();
        }
        assert_eq!(rig.out(), (2, 900));
    }

    #[test]
    fn persisted_totals_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.state");

        let (mut rig, input) = Rig::new();
        let mut op = counter(input, Some(path.clone()));
        for level in [0, 1, 0, 1] {
            rig.tick(&mut op, level).unwrap();
        }
        assert_eq!(rig.out(), (2, 1800));
        assert_eq!(
            CounterState::load(&path).unwrap(),
            CounterState {
                count: 2,
                rate: 1800
            }
        );

        let (mut rig, input) = Rig::new();
        let mut op = counter(input, Some(path.clone()));
        rig.tick(&mut op, 1).unwrap();
        assert_eq!(rig.out(), (2, 1800));
        rig.tick(&mut op, 0).unwrap();
        rig.tick(&mut op, 1).unwrap();
        // first edge after restart keeps the stored rate
        assert_eq!(rig.out(), (3, 1800));
    }

    #[test]
    fn corrupt_file_degrades_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.state");
        std::fs::write(&path, b"garbage").unwrap();

        let (mut rig, input) = Rig::new();
        let mut op = counter(input, Some(path));
        assert!(matches!(
            rig.tick(&mut op, 0),
            Err(RunError::Persist { .. })
        ));
        assert_eq!(rig.out(), (0, 0));
        rig.tick(&mut op, 1).unwrap();
        assert_eq!(rig.out(), (1, 0));
    }

    #[test]
    fn steady_input_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.state");
        let (mut rig, input) = Rig::new();
        let mut op = counter(input, Some(path.clone()));
        for level in [0, 1] {
            rig.tick(&mut op, level).unwrap();
        }
        let saved = std::fs::read(&path).unwrap();
        let out = rig.out();
        for _ in 0..5 {
            rig.tick(&mut op, 1).unwrap();
        }
        assert_eq!(rig.out(), out);
        assert_eq!(std::fs::read(&path).unwrap(), saved);
    }
}
