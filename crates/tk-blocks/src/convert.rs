//! Table-lookup converters.
//!
//! Each converter holds a monotonic table sampled on an evenly spaced grid.
//! Lookups clamp to the table edge; a clamped lookup still writes the edge
//! value and then reports [`RunError::OutOfRange`].

use tk_core::{mul_div, Word};
use tk_engine::{
    positive, require, set_once, BlockIo, BlockKind, BuildCtx, BuildResult, InputRef, OutputSet,
    RunError, RunOp, RunResult, Slot, Tick,
};

/// A monotonically non-decreasing table on the grid
/// `origin, origin + spacing, ...`.
#[derive(Debug, Clone, Copy)]
pub struct GridTable {
    pub origin: Word,
    pub spacing: Word,
    pub values: &'static [Word],
}

/// Result of a table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub value: Word,
    pub clamped: bool,
}

impl Lookup {
    fn exact(value: Word) -> Self {
        Self {
            value,
            clamped: false,
        }
    }

    fn edge(value: Word) -> Self {
        Self {
            value,
            clamped: true,
        }
    }

    /// Write the result to output 0 and report a clamp.
    pub fn emit(self, io: &mut BlockIo<'_>, input: Word) -> RunResult<()> {
        io.set(0, self.value);
        if self.clamped {
            return Err(RunError::OutOfRange {
                value: input,
                clamped: self.value,
            });
        }
        Ok(())
    }
}

impl GridTable {
    fn grid(&self, i: usize) -> Word {
        self.origin + self.spacing * i as Word
    }

    fn last(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    /// Grid coordinate at which the table reaches `value`.
    pub fn invert(&self, value: Word) -> Lookup {
        let (Some(&first), Some(&last)) = (self.values.first(), self.values.last()) else {
            return Lookup::edge(self.origin);
        };
        if value < first {
            return Lookup::edge(self.origin);
        }
        if value > last {
            return Lookup::edge(self.grid(self.last()));
        }
        // first index whose value exceeds `value`; the interval starts before it
        let upper = self.values.partition_point(|v| *v <= value);
        if upper >= self.values.len() {
            return Lookup::exact(self.grid(self.last()));
        }
        let i = upper - 1;
        let (lo, hi) = (self.values[i], self.values[upper]);
        Lookup::exact(self.grid(i) + mul_div(value - lo, self.spacing, hi - lo))
    }

    /// Table value at grid coordinate `x`.
    pub fn eval(&self, x: Word) -> Lookup {
        let (Some(&first), Some(&last)) = (self.values.first(), self.values.last()) else {
            return Lookup::edge(0);
        };
        if x < self.origin {
            return Lookup::edge(first);
        }
        if x > self.grid(self.last()) {
            return Lookup::edge(last);
        }
        let offset = x - self.origin;
        let i = (offset / self.spacing) as usize;
        if i >= self.last() {
            return Lookup::exact(last);
        }
        let (lo, hi) = (self.values[i], self.values[i + 1]);
        Lookup::exact(lo + mul_div(hi - lo, offset - self.spacing * i as Word, self.spacing))
    }
}

/// PT1000 resistance in 0.1 ohm, every 10 degC from -50 degC.
pub const PT1000: GridTable = GridTable {
    origin: -500,
    spacing: 100,
    values: &[
        8031, 8427, 8822, 9216, 9609, 10000, 10390, 10779, 11167, 11554, 11940, 12324, 12708,
        13090, 13471, 13851, 14229, 14607, 14983, 15358, 15733, 16105, 16477, 16848, 17217,
        17586,
    ],
};

/// Saturated steam pressure in Pa, every 10 degC from 0 degC.
pub const STEAM: GridTable = GridTable {
    origin: 0,
    spacing: 100,
    values: &[
        611, 1228, 2339, 4246, 7384, 12350, 19940, 31190, 47390, 70140, 101350, 143300, 198500,
        270100, 361300, 475800, 617800, 791700, 1002100, 1254400, 1553800,
    ],
};

/// Horizontal cylinder fill in per mille of volume, every 5 % of diameter.
pub const HORIZONTAL_TANK: GridTable = GridTable {
    origin: 0,
    spacing: 50,
    values: &[
        0, 19, 52, 94, 142, 196, 252, 312, 374, 436, 500, 564, 626, 688, 748, 804, 858, 906, 948,
        981, 1000,
    ],
};

#[derive(Debug, Clone, Copy)]
pub enum ConvField {
    In,
    Diameter,
    Volume,
}

const CONV_INPUTS: &[Slot<ConvField>] = &[Slot::named("in", ConvField::In)];

/// Inverse table lookup: measured quantity to temperature in 0.1 degC.
pub struct Inverse {
    input: InputRef,
    table: &'static GridTable,
}

impl RunOp for Inverse {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let x = io.get(self.input);
        self.table.invert(x).emit(io, x)
    }
}

#[derive(Default)]
pub struct Pt1000Builder {
    input: Option<InputRef>,
}

impl BlockKind for Pt1000Builder {
    type Field = ConvField;
    const NAME: &'static str = "pt1000";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<ConvField>] = CONV_INPUTS;

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: ConvField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.input, key, reg)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Inverse {
            input: require(self.input, "input 'in'")?,
            table: &PT1000,
        }))
    }
}

#[derive(Default)]
pub struct SteamBuilder {
    input: Option<InputRef>,
}

impl BlockKind for SteamBuilder {
    type Field = ConvField;
    const NAME: &'static str = "steam";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<ConvField>] = CONV_INPUTS;

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: ConvField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.input, key, reg)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Inverse {
            input: require(self.input, "input 'in'")?,
            table: &STEAM,
        }))
    }
}

#[derive(Default)]
pub struct TankBuilder {
    input: Option<InputRef>,
    diameter: Option<Word>,
    volume: Option<Word>,
}

pub struct Tank {
    input: InputRef,
    diameter: Word,
    volume: Word,
}

impl BlockKind for TankBuilder {
    type Field = ConvField;
    const NAME: &'static str = "tank";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<ConvField>] = CONV_INPUTS;
    const SETPOINTS: &'static [Slot<ConvField>] = &[
        Slot::named("diameter", ConvField::Diameter),
        Slot::named("volume", ConvField::Volume),
    ];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: ConvField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.input, key, reg)
    }

    fn setpoint(
        &mut self,
        field: ConvField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        let value = positive(key, value)?;
        match field {
            ConvField::Diameter => set_once(&mut self.diameter, key, value),
            _ => set_once(&mut self.volume, key, value),
        }
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Tank {
            input: require(self.input, "input 'in'")?,
            diameter: require(self.diameter, "setpoint 'diameter'")?,
            volume: require(self.volume, "setpoint 'volume'")?,
        }))
    }
}

impl RunOp for Tank {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let height = io.get(self.input);
        let fill = mul_div(height, 1000, self.diameter);
        let lookup = HORIZONTAL_TANK.eval(fill);
        Lookup {
            value: mul_div(lookup.value, self.volume, 1000),
            ..lookup
        }
        .emit(io, height)
    }
}
