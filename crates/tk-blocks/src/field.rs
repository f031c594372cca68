//! Field I/O blocks and the operator variable.
//!
//! A failed read leaves the output at its last value; a failed write is
//! simply repeated on the next tick. Both are reported as run errors.

use tk_core::{as_bool, from_bool, Word};
use tk_engine::{
    require, set_once, BlockIo, BlockKind, BuildCtx, BuildError, BuildResult, ChannelAddr,
    InputRef, OutputSet, RunError, RunOp, RunResult, Slot, Tick,
};

#[derive(Debug, Clone, Copy)]
pub enum PointField {
    In,
    Module,
    Channel,
}

const ADDRESS: &[Slot<PointField>] = &[
    Slot::named("module", PointField::Module),
    Slot::named("channel", PointField::Channel),
];

/// Builder state shared by the four point kinds.
#[derive(Default)]
pub struct PointBuilder {
    input: Option<InputRef>,
    module: Option<u16>,
    channel: Option<u16>,
}

impl PointBuilder {
    fn address(&mut self, field: PointField, key: &str, value: Word) -> BuildResult<()> {
        let value = u16::try_from(value)
            .map_err(|_| BuildError::invalid(key, value, "expected 0..=65535"))?;
        match field {
            PointField::Module => set_once(&mut self.module, key, value),
            _ => set_once(&mut self.channel, key, value),
        }
    }

    fn addr(&self) -> BuildResult<ChannelAddr> {
        Ok(ChannelAddr::new(
            require(self.module, "setpoint 'module'")?,
            require(self.channel, "setpoint 'channel'")?,
        ))
    }
}

/// Implements [`BlockKind`] for a point kind wrapping [`PointBuilder`].
macro_rules! point_kind {
    ($builder:ident, $name:literal, outputs: $outputs:expr, inputs: $inputs:expr, $commit:expr) => {
        #[derive(Default)]
        pub struct $builder(PointBuilder);

        impl BlockKind for $builder {
            type Field = PointField;
            const NAME: &'static str = $name;
            const OUTPUTS: &'static [&'static str] = $outputs;
            const INPUTS: &'static [Slot<PointField>] = $inputs;
            const SETPOINTS: &'static [Slot<PointField>] = ADDRESS;

            fn alloc() -> Self {
                Self::default()
            }

            fn input(&mut self, _field: PointField, key: &str, reg: InputRef) -> BuildResult<()> {
                set_once(&mut self.0.input, key, reg)
            }

            fn setpoint(
                &mut self,
                field: PointField,
                key: &str,
                value: Word,
                _ctx: &mut BuildCtx<'_>,
            ) -> BuildResult<()> {
                self.0.address(field, key, value)
            }

            fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
                let commit: fn(PointBuilder) -> BuildResult<Box<dyn RunOp>> = $commit;
                commit(self.0)
            }
        }
    };
}

const IN: &[Slot<PointField>] = &[Slot::named("in", PointField::In)];

point_kind!(AiBuilder, "ai", outputs: &["out"], inputs: &[], |b| {
    Ok(Box::new(AnalogIn { addr: b.addr()? }))
});
point_kind!(DiBuilder, "di", outputs: &["out"], inputs: &[], |b| {
    Ok(Box::new(DigitalIn { addr: b.addr()? }))
});
point_kind!(AoBuilder, "ao", outputs: &[], inputs: IN, |b| {
    Ok(Box::new(AnalogOut {
        addr: b.addr()?,
        input: require(b.input, "input 'in'")?,
    }))
});
point_kind!(DoBuilder, "do", outputs: &[], inputs: IN, |b| {
    Ok(Box::new(DigitalOut {
        addr: b.addr()?,
        input: require(b.input, "input 'in'")?,
    }))
});

pub struct AnalogIn {
    addr: ChannelAddr,
}

impl RunOp for AnalogIn {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let value = io.field().analog_input(self.addr)?;
        io.set(0, value);
        Ok(())
    }
}

pub struct DigitalIn {
    addr: ChannelAddr,
}

impl RunOp for DigitalIn {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let value = io.field().digital_input(self.addr)?;
        io.set(0, from_bool(value));
        Ok(())
    }
}

pub struct AnalogOut {
    addr: ChannelAddr,
    input: InputRef,
}

impl RunOp for AnalogOut {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let value = io.get(self.input);
        io.field().set_analog_output(self.addr, value)?;
        Ok(())
    }
}

pub struct DigitalOut {
    addr: ChannelAddr,
    input: InputRef,
}

impl RunOp for DigitalOut {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let value = io.get(self.input);
        let on = as_bool(value).ok_or(RunError::NotBoolean { input: "in", value })?;
        io.field().set_digital_output(self.addr, on)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValueField;

/// Holds a constant that only operator overrides change.
#[derive(Default)]
pub struct VarBuilder {
    value: Option<Word>,
}

pub struct Var {
    initial: Option<Word>,
}

impl BlockKind for VarBuilder {
    type Field = ValueField;
    const NAME: &'static str = "var";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const SETPOINTS: &'static [Slot<ValueField>] = &[Slot::named("value", ValueField)];

    fn alloc() -> Self {
        Self::default()
    }

    fn setpoint(
        &mut self,
        _field: ValueField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        set_once(&mut self.value, key, value)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Var {
            initial: Some(self.value.unwrap_or(0)),
        }))
    }
}

impl RunOp for Var {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        // the configured value lands on the first tick, afterwards the
        // register belongs to the operator
        if let Some(value) = self.initial.take() {
            io.set(0, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tk_engine::{FieldError, FieldIo, RegisterArena, SimulatedField};

    fn tick() -> Tick {
        Tick {
            index: 0,
            elapsed_ms: 1000,
        }
    }

    #[test]
    fn analog_input_keeps_last_value_when_offline() {
        let mut arena = RegisterArena::new();
        let out = [arena.alloc().unwrap()];
        let addr = ChannelAddr::new(3, 1);
        let mut field = SimulatedField::new();
        field.set_analog_input(addr, 215);

        let mut op = AnalogIn { addr };
        op.run(&mut BlockIo::new(&mut arena, &out, &mut field), &tick())
            .unwrap();
        assert_eq!(arena.read(&out[0]), 215);

        field.set_offline(3, true);
        field.set_analog_input(addr, 300);
        let err = op
            .run(&mut BlockIo::new(&mut arena, &out, &mut field), &tick())
            .unwrap_err();
        assert_eq!(err, RunError::Field(FieldError::Timeout { module: 3 }));
        assert_eq!(arena.read(&out[0]), 215);
    }

    #[test]
    fn digital_output_rejects_non_boolean() {
        let mut arena = RegisterArena::new();
        let src = arena.alloc().unwrap();
        let input = arena.reader(src.id()).unwrap();
        let addr = ChannelAddr::new(1, 0);
        let mut field = SimulatedField::new();
        let mut op = DigitalOut { addr, input };

        arena.set(&src, 1);
        op.run(&mut BlockIo::new(&mut arena, &[], &mut field), &tick())
            .unwrap();
        assert_eq!(field.digital_output(addr), Ok(true));

        arena.set(&src, 7);
        let err = op
            .run(&mut BlockIo::new(&mut arena, &[], &mut field), &tick())
            .unwrap_err();
        assert_eq!(err, RunError::NotBoolean { input: "in", value: 7 });
        assert_eq!(field.digital_output(addr), Ok(true));
    }

    #[test]
    fn address_must_fit_sixteen_bits() {
        let mut b = PointBuilder::default();
        assert!(b.address(PointField::Module, "module", 70000).is_err());
        assert!(b.address(PointField::Module, "module", -1).is_err());
        b.address(PointField::Module, "module", 2).unwrap();
        b.address(PointField::Channel, "channel", 5).unwrap();
        assert_eq!(b.addr(), Ok(ChannelAddr::new(2, 5)));
    }
}
