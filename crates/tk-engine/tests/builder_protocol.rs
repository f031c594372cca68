//! Integration tests for the builder protocol and wiring.

use tk_core::Word;
use tk_engine::{
    require, set_once, BlockIo, BlockKind, BlockRecord, BuildCtx, BuildError, BuildResult,
    EngineError, InputRef, Loader, OutputSet, Registry, RunOp, RunResult, Scheduler,
    SchedulerConfig, SimulatedField, Slot, Tick,
};

#[derive(Debug, Clone, Copy)]
enum GainField {
    In,
    Gain,
    Label,
}

#[derive(Default)]
struct GainBuilder {
    input: Option<InputRef>,
    gain: Option<Word>,
    label: Option<String>,
}

struct Gain {
    input: InputRef,
    gain: Word,
}

impl BlockKind for GainBuilder {
    type Field = GainField;
    const NAME: &'static str = "gain";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<GainField>] = &[Slot::named("in", GainField::In)];
    const SETPOINTS: &'static [Slot<GainField>] = &[Slot::named("gain", GainField::Gain)];
    const STRINGS: &'static [Slot<GainField>] = &[Slot::named("label", GainField::Label)];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: GainField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.input, key, reg)
    }

    fn setpoint(
        &mut self,
        _field: GainField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        set_once(&mut self.gain, key, value)
    }

    fn string(&mut self, _field: GainField, key: &str, value: &str) -> BuildResult<()> {
        set_once(&mut self.label, key, value.to_string())
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        Ok(Box::new(Gain {
            input: require(self.input, "input 'in'")?,
            gain: self.gain.unwrap_or(1),
        }))
    }
}

impl RunOp for Gain {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let v = io.get(self.input);
        io.set(0, v * self.gain);
        Ok(())
    }
}

/// Dynamic output bank: `count` outputs, each mirroring the sum of inputs.
#[derive(Debug, Clone, Copy)]
enum BankField {
    Count,
    Any,
}

#[derive(Default)]
struct BankBuilder {
    inputs: Vec<InputRef>,
}

struct Bank {
    inputs: Vec<InputRef>,
}

impl BlockKind for BankBuilder {
    type Field = BankField;
    const NAME: &'static str = "bank";
    const INPUTS: &'static [Slot<BankField>] = &[Slot::variadic(BankField::Any)];
    const SETPOINTS: &'static [Slot<BankField>] = &[Slot::named("count", BankField::Count)];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: BankField, _key: &str, reg: InputRef) -> BuildResult<()> {
        self.inputs.push(reg);
        Ok(())
    }

    fn setpoint(
        &mut self,
        _field: BankField,
        key: &str,
        value: Word,
        ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        ctx.declare_outputs(key, value, "out")
    }

    fn commit(self, outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        if outputs.is_empty() {
            return Err(BuildError::Missing { what: "setpoint 'count'" });
        }
        Ok(Box::new(Bank {
            inputs: self.inputs,
        }))
    }
}

impl RunOp for Bank {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let sum: Word = self.inputs.iter().map(|i| io.get(*i)).sum();
        for i in 0..io.output_count() {
            io.set(i, sum + i as Word);
        }
        Ok(())
    }
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_kind::<GainBuilder>().unwrap();
    registry.register_kind::<BankBuilder>().unwrap();
    registry
}

fn load_error(records: &[BlockRecord]) -> EngineError {
    let registry = registry();
    Loader::load(&registry, records).unwrap_err()
}

fn build_error(records: &[BlockRecord]) -> BuildError {
    match load_error(records) {
        EngineError::Load { source, .. } => source,
        other => panic!("expected a load error, got {other:?}"),
    }
}

#[test]
fn duplicate_type_registration_rejected() {
    let mut registry = registry();
    assert_eq!(
        registry.register_kind::<GainBuilder>(),
        Err(EngineError::DuplicateBlockType { name: "gain" })
    );
    assert_eq!(registry.len(), 2);
}

#[test]
fn wired_program_runs() {
    let registry = registry();
    let program = Loader::load(
        &registry,
        &[
            BlockRecord::new("src", "bank").with("count", 1),
            BlockRecord::new("g", "gain")
                .with("in", "src.out0")
                .with("gain", 3)
                .with("label", "triple"),
        ],
    )
    .unwrap();
    assert_eq!(program.blocks().len(), 2);
    assert_eq!(program.register_count(), 2);

    let mut sched =
        Scheduler::new(program, SchedulerConfig::from_millis(10), SimulatedField::new()).unwrap();
    sched.step();
    assert_eq!(sched.program().register("g"), Some(0));
}

#[test]
fn unknown_block_type_is_fatal() {
    assert_eq!(
        load_error(&[BlockRecord::new("x", "nope")]),
        EngineError::UnknownBlockType {
            name: "nope".to_string()
        }
    );
}

#[test]
fn unknown_key_is_fatal() {
    let err = build_error(&[
        BlockRecord::new("src", "bank").with("count", 1),
        BlockRecord::new("g", "gain").with("in", "src.out0").with("offset", 4),
    ]);
    assert_eq!(
        err,
        BuildError::UnknownKey {
            key: "offset".to_string()
        }
    );
}

#[test]
fn malformed_number_is_fatal() {
    let err = build_error(&[BlockRecord::new("b", "bank").with("count", "3x")]);
    assert_eq!(
        err,
        BuildError::MalformedNumber {
            key: "count".to_string(),
            value: "3x".to_string()
        }
    );
}

#[test]
fn redefinition_is_fatal() {
    let err = build_error(&[
        BlockRecord::new("src", "bank").with("count", 1),
        BlockRecord::new("g", "gain")
            .with("in", "src.out0")
            .with("gain", 2)
            .with("gain", 3),
    ]);
    assert_eq!(err, BuildError::redefined("gain"));
}

#[test]
fn dynamic_cardinality_applies_once() {
    let err = build_error(&[BlockRecord::new("b", "bank")
        .with("count", 2)
        .with("count", 3)]);
    assert_eq!(
        err,
        BuildError::OutputsAlreadyDeclared {
            key: "count".to_string()
        }
    );

    let err = build_error(&[BlockRecord::new("b", "bank").with("count", 0)]);
    assert!(matches!(err, BuildError::InvalidValue { .. }));
}

#[test]
fn dynamic_outputs_are_referenceable_immediately() {
    let registry = registry();
    let program = Loader::load(
        &registry,
        &[
            BlockRecord::new("b", "bank").with("count", 3),
            BlockRecord::new("g", "gain").with("in", "b.out2"),
        ],
    )
    .unwrap();
    let b = program.blocks().iter().find(|b| b.name == "b").unwrap();
    assert_eq!(b.outputs.names(), ["out0", "out1", "out2"]);
    assert!(b.outputs.is_dynamic());

    let mut sched =
        Scheduler::new(program, SchedulerConfig::from_millis(10), SimulatedField::new()).unwrap();
    sched.step();
    assert_eq!(sched.program().register("b.out2"), Some(2));
    assert_eq!(sched.program().register("g.out"), Some(2));
}

#[test]
fn missing_required_input_fails_commit() {
    let err = build_error(&[BlockRecord::new("g", "gain").with("gain", 2)]);
    assert_eq!(err, BuildError::Missing { what: "input 'in'" });

    let err = build_error(&[BlockRecord::new("b", "bank")]);
    assert!(matches!(err, BuildError::Missing { .. }));
}

#[test]
fn references_must_name_earlier_outputs() {
    let err = build_error(&[
        BlockRecord::new("g", "gain").with("in", "later.out0"),
        BlockRecord::new("later", "bank").with("count", 1),
    ]);
    assert_eq!(
        err,
        BuildError::UnresolvedReference {
            key: "in".to_string(),
            reference: "later.out0".to_string()
        }
    );
}

#[test]
fn self_reference_reads_previous_tick() {
    let registry = registry();
    let program = Loader::load(
        &registry,
        &[
            BlockRecord::new("b", "bank").with("count", 1),
            BlockRecord::new("acc", "gain").with("in", "acc").with("gain", 2),
        ],
    )
    .unwrap();
    let mut sched =
        Scheduler::new(program, SchedulerConfig::from_millis(10), SimulatedField::new()).unwrap();
    sched.program_mut().force("acc", 1).unwrap();
    sched.step();
    sched.step();
    assert_eq!(sched.program().register("acc"), Some(4));
}

#[test]
fn wildcard_slot_takes_any_key_repeatedly() {
    let registry = registry();
    let program = Loader::load(
        &registry,
        &[
            BlockRecord::new("hold", "gain").with("in", "hold"),
            BlockRecord::new("sum", "bank")
                .with("x", "hold")
                .with("x", "hold.out")
                .with("whatever", "hold")
                .with("count", 1),
        ],
    )
    .unwrap();
    let mut sched =
        Scheduler::new(program, SchedulerConfig::from_millis(10), SimulatedField::new()).unwrap();
    sched.program_mut().force("hold", 5).unwrap();
    sched.step();
    assert_eq!(sched.program().register("sum.out0"), Some(15));
}

#[test]
fn duplicate_and_invalid_names_rejected() {
    assert_eq!(
        load_error(&[
            BlockRecord::new("b", "bank").with("count", 1),
            BlockRecord::new("b", "bank").with("count", 1),
        ]),
        EngineError::DuplicateBlock {
            name: "b".to_string()
        }
    );
    assert!(matches!(
        load_error(&[BlockRecord::new("a.b", "bank").with("count", 1)]),
        EngineError::InvalidBlockName { .. }
    ));
}

#[test]
fn multiple_key_validated() {
    let err = build_error(&[BlockRecord::new("b", "bank")
        .with("count", 1)
        .with("multiple", 0)]);
    assert!(matches!(err, BuildError::InvalidValue { .. }));

    let err = build_error(&[BlockRecord::new("b", "bank")
        .with("count", 1)
        .with("multiple", 2)
        .with("multiple", 2)]);
    assert_eq!(err, BuildError::redefined("multiple"));
}

#[test]
fn failed_load_cannot_be_finished() {
    let registry = registry();
    let mut loader = Loader::new(&registry);
    loader
        .declare(&BlockRecord::new("b", "bank").with("count", 1))
        .unwrap();
    assert!(loader.declare(&BlockRecord::new("x", "missing")).is_err());
    assert_eq!(
        loader.declare(&BlockRecord::new("c", "bank").with("count", 1)),
        Err(EngineError::LoadAborted)
    );
    assert_eq!(loader.finish().unwrap_err(), EngineError::LoadAborted);
}

#[test]
fn unknown_register_force_rejected() {
    let registry = registry();
    let mut program =
        Loader::load(&registry, &[BlockRecord::new("b", "bank").with("count", 1)]).unwrap();
    assert!(program.force("b.out7", 1).is_err());
    assert_eq!(program.register("nope"), None);
    assert_eq!(program.snapshot(), vec![("b.out0".to_string(), 0)]);
}
