//! Fuzzy blocks: membership heights, the `then_d` consequent and the
//! rule-table `fuzzy` controller.

use std::marker::PhantomData;

use tk_core::{parse_word, Word};
use tk_engine::{
    require, set_once, BlockIo, BlockKind, BuildCtx, BuildError, BuildResult, InputRef, OutputSet,
    RunOp, RunResult, Slot, Tick,
};

use crate::fuzzy::{process_fuzzy, then_d, Clause, Height, Mass};

#[derive(Debug, Clone, Copy)]
pub enum ShapeField {
    In,
    A,
    B,
    C,
}

const SHAPE_INPUTS: &[Slot<ShapeField>] = &[Slot::named("in", ShapeField::In)];
const SHAPE_SETPOINTS: &[Slot<ShapeField>] = &[
    Slot::named("a", ShapeField::A),
    Slot::named("b", ShapeField::B),
    Slot::named("c", ShapeField::C),
];

/// Input plus three breakpoints, shared by the shape kinds.
#[derive(Default)]
pub struct ShapeBuilder {
    input: Option<InputRef>,
    points: [Option<Word>; 3],
}

impl ShapeBuilder {
    fn setpoint(&mut self, field: ShapeField, key: &str, value: Word) -> BuildResult<()> {
        let slot = match field {
            ShapeField::A => 0,
            ShapeField::B => 1,
            _ => 2,
        };
        set_once(&mut self.points[slot], key, value)
    }

    fn finish(&self) -> BuildResult<(InputRef, [Word; 3])> {
        let input = require(self.input, "input 'in'")?;
        let a = require(self.points[0], "setpoint 'a'")?;
        let b = require(self.points[1], "setpoint 'b'")?;
        let c = require(self.points[2], "setpoint 'c'")?;
        Ok((input, check_order([a, b, c])?))
    }
}

fn check_order(points: [Word; 3]) -> BuildResult<[Word; 3]> {
    let [a, b, c] = points;
    if a <= b && b <= c {
        Ok(points)
    } else {
        Err(BuildError::OutOfOrder {
            what: format!("{a} {b} {c}"),
        })
    }
}

/// Membership shape of a `fuzzy_*` kind.
pub trait Shape: 'static {
    const NAME: &'static str;
    const HEIGHT: Height;
}

pub struct Triangle;
pub struct Rising;
pub struct Falling;

impl Shape for Triangle {
    const NAME: &'static str = "fuzzy_d";
    const HEIGHT: Height = Height::D;
}

impl Shape for Rising {
    const NAME: &'static str = "fuzzy_s";
    const HEIGHT: Height = Height::S;
}

impl Shape for Falling {
    const NAME: &'static str = "fuzzy_z";
    const HEIGHT: Height = Height::Z;
}

pub struct MembershipBuilder<S> {
    shape: ShapeBuilder,
    kind: PhantomData<S>,
}

impl<S: Shape> BlockKind for MembershipBuilder<S> {
    type Field = ShapeField;
    const NAME: &'static str = S::NAME;
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<ShapeField>] = SHAPE_INPUTS;
    const SETPOINTS: &'static [Slot<ShapeField>] = SHAPE_SETPOINTS;

    fn alloc() -> Self {
        Self {
            shape: ShapeBuilder::default(),
            kind: PhantomData,
        }
    }

    fn input(&mut self, _field: ShapeField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.shape.input, key, reg)
    }

    fn setpoint(
        &mut self,
        field: ShapeField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        self.shape.setpoint(field, key, value)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        let (input, points) = self.shape.finish()?;
        Ok(Box::new(Membership {
            input,
            points,
            height: S::HEIGHT,
        }))
    }
}

pub struct Membership {
    input: InputRef,
    points: [Word; 3],
    height: Height,
}

impl RunOp for Membership {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let h = self.height.eval(self.points, io.get(self.input));
        io.set(0, h);
        Ok(())
    }
}

#[derive(Default)]
pub struct ThenDBuilder(ShapeBuilder);

impl BlockKind for ThenDBuilder {
    type Field = ShapeField;
    const NAME: &'static str = "then_d";
    const OUTPUTS: &'static [&'static str] = &["value", "weight"];
    const INPUTS: &'static [Slot<ShapeField>] = SHAPE_INPUTS;
    const SETPOINTS: &'static [Slot<ShapeField>] = SHAPE_SETPOINTS;

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: ShapeField, key: &str, reg: InputRef) -> BuildResult<()> {
        set_once(&mut self.0.input, key, reg)
    }

    fn setpoint(
        &mut self,
        field: ShapeField,
        key: &str,
        value: Word,
        _ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        self.0.setpoint(field, key, value)
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        let (input, points) = self.0.finish()?;
        Ok(Box::new(ThenD { input, points }))
    }
}

pub struct ThenD {
    input: InputRef,
    points: [Word; 3],
}

impl RunOp for ThenD {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let [a, b, c] = self.points;
        let (value, weight) = then_d(a, b, c, io.get(self.input));
        io.set(0, value);
        io.set(1, weight);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RuleField {
    Var,
    Rule,
}

/// A rule as written, variable still by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleText {
    pub var: String,
    pub height: Height,
    pub when: [Word; 3],
    pub mass: Mass,
    pub then: [Word; 3],
}

/// Parse `"<var> <D|S|Z> a b c D a b c"`.
pub fn parse_rule(key: &str, text: &str) -> BuildResult<RuleText> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let &[var, height, wa, wb, wc, mass, ta, tb, tc] = tokens.as_slice() else {
        return Err(BuildError::invalid(
            key,
            text,
            "expected '<var> <D|S|Z> a b c D a b c'",
        ));
    };
    let number = |t: &str| {
        parse_word(t).ok_or_else(|| BuildError::MalformedNumber {
            key: key.to_string(),
            value: t.to_string(),
        })
    };
    Ok(RuleText {
        var: var.to_string(),
        height: Height::parse(height)
            .ok_or_else(|| BuildError::invalid(key, height, "height must be D, S or Z"))?,
        when: check_order([number(wa)?, number(wb)?, number(wc)?])?,
        mass: Mass::parse(mass).ok_or_else(|| BuildError::invalid(key, mass, "mass must be D"))?,
        then: check_order([number(ta)?, number(tb)?, number(tc)?])?,
    })
}

#[derive(Default)]
pub struct FuzzyBuilder {
    vars: Vec<(String, InputRef)>,
    rules: Vec<RuleText>,
}

impl BlockKind for FuzzyBuilder {
    type Field = RuleField;
    const NAME: &'static str = "fuzzy";
    const OUTPUTS: &'static [&'static str] = &["out"];
    const INPUTS: &'static [Slot<RuleField>] = &[Slot::variadic(RuleField::Var)];
    const STRINGS: &'static [Slot<RuleField>] = &[Slot::named("rule", RuleField::Rule)];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, _field: RuleField, key: &str, reg: InputRef) -> BuildResult<()> {
        if self.vars.iter().any(|(name, _)| name == key) {
            return Err(BuildError::redefined(key));
        }
        self.vars.push((key.to_string(), reg));
        Ok(())
    }

    fn string(&mut self, _field: RuleField, key: &str, value: &str) -> BuildResult<()> {
        self.rules.push(parse_rule(key, value)?);
        Ok(())
    }

    fn commit(self, _outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        if self.rules.is_empty() {
            return Err(BuildError::Missing { what: "string 'rule'" });
        }
        let clauses = self
            .rules
            .into_iter()
            .map(|rule| {
                let var = self
                    .vars
                    .iter()
                    .position(|(name, _)| *name == rule.var)
                    .ok_or_else(|| BuildError::invalid("rule", &rule.var, "unknown variable"))?;
                Ok(Clause {
                    var,
                    height: rule.height,
                    when: rule.when,
                    mass: rule.mass,
                    then: rule.then,
                })
            })
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(Box::new(Fuzzy {
            inputs: self.vars.into_iter().map(|(_, reg)| reg).collect(),
            clauses,
            values: Vec::new(),
        }))
    }
}

pub struct Fuzzy {
    inputs: Vec<InputRef>,
    clauses: Vec<Clause>,
    values: Vec<Word>,
}

impl RunOp for Fuzzy {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        self.values.clear();
        self.values.extend(self.inputs.iter().map(|i| io.get(*i)));
        io.set(0, process_fuzzy(&self.clauses, &self.values));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rule_text() {
        let rule = parse_rule("rule", "temp Z -50 -50 -30 D 0 500 1000").unwrap();
        assert_eq!(
            rule,
            RuleText {
                var: "temp".to_string(),
                height: Height::Z,
                when: [-50, -50, -30],
                mass: Mass::D,
                then: [0, 500, 1000],
            }
        );
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(matches!(
            parse_rule("rule", "temp Z -50 -50"),
            Err(BuildError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_rule("rule", "temp Q 0 1 2 D 0 1 2"),
            Err(BuildError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_rule("rule", "temp D 0 x 2 D 0 1 2"),
            Err(BuildError::MalformedNumber { .. })
        ));
        assert!(matches!(
            parse_rule("rule", "temp D 0 1 2 D 5 1 2"),
            Err(BuildError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn shape_breakpoints_must_be_ordered() {
        let mut shape = ShapeBuilder::default();
        shape.setpoint(ShapeField::A, "a", 10).unwrap();
        shape.setpoint(ShapeField::B, "b", 5).unwrap();
        shape.setpoint(ShapeField::C, "c", 20).unwrap();
        assert_eq!(
            shape.setpoint(ShapeField::C, "c", 30),
            Err(BuildError::redefined("c"))
        );
        assert_eq!(
            check_order([10, 5, 20]).unwrap_err(),
            BuildError::OutOfOrder {
                what: "10 5 20".to_string()
            }
        );
    }
}
