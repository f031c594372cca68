//! Block library for tickflow.
//!
//! Provides:
//! - Fixed-point fuzzy inference (Q16 height and mass functions)
//! - Field I/O points and operator variables
//! - Table converters (PT1000, saturated steam, horizontal tank)
//! - Discrete-position valve and equipment cascade
//! - Persisted event and heat counters
//! - Trigger, PD, weighted mean and logical gates
//!
//! [`builtin_registry`] registers every block kind under its configuration
//! name.

pub mod cascade;
pub mod convert;
pub mod counter;
pub mod field;
pub mod fuzzy;
pub mod inference;
pub mod logic;
pub mod persist;
pub mod signal;
pub mod valve;

use tk_engine::{EngineResult, Registry};

pub use cascade::{Bank, CascadeBuilder};
pub use convert::{GridTable, Lookup, HORIZONTAL_TANK, PT1000, STEAM};
pub use counter::{CounterBuilder, HeatCounterBuilder};
pub use fuzzy::{dh, dm, process_fuzzy, sh, then_d, zh, Clause, FuzzyResult, Height, Mass};
pub use persist::CounterState;
pub use valve::{Drive, Valve, ValveBuilder};

/// Registry holding every block kind of this crate.
pub fn builtin_registry() -> EngineResult<Registry> {
    let mut registry = Registry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

/// Add every block kind of this crate to `registry`.
pub fn register_builtins(registry: &mut Registry) -> EngineResult<()> {
    registry.register_kind::<field::AiBuilder>()?;
    registry.register_kind::<field::DiBuilder>()?;
    registry.register_kind::<field::AoBuilder>()?;
    registry.register_kind::<field::DoBuilder>()?;
    registry.register_kind::<field::VarBuilder>()?;

    registry.register_kind::<convert::Pt1000Builder>()?;
    registry.register_kind::<convert::SteamBuilder>()?;
    registry.register_kind::<convert::TankBuilder>()?;

    registry.register_kind::<ValveBuilder>()?;
    registry.register_kind::<CascadeBuilder>()?;
    registry.register_kind::<CounterBuilder>()?;
    registry.register_kind::<HeatCounterBuilder>()?;

    registry.register_kind::<signal::TriggerBuilder>()?;
    registry.register_kind::<signal::PdBuilder>()?;
    registry.register_kind::<signal::WsumBuilder>()?;

    registry.register_kind::<logic::GateBuilder<logic::And>>()?;
    registry.register_kind::<logic::GateBuilder<logic::Or>>()?;
    registry.register_kind::<logic::GateBuilder<logic::Xor>>()?;
    registry.register_kind::<logic::NotBuilder>()?;
    registry.register_kind::<logic::IfBuilder>()?;

    registry.register_kind::<inference::MembershipBuilder<inference::Triangle>>()?;
    registry.register_kind::<inference::MembershipBuilder<inference::Rising>>()?;
    registry.register_kind::<inference::MembershipBuilder<inference::Falling>>()?;
    registry.register_kind::<inference::ThenDBuilder>()?;
    registry.register_kind::<inference::FuzzyBuilder>()?;
    Ok(())
}
