//! tk-engine: block dataflow engine for tickflow.
//!
//! Provides:
//! - Register arena with single-writer output handles
//! - Block kinds with typed capability tables, and the type registry
//! - Loader driving the builder protocol (lookup, alloc, directives, commit)
//! - Wiring directory resolving `block.output` references once at load
//! - Fixed-tick scheduler
//! - Field I/O interface for hardware collaborators
//!
//! Blocks run strictly in declaration order, so a block reading another
//! block's output must be declared after it to see the value of the same
//! tick.

pub mod block;
pub mod error;
pub mod field;
pub mod loader;
pub mod register;
pub mod registry;
pub mod scheduler;
pub mod wiring;

// Re-exports for ergonomics
pub use block::{
    flag, positive, require, resolve_key, set_once, BlockIo, BlockKind, BuildCtx, OutputSet, RunOp, Slot,
    Table, Tick, Value,
};
pub use error::{BuildError, BuildResult, EngineError, EngineResult, RunError, RunResult};
pub use field::{ChannelAddr, FieldError, FieldIo, SimulatedField};
pub use loader::{BlockInstance, BlockRecord, Directive, Loader, Program, MULTIPLE_KEY};
pub use register::{InputRef, OutputRef, RegisterArena};
pub use registry::{BlockType, Registry};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState};
pub use wiring::OutputDirectory;
