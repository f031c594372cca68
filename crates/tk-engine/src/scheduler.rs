//! Fixed-tick scheduler.
//!
//! Runs every committed block once per tick in declaration order. The next
//! wake time is the previous scheduled wake plus one period; a sweep that
//! overruns is logged and the schedule restarts from "now", so missed ticks
//! are never made up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tk_core::{SweepStats, SweepTimer, Word};
use tracing::{debug, info, warn};

use crate::block::{BlockIo, Tick};
use crate::error::{EngineError, EngineResult};
use crate::field::FieldIo;
use crate::loader::{BlockInstance, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Options for the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Nominal tick period.
    pub period: Duration,
    /// Global multiplier applied to the elapsed time every block sees.
    pub multiple: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            multiple: 1,
        }
    }
}

impl SchedulerConfig {
    pub fn from_millis(period_ms: u64) -> Self {
        Self {
            period: Duration::from_millis(period_ms),
            ..Self::default()
        }
    }

    fn validate(&self) -> EngineResult<()> {
        if self.period.as_millis() == 0 {
            return Err(EngineError::InvalidSchedule {
                what: "tick period must be at least 1 ms",
            });
        }
        if self.multiple == 0 {
            return Err(EngineError::InvalidSchedule {
                what: "multiple must be positive",
            });
        }
        Ok(())
    }
}

pub struct Scheduler<F: FieldIo> {
    program: Program,
    config: SchedulerConfig,
    field: F,
    state: SchedulerState,
    tick: u64,
    stats: SweepStats,
}

impl<F: FieldIo> Scheduler<F> {
    pub fn new(
        program: Program,
        config: SchedulerConfig,
        field: F,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            program,
            config,
            field,
            state: SchedulerState::Idle,
            tick: 0,
            stats: SweepStats::new(),
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of sweeps executed so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut F {
        &mut self.field
    }

    /// Tear down and return the program and field.
    pub fn into_parts(self) -> (Program, F) {
        (self.program, self.field)
    }

    pub fn set_multiple(&mut self, multiple: u32) -> EngineResult<()> {
        let config = SchedulerConfig {
            multiple,
            ..self.config
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Run one sweep over all blocks due this tick.
    pub fn step(&mut self) {
        let period_ms = Word::try_from(self.config.period.as_millis()).unwrap_or(Word::MAX);
        let base_ms = period_ms.saturating_mul(Word::from(self.config.multiple));
        let index = self.tick;
        let Program { arena, blocks, .. } = &mut self.program;

        for block in blocks.iter_mut() {
            let BlockInstance {
                name,
                kind,
                multiple,
                outputs,
                op,
                ..
            } = block;
            if index % u64::from(*multiple) != 0 {
                continue;
            }
            let tick = Tick {
                index,
                elapsed_ms: base_ms.saturating_mul(Word::from(*multiple)),
            };
            let mut io = BlockIo::new(arena, outputs.regs(), &mut self.field);
            if let Err(err) = op.run(&mut io, &tick) {
                warn!(block = %name, kind = *kind, tick = index, error = %err, "block run failed");
            }
        }
        self.tick += 1;
    }

    /// Run until `stop` is raised.
    pub fn run(&mut self, stop: &AtomicBool) {
        self.run_for(None, stop);
    }

    /// Run until `stop` is raised or `limit` sweeps have executed.
    pub fn run_for(&mut self, limit: Option<u64>, stop: &AtomicBool) {
        if self.state == SchedulerState::Stopped {
            warn!("scheduler already stopped");
            return;
        }
        self.state = SchedulerState::Running;
        info!(
            period_ms = self.config.period.as_millis() as u64,
            blocks = self.program.blocks.len(),
            "scheduler running"
        );

        let mut wake = Instant::now();
        let mut done = 0_u64;
        while !stop.load(Ordering::Relaxed) && limit.map_or(true, |l| done < l) {
            let timer = SweepTimer::start();
            self.step();
            self.stats.record(timer.stop());
            done += 1;

            wake += self.config.period;
            let now = Instant::now();
            if now > wake {
                self.stats.record_overrun();
                warn!(
                    tick = self.tick,
                    late_ms = (now - wake).as_millis() as u64,
                    "sweep overran tick period"
                );
                wake = now;
            } else {
                thread::sleep(wake - now);
            }
        }

        self.state = SchedulerState::Stopped;
        debug!(sweeps = self.stats.sweeps, overruns = self.stats.overruns, "sweep statistics");
        info!(ticks = self.tick, "scheduler stopped");
    }
}
