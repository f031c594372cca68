//! Equipment cascade: stages identical units on and off one at a time.
//!
//! `outputs` sizes the unit bank (`out0..`). While `stage` alone is held the
//! stage timer counts ticks; reaching `stage_delay` switches on the idle
//! unit toggled least recently. `unstage` mirrors this for running units.
//! Holding both, or neither, resets both timers. `stop` drops every unit.

use tk_core::{from_bool, Word};
use tk_engine::{
    set_once, BlockIo, BlockKind, BuildCtx, BuildError, BuildResult, InputRef, OutputSet, RunOp,
    RunResult, Slot, Tick,
};

const ACTIVE: usize = 0;
const FIRST_UNIT: usize = 1;

#[derive(Debug, Clone, Copy)]
pub enum CascadeField {
    Stage,
    Unstage,
    Stop,
    Outputs,
    StageDelay,
    UnstageDelay,
}

#[derive(Default)]
pub struct CascadeBuilder {
    stage: Option<InputRef>,
    unstage: Option<InputRef>,
    stop: Option<InputRef>,
    stage_delay: Option<Word>,
    unstage_delay: Option<Word>,
}

impl BlockKind for CascadeBuilder {
    type Field = CascadeField;
    const NAME: &'static str = "cascade";
    const OUTPUTS: &'static [&'static str] = &["active"];
    const INPUTS: &'static [Slot<CascadeField>] = &[
        Slot::named("stage", CascadeField::Stage),
        Slot::named("unstage", CascadeField::Unstage),
        Slot::named("stop", CascadeField::Stop),
    ];
    const SETPOINTS: &'static [Slot<CascadeField>] = &[
        Slot::named("outputs", CascadeField::Outputs),
        Slot::named("stage_delay", CascadeField::StageDelay),
        Slot::named("unstage_delay", CascadeField::UnstageDelay),
    ];

    fn alloc() -> Self {
        Self::default()
    }

    fn input(&mut self, field: CascadeField, key: &str, reg: InputRef) -> BuildResult<()> {
        match field {
            CascadeField::Stage => set_once(&mut self.stage, key, reg),
            CascadeField::Unstage => set_once(&mut self.unstage, key, reg),
            _ => set_once(&mut self.stop, key, reg),
        }
    }

    fn setpoint(
        &mut self,
        field: CascadeField,
        key: &str,
        value: Word,
        ctx: &mut BuildCtx<'_>,
    ) -> BuildResult<()> {
        match field {
            CascadeField::Outputs => ctx.declare_outputs(key, value, "out"),
            _ if value < 1 => Err(BuildError::invalid(key, value, "delay must be at least 1 tick")),
            CascadeField::StageDelay => set_once(&mut self.stage_delay, key, value),
            _ => set_once(&mut self.unstage_delay, key, value),
        }
    }

    fn commit(self, outputs: &OutputSet) -> BuildResult<Box<dyn RunOp>> {
        if !outputs.is_dynamic() {
            return Err(BuildError::Missing {
                what: "setpoint 'outputs'",
            });
        }
        Ok(Box::new(Cascade {
            stage: self.stage,
            unstage: self.unstage,
            stop: self.stop,
            bank: Bank::new(
                outputs.len() - FIRST_UNIT,
                self.stage_delay.unwrap_or(1),
                self.unstage_delay.unwrap_or(1),
            ),
        }))
    }
}

/// Unit bank with wear-balancing selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    on: Vec<bool>,
    /// Invocation count at each unit's last toggle.
    toggled: Vec<u64>,
    stage_delay: Word,
    unstage_delay: Word,
    stage_timer: Word,
    unstage_timer: Word,
    ticks: u64,
}

impl Bank {
    pub fn new(units: usize, stage_delay: Word, unstage_delay: Word) -> Self {
        Self {
            on: vec![false; units],
            toggled: vec![0; units],
            stage_delay,
            unstage_delay,
            stage_timer: 0,
            unstage_timer: 0,
            ticks: 0,
        }
    }

    pub fn units(&self) -> &[bool] {
        &self.on
    }

    pub fn active(&self) -> usize {
        self.on.iter().filter(|on| **on).count()
    }

    /// Candidate in state `state` toggled least recently, lowest index first.
    fn pick(&self, state: bool) -> Option<usize> {
        (0..self.on.len())
            .filter(|&i| self.on[i] == state)
            .min_by_key(|&i| (self.toggled[i], i))
    }

    fn toggle(&mut self, unit: usize) {
        self.on[unit] = !self.on[unit];
        self.toggled[unit] = self.ticks;
    }

    pub fn step(&mut self, stage: bool, unstage: bool, stop: bool) {
        self.ticks += 1;
        if stop {
            for unit in 0..self.on.len() {
                if self.on[unit] {
                    self.toggle(unit);
                }
            }
            self.stage_timer = 0;
            self.unstage_timer = 0;
            return;
        }
        match (stage, unstage) {
            (true, false) => {
                self.unstage_timer = 0;
                self.stage_timer = (self.stage_timer + 1).min(self.stage_delay);
                if self.stage_timer >= self.stage_delay {
                    if let Some(unit) = self.pick(false) {
                        self.toggle(unit);
                        self.stage_timer = 0;
                    }
                }
            }
            (false, true) => {
                self.stage_timer = 0;
                self.unstage_timer = (self.unstage_timer + 1).min(self.unstage_delay);
                if self.unstage_timer >= self.unstage_delay {
                    if let Some(unit) = self.pick(true) {
                        self.toggle(unit);
                        self.unstage_timer = 0;
                    }
                }
            }
            _ => {
                self.stage_timer = 0;
                self.unstage_timer = 0;
            }
        }
    }
}

pub struct Cascade {
    stage: Option<InputRef>,
    unstage: Option<InputRef>,
    stop: Option<InputRef>,
    bank: Bank,
}

impl RunOp for Cascade {
    fn run(&mut self, io: &mut BlockIo<'_>, _tick: &Tick) -> RunResult<()> {
        let stage = io.get_or(self.stage, 0) != 0;
        let unstage = io.get_or(self.unstage, 0) != 0;
        let stop = io.get_or(self.stop, 0) != 0;
        self.bank.step(stage, unstage, stop);

        io.set(ACTIVE, self.bank.active() as Word);
        for (i, on) in self.bank.units().iter().enumerate() {
            io.set(FIRST_UNIT + i, from_bool(*on));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(bank: &Bank) -> Vec<u8> {
        bank.units().iter().map(|on| u8::from(*on)).collect()
    }

    #[test]
    fn stages_after_delay_in_index_order() {
        let mut bank = Bank::new(3, 2, 1);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [0, 0, 0]);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [1, 0, 0]);
        bank.step(true, false, false);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [1, 1, 0]);
        bank.step(true, false, false);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [1, 1, 1]);
        assert_eq!(bank.active(), 3);

        // nothing left to stage: the timer holds and nothing changes
        bank.step(true, false, false);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [1, 1, 1]);
    }

    #[test]
    fn first_on_is_first_off() {
        let mut bank = Bank::new(3, 1, 1);
        for _ in 0..3 {
            bank.step(true, false, false);
        }
        bank.step(false, true, false);
        assert_eq!(units(&bank), [0, 1, 1]);
        bank.step(false, true, false);
        assert_eq!(units(&bank), [0, 0, 1]);
    }

    #[test]
    fn round_robin_balances_wear() {
        let mut bank = Bank::new(3, 1, 1);
        let mut starts = [0u32; 3];
        for _ in 0..30 {
            let before = bank.units().to_vec();
            bank.step(true, false, false);
            for (i, (was, now)) in before.iter().zip(bank.units()).enumerate() {
                if !was && *now {
                    starts[i] += 1;
                }
            }
            bank.step(false, true, false);
        }
        // one unit runs at a time and each start goes to the unit idle longest
        assert_eq!(starts, [10, 10, 10]);
    }

    #[test]
    fn conflicting_requests_reset_timers() {
        let mut bank = Bank::new(2, 2, 2);
        bank.step(true, false, false);
        bank.step(true, true, false);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [0, 0]);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [1, 0]);

        bank.step(false, true, false);
        bank.step(false, false, false);
        bank.step(false, true, false);
        assert_eq!(units(&bank), [1, 0]);
    }

    #[test]
    fn stop_drops_everything() {
        let mut bank = Bank::new(2, 1, 1);
        bank.step(true, false, false);
        bank.step(true, false, false);
        assert_eq!(bank.active(), 2);
        bank.step(true, false, true);
        assert_eq!(units(&bank), [0, 0]);
        bank.step(true, false, false);
        assert_eq!(units(&bank), [1, 0]);
    }
}
