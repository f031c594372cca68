//! Register arena.
//!
//! Every signal exchanged between blocks lives in one flat arena of words.
//! A register is written through exactly one [`OutputRef`], which is handed
//! to the block that allocated it and cannot be copied. Readers hold
//! [`InputRef`]s, which can only be minted for registers that already exist.
//! Once loading finishes the arena is frozen and never grows again.

use tk_core::{RegisterId, Word};

use crate::error::{EngineError, EngineResult};

/// Read handle to a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRef(RegisterId);

impl InputRef {
    pub fn id(self) -> RegisterId {
        self.0
    }
}

/// Exclusive write handle to a register.
#[derive(Debug, PartialEq, Eq)]
pub struct OutputRef(RegisterId);

impl OutputRef {
    pub fn id(&self) -> RegisterId {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RegisterArena {
    cells: Vec<Word>,
    frozen: bool,
}

impl RegisterArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed register.
    pub fn alloc(&mut self) -> EngineResult<OutputRef> {
        if self.frozen {
            return Err(EngineError::ArenaFrozen);
        }
        let id = RegisterId::from_usize(self.cells.len());
        self.cells.push(0);
        Ok(OutputRef(id))
    }

    /// Mint a read handle; `None` if the register does not exist yet.
    pub fn reader(&self, id: RegisterId) -> Option<InputRef> {
        (id.slot() < self.cells.len()).then_some(InputRef(id))
    }

    #[inline]
    pub fn get(&self, input: InputRef) -> Word {
        self.cells[input.0.slot()]
    }

    #[inline]
    pub fn read(&self, output: &OutputRef) -> Word {
        self.cells[output.0.slot()]
    }

    #[inline]
    pub fn set(&mut self, output: &OutputRef, value: Word) {
        self.cells[output.0.slot()] = value;
    }

    pub fn peek(&self, id: RegisterId) -> Option<Word> {
        self.cells.get(id.slot()).copied()
    }

    /// Overwrite a register from outside the sweep.
    pub fn force(&mut self, id: RegisterId, value: Word) -> bool {
        match self.cells.get_mut(id.slot()) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}
