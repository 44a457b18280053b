use crate::memory::{Byte, Word};

/// Register ids used by the engine itself.
pub type RegId = Byte;

pub const R1: RegId = 0x01;
pub const R2: RegId = 0x02;
pub const R3: RegId = 0x03;
/// Stack pointer.
pub const SP: RegId = 0x19;
/// Program counter.
pub const PC: RegId = 0x1a;
/// Scratch pointer; the BIOS uses it as the pending-key register.
pub const PTR: RegId = 0x1b;
/// Link register by toolchain convention.
pub const RE1: RegId = 0x1c;

/// A single register slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub id: RegId,
    pub name: &'static str,
    pub value: Word,
}

const fn slot(id: RegId, name: &'static str) -> Register {
    Register { id, name, value: 0 }
}

/// The register file: 29 slots, addressed by id only.
///
/// Unknown ids are tolerated on purpose: reads return 0 and writes are
/// dropped, so a garbage operand byte degrades gracefully instead of
/// crashing the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    slots: [Register; 29],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            slots: [
                slot(0x00, "R0"),
                slot(0x01, "R1"),
                slot(0x02, "R2"),
                slot(0x03, "R3"),
                slot(0x04, "R4"),
                slot(0x05, "R5"),
                slot(0x06, "R6"),
                slot(0x07, "R7"),
                slot(0x08, "R8"),
                slot(0x09, "R9"),
                slot(0x0a, "R10"),
                slot(0x0b, "R11"),
                slot(0x0c, "R12"),
                slot(0x0d, "T1"),
                slot(0x0e, "T2"),
                slot(0x0f, "T3"),
                slot(0x10, "T4"),
                slot(0x11, "T5"),
                slot(0x12, "T6"),
                slot(0x13, "T7"),
                slot(0x14, "T8"),
                slot(0x15, "T9"),
                slot(0x16, "T10"),
                slot(0x17, "T11"),
                slot(0x18, "T12"),
                slot(0x19, "SP"),
                slot(0x1a, "PC"),
                slot(0x1b, "PTR"),
                slot(0x1c, "RE1"),
            ],
        }
    }
}

impl RegisterFile {
    /// Reads a register. Unknown ids read as 0.
    pub fn get(&self, id: RegId) -> Word {
        self.slots
            .iter()
            .find(|register| register.id == id)
            .map(|register| register.value)
            .unwrap_or(0)
    }

    /// Writes a register, masking the value to the active width.
    /// Unknown ids are ignored.
    pub fn set(&mut self, id: RegId, value: Word, extended: bool) {
        let value = if extended { value } else { value & 0xFFFF };
        if let Some(register) = self.slots.iter_mut().find(|register| register.id == id) {
            register.value = value;
        }
    }

    pub fn name(&self, id: RegId) -> &'static str {
        self.slots
            .iter()
            .find(|register| register.id == id)
            .map(|register| register.name)
            .unwrap_or("??")
    }
}
