use std::convert::TryFrom;
use std::fmt;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use log::*;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

use crate::bios::{Bios, INT_FAULT};
use crate::memory::{Memory, Word};
use crate::registers::{RegId, RegisterFile, PC, R1, SP};

/// Default clock frequency in hertz.
pub const DEFAULT_CLOCK_HZ: u32 = 1_158_000;

/// Emulates the CPU.
///
/// Owns the register file and the mode/termination flags; memory and the
/// BIOS are passed into every step so the single execute loop stays the
/// only writer of machine state.
pub struct Processor {
    pub regs: RegisterFile,
    /// Extended (32-bit) addressing mode. Toggled only by `SET`,
    /// re-read on every decode.
    pub extended: bool,
    /// Termination flag. Set when the program ends.
    pub t: bool,
    /// Absorbing halt state entered by `HLT`. There is no resume.
    pub halted: bool,
    /// Resume past illegal instructions instead of faulting.
    pub debug: bool,
    /// Clock frequency used by the stall model.
    pub clock_hz: u32,
}

impl Default for Processor {
    fn default() -> Self {
        Self {
            regs: RegisterFile::default(),
            extended: false,
            t: false,
            halted: false,
            debug: false,
            clock_hz: DEFAULT_CLOCK_HZ,
        }
    }
}

impl Processor {
    /// Active word size in bytes: immediates, addresses and stack slots.
    pub fn word_size(&self) -> usize {
        if self.extended {
            4
        } else {
            2
        }
    }

    fn get(&self, id: RegId) -> Word {
        self.regs.get(id)
    }

    fn set(&mut self, id: RegId, value: Word) {
        let extended = self.extended;
        self.regs.set(id, value, extended);
    }

    /// Pushes `value` onto the stack: SP moves down one word, then the
    /// value is written at the mapped SP address.
    pub fn push<const S: usize>(&mut self, memory: &mut Memory<S>, value: Word) {
        let width = self.word_size();
        let sp = self.get(SP).wrapping_sub(width as Word);
        memory.write_word(sp, value, width);
        self.set(SP, sp);
    }

    /// Pops the word at the mapped SP address, then SP moves up one word.
    pub fn pop<const S: usize>(&mut self, memory: &mut Memory<S>) -> Word {
        let width = self.word_size();
        let sp = self.get(SP);
        let value = memory.read_word(sp, width);
        self.set(SP, sp.wrapping_add(width as Word));
        value
    }

    /// Executes a single decoded instruction. Every arm computes the next
    /// PC itself; nothing auto-increments.
    pub fn execute_instruction<const S: usize>(
        &mut self,
        opcode: Opcode,
        memory: &mut Memory<S>,
        bios: &mut Bios,
    ) -> Result<()> {
        let pc = self.get(PC);
        let width = self.word_size() as Word;

        match opcode {
            Opcode::END => {
                self.t = true;
                self.set(PC, pc.wrapping_add(1));

                debug!("END");
            }
            Opcode::MOV => {
                let mode = memory.read_byte(pc.wrapping_add(1));
                let dst = memory.read_byte(pc.wrapping_add(2));

                match mode {
                    0x01 => {
                        let imm = memory.read_word(pc.wrapping_add(3), self.word_size());
                        self.set(dst, imm);
                        self.set(PC, pc.wrapping_add(3 + width));

                        debug!("MOV {} {}", self.regs.name(dst), imm);
                    }
                    0x02 => {
                        let src = memory.read_byte(pc.wrapping_add(3));
                        self.set(dst, self.get(src));
                        self.set(PC, pc.wrapping_add(4));

                        debug!("MOV {} {}", self.regs.name(dst), self.regs.name(src));
                    }
                    _ => {
                        warn!("MOV: unknown mode 0x{:02x}", mode);
                        self.set(PC, pc.wrapping_add(1));
                    }
                }
            }
            Opcode::HLT => {
                self.halted = true;

                debug!("HLT");
            }
            Opcode::JMP => {
                let mode = memory.read_byte(pc.wrapping_add(1));

                let target = if mode == 0x02 {
                    self.get(memory.read_byte(pc.wrapping_add(2)))
                } else {
                    memory.read_word(pc.wrapping_add(2), self.word_size())
                };
                self.set(PC, target);

                debug!("JMP 0x{:04x}", target);
            }
            Opcode::INT => {
                let code = memory.read_word(pc.wrapping_add(1), self.word_size());
                let extended = self.extended;
                bios.interrupt(code, &mut self.regs, extended, S);
                self.set(PC, pc.wrapping_add(1 + width));

                debug!("INT 0x{:02x}", code);
            }
            Opcode::JNZ => {
                let (target, fallthrough) = self.decode_branch(pc, memory);
                let cond = memory.read_byte(pc.wrapping_add(2));

                if self.get(cond) != 0 {
                    self.set(PC, target);
                } else {
                    self.set(PC, fallthrough);
                }

                debug!("JNZ {} 0x{:04x}", self.regs.name(cond), target);
            }
            Opcode::NOP => {
                self.set(PC, pc.wrapping_add(1));

                debug!("NOP");
            }
            Opcode::CMP => {
                self.binary_op(pc, memory, "CMP", |a, b| (a == b) as Word);
            }
            Opcode::JZ => {
                let (target, fallthrough) = self.decode_branch(pc, memory);
                let cond = memory.read_byte(pc.wrapping_add(2));

                if self.get(cond) == 0 {
                    self.set(PC, target);
                } else {
                    self.set(PC, fallthrough);
                }

                debug!("JZ {} 0x{:04x}", self.regs.name(cond), target);
            }
            Opcode::INC => {
                let reg = memory.read_byte(pc.wrapping_add(1));
                self.set(reg, self.get(reg).wrapping_add(1));
                self.set(PC, pc.wrapping_add(2));

                debug!("INC {}", self.regs.name(reg));
            }
            Opcode::DEC => {
                let reg = memory.read_byte(pc.wrapping_add(1));
                self.set(reg, self.get(reg).wrapping_sub(1));
                self.set(PC, pc.wrapping_add(2));

                debug!("DEC {}", self.regs.name(reg));
            }
            Opcode::PUSH => {
                let mode = memory.read_byte(pc.wrapping_add(1));

                let value = if mode == 0x02 {
                    self.set(PC, pc.wrapping_add(3));
                    self.get(memory.read_byte(pc.wrapping_add(2)))
                } else {
                    self.set(PC, pc.wrapping_add(2 + width));
                    memory.read_word(pc.wrapping_add(2), self.word_size())
                };
                self.push(memory, value);

                debug!("PUSH {}", value);
            }
            Opcode::POP => {
                let reg = memory.read_byte(pc.wrapping_add(1));
                let value = self.pop(memory);
                self.set(reg, value);
                self.set(PC, pc.wrapping_add(2));

                debug!("POP {}: {}", self.regs.name(reg), value);
            }
            Opcode::ADD => {
                self.binary_op(pc, memory, "ADD", |a, b| a.wrapping_add(b));
            }
            Opcode::SUB => {
                self.binary_op(pc, memory, "SUB", |a, b| a.wrapping_sub(b));
            }
            Opcode::MUL => {
                self.binary_op(pc, memory, "MUL", |a, b| a.wrapping_mul(b));
            }
            Opcode::DIV => {
                // Division by zero yields 0.
                self.binary_op(pc, memory, "DIV", |a, b| {
                    if b == 0 {
                        warn!("DIV: division by zero");
                        0
                    } else {
                        a / b
                    }
                });
            }
            Opcode::IGT => {
                self.binary_op(pc, memory, "IGT", |a, b| (a > b) as Word);
            }
            Opcode::ILT => {
                self.binary_op(pc, memory, "ILT", |a, b| (a < b) as Word);
            }
            Opcode::AND => {
                self.binary_op(pc, memory, "AND", |a, b| a & b);
            }
            Opcode::OR => {
                self.binary_op(pc, memory, "OR", |a, b| a | b);
            }
            Opcode::NOR => {
                self.binary_op(pc, memory, "NOR", |a, b| !(a | b));
            }
            Opcode::NOT => {
                let dst = memory.read_byte(pc.wrapping_add(1));
                let a = memory.read_byte(pc.wrapping_add(2));
                self.set(dst, !self.get(a));
                self.set(PC, pc.wrapping_add(3));

                debug!("NOT {} {}", self.regs.name(dst), self.regs.name(a));
            }
            Opcode::XOR => {
                self.binary_op(pc, memory, "XOR", |a, b| a ^ b);
            }
            Opcode::LOD => {
                let addr_reg = memory.read_byte(pc.wrapping_add(1));
                let dst = memory.read_byte(pc.wrapping_add(2));
                let value = memory.read_byte(self.get(addr_reg)) as Word;
                self.set(dst, value);
                self.set(PC, pc.wrapping_add(3));

                debug!("LOD {} {}: {}", self.regs.name(addr_reg), self.regs.name(dst), value);
            }
            Opcode::STR => {
                let addr_reg = memory.read_byte(pc.wrapping_add(1));
                let src = memory.read_byte(pc.wrapping_add(2));
                memory.write_word(self.get(addr_reg), self.get(src), self.word_size());
                self.set(PC, pc.wrapping_add(3));

                debug!("STR {} {}", self.regs.name(addr_reg), self.regs.name(src));
            }
            Opcode::LODW => {
                let addr_reg = memory.read_byte(pc.wrapping_add(1));
                let dst = memory.read_byte(pc.wrapping_add(2));
                let value = memory.read_word(self.get(addr_reg), self.word_size());
                self.set(dst, value);
                self.set(PC, pc.wrapping_add(3));

                debug!("LODW {} {}: {}", self.regs.name(addr_reg), self.regs.name(dst), value);
            }
            Opcode::SET => {
                let mode = memory.read_byte(pc.wrapping_add(1));
                self.extended = mode == 1;
                self.set(PC, pc.wrapping_add(2));

                debug!("SET {}", mode);
            }
        }

        Ok(())
    }

    /// Decodes the `mode, cond, target` layout shared by JNZ and JZ,
    /// returning the branch target and the fall-through address.
    fn decode_branch<const S: usize>(&self, pc: Word, memory: &Memory<S>) -> (Word, Word) {
        let mode = memory.read_byte(pc.wrapping_add(1));

        if mode == 0x02 {
            (
                self.get(memory.read_byte(pc.wrapping_add(3))),
                pc.wrapping_add(4),
            )
        } else {
            (
                memory.read_word(pc.wrapping_add(3), self.word_size()),
                pc.wrapping_add(3 + self.word_size() as Word),
            )
        }
    }

    /// Decodes the `dst, a, b` layout shared by the ALU instructions and
    /// applies `op` to the two source registers.
    fn binary_op<const S: usize>(
        &mut self,
        pc: Word,
        memory: &Memory<S>,
        name: &str,
        op: impl FnOnce(Word, Word) -> Word,
    ) {
        let dst = memory.read_byte(pc.wrapping_add(1));
        let a = memory.read_byte(pc.wrapping_add(2));
        let b = memory.read_byte(pc.wrapping_add(3));

        let result = op(self.get(a), self.get(b));
        self.set(dst, result);
        self.set(PC, pc.wrapping_add(4));

        debug!(
            "{} {} {} {}: {}",
            name,
            self.regs.name(dst),
            self.regs.name(a),
            self.regs.name(b),
            result
        );
    }

    /// Runs one iteration of the fetch-decode-execute loop.
    ///
    /// PC at address 0 is the boot indirection: the code-section pointer
    /// stored there is loaded instead of fetching an opcode. An unknown
    /// opcode reports through BIOS interrupt 0x07 and is fatal unless
    /// debug mode is on.
    pub fn step<const S: usize>(&mut self, memory: &mut Memory<S>, bios: &mut Bios) -> Result<()> {
        if self.halted {
            // Absorbing state; the engine idles until externally stopped.
            thread::sleep(Duration::from_secs(1));
            return Ok(());
        }

        let pc = self.get(PC);
        if pc == 0 {
            let entry = memory.read_word(0, self.word_size());
            self.set(PC, entry);
            debug!("boot: code section at 0x{:04x}", entry);
            return Ok(());
        }

        let byte = memory.read_byte(pc);
        match Opcode::try_from(byte) {
            Ok(opcode) => {
                self.execute_instruction(opcode, memory, bios)?;
                self.stall(opcode.cycles());
                Ok(())
            }
            Err(_) => {
                self.set(R1, byte as Word);
                let extended = self.extended;
                bios.interrupt(INT_FAULT, &mut self.regs, extended, S);
                bios.fault_alert();

                if self.debug {
                    warn!("resuming past illegal opcode 0x{:02x}", byte);
                    self.set(PC, pc.wrapping_add(1));
                    Ok(())
                } else {
                    self.t = true;
                    Err(eyre!(
                        "illegal instruction 0x{:02x} at location 0x{:04x}",
                        byte,
                        pc
                    ))
                }
            }
        }
    }

    /// Runs the loop until the program ends.
    pub fn run<const S: usize>(&mut self, memory: &mut Memory<S>, bios: &mut Bios) -> Result<()> {
        while !self.t {
            self.step(memory, bios)?;
        }

        info!("Program terminated.");
        Ok(())
    }

    /// Sleeps for the wall-clock cost of `cycles` at the configured
    /// clock frequency. Pacing, not optimization: timing observed by the
    /// program stays reproducible across hosts.
    fn stall(&self, cycles: u64) {
        thread::sleep(Duration::from_secs_f64(
            cycles as f64 / self.clock_hz as f64,
        ));
    }
}

macro_rules! opcodes {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal / $cycles:literal , )+ ) => {
        /// The instruction set. The discriminant is the opcode byte at
        /// the head of each instruction encoding.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Opcode {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Opcode {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            /// Stall cost in clock cycles.
            pub fn cycles(&self) -> u64 {
                match self {
                    $( Self::$name => $cycles , )+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }
        }

        impl fmt::Display for Opcode {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

opcodes! {
    /// Program end; the loop returns cleanly
    END = 0x00 / 1,
    /// Move an immediate (mode 01) or register value (mode 02) into a register
    MOV = 0x01 / 4,
    /// Enter the absorbing halt state
    HLT = 0x02 / 1,
    /// Jump to an absolute address (mode 01) or a register target (mode 02)
    JMP = 0x03 / 8,
    /// Invoke a BIOS interrupt
    INT = 0x04 / 34,
    /// Jump if the condition register is not zero
    JNZ = 0x05 / 8,
    /// No operation
    NOP = 0x06 / 1,
    /// dst := 1 if the two source registers are equal
    CMP = 0x07 / 7,
    /// Jump if the condition register is zero
    JZ = 0x08 / 8,
    /// Increment a register
    INC = 0x09 / 4,
    /// Decrement a register
    DEC = 0x0a / 4,
    /// Push an immediate (mode 01) or register value (mode 02)
    PUSH = 0x0b / 100,
    /// Pop the top of the stack into a register
    POP = 0x0c / 100,
    /// dst := a + b (wrapping)
    ADD = 0x0d / 7,
    /// dst := a - b (wrapping)
    SUB = 0x0e / 7,
    /// dst := a * b (wrapping)
    MUL = 0x0f / 70,
    /// dst := a / b; division by zero yields 0
    DIV = 0x10 / 140,
    /// dst := 1 if a > b
    IGT = 0x11 / 7,
    /// dst := 1 if a < b
    ILT = 0x12 / 7,
    /// dst := a & b
    AND = 0x13 / 7,
    /// dst := a | b
    OR = 0x14 / 7,
    /// dst := ~(a | b)
    NOR = 0x15 / 7,
    /// dst := ~a
    NOT = 0x16 / 7,
    /// dst := a ^ b
    XOR = 0x17 / 7,
    /// dst := byte at the address held in the first operand register
    LOD = 0x18 / 100,
    /// Store the source register's word at the address held in the first operand register
    STR = 0x19 / 100,
    /// dst := word at the address held in the first operand register
    LODW = 0x1a / 100,
    /// Switch addressing mode: 0 compact (16-bit), 1 extended (32-bit)
    SET = 0x1b / 4,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Byte, StdMem};
    use crate::registers::{PTR, R2, R3};
    use crate::write_program;
    use color_eyre::eyre::Result;

    fn machine() -> (Processor, StdMem, Bios) {
        let mut cpu = Processor::default();
        // Keep stalls negligible in tests.
        cpu.clock_hz = u32::MAX;
        cpu.regs.set(PC, 0x100, false);
        cpu.regs.set(SP, 0x8000, false);
        let (bios, _keys) = Bios::detached();
        (cpu, StdMem::default(), bios)
    }

    #[test]
    fn test_boot_indirection_and_clean_end() -> Result<()> {
        let mut cpu = Processor::default();
        cpu.clock_hz = u32::MAX;
        let mut mem = StdMem::default();
        let (mut bios, _keys) = Bios::detached();

        // Code pointer 3; at 3: MOV R2, 0x2A; END.
        mem.write_array(0, &[0x00, 0x03, 0x01, 0x01, 0x02, 0x00, 0x2A, 0x00]);

        cpu.run(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R2), 0x2A);
        assert!(cpu.t);

        Ok(())
    }

    #[test]
    fn test_illegal_opcode_faults() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        mem.write_byte(0x100, 0xFF);
        let result = cpu.step(&mut mem, &mut bios);

        assert!(result.is_err());
        assert_eq!(cpu.regs.get(R1), 0xFF);
        assert_eq!(cpu.regs.get(PC), 0x100);

        Ok(())
    }

    #[test]
    fn test_illegal_opcode_resumes_in_debug_mode() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.debug = true;

        mem.write_byte(0x100, 0xFF);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(PC), 0x101);
        assert!(!cpu.t);

        Ok(())
    }

    #[test]
    fn test_hlt_is_absorbing() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => HLT);
        cpu.step(&mut mem, &mut bios)?;

        assert!(cpu.halted);
        assert!(!cpu.t);

        Ok(())
    }

    #[test]
    fn test_mov_immediate() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => MOV, 0x01, R2, 0x12, 0x34);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R2), 0x1234);
        assert_eq!(cpu.regs.get(PC), 0x105);

        Ok(())
    }

    #[test]
    fn test_mov_register() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R3, 77, false);

        use Opcode::*;
        write_program!(mem : 0x100 => MOV, 0x02, R2, R3);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R2), 77);
        assert_eq!(cpu.regs.get(PC), 0x104);

        Ok(())
    }

    #[test]
    fn test_jmp_immediate_and_register() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => JMP, 0x01, 0x02, 0x00);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(PC), 0x200);

        cpu.regs.set(R3, 0x300, false);
        write_program!(mem : 0x200 => JMP, 0x02, R3);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(PC), 0x300);

        Ok(())
    }

    #[test]
    fn test_jnz_taken_and_fallthrough() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => JNZ, 0x01, R2, 0x04, 0x00);
        cpu.step(&mut mem, &mut bios)?;
        // R2 is zero; falls through.
        assert_eq!(cpu.regs.get(PC), 0x105);

        cpu.regs.set(R2, 1, false);
        cpu.regs.set(PC, 0x100, false);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(PC), 0x400);

        Ok(())
    }

    #[test]
    fn test_jz_taken_when_zero() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => JZ, 0x01, R2, 0x04, 0x00);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(PC), 0x400);

        Ok(())
    }

    #[test]
    fn test_cmp_sets_flag_register() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R2, 5, false);
        cpu.regs.set(R3, 5, false);

        use Opcode::*;
        write_program!(mem : 0x100 => CMP, R1, R2, R3);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R1), 1);
        assert_eq!(cpu.regs.get(PC), 0x104);

        Ok(())
    }

    #[test]
    fn test_add_wraps_at_active_width() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R2, 0xFFFF, false);
        cpu.regs.set(R3, 1, false);

        use Opcode::*;
        write_program!(mem : 0x100 => ADD, R1, R2, R3);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R1), 0);

        Ok(())
    }

    #[test]
    fn test_sub_mul_div() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R2, 12, false);
        cpu.regs.set(R3, 4, false);

        use Opcode::*;
        write_program!(mem : 0x100 => SUB, R1, R2, R3, MUL, R1, R2, R3, DIV, R1, R2, R3);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 8);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 48);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 3);

        Ok(())
    }

    #[test]
    fn test_div_by_zero_yields_zero() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R1, 99, false);
        cpu.regs.set(R2, 10, false);

        use Opcode::*;
        write_program!(mem : 0x100 => DIV, R1, R2, R3);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R1), 0);

        Ok(())
    }

    #[test]
    fn test_logic_ops() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R2, 0b1100, false);
        cpu.regs.set(R3, 0b1010, false);

        use Opcode::*;
        write_program!(mem : 0x100 =>
            AND, R1, R2, R3,
            OR, R1, R2, R3,
            XOR, R1, R2, R3,
            NOR, R1, R2, R3,
            NOT, R1, R2
        );
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 0b1000);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 0b1110);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 0b0110);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 0xFFF1);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R1), 0xFFF3);

        Ok(())
    }

    #[test]
    fn test_inc_dec() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => INC, R2, DEC, R2, DEC, R2);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R2), 1);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R2), 0);
        cpu.step(&mut mem, &mut bios)?;
        // Wraps at the active width.
        assert_eq!(cpu.regs.get(R2), 0xFFFF);

        Ok(())
    }

    #[test]
    fn test_push_pop_leaves_sp_unchanged() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R2, 0xABCD, false);
        let sp = cpu.regs.get(SP);

        use Opcode::*;
        write_program!(mem : 0x100 => PUSH, 0x02, R2, POP, R3);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(SP), sp - 2);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R3), 0xABCD);
        assert_eq!(cpu.regs.get(SP), sp);

        Ok(())
    }

    #[test]
    fn test_push_immediate() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => PUSH, 0x01, 0x12, 0x34, POP, R1);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(PC), 0x104);
        cpu.step(&mut mem, &mut bios)?;

        assert_eq!(cpu.regs.get(R1), 0x1234);

        Ok(())
    }

    #[test]
    fn test_set_widens_immediates() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 =>
            SET, 0x01,
            MOV, 0x01, R2, 0xDE, 0xAD, 0xBE, 0xEF,
            SET, 0x00,
            MOV, 0x01, R3, 0x12, 0x34
        );
        cpu.step(&mut mem, &mut bios)?;
        assert!(cpu.extended);
        cpu.step(&mut mem, &mut bios)?;
        // Four immediate bytes decoded.
        assert_eq!(cpu.regs.get(R2), 0xDEAD_BEEF);
        assert_eq!(cpu.regs.get(PC), 0x109);
        cpu.step(&mut mem, &mut bios)?;
        assert!(!cpu.extended);
        cpu.step(&mut mem, &mut bios)?;
        // Back to two.
        assert_eq!(cpu.regs.get(R3), 0x1234);
        assert_eq!(cpu.regs.get(PC), 0x110);

        Ok(())
    }

    #[test]
    fn test_lod_str_lodw() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(PTR, 0x4000, false);
        cpu.regs.set(R2, 0x1234, false);

        use Opcode::*;
        write_program!(mem : 0x100 => STR, PTR, R2, LOD, PTR, R1, LODW, PTR, R3);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(mem.data[0x4000], 0x12);
        assert_eq!(mem.data[0x4001], 0x34);

        cpu.step(&mut mem, &mut bios)?;
        // LOD reads a single byte.
        assert_eq!(cpu.regs.get(R1), 0x12);

        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(R3), 0x1234);

        Ok(())
    }

    #[test]
    fn test_int_memory_size() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();

        use Opcode::*;
        write_program!(mem : 0x100 => INT, 0x00, 0x0a);
        cpu.step(&mut mem, &mut bios)?;

        // 64 KiB capacity saturates at the compact width.
        assert_eq!(cpu.regs.get(R1), 0xFFFF);
        assert_eq!(cpu.regs.get(PC), 0x103);

        Ok(())
    }

    #[test]
    fn test_operand_decode_wraps_at_address_space_top() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.extended = true;
        cpu.regs.set(PC, Word::MAX, true);

        // The fetch clamps to the top of memory; operand reads past PC
        // must wrap instead of overflowing.
        mem.data[StdMem::CAPACITY - 1] = Opcode::MOV as Byte;
        cpu.step(&mut mem, &mut bios)?;

        Ok(())
    }

    #[test]
    fn test_jump_to_address_space_top_keeps_running() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.extended = true;
        cpu.regs.set(R3, Word::MAX, true);

        use Opcode::*;
        write_program!(mem : 0x100 => JMP, 0x02, R3);
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(PC), Word::MAX);

        mem.data[StdMem::CAPACITY - 1] = NOP as Byte;
        cpu.step(&mut mem, &mut bios)?;
        assert_eq!(cpu.regs.get(PC), 0);

        Ok(())
    }

    #[test]
    fn test_int_write_char_renders_glyph() -> Result<()> {
        let (mut cpu, mut mem, mut bios) = machine();
        cpu.regs.set(R1, b'A' as Word, false);
        cpu.regs.set(R2, 255, false);
        cpu.regs.set(R3, 0, false);

        use Opcode::*;
        write_program!(mem : 0x100 => INT, 0x00, 0x01);
        cpu.step(&mut mem, &mut bios)?;

        use crate::video::{FONT, WIDTH};
        for row in 0..8 {
            for col in 0..8 {
                let expected: Byte = if FONT[b'A' as usize][row] & (1 << col) != 0 {
                    255
                } else {
                    0
                };
                assert_eq!(bios.video.mem[row * WIDTH + col], expected);
            }
        }
        assert_eq!(bios.video.cursor(), (1, 0));

        Ok(())
    }

    #[test]
    fn test_every_opcode_has_a_cycle_cost() -> Result<()> {
        for opcode in Opcode::ALL {
            assert!(opcode.cycles() > 0, "{} has no cost", opcode);
        }

        Ok(())
    }
}
