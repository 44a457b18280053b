pub type Byte = u8; // 1 byte
pub type Word = u32; // wide enough for either addressing mode

/// Compact build: 64 KiB of flat memory.
pub const COMPACT_CAPACITY: usize = 0x1_0000;
/// Extended build: 1.75 GiB of flat memory.
pub const EXTENDED_CAPACITY: usize = 0x7000_0000;

/// Default memory
pub type StdMem = Memory<COMPACT_CAPACITY>;
/// Extended-build memory
pub type ExtMem = Memory<EXTENDED_CAPACITY>;

/// Emulates the flat memory of the machine.
///
/// Every access goes through [`Memory::map`], which clamps out-of-range
/// addresses to the last valid byte. Multi-byte accesses are big endian
/// and decompose into per-byte mapped accesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: Box<[Byte]>,
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes the memory, zero filled.
    fn default() -> Self {
        Memory {
            data: vec![0; S].into_boxed_slice(),
        }
    }
}

impl<const S: usize> Memory<S> {
    pub const CAPACITY: usize = S;

    /// Resolves an address to an index inside the buffer.
    ///
    /// Out-of-range addresses clamp to the last valid byte; this never
    /// faults.
    pub fn map(position: Word) -> usize {
        let position = position as usize;
        if position < S {
            position
        } else {
            S - 1
        }
    }

    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Word) -> Byte {
        self.data[Self::map(position)]
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Word, value: Byte) {
        self.data[Self::map(position)] = value;
    }

    /// Reads a `width`-byte word from the memory (big endian).
    pub fn read_word(&self, position: Word, width: usize) -> Word {
        let mut value: Word = 0;
        for i in 0..width {
            value = value << 8 | self.read_byte(position.wrapping_add(i as Word)) as Word;
        }
        value
    }

    /// Writes a `width`-byte word to the memory (big endian).
    pub fn write_word(&mut self, position: Word, value: Word, width: usize) {
        for i in 0..width {
            let shift = 8 * (width - 1 - i);
            self.write_byte(position.wrapping_add(i as Word), (value >> shift) as Byte);
        }
    }

    /// Writes an array of bytes to the memory
    pub fn write_array(&mut self, position: Word, data: &[Byte]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(position.wrapping_add(i as Word), *byte);
        }
    }
}

/// Writes a block of instruction bytes directly into the memory.
#[macro_export]
macro_rules! write_program {
    ( $mem:ident : $pos:expr => $( $byte:expr ),+ ) => {
        $mem.write_array($pos, &[
            $(
                $byte as $crate::memory::Byte,
            )+
        ]);
    };
}
