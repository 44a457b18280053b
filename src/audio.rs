use crate::memory::{Byte, Word};

/// Size of the memory-mapped audio region.
pub const AUDIO_SIZE: usize = 4096;

/// The memory-mapped audio region. Written only by the interrupt layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioMemory {
    pub data: Box<[Byte]>,
}

impl Default for AudioMemory {
    fn default() -> Self {
        AudioMemory {
            data: vec![0; AUDIO_SIZE].into_boxed_slice(),
        }
    }
}

impl AudioMemory {
    /// Clamps an address into the audio region.
    pub fn map(position: Word) -> usize {
        let position = position as usize;
        if position < AUDIO_SIZE {
            position
        } else {
            AUDIO_SIZE - 1
        }
    }

    /// Writes a 16-bit word into audio memory (big endian, clamped).
    pub fn write_word(&mut self, position: Word, value: Word) {
        self.data[Self::map(position)] = (value >> 8) as Byte;
        self.data[Self::map(position.wrapping_add(1))] = value as Byte;
    }
}

/// External audio sink. The engine only needs two capabilities: an alert
/// on fatal fault and playback of the rendered audio region.
pub trait SoundSink {
    /// Plays the fixed alert used when the engine faults.
    fn play_fault(&mut self);

    /// Plays back the contents of audio memory.
    fn play_audio(&mut self, data: &[Byte]);
}

/// Sink that discards everything. Used when no audio backend is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSound;

impl SoundSink for NullSound {
    fn play_fault(&mut self) {}

    fn play_audio(&mut self, _data: &[Byte]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_map_clamps() -> Result<()> {
        assert_eq!(AudioMemory::map(0), 0);
        assert_eq!(AudioMemory::map(4095), 4095);
        assert_eq!(AudioMemory::map(4096), 4095);

        Ok(())
    }

    #[test]
    fn test_write_word_is_big_endian() -> Result<()> {
        let mut audio = AudioMemory::default();

        audio.write_word(10, 0xBEEF);
        assert_eq!(audio.data[10], 0xBE);
        assert_eq!(audio.data[11], 0xEF);

        Ok(())
    }
}
