//! BIOS interrupt service layer.
//!
//! Invoked synchronously by the `INT` instruction. Owns the memory-mapped
//! video and audio regions, the type-out/key-wait state and the key-event
//! channel fed by the external keyboard source.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;

use log::*;

use crate::audio::{AudioMemory, NullSound, SoundSink};
use crate::memory::Word;
use crate::registers::{RegisterFile, PC, PTR, R1, R2, R3};
use crate::video::Video;

pub const INT_WRITE_CHAR: Word = 0x01;
pub const INT_SLEEP: Word = 0x02;
pub const INT_VIDEO_WRITE: Word = 0x03;
pub const INT_TYPE_OUT: Word = 0x04;
pub const INT_KEY_DELIVER: Word = 0x05;
pub const INT_KEY_WAIT: Word = 0x06;
pub const INT_FAULT: Word = 0x07;
pub const INT_AUDIO_WRITE: Word = 0x08;
pub const INT_AUDIO_PLAY: Word = 0x09;
pub const INT_MEMORY_SIZE: Word = 0x0a;

pub struct Bios {
    pub video: Video,
    pub audio: AudioMemory,
    /// Echo delivered keys to the console.
    pub type_out: bool,
    /// Set by `INT 0x06`, cleared when a key is delivered.
    pub key_wait: bool,
    key_rx: Receiver<Word>,
    sound: Box<dyn SoundSink>,
}

impl Bios {
    /// Creates a BIOS fed by `key_rx` and playing through `sound`.
    pub fn new(key_rx: Receiver<Word>, sound: Box<dyn SoundSink>) -> Self {
        Self {
            video: Video::default(),
            audio: AudioMemory::default(),
            type_out: false,
            key_wait: false,
            key_rx,
            sound,
        }
    }

    /// Creates a BIOS with no audio backend, returning the key sender for
    /// the external keyboard source.
    pub fn detached() -> (Self, Sender<Word>) {
        let (tx, rx) = channel();
        (Self::new(rx, Box::new(NullSound)), tx)
    }

    /// Plays the fault alert through the external sink.
    pub fn fault_alert(&mut self) {
        self.sound.play_fault();
    }

    /// Boot banner, printed to the console once at startup.
    pub fn splash(&mut self) {
        info!("Luna L2");
        info!("BIOS: Integrated BIOS");
        info!("Copyright (c) 2025 Luna Microsystems LLC");
        self.video.print_str("Luna L2\n", 255, 0);
        self.video.print_str("BIOS: Integrated BIOS\n", 255, 0);
        self.video
            .print_str("Copyright (c) 2025 Luna Microsystems LLC\n\n", 255, 0);
    }

    /// Services interrupt `code`. Unknown codes are ignored.
    pub fn interrupt(
        &mut self,
        code: Word,
        regs: &mut RegisterFile,
        extended: bool,
        capacity: usize,
    ) {
        match code {
            INT_WRITE_CHAR => {
                // Character in R1, foreground in R2, background in R3.
                let ch = regs.get(R1) as u8;
                let fg = regs.get(R2) as u8;
                let bg = regs.get(R3) as u8;
                self.video.print_char(ch, fg, bg);
            }
            INT_SLEEP => {
                // Seconds in R1.
                let seconds = regs.get(R1);
                debug!("BIOS sleep {}s", seconds);
                thread::sleep(Duration::from_secs(seconds as u64));
            }
            INT_VIDEO_WRITE => {
                // Address in R1, word in R2.
                self.video.write_word(regs.get(R1), regs.get(R2));
            }
            INT_TYPE_OUT => {
                self.type_out = regs.get(R1) == 1;
            }
            INT_KEY_DELIVER => {
                if let Ok(key) = self.key_rx.try_recv() {
                    regs.set(PTR, key, extended);
                }
                self.deliver_key(regs, extended);
            }
            INT_KEY_WAIT => {
                self.key_wait = true;
                // Blocks the engine until the keyboard source sends a key.
                // A disconnected source leaves the wait pending.
                match self.key_rx.recv() {
                    Ok(key) => {
                        regs.set(PTR, key, extended);
                        self.deliver_key(regs, extended);
                    }
                    Err(_) => warn!("key wait: keyboard source is gone"),
                }
            }
            INT_FAULT => {
                // Faulting opcode in R1, location in PC.
                let message = format!(
                    "Illegal instruction 0x{:04x} at location 0x{:04x}\n",
                    regs.get(R1),
                    regs.get(PC)
                );
                error!("{}", message.trim_end());
                self.video.print_str(&message, 255, 0);
            }
            INT_AUDIO_WRITE => {
                // Address in R1, word in R2.
                self.audio.write_word(regs.get(R1), regs.get(R2));
            }
            INT_AUDIO_PLAY => {
                self.sound.play_audio(&self.audio.data);
            }
            INT_MEMORY_SIZE => {
                // The report saturates at the active width's maximum.
                let limit = if extended { Word::MAX } else { 0xFFFF };
                regs.set(R1, (capacity as u64).min(limit as u64) as Word, extended);
            }
            _ => {
                warn!("unknown BIOS interrupt 0x{:02x}", code);
            }
        }
    }

    /// Common key-delivery path: echoes the pending key when type-out is
    /// on and completes an outstanding key wait into R1.
    fn deliver_key(&mut self, regs: &mut RegisterFile, extended: bool) {
        let key = regs.get(PTR);
        if self.type_out {
            self.video.print_char(key as u8, 255, 0);
        }
        if self.key_wait {
            self.key_wait = false;
            regs.set(R1, key, extended);
        }
    }
}
