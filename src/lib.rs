//! A software CPU with a 16/32-bit instruction set, flat clamped memory,
//! memory-mapped video/audio regions and a BIOS-style interrupt layer.
//!
//! The engine is driven by [`processor::Processor::run`], which fetches,
//! decodes and executes instructions against a [`memory::Memory`] buffer
//! and services `INT` requests through [`bios::Bios`].

pub mod audio;
pub mod bios;
pub mod loader;
pub mod memory;
pub mod processor;
pub mod registers;
pub mod video;
