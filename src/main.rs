use std::path::PathBuf;

use clap::Clap;
use color_eyre::eyre::Result;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use l2vm::bios::Bios;
use l2vm::loader;
#[cfg(feature = "extended-memory")]
use l2vm::memory::ExtMem as BootMem;
#[cfg(not(feature = "extended-memory"))]
use l2vm::memory::StdMem as BootMem;
use l2vm::processor::{Processor, DEFAULT_CLOCK_HZ};

/// Runs a boot image on the software CPU.
#[derive(Clap)]
#[clap(name = "l2vm")]
struct Options {
    /// Path to the boot image.
    image: PathBuf,
    /// Clock frequency in hertz.
    #[clap(long, default_value = "1158000")]
    speed: u32,
    /// Trace every executed instruction.
    #[clap(long)]
    log: bool,
    /// Resume past illegal instructions instead of faulting.
    #[clap(long)]
    debug: bool,
    /// Require (and strip) the 3-byte magic of early-format images.
    #[clap(long)]
    magic_check: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    let options = Options::parse();

    let level = if options.log {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init().unwrap(); // logging

    let image = loader::read_image(&options.image)?;

    let mut cpu = Processor::default();
    cpu.clock_hz = if options.speed > 0 {
        options.speed
    } else {
        DEFAULT_CLOCK_HZ
    };
    cpu.debug = options.debug;

    let mut memory = BootMem::default();
    loader::boot(&mut cpu, &mut memory, &image, options.magic_check)?;

    // The keyboard sender stays alive so a key wait blocks instead of
    // failing; a front-end would feed key codes through it.
    let (mut bios, _keys) = Bios::detached();
    bios.splash();

    cpu.run(&mut memory, &mut bios)
}
