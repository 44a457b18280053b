//! Boot image loading.
//!
//! The engine consumes the linker's output verbatim: bytes land at
//! address 0, where the first word is the code-section pointer. The
//! 3-byte magic check is a loader policy for early-format images, not an
//! engine requirement; when enabled the magic is stripped before the
//! image is placed in memory.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{eyre, Result, WrapErr};
use log::*;

use crate::memory::{Byte, Memory, Word};
use crate::processor::Processor;
use crate::registers::SP;

/// Magic bytes at the head of early-format images: `L`, `2`, `E`.
pub const IMAGE_MAGIC: [Byte; 3] = [0x4c, 0x32, 0x45];

/// Reads a boot image from disk.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Vec<Byte>> {
    let path = path.as_ref();
    fs::read(path).wrap_err_with(|| format!("failed to read disk image `{}`", path.display()))
}

/// Places `image` into memory at address 0 and initializes the stack
/// pointer to the image length.
pub fn boot<const S: usize>(
    cpu: &mut Processor,
    memory: &mut Memory<S>,
    image: &[Byte],
    require_magic: bool,
) -> Result<()> {
    let image = if require_magic {
        if image.len() < IMAGE_MAGIC.len() || image[..IMAGE_MAGIC.len()] != IMAGE_MAGIC {
            return Err(eyre!("invalid disk image: missing magic"));
        }
        &image[IMAGE_MAGIC.len()..]
    } else {
        image
    };

    if image.is_empty() {
        return Err(eyre!("invalid disk image: empty"));
    }
    if image.len() > S {
        return Err(eyre!(
            "disk image ({} bytes) does not fit into memory ({} bytes)",
            image.len(),
            S
        ));
    }

    memory.write_array(0, image);
    let extended = cpu.extended;
    cpu.regs.set(SP, image.len() as Word, extended);

    info!("loaded {} byte image", image.len());
    Ok(())
}
