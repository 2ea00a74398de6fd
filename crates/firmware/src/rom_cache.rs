//! ROM staging: flash header access and the DMA copy into the SRAM cache.
//!
//! Runs once at boot while the PIO front-end holds `/WAIT` low, so the
//! host never observes a half-initialised cartridge.
//!
//! ## The byte-width rule
//!
//! The copy MUST run at 8-bit transfer width
//! ([`platform::memory_map::DMA_COPY_WORD_BYTES`]). The DMA controller
//! masks the source address down to the transfer width; the ROM payload's
//! flash offset is whatever the header says, so a word-width copy of an
//! unaligned image lands skewed by 1–3 bytes and every banked read serves
//! the wrong offset. The `u8`-element `dma::copy` below encodes the width
//! in the type.

// Address arithmetic: const-asserted flash offsets plus header fields the
// decoder already bounded to the flash part.
#![allow(clippy::arithmetic_side_effects)]

use cartridge::{CachePlan, RomHeader, RomSource};
use embassy_rp::dma;
use embassy_rp::peripherals::DMA_CH0;
use platform::memory_map::{HEADER_FLASH_OFFSET, ROM_CACHE_BYTES, XIP_BASE};

/// The flash header record, straight from XIP.
#[must_use]
pub fn header_bytes() -> &'static [u8] {
    let base = XIP_BASE as usize + HEADER_FLASH_OFFSET;
    // SAFETY: XIP maps the whole flash read-only; the header record is
    // inside it by the memory_map const assertions, and nothing ever
    // writes flash while the firmware runs.
    unsafe { core::slice::from_raw_parts(base as *const u8, RomHeader::SIZE) }
}

/// The ROM payload the header describes, as an XIP slice.
#[must_use]
pub fn image_bytes(header: &RomHeader) -> &'static [u8] {
    let base = XIP_BASE as usize + HEADER_FLASH_OFFSET + header.rom_offset as usize;
    // SAFETY: same mapping as above; the packer guarantees offset+len fit
    // the flash part, and the header decode bounded len to the mapper.
    unsafe { core::slice::from_raw_parts(base as *const u8, header.rom_len as usize) }
}

/// Stage the image per `plan` and hand back the unified ROM source.
///
/// The copy is byte-width DMA, chunk-free and uninterruptible from the
/// host's point of view (`/WAIT` is low for its whole duration).
pub async fn stage(
    dma_ch: DMA_CH0,
    cache: &'static mut [u8; ROM_CACHE_BYTES],
    image: &'static [u8],
    plan: CachePlan,
) -> RomSource<'static> {
    let cached_len = plan.cached_len.min(image.len()).min(cache.len());
    if cached_len > 0 {
        if let (Some(dst), Some(src)) = (cache.get_mut(..cached_len), image.get(..cached_len)) {
            // u8 elements ⇒ 8-bit DMA transfers; see the module docs.
            dma::copy(dma_ch, src, dst).await;
        }
    }
    // Give up the &mut: from here the cache is read-only shared state.
    let full: &'static [u8] = cache;
    RomSource::new(full.get(..cached_len).unwrap_or(&[]), image)
}

/// Halt: the header is corrupt (unknown mapper selector). There is no
/// safe dispatch loop to fall back to, and `/WAIT` is still low, so the
/// host is frozen rather than fed garbage instruction bytes.
pub fn halt_bad_header(code: u8) -> ! {
    defmt::error!("flash header corrupt (selector {=u8}); halting", code);
    loop {
        cortex_m::asm::wfe();
    }
}

// ── Boot-selection hand-off ──────────────────────────────────────────────────
//
// A menu selection cannot be installed while core 0 executes out of XIP:
// flash programming stalls the XIP bus mid-dispatch. The selection is
// parked in the watchdog scratch registers (which survive a warm reset)
// and the install runs on the next boot, before the bus engine arms and
// while /WAIT still holds the host.

/// Scratch-register magic marking a pending boot selection.
pub const BOOT_REQUEST_MAGIC: u32 = 0x544F_4F42; // "BOOT", little-endian

/// Record a menu selection and reset into the installer path.
pub fn request_boot(catalog_index: usize) -> ! {
    embassy_rp::pac::WATCHDOG.scratch0().write_value(BOOT_REQUEST_MAGIC);
    embassy_rp::pac::WATCHDOG.scratch1().write_value(catalog_index as u32);
    cortex_m::peripheral::SCB::sys_reset();
}

/// Consume a pending boot selection, if the last reset left one.
/// The storage-transport glue installs the image (copy to flash staging,
/// rewrite the header) before the bus front-end is armed.
pub fn take_boot_request() -> Option<u32> {
    let watchdog = embassy_rp::pac::WATCHDOG;
    if watchdog.scratch0().read() == BOOT_REQUEST_MAGIC {
        watchdog.scratch0().write_value(0);
        Some(watchdog.scratch1().read())
    } else {
        None
    }
}
