//! RP2040 memory map and DMA transfer rules for the cartridge firmware.
//!
//! ## Memory regions
//!
//! | Region        | Base        | Size   | Serves |
//! |---------------|-------------|--------|--------|
//! | XIP flash     | 0x1000_0000 | 2 MB   | Firmware image, flash header, ROM payload |
//! | Striped SRAM  | 0x2000_0000 | 256 KB | ROM cache OR disk-mode workspace, core-1 data |
//! | SRAM4 (bank)  | 0x2004_0000 | 4 KB   | Core-0 stack (non-striped, deterministic) |
//! | SRAM5 (bank)  | 0x2004_1000 | 4 KB   | Core-1 stack (non-striped) |
//!
//! XIP reads go through the flash cache; a miss costs tens of bus cycles and
//! is the reason the bus engine front-loads the hot region into SRAM (see
//! `cartridge::rom`). The two 4 KB banks are single-cycle and unshared, so
//! the core-0 hot loop never contends with core-1 traffic for its stack.
//!
//! ## SRAM budget
//!
//! The 256 KB striped region is a discriminated union, fixed at startup:
//!
//! - ROM-cache mode: [`ROM_CACHE_BYTES`] for the cache, the remainder for
//!   core-1 state (catalog, sector staging, audio frames).
//! - Disk mode: the cache slot is repurposed as mapper workspace + IDE
//!   sector buffer; the ROM (16–32 KB of disk driver) runs from XIP.
//!
//! ## DMA rule (byte width)
//!
//! The ROM cache copy MUST use byte-width (8-bit) DMA transfers. Word-width
//! transfers force the controller to mask the source address down to a
//! 4-byte boundary; a ROM payload that does not start word-aligned in flash
//! is then copied with a silent 1–3 byte skew and every banked read returns
//! bytes of the wrong offset. [`DMA_COPY_WORD_BYTES`] encodes the rule so
//! the copy site and its test agree on it.

// ── Flash ────────────────────────────────────────────────────────────────────

/// XIP flash base address (cached window).
pub const XIP_BASE: u32 = 0x1000_0000;

/// Total flash capacity assumed by the image layout (2 MB, W25Q16 class).
pub const FLASH_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Byte offset of the flash header record (name + mapper + length + offset)
/// from the start of flash. The firmware image is padded to this boundary by
/// the `xtask pack` step.
pub const HEADER_FLASH_OFFSET: usize = 640 * 1024;

// ── SRAM ─────────────────────────────────────────────────────────────────────

/// Base of the 256 KB striped SRAM region.
pub const SRAM_BASE: u32 = 0x2000_0000;

/// Size of the striped SRAM region in bytes.
pub const SRAM_SIZE_BYTES: usize = 256 * 1024;

/// ROM cache capacity in ROM-cache mode.
///
/// 128 KB holds a full Konami/ASCII 128 KB image outright; larger images
/// stage their first 128 KB here and serve the tail from XIP.
pub const ROM_CACHE_BYTES: usize = 128 * 1024;

/// Core-1 working memory left over in ROM-cache mode.
pub const CORE1_RESERVED_BYTES: usize = SRAM_SIZE_BYTES - ROM_CACHE_BYTES;

const _: () = assert!(
    ROM_CACHE_BYTES + CORE1_RESERVED_BYTES == SRAM_SIZE_BYTES,
    "ROM cache and core-1 reservation must tile the striped SRAM exactly"
);

// Core-1 needs room for: catalog (≤48 KB), two 512-byte sector buffers,
// audio frame ring (≤16 KB), executor arena + stacks. 64 KB is the floor.
const _: () = assert!(
    CORE1_RESERVED_BYTES >= 64 * 1024,
    "ROM cache leaves too little SRAM for core-1 state"
);

// ── DMA ──────────────────────────────────────────────────────────────────────

/// Transfer width, in bytes, for the flash→SRAM ROM cache copy.
///
/// Hard precondition: must be 1. The RP2040 DMA controller aligns the read
/// address down to the transfer width; any wider width corrupts copies whose
/// flash source offset is not a multiple of the width. The header's `offset`
/// field is host-controlled, so alignment cannot be assumed.
pub const DMA_COPY_WORD_BYTES: usize = 1;

const _: () = assert!(
    DMA_COPY_WORD_BYTES == 1,
    "ROM cache DMA must be byte-width — wider transfers mask the source address"
);

// ── Core stacks ──────────────────────────────────────────────────────────────

/// Core-1 stack size (bytes). Lives in the dedicated non-striped bank.
pub const CORE1_STACK_BYTES: usize = 4 * 1024;

// ── Tests ────────────────────────────────────────────────────────────────────
