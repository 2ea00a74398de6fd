//! Build the flash image: firmware binary + header record + ROM payload,
//! packaged as UF2 for the bootrom's drag-and-drop loader.
//!
//! Flash layout (see `platform::memory_map`):
//!
//! ```text
//! 0x000000  firmware image (padded to the header boundary)
//! 0x0A0000  header: name[50] | mapper u8 | rom_len u32 le | rom_off u32 le
//! 0x0A003B  ROM payload (rom_off = header size → immediately after)
//! ```

use anyhow::{bail, ensure, Context, Result};
use cartridge::{MapperKind, RomHeader};
use colored::Colorize;
use platform::memory_map::{FLASH_SIZE_BYTES, HEADER_FLASH_OFFSET, XIP_BASE};
use std::path::Path;

use crate::uf2;

pub fn run(
    firmware_bin: &Path,
    rom_path: &Path,
    mapper: u8,
    name: Option<&str>,
    out: &Path,
) -> Result<()> {
    println!();
    println!("{}", "📦 Packing flash image...".cyan().bold());
    println!();

    let firmware = std::fs::read(firmware_bin)
        .with_context(|| format!("Failed to read firmware binary {}", firmware_bin.display()))?;
    ensure!(
        firmware.len() <= HEADER_FLASH_OFFSET,
        "firmware image ({} bytes) overlaps the header boundary at {:#x}",
        firmware.len(),
        HEADER_FLASH_OFFSET
    );

    let rom = std::fs::read(rom_path)
        .with_context(|| format!("Failed to read ROM image {}", rom_path.display()))?;

    let Some(kind) = MapperKind::from_selector(mapper) else {
        bail!("mapper selector {mapper} is not in 1..=10");
    };

    let stem = name
        .map(str::to_owned)
        .or_else(|| rom_path.file_stem().map(|s| s.to_string_lossy().to_uppercase()))
        .unwrap_or_default();

    let header = RomHeader::new(&stem, kind, rom.len() as u32, RomHeader::SIZE as u32)
        .map_err(|e| anyhow::anyhow!("header rejected the ROM: {e}"))?;

    // Assemble: firmware, zero pad, header, ROM.
    let mut image = firmware;
    image.resize(HEADER_FLASH_OFFSET, 0);
    image.extend_from_slice(&header.encode());
    image.extend_from_slice(&rom);
    ensure!(
        image.len() <= FLASH_SIZE_BYTES,
        "flash image ({} bytes) exceeds the {} byte part",
        image.len(),
        FLASH_SIZE_BYTES
    );

    let packed = uf2::encode(&image, XIP_BASE)?;
    std::fs::write(out, &packed)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "{}",
        format!(
            "✓ {}: \"{}\" mapper {} ({} bytes ROM, {} UF2 blocks)",
            out.display(),
            header.name_str(),
            mapper,
            rom.len(),
            packed.len() / uf2::BLOCK_BYTES
        )
        .green()
    );
    println!();
    Ok(())
}
