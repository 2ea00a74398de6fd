//! Build the firmware, prove it fits under the header boundary, and
//! flash it over SWD.
//!
//! The flash part is shared: everything from
//! `platform::memory_map::HEADER_FLASH_OFFSET` upward belongs to
//! `xtask pack` (header record + ROM payload). A firmware image that
//! grows past the boundary would be silently clobbered by the next
//! `pack`, so this command measures the ELF's flash footprint and
//! refuses to flash an oversized build. memory.x caps the linker to the
//! same boundary; the check here is the human-readable version of that
//! cap, with headroom numbers.

use anyhow::{bail, ensure, Context, Result};
use colored::Colorize;
use platform::memory_map::{HEADER_FLASH_OFFSET, XIP_BASE};
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

const TARGET: &str = "thumbv6m-none-eabi";

pub fn run(release: bool) -> Result<()> {
    let profile = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({profile}, {TARGET})...").cyan().bold()
    );

    let build_started = Instant::now();
    let status = Command::new("cargo")
        .args(["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"])
        .args(release.then_some("--release"))
        .status()
        .context("Failed to run cargo build")?;
    if !status.success() {
        bail!("firmware build failed");
    }
    println!(
        "{}",
        format!("✓ built in {:.1}s", build_started.elapsed().as_secs_f64()).green()
    );

    let elf_path: PathBuf = ["target", TARGET, profile, "firmware"].iter().collect();
    let elf = std::fs::read(&elf_path)
        .with_context(|| format!("Failed to read {}", elf_path.display()))?;
    report_boot_region(&elf)?;

    println!();
    println!("{}", "📡 Flashing over SWD (probe-rs)...".cyan().bold());
    let flash_started = Instant::now();
    let status = Command::new("probe-rs")
        .args(["run", "--chip", "RP2040"])
        .arg(&elf_path)
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;
    if !status.success() {
        bail!("probe-rs flash failed — check the SWD wiring and board power");
    }
    println!(
        "{}",
        format!("✓ flashed in {:.1}s", flash_started.elapsed().as_secs_f64()).green()
    );
    println!();
    println!("{}", "🕹️  Cartridge firmware is on the board.".bold());
    println!(
        "   {}",
        "Use 'xtask pack' to append a ROM image, or insert the cartridge and power the host."
            .dimmed()
    );
    println!();

    Ok(())
}

/// Check the firmware against the boot-region budget and print headroom.
fn report_boot_region(elf: &[u8]) -> Result<()> {
    let used = flash_footprint(elf)?;
    ensure!(
        used <= HEADER_FLASH_OFFSET,
        "firmware occupies {used} bytes of flash but the ROM header sits at \
         {HEADER_FLASH_OFFSET:#x} — shrink the firmware or move the boundary in \
         platform::memory_map AND memory.x"
    );
    let headroom = HEADER_FLASH_OFFSET - used;
    println!(
        "{}",
        format!(
            "   boot region: {used} / {HEADER_FLASH_OFFSET} bytes ({headroom} free before the ROM header)"
        )
        .dimmed()
    );
    Ok(())
}

/// Bytes of flash the ELF's load segments span, measured from the XIP
/// base to the end of the furthest segment. `.boot2` anchors the span at
/// the base and `.data`'s load image lives in flash too, so this is the
/// contiguous boot-region footprint that `pack` must not overwrite.
fn flash_footprint(elf: &[u8]) -> Result<usize> {
    const PT_LOAD: u32 = 1;

    ensure!(elf.get(..4) == Some(b"\x7fELF".as_ref()), "not an ELF file");
    ensure!(elf.get(4) == Some(&1), "not a 32-bit ELF");
    ensure!(elf.get(5) == Some(&1), "not a little-endian ELF");

    let ph_off = read_u32(elf, 28)? as usize;
    let ph_entsize = read_u16(elf, 42)? as usize;
    let ph_num = read_u16(elf, 44)? as usize;
    ensure!(ph_entsize >= 32, "program header entries too short");

    let flash_end = u64::from(XIP_BASE) + HEADER_FLASH_OFFSET as u64;
    let mut span_end: u64 = 0;
    for i in 0..ph_num {
        let at = ph_off + i * ph_entsize;
        if read_u32(elf, at)? != PT_LOAD {
            continue;
        }
        // p_paddr is the load (flash) address; p_vaddr may be RAM.
        let paddr = u64::from(read_u32(elf, at + 12)?);
        let filesz = u64::from(read_u32(elf, at + 16)?);
        if filesz == 0 || paddr < u64::from(XIP_BASE) || paddr >= flash_end {
            continue;
        }
        span_end = span_end.max(paddr + filesz);
    }
    ensure!(span_end > 0, "no flash-resident load segments — wrong target or a host build?");
    Ok((span_end - u64::from(XIP_BASE)) as usize)
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16> {
    let raw = bytes
        .get(at..at + 2)
        .and_then(|s| s.try_into().ok())
        .context("ELF truncated")?;
    Ok(u16::from_le_bytes(raw))
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    let raw = bytes
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .context("ELF truncated")?;
    Ok(u32::from_le_bytes(raw))
}
