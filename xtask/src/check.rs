//! Workspace health matrix.
//!
//! The crates ship in three shapes and a change that builds in one shape
//! routinely breaks another: the bus engine is host (std) code where the
//! tests live, the same engine must compile no_std for the cartridge,
//! and the firmware binary only exists behind the `hardware` feature on
//! the RP2040 target. The matrix walks all of them, then finishes with
//! an in-process pack smoke so the header/UF2 path is exercised without
//! a board attached.

use anyhow::{bail, ensure, Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

use crate::{pack, uf2};

struct CargoStep {
    label: &'static str,
    args: &'static [&'static str],
}

const MATRIX: &[CargoStep] = &[
    CargoStep {
        label: "firmware (RP2040, hardware)",
        args: &[
            "check",
            "-p",
            "firmware",
            "--target",
            "thumbv6m-none-eabi",
            "--features",
            "hardware",
        ],
    },
    CargoStep {
        label: "platform (no_std)",
        args: &[
            "check",
            "-p",
            "platform",
            "--target",
            "thumbv6m-none-eabi",
            "--no-default-features",
        ],
    },
    CargoStep {
        label: "cartridge (no_std)",
        args: &[
            "check",
            "-p",
            "cartridge",
            "--target",
            "thumbv6m-none-eabi",
            "--no-default-features",
        ],
    },
    CargoStep {
        label: "workspace + tests (host)",
        args: &["check", "--workspace", "--tests"],
    },
    CargoStep {
        label: "clippy",
        args: &["clippy", "--workspace", "--tests", "--", "-D", "warnings"],
    },
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking every shipped shape...".cyan().bold());
    println!();

    let total_started = Instant::now();
    for step in MATRIX {
        run_cargo(step)?;
    }
    pack_smoke()?;

    println!();
    println!(
        "{}",
        format!(
            "✓ {} matrix steps + pack smoke passed in {:.1}s",
            MATRIX.len(),
            total_started.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

fn run_cargo(step: &CargoStep) -> Result<()> {
    let started = Instant::now();
    let output = Command::new("cargo")
        .args(step.args)
        .output()
        .with_context(|| format!("Failed to spawn cargo for {}", step.label))?;

    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {}", step.label).red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        bail!("{} failed", step.label);
    }

    println!(
        "  {} {} {}",
        "✓".green(),
        step.label,
        format!("({:.1}s)", started.elapsed().as_secs_f64()).dimmed()
    );
    Ok(())
}

/// Pack a synthetic firmware + ROM pair and sanity-check the UF2 that
/// comes out: right block granularity, and at least enough blocks to
/// reach the header boundary where the ROM payload starts.
fn pack_smoke() -> Result<()> {
    let started = Instant::now();
    let dir = std::env::temp_dir().join(format!("picoslot-check-{}", std::process::id()));
    std::fs::create_dir_all(&dir).context("Failed to create the smoke directory")?;

    let firmware_bin = dir.join("firmware.bin");
    let rom = dir.join("SMOKE.ROM");
    let out = dir.join("smoke.uf2");
    std::fs::write(&firmware_bin, vec![0x90u8; 4096])?;
    std::fs::write(&rom, vec![0xA5u8; 16 * 1024])?;

    let result = pack::run(&firmware_bin, &rom, 3, Some("SMOKE"), &out);
    let verdict = result.and_then(|()| {
        let len = std::fs::metadata(&out)?.len();
        ensure!(len > 0 && len % uf2::BLOCK_BYTES as u64 == 0, "UF2 output is not block-aligned");
        let payload = (len / uf2::BLOCK_BYTES as u64) * uf2::PAYLOAD_BYTES as u64;
        ensure!(
            payload > platform::memory_map::HEADER_FLASH_OFFSET as u64,
            "UF2 payload stops short of the ROM header region"
        );
        Ok(())
    });
    std::fs::remove_dir_all(&dir).ok();
    verdict?;

    println!(
        "  {} pack smoke {}",
        "✓".green(),
        format!("({:.1}s)", started.elapsed().as_secs_f64()).dimmed()
    );
    Ok(())
}
