// Desktop/tooling crate — unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

mod check;
mod flash;
mod pack;
mod test;
mod uf2;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "PicoSlot cartridge development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and flash the firmware to an RP2040 board via probe-rs
    Flash {
        /// Build and flash release version
        #[arg(short, long)]
        release: bool,
    },
    /// Check firmware builds for both the hardware target and host tests
    Check,
    /// Run all tests (unit and integration)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Pack firmware + ROM into a drag-and-drop UF2 flash image
    Pack {
        /// Raw firmware binary (objcopy output)
        #[arg(long)]
        firmware: PathBuf,
        /// ROM image to embed after the flash header
        #[arg(long)]
        rom: PathBuf,
        /// Mapper selector (1..=10; see cartridge::mapper)
        #[arg(long)]
        mapper: u8,
        /// Image name for the header (defaults to the ROM file stem)
        #[arg(long)]
        name: Option<String>,
        /// Output UF2 path
        #[arg(long, default_value = "picoslot.uf2")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Flash { release } => flash::run(release),
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
        Commands::Pack { firmware, rom, mapper, name, out } => {
            pack::run(&firmware, &rom, mapper, name.as_deref(), &out)
        }
    }
}
