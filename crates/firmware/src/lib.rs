//! PicoSlot cartridge-emulator firmware.
//!
//! Core 0 owns the bus: it stages the ROM cache, selects the dispatcher
//! loop from the flash header, and never again leaves it. Core 1 owns
//! everything with unbounded latency: removable storage, the catalog
//! scan, ATA command translation, and the audio pump.
//!
//! ```text
//! core 0                       core 1
//! ──────                       ──────
//! bus_pio (PIO front-end)      core1 (embassy executor)
//! rom_cache (DMA staging)        ├─ ata_service (sector I/O)
//! cartridge::dispatch            ├─ menu_service (catalog, search)
//!                                └─ pump (audio frames)
//!          └──── cartridge::channel (SPSC, release/acquire) ────┘
//! ```
//!
//! The service modules (`ata_service`, `menu_service`, `pump`) are
//! hardware-free and carry the host test coverage; the `hardware` feature
//! pulls in the PIO front-end, the DMA staging, and the core-1 wiring.
//!
//! # Building
//!
//! ```bash
//! cargo build --release --target thumbv6m-none-eabi --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod ata_service;
pub mod menu_service;
pub mod pump;

#[cfg(feature = "hardware")]
pub mod bus_pio;
#[cfg(feature = "hardware")]
pub mod core1;
#[cfg(feature = "hardware")]
pub mod rom_cache;

pub use ata_service::{identify_block, service_disk_command};
pub use menu_service::{MenuAction, MenuService};
