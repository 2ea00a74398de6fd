//! Hardware substrate for the PicoSlot cartridge firmware.
//!
//! This crate holds everything both cores agree on before any byte moves:
//! the RP2040 memory map and its DMA rules, the single-producer/single-
//! consumer primitives the cross-core channel is built from, and the trait
//! seams behind which the out-of-scope collaborators (USB mass-storage
//! transport, synthesizer DSP, I²S driver) live.
//!
//! # Architecture Layers
//!
//! ```text
//! Bus engine + overlays (cartridge crate)
//!         ↓
//! Substrate (this crate - memory map, SPSC primitives, trait seams)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC, firmware crate)
//! ```
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing)
//! - `hardware`: Physical hardware target marker
//! - `defmt`: Enable defmt logging derives

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod audio;
pub mod mailbox;
pub mod memory_map;
pub mod storage;

// Re-export the cross-core primitives: these are the vocabulary of every
// shared-state structure in the workspace.
pub use mailbox::{BufferCell, CommandSlot, Flag};

// Re-export the collaborator seams
pub use audio::{AudioSink, SampleSource, SilenceSource, AUDIO_FRAME_SAMPLES};
pub use storage::{SectorDevice, SectorError, SECTOR_BYTES};
