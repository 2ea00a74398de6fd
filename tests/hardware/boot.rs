//! HIL boot sequence tests.
//!
//! Validates that the RP2040 boot sequence completes with /WAIT held low
//! throughout: PIO pin claim → header decode → DMA cache staging →
//! core-1 spawn → state-machine arm.
//!
//! # Running
//! ```
//! cargo test --features hardware --target thumbv6m-none-eabi
//! ```
//!
//! # Requirements
//! - probe-rs installed and board connected via SWD
//! - A host machine (or bus exerciser) strobing the slot

// These are placeholder tests — actual HIL execution requires probe-rs runner.
// The test bodies document WHAT to check; the assertions use defmt when hardware feature is enabled.

/// Verifies the boot sequence memory map is correctly configured.
/// Hardware check: /WAIT stays low until the state machines arm.
#[cfg(test)]
mod hil_boot_tests {
    #[test]
    fn memory_map_constants_are_correct() {
        // Validate addresses that will be used during HIL boot
        assert_eq!(0x10000000u32, 0x10000000); // XIP flash base
        assert_eq!(0x20000000u32, 0x20000000); // Striped SRAM base
        assert_eq!(0x20040000u32, 0x20040000); // SRAM4/5 (per-core stack banks)
    }

    #[test]
    fn hil_test_framework_placeholder() {
        // This test passes on host. On hardware, replace with:
        //   defmt::assert!(bus_armed_flag.load(Ordering::Acquire));
        // using a global AtomicBool set after BusFrontEnd::arm().
        //
        // With a logic analyzer on GPIO27, confirm /WAIT rises exactly
        // once, after the staging copy, and never glitches during it.
        let _ = "HIL test placeholder — see README.md";
    }

    #[test]
    fn staging_copy_is_byte_width() {
        // The flash→SRAM cache copy must run at 8-bit DMA width; see
        // platform::memory_map::DMA_COPY_WORD_BYTES for the rule.
        //
        // HIL check: program a ROM whose payload starts at an odd flash
        // offset (rom_offset = 59 does this naturally), read back the
        // first cached bank over the bus, and compare against the file.
        // A word-width regression shows up as a 1–3 byte skew.
        let transfer_width_bytes = 1usize;
        assert_eq!(transfer_width_bytes, 1, "cache DMA must be byte-width");
    }
}
