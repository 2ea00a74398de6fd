//! Randomized invariants over the mapper variants, checked through the
//! dispatcher so the whole response path is exercised, not just the
//! offset math.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

mod common;

use cartridge::dispatch::{self, NoInterceptor};
use cartridge::mapper::{Ascii16, Ascii8, Konami, KonamiScc, Mapper, Neo8, Plain};
use cartridge::{RomSource, Token, FILLER_BYTE};
use common::MockPort;
use proptest::prelude::*;

/// Drive one read through a blocking dispatcher step.
fn response<M: Mapper>(mapper: &mut M, rom: &RomSource<'_>, addr: u16) -> Token {
    let mut port = MockPort::new();
    port.host_read(addr);
    dispatch::step_blocking(&mut port, mapper, &mut NoInterceptor, rom);
    port.last_token()
}

/// Spec-table model of the KonamiSCC write-recognition and offset rules,
/// kept deliberately independent of the mapper implementation.
fn konami_scc_model(writes: &[(u16, u8)], addr: u16) -> u32 {
    let mut regs = [0u8, 1, 2, 3];
    for &(a, d) in writes {
        match a {
            0x5000..=0x57FF => regs[0] = d,
            0x7000..=0x77FF => regs[1] = d,
            0x9000..=0x97FF => regs[2] = d,
            0xB000..=0xB7FF => regs[3] = d,
            _ => {}
        }
    }
    let slot = usize::from((addr - 0x4000) >> 13);
    u32::from(regs[slot]) * 8192 + u32::from(addr & 0x1FFF)
}

proptest! {
    /// response_byte(m, a) == rom[offset(a, banks)] for in-image offsets,
    /// filler beyond — for arbitrary write sequences and window addresses.
    #[test]
    fn konami_scc_response_matches_the_model(
        writes in prop::collection::vec((0x4000u16..0xC000, any::<u8>()), 0..24),
        addr in 0x4000u16..0xC000,
    ) {
        let image = common::counting_image(256 * 1024);
        let rom = RomSource::new(&image[..64 * 1024], &image);
        let mut mapper = KonamiScc::new();
        for &(a, d) in &writes {
            mapper.write(a, d);
        }
        let token = response(&mut mapper, &rom, addr);
        let offset = konami_scc_model(&writes, addr);
        prop_assert!(token.drives());
        let expected = image.get(offset as usize).copied().unwrap_or(FILLER_BYTE);
        prop_assert_eq!(token.data(), expected);
    }

    /// Round trip: writing v to a recognised bank-switch address, then
    /// reading the first address of that bank, yields rom[v · 8K].
    #[test]
    fn bank_switch_round_trip_8k(v in any::<u8>()) {
        let image = common::page_image(2 * 1024 * 1024);
        let rom = RomSource::new(&image[..128 * 1024], &image);

        // (switch address, first address of the switched slot)
        let cases: [(u16, u16); 3] = [(0x5000, 0x4000), (0x9000, 0x8000), (0xB000, 0xA000)];
        for (switch, first) in cases {
            let mut mapper = KonamiScc::new();
            mapper.write(switch, v);
            let token = response(&mut mapper, &rom, first);
            prop_assert_eq!(token.data(), image[usize::from(v) * 8192]);
        }
    }

    /// Reads outside the window are tri-state regardless of bank state.
    #[test]
    fn out_of_window_is_always_tristate(
        writes in prop::collection::vec((0x4000u16..0xC000, any::<u8>()), 0..16),
        addr in prop_oneof![0u16..0x4000, 0xC000u16..=0xFFFF],
    ) {
        let image = common::counting_image(128 * 1024);
        let rom = RomSource::new(&image, &image);
        let mut mapper = Ascii8::new();
        for &(a, d) in &writes {
            mapper.write(a, d);
        }
        let token = response(&mut mapper, &rom, addr);
        prop_assert_eq!(token, Token::TRISTATE);
        prop_assert!(!token.drives());
    }

    /// ASCII16: bit 15 of the read address picks the register, and bank
    /// arithmetic uses 16 K granularity.
    #[test]
    fn ascii16_slots_follow_bit15(r0 in 0u8..4, r1 in 0u8..4, addr in 0x4000u16..0xC000) {
        let image = common::page_image(64 * 1024);
        let rom = RomSource::new(&image, &image);
        let mut mapper = Ascii16::new();
        mapper.write(0x6000, r0);
        mapper.write(0x7000, r1);
        let token = response(&mut mapper, &rom, addr);
        let bank = if addr < 0x8000 { r0 } else { r1 };
        let offset = u32::from(bank) * 16384 + u32::from(addr & 0x3FFF);
        prop_assert_eq!(token.data(), image[offset as usize]);
    }

    /// NEO8: whatever bytes are written, the effective register never
    /// exceeds 12 bits, so offsets stay below 4096 · 8K.
    #[test]
    fn neo8_registers_masked_to_12_bits(
        writes in prop::collection::vec((0u16..=0xFFFF, any::<u8>()), 0..48),
    ) {
        let mut mapper = Neo8::new();
        for &(a, d) in &writes {
            mapper.write(a, d);
        }
        for i in 0..6 {
            prop_assert!(mapper.bank(i) <= 0x0FFF);
        }
    }

    /// Konami (no SCC): bank 0 is immovable under any write sequence.
    #[test]
    fn konami_bank0_never_moves(
        writes in prop::collection::vec((0u16..=0xFFFF, any::<u8>()), 0..48),
    ) {
        let mut mapper = Konami::new();
        for &(a, d) in &writes {
            mapper.write(a, d);
        }
        prop_assert_eq!(mapper.bank(0), 0);
    }
}

/// Window boundary rows, pinned exactly.
#[test]
fn window_boundaries_are_exact() {
    let image = common::counting_image(32 * 1024);
    let rom = RomSource::new(&image, &image);

    assert_eq!(response(&mut Plain, &rom, 0x3FFF), Token::TRISTATE);
    assert_eq!(response(&mut Plain, &rom, 0x4000), Token::drive(0));
    assert_eq!(response(&mut KonamiScc::new(), &rom, 0xC000), Token::TRISTATE);
    assert_eq!(response(&mut Ascii8::new(), &rom, 0xC000), Token::TRISTATE);
    assert_eq!(response(&mut Konami::new(), &rom, 0xC000), Token::TRISTATE);
    assert_eq!(response(&mut Ascii16::new(), &rom, 0xC000), Token::TRISTATE);
}

/// Bank register 0xFF on an 8-bit mapper over a 1 MB image: the offset
/// (2040 KB) is past the image, so the response is the filler byte.
#[test]
fn bank_ff_past_the_image_reads_filler() {
    let image = common::counting_image(1024 * 1024);
    let rom = RomSource::new(&image[..128 * 1024], &image);
    let mut mapper = KonamiScc::new();
    mapper.write(0x5000, 0xFF);
    let token = response(&mut mapper, &rom, 0x4000);
    assert!(token.drives());
    assert_eq!(token.data(), FILLER_BYTE);
}
