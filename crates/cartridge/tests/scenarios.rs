//! End-to-end scenarios: full image + mapper + dispatcher + (for disk
//! mode) the IDE overlay with a test double standing in for core 1.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

mod common;

use cartridge::channel::disk_op;
use cartridge::dispatch::{self, DiskInterceptor, NoInterceptor};
use cartridge::ide::{ata_cmd, status_bits};
use cartridge::mapper::{Ascii16, KonamiScc, Neo8, Plain, SunriseIde};
use cartridge::{DiskChannel, IdeOverlay, RomSource, Token};
use common::{counting_image, page_image, MockPort};
use platform::SECTOR_BYTES;

/// Scenario 1 — plain 32 KB image.
#[test]
fn plain_32k_reads_and_boundaries() {
    let mut image = vec![0u8; 32 * 1024];
    image[0] = 0x41;
    image[1] = 0x42;
    image[0x7FFF] = 0xEE;
    let rom = RomSource::new(&image, &image);
    let mut port = MockPort::new();
    let mut mapper = Plain;

    for addr in [0x4000u16, 0x4001, 0xBFFF, 0xC000] {
        port.host_read(addr);
        dispatch::step_blocking(&mut port, &mut mapper, &mut NoInterceptor, &rom);
    }
    assert_eq!(
        port.tokens,
        vec![
            Token::drive(0x41),
            Token::drive(0x42),
            Token::drive(0xEE),
            Token::TRISTATE,
        ]
    );
}

/// Scenario 2 — ASCII16 bank switch.
#[test]
fn ascii16_bank_switch() {
    let image = counting_image(64 * 1024);
    let rom = RomSource::new(&image, &image);
    let mut port = MockPort::new();
    let mut mapper = Ascii16::new();

    port.host_write(0x6000, 0x00);
    port.host_write(0x7000, 0x03);
    for addr in [0x4000u16, 0x8000, 0x8001] {
        port.host_read(addr);
    }
    for _ in 0..3 {
        dispatch::step_blocking(&mut port, &mut mapper, &mut NoInterceptor, &rom);
    }
    assert_eq!(
        port.tokens,
        vec![Token::drive(0), Token::drive(0), Token::drive(1)],
        "(3·16K) mod 256 = 0, then offset+1"
    );
}

/// Scenario 3 — KonamiSCC bank switch.
#[test]
fn konami_scc_bank_switch() {
    let image = page_image(128 * 1024);
    let rom = RomSource::new(&image, &image);
    let mut port = MockPort::new();
    let mut mapper = KonamiScc::new();

    port.host_write(0x9000, 0x05);
    port.host_read(0x8000);
    dispatch::step_blocking(&mut port, &mut mapper, &mut NoInterceptor, &rom);
    assert_eq!(port.tokens, vec![Token::drive(0x28)], "(5·8K) >> 8 = 0x28");
}

/// Scenario 4 — NEO8 12-bit register assembly.
#[test]
fn neo8_register_assembly() {
    // Image large enough that bank 0x123 · 8K is a real offset.
    let image = page_image(3 * 1024 * 1024);
    let rom = RomSource::new(&image[..128 * 1024], &image);
    let mut port = MockPort::new();
    let mut mapper = Neo8::new();

    port.host_write(0x5001, 0x01);
    port.host_write(0x5000, 0x23);
    port.host_read(0x0000);
    dispatch::step_blocking(&mut port, &mut mapper, &mut NoInterceptor, &rom);
    let expected = image[0x0123 * 8 * 1024];
    assert_eq!(port.tokens, vec![Token::drive(expected)]);
}

/// Scenario 5 — IDE IDENTIFY: 256 word-reads drain the buffer, the 257th
/// access sees DRDY without DRQ.
#[test]
fn ide_identify_drains_exactly_512_bytes() {
    let image = counting_image(128 * 1024);
    let rom = RomSource::uncached(&image);
    let chan = DiskChannel::new();
    let mut port = MockPort::new();
    let mut mapper = SunriseIde::new();
    let mut icept = DiskInterceptor::new(IdeOverlay::new(&chan));

    // Enable the overlay, then issue IDENTIFY.
    port.host_write(0x4104, 0x01);
    port.host_write(0x7E07, ata_cmd::IDENTIFY);
    while dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom) {}

    // Core-1 double: answer the queued IDENTIFY with a recognisable block.
    assert!(chan.identify_pending.take());
    let (op, _) = chan.command.take().expect("IDENTIFY queued");
    assert_eq!(op, disk_op::IDENTIFY);
    let mut block = [0u8; SECTOR_BYTES];
    for (i, b) in block.iter_mut().enumerate() {
        *b = (i & 0xFF) as u8;
    }
    // SAFETY: the test stands in for core 1, owner until read_ready.
    unsafe { chan.sector.fill_from(&block) };
    chan.read_ready.raise();

    for word in 0..256usize {
        port.host_read(0x7C00);
        dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
        port.host_read(0x7C01);
        dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
        let n = port.tokens.len();
        assert_eq!(port.tokens[n - 2].data(), ((word * 2) & 0xFF) as u8);
        assert_eq!(port.tokens[n - 1].data(), ((word * 2 + 1) & 0xFF) as u8);
    }

    port.host_read(0x7E07);
    dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
    assert_eq!(port.last_token().data(), status_bits::DRDY, "no DRQ after the block");
}

/// Scenario 6 — write-burst integrity: 9 consecutive writes, no reads in
/// between, all observed before the next read is serviced.
#[test]
fn disk_write_burst_of_nine_is_fully_observed() {
    let image = counting_image(128 * 1024);
    let rom = RomSource::uncached(&image);
    let chan = DiskChannel::new();
    let mut port = MockPort::new();
    let mut mapper = SunriseIde::new();
    let mut icept = DiskInterceptor::new(IdeOverlay::new(&chan));

    let burst: [(u16, u8); 9] = [
        (0x4104, 0x81),
        (0x7E01, 0x00),
        (0x7E02, 0x01),
        (0x7E03, 0x10),
        (0x7E04, 0x20),
        (0x7E05, 0x30),
        (0x7E06, 0xE0),
        (0x7E02, 0x01),
        (0x7E07, ata_cmd::READ_SECTORS),
    ];
    // One polling iteration per host cycle: the FIFO never exceeds one
    // pending write, so the depth-8 hardware limit is untouchable.
    for (addr, data) in burst {
        port.host_write(addr, data);
        dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
    }
    assert_eq!(port.dropped_writes, 0);

    // All 9 writes landed: page latched, task file assembled, command out.
    assert_eq!(mapper.segment(), 1);
    let (op, lba) = chan.command.take().expect("command after burst");
    assert_eq!(op, disk_op::READ_SECTOR);
    assert_eq!(lba, 0x0030_2010);

    // The *next* read is serviced after the burst: BSY while core 1 works.
    port.host_read(0x7E07);
    dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
    assert_eq!(port.last_token().data() & status_bits::BSY, status_bits::BSY);
}

/// A full sector read through dispatcher + overlay + core-1 double,
/// checking the 512-byte data-register discipline end to end.
#[test]
fn disk_sector_read_end_to_end() {
    let image = counting_image(128 * 1024);
    let rom = RomSource::uncached(&image);
    let chan = DiskChannel::new();
    let mut port = MockPort::new();
    let mut mapper = SunriseIde::new();
    let mut icept = DiskInterceptor::new(IdeOverlay::new(&chan));

    for (addr, data) in [
        (0x4104u16, 0x01u8),
        (0x7E02, 0x01),
        (0x7E03, 0x07),
        (0x7E04, 0x00),
        (0x7E05, 0x00),
        (0x7E06, 0xE0),
        (0x7E07, ata_cmd::READ_SECTORS),
    ] {
        port.host_write(addr, data);
        dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
    }
    let (op, lba) = chan.command.take().expect("read queued");
    assert_eq!((op, lba), (disk_op::READ_SECTOR, 7));
    // SAFETY: the test stands in for core 1, owner until read_ready.
    unsafe { chan.sector.fill_from(&[0xC3u8; SECTOR_BYTES]) };
    chan.read_ready.raise();

    let mut drained = 0usize;
    for _ in 0..SECTOR_BYTES / 2 {
        for addr in [0x7C00u16, 0x7C01] {
            port.host_read(addr);
            dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
            assert_eq!(port.last_token().data(), 0xC3);
            drained += 1;
        }
    }
    assert_eq!(drained, SECTOR_BYTES, "exactly 512 bytes through the data register");

    port.host_read(0x7E07);
    dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
    assert_eq!(port.last_token().data(), status_bits::DRDY);
}

/// Menu mode: the control surface forwards to a core-1 double and the
/// record page comes back through the ROM window.
#[test]
fn menu_control_surface_round_trip() {
    use cartridge::channel::{menu_op, MenuChannel};
    use cartridge::MenuOverlay;

    let image = counting_image(32 * 1024);
    let rom = RomSource::new(&image, &image);
    let chan = MenuChannel::new();
    let mut port = MockPort::new();
    let mut mapper = Plain;
    let mut overlay = MenuOverlay::new(&chan);

    // Core-1 double publishes two records.
    chan.set_media_present(true);
    chan.set_record_count(2);

    // Host reads the count through the window.
    port.host_read(0x7F81);
    port.host_read(0x7F82);
    dispatch::step_blocking(&mut port, &mut mapper, &mut overlay, &rom);
    dispatch::step_blocking(&mut port, &mut mapper, &mut overlay, &rom);
    assert_eq!(port.tokens[0].data(), 2);
    assert_eq!(port.tokens[1].data(), 0);

    // Host latches index 1 and strobes page-load.
    port.host_write(0x7F83, 1);
    port.host_write(0x7F85, 5);
    port.host_read(0x7FC0); // page read races the load: must see 0xFF
    dispatch::step_blocking(&mut port, &mut mapper, &mut overlay, &rom);
    assert_eq!(port.last_token().data(), 0xFF);
    assert_eq!(chan.command.take(), Some((menu_op::PAGE_LOAD, 1)));

    // Core-1 double answers with a formatted record.
    // SAFETY: the test stands in for core 1, owner until page_ready.
    unsafe { chan.page.fill_from(b"SALAMANDER.ROM") };
    chan.page_ready.raise();

    port.host_read(0x7FC0);
    port.host_read(0x7FC1);
    dispatch::step_blocking(&mut port, &mut mapper, &mut overlay, &rom);
    dispatch::step_blocking(&mut port, &mut mapper, &mut overlay, &rom);
    let n = port.tokens.len();
    assert_eq!(port.tokens[n - 2].data(), b'S');
    assert_eq!(port.tokens[n - 1].data(), b'A');

    // Reads outside the control window still serve menu ROM bytes.
    port.host_read(0x4010);
    dispatch::step_blocking(&mut port, &mut mapper, &mut overlay, &rom);
    assert_eq!(port.last_token().data(), 0x10);
}

/// ROM reads below the overlay window still come from the disk ROM while
/// the overlay is enabled.
#[test]
fn disk_rom_reads_coexist_with_the_overlay() {
    let image = counting_image(128 * 1024);
    let rom = RomSource::uncached(&image);
    let chan = DiskChannel::new();
    let mut port = MockPort::new();
    let mut mapper = SunriseIde::new();
    let mut icept = DiskInterceptor::new(IdeOverlay::new(&chan));

    port.host_write(0x4104, 0x01);
    port.host_read(0x4000); // page 0, offset 0
    port.host_read(0x8000); // outside the Sunrise window entirely
    for _ in 0..3 {
        dispatch::step_polling(&mut port, &mut mapper, &mut icept, &rom);
    }
    assert_eq!(port.tokens, vec![Token::drive(0x00), Token::TRISTATE]);
}
