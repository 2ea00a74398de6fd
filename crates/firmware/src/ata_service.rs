//! Core-1 side of the disk channel: translate queued ATA commands into
//! sector-device I/O and raise the matching completion flag.
//!
//! The overlay on core 0 never sees the device; this module never sees
//! the bus. Everything crosses through [`DiskChannel`].

// IDENTIFY-block offsets are word indices doubled inside a 512-byte
// array; all sums are bounds-checked through get_mut before use.
#![allow(clippy::arithmetic_side_effects)]

use cartridge::channel::{disk_op, DiskChannel};
use platform::{SectorDevice, SectorError, SECTOR_BYTES};

/// Model string reported by IDENTIFY (ATA word 27..46, byte-swapped).
pub const IDENTIFY_MODEL: &[u8] = b"PICOSLOT CF CARD";
/// Serial string reported by IDENTIFY (ATA word 10..19, byte-swapped).
pub const IDENTIFY_SERIAL: &[u8] = b"PS00000001";
/// Firmware revision reported by IDENTIFY (ATA word 23..26, byte-swapped).
pub const IDENTIFY_FIRMWARE: &[u8] = b"1.0";

/// Copy an ASCII string into an ATA identify field: space-padded, bytes
/// swapped within each 16-bit word, as the standard demands.
fn put_ata_string(block: &mut [u8; SECTOR_BYTES], byte_offset: usize, len: usize, s: &[u8]) {
    let mut padded = [b' '; 40];
    for (dst, src) in padded.iter_mut().zip(s.iter()) {
        *dst = *src;
    }
    for i in (0..len).step_by(2) {
        if let (Some(dst), Some(a), Some(b)) = (
            block.get_mut(byte_offset + i..byte_offset + i + 2),
            padded.get(i + 1),
            padded.get(i),
        ) {
            dst.copy_from_slice(&[*a, *b]);
        }
    }
}

/// Build the 512-byte IDENTIFY DEVICE block for a medium of
/// `sector_count` LBA sectors. Deterministic: two calls with the same
/// count are byte-identical, which is what the host's retry logic checks.
#[must_use]
pub fn identify_block(sector_count: u32) -> [u8; SECTOR_BYTES] {
    let mut block = [0u8; SECTOR_BYTES];

    let put_word = |block: &mut [u8; SECTOR_BYTES], word: usize, value: u16| {
        if let Some(dst) = block.get_mut(word * 2..word * 2 + 2) {
            dst.copy_from_slice(&value.to_le_bytes());
        }
    };

    // Word 0: general configuration — fixed, non-removable ATA device.
    put_word(&mut block, 0, 0x0040);
    // Words 1/3/6: legacy CHS geometry, synthesised from the LBA count.
    let cylinders = (sector_count / (16 * 63)).min(16_383) as u16;
    put_word(&mut block, 1, cylinders);
    put_word(&mut block, 3, 16);
    put_word(&mut block, 6, 63);
    put_ata_string(&mut block, 10 * 2, 20, IDENTIFY_SERIAL);
    put_ata_string(&mut block, 23 * 2, 8, IDENTIFY_FIRMWARE);
    put_ata_string(&mut block, 27 * 2, 40, IDENTIFY_MODEL);
    // Word 49: capabilities — LBA supported.
    put_word(&mut block, 49, 0x0200);
    // Words 60-61: total addressable sectors, little-endian word order.
    put_word(&mut block, 60, (sector_count & 0xFFFF) as u16);
    put_word(&mut block, 61, (sector_count >> 16) as u16);

    block
}

/// Execute one queued disk command against `dev`, raising exactly one
/// completion flag. Called by the core-1 loop after `chan.command.take()`.
pub fn service_disk_command<D: SectorDevice>(chan: &DiskChannel, dev: &mut D, op: u8, arg: u32) {
    match op {
        disk_op::READ_SECTOR => {
            let mut buf = [0u8; SECTOR_BYTES];
            match dev.read_sector(arg, &mut buf) {
                Ok(()) => {
                    // SAFETY: between command consumption and read_ready,
                    // core 1 owns the sector buffer.
                    unsafe { chan.sector.fill_from(&buf) };
                    chan.read_ready.raise();
                }
                Err(_) => chan.read_failed.raise(),
            }
        }
        disk_op::WRITE_SECTOR => {
            let mut buf = [0u8; SECTOR_BYTES];
            // SAFETY: the overlay handed the buffer over with the command.
            unsafe { chan.sector.copy_into(&mut buf) };
            match dev.write_sector(arg, &buf) {
                Ok(()) => chan.write_ready.raise(),
                Err(_) => chan.write_failed.raise(),
            }
        }
        disk_op::IDENTIFY => {
            let block = identify_block(dev.sector_count());
            // SAFETY: as above — core 1 owns the buffer until read_ready.
            unsafe { chan.sector.fill_from(&block) };
            chan.identify_pending.clear();
            chan.read_ready.raise();
        }
        _ => chan.read_failed.raise(),
    }
}

/// The no-medium path: every command fails with the flag the overlay
/// maps to ERR|ABRT. For IDENTIFY this is the mount-failure case; the
/// host saw BSY for the grace interval before this runs.
pub fn fail_disk_command(chan: &DiskChannel, op: u8) {
    match op {
        disk_op::WRITE_SECTOR => chan.write_failed.raise(),
        _ => {
            chan.identify_pending.clear();
            chan.read_failed.raise();
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;

    struct RamDisk {
        sectors: Vec<[u8; SECTOR_BYTES]>,
        fail_io: bool,
    }

    impl RamDisk {
        fn new(n: usize) -> Self {
            Self { sectors: vec![[0u8; SECTOR_BYTES]; n], fail_io: false }
        }
    }

    impl SectorDevice for RamDisk {
        fn sector_count(&self) -> u32 {
            self.sectors.len() as u32
        }

        fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_BYTES]) -> Result<(), SectorError> {
            if self.fail_io {
                return Err(SectorError::Io);
            }
            let s = self.sectors.get(lba as usize).ok_or(SectorError::OutOfRange)?;
            buf.copy_from_slice(s);
            Ok(())
        }

        fn write_sector(&mut self, lba: u32, buf: &[u8; SECTOR_BYTES]) -> Result<(), SectorError> {
            if self.fail_io {
                return Err(SectorError::Io);
            }
            let s = self.sectors.get_mut(lba as usize).ok_or(SectorError::OutOfRange)?;
            s.copy_from_slice(buf);
            Ok(())
        }
    }

    #[test]
    fn read_command_fills_the_buffer_and_raises_ready() {
        let chan = DiskChannel::new();
        let mut disk = RamDisk::new(4);
        disk.sectors[2] = [0x77; SECTOR_BYTES];
        service_disk_command(&chan, &mut disk, disk_op::READ_SECTOR, 2);
        assert!(chan.read_ready.take());
        assert!(!chan.read_failed.is_raised());
        // SAFETY: test owns the buffer after read_ready.
        unsafe {
            assert_eq!(chan.sector.read_byte(0), 0x77);
            assert_eq!(chan.sector.read_byte(511), 0x77);
        }
    }

    #[test]
    fn out_of_range_read_raises_failed() {
        let chan = DiskChannel::new();
        let mut disk = RamDisk::new(1);
        service_disk_command(&chan, &mut disk, disk_op::READ_SECTOR, 5);
        assert!(chan.read_failed.take());
        assert!(!chan.read_ready.is_raised());
    }

    #[test]
    fn write_command_commits_the_buffer() {
        let chan = DiskChannel::new();
        let mut disk = RamDisk::new(4);
        // SAFETY: test plays core 0 filling the buffer pre-command.
        unsafe { chan.sector.fill_from(&[0x3Cu8; SECTOR_BYTES]) };
        service_disk_command(&chan, &mut disk, disk_op::WRITE_SECTOR, 1);
        assert!(chan.write_ready.take());
        assert_eq!(disk.sectors[1][0], 0x3C);
        assert_eq!(disk.sectors[1][511], 0x3C);
    }

    #[test]
    fn io_failure_surfaces_on_the_right_flag() {
        let chan = DiskChannel::new();
        let mut disk = RamDisk::new(4);
        disk.fail_io = true;
        service_disk_command(&chan, &mut disk, disk_op::WRITE_SECTOR, 0);
        assert!(chan.write_failed.take());
        service_disk_command(&chan, &mut disk, disk_op::READ_SECTOR, 0);
        assert!(chan.read_failed.take());
    }

    #[test]
    fn identify_is_deterministic_and_clears_pending() {
        let chan = DiskChannel::new();
        let mut disk = RamDisk::new(2048);
        chan.identify_pending.raise();
        service_disk_command(&chan, &mut disk, disk_op::IDENTIFY, 0);
        assert!(chan.read_ready.take());
        assert!(!chan.identify_pending.is_raised());

        let a = identify_block(2048);
        let b = identify_block(2048);
        assert_eq!(a, b, "IDENTIFY must be consistent across calls");
    }

    #[test]
    fn identify_block_reports_lba_count() {
        let block = identify_block(0x0001_2345);
        assert_eq!(&block[120..122], &0x2345u16.to_le_bytes(), "word 60");
        assert_eq!(&block[122..124], &0x0001u16.to_le_bytes(), "word 61");
        // Word 49 advertises LBA.
        assert_eq!(u16::from_le_bytes(block[98..100].try_into().unwrap()) & 0x0200, 0x0200);
    }

    #[test]
    fn identify_strings_are_byte_swapped() {
        let block = identify_block(64);
        // Model at words 27..46: "PICOSLOT…" appears pairwise swapped.
        assert_eq!(&block[54..58], b"IPOC", "model head, swapped within words");
        // Serial at words 10..19.
        assert_eq!(&block[20..24], b"SP00", "serial head, swapped within words");
    }

    #[test]
    fn no_medium_fails_every_command() {
        let chan = DiskChannel::new();
        chan.identify_pending.raise();
        fail_disk_command(&chan, disk_op::IDENTIFY);
        assert!(chan.read_failed.take());
        assert!(!chan.identify_pending.is_raised());
        fail_disk_command(&chan, disk_op::WRITE_SECTOR);
        assert!(chan.write_failed.take());
    }
}
