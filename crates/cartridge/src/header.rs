//! Flash header record: the contract between `xtask pack` and the firmware.
//!
//! Layout (59 bytes, all multi-byte integers little-endian):
//!
//! ```text
//! [0..50]  name        zero-padded ASCII; "MENU" selects menu mode
//! [50]     mapper      selector, 1..=10
//! [51..55] rom length  u32 le, bytes of ROM payload
//! [55..59] rom offset  u32 le, payload start relative to this record
//! ```
//!
//! The record sits at a fixed flash offset
//! ([`platform::memory_map::HEADER_FLASH_OFFSET`]); the ROM payload follows
//! wherever `rom offset` says. An unknown mapper selector halts the
//! firmware at boot — there is no safe way to guess a dispatch loop.

use crate::mapper::MapperKind;
use thiserror_no_std::Error;

/// Bytes reserved for the image name.
pub const NAME_BYTES: usize = 50;

/// Name given to the built-in menu image; selects the menu overlay.
pub const MENU_NAME: &str = "MENU";

/// Header decode/validation failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderError {
    /// Fewer than [`RomHeader::SIZE`] bytes available.
    #[error("header record truncated")]
    Truncated,
    /// The mapper selector byte is outside 1..=10.
    #[error("unknown mapper selector {0}")]
    UnknownMapper(u8),
    /// The declared ROM length exceeds what the mapper can address.
    #[error("ROM length {len} exceeds mapper capacity {cap}")]
    LengthExceedsCapacity {
        /// Declared payload length.
        len: u32,
        /// Addressing capacity of the selected mapper.
        cap: u32,
    },
}

/// Decoded and validated flash header record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomHeader {
    /// Image name, zero-padded.
    pub name: [u8; NAME_BYTES],
    /// Validated mapper selection.
    pub mapper: MapperKind,
    /// ROM payload length in bytes.
    pub rom_len: u32,
    /// Payload start, relative to the first byte of this record.
    pub rom_offset: u32,
}

impl RomHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = NAME_BYTES + 1 + 4 + 4;

    /// Build a header for a named image.
    ///
    /// # Errors
    /// [`HeaderError::LengthExceedsCapacity`] if `rom_len` cannot be
    /// addressed by `mapper`.
    pub fn new(
        name: &str,
        mapper: MapperKind,
        rom_len: u32,
        rom_offset: u32,
    ) -> Result<Self, HeaderError> {
        let cap = mapper.max_rom_bytes();
        if rom_len > cap {
            return Err(HeaderError::LengthExceedsCapacity { len: rom_len, cap });
        }
        let mut padded = [0u8; NAME_BYTES];
        for (dst, src) in padded.iter_mut().zip(name.as_bytes().iter().take(NAME_BYTES)) {
            *dst = *src;
        }
        Ok(Self { name: padded, mapper, rom_len, rom_offset })
    }

    /// Encode into the 59-byte flash layout.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    /// The buffer is `[u8; Self::SIZE]` so all slices are always valid.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..NAME_BYTES].copy_from_slice(&self.name);
        buf[50] = self.mapper.selector();
        buf[51..55].copy_from_slice(&self.rom_len.to_le_bytes());
        buf[55..59].copy_from_slice(&self.rom_offset.to_le_bytes());
        buf
    }

    /// Decode and validate a header record.
    ///
    /// # Errors
    ///
    /// [`HeaderError::Truncated`] if `buf` is shorter than [`Self::SIZE`];
    /// [`HeaderError::UnknownMapper`] for a selector outside 1..=10 (the
    /// firmware halts on this: there is no safe dispatch loop to guess);
    /// [`HeaderError::LengthExceedsCapacity`] if the declared length cannot
    /// be addressed by the selected mapper.
    pub fn decode(buf: &[u8]) -> Result<Self, HeaderError> {
        let record = buf.get(..Self::SIZE).ok_or(HeaderError::Truncated)?;

        let mut name = [0u8; NAME_BYTES];
        // Both slices are exactly NAME_BYTES; the get() above proved length.
        #[allow(clippy::indexing_slicing)]
        name.copy_from_slice(&record[0..NAME_BYTES]);

        let selector = record.get(50).copied().ok_or(HeaderError::Truncated)?;
        let mapper =
            MapperKind::from_selector(selector).ok_or(HeaderError::UnknownMapper(selector))?;

        let rom_len = u32::from_le_bytes(
            record
                .get(51..55)
                .and_then(|s| s.try_into().ok())
                .ok_or(HeaderError::Truncated)?,
        );
        let rom_offset = u32::from_le_bytes(
            record
                .get(55..59)
                .and_then(|s| s.try_into().ok())
                .ok_or(HeaderError::Truncated)?,
        );

        let cap = mapper.max_rom_bytes();
        if rom_len > cap {
            return Err(HeaderError::LengthExceedsCapacity { len: rom_len, cap });
        }

        Ok(Self { name, mapper, rom_len, rom_offset })
    }

    /// The name with zero padding stripped (lossy for non-ASCII bytes).
    #[must_use]
    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_BYTES);
        core::str::from_utf8(self.name.get(..end).unwrap_or(&[])).unwrap_or("")
    }

    /// `true` for the built-in menu image (installs the menu overlay).
    #[must_use]
    pub fn is_menu(&self) -> bool {
        self.name_str() == MENU_NAME
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_59_bytes() {
        assert_eq!(RomHeader::SIZE, 59);
    }

    #[test]
    fn header_round_trip() {
        let h = RomHeader::new("NEMESIS", MapperKind::KonamiScc, 128 * 1024, 59).unwrap();
        let bytes = h.encode();
        let decoded = RomHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, h);
        assert_eq!(decoded.name_str(), "NEMESIS");
        assert_eq!(decoded.mapper, MapperKind::KonamiScc);
        assert_eq!(decoded.rom_len, 128 * 1024);
        assert_eq!(decoded.rom_offset, 59);
    }

    #[test]
    fn fields_are_little_endian_at_fixed_offsets() {
        let h = RomHeader::new("A", MapperKind::Ascii16, 0x0004_0000, 0x0000_1234).unwrap();
        let bytes = h.encode();
        assert_eq!(bytes[50], 6, "ASCII16 selector");
        assert_eq!(&bytes[51..55], &[0x00, 0x00, 0x04, 0x00]);
        assert_eq!(&bytes[55..59], &[0x34, 0x12, 0x00, 0x00]);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let h = RomHeader::new("X", MapperKind::Plain16, 16 * 1024, 59).unwrap();
        let mut bytes = h.encode();
        bytes[50] = 11;
        assert_eq!(RomHeader::decode(&bytes), Err(HeaderError::UnknownMapper(11)));
        bytes[50] = 0;
        assert_eq!(RomHeader::decode(&bytes), Err(HeaderError::UnknownMapper(0)));
    }

    #[test]
    fn truncated_record_is_rejected() {
        let h = RomHeader::new("X", MapperKind::Plain32, 32 * 1024, 59).unwrap();
        let bytes = h.encode();
        assert_eq!(RomHeader::decode(&bytes[..58]), Err(HeaderError::Truncated));
    }

    #[test]
    fn oversized_rom_is_rejected() {
        // Plain16 addresses 16 KB; a 32 KB claim is header corruption.
        assert_eq!(
            RomHeader::new("X", MapperKind::Plain16, 32 * 1024, 59),
            Err(HeaderError::LengthExceedsCapacity { len: 32 * 1024, cap: 16 * 1024 })
        );
    }

    #[test]
    fn oversized_claim_rejected_on_decode_too() {
        let h = RomHeader::new("X", MapperKind::SunriseIde, 128 * 1024, 59).unwrap();
        let mut bytes = h.encode();
        // Inflate the length field past the Sunrise 8×16K capacity.
        bytes[51..55].copy_from_slice(&(256u32 * 1024).to_le_bytes());
        assert!(matches!(
            RomHeader::decode(&bytes),
            Err(HeaderError::LengthExceedsCapacity { .. })
        ));
    }

    #[test]
    fn long_names_truncate_and_short_names_pad() {
        let long = "A".repeat(60);
        let h = RomHeader::new(&long, MapperKind::Plain16, 0, 59).unwrap();
        assert_eq!(h.name_str().len(), NAME_BYTES);
        let h = RomHeader::new("AB", MapperKind::Plain16, 0, 59).unwrap();
        assert_eq!(h.name[2..], [0u8; 48]);
        assert_eq!(h.name_str(), "AB");
    }

    #[test]
    fn menu_name_selects_menu_mode() {
        let h = RomHeader::new("MENU", MapperKind::Plain32, 32 * 1024, 59).unwrap();
        assert!(h.is_menu());
        let h = RomHeader::new("MENUS", MapperKind::Plain32, 32 * 1024, 59).unwrap();
        assert!(!h.is_menu());
    }
}
