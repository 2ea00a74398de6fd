//! Catalog of bootable images found on the removable medium.
//!
//! Core 1 builds this during its chunked directory scan and persists it on
//! the medium itself (`.picoslot.cat`), so re-inserting a known stick
//! skips the full rescan. On-medium layout:
//!
//! ```text
//! [0..4]   magic        b"PCAT"
//! [4]      version      u8 = 1
//! [5..9]   payload len  u32 le
//! [9..]    payload      postcard-encoded entry vector
//! [..+4]   crc32        u32 le over the payload bytes
//! ```

// Length arithmetic is bounds-checked against the caller's buffer before
// any addition; offsets cannot overflow usize on any supported target.
#![allow(clippy::arithmetic_side_effects)]

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Upper bound on catalog size; beyond this the scan stops and the menu
/// shows the first 512 records (a full stick of images, in practice).
pub const MAX_CATALOG_ENTRIES: usize = 512;

/// Catalog decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CatalogError {
    /// Magic bytes are not `b"PCAT"`.
    BadMagic,
    /// Version byte is not recognised by this implementation.
    UnsupportedVersion,
    /// Payload length field runs past the provided bytes.
    Truncated,
    /// CRC32 trailer does not match the payload.
    ChecksumMismatch,
    /// postcard decode failed (corrupt or truncated payload).
    DecodeError,
    /// Encode target buffer too small.
    BufferTooSmall,
}

#[cfg(feature = "std")]
impl std::error::Error for CatalogError {}

impl core::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "catalog magic mismatch"),
            Self::UnsupportedVersion => write!(f, "unsupported catalog version"),
            Self::Truncated => write!(f, "catalog truncated"),
            Self::ChecksumMismatch => write!(f, "catalog checksum mismatch"),
            Self::DecodeError => write!(f, "catalog payload undecodable"),
            Self::BufferTooSmall => write!(f, "catalog encode buffer too small"),
        }
    }
}

/// One bootable image on the medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// File name (8.3 or long name, truncated to the header name width).
    pub name: String<50>,
    /// Mapper selector to boot with (detected or from a sidecar hint).
    pub mapper: u8,
    /// Image size in bytes.
    pub size: u32,
}

/// The scan result, bounded and order-preserving.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Entries in directory order.
    pub entries: Vec<CatalogEntry, MAX_CATALOG_ENTRIES>,
}

impl Catalog {
    const MAGIC: &'static [u8; 4] = b"PCAT";
    const VERSION: u8 = 1;
    const HEADER_LEN: usize = 9;
    const TRAILER_LEN: usize = 4;

    /// An empty catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Serialize into `buf`; returns the number of bytes written.
    ///
    /// # Errors
    /// [`CatalogError::BufferTooSmall`] when `buf` cannot hold the header,
    /// payload, and trailer.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, CatalogError> {
        if buf.len() < Self::HEADER_LEN + Self::TRAILER_LEN {
            return Err(CatalogError::BufferTooSmall);
        }
        let (header, rest) = buf.split_at_mut(Self::HEADER_LEN);

        let payload_len = {
            let payload = postcard::to_slice(&self.entries, &mut *rest)
                .map_err(|_| CatalogError::BufferTooSmall)?;
            payload.len()
        };

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(rest.get(..payload_len).ok_or(CatalogError::BufferTooSmall)?);
        let crc = hasher.finalize();

        header.get_mut(..4).ok_or(CatalogError::BufferTooSmall)?.copy_from_slice(Self::MAGIC);
        if let Some(v) = header.get_mut(4) {
            *v = Self::VERSION;
        }
        header
            .get_mut(5..9)
            .ok_or(CatalogError::BufferTooSmall)?
            .copy_from_slice(&(payload_len as u32).to_le_bytes());

        let total = Self::HEADER_LEN + payload_len + Self::TRAILER_LEN;
        buf.get_mut(Self::HEADER_LEN + payload_len..total)
            .ok_or(CatalogError::BufferTooSmall)?
            .copy_from_slice(&crc.to_le_bytes());
        Ok(total)
    }

    /// Deserialize and verify a catalog.
    ///
    /// # Errors
    /// Any [`CatalogError`] variant per the failure; a checksum mismatch
    /// means the cached catalog is stale or the file was torn mid-write,
    /// and the caller falls back to a full rescan.
    pub fn decode(buf: &[u8]) -> Result<Self, CatalogError> {
        let magic = buf.get(..4).ok_or(CatalogError::Truncated)?;
        if magic != Self::MAGIC {
            return Err(CatalogError::BadMagic);
        }
        if buf.get(4).copied() != Some(Self::VERSION) {
            return Err(CatalogError::UnsupportedVersion);
        }
        let payload_len = u32::from_le_bytes(
            buf.get(5..9)
                .and_then(|s| s.try_into().ok())
                .ok_or(CatalogError::Truncated)?,
        ) as usize;

        // The length field is host data: checked math, not trusted math.
        let payload_end = Self::HEADER_LEN
            .checked_add(payload_len)
            .ok_or(CatalogError::Truncated)?;
        let trailer_end = payload_end.checked_add(4).ok_or(CatalogError::Truncated)?;

        let payload = buf
            .get(Self::HEADER_LEN..payload_end)
            .ok_or(CatalogError::Truncated)?;
        let crc_bytes = buf.get(payload_end..trailer_end).ok_or(CatalogError::Truncated)?;
        let expected = u32::from_le_bytes(crc_bytes.try_into().map_err(|_| CatalogError::Truncated)?);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != expected {
            return Err(CatalogError::ChecksumMismatch);
        }

        let entries = postcard::from_bytes(payload).map_err(|_| CatalogError::DecodeError)?;
        Ok(Self { entries })
    }

    /// Entries whose name contains `filter` (ASCII case-insensitive).
    /// An empty filter matches everything.
    pub fn matches<'a>(
        &'a self,
        filter: &'a str,
    ) -> impl Iterator<Item = (usize, &'a CatalogEntry)> + 'a {
        self.entries.iter().enumerate().filter(move |(_, e)| {
            if filter.is_empty() {
                return true;
            }
            contains_ignore_ascii_case(e.name.as_str(), filter)
        })
    }
}

/// `haystack.contains(needle)` with ASCII case folding, `core`-only.
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || n.len() > h.len() {
        return n.is_empty();
    }
    h.windows(n.len())
        .any(|w| w.iter().zip(n).all(|(a, b)| a.eq_ignore_ascii_case(b)))
}
