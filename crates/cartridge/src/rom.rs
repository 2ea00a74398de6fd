//! ROM source: unified random-access reads across the SRAM cache and the
//! XIP flash image, plus the startup cache-planning decision.
//!
//! The bus loop's path length must be constant; XIP flash misses are not.
//! At startup the firmware stages the image's hot prefix (or all of it)
//! into SRAM with byte-width DMA while `/WAIT` holds the host, then serves
//! every read through [`RomSource::read`]:
//!
//! - `r < cached_len`        → SRAM cache
//! - `cached_len ≤ r < len`  → flash (XIP)
//! - `r ≥ len`               → [`FILLER_BYTE`]

/// Byte returned for any offset past the image. Never an error: it is
/// what an unpopulated ROM socket floats to.
pub const FILLER_BYTE: u8 = 0xFF;

/// Immutable view over the staged cache and the full image.
///
/// `cache` must hold a verbatim copy of `image[..cache.len()]`; the staging
/// code owns that invariant, the reader just picks the faster source.
#[derive(Debug, Clone, Copy)]
pub struct RomSource<'a> {
    cache: &'a [u8],
    image: &'a [u8],
}

impl<'a> RomSource<'a> {
    /// Wrap a staged cache and the full image.
    #[must_use]
    pub fn new(cache: &'a [u8], image: &'a [u8]) -> Self {
        debug_assert!(cache.len() <= image.len());
        Self { cache, image }
    }

    /// A source with no cache: every read goes to the backing image.
    /// Used in disk mode, where SRAM is the mapper workspace instead.
    #[must_use]
    pub fn uncached(image: &'a [u8]) -> Self {
        Self { cache: &[], image }
    }

    /// Full image length — the `available_length` of the response rule.
    #[must_use]
    pub fn available_len(&self) -> u32 {
        self.image.len() as u32
    }

    /// Bytes served from SRAM.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Read one byte at image offset `r`, filler past the end.
    #[inline]
    #[must_use]
    pub fn read(&self, r: u32) -> u8 {
        let r = r as usize;
        if let Some(b) = self.cache.get(r) {
            *b
        } else {
            self.image.get(r).copied().unwrap_or(FILLER_BYTE)
        }
    }
}

/// Startup decision: how much of the image to stage into SRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CachePlan {
    /// Bytes to DMA-copy into the SRAM cache.
    pub cached_len: usize,
    /// `true` when the whole image fits and flash is never touched again.
    pub fully_cached: bool,
}

impl CachePlan {
    /// Plan the staging copy.
    ///
    /// With caching disabled (disk mode repurposes the SRAM region) nothing
    /// is staged. Otherwise the image is staged whole if it fits, or its
    /// first `cache_capacity` bytes — the hot region: loaders and bank-0
    /// code sit at the front of every image format this firmware serves.
    #[must_use]
    pub fn plan(rom_len: usize, cache_capacity: usize, cache_enable: bool) -> Self {
        if !cache_enable || cache_capacity == 0 {
            return Self { cached_len: 0, fully_cached: false };
        }
        if rom_len <= cache_capacity {
            Self { cached_len: rom_len, fully_cached: true }
        } else {
            Self { cached_len: cache_capacity, fully_cached: false }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn image_1k() -> Vec<u8> {
        (0..1024u32).map(|i| (i & 0xFF) as u8).collect()
    }

    #[test]
    fn cached_reads_come_from_cache() {
        let image = image_1k();
        // Deliberately corrupt the backing copy inside the cached range to
        // prove the cache wins there.
        let mut backing = image.clone();
        backing[10] = 0xEE;
        let rom = RomSource::new(&image[..256], &backing);
        assert_eq!(rom.read(10), 10, "cached range must be served from cache");
        assert_eq!(rom.read(300), backing[300], "tail served from backing image");
    }

    #[test]
    fn boundary_between_cache_and_backing() {
        let image = image_1k();
        let rom = RomSource::new(&image[..256], &image);
        assert_eq!(rom.read(255), image[255]);
        assert_eq!(rom.read(256), image[256]);
    }

    #[test]
    fn past_end_reads_filler() {
        let image = image_1k();
        let rom = RomSource::new(&image[..256], &image);
        assert_eq!(rom.read(1024), FILLER_BYTE);
        assert_eq!(rom.read(u32::MAX), FILLER_BYTE);
    }

    #[test]
    fn uncached_source_serves_backing_only() {
        let image = image_1k();
        let rom = RomSource::uncached(&image);
        assert_eq!(rom.cached_len(), 0);
        assert_eq!(rom.read(0), 0);
        assert_eq!(rom.available_len(), 1024);
    }

    #[test]
    fn plan_full_cache_when_image_fits() {
        let p = CachePlan::plan(32 * 1024, 128 * 1024, true);
        assert_eq!(p, CachePlan { cached_len: 32 * 1024, fully_cached: true });
    }

    #[test]
    fn plan_partial_cache_when_image_larger() {
        let p = CachePlan::plan(512 * 1024, 128 * 1024, true);
        assert_eq!(p, CachePlan { cached_len: 128 * 1024, fully_cached: false });
    }

    #[test]
    fn plan_disabled_stages_nothing() {
        let p = CachePlan::plan(512 * 1024, 128 * 1024, false);
        assert_eq!(p, CachePlan { cached_len: 0, fully_cached: false });
    }
}
