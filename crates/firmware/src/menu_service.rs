//! Core-1 side of the menu channel: owns the catalog, the incremental
//! search filter, and the record-page formatting the host reads back.
//!
//! Page layout (64 bytes, read at 0x7FC0–0x7FFF by the menu driver):
//!
//! ```text
//! [0..50]  name     zero-padded, same width as the flash header
//! [50]     mapper   selector the entry would boot with
//! [51..55] size     u32 le
//! [55..64] reserved (zero)
//! ```

// Page offsets are fixed constants inside a 64-byte array; the filtered
// index walk is bounded by the catalog size.
#![allow(clippy::arithmetic_side_effects)]

use cartridge::catalog::Catalog;
use cartridge::channel::{menu_op, MenuChannel, MENU_PAGE_BYTES};
use heapless::String;

/// What the core-1 loop must do next, decided by a menu command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuAction {
    /// Rescan the medium and install a fresh catalog.
    Rescan,
    /// Reboot into the catalog entry with this (unfiltered) index.
    Boot(usize),
}

/// Longest search filter the host can accumulate.
pub const SEARCH_MAX: usize = 32;

/// Menu state machine driven by [`MenuChannel`] commands.
pub struct MenuService {
    catalog: Catalog,
    filter: String<SEARCH_MAX>,
}

impl MenuService {
    /// Empty service: no catalog, no filter.
    #[must_use]
    pub fn new() -> Self {
        Self { catalog: Catalog::new(), filter: String::new() }
    }

    /// The active catalog (tests and the boot path).
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Install a scan result and publish the visible record count.
    pub fn install_catalog(&mut self, catalog: Catalog, chan: &MenuChannel) {
        self.catalog = catalog;
        self.publish_count(chan);
    }

    /// Handle one consumed menu command. Returns an action when the loop
    /// must do work this service cannot (scanning, rebooting).
    pub fn handle(&mut self, chan: &MenuChannel, op: u8, arg: u32) -> Option<MenuAction> {
        match op {
            menu_op::REFRESH => Some(MenuAction::Rescan),
            menu_op::SELECT => self
                .resolve_filtered(arg as usize)
                .map(MenuAction::Boot),
            menu_op::SEARCH_RESET => {
                self.filter.clear();
                self.publish_count(chan);
                None
            }
            menu_op::SEARCH_CHAR => {
                let c = (arg & 0xFF) as u8;
                if c.is_ascii_graphic() || c == b' ' {
                    // A full filter silently ignores further characters.
                    let _ = self.filter.push(c as char);
                }
                self.publish_count(chan);
                None
            }
            menu_op::PAGE_LOAD => {
                self.load_page(chan, arg as usize);
                None
            }
            _ => None,
        }
    }

    /// Map a filtered index (what the host displays) back to the
    /// catalog index (what the boot path needs).
    fn resolve_filtered(&self, filtered: usize) -> Option<usize> {
        self.catalog
            .matches(self.filter.as_str())
            .nth(filtered)
            .map(|(i, _)| i)
    }

    fn publish_count(&self, chan: &MenuChannel) {
        let count = self.catalog.matches(self.filter.as_str()).count();
        chan.set_record_count(count.min(u16::MAX as usize) as u16);
    }

    // Page offsets 50..55 are compile-time constants inside the 64-byte
    // buffer, so the direct indexing cannot go out of bounds.
    #[allow(clippy::indexing_slicing)]
    fn load_page(&self, chan: &MenuChannel, filtered: usize) {
        let mut page = [0u8; MENU_PAGE_BYTES];
        if let Some((_, entry)) = self.catalog.matches(self.filter.as_str()).nth(filtered) {
            for (dst, src) in page.iter_mut().zip(entry.name.as_bytes()) {
                *dst = *src;
            }
            page[50] = entry.mapper;
            page[51..55].copy_from_slice(&entry.size.to_le_bytes());
        }
        // SAFETY: core 1 owns the page buffer between the PAGE_LOAD
        // command (which lowered page_ready) and the raise below.
        unsafe { chan.page.fill_from(&page) };
        chan.page_ready.raise();
    }
}

impl Default for MenuService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;
    use cartridge::catalog::CatalogEntry;

    fn catalog3() -> Catalog {
        let mut c = Catalog::new();
        for (name, mapper, size) in [
            ("NEMESIS.ROM", 3u8, 128 * 1024u32),
            ("SALAMANDER.ROM", 3, 256 * 1024),
            ("TOOL.COM", 2, 16 * 1024),
        ] {
            c.entries
                .push(CatalogEntry { name: String::try_from(name).unwrap(), mapper, size })
                .unwrap();
        }
        c
    }

    #[test]
    fn install_publishes_the_count() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        svc.install_catalog(catalog3(), &chan);
        assert_eq!(chan.record_count(), 3);
    }

    #[test]
    fn search_narrows_and_reset_restores() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        svc.install_catalog(catalog3(), &chan);
        for c in b"sala".iter() {
            svc.handle(&chan, menu_op::SEARCH_CHAR, u32::from(*c));
        }
        assert_eq!(chan.record_count(), 1);
        svc.handle(&chan, menu_op::SEARCH_RESET, 0);
        assert_eq!(chan.record_count(), 3);
    }

    #[test]
    fn select_resolves_through_the_filter() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        svc.install_catalog(catalog3(), &chan);
        for c in b"sala".iter() {
            svc.handle(&chan, menu_op::SEARCH_CHAR, u32::from(*c));
        }
        // Filtered index 0 is catalog index 1.
        assert_eq!(svc.handle(&chan, menu_op::SELECT, 0), Some(MenuAction::Boot(1)));
    }

    #[test]
    fn select_past_the_filter_is_ignored() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        svc.install_catalog(catalog3(), &chan);
        assert_eq!(svc.handle(&chan, menu_op::SELECT, 99), None);
    }

    #[test]
    fn refresh_requests_a_rescan() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        assert_eq!(svc.handle(&chan, menu_op::REFRESH, 0), Some(MenuAction::Rescan));
    }

    #[test]
    fn page_load_formats_the_record() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        svc.install_catalog(catalog3(), &chan);
        svc.handle(&chan, menu_op::PAGE_LOAD, 1);
        assert!(chan.page_ready.take());
        // SAFETY: test owns the page after page_ready.
        unsafe {
            assert_eq!(chan.page.read_byte(0), b'S');
            assert_eq!(chan.page.read_byte(50), 3, "mapper selector");
            let size = u32::from_le_bytes([
                chan.page.read_byte(51),
                chan.page.read_byte(52),
                chan.page.read_byte(53),
                chan.page.read_byte(54),
            ]);
            assert_eq!(size, 256 * 1024);
        }
    }

    #[test]
    fn page_load_out_of_range_yields_a_blank_record() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        svc.install_catalog(catalog3(), &chan);
        svc.handle(&chan, menu_op::PAGE_LOAD, 7);
        assert!(chan.page_ready.take());
        // SAFETY: test owns the page after page_ready.
        unsafe {
            assert_eq!(chan.page.read_byte(0), 0);
            assert_eq!(chan.page.read_byte(50), 0);
        }
    }

    #[test]
    fn filter_caps_at_its_capacity_without_panicking() {
        let chan = MenuChannel::new();
        let mut svc = MenuService::new();
        svc.install_catalog(catalog3(), &chan);
        for _ in 0..100 {
            svc.handle(&chan, menu_op::SEARCH_CHAR, u32::from(b'x'));
        }
        assert_eq!(chan.record_count(), 0, "no entry matches 32 x's");
    }
}
