//! Menu control surface: the MMIO-style register bank the menu ROM's
//! driver uses to browse and boot images from removable storage.
//!
//! Installed only when the flash header names the built-in menu image.
//! Occupies 0x7F80–0x7FFF at the top of the menu ROM's window (the menu
//! ROM reserves that region; its own code never reads itself there).
//!
//! Registers (offsets from 0x7F80):
//!
//! ```text
//! 0x00  status        r   bit0 scan busy, bit1 media present
//! 0x01  count lo      r   records visible under the current filter
//! 0x02  count hi      r
//! 0x03  index lo      w   latched record index
//! 0x04  index hi      w
//! 0x05  command       w   1 refresh, 2 select, 3 search-reset,
//!                         5 page-load (argument = latched index)
//! 0x06  search char   w   append one character to the search filter
//! 0x40–0x7F  page     r   64-byte record page filled by core 1
//! ```
//!
//! Every write is forwarded to core 1 through the menu command slot; core 0
//! never scans or reads the medium. A command posted while the slot is
//! still pending is dropped — the driver is expected to poll the busy bit,
//! and the menu ROM retries on its next frame.

// Register arithmetic runs on match-narrowed offsets and 16-bit counts
// widened before shifting; nothing here can underflow or overflow.
#![allow(clippy::arithmetic_side_effects)]

use crate::channel::{menu_op, MenuChannel};
use crate::dispatch::Interceptor;

/// First intercepted address.
pub const MENU_WINDOW_START: u16 = 0x7F80;
/// Last intercepted address.
pub const MENU_WINDOW_END: u16 = 0x7FFF;

const REG_STATUS: u16 = 0x00;
const REG_COUNT_LO: u16 = 0x01;
const REG_COUNT_HI: u16 = 0x02;
const REG_INDEX_LO: u16 = 0x03;
const REG_INDEX_HI: u16 = 0x04;
const REG_COMMAND: u16 = 0x05;
const REG_SEARCH: u16 = 0x06;
const PAGE_FIRST: u16 = 0x40;
const PAGE_LAST: u16 = 0x7F;

/// Command values the host writes to `REG_COMMAND`.
mod host_cmd {
    pub const REFRESH: u8 = 1;
    pub const SELECT: u8 = 2;
    pub const SEARCH_RESET: u8 = 3;
    pub const PAGE_LOAD: u8 = 5;
}

/// The menu overlay interceptor, owned by the menu dispatcher loop.
pub struct MenuOverlay<'a> {
    chan: &'a MenuChannel,
    index_lo: u8,
    index_hi: u8,
}

impl<'a> MenuOverlay<'a> {
    /// Fresh overlay with index latch zero.
    #[must_use]
    pub fn new(chan: &'a MenuChannel) -> Self {
        Self { chan, index_lo: 0, index_hi: 0 }
    }

    /// `true` for addresses the overlay owns.
    #[must_use]
    pub fn intercepts(addr: u16) -> bool {
        (MENU_WINDOW_START..=MENU_WINDOW_END).contains(&addr)
    }

    fn latched_index(&self) -> u32 {
        u32::from(self.index_hi) << 8 | u32::from(self.index_lo)
    }

    fn reg_read(&self, reg: u16) -> u8 {
        match reg {
            REG_STATUS => {
                let mut s = 0u8;
                if self.chan.busy() {
                    s |= 0x01;
                }
                if self.chan.media_present() {
                    s |= 0x02;
                }
                s
            }
            REG_COUNT_LO => (self.chan.record_count() & 0xFF) as u8,
            REG_COUNT_HI => (self.chan.record_count() >> 8) as u8,
            PAGE_FIRST..=PAGE_LAST => {
                if self.chan.page_ready.is_raised() {
                    // SAFETY: once page_ready is raised, core 1 does not
                    // touch the page until the next PAGE_LOAD (which
                    // lowers the flag before re-submitting).
                    unsafe { self.chan.page.read_byte(usize::from(reg - PAGE_FIRST)) }
                } else {
                    0xFF
                }
            }
            _ => 0xFF,
        }
    }

    fn reg_write(&mut self, reg: u16, data: u8) {
        match reg {
            REG_INDEX_LO => self.index_lo = data,
            REG_INDEX_HI => self.index_hi = data,
            REG_COMMAND => self.command(data),
            REG_SEARCH => {
                let _ = self.chan.command.submit(menu_op::SEARCH_CHAR, u32::from(data));
            }
            _ => {}
        }
    }

    fn command(&mut self, value: u8) {
        match value {
            host_cmd::REFRESH => {
                let _ = self.chan.command.submit(menu_op::REFRESH, 0);
            }
            host_cmd::SELECT => {
                let _ = self.chan.command.submit(menu_op::SELECT, self.latched_index());
            }
            host_cmd::SEARCH_RESET => {
                let _ = self.chan.command.submit(menu_op::SEARCH_RESET, 0);
            }
            host_cmd::PAGE_LOAD => {
                // Reclaim the page before core 1 refills it; reads in the
                // interval see 0xFF, which the driver treats as "loading".
                self.chan.page_ready.clear();
                let _ = self.chan.command.submit(menu_op::PAGE_LOAD, self.latched_index());
            }
            _ => {}
        }
    }
}

impl Interceptor for MenuOverlay<'_> {
    fn write(&mut self, addr: u16, data: u8) -> bool {
        if !Self::intercepts(addr) {
            return false;
        }
        self.reg_write(addr & 0x7F, data);
        true
    }

    fn read(&mut self, addr: u16) -> Option<u8> {
        if !Self::intercepts(addr) {
            return None;
        }
        Some(self.reg_read(addr & 0x7F))
    }
}
