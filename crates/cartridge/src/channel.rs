//! Cross-core channels: the shared state between the bus loop (core 0)
//! and the background core (core 1).
//!
//! Built entirely from `platform::mailbox` primitives. Each field
//! has exactly one producer:
//!
//! | Field | Producer | Consumer |
//! |-------|----------|----------|
//! | `DiskChannel::command` | core 0 (IDE overlay) | core 1 |
//! | `read_ready/read_failed/write_ready/write_failed` | core 1 | core 0 |
//! | `identify_pending` | core 0 | core 1 |
//! | `sector` buffer | alternating, mediated by command/flags |
//! | `status_mirror` | core 0 (overlay state machine) | core 1 |
//! | `media_present` | core 1 | core 0 |
//! | `MenuChannel::command` | core 0 (menu overlay) | core 1 |
//! | `record_count`, `busy`, `page_ready`, `page` | core 1 | core 0 |

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};
use platform::{BufferCell, CommandSlot, Flag, SECTOR_BYTES};

/// Disk-channel opcodes (core 0 → core 1).
pub mod disk_op {
    /// Read one sector; argument = LBA.
    pub const READ_SECTOR: u8 = 0x01;
    /// Write one sector from the shared buffer; argument = LBA.
    pub const WRITE_SECTOR: u8 = 0x02;
    /// Produce the 512-byte IDENTIFY block into the shared buffer.
    pub const IDENTIFY: u8 = 0x03;
}

/// Menu-channel opcodes (core 0 → core 1).
pub mod menu_op {
    /// Rescan the medium and rebuild the catalog.
    pub const REFRESH: u8 = 0x01;
    /// Boot the catalog entry whose index is the argument.
    pub const SELECT: u8 = 0x02;
    /// Clear the incremental search string.
    pub const SEARCH_RESET: u8 = 0x03;
    /// Append one character (argument low byte) to the search string.
    pub const SEARCH_CHAR: u8 = 0x04;
    /// Load the record page for the index in the argument.
    pub const PAGE_LOAD: u8 = 0x05;
}

/// Shared state for disk mode.
pub struct DiskChannel {
    /// Single-shot ATA command from the overlay to core 1.
    pub command: CommandSlot,
    /// Core 1 finished filling `sector` for a read (or IDENTIFY).
    pub read_ready: Flag,
    /// Core 1 could not produce the requested sector.
    pub read_failed: Flag,
    /// Core 1 finished committing `sector` to the medium.
    pub write_ready: Flag,
    /// Core 1 could not commit the sector.
    pub write_failed: Flag,
    /// An IDENTIFY is outstanding; gates USB enumeration priority on core 1.
    pub identify_pending: Flag,
    /// The one in-flight sector. Ownership alternates with the command.
    pub sector: BufferCell<SECTOR_BYTES>,
    /// Mirror of the ATA status byte, written only by the overlay.
    status_mirror: AtomicU8,
    /// Medium attached and mounted (core 1 → core 0).
    media_present: AtomicBool,
}

impl DiskChannel {
    /// Idle channel: no command, no completions, no medium.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            command: CommandSlot::new(),
            read_ready: Flag::new(),
            read_failed: Flag::new(),
            write_ready: Flag::new(),
            write_failed: Flag::new(),
            identify_pending: Flag::new(),
            sector: BufferCell::new(),
            status_mirror: AtomicU8::new(0),
            media_present: AtomicBool::new(false),
        }
    }

    /// Publish the ATA status byte (overlay side).
    pub fn set_status_mirror(&self, status: u8) {
        self.status_mirror.store(status, Ordering::Release);
    }

    /// Last published ATA status byte (core-1 side, for logging/decisions).
    #[must_use]
    pub fn status_mirror(&self) -> u8 {
        self.status_mirror.load(Ordering::Acquire)
    }

    /// Core 1 reports the medium state after (un)mount.
    pub fn set_media_present(&self, present: bool) {
        self.media_present.store(present, Ordering::Release);
    }

    /// `true` while a mounted medium is available.
    #[must_use]
    pub fn media_present(&self) -> bool {
        self.media_present.load(Ordering::Acquire)
    }

    /// Drop all in-flight work: pending command and stale completions.
    /// Called on host-initiated device reset; any late completion from
    /// core 1 is subsequently discarded by the overlay's `service`.
    pub fn abort_in_flight(&self) {
        self.command.cancel();
        self.read_ready.clear();
        self.read_failed.clear();
        self.write_ready.clear();
        self.write_failed.clear();
        self.identify_pending.clear();
    }
}

impl Default for DiskChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes in the menu record-page window.
pub const MENU_PAGE_BYTES: usize = 64;

/// Shared state for menu mode.
pub struct MenuChannel {
    /// Single-shot menu command from the overlay to core 1.
    pub command: CommandSlot,
    /// Core 1 finished filling `page` for the last PAGE_LOAD.
    pub page_ready: Flag,
    /// One catalog record, formatted for the host's page window.
    pub page: BufferCell<MENU_PAGE_BYTES>,
    record_count: AtomicU16,
    busy: AtomicBool,
    media_present: AtomicBool,
}

impl MenuChannel {
    /// Empty channel: no records, not busy, no medium.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            command: CommandSlot::new(),
            page_ready: Flag::new(),
            page: BufferCell::new(),
            record_count: AtomicU16::new(0),
            busy: AtomicBool::new(false),
            media_present: AtomicBool::new(false),
        }
    }

    /// Core 1 publishes the (possibly filtered) catalog size.
    pub fn set_record_count(&self, count: u16) {
        self.record_count.store(count, Ordering::Release);
    }

    /// Records visible to the host.
    #[must_use]
    pub fn record_count(&self) -> u16 {
        self.record_count.load(Ordering::Acquire)
    }

    /// Core 1 marks a scan/search in progress.
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    /// `true` while core 1 is rebuilding the catalog.
    #[must_use]
    pub fn busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Core 1 reports the medium state.
    pub fn set_media_present(&self, present: bool) {
        self.media_present.store(present, Ordering::Release);
    }

    /// `true` while a mounted medium is available.
    #[must_use]
    pub fn media_present(&self) -> bool {
        self.media_present.load(Ordering::Acquire)
    }
}

impl Default for MenuChannel {
    fn default() -> Self {
        Self::new()
    }
}
