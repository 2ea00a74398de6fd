//! Core-1 background executor: everything with unbounded latency.
//!
//! Core 1 never touches the bus FIFOs; its only contact with core 0 is
//! the disk/menu channels. The loop structure is cooperative embassy
//! tasks, each yielding between small work units:
//!
//! - disk service — consume one ATA command, run it against the sector
//!   device, raise the completion flag;
//! - menu service — consume one control-surface command, answer from the
//!   catalog, trigger rescans;
//! - audio pump — one frame block per step, behind the collaborator seams.
//!
//! The removable-storage *transport* (USB mass-storage / SD) is an
//! out-of-scope collaborator: the generic `run_disk`/`scan_catalog`
//! functions are instantiated by the transport glue with its concrete
//! device, and the `*_no_medium` tasks are what boots when none is linked
//! in — every command then fails after the mount grace interval, which is
//! exactly what the host-side driver expects of an empty controller.

// Chunk bookkeeping is bounded by the catalog capacity.
#![allow(clippy::arithmetic_side_effects)]

use core::sync::atomic::{AtomicBool, Ordering};

use cartridge::catalog::{Catalog, CatalogEntry, MAX_CATALOG_ENTRIES};
use cartridge::channel::{DiskChannel, MenuChannel};
use cartridge::mapper::MapperKind;
use embassy_futures::yield_now;
use embassy_time::Timer;
use embedded_sdmmc::{BlockDevice, TimeSource, VolumeIdx, VolumeManager};
use platform::SectorDevice;

use crate::ata_service;
use crate::menu_service::{MenuAction, MenuService};

/// Grace interval before a command against a missing medium fails.
/// The host sees BSY for this long, then ERR|ABRT; DOS drivers retry on
/// their own schedule, so a late-enumerating stick still mounts.
pub const MOUNT_GRACE_MS: u64 = 2000;

/// Directory entries processed per cooperative scan step.
pub const SCAN_CHUNK: usize = 8;

/// Raised while the audio pump is streaming; the scanner defers to it
/// because both compete for the same storage transport.
pub static AUDIO_ACTIVE: AtomicBool = AtomicBool::new(false);

// ── Disk mode ────────────────────────────────────────────────────────────────

/// Adapter exposing any `embedded-sdmmc` block device (USB mass storage,
/// SD over SPI) as the disk channel's [`SectorDevice`]. The transport
/// glue wraps its medium in this and hands it to [`run_disk`]; the same
/// underlying device also backs the FAT volume the menu scans.
pub struct BlockSectorDevice<D: embedded_sdmmc::BlockDevice> {
    dev: D,
    sectors: u32,
}

impl<D: embedded_sdmmc::BlockDevice> BlockSectorDevice<D> {
    /// Wrap a block device, caching its size (the IDENTIFY geometry).
    pub fn new(dev: D) -> Self {
        let sectors = dev.num_blocks().map(|n| n.0).unwrap_or(0);
        Self { dev, sectors }
    }
}

impl<D: embedded_sdmmc::BlockDevice> SectorDevice for BlockSectorDevice<D> {
    fn sector_count(&self) -> u32 {
        self.sectors
    }

    fn read_sector(
        &mut self,
        lba: u32,
        buf: &mut [u8; platform::SECTOR_BYTES],
    ) -> Result<(), platform::SectorError> {
        if lba >= self.sectors {
            return Err(platform::SectorError::OutOfRange);
        }
        let mut blocks = [embedded_sdmmc::Block::new()];
        self.dev
            .read(&mut blocks, embedded_sdmmc::BlockIdx(lba))
            .map_err(|_| platform::SectorError::Io)?;
        if let Some(block) = blocks.first() {
            buf.copy_from_slice(&block.contents);
        }
        Ok(())
    }

    fn write_sector(
        &mut self,
        lba: u32,
        buf: &[u8; platform::SECTOR_BYTES],
    ) -> Result<(), platform::SectorError> {
        if lba >= self.sectors {
            return Err(platform::SectorError::OutOfRange);
        }
        let mut blocks = [embedded_sdmmc::Block::new()];
        if let Some(block) = blocks.first_mut() {
            block.contents.copy_from_slice(buf);
        }
        self.dev
            .write(&blocks, embedded_sdmmc::BlockIdx(lba))
            .map_err(|_| platform::SectorError::Io)
    }
}

/// Service loop with a live medium, instantiated by the transport glue.
/// Loops for the life of the medium.
pub async fn run_disk<D: SectorDevice>(chan: &'static DiskChannel, dev: &mut D) {
    chan.set_media_present(true);
    loop {
        if let Some((op, arg)) = chan.command.take() {
            ata_service::service_disk_command(chan, dev, op, arg);
        }
        yield_now().await;
    }
}

/// Disk service with no transport linked in: every command fails after
/// the grace interval.
#[embassy_executor::task]
pub async fn disk_service_no_medium(chan: &'static DiskChannel) {
    chan.set_media_present(false);
    loop {
        if let Some((op, _arg)) = chan.command.take() {
            Timer::after_millis(MOUNT_GRACE_MS).await;
            ata_service::fail_disk_command(chan, op);
            defmt::warn!("disk command {=u8} failed: no medium", op);
        }
        Timer::after_millis(2).await;
    }
}

// ── Menu mode ────────────────────────────────────────────────────────────────

/// Walk the volume's root directory into a catalog, [`SCAN_CHUNK`] entries
/// per cooperative step, deferring entirely while audio is active.
///
/// # Errors
/// Propagates any filesystem error from `embedded-sdmmc`; the caller
/// publishes an empty catalog and keeps the old one on screen.
pub async fn scan_catalog<D: BlockDevice, T: TimeSource>(
    volume_mgr: &mut VolumeManager<D, T>,
) -> Result<Catalog, embedded_sdmmc::Error<D::Error>> {
    // One FAT pass collects the raw entries…
    let mut raw: heapless::Vec<(heapless::String<50>, u32), MAX_CATALOG_ENTRIES> =
        heapless::Vec::new();
    {
        let mut volume = volume_mgr.open_volume(VolumeIdx(0))?;
        let mut root = volume.open_root_dir()?;
        root.iterate_dir(|entry| {
            if raw.is_full() || entry.attributes.is_directory() {
                return;
            }
            let mut name: heapless::String<50> = heapless::String::new();
            let _ = core::fmt::write(&mut name, format_args!("{}", entry.name));
            if name_is_bootable(name.as_str()) {
                let _ = raw.push((name, entry.size));
            }
        })?;
    }
    // …then the cooperative pass builds records 8 at a time, so IDE
    // traffic and audio stay serviced during a large directory.
    let mut catalog = Catalog::new();
    for (i, (name, size)) in raw.iter().enumerate() {
        if i % SCAN_CHUNK == 0 {
            while AUDIO_ACTIVE.load(Ordering::Acquire) {
                Timer::after_millis(20).await;
            }
            yield_now().await;
        }
        let _ = catalog.entries.push(CatalogEntry {
            name: name.clone(),
            mapper: guess_mapper(*size).selector(),
            size: *size,
        });
    }
    Ok(catalog)
}

/// On-medium catalog cache (8.3 name in the volume root). A valid cache
/// lets a re-inserted stick skip the full rescan; a CRC mismatch or any
/// read error falls back to scanning.
pub const CATALOG_FILE: &str = "PICOSLOT.CAT";

/// Read and verify the cached catalog, if the medium carries one.
pub fn load_cached_catalog<D: BlockDevice, T: TimeSource>(
    volume_mgr: &mut VolumeManager<D, T>,
    scratch: &mut [u8],
) -> Option<Catalog> {
    let mut volume = volume_mgr.open_volume(VolumeIdx(0)).ok()?;
    let mut root = volume.open_root_dir().ok()?;
    let mut file = root
        .open_file_in_dir(CATALOG_FILE, embedded_sdmmc::Mode::ReadOnly)
        .ok()?;
    let n = file.read(scratch).ok()?;
    Catalog::decode(scratch.get(..n)?).ok()
}

/// Persist a freshly scanned catalog. Failure is logged, not fatal: the
/// next insertion just rescans.
pub fn store_catalog<D: BlockDevice, T: TimeSource>(
    volume_mgr: &mut VolumeManager<D, T>,
    catalog: &Catalog,
    scratch: &mut [u8],
) {
    let Ok(n) = catalog.encode(scratch) else {
        defmt::warn!("catalog too large for the cache scratch buffer");
        return;
    };
    let mut write_back = || -> Result<(), ()> {
        let mut volume = volume_mgr.open_volume(VolumeIdx(0)).map_err(|_| ())?;
        let mut root = volume.open_root_dir().map_err(|_| ())?;
        let mut file = root
            .open_file_in_dir(CATALOG_FILE, embedded_sdmmc::Mode::ReadWriteCreateOrTruncate)
            .map_err(|_| ())?;
        file.write(scratch.get(..n).ok_or(())?).map_err(|_| ())
    };
    if write_back().is_err() {
        defmt::warn!("catalog cache write failed");
    }
}

/// Menu loop with a live medium, instantiated by the transport glue.
/// `scratch` holds the encoded catalog cache (sized by the glue, which
/// owns core 1's memory budget). Loops for the life of the medium.
pub async fn run_menu<D: BlockDevice, T: TimeSource>(
    chan: &'static MenuChannel,
    volume_mgr: &mut VolumeManager<D, T>,
    scratch: &mut [u8],
) {
    let mut svc = MenuService::new();
    chan.set_media_present(true);

    chan.set_busy(true);
    if let Some(cached) = load_cached_catalog(volume_mgr, scratch) {
        defmt::info!("catalog cache hit: {=usize} records", cached.entries.len());
        svc.install_catalog(cached, chan);
    } else {
        match scan_catalog(volume_mgr).await {
            Ok(catalog) => {
                store_catalog(volume_mgr, &catalog, scratch);
                svc.install_catalog(catalog, chan);
            }
            Err(_) => defmt::warn!("initial catalog scan failed"),
        }
    }
    chan.set_busy(false);

    loop {
        if let Some((op, arg)) = chan.command.take() {
            match svc.handle(chan, op, arg) {
                Some(MenuAction::Rescan) => {
                    chan.set_busy(true);
                    match scan_catalog(volume_mgr).await {
                        Ok(catalog) => {
                            store_catalog(volume_mgr, &catalog, scratch);
                            svc.install_catalog(catalog, chan);
                        }
                        Err(_) => defmt::warn!("rescan failed; keeping old catalog"),
                    }
                    chan.set_busy(false);
                }
                Some(MenuAction::Boot(index)) => {
                    // The flash install + reset runs before the bus engine
                    // arms on the next boot; here we only record the pick.
                    defmt::info!("boot selection: catalog entry {=usize}", index);
                    crate::rom_cache::request_boot(index);
                }
                None => {}
            }
        }
        yield_now().await;
    }
}

/// Menu service with no transport linked in: an empty catalog, media
/// absent, commands answered so the menu ROM never wedges.
#[embassy_executor::task]
pub async fn menu_service_no_medium(chan: &'static MenuChannel) {
    let mut svc = MenuService::new();
    chan.set_media_present(false);
    svc.install_catalog(Catalog::new(), chan);
    loop {
        if let Some((op, arg)) = chan.command.take() {
            let _ = svc.handle(chan, op, arg);
        }
        Timer::after_millis(5).await;
    }
}

// ── Audio ────────────────────────────────────────────────────────────────────

/// Audio pump task over the collaborator seams. With no synthesizer or
/// sink attached it idles on silence and never raises [`AUDIO_ACTIVE`].
#[embassy_executor::task]
pub async fn audio_pump_idle() {
    AUDIO_ACTIVE.store(false, Ordering::Release);
    loop {
        Timer::after_millis(50).await;
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn name_is_bootable(name: &str) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    ext.eq_ignore_ascii_case("ROM")
}

/// Size-based mapper guess for entries with no sidecar hint. Content
/// fingerprinting lives in the host-side packer; on-device we only need
/// a selector that boots the common cases.
fn guess_mapper(size: u32) -> MapperKind {
    match size {
        0..=0x4000 => MapperKind::Plain16,
        0x4001..=0x8000 => MapperKind::Plain32,
        0x8001..=0xC000 => MapperKind::Linear48,
        _ => MapperKind::KonamiScc,
    }
}
