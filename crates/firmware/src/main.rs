//! PicoSlot firmware — RP2040 entry point.
//!
//! Boot order matters and is driven by `/WAIT`:
//!
//! 1. claim the bus pins — the PIO front-end drives `/WAIT` low at once,
//!    freezing a host that is already strobing the slot;
//! 2. decode the flash header (halt on corruption);
//! 3. stage the ROM cache with byte-width DMA;
//! 4. spawn core 1 (storage, menu, audio executor);
//! 5. arm the state machines (`/WAIT` releases) and enter the dispatch
//!    loop selected by the header. Core 0 never returns from it.

#![no_std]
#![no_main]

use cartridge::dispatch::{self, DiskInterceptor, NoInterceptor};
use cartridge::mapper::{
    Ascii16, Ascii8, Konami, KonamiScc, Linear48, MapperKind, Neo16, Neo8, Plain, SunriseIde,
};
use cartridge::{CachePlan, DiskChannel, HeaderError, IdeOverlay, MenuChannel, MenuOverlay, RomHeader};
use embassy_executor::Executor;
use embassy_rp::multicore::{spawn_core1, Stack};
use firmware::bus_pio::{BusFrontEnd, BusPins};
use firmware::{core1, rom_cache};
use platform::memory_map::{CORE1_STACK_BYTES, ROM_CACHE_BYTES};
use static_cell::{ConstStaticCell, StaticCell};

use defmt_rtt as _;
use panic_probe as _;

// The ROM cache: the single biggest SRAM object. ConstStaticCell places
// the zeroed array in .bss, so nothing this size ever crosses a stack.
static ROM_CACHE: ConstStaticCell<[u8; ROM_CACHE_BYTES]> =
    ConstStaticCell::new([0u8; ROM_CACHE_BYTES]);

// Cross-core state. Statics because both cores (and the overlay handed
// to the dispatcher) hold &'static to them; each field is single-writer
// per the channel discipline.
static DISK_CHANNEL: DiskChannel = DiskChannel::new();
static MENU_CHANNEL: MenuChannel = MenuChannel::new();

static CORE1_STACK: ConstStaticCell<Stack<CORE1_STACK_BYTES>> = ConstStaticCell::new(Stack::new());
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

#[cortex_m_rt::entry]
fn main() -> ! {
    // Stock clocks: the front-end's timing-critical edge (asserting /WAIT
    // on the read strobe) is a PIO side-set, one PIO clock after the wait
    // completes — 8 ns at 125 MHz, far inside the host's sample window.
    // Everything after that happens under /WAIT and only stretches the
    // cycle, so core-0 code speed is a latency knob, not a correctness one.
    let p = embassy_rp::init(Default::default());
    defmt::info!("PicoSlot firmware v{=str}", env!("CARGO_PKG_VERSION"));

    // Step 1: /WAIT low before anything else can be observed by the host.
    let mut bus = BusFrontEnd::init(
        p.PIO0,
        BusPins {
            a: (
                p.PIN_0, p.PIN_1, p.PIN_2, p.PIN_3, p.PIN_4, p.PIN_5, p.PIN_6, p.PIN_7, p.PIN_8,
                p.PIN_9, p.PIN_10, p.PIN_11, p.PIN_12, p.PIN_13, p.PIN_14, p.PIN_15,
            ),
            d: (
                p.PIN_16, p.PIN_17, p.PIN_18, p.PIN_19, p.PIN_20, p.PIN_21, p.PIN_22, p.PIN_23,
            ),
            sltsl: p.PIN_24,
            rd: p.PIN_25,
            wr: p.PIN_26,
            wait: p.PIN_27,
        },
    );

    // A menu selection parked across the reset is installed here, before
    // the engine arms, by the storage-transport glue (out-of-scope seam).
    if let Some(index) = rom_cache::take_boot_request() {
        defmt::info!("pending boot selection: catalog entry {=u32}", index);
    }

    // Step 2: the flash header decides everything else.
    let header = match RomHeader::decode(rom_cache::header_bytes()) {
        Ok(h) => h,
        Err(HeaderError::UnknownMapper(selector)) => rom_cache::halt_bad_header(selector),
        Err(_) => rom_cache::halt_bad_header(0),
    };
    defmt::info!(
        "image {=str}: mapper {=u8}, {=u32} bytes",
        header.name_str(),
        header.mapper.selector(),
        header.rom_len,
    );

    // Step 3: stage the cache. Disk mode repurposes the SRAM region as
    // workspace, so its (small) driver ROM runs uncached from XIP.
    let image = rom_cache::image_bytes(&header);
    let disk_mode = header.mapper == MapperKind::SunriseIde;
    let plan = CachePlan::plan(image.len(), ROM_CACHE_BYTES, !disk_mode);
    let rom = embassy_futures::block_on(rom_cache::stage(p.DMA_CH0, ROM_CACHE.take(), image, plan));
    defmt::info!("staged {=usize} of {=u32} bytes", rom.cached_len(), rom.available_len());

    // Step 4: core 1. The timer IRQ stays on core 0, which is tolerable:
    // it fires only for core-1 timers, and /WAIT turns its ~1 µs handler
    // into one stretched host cycle, never a lost event (the FIFOs hold
    // the interval's traffic with depth to spare).
    let menu_mode = header.is_menu();
    spawn_core1(p.CORE1, CORE1_STACK.take(), move || {
        let executor = EXECUTOR1.init(Executor::new());
        executor.run(|spawner| {
            spawner.must_spawn(core1::audio_pump_idle());
            if disk_mode {
                spawner.must_spawn(core1::disk_service_no_medium(&DISK_CHANNEL));
            } else if menu_mode {
                spawner.must_spawn(core1::menu_service_no_medium(&MENU_CHANNEL));
            }
        })
    });

    // Step 5: release the host into the dispatch loop for this mapper.
    // One monomorphized loop per variant; the choice happens exactly once.
    bus.arm();
    let port = bus.port();
    match header.mapper {
        MapperKind::Plain16 | MapperKind::Plain32 if menu_mode => {
            dispatch::run_blocking(port, Plain, MenuOverlay::new(&MENU_CHANNEL), &rom)
        }
        MapperKind::Plain16 | MapperKind::Plain32 => {
            dispatch::run_blocking(port, Plain, NoInterceptor, &rom)
        }
        MapperKind::Linear48 => dispatch::run_blocking(port, Linear48, NoInterceptor, &rom),
        MapperKind::KonamiScc => {
            dispatch::run_blocking(port, KonamiScc::new(), NoInterceptor, &rom)
        }
        MapperKind::Konami => dispatch::run_blocking(port, Konami::new(), NoInterceptor, &rom),
        MapperKind::Ascii8 => dispatch::run_blocking(port, Ascii8::new(), NoInterceptor, &rom),
        MapperKind::Ascii16 => dispatch::run_blocking(port, Ascii16::new(), NoInterceptor, &rom),
        MapperKind::Neo8 => dispatch::run_blocking(port, Neo8::new(), NoInterceptor, &rom),
        MapperKind::Neo16 => dispatch::run_blocking(port, Neo16::new(), NoInterceptor, &rom),
        MapperKind::SunriseIde => dispatch::run_disk(
            port,
            SunriseIde::new(),
            DiskInterceptor::new(IdeOverlay::new(&DISK_CHANNEL)),
            &rom,
        ),
    }
}
