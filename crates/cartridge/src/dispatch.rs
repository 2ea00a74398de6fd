//! The dispatcher: turns captured bus cycles into response tokens and bank
//! register updates, at sustained host rate, without ever dropping a write.
//!
//! Two loop shapes, chosen once at startup:
//!
//! - **Blocking** ([`run_blocking`]) — drain writes, block on the next read
//!   sample, drain again, respond. Valid only for variants whose writes are
//!   issued by code executing out of this cartridge: the interleaved opcode
//!   fetches bound any write run to less than the FIFO depth.
//! - **Polling** ([`run_disk`]) — never blocks; drains writes and peeks the
//!   read FIFO in a tight loop. Required for the disk variant, whose
//!   task-file setup is a burst of 8–9 writes from RAM-resident driver
//!   code with no intervening read of this slot.
//!
//! Ordering guarantee (both shapes): any write whose strobe fell before the
//! current read's strobe is applied to the register file before that read
//! is answered. The write FIFO is drained before *and after* the read pop —
//! the front-end may enqueue the two with any interleaving, but each FIFO
//! is itself ordered, and `/WAIT` stalls the host until the token lands, so
//! no later write can exist while a read is being answered.
//!
//! Tie-breaks: writes are always consumed first; an interceptor sees each
//! access before the mapper, and an unconsumed write falls through.

use crate::bus::{BusPort, BusSample, Token};
use crate::ide::IdeOverlay;
use crate::mapper::{Mapper, SunriseIde};
use crate::rom::RomSource;

/// Overlay seam consulted ahead of the ROM path.
///
/// `write` returns `true` when the access was consumed; `read` returns the
/// intercepted byte. The default `service` is a no-op for overlays with no
/// cross-core completions to fold in.
pub trait Interceptor {
    /// Poll cross-core completions. Called once per loop iteration.
    fn service(&mut self) {}

    /// Offer a captured write; `true` consumes it.
    fn write(&mut self, addr: u16, data: u8) -> bool;

    /// Offer a read; `Some` answers it in place of ROM.
    fn read(&mut self, addr: u16) -> Option<u8>;
}

/// Interceptor for plain ROM mappers: nothing is ever intercepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterceptor;

impl Interceptor for NoInterceptor {
    #[inline]
    fn write(&mut self, _addr: u16, _data: u8) -> bool {
        false
    }

    #[inline]
    fn read(&mut self, _addr: u16) -> Option<u8> {
        None
    }
}

#[inline]
fn apply_write<M: Mapper, I: Interceptor>(mapper: &mut M, icept: &mut I, sample: BusSample) {
    if !sample.selected() {
        return; // foreign strobe latched by the captor; not ours
    }
    let (addr, data) = (sample.addr(), sample.data());
    if !icept.write(addr, data) {
        mapper.write(addr, data);
    }
}

#[inline]
fn drain_writes<P: BusPort, M: Mapper, I: Interceptor>(port: &mut P, mapper: &mut M, icept: &mut I) {
    while let Some(sample) = port.try_pop_write() {
        apply_write(mapper, icept, sample);
    }
}

#[inline]
fn respond<P: BusPort, M: Mapper, I: Interceptor>(
    port: &mut P,
    mapper: &M,
    icept: &mut I,
    rom: &RomSource<'_>,
    sample: BusSample,
) {
    if !sample.selected() {
        // A foreign read strobe released the responder's wait; answer
        // tri-state so nothing is driven into another device's cycle.
        port.push_token(Token::TRISTATE);
        return;
    }
    let addr = sample.addr();
    if let Some(byte) = icept.read(addr) {
        port.push_token(Token::drive(byte));
        return;
    }
    if M::window_contains(addr) {
        // Out-of-image offsets read the filler byte from the ROM source.
        port.push_token(Token::drive(rom.read(mapper.offset(addr))));
    } else {
        port.push_token(Token::TRISTATE);
    }
}

/// One blocking iteration: drain, block on a read, drain, respond.
/// Exposed separately so host tests can drive the loop cycle by cycle.
pub fn step_blocking<P: BusPort, M: Mapper, I: Interceptor>(
    port: &mut P,
    mapper: &mut M,
    icept: &mut I,
    rom: &RomSource<'_>,
) {
    drain_writes(port, mapper, icept);
    let sample = port.pop_read();
    // Writes that strobed before this read may have landed in their FIFO
    // while we were blocked; apply them before answering.
    drain_writes(port, mapper, icept);
    icept.service();
    respond(port, mapper, icept, rom, sample);
}

/// One polling iteration. Returns `true` if any FIFO had work.
/// Never blocks: a write burst longer than the FIFO is absorbed because
/// draining happens every iteration, not only around reads.
pub fn step_polling<P: BusPort, M: Mapper, I: Interceptor>(
    port: &mut P,
    mapper: &mut M,
    icept: &mut I,
    rom: &RomSource<'_>,
) -> bool {
    let mut worked = false;
    while let Some(sample) = port.try_pop_write() {
        apply_write(mapper, icept, sample);
        worked = true;
    }
    if let Some(sample) = port.try_pop_read() {
        // `/WAIT` holds the host, so everything still in the write FIFO
        // strobed before this read; fold it in first.
        drain_writes(port, mapper, icept);
        icept.service();
        respond(port, mapper, icept, rom, sample);
        worked = true;
    } else {
        icept.service();
    }
    worked
}

/// The blocking dispatcher loop for plain ROM variants (and the menu
/// overlay, whose command traffic is read-punctuated by definition).
pub fn run_blocking<P: BusPort, M: Mapper, I: Interceptor>(
    mut port: P,
    mut mapper: M,
    mut icept: I,
    rom: &RomSource<'_>,
) -> ! {
    loop {
        step_blocking(&mut port, &mut mapper, &mut icept, rom);
    }
}

/// The disk interceptor: gates the IDE overlay behind the mapper's
/// overlay-enable bit, which it observes from control-register traffic
/// without consuming it (the mapper still latches the page bits).
pub struct DiskInterceptor<'a> {
    ide: IdeOverlay<'a>,
    enabled: bool,
}

impl<'a> DiskInterceptor<'a> {
    /// Wrap the overlay; disabled until the host sets control bit 0.
    #[must_use]
    pub fn new(ide: IdeOverlay<'a>) -> Self {
        Self { ide, enabled: false }
    }

    /// Overlay access for tests and diagnostics.
    #[must_use]
    pub fn overlay(&self) -> &IdeOverlay<'a> {
        &self.ide
    }
}

impl Interceptor for DiskInterceptor<'_> {
    #[inline]
    fn service(&mut self) {
        self.ide.service();
    }

    #[inline]
    fn write(&mut self, addr: u16, data: u8) -> bool {
        if addr == SunriseIde::CONTROL_ADDR {
            // Observe the enable bit but let the mapper latch the page.
            self.enabled = data & 0x01 != 0;
            return false;
        }
        if self.enabled && IdeOverlay::intercepts(addr) {
            self.ide.write(addr, data);
            return true;
        }
        false
    }

    #[inline]
    fn read(&mut self, addr: u16) -> Option<u8> {
        if self.enabled && IdeOverlay::intercepts(addr) {
            Some(self.ide.read(addr))
        } else {
            None
        }
    }
}

/// The polling dispatcher loop for the disk variant.
pub fn run_disk<P: BusPort>(
    mut port: P,
    mut mapper: SunriseIde,
    mut icept: DiskInterceptor<'_>,
    rom: &RomSource<'_>,
) -> ! {
    loop {
        step_polling(&mut port, &mut mapper, &mut icept, rom);
    }
}
