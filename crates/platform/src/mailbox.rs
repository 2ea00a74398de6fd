//! Single-producer/single-consumer cross-core primitives.
//!
//! The two RP2040 cores share state without locks: every shared field has
//! exactly one writer, hand-offs are release stores observed by acquire
//! loads, and nothing on the core-0 hot path ever spins on core 1.
//!
//! The vocabulary is three types:
//!
//! - [`Flag`] — a one-bit completion signal. The producer raises it, the
//!   consumer observes and lowers it.
//! - [`CommandSlot`] — a single-shot (opcode, argument) mailbox. The
//!   producer writes the payload first and raises `pending` *last* with a
//!   release store; the consumer's acquire load of `pending` therefore
//!   guarantees it sees the payload.
//! - [`BufferCell`] — a fixed-size byte buffer whose ownership alternates
//!   between the cores, mediated by a [`Flag`] (or the IDE phase machine).
//!
//! ## Why plain load/store is enough
//!
//! The Cortex-M0+ has no hardware compare-and-swap, and `core::sync::atomic`
//! exposes only load/store on ARMv6-M. That is sufficient here: with exactly
//! one writer per field there is never a read-modify-write race to resolve.
//! Even `Flag::take` (observe-then-clear) is two independent operations,
//! safe because only the consumer ever clears.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

// ── Flag ─────────────────────────────────────────────────────────────────────

/// One-bit completion signal with a fixed producer and a fixed consumer.
#[derive(Debug)]
pub struct Flag {
    raised: AtomicBool,
}

impl Flag {
    /// A lowered flag.
    #[must_use]
    pub const fn new() -> Self {
        Self { raised: AtomicBool::new(false) }
    }

    /// Raise the flag (producer side). Release store: everything the
    /// producer wrote before this call is visible to a consumer that
    /// observes the flag.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Observe and lower the flag (consumer side). Returns `true` at most
    /// once per `raise`.
    pub fn take(&self) -> bool {
        if self.raised.load(Ordering::Acquire) {
            // Only the consumer clears, so load-then-store cannot lose a
            // second raise: the producer never raises while the consumer
            // still owns the hand-off.
            self.raised.store(false, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Non-consuming peek (consumer side).
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Lower without observing (reset paths).
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Relaxed);
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new()
    }
}

// ── CommandSlot ──────────────────────────────────────────────────────────────

/// Single-shot (opcode, argument) mailbox from one core to the other.
///
/// `submit` refuses a new command while one is still pending; the producer
/// is expected to check the previous completion flag first, so a refusal
/// indicates a protocol bug on the producer side, not a transient state.
#[derive(Debug)]
pub struct CommandSlot {
    op: AtomicU8,
    arg: AtomicU32,
    pending: AtomicBool,
}

impl CommandSlot {
    /// An empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            op: AtomicU8::new(0),
            arg: AtomicU32::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Post a command (producer side). Returns `false` if the previous
    /// command has not been consumed yet; the slot is left untouched.
    pub fn submit(&self, op: u8, arg: u32) -> bool {
        if self.pending.load(Ordering::Acquire) {
            return false;
        }
        self.op.store(op, Ordering::Relaxed);
        self.arg.store(arg, Ordering::Relaxed);
        // Payload first, pending last: the release pairs with the
        // consumer's acquire in `take`.
        self.pending.store(true, Ordering::Release);
        true
    }

    /// Consume the pending command, if any (consumer side).
    pub fn take(&self) -> Option<(u8, u32)> {
        if !self.pending.load(Ordering::Acquire) {
            return None;
        }
        let op = self.op.load(Ordering::Relaxed);
        let arg = self.arg.load(Ordering::Relaxed);
        // Release so the producer's next `submit` (acquire) sees the slot
        // free only after the payload reads above are done.
        self.pending.store(false, Ordering::Release);
        Some((op, arg))
    }

    /// Discard a pending command without running it (reset paths).
    pub fn cancel(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// `true` while a command awaits consumption.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for CommandSlot {
    fn default() -> Self {
        Self::new()
    }
}

// ── BufferCell ───────────────────────────────────────────────────────────────

/// Fixed-size byte buffer shared between the cores.
///
/// The cell itself enforces nothing; ownership alternates by protocol. For
/// the IDE sector buffer the protocol is: core 1 fills the buffer, then
/// raises `read_ready`; core 0 drains it only while the overlay phase is
/// `ReadData` (and symmetrically for writes). The accessors are `unsafe`
/// because the compiler cannot see that protocol.
#[repr(C)]
pub struct BufferCell<const N: usize> {
    bytes: UnsafeCell<[u8; N]>,
}

// SAFETY: shared access is mediated by the owner protocol documented above;
// at any instant exactly one core reads or writes the contents, and every
// ownership transfer goes through a release/acquire Flag or CommandSlot.
unsafe impl<const N: usize> Sync for BufferCell<N> {}

impl<const N: usize> BufferCell<N> {
    /// A zeroed buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: UnsafeCell::new([0u8; N]) }
    }

    /// Capacity in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    /// Always `false`: the buffer has a fixed, non-zero capacity.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Read one byte.
    ///
    /// Returns the filler value `0xFF` for an out-of-range index rather
    /// than panicking: the hot path must stay branch-cheap and total.
    ///
    /// # Safety
    /// The caller must currently own the buffer per the hand-off protocol.
    #[must_use]
    pub unsafe fn read_byte(&self, idx: usize) -> u8 {
        // SAFETY: ownership is the caller's obligation (fn contract); the
        // bounds are checked here.
        unsafe { (*self.bytes.get()).get(idx).copied().unwrap_or(0xFF) }
    }

    /// Write one byte. Out-of-range indices are ignored.
    ///
    /// # Safety
    /// The caller must currently own the buffer per the hand-off protocol.
    pub unsafe fn write_byte(&self, idx: usize, value: u8) {
        // SAFETY: ownership is the caller's obligation (fn contract); the
        // bounds are checked here.
        unsafe {
            if let Some(slot) = (*self.bytes.get()).get_mut(idx) {
                *slot = value;
            }
        }
    }

    /// Copy `src` into the buffer starting at offset 0. `src` longer than
    /// the buffer is truncated.
    ///
    /// # Safety
    /// The caller must currently own the buffer per the hand-off protocol.
    pub unsafe fn fill_from(&self, src: &[u8]) {
        // SAFETY: ownership is the caller's obligation (fn contract).
        unsafe {
            let dst = &mut *self.bytes.get();
            let n = src.len().min(N);
            if let (Some(d), Some(s)) = (dst.get_mut(..n), src.get(..n)) {
                d.copy_from_slice(s);
            }
        }
    }

    /// Copy the buffer into `dst` (truncating to the shorter of the two).
    ///
    /// # Safety
    /// The caller must currently own the buffer per the hand-off protocol.
    pub unsafe fn copy_into(&self, dst: &mut [u8]) {
        // SAFETY: ownership is the caller's obligation (fn contract).
        unsafe {
            let src = &*self.bytes.get();
            let n = dst.len().min(N);
            if let (Some(d), Some(s)) = (dst.get_mut(..n), src.get(..n)) {
                d.copy_from_slice(s);
            }
        }
    }
}

impl<const N: usize> Default for BufferCell<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
