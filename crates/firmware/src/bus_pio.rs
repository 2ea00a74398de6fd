//! PIO bus front-end: the read responder and write captor state machines,
//! and the raw-FIFO [`BusPort`] the dispatcher polls.
//!
//! ## Pin map (PIO-contiguous so one `in pins, 25` samples a whole cycle)
//!
//! | GPIO      | Signal   | Dir |
//! |-----------|----------|-----|
//! | 0..=15    | A0..A15  | in  |
//! | 16..=23   | D0..D7   | bidir (PIO drives only mid-read) |
//! | 24        | /SLTSL   | in  |
//! | 25        | /RD      | in  |
//! | 26        | /WR      | in  |
//! | 27        | /WAIT    | out (board buffers it open-collector) |
//!
//! Both machines autopush the same 25-bit sample: `[24]` /SLTSL, `[23:16]`
//! D0..D7, `[15:0]` A0..A15 — see `cartridge::bus::BusSample`.
//!
//! ## Why the read responder can latch a foreign strobe
//!
//! A state machine can `wait` on one GPIO. After a write cycle to this
//! slot the responder sits in `wait 0 RD`, and the strobe that releases it
//! may belong to another device (the host's next opcode fetch from RAM).
//! The sample carries /SLTSL for exactly this case; the dispatcher answers
//! tri-state and the host pays one stretched foreign fetch. Nothing is
//! ever driven on a deselected cycle: `pindirs` only opens from a token
//! whose direction byte the dispatcher set.
//!
//! ## FIFO shapes
//!
//! Read responder: 4-deep RX + 4-deep TX (a token must flow back). Write
//! captor: TX joined into RX for 8 deep — the whole reason the disk
//! dispatcher polls is that 9-write bursts exceed even that (§ dispatcher).
//!
//! The dispatcher reads the FIFOs through the PAC, not the async PIO API:
//! the hot loop is non-preemptible and a `wait_pull().await` would put an
//! executor between the host and its byte.

// FIFO status tests are single-bit shifts of a state-machine index.
#![allow(clippy::arithmetic_side_effects)]

use cartridge::{BusPort, BusSample, Token};
use embassy_rp::gpio::Level;
use embassy_rp::pac;
use embassy_rp::peripherals::{
    PIN_0, PIN_1, PIN_10, PIN_11, PIN_12, PIN_13, PIN_14, PIN_15, PIN_16, PIN_17, PIN_18, PIN_19,
    PIN_2, PIN_20, PIN_21, PIN_22, PIN_23, PIN_24, PIN_25, PIN_26, PIN_27, PIN_3, PIN_4, PIN_5,
    PIN_6, PIN_7, PIN_8, PIN_9, PIO0,
};
use embassy_rp::pio::{
    Common, Config, Direction, FifoJoin, InterruptHandler, Pio, ShiftConfig, ShiftDirection,
    StateMachine,
};
use embassy_rp::bind_interrupts;

bind_interrupts!(struct PioIrqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// Index of the read responder state machine.
const SM_READ: usize = 0;
/// Index of the write captor state machine.
const SM_WRITE: usize = 1;

/// Every bus-facing pin, in the fixed map above.
pub struct BusPins {
    /// A0..A15.
    pub a: (
        PIN_0, PIN_1, PIN_2, PIN_3, PIN_4, PIN_5, PIN_6, PIN_7, PIN_8, PIN_9, PIN_10, PIN_11,
        PIN_12, PIN_13, PIN_14, PIN_15,
    ),
    /// D0..D7.
    pub d: (PIN_16, PIN_17, PIN_18, PIN_19, PIN_20, PIN_21, PIN_22, PIN_23),
    /// /SLTSL.
    pub sltsl: PIN_24,
    /// /RD.
    pub rd: PIN_25,
    /// /WR.
    pub wr: PIN_26,
    /// /WAIT.
    pub wait: PIN_27,
}

/// The configured front-end. Must stay alive for the life of the bus loop;
/// dropping it would release the state machines.
pub struct BusFrontEnd {
    sm_read: StateMachine<'static, PIO0, 0>,
    sm_write: StateMachine<'static, PIO0, 1>,
    _common: Common<'static, PIO0>,
}

impl BusFrontEnd {
    /// Claim PIO0 and the bus pins, load both programs, and **hold /WAIT
    /// low** — the host stalls from here until [`Self::arm`], so the ROM
    /// cache can be staged without the host seeing a half-initialised
    /// cartridge.
    pub fn init(pio: PIO0, pins: BusPins) -> Self {
        let Pio { mut common, mut sm0, mut sm1, .. } = Pio::new(pio, PioIrqs);

        let (a0, a1, a2, a3, a4, a5, a6, a7, a8, a9, a10, a11, a12, a13, a14, a15) = pins.a;
        let (d0, d1, d2, d3, d4, d5, d6, d7) = pins.d;
        let a = [
            common.make_pio_pin(a0),
            common.make_pio_pin(a1),
            common.make_pio_pin(a2),
            common.make_pio_pin(a3),
            common.make_pio_pin(a4),
            common.make_pio_pin(a5),
            common.make_pio_pin(a6),
            common.make_pio_pin(a7),
            common.make_pio_pin(a8),
            common.make_pio_pin(a9),
            common.make_pio_pin(a10),
            common.make_pio_pin(a11),
            common.make_pio_pin(a12),
            common.make_pio_pin(a13),
            common.make_pio_pin(a14),
            common.make_pio_pin(a15),
        ];
        let d = [
            common.make_pio_pin(d0),
            common.make_pio_pin(d1),
            common.make_pio_pin(d2),
            common.make_pio_pin(d3),
            common.make_pio_pin(d4),
            common.make_pio_pin(d5),
            common.make_pio_pin(d6),
            common.make_pio_pin(d7),
        ];
        let sltsl = common.make_pio_pin(pins.sltsl);
        let rd = common.make_pio_pin(pins.rd);
        let wr = common.make_pio_pin(pins.wr);
        let wait = common.make_pio_pin(pins.wait);

        // Stall the host before anything else happens.
        sm0.set_pin_dirs(Direction::Out, &[&wait]);
        sm0.set_pins(Level::Low, &[&wait]);

        // Everything else is an input until a read token opens D0..D7.
        sm0.set_pin_dirs(
            Direction::In,
            &[
                &a[0], &a[1], &a[2], &a[3], &a[4], &a[5], &a[6], &a[7], &a[8], &a[9], &a[10],
                &a[11], &a[12], &a[13], &a[14], &a[15], &d[0], &d[1], &d[2], &d[3], &d[4], &d[5],
                &d[6], &d[7], &sltsl, &rd, &wr,
            ],
        );

        // Read responder. Token consumption: `out pins, 8` stages the data
        // byte on the (still tri-stated) output latches, `out pindirs, 8`
        // applies the direction byte — 0xFF drives, 0x00 stays silent.
        let read_prog = pio_proc::pio_asm!(
            ".side_set 1 opt",
            "    wait 1 gpio 24    side 1", // previous slot cycle fully ended
            "    wait 0 gpio 24",           // slot select asserted
            "    wait 0 gpio 25    side 0", // read strobe: stall the host
            "    in pins, 25",              // A + D + /SLTSL  (autopush)
            "    pull block",               // 16-bit token from the dispatcher
            "    out pins, 8",
            "    out pindirs, 8   side 1",  // drive (or not), release /WAIT
            "    wait 1 gpio 25",           // hold until the strobe ends
            "    mov osr, null",
            "    out pindirs, 8",           // tri-state D0..D7 again
        );
        let read_loaded = common.load_program(&read_prog.program);
        let mut read_cfg = Config::default();
        read_cfg.use_program(&read_loaded, &[&wait]);
        read_cfg.set_in_pins(&[
            &a[0], &a[1], &a[2], &a[3], &a[4], &a[5], &a[6], &a[7], &a[8], &a[9], &a[10], &a[11],
            &a[12], &a[13], &a[14], &a[15], &d[0], &d[1], &d[2], &d[3], &d[4], &d[5], &d[6], &d[7],
            &sltsl,
        ]);
        read_cfg.set_out_pins(&[&d[0], &d[1], &d[2], &d[3], &d[4], &d[5], &d[6], &d[7]]);
        read_cfg.shift_in = ShiftConfig {
            auto_fill: true,
            threshold: 25,
            direction: ShiftDirection::Left,
        };
        read_cfg.shift_out = ShiftConfig {
            auto_fill: false,
            threshold: 32,
            direction: ShiftDirection::Right,
        };
        sm0.set_config(&read_cfg);

        // Write captor. Sampling one PIO clock (~4 ns) after the rising
        // strobe edge sits inside the host's address/data hold window.
        let write_prog = pio_proc::pio_asm!(
            "    wait 1 gpio 26", // strobe idle
            "    wait 0 gpio 24", // slot cycle begins
            "    wait 0 gpio 26", // write strobe active (or a later foreign
            //                       cycle's — the /SLTSL bit tells them apart)
            "    wait 1 gpio 26", // rising edge: operands latched by the host
            "    in pins, 25",    // A + D + /SLTSL  (autopush)
        );
        let write_loaded = common.load_program(&write_prog.program);
        let mut write_cfg = Config::default();
        write_cfg.use_program(&write_loaded, &[]);
        write_cfg.set_in_pins(&[
            &a[0], &a[1], &a[2], &a[3], &a[4], &a[5], &a[6], &a[7], &a[8], &a[9], &a[10], &a[11],
            &a[12], &a[13], &a[14], &a[15], &d[0], &d[1], &d[2], &d[3], &d[4], &d[5], &d[6], &d[7],
            &sltsl,
        ]);
        write_cfg.shift_in = ShiftConfig {
            auto_fill: true,
            threshold: 25,
            direction: ShiftDirection::Left,
        };
        write_cfg.fifo_join = FifoJoin::RxOnly; // depth 8: the burst margin
        sm1.set_config(&write_cfg);

        Self { sm_read: sm0, sm_write: sm1, _common: common }
    }

    /// Start both state machines. The first read-responder instruction
    /// releases /WAIT; the host resumes against a fully staged cartridge.
    pub fn arm(&mut self) {
        self.sm_write.set_enable(true);
        self.sm_read.set_enable(true);
    }

    /// The dispatcher's FIFO handle.
    #[must_use]
    pub fn port(&self) -> PioBusPort {
        PioBusPort { _private: () }
    }
}

/// Raw-register FIFO access for the hot loop. Construction goes through
/// [`BusFrontEnd::port`], so a port implies configured state machines.
pub struct PioBusPort {
    _private: (),
}

impl BusPort for PioBusPort {
    #[inline(always)]
    fn pop_read(&mut self) -> BusSample {
        let pio = pac::PIO0;
        while pio.fstat().read().rxempty() & (1 << SM_READ) != 0 {}
        BusSample(pio.rxf(SM_READ).read())
    }

    #[inline(always)]
    fn try_pop_read(&mut self) -> Option<BusSample> {
        let pio = pac::PIO0;
        if pio.fstat().read().rxempty() & (1 << SM_READ) != 0 {
            None
        } else {
            Some(BusSample(pio.rxf(SM_READ).read()))
        }
    }

    #[inline(always)]
    fn try_pop_write(&mut self) -> Option<BusSample> {
        let pio = pac::PIO0;
        if pio.fstat().read().rxempty() & (1 << SM_WRITE) != 0 {
            None
        } else {
            Some(BusSample(pio.rxf(SM_WRITE).read()))
        }
    }

    #[inline(always)]
    fn push_token(&mut self, token: Token) {
        let pio = pac::PIO0;
        // At most one read is in flight, so the 4-deep TX FIFO cannot be
        // full here; the guard loop costs one register read.
        while pio.fstat().read().txfull() & (1 << SM_READ) != 0 {}
        pio.txf(SM_READ).write_value(u32::from(token.raw()));
    }
}
