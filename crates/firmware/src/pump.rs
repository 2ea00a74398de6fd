//! Audio pump: moves frames from the active [`SampleSource`] into the
//! [`AudioSink`], one block per step, only when the sink has room.
//!
//! Hardware-free on purpose: the core-1 task is a thin loop around
//! [`pump_step`], and the sources/sinks are the opaque collaborators.

use platform::{AudioSink, SampleSource, AUDIO_FRAME_SAMPLES};

/// Interleaved stereo block moved per step.
pub const PUMP_BLOCK_SAMPLES: usize = AUDIO_FRAME_SAMPLES * 2;

/// Render-and-push one block if the sink is ready. Returns `true` when a
/// block moved; `false` means the caller should yield, not spin.
pub fn pump_step<S: SampleSource, K: AudioSink>(
    source: &mut S,
    sink: &mut K,
    block: &mut [i16; PUMP_BLOCK_SAMPLES],
) -> bool {
    if !sink.ready() {
        return false;
    }
    source.render(block);
    sink.push(block);
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use platform::SilenceSource;

    struct CollectingSink {
        room: usize,
        pushed: Vec<i16>,
    }

    impl AudioSink for CollectingSink {
        fn ready(&self) -> bool {
            self.room > 0
        }

        fn push(&mut self, frames: &[i16]) {
            self.room -= 1;
            self.pushed.extend_from_slice(frames);
        }
    }

    struct RampSource(i16);

    impl SampleSource for RampSource {
        fn render(&mut self, frames: &mut [i16]) {
            for f in frames {
                *f = self.0;
                self.0 = self.0.wrapping_add(1);
            }
        }
    }

    #[test]
    fn pump_respects_sink_backpressure() {
        let mut sink = CollectingSink { room: 2, pushed: Vec::new() };
        let mut src = SilenceSource;
        let mut block = [0i16; PUMP_BLOCK_SAMPLES];
        assert!(pump_step(&mut src, &mut sink, &mut block));
        assert!(pump_step(&mut src, &mut sink, &mut block));
        assert!(!pump_step(&mut src, &mut sink, &mut block), "full sink: no render");
        assert_eq!(sink.pushed.len(), 2 * PUMP_BLOCK_SAMPLES);
    }

    #[test]
    fn pump_moves_source_samples_verbatim() {
        let mut sink = CollectingSink { room: 1, pushed: Vec::new() };
        let mut src = RampSource(5);
        let mut block = [0i16; PUMP_BLOCK_SAMPLES];
        assert!(pump_step(&mut src, &mut sink, &mut block));
        assert_eq!(sink.pushed[0], 5);
        assert_eq!(sink.pushed[1], 6);
        assert_eq!(sink.pushed.last().copied().unwrap(), 5 + PUMP_BLOCK_SAMPLES as i16 - 1);
    }
}
