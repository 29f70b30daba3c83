//! Morse end-to-end: keyed audio through the FFT path into the decoder

mod test_utils;

use bus::BusReader;
use ook48::dispatch::{DspEvent, EventQueue};
use ook48::engine::Engine;
use ook48::params::{self, App};
use ook48::settings::Settings;
use test_utils::{bin_freq, init_test_tracing, noise_frame, tone_frame};

struct MorseRig {
    engine: Engine,
    rx: BusReader<DspEvent>,
    phase: f32,
    seed: u32,
    now_us: u64,
    events: Vec<DspEvent>,
}

impl MorseRig {
    fn new() -> MorseRig {
        let mut settings = Settings::default();
        settings.app = App::Morse;
        let mut queue = EventQueue::new(65536);
        let rx = queue.subscribe();
        MorseRig {
            engine: Engine::new(settings.snapshot(), queue),
            rx,
            phase: 0.0,
            seed: 0x2462_97A1,
            now_us: 0,
            events: Vec::new(),
        }
    }

    /// Key the carrier for `frames` FFT frames (mark or space).
    fn key(&mut self, mark: bool, frames: u32) {
        let p = params::MORSE;
        let freq = bin_freq(&p, p.tone0);
        let frame_us = 1_000_000u64 * p.num_samples as u64 / p.sample_rate as u64;
        for _ in 0..frames {
            let frame = if mark {
                tone_frame(&p, freq, 500.0, &mut self.phase)
            } else {
                noise_frame(&p, 8.0, &mut self.seed)
            };
            self.engine.on_sample_frame(self.now_us, &frame);
            self.now_us += frame_us;
            while let Ok(ev) = self.rx.try_recv() {
                if !matches!(ev, DspEvent::GenPlot(_) | DspEvent::DrawSpectrum) {
                    self.events.push(ev);
                }
            }
        }
    }

    fn pattern(&mut self, runs: &[(bool, u32)], times: usize) {
        for _ in 0..times {
            for &(mark, frames) in runs {
                self.key(mark, frames);
            }
        }
    }

    fn locked_wpm(&self) -> Option<f32> {
        self.events.iter().find_map(|e| match e {
            DspEvent::MorseLocked(wpm) => Some(*wpm),
            _ => None,
        })
    }

    fn chars(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DspEvent::MorseMessage(ch) => Some(*ch),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn test_lock_on_keyed_carrier() {
    init_test_tracing();
    let mut rig = MorseRig::new();
    // Noise lead-in trains the floor, then steady dit/dah keying at a
    // 3-frame dit
    rig.key(false, 60);
    rig.pattern(&[(true, 3), (false, 3), (true, 9), (false, 9)], 30);

    let wpm = rig.locked_wpm().expect("decoder never locked");
    assert!(
        (11.0..=16.0).contains(&wpm),
        "locked at {} wpm for a 3-frame dit",
        wpm
    );
}

#[test]
fn test_decodes_s_after_lock() {
    init_test_tracing();
    let mut rig = MorseRig::new();
    rig.key(false, 60);
    rig.pattern(&[(true, 3), (false, 9)], 200);
    assert!(rig.locked_wpm().is_some(), "no lock after acquisition stream");

    rig.events.clear();
    // Three dits, a letter gap, and a closing mark to flush the run
    rig.pattern(&[(true, 3), (false, 3)], 2);
    rig.key(true, 3);
    rig.key(false, 9);
    rig.key(true, 3);
    assert!(
        rig.chars().contains(&b'S'),
        "expected S in {:?}",
        rig.chars()
    );
}

#[test]
fn test_lock_loss_on_silence() {
    init_test_tracing();
    let mut rig = MorseRig::new();
    rig.key(false, 60);
    rig.pattern(&[(true, 3), (false, 3), (true, 9), (false, 9)], 30);
    assert!(rig.locked_wpm().is_some());

    rig.events.clear();
    // Silence far past the 60-dit watchdog
    rig.key(false, 500);
    let lost = rig
        .events
        .iter()
        .filter(|e| matches!(e, DspEvent::MorseLost))
        .count();
    assert_eq!(lost, 1, "exactly one lost event expected");
    assert!(
        rig.chars().is_empty(),
        "no characters after loss: {:?}",
        rig.chars()
    );
}
