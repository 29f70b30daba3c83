//! Sample ingest and spectrum engine
//!
//! Turns one frame of oversampled ADC readings into a windowed magnitude
//! spectrum:
//!
//! 1. Decimate by averaging `OVERSAMPLE` consecutive readings
//! 2. Remove the ADC mid-scale DC bias
//! 3. Track the frame peak into a smoothed audio-level metric
//! 4. Apply a Hann window and compute the forward FFT
//! 5. Copy magnitudes from the mode's bin window
//!
//! A short frame is skipped without touching the magnitude buffer, so the
//! tone-cache pointer never advances on a partial transfer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::warn;

use crate::params::{ModeParams, ADC_MIDSCALE, OVERSAMPLE};

/// Cache of forward FFT plans, one per FFT length in use
static FFT_PLAN_CACHE: Lazy<Mutex<HashMap<usize, Arc<dyn Fft<f32>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn forward_plan(n: usize) -> Arc<dyn Fft<f32>> {
    let mut cache = FFT_PLAN_CACHE.lock().unwrap();
    if let Some(plan) = cache.get(&n) {
        return Arc::clone(plan);
    }
    let mut planner = FftPlanner::new();
    let plan = planner.plan_fft_forward(n);
    cache.insert(n, Arc::clone(&plan));
    plan
}

/// Smoothing factor for the audio-level EMA
const LEVEL_ALPHA: f32 = 0.4;

pub struct SpectrumEngine {
    num_samples: usize,
    num_bins: usize,
    start_bin: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    magnitude: Vec<f32>,
    audio_level: f32,
}

impl SpectrumEngine {
    pub fn new(params: &ModeParams) -> SpectrumEngine {
        let n = params.num_samples;
        let window = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();
        SpectrumEngine {
            num_samples: n,
            num_bins: params.num_bins,
            start_bin: params.start_bin,
            fft: forward_plan(n),
            window,
            buffer: vec![Complex::new(0.0, 0.0); n],
            magnitude: vec![0.0; params.num_bins],
            audio_level: 0.0,
        }
    }

    /// Process one oversampled ADC frame into the magnitude window.
    ///
    /// Returns the magnitude slice, or `None` when the frame is not exactly
    /// `num_samples * OVERSAMPLE` readings long (partial DMA transfer).
    pub fn process_frame(&mut self, raw: &[u16]) -> Option<&[f32]> {
        if raw.len() != self.num_samples * OVERSAMPLE {
            warn!(
                got = raw.len(),
                want = self.num_samples * OVERSAMPLE,
                "skipping partial sample frame"
            );
            return None;
        }

        // Decimate, remove DC, track the frame peak
        let mut peak = 0.0f32;
        for (bin, block) in raw.chunks_exact(OVERSAMPLE).enumerate() {
            let sum: f32 = block.iter().map(|&s| s as f32 - ADC_MIDSCALE).sum();
            let sample = sum / OVERSAMPLE as f32;
            if sample.abs() > peak {
                peak = sample.abs();
            }
            self.buffer[bin] = Complex::new(sample * self.window[bin], 0.0);
        }

        let new_level = (peak / ADC_MIDSCALE * 100.0).clamp(0.0, 100.0);
        self.audio_level = self.audio_level * (1.0 - LEVEL_ALPHA) + new_level * LEVEL_ALPHA;

        self.fft.process(&mut self.buffer);

        for m in 0..self.num_bins {
            self.magnitude[m] = self.buffer[self.start_bin + m].norm();
        }
        Some(&self.magnitude)
    }

    /// Most recent magnitude window
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    /// Smoothed RX audio level, 0-100
    pub fn audio_level(&self) -> u8 {
        self.audio_level as u8
    }
}
