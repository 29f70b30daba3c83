//! Shared utilities for integration tests
#![allow(dead_code)]

use once_cell::sync::Lazy;

use ook48::params::{ModeParams, ADC_MIDSCALE, OVERSAMPLE};

/// Initialize tracing for tests (call once per test that needs tracing)
pub fn init_test_tracing() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ook48=warn"));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .with_test_writer()
            .try_init()
            .ok();
    });

    Lazy::force(&TRACING);
}

/// One oversampled ADC ingest frame carrying a tone at `freq_hz` with the
/// given amplitude in ADC counts, phase-continuous from `phase`.
pub fn tone_frame(params: &ModeParams, freq_hz: f32, amplitude: f32, phase: &mut f32) -> Vec<u16> {
    let rate = params.sample_rate as f32 * OVERSAMPLE as f32;
    let step = 2.0 * std::f32::consts::PI * freq_hz / rate;
    (0..params.oversampled_len())
        .map(|_| {
            let s = ADC_MIDSCALE + amplitude * phase.sin();
            *phase += step;
            s.clamp(0.0, 4095.0) as u16
        })
        .collect()
}

/// A frame of low-level pseudo-random noise around mid-scale.
pub fn noise_frame(params: &ModeParams, amplitude: f32, seed: &mut u32) -> Vec<u16> {
    (0..params.oversampled_len())
        .map(|_| {
            // xorshift; no external RNG state needed for repeatability
            *seed ^= *seed << 13;
            *seed ^= *seed >> 17;
            *seed ^= *seed << 5;
            let unit = (*seed as f32 / u32::MAX as f32) * 2.0 - 1.0;
            (ADC_MIDSCALE + amplitude * unit).clamp(0.0, 4095.0) as u16
        })
        .collect()
}

/// The frequency in Hz that lands on a window bin for this mode.
pub fn bin_freq(params: &ModeParams, window_bin: usize) -> f32 {
    let hz_per_bin = params.sample_rate as f32 / params.num_samples as f32;
    (params.start_bin + window_bin) as f32 * hz_per_bin
}
