//! 4-FSK tone detection
//!
//! Once per symbol the magnitude window is searched for each of the four
//! equally-spaced tones. The detected symbol is the tone with the best
//! signal-to-noise ratio, where noise is the mean of four bins immediately
//! outside the tolerance band on each side.

use crate::params::ModeParams;

/// Result of one symbol detection
#[derive(Debug, Clone, Copy)]
pub struct ToneSymbol {
    /// Detected tone 0..3: bit 0 sync, bit 1 data
    pub tone: u8,
    /// Linear S/N of the winning tone
    pub signal_noise: f32,
}

/// Peak magnitude and S/N for one tone's search window
fn find_max(magnitude: &[f32], params: &ModeParams, tone: usize) -> (f32, f32) {
    let centre = params.tone0 + tone * params.tone_spacing;
    let lo = centre.saturating_sub(params.tone_tolerance);
    let hi = (centre + params.tone_tolerance).min(magnitude.len() - 1);

    let mut max = f32::MIN;
    for &m in &magnitude[lo..=hi] {
        if m > max {
            max = m;
        }
    }

    // Noise reference: four bins immediately outside the band on each side
    let mut noise = 0.0f32;
    let mut count = 0;
    for k in 1..=4usize {
        if lo >= k {
            noise += magnitude[lo - k];
            count += 1;
        }
        if hi + k < magnitude.len() {
            noise += magnitude[hi + k];
            count += 1;
        }
    }
    let noise = if count > 0 { noise / count as f32 } else { 0.0 };
    let sn = if noise > 0.0 { max / noise } else { 0.0 };
    (max, sn)
}

/// Detect the transmitted tone for one symbol period.
pub fn tone_detect(magnitude: &[f32], params: &ModeParams) -> ToneSymbol {
    let mut best_tone = 0u8;
    let mut best_sn = 0.0f32;
    for k in 0..4 {
        let (_, sn) = find_max(magnitude, params, k);
        if sn > best_sn {
            best_sn = sn;
            best_tone = k as u8;
        }
    }
    ToneSymbol {
        tone: best_tone,
        signal_noise: best_sn,
    }
}

/// Reported decode S/N in dB, referred to the 2500 Hz noise bandwidth.
pub fn snr_db(signal_noise: f32, params: &ModeParams) -> f32 {
    if signal_noise <= 0.0 {
        return -99.0;
    }
    10.0 * (signal_noise / params.sn_bins).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn window_with_tone(params: &ModeParams, tone: usize, level: f32) -> Vec<f32> {
        let mut mags = vec![1.0f32; params.num_bins];
        mags[params.tone0 + tone * params.tone_spacing] = level;
        mags
    }

    #[test]
    fn test_detects_each_tone() {
        let p = params::JT4;
        for tone in 0..4 {
            let mags = window_with_tone(&p, tone, 500.0);
            let sym = tone_detect(&mags, &p);
            assert_eq!(sym.tone, tone as u8);
            assert!(sym.signal_noise > 100.0);
        }
    }

    #[test]
    fn test_tolerates_offset_tone() {
        let p = params::PI4;
        let mut mags = vec![1.0f32; p.num_bins];
        mags[p.tone0 + 2 * p.tone_spacing + p.tone_tolerance - 1] = 300.0;
        let sym = tone_detect(&mags, &p);
        assert_eq!(sym.tone, 2);
    }

    #[test]
    fn test_sync_and_data_bits() {
        // Tone k encodes sync = k & 1, data = k >> 1
        for (tone, sync, data) in [(0u8, 0, 0), (1, 1, 0), (2, 0, 1), (3, 1, 1)] {
            assert_eq!(tone & 1, sync);
            assert_eq!(tone >> 1, data);
        }
    }

    #[test]
    fn test_snr_scale() {
        let p = params::JT4;
        // S/N equal to the reference bandwidth factor reads 0 dB
        assert!((snr_db(p.sn_bins, &p)).abs() < 0.01);
        assert!(snr_db(p.sn_bins * 10.0, &p) > 9.9);
    }
}
