//! OOK48 frame decoder
//!
//! Runs once per frame-ready event on the 8-column (16 under half-rate)
//! tone-cache slice. One scalar per symbol slot is reduced from the cache
//! according to the decode mode, the half-rate pair is combined, a soft
//! confidence gate rejects marginal frames, and the four largest slots form
//! the received 4-of-8 word.

use tracing::trace;

use crate::cache::ToneCache;
use crate::ook48::tables::{CR, DECODE_4FROM8, UNKNOWN_CHAR};
use crate::params::ModeParams;

/// Per-slot scalar selection strategy (`SET:decmode`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Largest magnitude inside the tone tolerance window
    Normal,
    /// Single best bin chosen by max-min range across the frame
    Alt,
    /// Wideband power sum, for rain-scatter doppler spread
    Rainscatter,
}

impl DecodeMode {
    pub fn from_selector(v: u8) -> Option<DecodeMode> {
        match v {
            0 => Some(DecodeMode::Normal),
            1 => Some(DecodeMode::Alt),
            2 => Some(DecodeMode::Rainscatter),
            _ => None,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            DecodeMode::Normal => 0,
            DecodeMode::Alt => 1,
            DecodeMode::Rainscatter => 2,
        }
    }
}

/// Hard-decision outcome for one character frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A character from the alphabet table (13 = CR, 126 = possible null)
    Char(u8),
    /// Soft gap below the confidence threshold; not an error
    LowConfidence,
    /// The four largest slots did not form a valid weight-4 word
    Invalid,
}

/// Result of decoding one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameDecode {
    /// Per-slot soft magnitudes, published before the hard decision
    pub soft: [f32; 8],
    /// Soft-gap confidence, 0 when the slot range is degenerate
    pub confidence: f32,
    pub outcome: Outcome,
}

/// Bin with the greatest max-min magnitude range across the frame
fn find_best_bin(cache: &ToneCache, params: &ModeParams) -> usize {
    let lo = params.tone0 - params.tone_tolerance;
    let hi = params.tone0 + params.tone_tolerance;
    let mut best_range = 0.0f32;
    let mut top_bin = lo;
    for b in lo..hi {
        let mut max = f32::MIN;
        let mut min = f32::MAX;
        for s in 0..cache.cache_size() {
            let v = cache.get(b, s);
            if v > max {
                max = v;
            }
            if v < min {
                min = v;
            }
        }
        if max - min > best_range {
            best_range = max - min;
            top_bin = b;
        }
    }
    top_bin
}

/// Largest magnitude in the tolerance window for one slot
fn find_largest(cache: &ToneCache, params: &ModeParams, slot: usize) -> f32 {
    let lo = params.tone0 - params.tone_tolerance;
    let hi = params.tone0 + params.tone_tolerance;
    let mut max = f32::MIN;
    for b in lo..hi {
        let v = cache.get(b, slot);
        if v > max {
            max = v;
        }
    }
    max
}

/// Wideband power for one slot
fn sum_all_bins(cache: &ToneCache, slot: usize) -> f32 {
    (0..cache.num_bins()).map(|b| cache.get(b, slot)).sum()
}

/// Decode one full cache frame into a character.
pub fn decode_frame(
    cache: &ToneCache,
    params: &ModeParams,
    mode: DecodeMode,
    half_rate: bool,
    confidence_threshold: f32,
) -> FrameDecode {
    let slots = cache.cache_size();
    let mut t = vec![0.0f32; slots];

    match mode {
        DecodeMode::Alt => {
            let best = find_best_bin(cache, params);
            for (i, v) in t.iter_mut().enumerate() {
                *v = cache.get(best, i);
            }
        }
        DecodeMode::Normal => {
            for (i, v) in t.iter_mut().enumerate() {
                *v = find_largest(cache, params, i);
            }
        }
        DecodeMode::Rainscatter => {
            for (i, v) in t.iter_mut().enumerate() {
                *v = sum_all_bins(cache, i);
            }
        }
    }

    if half_rate {
        for i in 0..8 {
            t[i] += t[i + 8];
        }
    }
    t.truncate(8);

    let mut soft = [0.0f32; 8];
    soft.copy_from_slice(&t);

    // Soft-gap confidence: separation between the 4th and 5th ranked slots,
    // normalised by the full range.
    let mut sorted = soft;
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let range = sorted[0] - sorted[7];
    let confidence = if range > 0.0 {
        (sorted[3] - sorted[4]) / range
    } else {
        0.0
    };

    if confidence < confidence_threshold {
        trace!(confidence, "frame below confidence gate");
        return FrameDecode {
            soft,
            confidence,
            outcome: Outcome::LowConfidence,
        };
    }

    // Four largest slots; ties resolve to the lowest index (first max wins)
    let mut work = soft;
    let mut dec: u8 = 0;
    for _ in 0..4 {
        let mut largest = 0.0f32;
        let mut idx = 0usize;
        for (i, &v) in work.iter().enumerate() {
            if v > largest {
                largest = v;
                idx = i;
            }
        }
        work[idx] = 0.0;
        dec |= 0x80 >> idx;
    }

    let ch = DECODE_4FROM8[dec as usize];
    let outcome = if ch == 0 {
        Outcome::Invalid
    } else {
        Outcome::Char(ch)
    };
    trace!(word = dec, ch, confidence, "frame decoded");
    FrameDecode {
        soft,
        confidence,
        outcome,
    }
}

impl Outcome {
    /// Byte published on the serial link for this outcome. Low-confidence
    /// frames surface the reserved unknown codepoint; invalid words the
    /// null character.
    pub fn wire_char(self) -> u8 {
        match self {
            Outcome::Char(c) => c,
            Outcome::LowConfidence => UNKNOWN_CHAR,
            Outcome::Invalid => 0,
        }
    }

    pub fn is_cr(self) -> bool {
        matches!(self, Outcome::Char(c) if c == CR)
    }
}
