//! Tone cache
//!
//! A fixed-shape `[bin, slot]` matrix of per-symbol magnitudes. Columns are
//! appended once per completed spectrum; the write index is reset only by
//! the PPS state machine (or the free-run safety). When the final column is
//! written the cache reports frame-ready and refuses further writes until
//! the next reset, so a decode always sees a fully-populated frame.

/// Rectangular magnitude store, indexed `[bin, slot]`
pub struct ToneCache {
    num_bins: usize,
    cache_size: usize,
    data: Vec<f32>,
    slot: usize,
}

impl ToneCache {
    pub fn new(num_bins: usize, cache_size: usize) -> ToneCache {
        ToneCache {
            num_bins,
            cache_size,
            data: vec![0.0; num_bins * cache_size],
            slot: 0,
        }
    }

    /// Reset the write index to the given slot (0, or 8 for the second half
    /// of a half-rate pair).
    pub fn reset(&mut self, slot: usize) {
        debug_assert!(slot <= self.cache_size);
        self.slot = slot;
    }

    /// Append one magnitude column. Returns `true` when this write filled
    /// the final slot (frame ready). Writes past the end are ignored.
    pub fn push_column(&mut self, magnitude: &[f32]) -> bool {
        if self.slot >= self.cache_size {
            return false;
        }
        debug_assert!(magnitude.len() >= self.num_bins);
        for (bin, &m) in magnitude.iter().take(self.num_bins).enumerate() {
            self.data[bin * self.cache_size + self.slot] = m;
        }
        self.slot += 1;
        self.slot == self.cache_size
    }

    pub fn get(&self, bin: usize, slot: usize) -> f32 {
        self.data[bin * self.cache_size + slot]
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_full(&self) -> bool {
        self.slot == self.cache_size
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }
}
