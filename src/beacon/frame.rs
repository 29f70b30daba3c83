//! Beacon frame recovery: sync search, bit extraction, interleaving
//!
//! The tone cache collects one 2-bit symbol per second for the whole
//! transmission plus slack. At end of frame the known sync vector is slid
//! across the cache to find the transmission start, the data bits are
//! lifted from the aligned symbols and the interleave permutation undone.

/// Slide the sync vector across the cache and return the start index with
/// the fewest sync-bit mismatches, along with that mismatch count.
pub fn find_sync(cache: &[u8], sync: &[u8]) -> (usize, usize) {
    let mut best_start = 0;
    let mut best_mismatch = usize::MAX;
    for start in 0..cache.len() - sync.len() {
        let mut mismatch = 0;
        for (s, &want) in sync.iter().enumerate() {
            if cache[start + s] & 1 != want {
                mismatch += 1;
            }
        }
        if mismatch < best_mismatch {
            best_mismatch = mismatch;
            best_start = start;
        }
    }
    (best_start, best_mismatch)
}

/// Extract the data bits of an aligned frame.
///
/// `first_offset` is 1 for JT4 (the first symbol carries no data bit) and
/// 0 for PI4 (every symbol carries one).
pub fn extract_bits(cache: &[u8], start: usize, bit_count: usize, first_offset: usize) -> Vec<u8> {
    (0..bit_count)
        .map(|i| cache[start + i + first_offset] >> 1)
        .collect()
}

/// Undo the transmit permutation: received position `i` carries encoder bit
/// `table[i]`.
pub fn deinterleave(bits: &[u8], table: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len()];
    for (i, &b) in bits.iter().enumerate() {
        out[table[i] as usize] = b;
    }
    out
}

/// Apply the transmit permutation to encoder output.
pub fn interleave(bits: &[u8], table: &[u8]) -> Vec<u8> {
    table.iter().map(|&p| bits[p as usize]).collect()
}

/// Combine interleaved data bits with the sync vector into channel tones.
///
/// `first_offset` mirrors `extract_bits`: for JT4 the first symbol is
/// sync-only and data starts at symbol 1.
pub fn build_symbols(data_bits: &[u8], sync: &[u8], first_offset: usize) -> Vec<u8> {
    sync.iter()
        .enumerate()
        .map(|(i, &s)| {
            let data = if i >= first_offset && i - first_offset < data_bits.len() {
                data_bits[i - first_offset]
            } else {
                0
            };
            s | (data << 1)
        })
        .collect()
}
