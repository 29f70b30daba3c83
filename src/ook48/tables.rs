//! OOK48 constant-weight code tables
//!
//! The alphabet enumerates all C(8,4) = 70 four-in-eight words in ascending
//! lexicographic order. `DECODE_4FROM8` is the 256-entry inverse: entries
//! that are not valid weight-4 words hold 0, entry 13 is carriage return and
//! 126 marks a possible null. Both tables are wire-observable and must not
//! be regenerated.

/// All valid 4-from-8 codewords, indexed by character code
pub const ENCODE_4FROM8: [u8; 70] = [
    15, 23, 27, 29, 30, 39, 43, 45, 46, 51,
    53, 54, 57, 58, 60, 71, 75, 77, 78, 83,
    85, 86, 89, 90, 92, 99, 101, 102, 105, 106,
    108, 113, 114, 116, 120, 135, 139, 141, 142, 147,
    149, 150, 153, 154, 156, 163, 165, 166, 169, 170,
    172, 177, 178, 180, 184, 195, 197, 198, 201, 202,
    204, 209, 210, 212, 216, 225, 226, 228, 232, 240,
];

/// Inverse lookup: received byte to ASCII character (0 = invalid word)
pub const DECODE_4FROM8: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 13, 0, 0, 0, 0,
    0, 0, 0, 32, 0, 0, 0, 33, 0, 34,
    35, 0, 0, 0, 0, 0, 0, 0, 0, 36,
    0, 0, 0, 37, 0, 38, 39, 0, 0, 0,
    0, 40, 0, 41, 42, 0, 0, 43, 44, 0,
    45, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 46, 0, 0, 0, 47, 0, 48, 49, 0,
    0, 0, 0, 50, 0, 51, 52, 0, 0, 53,
    54, 0, 55, 0, 0, 0, 0, 0, 0, 56,
    0, 57, 58, 0, 0, 59, 60, 0, 61, 0,
    0, 0, 0, 62, 63, 0, 64, 0, 0, 0,
    65, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 66, 0, 0, 0, 67,
    0, 68, 69, 0, 0, 0, 0, 70, 0, 71,
    72, 0, 0, 73, 74, 0, 75, 0, 0, 0,
    0, 0, 0, 76, 0, 77, 78, 0, 0, 79,
    80, 0, 81, 0, 0, 0, 0, 82, 83, 0,
    84, 0, 0, 0, 85, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 86, 0, 87, 88, 0,
    0, 89, 90, 0, 91, 0, 0, 0, 0, 92,
    93, 0, 94, 0, 0, 0, 95, 0, 0, 0,
    0, 0, 0, 0, 0, 126, 126, 0, 126, 0,
    0, 0, 126, 0, 0, 0, 0, 0, 0, 0,
    126, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0,
];

/// Character emitted when the confidence gate rejects a frame
pub const UNKNOWN_CHAR: u8 = 0x7E;

/// Character code for end-of-message in the alphabet table
pub const CR: u8 = 13;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codewords_weight_four() {
        for &w in ENCODE_4FROM8.iter() {
            assert_eq!(w.count_ones(), 4, "codeword {:#04x} is not weight 4", w);
        }
    }

    #[test]
    fn test_codewords_ascending() {
        for pair in ENCODE_4FROM8.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_codewords_exhaustive() {
        // Exactly the 70 weight-4 bytes, in order
        let all: Vec<u8> = (0u16..256)
            .filter(|b| b.count_ones() == 4)
            .map(|b| b as u8)
            .collect();
        assert_eq!(all.as_slice(), &ENCODE_4FROM8[..]);
    }

    #[test]
    fn test_decode_inverts_encode() {
        // Index 0 is end-of-message, 1..=64 the printable range, 69 null
        assert_eq!(DECODE_4FROM8[ENCODE_4FROM8[0] as usize], CR);
        for idx in 1..=64u8 {
            let ch = idx + 31;
            assert_eq!(DECODE_4FROM8[ENCODE_4FROM8[idx as usize] as usize], ch);
        }
        assert_eq!(DECODE_4FROM8[ENCODE_4FROM8[69] as usize], 126);
    }

    #[test]
    fn test_invalid_words_decode_to_zero() {
        for b in 0u16..256 {
            if b.count_ones() != 4 {
                assert_eq!(DECODE_4FROM8[b as usize], 0, "byte {:#04x}", b);
            }
        }
    }
}
