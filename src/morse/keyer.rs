//! CW keyer
//!
//! Turns text into a timed key-element stream at a configured speed using
//! PARIS timing: a dit is 1.2/wpm seconds, a dah three dits, gaps of one
//! dit within an element, three between characters and seven between words.

use crate::morse::table::char_to_pattern;

/// One keyed element: key state and its duration in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyElement {
    pub key: bool,
    pub duration_us: u64,
}

/// Dit period in microseconds for a speed
pub fn dit_us(wpm: u8) -> u64 {
    1_200_000 / wpm.max(1) as u64
}

/// Compile text into a key-element sequence. Characters without a Morse
/// pattern are skipped.
pub fn key_text(text: &str, wpm: u8) -> Vec<KeyElement> {
    let dit = dit_us(wpm);
    let mut out = Vec::new();
    let mut pending_gap: Option<u64> = None;

    for word in text.split_whitespace() {
        if !out.is_empty() {
            pending_gap = Some(7 * dit);
        }
        for ch in word.chars() {
            let Some(pattern) = char_to_pattern(ch) else {
                continue;
            };
            if let Some(gap) = pending_gap.take() {
                out.push(KeyElement {
                    key: false,
                    duration_us: gap,
                });
            }
            for (i, mark) in pattern.chars().enumerate() {
                if i > 0 {
                    out.push(KeyElement {
                        key: false,
                        duration_us: dit,
                    });
                }
                out.push(KeyElement {
                    key: true,
                    duration_us: if mark == '-' { 3 * dit } else { dit },
                });
            }
            pending_gap = Some(3 * dit);
        }
    }
    out
}

/// Endless alignment pattern: alternating dash and dash-length gap.
pub fn dashes_element(wpm: u8, key: bool) -> KeyElement {
    KeyElement {
        key,
        duration_us: 3 * dit_us(wpm),
    }
}
