//! OOK48 transmit encoder
//!
//! Compiles a message template into a byte stream of 4-of-8 codewords and
//! clocks it out one key bit per symbol tick, MSB first, 8 bits per second.
//! A carriage return is prepended for the first transmission only; when the
//! message wraps, playback restarts at the character after it. Under
//! half-rate each byte is sent twice, advancing on odd seconds.

use crate::locator::replace_token;
use crate::ook48::tables::ENCODE_4FROM8;
use crate::params::LOC_TOKEN;

/// Map one character to its alphabet index.
///
/// CR and LF code the end of message; printable ASCII `0x20..=0x5F` maps
/// directly; lowercase folds to uppercase; anything else becomes the null
/// index 69.
pub fn char_index(ch: u8) -> u8 {
    match ch {
        0x0D | 0x0A => 0,
        0x20..=0x5F => ch - 31,
        0x61..=0x7A => ch - 63,
        _ => 69,
    }
}

/// Encode a message into transmit codewords, one byte per character.
pub fn encode_message(msg: &[u8]) -> Vec<u8> {
    msg.iter()
        .map(|&ch| ENCODE_4FROM8[char_index(ch) as usize])
        .collect()
}

/// Output of one transmit symbol tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSymbolOut {
    /// Key-line state for this symbol interval
    pub key: bool,
    /// Character just completed, to be echoed on the serial link
    pub sent: Option<u8>,
    /// The byte stream for this second is exhausted; cancel the cadence
    /// until the next PPS re-arms it
    pub end_of_second: bool,
}

pub struct Ook48Transmitter {
    /// Message text after locator substitution, leading CR included
    visual: Vec<u8>,
    /// One codeword per character of `visual`
    buffer: Vec<u8>,
    pointer: usize,
    bit_pointer: u8,
    half_rate: bool,
}

impl Ook48Transmitter {
    /// Compile a message template for transmission. A `LOC_TOKEN` byte in
    /// the template is replaced with the current locator string.
    pub fn new(template: &[u8], locator: &str, half_rate: bool) -> Ook48Transmitter {
        let mut visual = vec![0x0D];
        visual.extend(replace_token(template, LOC_TOKEN, locator.as_bytes()));
        let buffer = encode_message(&visual);
        Ook48Transmitter {
            visual,
            buffer,
            pointer: 0,
            bit_pointer: 0,
            half_rate,
        }
    }

    /// The compiled message as transmitted (after token substitution)
    pub fn visual_message(&self) -> &[u8] {
        &self.visual
    }

    /// Advance one symbol interval. Ticks 0..8 emit the current byte's bits
    /// MSB first; the ninth tick drops the key, reports the character sent
    /// and ends the second.
    pub fn on_symbol(&mut self, gps_sec: i32) -> TxSymbolOut {
        if self.pointer == self.buffer.len() {
            // Wrap, skipping the leading CR which marks first transmission
            self.pointer = 1;
            self.bit_pointer = 0;
        }

        if self.bit_pointer == 8 {
            let advance = !self.half_rate || (gps_sec & 1) == 1;
            let sent = if advance {
                Some(self.visual[self.pointer])
            } else {
                None
            };
            if advance {
                self.pointer += 1;
            }
            self.bit_pointer = 0;
            return TxSymbolOut {
                key: false,
                sent,
                end_of_second: true,
            };
        }

        let key = (self.buffer[self.pointer] << self.bit_pointer) & 0x80 != 0;
        self.bit_pointer += 1;
        TxSymbolOut {
            key,
            sent: None,
            end_of_second: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_coding_ranges() {
        assert_eq!(char_index(b'\r'), 0);
        assert_eq!(char_index(b'\n'), 0);
        assert_eq!(char_index(b' '), 1);
        assert_eq!(char_index(b'A'), b'A' - 31);
        assert_eq!(char_index(b'a'), b'A' - 31);
        assert_eq!(char_index(b'z'), b'Z' - 31);
        assert_eq!(char_index(0x00), 69);
        assert_eq!(char_index(0x7F), 69);
    }

    #[test]
    fn test_encode_cq_test() {
        // "CQ TEST\r" character indices under the ch-31 rule
        let indices: Vec<u8> = b"CQ TEST\r".iter().map(|&c| char_index(c)).collect();
        assert_eq!(indices, vec![36, 50, 1, 53, 38, 52, 53, 0]);
        let bytes = encode_message(b"CQ TEST\r");
        let expected: Vec<u8> = indices
            .iter()
            .map(|&i| ENCODE_4FROM8[i as usize])
            .collect();
        assert_eq!(bytes, expected);
    }

    /// Collect the 8 key bits of the current character, plus the end tick.
    fn clock_one_second(tx: &mut Ook48Transmitter, sec: i32) -> (u8, Option<u8>) {
        let mut byte = 0u8;
        for bit in 0..8 {
            let out = tx.on_symbol(sec);
            assert!(!out.end_of_second);
            if out.key {
                byte |= 0x80 >> bit;
            }
        }
        let end = tx.on_symbol(sec);
        assert!(end.end_of_second);
        assert!(!end.key);
        (byte, end.sent)
    }

    #[test]
    fn test_key_stream_matches_codewords() {
        let mut tx = Ook48Transmitter::new(b"HI\r", "", false);
        // Leading CR, then H, I, CR
        let expected = encode_message(b"\rHI\r");
        for (i, &want) in expected.iter().enumerate() {
            let (byte, sent) = clock_one_second(&mut tx, i as i32);
            assert_eq!(byte, want, "byte {} of key stream", i);
            assert!(sent.is_some());
        }
        // Wrap restarts after the leading CR
        let (byte, _) = clock_one_second(&mut tx, 4);
        assert_eq!(byte, expected[1]);
    }

    #[test]
    fn test_half_rate_repeats_each_byte() {
        let mut tx = Ook48Transmitter::new(b"AB\r", "", true);
        let expected = encode_message(b"\rAB\r");
        // Even second: byte sent, no advance; odd second: repeat + advance
        let (b0, sent0) = clock_one_second(&mut tx, 0);
        let (b1, sent1) = clock_one_second(&mut tx, 1);
        assert_eq!(b0, expected[0]);
        assert_eq!(b1, expected[0]);
        assert!(sent0.is_none());
        assert_eq!(sent1, Some(0x0D));
        let (b2, _) = clock_one_second(&mut tx, 2);
        assert_eq!(b2, expected[1]);
    }

    #[test]
    fn test_locator_token_substitution() {
        let tx = Ook48Transmitter::new(&[b'D', b'E', b' ', LOC_TOKEN, b'\r'], "IO91WM", false);
        assert_eq!(tx.visual_message(), b"\rDE IO91WM\r");
    }
}
