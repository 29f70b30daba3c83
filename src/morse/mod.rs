//! Asynchronous narrowband CW: streaming decoder and keyer

pub mod decoder;
pub mod keyer;
pub mod ring;
pub mod table;

pub use decoder::{MorseDecoder, MorseEvent, Run};
pub use keyer::{dit_us, key_text, KeyElement};
pub use ring::Ring;
pub use table::{char_to_pattern, pattern_to_char};
