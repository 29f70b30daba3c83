//! OOK48 mode: GPS-synchronous on-off keying at 9 symbols/second, one
//! character per 8-symbol frame using a 4-of-8 constant-weight code.

pub mod decode;
pub mod encode;
pub mod tables;

pub use decode::{decode_frame, DecodeMode, FrameDecode, Outcome};
pub use encode::{encode_message, Ook48Transmitter, TxSymbolOut};
