//! Runtime settings
//!
//! A single record owned by the dispatch context, pushed by the host over
//! the serial link. The DSP side never reads it directly: on mode change a
//! `DspConfig` snapshot is taken and handed across, so the engine can never
//! observe a partially-updated record.

use crate::ook48::DecodeMode;
use crate::params::{App, ModeParams};

/// Default OOK48 soft-gap confidence threshold
pub const DEFAULT_CONFIDENCE: f32 = 0.180;

#[derive(Debug, Clone)]
pub struct Settings {
    /// TX message slots; a trailing CR is enforced when set
    pub tx_message: [Vec<u8>; 10],
    pub locator_length: u8,
    pub decode_mode: DecodeMode,
    pub tx_advance: u16,
    pub rx_retard: u16,
    pub half_rate: bool,
    pub app: App,
    pub morse_wpm: u8,
    pub confidence_threshold: f32,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            tx_message: std::array::from_fn(|_| b"EMPTY\r".to_vec()),
            locator_length: 8,
            decode_mode: DecodeMode::Normal,
            tx_advance: 0,
            rx_retard: 0,
            half_rate: false,
            app: App::Ook48,
            morse_wpm: 12,
            confidence_threshold: DEFAULT_CONFIDENCE,
        }
    }
}

impl Settings {
    /// Store a message slot, enforcing the trailing CR the encoder expects.
    pub fn set_message(&mut self, slot: usize, text: &[u8]) {
        let mut msg = text.to_vec();
        msg.truncate(30);
        if msg.last() != Some(&b'\r') {
            msg.push(b'\r');
        }
        self.tx_message[slot] = msg;
    }

    /// Atomic snapshot of everything the DSP context needs.
    pub fn snapshot(&self) -> DspConfig {
        DspConfig {
            params: ModeParams::for_app(self.app, self.half_rate),
            app: self.app,
            decode_mode: self.decode_mode,
            half_rate: self.half_rate,
            confidence_threshold: self.confidence_threshold,
            rx_retard: self.rx_retard,
            tx_advance: self.tx_advance,
            morse_wpm: self.morse_wpm,
        }
    }
}

/// Immutable parameter set consumed by the DSP context
#[derive(Debug, Clone, Copy)]
pub struct DspConfig {
    pub params: ModeParams,
    pub app: App,
    pub decode_mode: DecodeMode,
    pub half_rate: bool,
    pub confidence_threshold: f32,
    pub rx_retard: u16,
    pub tx_advance: u16,
    pub morse_wpm: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.locator_length, 8);
        assert_eq!(s.confidence_threshold, 0.180);
        assert_eq!(s.app, App::Ook48);
        assert_eq!(s.tx_message[0], b"EMPTY\r");
    }

    #[test]
    fn test_set_message_appends_cr() {
        let mut s = Settings::default();
        s.set_message(3, b"CQ TEST");
        assert_eq!(s.tx_message[3], b"CQ TEST\r");
        s.set_message(3, b"CQ TEST\r");
        assert_eq!(s.tx_message[3], b"CQ TEST\r");
    }

    #[test]
    fn test_snapshot_reflects_half_rate() {
        let mut s = Settings::default();
        s.half_rate = true;
        assert_eq!(s.snapshot().params.cache_size, 16);
    }
}
