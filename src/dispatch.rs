//! DSP-to-dispatch event queue
//!
//! The two execution contexts communicate through a single-producer
//! broadcast channel carrying small tagged events. The DSP context never
//! blocks: a full queue drops the event with a warning rather than stalling
//! the sample cadence. The dispatch context may block on receive.

use bus::{Bus, BusReader};
use tracing::warn;

use crate::protocol;

/// Spectrum display width in pixels; waterfall rows are scaled to this
pub const SPEC_WIDTH: usize = 204;

/// Events crossing from the DSP context to the dispatch context
#[derive(Debug, Clone, PartialEq)]
pub enum DspEvent {
    /// Fresh magnitudes for plot generation (mode-private copy)
    GenPlot(Vec<f32>),
    /// Plot data is ready to render
    DrawSpectrum,
    /// OOK48 decoded character
    Message(u8),
    /// OOK48 transmitted character echo
    TMessage(u8),
    /// OOK48 decode error character
    Error(u8),
    /// JT4 end-of-minute decode
    JtMessage { hours: i32, minutes: i32, snr_db: f32, text: String },
    /// PI4 end-of-minute decode
    PiMessage { hours: i32, minutes: i32, snr_db: f32, text: String },
    /// OOK48 soft magnitudes, published before the hard decode
    SftMessage([f32; 8]),
    /// Morse decoded character (space = word separator)
    MorseMessage(u8),
    /// Morse WPM lock
    MorseLocked(f32),
    /// Morse lock lost
    MorseLost,
    /// Mark the waterfall in red (frame boundary)
    RedLine,
    /// Mark the waterfall in cyan (minute boundary)
    CyanLine,
}

/// Producer half, owned by the DSP context
pub struct EventQueue {
    bus: Bus<DspEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> EventQueue {
        EventQueue {
            bus: Bus::new(capacity),
        }
    }

    /// Attach a consumer. Call before the DSP context starts publishing.
    pub fn subscribe(&mut self) -> BusReader<DspEvent> {
        self.bus.add_rx()
    }

    /// Non-blocking publish; a full queue drops the event.
    pub fn publish(&mut self, event: DspEvent) {
        if let Err(dropped) = self.bus.try_broadcast(event) {
            warn!(?dropped, "dispatch queue full, event dropped");
        }
    }
}

/// Scale a magnitude window onto the display width as 0-100 pixel heights,
/// autolevelled to the strongest bin.
pub fn plot_pixels(magnitude: &[f32], width: usize) -> Vec<u8> {
    let max = magnitude.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0; width];
    }
    (0..width)
        .map(|p| {
            let bin = p * magnitude.len() / width;
            (magnitude[bin] / max * 100.0) as u8
        })
        .collect()
}

/// Render an event as its outbound telemetry line. `GenPlot` becomes the
/// waterfall row; renderer-only tags produce nothing.
pub fn telemetry_line(event: &DspEvent) -> Option<String> {
    match event {
        DspEvent::GenPlot(magnitude) => {
            Some(protocol::wf_line(&plot_pixels(magnitude, SPEC_WIDTH)))
        }
        DspEvent::DrawSpectrum => None,
        DspEvent::Message(ch) => Some(protocol::msg_line(*ch)),
        DspEvent::TMessage(ch) => Some(protocol::tx_line(*ch)),
        DspEvent::Error(ch) => Some(protocol::err_char_line(*ch)),
        DspEvent::JtMessage {
            hours,
            minutes,
            snr_db,
            text,
        } => Some(protocol::jt_line(*hours, *minutes, *snr_db, text)),
        DspEvent::PiMessage {
            hours,
            minutes,
            snr_db,
            text,
        } => Some(protocol::pi_line(*hours, *minutes, *snr_db, text)),
        DspEvent::SftMessage(soft) => Some(protocol::sft_line(soft)),
        DspEvent::MorseMessage(ch) => Some(protocol::mch_line(*ch)),
        DspEvent::MorseLocked(wpm) => Some(protocol::mls_line(Some(*wpm))),
        DspEvent::MorseLost => Some(protocol::mls_line(None)),
        DspEvent::RedLine => Some(protocol::mrk_line(protocol::Marker::Red)),
        DspEvent::CyanLine => Some(protocol::mrk_line(protocol::Marker::Cyan)),
    }
}
