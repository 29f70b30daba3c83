//! PPS-disciplined symbol timing
//!
//! Aligns the symbol cadence to the GPS 1-pulse-per-second edge. In receive
//! the arm point is delayed by `rx_retard` milliseconds; in transmit it
//! leads the second by `tx_advance` (i.e. fires `1000 - tx_advance` ms after
//! the previous edge). Arming resets the tone-cache write index: slot 0, or
//! slot 8 on odd seconds under half-rate so the two halves of a character
//! pair land in the same cache frame.
//!
//! The machine also owns the 9-baud transmit cadence and the free-run
//! safety that clears the write index when sample frames stop arriving.

use tracing::{debug, warn};

use crate::params::{FREE_RUN_RESET_MS, TX_INTERVAL_US};

/// Which way the radio is keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

/// Cadence lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpsState {
    /// No PPS seen since the last frame completed
    Idle,
    /// PPS received, waiting out the retard/advance delay
    ArmedForSecond,
    /// Symbol capture (or transmit cadence) in progress
    Capturing,
    /// Cache filled; decoder owns the frame until the next PPS
    FrameReady,
}

/// Events surfaced by `poll`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingEvent {
    /// Begin capturing at the given cache slot
    StartCapture { start_slot: usize },
    /// A transmit symbol interval has elapsed
    TxSymbol,
}

pub struct SymbolTiming {
    direction: Direction,
    rx_retard_ms: u32,
    tx_advance_ms: u32,
    half_rate: bool,
    state: PpsState,
    armed_due_us: u64,
    armed_sec: i32,
    next_tx_us: Option<u64>,
    pps_active: u8,
    last_frame_us: Option<u64>,
}

impl SymbolTiming {
    pub fn new(
        direction: Direction,
        rx_retard_ms: u32,
        tx_advance_ms: u32,
        half_rate: bool,
    ) -> SymbolTiming {
        SymbolTiming {
            direction,
            rx_retard_ms,
            tx_advance_ms,
            half_rate,
            state: PpsState::Idle,
            armed_due_us: 0,
            armed_sec: 0,
            next_tx_us: None,
            pps_active: 0,
            last_frame_us: None,
        }
    }

    /// Handle a 1PPS edge. The cadence arms after the configured delay and
    /// takes effect at the next `poll`.
    pub fn on_pps(&mut self, now_us: u64, gps_sec: i32) {
        self.pps_active = 3;
        let delay_ms = match self.direction {
            Direction::Rx => self.rx_retard_ms as u64,
            Direction::Tx => 1000u64.saturating_sub(self.tx_advance_ms as u64) % 1000,
        };
        self.armed_due_us = now_us + delay_ms * 1000;
        self.armed_sec = gps_sec;
        self.state = PpsState::ArmedForSecond;
        debug!(gps_sec, delay_ms, "PPS armed");
    }

    /// Advance the machine to `now_us`, surfacing at most one event.
    pub fn poll(&mut self, now_us: u64) -> Option<TimingEvent> {
        if self.state == PpsState::ArmedForSecond && now_us >= self.armed_due_us {
            self.state = PpsState::Capturing;
            match self.direction {
                Direction::Rx => {
                    let start_slot = if self.half_rate && (self.armed_sec & 1) == 1 {
                        8
                    } else {
                        0
                    };
                    return Some(TimingEvent::StartCapture { start_slot });
                }
                Direction::Tx => {
                    // First symbol fires on the arm point itself
                    self.next_tx_us = Some(self.armed_due_us + TX_INTERVAL_US);
                    return Some(TimingEvent::TxSymbol);
                }
            }
        }
        if let Some(due) = self.next_tx_us {
            if now_us >= due {
                self.next_tx_us = Some(due + TX_INTERVAL_US);
                return Some(TimingEvent::TxSymbol);
            }
        }
        None
    }

    /// Stop the transmit symbol cadence. Idempotent.
    pub fn cancel_tx(&mut self) {
        self.next_tx_us = None;
    }

    /// Note a completed sample frame (feeds the free-run safety).
    pub fn on_sample_frame(&mut self, now_us: u64) {
        self.last_frame_us = Some(now_us);
    }

    /// True when sample frames have stopped arriving and the cache pointer
    /// should be cleared. Fires once per stall.
    pub fn free_run_reset_due(&mut self, now_us: u64) -> bool {
        match self.last_frame_us {
            Some(last) if now_us.saturating_sub(last) > FREE_RUN_RESET_MS * 1000 => {
                warn!("no sample frame for {} ms, free-run reset", FREE_RUN_RESET_MS);
                self.last_frame_us = Some(now_us);
                true
            }
            _ => false,
        }
    }

    /// Mark the capture frame complete; the machine idles until the next PPS.
    pub fn frame_complete(&mut self) {
        self.state = PpsState::FrameReady;
    }

    /// Decoder has consumed the frame.
    pub fn frame_consumed(&mut self) {
        if self.state == PpsState::FrameReady {
            self.state = PpsState::Idle;
        }
    }

    /// Age the PPS-present flag; called once per second by the status path.
    pub fn tick_second(&mut self) {
        if self.pps_active > 0 {
            self.pps_active -= 1;
        }
    }

    /// True while recent PPS edges have been seen. Decodes are only
    /// published under a live PPS.
    pub fn pps_active(&self) -> bool {
        self.pps_active > 0
    }

    pub fn state(&self) -> PpsState {
        self.state
    }
}
