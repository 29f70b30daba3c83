//! DSP engine
//!
//! The synchronous receive/transmit context: ingest, spectrum, tone cache,
//! PPS cadence and the mode decoders run here, publishing events to the
//! dispatch context through the queue. Nothing in this module blocks except
//! the caller's wait for the next sample frame.

use tracing::{debug, info};

use crate::beacon::{self, BeaconMode, BeaconOutcome};
use crate::cache::ToneCache;
use crate::dispatch::{DspEvent, EventQueue};
use crate::morse::{KeyElement, MorseDecoder, MorseEvent};
use crate::ook48::{self, Ook48Transmitter, Outcome};
use crate::params::App;
use crate::settings::DspConfig;
use crate::spectrum::SpectrumEngine;
use crate::timing::{Direction, SymbolTiming, TimingEvent};

/// Wall-clock fields from the GPS solution
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsTime {
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
}

pub struct Engine {
    cfg: DspConfig,
    queue: EventQueue,
    spectrum: SpectrumEngine,
    cache: ToneCache,
    timing: SymbolTiming,
    direction: Direction,
    gps: GpsTime,

    // Beacon state
    beacon_cache: Vec<u8>,
    beacon_point: usize,
    beacon_sn_sum: f32,
    beacon_sn_count: u32,

    // Morse state
    morse: MorseDecoder,

    // Transmit state
    transmitter: Option<Ook48Transmitter>,
    key: bool,
    morse_schedule: Vec<KeyElement>,
    morse_schedule_due_us: u64,
}

impl Engine {
    pub fn new(cfg: DspConfig, queue: EventQueue) -> Engine {
        let params = cfg.params;
        Engine {
            queue,
            spectrum: SpectrumEngine::new(&params),
            cache: ToneCache::new(params.num_bins, params.cache_size.max(1)),
            timing: SymbolTiming::new(
                Direction::Rx,
                cfg.rx_retard as u32,
                cfg.tx_advance as u32,
                cfg.half_rate,
            ),
            direction: Direction::Rx,
            gps: GpsTime::default(),
            beacon_cache: vec![0; params.cache_size.max(1)],
            beacon_point: 0,
            beacon_sn_sum: 0.0,
            beacon_sn_count: 0,
            morse: MorseDecoder::new(params.frame_rate(), 5.0, 35.0),
            transmitter: None,
            key: false,
            morse_schedule: Vec::new(),
            morse_schedule_due_us: 0,
            cfg,
        }
    }

    pub fn audio_level(&self) -> u8 {
        self.spectrum.audio_level()
    }

    pub fn key(&self) -> bool {
        self.key
    }

    pub fn pps_active(&self) -> bool {
        self.timing.pps_active()
    }

    /// Handle a 1PPS edge with the current GPS time.
    pub fn on_pps(&mut self, now_us: u64, gps: GpsTime) {
        self.gps = gps;
        self.timing.on_pps(now_us, gps.seconds);
        match self.cfg.app {
            App::Ook48 => self.queue.publish(DspEvent::RedLine),
            App::Jt4 | App::Pi4 => {
                if gps.seconds == 0 {
                    // Minute boundary: the frame starts here
                    self.queue.publish(DspEvent::CyanLine);
                    self.beacon_point = 0;
                    self.beacon_sn_sum = 0.0;
                    self.beacon_sn_count = 0;
                }
            }
            App::Morse => {}
        }
    }

    /// Age the PPS-present flag; call once per second.
    pub fn tick_second(&mut self) {
        self.timing.tick_second();
    }

    /// Drive the timers; call frequently (at least once per sample frame in
    /// RX and once per symbol interval in TX).
    pub fn tick(&mut self, now_us: u64) {
        while let Some(event) = self.timing.poll(now_us) {
            match event {
                TimingEvent::StartCapture { start_slot } => {
                    self.cache.reset(start_slot);
                    debug!(start_slot, "capture armed");
                }
                TimingEvent::TxSymbol => self.tx_symbol(),
            }
        }
        self.run_morse_schedule(now_us);
    }

    /// Process one oversampled ADC frame (the RX tick).
    pub fn on_sample_frame(&mut self, now_us: u64, raw: &[u16]) {
        self.tick(now_us);
        if self.direction == Direction::Tx {
            return;
        }
        if self.timing.free_run_reset_due(now_us) {
            self.cache.reset(0);
        }

        let Some(_) = self.spectrum.process_frame(raw) else {
            return;
        };
        self.timing.on_sample_frame(now_us);

        self.queue
            .publish(DspEvent::GenPlot(self.spectrum.magnitude().to_vec()));
        self.queue.publish(DspEvent::DrawSpectrum);

        match self.cfg.app {
            App::Ook48 => self.ook48_frame(),
            App::Jt4 => self.beacon_frame(BeaconMode::Jt4),
            App::Pi4 => self.beacon_frame(BeaconMode::Pi4),
            App::Morse => self.morse_frame(),
        }
    }

    fn ook48_frame(&mut self) {
        let frame_ready = self.cache.push_column(self.spectrum.magnitude());
        if !frame_ready {
            return;
        }
        self.timing.frame_complete();
        // Without a live PPS the cache still records, but the symbol
        // boundaries are meaningless
        if !self.timing.pps_active() {
            return;
        }

        let decode = ook48::decode_frame(
            &self.cache,
            &self.cfg.params,
            self.cfg.decode_mode,
            self.cfg.half_rate,
            self.cfg.confidence_threshold,
        );
        self.queue.publish(DspEvent::SftMessage(decode.soft));
        match decode.outcome {
            Outcome::Char(ch) => self.queue.publish(DspEvent::Message(ch)),
            Outcome::LowConfidence => self
                .queue
                .publish(DspEvent::Message(decode.outcome.wire_char())),
            Outcome::Invalid => self.queue.publish(DspEvent::Error(0)),
        }
        self.timing.frame_consumed();
    }

    fn beacon_frame(&mut self, mode: BeaconMode) {
        if self.beacon_point >= self.beacon_cache.len() {
            return;
        }
        let sym = beacon::tone_detect(self.spectrum.magnitude(), &self.cfg.params);
        self.beacon_cache[self.beacon_point] = sym.tone;
        self.beacon_point += 1;
        if sym.signal_noise > 0.0 {
            self.beacon_sn_sum += sym.signal_noise;
            self.beacon_sn_count += 1;
        }

        if self.beacon_point == self.beacon_cache.len() {
            let mean_sn = if self.beacon_sn_count > 0 {
                self.beacon_sn_sum / self.beacon_sn_count as f32
            } else {
                0.0
            };
            let snr_db = beacon::snr_db(mean_sn, &self.cfg.params);
            match beacon::decode_cache(mode, &self.beacon_cache) {
                BeaconOutcome::Message { text } => {
                    info!(%text, snr_db, "beacon message");
                    let event = match mode {
                        BeaconMode::Jt4 => DspEvent::JtMessage {
                            hours: self.gps.hours,
                            minutes: self.gps.minutes,
                            snr_db,
                            text,
                        },
                        BeaconMode::Pi4 => DspEvent::PiMessage {
                            hours: self.gps.hours,
                            minutes: self.gps.minutes,
                            snr_db,
                            text,
                        },
                    };
                    self.queue.publish(event);
                }
                BeaconOutcome::NoSync { mismatches } => {
                    debug!(mismatches, "beacon minute without sync");
                }
                BeaconOutcome::FanoTimeout => {
                    debug!("beacon decode exhausted its cycle budget");
                }
            }
            self.beacon_point = 0;
            self.beacon_sn_sum = 0.0;
            self.beacon_sn_count = 0;
        }
    }

    fn morse_frame(&mut self) {
        let mag = self.spectrum.magnitude()[self.cfg.params.tone0];
        let events: Vec<MorseEvent> = self.morse.feed(mag).to_vec();
        for event in events {
            match event {
                MorseEvent::Char(Some(ch)) => {
                    self.queue.publish(DspEvent::MorseMessage(ch as u8))
                }
                MorseEvent::Char(None) => self.queue.publish(DspEvent::MorseMessage(0x7E)),
                MorseEvent::WordSep => self.queue.publish(DspEvent::MorseMessage(b' ')),
                MorseEvent::Locked(wpm) => self.queue.publish(DspEvent::MorseLocked(wpm)),
                MorseEvent::Lost => self.queue.publish(DspEvent::MorseLost),
            }
        }
    }

    // --- Transmit ---

    /// Switch to transmit with a compiled message.
    pub fn start_tx(&mut self, template: &[u8], locator: &str) {
        self.transmitter = Some(Ook48Transmitter::new(
            template,
            locator,
            self.cfg.half_rate,
        ));
        self.direction = Direction::Tx;
        self.timing = SymbolTiming::new(
            Direction::Tx,
            self.cfg.rx_retard as u32,
            self.cfg.tx_advance as u32,
            self.cfg.half_rate,
        );
    }

    /// Return to receive.
    pub fn stop_tx(&mut self) {
        self.transmitter = None;
        self.key = false;
        self.morse_schedule.clear();
        self.direction = Direction::Rx;
        self.timing = SymbolTiming::new(
            Direction::Rx,
            self.cfg.rx_retard as u32,
            self.cfg.tx_advance as u32,
            self.cfg.half_rate,
        );
    }

    fn tx_symbol(&mut self) {
        let Some(tx) = self.transmitter.as_mut() else {
            return;
        };
        let out = tx.on_symbol(self.gps.seconds);
        self.key = out.key;
        if let Some(ch) = out.sent {
            self.queue.publish(DspEvent::TMessage(ch));
        }
        if out.end_of_second {
            self.timing.cancel_tx();
        }
    }

    /// Key a pre-compiled CW element schedule (ident, test dashes, free
    /// text). Replaces any schedule in progress.
    pub fn schedule_morse(&mut self, now_us: u64, elements: Vec<KeyElement>) {
        self.morse_schedule = elements;
        self.morse_schedule.reverse(); // consume from the back
        self.morse_schedule_due_us = now_us;
        self.direction = Direction::Tx;
    }

    fn run_morse_schedule(&mut self, now_us: u64) {
        while !self.morse_schedule.is_empty() && now_us >= self.morse_schedule_due_us {
            let element = self.morse_schedule.pop().unwrap();
            self.key = element.key;
            self.morse_schedule_due_us += element.duration_us;
        }
        if self.morse_schedule.is_empty() && self.direction == Direction::Tx
            && self.transmitter.is_none()
            && now_us >= self.morse_schedule_due_us
        {
            self.key = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventQueue;
    use crate::params::{self, ADC_MIDSCALE, OVERSAMPLE};
    use crate::settings::Settings;
    use bus::BusReader;

    fn rx_engine() -> (Engine, BusReader<DspEvent>) {
        let mut queue = EventQueue::new(256);
        let rx = queue.subscribe();
        let engine = Engine::new(Settings::default().snapshot(), queue);
        (engine, rx)
    }

    fn tone_frame(freq_hz: f32, amplitude: f32) -> Vec<u16> {
        let p = params::OOK48;
        let rate = p.sample_rate as f32 * OVERSAMPLE as f32;
        (0..p.oversampled_len())
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq_hz * i as f32 / rate;
                (ADC_MIDSCALE + amplitude * phase.sin()) as u16
            })
            .collect()
    }

    fn drain(rx: &mut BusReader<DspEvent>) -> Vec<DspEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_no_message_without_pps() {
        let (mut engine, mut rx) = rx_engine();
        let on = tone_frame(800.0, 600.0);
        for i in 0..8 {
            engine.on_sample_frame(i * 111_111, &on);
        }
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, DspEvent::Message(_))));
    }

    #[test]
    fn test_decode_published_with_pps() {
        let (mut engine, mut rx) = rx_engine();
        engine.on_pps(0, GpsTime::default());
        engine.tick(0);
        // 'T' = index 53, codeword with slots matching; easier to check
        // that a well-formed on/off frame produces SFT then MSG in order
        let word = crate::ook48::tables::ENCODE_4FROM8[(b'T' - 31) as usize];
        for i in 0..8 {
            let on = (word & (0x80 >> i)) != 0;
            let frame = tone_frame(800.0, if on { 600.0 } else { 2.0 });
            engine.on_sample_frame(i as u64 * 111_111, &frame);
        }
        let events = drain(&mut rx);
        let sft_pos = events
            .iter()
            .position(|e| matches!(e, DspEvent::SftMessage(_)));
        let msg_pos = events
            .iter()
            .position(|e| matches!(e, DspEvent::Message(_)));
        assert!(sft_pos.is_some(), "soft magnitudes not published");
        match &events[msg_pos.expect("no character published")] {
            DspEvent::Message(ch) => assert_eq!(*ch, b'T'),
            _ => unreachable!(),
        }
        assert!(sft_pos < msg_pos, "SFT must precede MSG");
    }

    #[test]
    fn test_pps_resets_partial_frame() {
        let (mut engine, mut rx) = rx_engine();
        engine.on_pps(0, GpsTime::default());
        engine.tick(0);
        let frame = tone_frame(800.0, 300.0);
        for i in 0..5 {
            engine.on_sample_frame(i * 111_111, &frame);
        }
        // Mid-frame PPS discards the in-flight symbols
        engine.on_pps(1_000_000, GpsTime { seconds: 1, ..Default::default() });
        engine.tick(1_000_000);
        for i in 0..3 {
            engine.on_sample_frame(1_000_000 + i * 111_111, &frame);
        }
        // Only 3 columns since the reset: no frame-ready, no message
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, DspEvent::Message(_))));
    }

    #[test]
    fn test_tx_key_stream_and_echo() {
        let mut queue = EventQueue::new(64);
        let mut rx = queue.subscribe();
        let mut engine = Engine::new(Settings::default().snapshot(), queue);
        engine.start_tx(b"T\r", "");
        engine.on_pps(0, GpsTime::default());

        let mut keyed = Vec::new();
        for tick in 0..9u64 {
            engine.tick(tick * 111_111 + 1);
            keyed.push(engine.key());
        }
        // First byte is the leading CR codeword (0x0F): bits 00001111
        assert_eq!(
            keyed,
            vec![false, false, false, false, true, true, true, true, false]
        );
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, DspEvent::TMessage(0x0D))));
    }

    #[test]
    fn test_morse_schedule_keys_line() {
        let (mut engine, _rx) = rx_engine();
        engine.schedule_morse(0, crate::morse::key_text("E", 12));
        engine.tick(1);
        assert!(engine.key(), "dit should key the line");
        engine.tick(100_001);
        assert!(!engine.key(), "key released after the dit");
    }
}
