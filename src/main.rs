//! Offline decoder: run the DSP core over a WAV recording
//!
//! Reads mono 16-bit audio at the active mode's oversampled rate, slices it
//! into ingest frames, synthesises a 1PPS edge at each second boundary and
//! prints the telemetry lines the device would emit on its serial link.
//! The DSP context runs on its own thread; this thread plays the dispatch
//! context, draining the event queue.

use std::thread;

use clap::{Parser, ValueEnum};

use ook48::dispatch::{telemetry_line, EventQueue};
use ook48::engine::{Engine, GpsTime};
use ook48::ook48::DecodeMode;
use ook48::params::{App, OVERSAMPLE};
use ook48::protocol;
use ook48::settings::Settings;
use ook48::tracing_init;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Ook48,
    Jt4,
    Pi4,
    Morse,
}

impl From<ModeArg> for App {
    fn from(m: ModeArg) -> App {
        match m {
            ModeArg::Ook48 => App::Ook48,
            ModeArg::Jt4 => App::Jt4,
            ModeArg::Pi4 => App::Pi4,
            ModeArg::Morse => App::Morse,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "decode_wav", about = "Decode a weak-signal recording")]
struct Args {
    /// Input WAV file (mono 16-bit at the mode's oversampled rate)
    wav: String,

    /// Operating mode
    #[arg(long, value_enum, default_value = "ook48")]
    mode: ModeArg,

    /// Half-rate OOK48 operation
    #[arg(long)]
    half_rate: bool,

    /// OOK48 decode mode selector (0 normal, 1 alt, 2 rainscatter)
    #[arg(long, default_value_t = 0)]
    decmode: u8,

    /// Confidence threshold for the OOK48 soft gate
    #[arg(long, default_value_t = 0.180)]
    confidence: f32,
}

fn main() {
    tracing_init::init_tracing();
    let args = Args::parse();

    let mut settings = Settings::default();
    settings.app = args.mode.into();
    settings.half_rate = args.half_rate;
    settings.confidence_threshold = args.confidence;
    if let Some(mode) = DecodeMode::from_selector(args.decmode) {
        settings.decode_mode = mode;
    }
    let cfg = settings.snapshot();

    let reader = hound::WavReader::open(&args.wav).unwrap_or_else(|e| {
        eprintln!("cannot open {}: {}", args.wav, e);
        std::process::exit(1);
    });
    let spec = reader.spec();
    let oversampled_rate = cfg.params.sample_rate * OVERSAMPLE as u32;
    if spec.channels != 1 || spec.sample_rate != oversampled_rate {
        eprintln!(
            "expected mono {} Hz, got {} channel(s) at {} Hz",
            oversampled_rate, spec.channels, spec.sample_rate
        );
        std::process::exit(1);
    }

    // Signed PCM recentres onto the unipolar ADC scale
    let samples: Vec<u16> = reader
        .into_samples::<i16>()
        .map(|s| ((s.unwrap_or(0) as i32 / 16) + 2048).clamp(0, 4095) as u16)
        .collect();

    let mut queue = EventQueue::new(1024);
    let mut events = queue.subscribe();
    let mut engine = Engine::new(cfg, queue);

    println!("{}", protocol::ready_line(env!("CARGO_PKG_VERSION"), settings.morse_wpm));

    let frame_len = cfg.params.oversampled_len();
    let dsp = thread::spawn(move || {
        let mut now_us: u64 = 0;
        let frame_us = 1_000_000u64 * frame_len as u64 / oversampled_rate as u64;
        let mut next_pps: u64 = 0;
        let mut seconds: i32 = 0;

        for frame in samples.chunks_exact(frame_len) {
            if now_us >= next_pps {
                engine.on_pps(
                    now_us,
                    GpsTime {
                        hours: 0,
                        minutes: 0,
                        seconds,
                    },
                );
                engine.tick_second();
                seconds = (seconds + 1) % 60;
                next_pps += 1_000_000;
            }
            engine.on_sample_frame(now_us, frame);
            now_us += frame_us;
        }
    });

    while let Ok(event) = events.recv() {
        if let Some(line) = telemetry_line(&event) {
            println!("{}", line);
        }
    }
    dsp.join().unwrap();
}
