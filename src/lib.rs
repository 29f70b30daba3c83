//! DSP and protocol core of a narrow-band amateur-radio weak-signal
//! receiver/transmitter.
//!
//! Audio frames from a DC-biased superheterodyne receiver are decimated,
//! windowed and transformed into magnitude spectra on a sliding cadence,
//! then decoded by one of four modes:
//!
//! - **OOK48** - GPS-synchronous on-off keying, one character per 8-symbol
//!   frame using a 4-of-8 constant-weight code at 9 baud, with a matching
//!   symbol-paced transmit encoder
//! - **JT4G** - 4-FSK beacon mode, 207-symbol frame, K=32 rate-1/2
//!   convolutional code recovered with a Fano sequential decoder
//! - **PI4** - 4-FSK beacon mode, 146-symbol frame, distinct interleaver
//!   and shorter payload over the same Fano machinery
//! - **Morse** - asynchronous streaming CW decoder driven by tone-bin
//!   magnitudes from the same FFT path
//!
//! Symbol boundaries are disciplined by a GPS 1PPS reference through the
//! timing state machine, and everything the host sees crosses the
//! DSP-to-dispatch queue as serial telemetry lines.

pub mod beacon;
pub mod cache;
pub mod dispatch;
pub mod engine;
pub mod fano;
pub mod locator;
pub mod morse;
pub mod ook48;
pub mod params;
pub mod protocol;
pub mod settings;
pub mod spectrum;
pub mod timing;
pub mod tracing_init;

pub use engine::{Engine, GpsTime};
pub use params::App;
pub use settings::Settings;
