//! Serial line protocol
//!
//! The host drives and observes the core over newline-terminated ASCII
//! lines. Inbound lines parse into typed commands; outbound telemetry is
//! formatted here so every wire shape lives in one place.

use snafu::Snafu;

use crate::ook48::DecodeMode;
use crate::params::App;
use crate::settings::Settings;

/// Parsed inbound command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetLocatorLength(u8),
    SetDecodeMode(DecodeMode),
    SetTxAdvance(u16),
    SetRxRetard(u16),
    SetHalfRate(bool),
    SetMorseWpm(u8),
    SetConfidence(f32),
    SetApp(App),
    SetMessage { slot: u8, text: String },
    Tx,
    Rx,
    TxMessage(u8),
    Dashes,
    MorseTx(String),
    Ident,
    Clear,
    Reboot,
}

#[derive(Debug, Snafu, PartialEq)]
pub enum CommandError {
    #[snafu(display("unknown command:{}", line))]
    Unknown { line: String },

    #[snafu(display("invalid locator length"))]
    InvalidLocatorLength,

    #[snafu(display("invalid decode mode"))]
    InvalidDecodeMode,

    #[snafu(display("value out of range"))]
    ValueOutOfRange,

    #[snafu(display("invalid app"))]
    InvalidApp,

    #[snafu(display("invalid slot"))]
    InvalidSlot,

    #[snafu(display("missing text"))]
    MissingText,
}

fn parse_slot(s: &str) -> Result<u8, CommandError> {
    match s.parse::<u8>() {
        Ok(slot) if slot <= 9 => Ok(slot),
        _ => Err(CommandError::InvalidSlot),
    }
}

/// Parse one inbound line (without its terminator).
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    if let Some(rest) = line.strip_prefix("SET:loclen:") {
        return match rest.parse::<u8>() {
            Ok(l @ (6 | 8 | 10)) => Ok(Command::SetLocatorLength(l)),
            _ => Err(CommandError::InvalidLocatorLength),
        };
    }
    if let Some(rest) = line.strip_prefix("SET:decmode:") {
        return rest
            .parse::<u8>()
            .ok()
            .and_then(DecodeMode::from_selector)
            .map(Command::SetDecodeMode)
            .ok_or(CommandError::InvalidDecodeMode);
    }
    if let Some(rest) = line.strip_prefix("SET:txadv:") {
        return match rest.parse::<u16>() {
            Ok(v) if v <= 999 => Ok(Command::SetTxAdvance(v)),
            _ => Err(CommandError::ValueOutOfRange),
        };
    }
    if let Some(rest) = line.strip_prefix("SET:rxret:") {
        return match rest.parse::<u16>() {
            Ok(v) if v <= 999 => Ok(Command::SetRxRetard(v)),
            _ => Err(CommandError::ValueOutOfRange),
        };
    }
    if let Some(rest) = line.strip_prefix("SET:halfrate:") {
        return match rest {
            "0" => Ok(Command::SetHalfRate(false)),
            "1" => Ok(Command::SetHalfRate(true)),
            _ => Err(CommandError::ValueOutOfRange),
        };
    }
    if let Some(rest) = line.strip_prefix("SET:morsewpm:") {
        return match rest.parse::<u8>() {
            Ok(v) if (5..=40).contains(&v) => Ok(Command::SetMorseWpm(v)),
            _ => Err(CommandError::ValueOutOfRange),
        };
    }
    if let Some(rest) = line.strip_prefix("SET:confidence:") {
        return match rest.parse::<f32>() {
            Ok(v) if (0.0..=1.0).contains(&v) => Ok(Command::SetConfidence(v)),
            _ => Err(CommandError::ValueOutOfRange),
        };
    }
    if let Some(rest) = line.strip_prefix("SET:app:") {
        return rest
            .parse::<u8>()
            .ok()
            .and_then(App::from_selector)
            .map(Command::SetApp)
            .ok_or(CommandError::InvalidApp);
    }
    if let Some(rest) = line.strip_prefix("SET:msg:") {
        let (slot_str, text) = rest.split_once(':').ok_or(CommandError::MissingText)?;
        let slot = parse_slot(slot_str)?;
        return Ok(Command::SetMessage {
            slot,
            text: text.to_string(),
        });
    }
    if line == "CMD:tx" {
        return Ok(Command::Tx);
    }
    if line == "CMD:rx" {
        return Ok(Command::Rx);
    }
    if let Some(rest) = line.strip_prefix("CMD:txmsg:") {
        return Ok(Command::TxMessage(parse_slot(rest)?));
    }
    if line == "CMD:dashes" {
        return Ok(Command::Dashes);
    }
    if let Some(rest) = line.strip_prefix("CMD:morsetx:") {
        return Ok(Command::MorseTx(rest.to_string()));
    }
    if line == "CMD:ident" {
        return Ok(Command::Ident);
    }
    if line == "CMD:clear" {
        return Ok(Command::Clear);
    }
    if line == "CMD:reboot" {
        return Ok(Command::Reboot);
    }
    Err(CommandError::Unknown {
        line: line.to_string(),
    })
}

/// Apply a `SET:` command to the settings record, returning the `ACK:`
/// line. `CMD:` actions belong to the engine and return `None` here.
///
/// Changing the app selector requires an engine rebuild from a fresh
/// snapshot; the caller handles that after acknowledging.
pub fn apply_set(command: &Command, settings: &mut Settings) -> Option<String> {
    match command {
        Command::SetLocatorLength(l) => {
            settings.locator_length = *l;
            Some(ack_line("SET:loclen"))
        }
        Command::SetDecodeMode(mode) => {
            settings.decode_mode = *mode;
            Some(ack_line("SET:decmode"))
        }
        Command::SetTxAdvance(v) => {
            settings.tx_advance = *v;
            Some(ack_line("SET:txadv"))
        }
        Command::SetRxRetard(v) => {
            settings.rx_retard = *v;
            Some(ack_line("SET:rxret"))
        }
        Command::SetHalfRate(on) => {
            settings.half_rate = *on;
            Some(ack_line("SET:halfrate"))
        }
        Command::SetMorseWpm(wpm) => {
            settings.morse_wpm = *wpm;
            Some(ack_line("SET:morsewpm"))
        }
        Command::SetConfidence(v) => {
            settings.confidence_threshold = *v;
            Some(ack_line("SET:confidence"))
        }
        Command::SetApp(app) => {
            settings.app = *app;
            Some(ack_line("SET:app - rebooting"))
        }
        Command::SetMessage { slot, text } => {
            settings.set_message(*slot as usize, text.as_bytes());
            Some(ack_line("SET:msg"))
        }
        _ => None,
    }
}

/// Waterfall annotation colours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Red,
    Cyan,
    Tx,
    Rx,
}

/// Render a character payload, escaping the control tokens.
fn char_payload(ch: u8) -> String {
    match ch {
        0x0D => "<CR>".to_string(),
        0x7E => "<UNK>".to_string(),
        c => (c as char).to_string(),
    }
}

/// Boot banner
pub fn ready_line(version: &str, morse_wpm: u8) -> String {
    format!("RDY:fw={};morsewpm={}", version, morse_wpm)
}

/// 1 Hz status line
pub fn status_line(
    time: Option<(i32, i32, i32)>,
    latitude: f32,
    longitude: f32,
    locator: &str,
    tx: bool,
    audio_level: u8,
) -> String {
    match time {
        Some((h, m, s)) => format!(
            "STA:{:02}:{:02}:{:02},{:.4},{:.4},{},{},{}",
            h, m, s, latitude, longitude, locator, tx as u8, audio_level
        ),
        None => format!("STA:--:--:--,0,0,----------,{},{}", tx as u8, audio_level),
    }
}

/// OOK48 decoded character
pub fn msg_line(ch: u8) -> String {
    format!("MSG:{}", char_payload(ch))
}

/// OOK48 decode error character
pub fn err_char_line(ch: u8) -> String {
    format!("ERR:{}", char_payload(ch))
}

/// Command or decode failure reason
pub fn err_line(reason: &str) -> String {
    format!("ERR:{}", reason)
}

/// Transmitted character echo
pub fn tx_line(ch: u8) -> String {
    format!("TX:{}", char_payload(ch))
}

/// Soft magnitudes for the external accumulator
pub fn sft_line(soft: &[f32; 8]) -> String {
    let parts: Vec<String> = soft.iter().map(|v| format!("{:.3}", v)).collect();
    format!("SFT:{}", parts.join(","))
}

/// One waterfall row of pixel intensities
pub fn wf_line(pixels: &[u8]) -> String {
    let parts: Vec<String> = pixels.iter().map(|p| p.to_string()).collect();
    format!("WF:{}", parts.join(","))
}

/// JT4 decode
pub fn jt_line(hours: i32, minutes: i32, snr_db: f32, message: &str) -> String {
    format!("JT:{:02}:{:02},{:.0},{}", hours, minutes, snr_db, message)
}

/// PI4 decode
pub fn pi_line(hours: i32, minutes: i32, snr_db: f32, message: &str) -> String {
    format!("PI:{:02}:{:02},{:.0},{}", hours, minutes, snr_db, message)
}

/// Morse decoded character; word separators render as the space token
pub fn mch_line(ch: u8) -> String {
    if ch == b' ' {
        return "MCH:<SP>".to_string();
    }
    format!("MCH:{}", char_payload(ch))
}

/// Morse lock state
pub fn mls_line(wpm: Option<f32>) -> String {
    match wpm {
        Some(w) => format!("MLS:{:.1}", w),
        None => "MLS:LOST".to_string(),
    }
}

/// Waterfall annotation
pub fn mrk_line(marker: Marker) -> String {
    let tag = match marker {
        Marker::Red => "RED",
        Marker::Cyan => "CYN",
        Marker::Tx => "TX",
        Marker::Rx => "RX",
    };
    format!("MRK:{}", tag)
}

/// Command acknowledgement
pub fn ack_line(command: &str) -> String {
    format!("ACK:{}", command)
}
