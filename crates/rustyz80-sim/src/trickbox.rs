//! The trickbox: the simulated world around the chip.
//!
//! Provides the 64 KiB memory and 256-byte I/O space the bus protocol is
//! serviced against, an Intel-HEX loader to fill the memory, a console
//! echo port, and half-cycle-timed pin pulses so test programs can script
//! external events (interrupts, bus requests) without polling.

use std::io::{self, BufRead};
use std::num::ParseIntError;

use thiserror::Error;

use crate::sim::ControlPin;

/// I/O address whose writes are echoed to the console channel.
pub const ECHO_ADDRESS: u16 = 0x0800;

/// Intel-HEX parse failure.
#[derive(Debug, Error)]
pub enum HexError {
    /// Underlying reader error.
    #[error("read error: {0}")]
    Io(#[from] io::Error),

    /// A record does not begin with `:`.
    #[error("line {0}: record does not start with ':'")]
    MissingStart(usize),

    /// A record contains a non-hex digit or has odd length.
    #[error("line {0}: invalid hex data")]
    InvalidHex(usize),

    /// A record is shorter than its declared byte count.
    #[error("line {0}: truncated record")]
    Truncated(usize),

    /// The record checksum does not balance.
    #[error("line {0}: checksum mismatch")]
    ChecksumMismatch(usize),

    /// Only data (00) and end-of-file (01) records are understood.
    #[error("line {0}: unsupported record type {1:#04x}")]
    UnsupportedRecordType(usize, u8),
}

/// A scheduled drive on one control pin.
#[derive(Debug, Clone, Copy)]
struct PinPulse {
    start: u64,
    hold: u64,
    level: bool,
}

/// Pin drives and flow control produced by one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickActions {
    /// Level to drive on each control pin this half-cycle, if any.
    pub pins: [Option<bool>; 5],
    /// The scheduled cut-off was reached; the run should stop.
    pub stop: bool,
}

impl TickActions {
    /// Whether this tick requires no work at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.stop && self.pins.iter().all(Option::is_none)
    }
}

/// Simulated memory, I/O space, and scripted pin events.
pub struct Trickbox {
    mem: Box<[u8; 65536]>,
    io: Box<[u8; 256]>,
    pulses: [Option<PinPulse>; 5],
    stop_at: Option<u64>,
    echo_writes: u32,
}

impl Default for Trickbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Trickbox {
    /// Creates a trickbox with zeroed memory and no scheduled events.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mem: Box::new([0u8; 65536]),
            io: Box::new([0u8; 256]),
            pulses: [None; 5],
            stop_at: None,
            echo_writes: 0,
        }
    }

    /// Clears schedules and counters. Memory and I/O contents survive so a
    /// loaded program can be re-run.
    pub fn reset(&mut self) {
        self.pulses = [None; 5];
        self.stop_at = None;
        self.echo_writes = 0;
    }

    /// Reads simulated memory.
    #[inline]
    #[must_use]
    pub fn read_mem(&self, ab: u16) -> u8 {
        self.mem[ab as usize]
    }

    /// Writes simulated memory.
    #[inline]
    pub fn write_mem(&mut self, ab: u16, db: u8) {
        self.mem[ab as usize] = db;
    }

    /// Reads the I/O space; only the low address byte selects the port.
    #[inline]
    #[must_use]
    pub fn read_io(&self, ab: u16) -> u8 {
        self.io[(ab & 0xFF) as usize]
    }

    /// Writes the I/O space. A write to [`ECHO_ADDRESS`] surfaces every
    /// other non-linefeed byte as a console character.
    pub fn write_io(&mut self, ab: u16, db: u8) -> Option<char> {
        self.io[(ab & 0xFF) as usize] = db;
        if ab != ECHO_ADDRESS || db == b'\n' {
            return None;
        }
        let echo = self.echo_writes % 2 == 0;
        self.echo_writes += 1;
        echo.then(|| char::from(db))
    }

    /// Loads an Intel-HEX stream into memory.
    ///
    /// Data records (type 00) fill memory with wrapping addresses; an
    /// end-of-file record (type 01) stops the parse. Checksums are
    /// verified.
    ///
    /// # Errors
    ///
    /// Any [`HexError`]; earlier records stay applied.
    pub fn load_hex<R: BufRead>(&mut self, reader: R) -> Result<(), HexError> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(hex) = line.strip_prefix(':') else {
                return Err(HexError::MissingStart(lineno));
            };

            let bytes = decode_hex(hex).map_err(|()| HexError::InvalidHex(lineno))?;
            if bytes.len() < 5 {
                return Err(HexError::Truncated(lineno));
            }
            let count = bytes[0] as usize;
            if bytes.len() != count + 5 {
                return Err(HexError::Truncated(lineno));
            }
            let sum: u8 = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
            if sum != 0 {
                return Err(HexError::ChecksumMismatch(lineno));
            }

            let rtype = bytes[3];
            match rtype {
                0x00 => {
                    let mut address = u16::from(bytes[1]) << 8 | u16::from(bytes[2]);
                    for &byte in &bytes[4..4 + count] {
                        self.mem[address as usize] = byte;
                        address = address.wrapping_add(1);
                    }
                }
                0x01 => break,
                _ => return Err(HexError::UnsupportedRecordType(lineno, rtype)),
            }
        }
        Ok(())
    }

    /// Arms a pulse: drive `level` on `pin` at half-cycle `start`, restore
    /// the opposite level `hold` half-cycles later.
    pub fn schedule_pulse(&mut self, pin: ControlPin, start: u64, hold: u64, level: bool) {
        self.pulses[pin as usize] = Some(PinPulse { start, hold, level });
    }

    /// Requests a cooperative stop once the given half-cycle is reached.
    pub fn stop_at(&mut self, hcycle: u64) {
        self.stop_at = Some(hcycle);
    }

    /// Advances the event schedule to half-cycle `hcycle` and reports the
    /// pin drives and flow control due now.
    pub fn tick(&mut self, hcycle: u64) -> TickActions {
        let mut actions = TickActions::default();
        for (slot, action) in self.pulses.iter_mut().zip(&mut actions.pins) {
            let Some(pulse) = *slot else { continue };
            if hcycle == pulse.start {
                *action = Some(pulse.level);
            } else if hcycle >= pulse.start + pulse.hold {
                *action = Some(!pulse.level);
                *slot = None;
            }
        }
        if self.stop_at == Some(hcycle) {
            self.stop_at = None;
            actions.stop = true;
        }
        actions
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let text = core::str::from_utf8(pair).map_err(|_| ())?;
            u8::from_str_radix(text, 16).map_err(|_: ParseIntError| ())
        })
        .collect()
}
