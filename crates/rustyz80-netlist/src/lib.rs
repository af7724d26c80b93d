//! Transistor-level netlist model of the Zilog Z80.
//!
//! This crate holds the data the switch-level simulator operates on: the
//! nets and transistors photographically extracted from the die, the name
//! tables that map human-readable signal names to net numbers, and the
//! loaders for the text resources that describe all of the above.
//!
//! # Architecture
//!
//! ```text
//! nodenames.js ──┐
//! netnames.js ───┤                ┌──────────────┐
//! transdefs.js ──┼── loader ────► │   Netlist    │
//! segdefs.js ────┘                │ ┌──────────┐ │
//!                                 │ │  Store   │ │  SoA transistor arrays,
//!                                 │ │          │ │  per-net flags, CSR
//!                                 │ ├──────────┤ │  adjacency pools
//!                                 │ │  Names   │ │  name ↔ net id, buses,
//!                                 │ └──────────┘ │  override tracking
//!                                 └──────────────┘
//! ```
//!
//! All cross-references between nets and transistors are plain integer
//! indices; the store owns every array and hands out slices. Other crates
//! mutate only two things at simulation time: a net's logic state and a
//! transistor's on/off switch.

mod loader;
mod names;
mod netlist;
mod store;

pub use loader::LoadError;
pub use names::{NameOp, NameOpError, NameTable};
pub use netlist::{Netlist, ReadError};
pub use store::{NetFlags, NetlistBuilder, NetlistStore};

/// Index of a net in the netlist.
pub type NetId = u16;

/// Index of a transistor in the netlist.
pub type TranId = u16;

/// Upper bound on net indices; every dense per-net array has this length.
pub const MAX_NETS: usize = 3600;

/// Upper bound on transistor indices.
pub const MAX_TRANSISTORS: usize = 9000;

/// The ground rail net (`vss`). Always low, never recalculated.
pub const GND: NetId = 1;

/// The power rail net (`vcc`). Always high, never recalculated.
pub const VCC: NetId = 2;

/// A sampled pin or watch value.
///
/// Watch history stores these as raw bytes; `Invalid` marks samples outside
/// the recorded window and `Bus` marks a watch that must be read through the
/// bus aggregation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PinState {
    /// Logic low.
    Low = 0,
    /// Logic high.
    High = 1,
    /// Neither driven nor pulled.
    Floating = 2,
    /// No sample recorded.
    Invalid = 3,
    /// The sample names a bus, not a single net.
    Bus = 4,
}

impl PinState {
    /// Maps a logic level to a pin sample.
    #[must_use]
    pub fn from_bit(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }

    /// Decodes a raw history byte.
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Low,
            1 => Self::High,
            2 => Self::Floating,
            4 => Self::Bus,
            _ => Self::Invalid,
        }
    }
}

impl From<PinState> for u8 {
    fn from(p: PinState) -> Self {
        p as Self
    }
}
