//! Watch recorder: per-signal sample history for waveform display.
//!
//! Each watched net gets a ring buffer indexed by half-cycle; a watched bus
//! has no buffer of its own and aggregates the buffers of its member nets
//! at read time. The valid window is shared by all watches and tracked by
//! `first_valid_hcycle`/`next_hcycle`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use rustyz80_netlist::{NameTable, NetId, Netlist, PinState};

/// Ring-buffer length per watch, in half-cycles. A power of two.
pub const MAX_HISTORY: usize = 1024;

/// One watched signal. `net == 0` marks a bus watch, resolved through the
/// name tables at read time.
pub struct Watch {
    /// Signal name (net or bus).
    pub name: String,
    /// Net id, or 0 for a bus.
    pub net: NetId,
    history: Box<[u8; MAX_HISTORY]>,
}

impl Watch {
    /// Creates a watch with an empty history.
    #[must_use]
    pub fn new(name: impl Into<String>, net: NetId) -> Self {
        Self {
            name: name.into(),
            net,
            history: Box::new([PinState::Invalid as u8; MAX_HISTORY]),
        }
    }

    fn clear(&mut self) {
        self.history.fill(PinState::Invalid as u8);
    }
}

#[derive(Serialize, Deserialize)]
struct WatchEntry {
    name: String,
    net: NetId,
}

#[derive(Serialize, Deserialize)]
struct WatchlistDoc {
    watchlist: Vec<WatchEntry>,
}

/// The set of watched signals and their shared recording window.
#[derive(Default)]
pub struct WatchList {
    watches: Vec<Watch>,
    first_valid_hcycle: u64,
    next_hcycle: u64,
}

impl WatchList {
    /// Creates an empty watch list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of watches (buses included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// First half-cycle still inside the ring buffer.
    #[must_use]
    pub fn first_valid_hcycle(&self) -> u64 {
        self.first_valid_hcycle
    }

    /// One past the newest recorded half-cycle.
    #[must_use]
    pub fn next_hcycle(&self) -> u64 {
        self.next_hcycle
    }

    /// Iterates the watches in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Watch> {
        self.watches.iter()
    }

    /// Finds a watch by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Watch> {
        self.watches.iter().find(|w| w.name == name)
    }

    /// Finds a watch recording the given net.
    #[must_use]
    pub fn find_net(&self, net: NetId) -> Option<&Watch> {
        self.watches.iter().find(|w| w.net == net)
    }

    /// Drops all recorded samples and resets the window.
    pub fn clear(&mut self) {
        self.first_valid_hcycle = 0;
        self.next_hcycle = 0;
        for w in &mut self.watches {
            w.clear();
        }
    }

    /// Records `value` for watch `index` at half-cycle `hcycle` and
    /// advances the window.
    pub fn append(&mut self, index: usize, hcycle: u64, value: u8) {
        self.watches[index].history[(hcycle % MAX_HISTORY as u64) as usize] = value;
        self.next_hcycle = hcycle + 1;
        self.first_valid_hcycle = (hcycle + 1).saturating_sub(MAX_HISTORY as u64);
    }

    /// Samples every net watch from the netlist at half-cycle `hcycle`.
    /// Bus watches record nothing; their members do.
    pub fn sample_all(&mut self, nl: &Netlist, hcycle: u64) {
        for i in 0..self.watches.len() {
            let net = self.watches[i].net;
            if net == 0 {
                continue;
            }
            let bit = PinState::from_bit(nl.store().net_state(net));
            self.append(i, hcycle, bit as u8);
        }
    }

    /// Sample of a single watch at a half-cycle.
    ///
    /// Returns [`PinState::Invalid`] outside the recorded window and
    /// [`PinState::Bus`] for bus watches, which must be read through
    /// [`Self::bus_value_at`].
    #[must_use]
    pub fn value_at(&self, w: &Watch, hcycle: u64) -> PinState {
        if self.next_hcycle == 0
            || hcycle < self.first_valid_hcycle
            || hcycle >= self.next_hcycle
        {
            return PinState::Invalid;
        }
        if w.net == 0 {
            return PinState::Bus;
        }
        PinState::from_raw(w.history[(hcycle % MAX_HISTORY as u64) as usize])
    }

    /// Aggregate value of a bus watch at a half-cycle.
    ///
    /// Returns `(value, width)`; member 0 of the bus is the LSB. A width of
    /// zero means the value could not be read: the half-cycle is outside
    /// the window, the watch is not a bus, a member net is not watched, or
    /// a member sample is floating/invalid.
    #[must_use]
    pub fn bus_value_at(&self, w: &Watch, hcycle: u64, names: &NameTable) -> (u32, u32) {
        if self.next_hcycle == 0
            || hcycle < self.first_valid_hcycle
            || hcycle >= self.next_hcycle
            || w.net != 0
        {
            return (0, 0);
        }
        let Some(nets) = names.bus(&w.name) else {
            return (0, 0);
        };
        let width = nets.len() as u32;
        let mut value = 0u32;
        for &net in nets {
            value >>= 1;
            let Some(member) = self.find_net(net) else {
                return (0, 0);
            };
            let raw = member.history[(hcycle % MAX_HISTORY as u64) as usize];
            if raw > 1 {
                return (0, 0);
            }
            value |= u32::from(raw) << (width - 1);
        }
        (value, width)
    }

    /// Replaces the watch set with the named signals, keeping recorded
    /// history for watches that survive. Watched buses get their member
    /// nets appended automatically so the aggregate can be read back.
    pub fn set_watchlist(&mut self, list: &[String], names: &NameTable) {
        let mut new_watches = Vec::with_capacity(list.len());
        let mut buses = Vec::new();
        for name in list {
            let existing = self
                .watches
                .iter()
                .position(|w| &w.name == name)
                .map(|i| self.watches.swap_remove(i));
            let w = existing.unwrap_or_else(|| Watch::new(name.clone(), names.net(name).unwrap_or(0)));
            if w.net == 0 {
                buses.push(w.name.clone());
            }
            new_watches.push(w);
        }
        self.watches = new_watches;

        for bus in buses {
            let Some(nets) = names.bus(&bus) else {
                warn!("watched bus `{bus}` has no definition");
                continue;
            };
            for &net in nets {
                if self.find_net(net).is_none() {
                    let name = names.name(net);
                    let name = if name.is_empty() {
                        net.to_string()
                    } else {
                        name.to_owned()
                    };
                    self.watches.push(Watch::new(name, net));
                }
            }
        }
    }

    /// Loads `watchlist.json` from a resource directory, replacing the
    /// current set. Missing file leaves the list unchanged.
    ///
    /// # Errors
    ///
    /// I/O or JSON shape errors.
    pub fn load(&mut self, dir: &Path) -> io::Result<()> {
        let path = dir.join("watchlist.json");
        if !path.exists() {
            return Ok(());
        }
        info!("loading watchlist {}", path.display());
        let doc: WatchlistDoc = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
        self.watches = doc
            .watchlist
            .into_iter()
            .map(|e| Watch::new(e.name, e.net))
            .collect();
        self.clear();
        Ok(())
    }

    /// Saves the current watch set to `watchlist.json`.
    ///
    /// # Errors
    ///
    /// I/O or serialization errors.
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        let path = dir.join("watchlist.json");
        info!("saving watchlist {}", path.display());
        let doc = WatchlistDoc {
            watchlist: self
                .watches
                .iter()
                .map(|w| WatchEntry {
                    name: w.name.clone(),
                    net: w.net,
                })
                .collect(),
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &doc)?;
        Ok(())
    }
}
