//! Name tables: signal name ↔ net id, bus groupings, override tracking.
//!
//! Lookup is needed in both directions on hot paths, so the table keeps a
//! dense array (net → name) next to a hash map (name → net). Buses are a
//! purely symbolic grouping; a bus name never resolves to a net id.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{self, Write};

use log::warn;
use thiserror::Error;

use crate::{NetId, MAX_NETS};

/// A name-table operation, as broadcast to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOp {
    /// A previously anonymous net was named.
    Set,
    /// A named net was given a different name.
    Rename,
    /// A net's name was removed.
    Delete,
}

/// Precondition violation in a name operation. The table is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameOpError {
    /// The requested name already maps to a net.
    #[error("name `{0}` is already in use")]
    NameInUse(String),
    /// `set` on a net that already has a name.
    #[error("net {0} already has a name")]
    AlreadyNamed(NetId),
    /// `rename` or `delete` on a net without a name.
    #[error("net {0} has no name")]
    Unnamed(NetId),
}

/// Bidirectional name tables plus bus definitions.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: Vec<String>,
    ids: HashMap<String, NetId>,
    buses: HashMap<String, Vec<NetId>>,
    overridden: Vec<bool>,
}

impl NameTable {
    /// Creates empty tables sized for the full net range.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: vec![String::new(); MAX_NETS],
            ids: HashMap::new(),
            buses: HashMap::new(),
            overridden: vec![false; MAX_NETS],
        }
    }

    /// Resolves a name to its net id. Bus names do not resolve.
    #[inline]
    #[must_use]
    pub fn net(&self, name: &str) -> Option<NetId> {
        self.ids.get(name).copied()
    }

    /// The name of a net, or the empty string for anonymous nets.
    #[inline]
    #[must_use]
    pub fn name(&self, n: NetId) -> &str {
        &self.names[n as usize]
    }

    /// The member nets of a bus, LSB first.
    #[must_use]
    pub fn bus(&self, name: &str) -> Option<&[NetId]> {
        self.buses.get(name).map(Vec::as_slice)
    }

    /// Whether the net's name came from the override file or a name op.
    #[must_use]
    pub fn is_overridden(&self, n: NetId) -> bool {
        self.overridden[n as usize]
    }

    /// Every net name followed by every bus name.
    #[must_use]
    pub fn all_names(&self) -> Vec<String> {
        let mut all: Vec<String> = self.ids.keys().cloned().collect();
        all.extend(self.buses.keys().cloned());
        all
    }

    /// Installs a base-file mapping (`nodenames.js` semantics).
    ///
    /// A net keeps the last name the file assigns it; a name keeps the first
    /// net it was mapped to. Both collisions are logged.
    pub(crate) fn insert_base(&mut self, name: &str, n: NetId) {
        let slot = &mut self.names[n as usize];
        if !slot.is_empty() {
            warn!("duplicate name {name} for net {n}, was {slot}");
        }
        *slot = name.to_owned();

        if let Some(&prev) = self.ids.get(name) {
            warn!("duplicate mapping of net {n} to {name}, was {prev}");
        } else {
            self.ids.insert(name.to_owned(), n);
        }
    }

    /// Installs an override-file mapping: replaces any base name and marks
    /// the net as overridden.
    pub(crate) fn insert_override(&mut self, name: &str, n: NetId) {
        self.names[n as usize] = name.to_owned();
        self.ids.insert(name.to_owned(), n);
        self.overridden[n as usize] = true;
    }

    /// Defines a bus.
    pub fn add_bus(&mut self, name: &str, nets: Vec<NetId>) {
        self.buses.insert(name.to_owned(), nets);
    }

    /// Names a previously anonymous net.
    ///
    /// # Errors
    ///
    /// [`NameOpError::NameInUse`] if the name is taken,
    /// [`NameOpError::AlreadyNamed`] if the net already has a name.
    pub fn set(&mut self, name: &str, n: NetId) -> Result<(), NameOpError> {
        if self.ids.contains_key(name) {
            return Err(NameOpError::NameInUse(name.to_owned()));
        }
        if !self.names[n as usize].is_empty() {
            return Err(NameOpError::AlreadyNamed(n));
        }
        self.insert_override(name, n);
        Ok(())
    }

    /// Replaces the name of a named net.
    ///
    /// # Errors
    ///
    /// [`NameOpError::NameInUse`] if the new name is taken,
    /// [`NameOpError::Unnamed`] if the net has no name yet.
    pub fn rename(&mut self, new_name: &str, n: NetId) -> Result<(), NameOpError> {
        if self.ids.contains_key(new_name) {
            return Err(NameOpError::NameInUse(new_name.to_owned()));
        }
        if self.names[n as usize].is_empty() {
            return Err(NameOpError::Unnamed(n));
        }
        let old = core::mem::take(&mut self.names[n as usize]);
        self.ids.remove(&old);
        self.insert_override(new_name, n);
        Ok(())
    }

    /// Removes the name of a net and clears its override flag.
    ///
    /// # Errors
    ///
    /// [`NameOpError::Unnamed`] if the net has no name.
    pub fn delete(&mut self, n: NetId) -> Result<(), NameOpError> {
        if self.names[n as usize].is_empty() {
            return Err(NameOpError::Unnamed(n));
        }
        let old = core::mem::take(&mut self.names[n as usize]);
        self.ids.remove(&old);
        self.overridden[n as usize] = false;
        Ok(())
    }

    /// Writes the override file: every overridden net name in natural
    /// (numeric-aware) order, then every bus alphabetically.
    ///
    /// # Errors
    ///
    /// Propagates writer errors.
    pub fn save_overrides<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(
            out,
            "// This file contains custom net names, overrides of the names defined in nodenames.js"
        )?;
        writeln!(
            out,
            "// and definitions of buses (collections of nets). Modify by hand only when the app is not running."
        )?;
        writeln!(out, "var nodenames_override = {{")?;

        let mut names: Vec<&str> = (0..MAX_NETS)
            .filter(|&n| self.overridden[n])
            .map(|n| self.names[n].as_str())
            .collect();
        names.sort_by(|a, b| natural_cmp(a, b));
        for name in names {
            writeln!(out, "{name}: {},", self.ids[name])?;
        }

        writeln!(out, "// Buses:")?;
        let mut buses: Vec<&String> = self.buses.keys().collect();
        buses.sort();
        for name in buses {
            let nets: Vec<String> = self.buses[name].iter().map(ToString::to_string).collect();
            writeln!(out, "{name}: [{}],", nets.join(","))?;
        }
        writeln!(out, "}}")
    }
}

/// Numeric-aware string ordering: digit runs compare as numbers, so `a9`
/// sorts before `a10`.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let si = i;
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            let sj = j;
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let da = strip_zeros(&a[si..i]);
            let db = strip_zeros(&b[sj..j]);
            let ord = da.len().cmp(&db.len()).then_with(|| da.cmp(db));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn strip_zeros(digits: &[u8]) -> &[u8] {
    let nz = digits.iter().position(|&d| d != b'0').unwrap_or(digits.len() - 1);
    &digits[nz..]
}
