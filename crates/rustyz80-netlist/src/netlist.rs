//! The combined netlist: store plus name tables.
//!
//! Several simulator contracts (register extraction, bus expansion in the
//! watch recorder) are expressed in terms of names, so the name tables live
//! next to the store rather than in an observation layer.

use thiserror::Error;

use crate::{NameTable, NetId, NetlistStore, PinState};

/// Failed read through the name tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The name resolves to neither a net nor a bus.
    #[error("unknown net or bus name `{0}`")]
    UnknownName(String),
}

/// A complete netlist: transistor/net storage, name tables, and the
/// resolved power-rail ids.
#[derive(Debug, Clone)]
pub struct Netlist {
    store: NetlistStore,
    names: NameTable,
    gnd: NetId,
    vcc: NetId,
}

impl Netlist {
    /// Assembles a netlist from parts. The resource loader is the usual
    /// entry point; tests build stores directly.
    #[must_use]
    pub fn new(store: NetlistStore, names: NameTable, gnd: NetId, vcc: NetId) -> Self {
        Self {
            store,
            names,
            gnd,
            vcc,
        }
    }

    /// The ground rail net.
    #[inline]
    #[must_use]
    pub fn gnd(&self) -> NetId {
        self.gnd
    }

    /// The power rail net.
    #[inline]
    #[must_use]
    pub fn vcc(&self) -> NetId {
        self.vcc
    }

    /// Read access to the store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &NetlistStore {
        &self.store
    }

    /// Mutable access to the store (net states, transistor switches).
    #[inline]
    pub fn store_mut(&mut self) -> &mut NetlistStore {
        &mut self.store
    }

    /// Read access to the name tables.
    #[inline]
    #[must_use]
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Mutable access to the name tables (name-op channel only).
    #[inline]
    pub fn names_mut(&mut self) -> &mut NameTable {
        &mut self.names
    }

    /// Resolves a signal name to its net.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when the name is not in the tables.
    pub fn net(&self, name: &str) -> Result<NetId, ReadError> {
        self.names
            .net(name)
            .ok_or_else(|| ReadError::UnknownName(name.to_owned()))
    }

    /// Logic level of a named net.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when the name is not in the tables.
    #[inline]
    pub fn read_bit(&self, name: &str) -> Result<bool, ReadError> {
        Ok(self.store.net_state(self.net(name)?))
    }

    /// Pin-style sample of a named net.
    ///
    /// Floating state is not tracked; an unresolved net reads as whatever
    /// level its state bit last held.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when the name is not in the tables.
    pub fn read_pin(&self, name: &str) -> Result<PinState, ReadError> {
        Ok(PinState::from_bit(self.read_bit(name)?))
    }

    /// Reads eight nets `prefix0..prefix7` as a byte, net 0 being the LSB.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when any member net is missing.
    pub fn read_byte(&self, prefix: &str) -> Result<u8, ReadError> {
        let mut value = 0u8;
        for bit in (0..8).rev() {
            value <<= 1;
            value |= u8::from(self.read_bit(&format!("{prefix}{bit}"))?);
        }
        Ok(value)
    }

    /// Reads the sixteen `ab0..ab15` nets as the address-bus value.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when any address net is missing.
    pub fn read_address_bus(&self) -> Result<u16, ReadError> {
        let mut value = 0u16;
        for bit in (0..16).rev() {
            value <<= 1;
            value |= u16::from(self.read_bit(&format!("ab{bit}"))?);
        }
        Ok(value)
    }

    /// Every connected net except the power rails; the seed list for a
    /// whole-chip recalculation.
    #[must_use]
    pub fn all_nets(&self) -> Vec<NetId> {
        (0..self.store.net_count() as NetId)
            .filter(|&n| n != self.gnd && n != self.vcc && self.store.is_connected(n))
            .collect()
    }
}
