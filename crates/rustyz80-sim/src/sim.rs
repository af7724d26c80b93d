//! The half-cycle driver: clock stepping, bus-protocol dispatch, watch
//! sampling, and chip state snapshots.

use std::path::Path;

use rustyz80_netlist::{LoadError, Netlist, PinState, ReadError};

use crate::engine::Propagator;
use crate::state::Z80State;
use crate::trickbox::Trickbox;
use crate::watch::WatchList;

/// The externally drivable control pins, in trickbox index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPin {
    /// Maskable interrupt request (`_int`).
    Int = 0,
    /// Non-maskable interrupt (`_nmi`).
    Nmi = 1,
    /// Bus request (`_busrq`).
    Busrq = 2,
    /// Wait-state request (`_wait`).
    Wait = 3,
    /// Chip reset (`_reset`).
    Reset = 4,
}

impl ControlPin {
    /// All control pins in index order.
    pub const ALL: [Self; 5] = [Self::Int, Self::Nmi, Self::Busrq, Self::Wait, Self::Reset];

    /// The active-low net this pin drives.
    #[must_use]
    pub fn net_name(self) -> &'static str {
        match self {
            Self::Int => "_int",
            Self::Nmi => "_nmi",
            Self::Busrq => "_busrq",
            Self::Wait => "_wait",
            Self::Reset => "_reset",
        }
    }
}

/// What one half-cycle produced beyond netlist mutation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfCycleOutcome {
    /// Console character emitted by an echo-port write.
    pub echo: Option<char>,
    /// The trickbox cut-off fired; the current run should stop.
    pub stop_requested: bool,
}

/// The switch-level simulation: netlist, propagation engine, trickbox, and
/// watch recorder, advanced one clock edge at a time.
pub struct Simulation {
    netlist: Netlist,
    prop: Propagator,
    trickbox: Trickbox,
    watches: WatchList,
    hcycle: u64,
}

impl Simulation {
    /// Wraps a loaded netlist, initializing the rails and switching every
    /// transistor off.
    #[must_use]
    pub fn new(netlist: Netlist) -> Self {
        let mut sim = Self {
            netlist,
            prop: Propagator::new(),
            trickbox: Trickbox::new(),
            watches: WatchList::new(),
            hcycle: 0,
        };
        sim.init();
        sim
    }

    /// Loads the netlist resources from a directory and wraps them. A
    /// `watchlist.json` in the same directory is picked up when present.
    ///
    /// # Errors
    ///
    /// Any [`LoadError`]; a broken watchlist only logs a warning.
    pub fn from_resources(dir: &Path) -> Result<Self, LoadError> {
        let mut sim = Self::new(Netlist::load(dir)?);
        if let Err(e) = sim.watches.load(dir) {
            log::warn!("unable to load watchlist: {e}");
        }
        Ok(sim)
    }

    /// One-time chip initialization: rails to their fixed levels, all
    /// transistors off.
    pub fn init(&mut self) {
        let (gnd, vcc) = (self.netlist.gnd(), self.netlist.vcc());
        let store = self.netlist.store_mut();
        store.set_net_state(gnd, false);
        store.set_net_state(vcc, true);
        store.all_transistors_off();
    }

    /// The netlist under simulation.
    #[must_use]
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Mutable netlist access (name ops, loaders).
    pub fn netlist_mut(&mut self) -> &mut Netlist {
        &mut self.netlist
    }

    /// The simulated environment.
    #[must_use]
    pub fn trickbox(&self) -> &Trickbox {
        &self.trickbox
    }

    /// Mutable trickbox access (program loading, pin schedules).
    pub fn trickbox_mut(&mut self) -> &mut Trickbox {
        &mut self.trickbox
    }

    /// The watch recorder.
    #[must_use]
    pub fn watches(&self) -> &WatchList {
        &self.watches
    }

    /// Mutable watch access.
    pub fn watches_mut(&mut self) -> &mut WatchList {
        &mut self.watches
    }

    /// Replaces the watch set, expanding watched buses to their member
    /// nets through this netlist's name tables.
    pub fn set_watchlist(&mut self, list: &[String]) {
        self.watches.set_watchlist(list, self.netlist.names());
    }

    /// Half-cycles elapsed since the last reset.
    #[must_use]
    pub fn hcycle(&self) -> u64 {
        self.hcycle
    }

    /// Drives a named input net to a level and propagates.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when the net does not exist.
    pub fn drive(&mut self, name: &str, high: bool) -> Result<(), ReadError> {
        let net = self.netlist.net(name)?;
        self.prop.set_pull(&mut self.netlist, net, high);
        Ok(())
    }

    /// Drives one of the external control pins.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when the pin's net does not exist.
    pub fn set_pin(&mut self, pin: ControlPin, high: bool) -> Result<(), ReadError> {
        self.drive(pin.net_name(), high)
    }

    /// Advances the simulation by one half-cycle of the clock.
    ///
    /// Before a rising edge the bus-protocol pins are inspected and any
    /// memory/I/O transaction is serviced; the clock is then toggled and
    /// propagated, watches are sampled, the trickbox schedule ticks, and
    /// the half-cycle counter advances.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when a protocol net is missing.
    pub fn half_cycle(&mut self) -> Result<HalfCycleOutcome, ReadError> {
        let next_clk = !self.netlist.read_bit("clk")?;
        let mut outcome = HalfCycleOutcome::default();

        if next_clk {
            outcome.echo = self.service_bus_protocol()?;
        }

        self.drive("clk", next_clk)?;
        self.watches.sample_all(&self.netlist, self.hcycle);

        let actions = self.trickbox.tick(self.hcycle);
        outcome.stop_requested = actions.stop;
        for (pin, action) in ControlPin::ALL.iter().zip(actions.pins) {
            if let Some(level) = action {
                self.set_pin(*pin, level)?;
            }
        }

        self.hcycle += 1;
        Ok(outcome)
    }

    /// Inspects the control pins ahead of a rising edge and services the
    /// matching bus transaction. Unmatched pin combinations are a no-op.
    fn service_bus_protocol(&mut self) -> Result<Option<char>, ReadError> {
        let m1 = self.netlist.read_bit("_m1")?;
        let rfsh = self.netlist.read_bit("_rfsh")?;
        let mreq = self.netlist.read_bit("_mreq")?;
        let rd = self.netlist.read_bit("_rd")?;
        let wr = self.netlist.read_bit("_wr")?;
        let iorq = self.netlist.read_bit("_iorq")?;
        let t2 = self.netlist.read_bit("t2")?;
        let t3 = self.netlist.read_bit("t3")?;

        if !m1 && rfsh && !mreq && !rd && wr && iorq && t2 {
            // Opcode fetch
            let ab = self.netlist.read_address_bus()?;
            let db = self.trickbox.read_mem(ab);
            self.write_data_bus(db)?;
        } else if m1 && rfsh && !mreq && !rd && wr && iorq && t3 {
            // Operand read
            let ab = self.netlist.read_address_bus()?;
            let db = self.trickbox.read_mem(ab);
            self.write_data_bus(db)?;
        } else if m1 && rfsh && !mreq && rd && !wr && iorq && t3 {
            // Memory write
            let ab = self.netlist.read_address_bus()?;
            let db = self.netlist.read_byte("db")?;
            self.trickbox.write_mem(ab, db);
        } else if m1 && rfsh && mreq && !rd && wr && !iorq && t3 {
            // I/O read
            let ab = self.netlist.read_address_bus()?;
            let db = self.trickbox.read_io(ab);
            self.write_data_bus(db)?;
        } else if m1 && rfsh && mreq && rd && !wr && !iorq && t3 {
            // I/O write
            let ab = self.netlist.read_address_bus()?;
            let db = self.netlist.read_byte("db")?;
            return Ok(self.trickbox.write_io(ab, db));
        } else if !m1 && rfsh && mreq && rd && wr && !iorq {
            // Interrupt acknowledge: serviced as an I/O read
            let ab = self.netlist.read_address_bus()?;
            let db = self.trickbox.read_io(ab);
            self.write_data_bus(db)?;
        }
        Ok(None)
    }

    /// Drives the eight data-bus pins with a byte.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when a `db` net is missing.
    pub fn write_data_bus(&mut self, mut db: u8) -> Result<(), ReadError> {
        for bit in 0..8 {
            self.drive(&format!("db{bit}"), db & 1 != 0)?;
            db >>= 1;
        }
        Ok(())
    }

    /// Runs the chip reset sequence and returns the half-cycles consumed.
    ///
    /// The rails and transistors are re-initialized, `_reset` is held low
    /// with the other control inputs at their inactive high levels, the
    /// whole chip is recalculated, eight half-cycles propagate the reset,
    /// and `_reset` is released.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when a control net is missing.
    pub fn reset_sequence(&mut self) -> Result<u64, ReadError> {
        self.init();

        self.drive("_reset", false)?;
        self.drive("clk", true)?;
        self.drive("_busrq", true)?;
        self.drive("_int", true)?;
        self.drive("_nmi", true)?;
        self.drive("_wait", true)?;
        self.prop.recalc_all(&mut self.netlist);

        self.hcycle = 0;
        for _ in 0..8 {
            self.half_cycle()?;
        }
        self.drive("_reset", true)?;
        Ok(self.hcycle)
    }

    /// Assembles the observable chip state from the `reg_*` groups and the
    /// pin nets.
    ///
    /// # Errors
    ///
    /// [`ReadError::UnknownName`] when a register or pin net is missing
    /// from the name tables.
    pub fn read_state(&self) -> Result<Z80State, ReadError> {
        let nl = &self.netlist;
        let pair = |hi: &str, lo: &str| -> Result<u16, ReadError> {
            Ok(u16::from(nl.read_byte(hi)?) << 8 | u16::from(nl.read_byte(lo)?))
        };

        let mut db_pins = [PinState::Invalid; 8];
        for (bit, slot) in db_pins.iter_mut().enumerate() {
            *slot = nl.read_pin(&format!("db{bit}"))?;
        }
        let mut m = [PinState::Invalid; 6];
        let mut t = [PinState::Invalid; 6];
        for (i, slot) in m.iter_mut().enumerate() {
            *slot = nl.read_pin(&format!("m{}", i + 1))?;
        }
        for (i, slot) in t.iter_mut().enumerate() {
            *slot = nl.read_pin(&format!("t{}", i + 1))?;
        }

        Ok(Z80State {
            af: pair("reg_a", "reg_f")?,
            bc: pair("reg_b", "reg_c")?,
            de: pair("reg_d", "reg_e")?,
            hl: pair("reg_h", "reg_l")?,
            af2: pair("reg_aa", "reg_ff")?,
            bc2: pair("reg_bb", "reg_cc")?,
            de2: pair("reg_dd", "reg_ee")?,
            hl2: pair("reg_hh", "reg_ll")?,
            ix: pair("reg_ixh", "reg_ixl")?,
            iy: pair("reg_iyh", "reg_iyl")?,
            sp: pair("reg_sph", "reg_spl")?,
            ir: pair("reg_i", "reg_r")?,
            wz: pair("reg_w", "reg_z")?,
            pc: pair("reg_pch", "reg_pcl")?,
            ab: nl.read_address_bus()?,
            db: nl.read_byte("db")?,
            db_pins,
            clk: nl.read_pin("clk")?,
            int: nl.read_pin("_int")?,
            nmi: nl.read_pin("_nmi")?,
            halt: nl.read_pin("_halt")?,
            mreq: nl.read_pin("_mreq")?,
            iorq: nl.read_pin("_iorq")?,
            rd: nl.read_pin("_rd")?,
            wr: nl.read_pin("_wr")?,
            busak: nl.read_pin("_busak")?,
            wait: nl.read_pin("_wait")?,
            busrq: nl.read_pin("_busrq")?,
            reset: nl.read_pin("_reset")?,
            m1: nl.read_pin("_m1")?,
            rfsh: nl.read_pin("_rfsh")?,
            m,
            t,
            instr: nl.read_byte("_instr")?,
        })
    }
}
