//! Structure-of-Arrays storage for nets and transistors.
//!
//! The propagation engine spends nearly all of its time walking adjacency
//! lists and flipping per-net and per-transistor booleans, so the layout is
//! optimized for that: transistor terminals live in four parallel arrays,
//! per-net flags are a single byte each, and the two adjacency relations
//! (net → gated transistors, net → channel-connected transistors) are
//! flattened into shared pools indexed by per-net offsets.

use bitflags::bitflags;

use crate::{NetId, TranId, MAX_NETS};

bitflags! {
    /// Per-net state and drive flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetFlags: u8 {
        /// Current logic level is high.
        const STATE = 1 << 0;

        /// Net carries a permanent depletion-load pull-up.
        const PULLUP = 1 << 1;

        /// Net is externally driven high (input pin drive).
        const PULLED_HIGH = 1 << 2;

        /// Net is externally driven low (input pin drive).
        const PULLED_LOW = 1 << 3;
    }
}

/// A raw transistor definition as collected by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TransistorDef {
    gate: NetId,
    c1: NetId,
    c2: NetId,
}

/// Frozen netlist storage.
///
/// Built once by [`NetlistBuilder::build`]; afterwards the only mutations are
/// net state/drive flags and transistor on/off switches. Adjacency is
/// immutable for the lifetime of the store.
#[derive(Debug, Clone)]
pub struct NetlistStore {
    // Transistor arrays, parallel, indexed by TranId.
    gate: Vec<NetId>,
    c1: Vec<NetId>,
    c2: Vec<NetId>,
    on: Vec<bool>,

    // Per-net flags, indexed by NetId.
    flags: Vec<NetFlags>,

    // CSR adjacency: gates_of(n) are the transistors whose gate is n,
    // channels_of(n) those with n as either channel terminal.
    gate_pool: Vec<TranId>,
    gate_start: Vec<u32>,
    chan_pool: Vec<TranId>,
    chan_start: Vec<u32>,
}

impl NetlistStore {
    /// Number of net slots (dense; includes unconnected ids).
    #[must_use]
    pub fn net_count(&self) -> usize {
        self.flags.len()
    }

    /// Number of transistor slots.
    #[must_use]
    pub fn transistor_count(&self) -> usize {
        self.on.len()
    }

    /// Current logic level of a net.
    #[inline]
    #[must_use]
    pub fn net_state(&self, n: NetId) -> bool {
        self.flags[n as usize].contains(NetFlags::STATE)
    }

    /// Overwrites a net's logic level.
    #[inline]
    pub fn set_net_state(&mut self, n: NetId, high: bool) {
        self.flags[n as usize].set(NetFlags::STATE, high);
    }

    /// Whether the net has a permanent pull-up load.
    #[inline]
    #[must_use]
    pub fn has_pullup(&self, n: NetId) -> bool {
        self.flags[n as usize].contains(NetFlags::PULLUP)
    }

    /// Whether the net is externally driven high.
    #[inline]
    #[must_use]
    pub fn pulled_high(&self, n: NetId) -> bool {
        self.flags[n as usize].contains(NetFlags::PULLED_HIGH)
    }

    /// Whether the net is externally driven low.
    #[inline]
    #[must_use]
    pub fn pulled_low(&self, n: NetId) -> bool {
        self.flags[n as usize].contains(NetFlags::PULLED_LOW)
    }

    /// Applies an external drive to a net: high sets `PULLED_HIGH`, low sets
    /// `PULLED_LOW`; the opposite drive is cleared.
    ///
    /// This only marks the drive. The caller is responsible for running the
    /// propagation fixpoint seeded with this net afterwards.
    #[inline]
    pub fn set_net_pull(&mut self, n: NetId, high: bool) {
        let f = &mut self.flags[n as usize];
        f.set(NetFlags::PULLED_HIGH, high);
        f.set(NetFlags::PULLED_LOW, !high);
    }

    /// Removes any external drive from a net.
    #[inline]
    pub fn clear_net_pull(&mut self, n: NetId) {
        self.flags[n as usize] &= !(NetFlags::PULLED_HIGH | NetFlags::PULLED_LOW);
    }

    /// Whether a transistor currently conducts.
    #[inline]
    #[must_use]
    pub fn transistor_on(&self, t: TranId) -> bool {
        self.on[t as usize]
    }

    /// Switches a transistor.
    #[inline]
    pub fn set_transistor_on(&mut self, t: TranId, on: bool) {
        self.on[t as usize] = on;
    }

    /// Forces every transistor off. Part of chip initialization.
    pub fn all_transistors_off(&mut self) {
        self.on.fill(false);
    }

    /// Gate net of a transistor.
    #[inline]
    #[must_use]
    pub fn gate(&self, t: TranId) -> NetId {
        self.gate[t as usize]
    }

    /// First channel terminal. After load-time normalization this is never
    /// the ground or power rail for pull transistors.
    #[inline]
    #[must_use]
    pub fn c1(&self, t: TranId) -> NetId {
        self.c1[t as usize]
    }

    /// Second channel terminal; holds the rail connection when one exists.
    #[inline]
    #[must_use]
    pub fn c2(&self, t: TranId) -> NetId {
        self.c2[t as usize]
    }

    /// Transistors for which `n` is the gate.
    #[inline]
    #[must_use]
    pub fn gates_of(&self, n: NetId) -> &[TranId] {
        let n = n as usize;
        &self.gate_pool[self.gate_start[n] as usize..self.gate_start[n + 1] as usize]
    }

    /// Transistors for which `n` is a channel terminal.
    #[inline]
    #[must_use]
    pub fn channels_of(&self, n: NetId) -> &[TranId] {
        let n = n as usize;
        &self.chan_pool[self.chan_start[n] as usize..self.chan_start[n + 1] as usize]
    }

    /// Connection degree of a net: gate fanout plus channel connections.
    #[inline]
    #[must_use]
    pub fn degree(&self, n: NetId) -> usize {
        let n = n as usize;
        (self.gate_start[n + 1] - self.gate_start[n]
            + self.chan_start[n + 1] - self.chan_start[n]) as usize
    }

    /// Whether any transistor touches this net.
    #[inline]
    #[must_use]
    pub fn is_connected(&self, n: NetId) -> bool {
        self.degree(n) > 0
    }
}

/// Incrementally assembles a [`NetlistStore`].
///
/// The resource loader is the production caller; tests use it to put
/// together small synthetic circuits without resource files.
#[derive(Debug)]
pub struct NetlistBuilder {
    gnd: NetId,
    vcc: NetId,
    defs: Vec<Option<TransistorDef>>,
    pullups: Vec<bool>,
}

impl NetlistBuilder {
    /// Creates a builder normalizing against the given rail nets.
    #[must_use]
    pub fn new(gnd: NetId, vcc: NetId) -> Self {
        Self {
            gnd,
            vcc,
            defs: Vec::new(),
            pullups: vec![false; MAX_NETS],
        }
    }

    /// Registers transistor `id` with the given terminals.
    ///
    /// If `c1` connects to a rail the terminals are swapped so that the rail
    /// always sits in `c2`. Re-registering an id replaces the previous
    /// definition.
    pub fn add_transistor(&mut self, id: TranId, gate: NetId, mut c1: NetId, mut c2: NetId) {
        if c1 == self.gnd || c1 == self.vcc {
            core::mem::swap(&mut c1, &mut c2);
        }
        let idx = id as usize;
        if idx >= self.defs.len() {
            self.defs.resize(idx + 1, None);
        }
        self.defs[idx] = Some(TransistorDef { gate, c1, c2 });
    }

    /// Marks or clears a permanent pull-up on a net. Segment files list a
    /// net once per segment; the last mark wins.
    pub fn set_pullup(&mut self, n: NetId, pullup: bool) {
        self.pullups[n as usize] = pullup;
    }

    /// Freezes the builder into a store.
    ///
    /// Unregistered transistor slots below the highest id become inert
    /// entries (all terminals on the null net, off, absent from adjacency).
    #[must_use]
    pub fn build(self) -> NetlistStore {
        let tcount = self.defs.len();
        let mut gate = vec![0 as NetId; tcount];
        let mut c1 = vec![0 as NetId; tcount];
        let mut c2 = vec![0 as NetId; tcount];

        // Adjacency counts first, then prefix sums, then a fill pass.
        let mut gate_start = vec![0u32; MAX_NETS + 1];
        let mut chan_start = vec![0u32; MAX_NETS + 1];
        for def in self.defs.iter().flatten() {
            gate_start[def.gate as usize + 1] += 1;
            chan_start[def.c1 as usize + 1] += 1;
            chan_start[def.c2 as usize + 1] += 1;
        }
        for n in 0..MAX_NETS {
            gate_start[n + 1] += gate_start[n];
            chan_start[n + 1] += chan_start[n];
        }

        let mut gate_pool = vec![0 as TranId; gate_start[MAX_NETS] as usize];
        let mut chan_pool = vec![0 as TranId; chan_start[MAX_NETS] as usize];
        let mut gate_fill = gate_start.clone();
        let mut chan_fill = chan_start.clone();
        for (id, def) in self.defs.iter().enumerate() {
            let Some(def) = def else { continue };
            let id = id as TranId;
            gate[id as usize] = def.gate;
            c1[id as usize] = def.c1;
            c2[id as usize] = def.c2;

            gate_pool[gate_fill[def.gate as usize] as usize] = id;
            gate_fill[def.gate as usize] += 1;
            chan_pool[chan_fill[def.c1 as usize] as usize] = id;
            chan_fill[def.c1 as usize] += 1;
            chan_pool[chan_fill[def.c2 as usize] as usize] = id;
            chan_fill[def.c2 as usize] += 1;
        }

        let mut flags = vec![NetFlags::empty(); MAX_NETS];
        for (n, &up) in self.pullups.iter().enumerate() {
            if up {
                flags[n] |= NetFlags::PULLUP;
            }
        }

        NetlistStore {
            gate,
            c1,
            c2,
            on: vec![false; tcount],
            flags,
            gate_pool,
            gate_start,
            chan_pool,
            chan_start,
        }
    }
}
