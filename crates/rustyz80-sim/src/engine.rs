//! Value propagation over the switch-level netlist.
//!
//! A MOS pass transistor conducts in both directions while its gate is
//! high, so a net's logic level is a property of its *group*: every net
//! reachable through currently-conducting channels. Driving any net means
//! finding that group, resolving the group's value from the strongest
//! source it contains, adopting the value on every member, switching the
//! transistors those members gate, and repeating with the nets disturbed
//! by those switches until nothing changes.
//!
//! The chip is full of feedback latches, so "nothing changes" needs help:
//! alongside the empty-worklist exit there is a signed accumulator over
//! the transistors switched in one iteration, which returns to zero when
//! the same set that switched on also switched off — a latched
//! equilibrium — and a hard iteration cap for pathological inputs.

use log::warn;

use rustyz80_netlist::{NetId, Netlist, TranId, MAX_NETS};

/// Hard bound on fixpoint iterations; unreachable on well-formed netlists.
pub const RECALC_ITERATION_CAP: usize = 100;

/// Fixed-capacity bitset over net ids, for O(1) membership on the hot path.
#[derive(Debug, Clone)]
struct NetBits {
    words: Vec<u64>,
}

impl NetBits {
    fn new() -> Self {
        Self {
            words: vec![0; MAX_NETS.div_ceil(64)],
        }
    }

    #[inline]
    fn contains(&self, n: NetId) -> bool {
        self.words[n as usize / 64] & (1 << (n % 64)) != 0
    }

    /// Inserts `n`; returns true when it was not present before.
    #[inline]
    fn insert(&mut self, n: NetId) -> bool {
        let word = &mut self.words[n as usize / 64];
        let mask = 1u64 << (n % 64);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    #[inline]
    fn clear(&mut self) {
        self.words.fill(0);
    }
}

/// The propagation engine. Owns every scratch buffer so repeated
/// recalculations allocate nothing.
#[derive(Debug)]
pub struct Propagator {
    list: Vec<NetId>,
    next: Vec<NetId>,
    in_next: NetBits,
    group: Vec<NetId>,
    in_group: NetBits,
    gate_scratch: Vec<TranId>,
    delta: i64,
}

impl Default for Propagator {
    fn default() -> Self {
        Self::new()
    }
}

impl Propagator {
    /// Creates an engine with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list: Vec::new(),
            next: Vec::new(),
            in_next: NetBits::new(),
            group: Vec::new(),
            in_group: NetBits::new(),
            gate_scratch: Vec::new(),
            delta: 0,
        }
    }

    /// Drives a net externally and propagates to fixpoint.
    ///
    /// This is the only way to "set" a pin: mark the drive, then recompute
    /// everything reachable from it.
    pub fn set_pull(&mut self, nl: &mut Netlist, net: NetId, high: bool) {
        nl.store_mut().set_net_pull(net, high);
        self.recalc(nl, &[net]);
    }

    /// Recalculates from every connected net; used once after reset drives
    /// are in place.
    pub fn recalc_all(&mut self, nl: &mut Netlist) {
        let seeds = nl.all_nets();
        self.recalc(nl, &seeds);
    }

    /// Runs the fixpoint loop over an initial dirty list.
    pub fn recalc(&mut self, nl: &mut Netlist, seeds: &[NetId]) {
        self.list.clear();
        self.list.extend_from_slice(seeds);

        let mut iterations = 0;
        while !self.list.is_empty() {
            if iterations == RECALC_ITERATION_CAP {
                warn!(
                    "recalculation cap of {RECALC_ITERATION_CAP} iterations hit, {} nets still dirty",
                    self.list.len()
                );
                break;
            }
            iterations += 1;

            self.delta = 0;
            self.next.clear();
            self.in_next.clear();
            for i in 0..self.list.len() {
                let n = self.list[i];
                self.recalc_net(nl, n);
            }
            core::mem::swap(&mut self.list, &mut self.next);

            // No transistor switched, or the same set switched on and off
            // again: a latched feedback loop at equilibrium.
            if self.delta == 0 {
                break;
            }
        }
        self.list.clear();
    }

    /// Recomputes the group of `n` and applies the resolved value.
    fn recalc_net(&mut self, nl: &mut Netlist, n: NetId) {
        if n == nl.gnd() || n == nl.vcc() {
            return;
        }
        self.build_group(nl, n);
        let value = self.resolve_group(nl);

        for i in 0..self.group.len() {
            let m = self.group[i];
            // The rails are absorbing members; their state never moves.
            if m == nl.gnd() || m == nl.vcc() {
                continue;
            }
            if nl.store().net_state(m) == value {
                continue;
            }
            nl.store_mut().set_net_state(m, value);

            self.gate_scratch.clear();
            self.gate_scratch.extend_from_slice(nl.store().gates_of(m));
            for j in 0..self.gate_scratch.len() {
                let t = self.gate_scratch[j];
                if value {
                    self.switch_on(nl, t);
                } else {
                    self.switch_off(nl, t);
                }
            }
        }
    }

    /// Collects every net reachable from `n` through conducting channels.
    /// The rails may join a group but are never traversed through.
    fn build_group(&mut self, nl: &Netlist, n: NetId) {
        self.group.clear();
        self.in_group.clear();
        self.in_group.insert(n);
        self.group.push(n);

        let store = nl.store();
        let mut i = 0;
        while i < self.group.len() {
            let m = self.group[i];
            i += 1;
            if m == nl.gnd() || m == nl.vcc() {
                continue;
            }
            for &t in store.channels_of(m) {
                if !store.transistor_on(t) {
                    continue;
                }
                let other = if store.c1(t) == m {
                    store.c2(t)
                } else {
                    store.c1(t)
                };
                if other != 0 && self.in_group.insert(other) {
                    self.group.push(other);
                }
            }
        }
    }

    /// Resolves the logic value of the current group.
    ///
    /// Precedence: ground, power, external drive (high wins over low),
    /// permanent pull-up, then the state of the highest-degree member with
    /// the smallest id breaking degree ties.
    fn resolve_group(&self, nl: &Netlist) -> bool {
        if self.in_group.contains(nl.gnd()) {
            return false;
        }
        if self.in_group.contains(nl.vcc()) {
            return true;
        }

        let store = nl.store();
        let mut any_high = false;
        let mut any_low = false;
        let mut any_pullup = false;
        let mut best: Option<(usize, NetId)> = None;
        let mut best_state = false;
        for &m in &self.group {
            any_high |= store.pulled_high(m);
            any_low |= store.pulled_low(m);
            any_pullup |= store.has_pullup(m);
            let degree = store.degree(m);
            let better = match best {
                None => true,
                Some((d, id)) => degree > d || (degree == d && m < id),
            };
            if better {
                best = Some((degree, m));
                best_state = store.net_state(m);
            }
        }

        if any_high {
            return true;
        }
        if any_low {
            return false;
        }
        if any_pullup {
            return true;
        }
        best_state
    }

    #[inline]
    fn switch_on(&mut self, nl: &mut Netlist, t: TranId) {
        let store = nl.store_mut();
        if store.transistor_on(t) {
            return;
        }
        store.set_transistor_on(t, true);
        // +1 so transistor id 0 still registers in the accumulator; the
        // zero-sum equilibrium property is unaffected.
        self.delta += i64::from(t) + 1;
        let c1 = store.c1(t);
        self.push_dirty(nl, c1);
    }

    #[inline]
    fn switch_off(&mut self, nl: &mut Netlist, t: TranId) {
        let store = nl.store_mut();
        if !store.transistor_on(t) {
            return;
        }
        store.set_transistor_on(t, false);
        self.delta -= i64::from(t) + 1;
        let (c1, c2) = (store.c1(t), store.c2(t));
        self.push_dirty(nl, c1);
        self.push_dirty(nl, c2);
    }

    #[inline]
    fn push_dirty(&mut self, nl: &Netlist, n: NetId) {
        if n == nl.gnd() || n == nl.vcc() {
            return;
        }
        if self.in_next.insert(n) {
            self.next.push(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyz80_netlist::{NameTable, NetlistBuilder, GND, VCC};

    /// Inverter: input net 10 gates a pull-down on net 20; 20 has a pull-up.
    fn inverter() -> Netlist {
        let mut b = NetlistBuilder::new(GND, VCC);
        b.add_transistor(0, 10, 20, GND);
        b.set_pullup(20, true);
        Netlist::new(b.build(), NameTable::new(), GND, VCC)
    }

    fn init_rails(nl: &mut Netlist) {
        nl.store_mut().set_net_state(GND, false);
        nl.store_mut().set_net_state(VCC, true);
    }

    #[test]
    fn inverter_inverts() {
        let mut nl = inverter();
        init_rails(&mut nl);
        let mut p = Propagator::new();

        p.set_pull(&mut nl, 10, true);
        assert!(nl.store().net_state(10));
        assert!(nl.store().transistor_on(0));
        assert!(!nl.store().net_state(20), "pull-down beats the pull-up");

        p.set_pull(&mut nl, 10, false);
        assert!(!nl.store().net_state(10));
        assert!(!nl.store().transistor_on(0));
        assert!(nl.store().net_state(20), "pull-up restores high");
    }

    #[test]
    fn pass_transistor_chain_propagates() {
        // 10 gates t0 (30 <-> VCC); 30 chains to 31 through t1 gated by 11.
        let mut b = NetlistBuilder::new(GND, VCC);
        b.add_transistor(0, 10, 30, VCC);
        b.add_transistor(1, 11, 30, 31);
        let mut nl = Netlist::new(b.build(), NameTable::new(), GND, VCC);
        init_rails(&mut nl);
        let mut p = Propagator::new();

        p.set_pull(&mut nl, 11, true); // close the chain switch first
        p.set_pull(&mut nl, 10, true); // connect the chain to power
        assert!(nl.store().net_state(30));
        assert!(nl.store().net_state(31), "value flows through the channel");

        p.set_pull(&mut nl, 11, false); // isolate 31; it keeps its charge
        p.set_pull(&mut nl, 10, false);
        assert!(nl.store().net_state(31), "isolated net holds its last state");
    }

    #[test]
    fn ground_beats_power_in_a_shorted_group() {
        // Both rails reachable: t0 bridges 30 to GND, t1 bridges 30 to VCC,
        // both gated by the driven net 10.
        let mut b = NetlistBuilder::new(GND, VCC);
        b.add_transistor(0, 10, 30, GND);
        b.add_transistor(1, 10, 30, VCC);
        let mut nl = Netlist::new(b.build(), NameTable::new(), GND, VCC);
        init_rails(&mut nl);
        let mut p = Propagator::new();

        p.set_pull(&mut nl, 10, true);
        assert!(!nl.store().net_state(30), "ground has priority");
        assert!(!nl.store().net_state(GND));
        assert!(nl.store().net_state(VCC), "rail state is never overwritten");
    }

    #[test]
    fn external_drive_beats_pullup() {
        let mut b = NetlistBuilder::new(GND, VCC);
        b.add_transistor(0, 10, 30, 31);
        b.set_pullup(31, true);
        let mut nl = Netlist::new(b.build(), NameTable::new(), GND, VCC);
        init_rails(&mut nl);
        let mut p = Propagator::new();

        p.set_pull(&mut nl, 10, true);
        p.set_pull(&mut nl, 30, false); // drive low through the open switch
        assert!(!nl.store().net_state(30));
        assert!(!nl.store().net_state(31), "pulled-low drive beats the pull-up");
    }

    #[test]
    fn floating_group_takes_highest_degree_state() {
        // 30 (degree 3: channel of t0, t1, gate of t2) vs 31 (degree 1).
        let mut b = NetlistBuilder::new(GND, VCC);
        b.add_transistor(0, 10, 30, 31);
        b.add_transistor(1, 11, 30, 32);
        b.add_transistor(2, 30, 33, 34);
        let mut nl = Netlist::new(b.build(), NameTable::new(), GND, VCC);
        init_rails(&mut nl);
        nl.store_mut().set_net_state(30, true);
        nl.store_mut().set_net_state(31, false);
        let mut p = Propagator::new();

        p.set_pull(&mut nl, 10, true); // join 30 and 31, neither driven
        assert!(
            nl.store().net_state(31),
            "group adopts the state of its best-connected member"
        );
    }

    #[test]
    fn cross_coupled_latch_reaches_equilibrium() {
        // Classic NMOS RS latch: two inverters feeding each other.
        //   q (30) pulled up, pulled low by t0 gated by nq (31)
        //   nq (31) pulled up, pulled low by t1 gated by q (30)
        // plus set/reset pull-downs t2 (gated by 12) on 30 and t3 (13) on 31.
        let mut b = NetlistBuilder::new(GND, VCC);
        b.add_transistor(0, 31, 30, GND);
        b.add_transistor(1, 30, 31, GND);
        b.add_transistor(2, 12, 30, GND);
        b.add_transistor(3, 13, 31, GND);
        b.set_pullup(30, true);
        b.set_pullup(31, true);
        let mut nl = Netlist::new(b.build(), NameTable::new(), GND, VCC);
        init_rails(&mut nl);
        let mut p = Propagator::new();

        // Power-on settle: q wins (lower id recalculated first), nq follows.
        p.recalc_all(&mut nl);
        assert!(nl.store().net_state(30));
        assert!(!nl.store().net_state(31));

        // Reset pulse: force q low; the latch flips and holds after release.
        p.set_pull(&mut nl, 12, true);
        p.set_pull(&mut nl, 12, false);
        assert!(!nl.store().net_state(30));
        assert!(nl.store().net_state(31));

        // Set pulse: back again.
        p.set_pull(&mut nl, 13, true);
        p.set_pull(&mut nl, 13, false);
        assert!(nl.store().net_state(30));
        assert!(!nl.store().net_state(31));
    }

    #[test]
    fn empty_dirty_list_is_a_no_op() {
        let mut nl = inverter();
        init_rails(&mut nl);
        let mut p = Propagator::new();
        p.set_pull(&mut nl, 10, true);
        let before: Vec<bool> = (0..nl.store().net_count() as NetId)
            .map(|n| nl.store().net_state(n))
            .collect();

        p.recalc(&mut nl, &[]);

        let after: Vec<bool> = (0..nl.store().net_count() as NetId)
            .map(|n| nl.store().net_state(n))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn recalc_is_deterministic() {
        for _ in 0..3 {
            let mut nl = inverter();
            init_rails(&mut nl);
            let mut p = Propagator::new();
            p.set_pull(&mut nl, 10, true);
            p.set_pull(&mut nl, 10, false);
            assert!(nl.store().net_state(20));
            assert!(!nl.store().transistor_on(0));
        }
    }
}
