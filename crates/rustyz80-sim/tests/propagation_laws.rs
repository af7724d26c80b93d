//! Property tests for the propagation engine on randomly wired circuits.
//!
//! Random pass-transistor networks exercise the group/resolve machinery far
//! outside the shapes hand-written tests cover; the laws below must hold on
//! every one of them.

use proptest::prelude::*;

use rustyz80_sim::{
    NameTable, NetId, Netlist, NetlistBuilder, Propagator, GND, VCC,
};

/// Highest net id used by generated circuits (small, so groups collide).
const NET_SPAN: NetId = 40;

#[derive(Debug, Clone)]
struct RandomTransistor {
    gate: NetId,
    c1: NetId,
    c2: NetId,
}

fn transistor() -> impl Strategy<Value = RandomTransistor> {
    // Gates on plain nets; channels may hit the rails.
    (3..NET_SPAN, 1..NET_SPAN, 1..NET_SPAN)
        .prop_map(|(gate, c1, c2)| RandomTransistor { gate, c1, c2 })
}

fn circuit() -> impl Strategy<Value = (Vec<RandomTransistor>, Vec<NetId>, Vec<(NetId, bool)>)> {
    (
        prop::collection::vec(transistor(), 1..40),
        prop::collection::vec(3..NET_SPAN, 0..8),
        prop::collection::vec((3..NET_SPAN, any::<bool>()), 1..12),
    )
}

fn build(defs: &[RandomTransistor], pullups: &[NetId]) -> Netlist {
    let mut b = NetlistBuilder::new(GND, VCC);
    for (i, d) in defs.iter().enumerate() {
        b.add_transistor(i as u16, d.gate, d.c1, d.c2);
    }
    for &n in pullups {
        b.set_pullup(n, true);
    }
    let mut nl = Netlist::new(b.build(), NameTable::new(), GND, VCC);
    nl.store_mut().set_net_state(GND, false);
    nl.store_mut().set_net_state(VCC, true);
    nl
}

fn states(nl: &Netlist) -> Vec<bool> {
    (0..NET_SPAN).map(|n| nl.store().net_state(n)).collect()
}

fn switches(nl: &Netlist) -> Vec<bool> {
    (0..nl.store().transistor_count() as u16)
        .map(|t| nl.store().transistor_on(t))
        .collect()
}

proptest! {
    /// An empty dirty list never changes anything.
    #[test]
    fn empty_recalc_is_a_no_op((defs, pullups, drives) in circuit()) {
        let mut nl = build(&defs, &pullups);
        let mut p = Propagator::new();
        p.recalc_all(&mut nl);
        for (net, high) in drives {
            p.set_pull(&mut nl, net, high);
        }

        let net_snapshot = states(&nl);
        let switch_snapshot = switches(&nl);
        p.recalc(&mut nl, &[]);
        prop_assert_eq!(states(&nl), net_snapshot);
        prop_assert_eq!(switches(&nl), switch_snapshot);
    }

    /// The same circuit driven the same way settles to the same state.
    #[test]
    fn propagation_is_deterministic((defs, pullups, drives) in circuit()) {
        let run = || {
            let mut nl = build(&defs, &pullups);
            let mut p = Propagator::new();
            p.recalc_all(&mut nl);
            for &(net, high) in &drives {
                p.set_pull(&mut nl, net, high);
            }
            (states(&nl), switches(&nl))
        };
        prop_assert_eq!(run(), run());
    }

    /// The rails hold their levels through any drive sequence, even when a
    /// conducting path shorts them together.
    #[test]
    fn rails_are_immutable((defs, pullups, drives) in circuit()) {
        let mut nl = build(&defs, &pullups);
        let mut p = Propagator::new();
        p.recalc_all(&mut nl);
        for (net, high) in drives {
            p.set_pull(&mut nl, net, high);
            prop_assert!(!nl.store().net_state(GND));
            prop_assert!(nl.store().net_state(VCC));
        }
    }

    /// Every recalculation terminates (the worklist drains, the equilibrium
    /// accumulator fires, or the iteration cap trips) and leaves a state
    /// that a full re-settle of an identical circuit also reaches from the
    /// same drives. This pins the fixpoint down as input-determined, not
    /// history-determined, for drive-then-settle sequences.
    #[test]
    fn settled_state_depends_on_drives_not_history(
        (defs, pullups, drives) in circuit(),
        reorder in any::<bool>(),
    ) {
        // Apply the final drive per net in two different historical orders.
        let mut final_drives: Vec<(NetId, bool)> = Vec::new();
        for &(net, high) in &drives {
            if let Some(slot) = final_drives.iter_mut().find(|(n, _)| *n == net) {
                slot.1 = high;
            } else {
                final_drives.push((net, high));
            }
        }

        let settle = |order: &[(NetId, bool)]| {
            let mut nl = build(&defs, &pullups);
            let mut p = Propagator::new();
            p.recalc_all(&mut nl);
            for &(net, high) in order {
                nl.store_mut().set_net_pull(net, high);
            }
            p.recalc_all(&mut nl);
            states(&nl)
        };

        let mut reordered = final_drives.clone();
        if reorder {
            reordered.reverse();
        }
        prop_assert_eq!(settle(&final_drives), settle(&reordered));
    }
}
