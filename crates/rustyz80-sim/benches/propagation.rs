//! Performance Benchmarks for the Switch-Level Simulator
//!
//! This benchmark suite measures the performance of the two hot paths:
//! - the propagation engine on a synthetic inverter chain
//! - the half-cycle driver on the real chip (when resources are present)

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::path::PathBuf;
use std::time::Duration;

use rustyz80_sim::{NameTable, NetId, Netlist, NetlistBuilder, Propagator, Simulation, GND, VCC};

/// Get the workspace root directory.
fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Load the real chip if the resources are checked out.
fn load_chip() -> Option<Simulation> {
    let dir = workspace_root().join("resource");
    dir.join("nodenames.js")
        .exists()
        .then(|| Simulation::from_resources(&dir).expect("chip resources load"))
}

/// Build an N-stage NMOS inverter chain: driving the input ripples a state
/// flip through every stage.
fn inverter_chain(stages: u16) -> Netlist {
    let first: NetId = 10;
    let mut b = NetlistBuilder::new(GND, VCC);
    for i in 0..stages {
        b.add_transistor(i, first + i, first + i + 1, GND);
        b.set_pullup(first + i + 1, true);
    }
    let mut nl = Netlist::new(b.build(), NameTable::new(), GND, VCC);
    nl.store_mut().set_net_state(GND, false);
    nl.store_mut().set_net_state(VCC, true);
    nl
}

/// Benchmark the propagation engine on the synthetic chain.
fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    for stages in [16u16, 256] {
        let mut nl = inverter_chain(stages);
        let mut p = Propagator::new();
        p.recalc_all(&mut nl);
        let mut level = false;

        group.bench_function(format!("chain_{stages}_toggle"), |b| {
            b.iter(|| {
                level = !level;
                p.set_pull(&mut nl, black_box(10), level);
                black_box(nl.store().net_state(10 + stages));
            });
        });
    }

    group.finish();
}

/// Benchmark whole half-cycles against the real netlist.
fn bench_half_cycles(c: &mut Criterion) {
    let Some(mut sim) = load_chip() else { return };
    sim.reset_sequence().expect("reset");

    let mut group = c.benchmark_group("chip");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("half_cycle", |b| {
        b.iter(|| {
            black_box(sim.half_cycle().expect("half-cycle"));
        });
    });

    group.bench_function("reset_sequence", |b| {
        b.iter(|| {
            black_box(sim.reset_sequence().expect("reset"));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_propagation, bench_half_cycles);
criterion_main!(benches);
