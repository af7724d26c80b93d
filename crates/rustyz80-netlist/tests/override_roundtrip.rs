//! Override-file round trip: names edited through the name-op channel and
//! saved on shutdown must reload bit-equal.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use rustyz80_netlist::Netlist;

fn write_base_resources(dir: &Path) {
    fs::write(
        dir.join("nodenames.js"),
        "var nodenames = {\nvss: 1,\nvcc: 2,\nclk: 10,\nab0: 20,\nab1: 21,\nab2: 22,\n}\n",
    )
    .unwrap();
    fs::write(
        dir.join("transdefs.js"),
        "var transdefs = [\n['t1',10,1,20,0,0,0,0,0,0,0,0,0,0],\n]\n",
    )
    .unwrap();
    fs::write(dir.join("segdefs.js"), "var segdefs = [\n[20,'+',1,0,0],\n]\n").unwrap();
}

#[test]
fn saved_overrides_reload_identically() {
    let dir = TempDir::new().unwrap();
    write_base_resources(dir.path());

    let mut nl = Netlist::load(dir.path()).unwrap();

    // Edits a user would make: new names (numeric suffixes to exercise the
    // natural sort), a rename, and a bus.
    nl.names_mut().set("sig2", 100).unwrap();
    nl.names_mut().set("sig10", 101).unwrap();
    nl.names_mut().set("sig1", 102).unwrap();
    nl.names_mut().rename("clk_root", 10).unwrap();
    nl.names_mut().add_bus("ab", vec![20, 21, 22]);
    nl.names_mut().add_bus("aa", vec![21, 20]);

    let mut saved = Vec::new();
    nl.names_mut().save_overrides(&mut saved).unwrap();
    fs::write(dir.path().join("netnames.js"), &saved).unwrap();

    // Natural order: sig1, sig2, sig10; buses alphabetical afterwards.
    let text = String::from_utf8(saved).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        &lines[3..],
        &[
            "clk_root: 10,",
            "sig1: 102,",
            "sig2: 100,",
            "sig10: 101,",
            "// Buses:",
            "aa: [21,20],",
            "ab: [20,21,22],",
            "}",
        ]
    );

    let reloaded = Netlist::load(dir.path()).unwrap();
    assert_eq!(reloaded.net("sig1").unwrap(), 102);
    assert_eq!(reloaded.net("sig2").unwrap(), 100);
    assert_eq!(reloaded.net("sig10").unwrap(), 101);
    assert_eq!(reloaded.net("clk_root").unwrap(), 10);
    assert_eq!(reloaded.names().bus("ab").unwrap(), &[20, 21, 22]);
    assert_eq!(reloaded.names().bus("aa").unwrap(), &[21, 20]);
    for net in [100, 101, 102, 10] {
        assert!(reloaded.names().is_overridden(net));
    }

    // Saving the reloaded tables reproduces the same file.
    let mut resaved = Vec::new();
    reloaded.names().save_overrides(&mut resaved).unwrap();
    assert_eq!(
        String::from_utf8(resaved).unwrap(),
        fs::read_to_string(dir.path().join("netnames.js")).unwrap()
    );
}

#[test]
fn base_name_survives_alongside_override_alias() {
    let dir = TempDir::new().unwrap();
    write_base_resources(dir.path());
    fs::write(
        dir.path().join("netnames.js"),
        "var nodenames_override = {\nclk_main: 10,\n}\n",
    )
    .unwrap();

    let nl = Netlist::load(dir.path()).unwrap();
    // The override replaces the dense-array name and owns the net.
    assert_eq!(nl.names().name(10), "clk_main");
    assert!(nl.names().is_overridden(10));
    // The base mapping still resolves by name.
    assert_eq!(nl.net("clk").unwrap(), 10);
}
