//! Parsers for the chip resource files.
//!
//! Four line-oriented text files describe the extracted die:
//!
//! - `nodenames.js` — `name: number,` per line; `/` starts a comment.
//! - `netnames.js` — optional user overrides in the same shape, plus bus
//!   definitions `name: [n1,n2,…],`.
//! - `transdefs.js` — `['t<digits>', gate, c1, c2, <11 ignored fields>],`.
//! - `segdefs.js` — `[netid, '<flags>', …],`; `+` in the flags marks a
//!   pull-up.
//!
//! Wrapper lines (`var … = {`, `}`) carry no `:` or `[` and are skipped.
//! A required file that is missing, or any record that violates its shape,
//! aborts the load.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::{NameTable, Netlist, NetlistBuilder, NetId, TranId, MAX_NETS, MAX_TRANSISTORS};

/// Fatal resource-load failure. The simulator refuses to start on any of
/// these.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A required file could not be opened or read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A record did not match the expected line shape.
    #[error("{file}:{line}: malformed record `{text}`")]
    MalformedRecord {
        /// File the record came from.
        file: String,
        /// 1-based line number.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },

    /// A net id does not fit the dense net range.
    #[error("{file}:{line}: net id {id} out of range")]
    NetIdOutOfRange {
        /// File the record came from.
        file: String,
        /// 1-based line number.
        line: usize,
        /// Parsed id.
        id: u32,
    },

    /// A transistor id does not fit the transistor range.
    #[error("{file}:{line}: transistor id {id} out of range")]
    TransistorIdOutOfRange {
        /// File the record came from.
        file: String,
        /// 1-based line number.
        line: usize,
        /// Parsed id.
        id: u32,
    },

    /// `vss` or `vcc` did not resolve after the name files were loaded.
    #[error("power rails unresolved: `vss` or `vcc` missing from the name tables")]
    PowerRailsUnresolved,
}

impl Netlist {
    /// Loads the complete netlist from a resource directory.
    ///
    /// `nodenames.js`, `transdefs.js` and `segdefs.js` are required;
    /// `netnames.js` is the optional user override file.
    ///
    /// # Errors
    ///
    /// Any [`LoadError`]; partial results are discarded.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        info!("loading netlist resources from {}", dir.display());

        let mut names = NameTable::new();
        load_names(&dir.join("nodenames.js"), &mut names, false)?;
        let overrides = dir.join("netnames.js");
        if overrides.exists() {
            load_names(&overrides, &mut names, true)?;
        }

        let gnd = names.net("vss").ok_or(LoadError::PowerRailsUnresolved)?;
        let vcc = names.net("vcc").ok_or(LoadError::PowerRailsUnresolved)?;

        let mut builder = NetlistBuilder::new(gnd, vcc);
        load_transdefs(&dir.join("transdefs.js"), &mut builder)?;
        load_segdefs(&dir.join("segdefs.js"), &mut builder)?;

        let store = builder.build();
        let connected = (0..store.net_count() as NetId)
            .filter(|&n| store.is_connected(n))
            .count();
        info!(
            "loaded {} transistor definitions, {connected} connected nets",
            store.transistor_count()
        );
        Ok(Self::new(store, names, gnd, vcc))
    }
}

fn open(path: &Path) -> Result<BufReader<File>, LoadError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |f| f.to_string_lossy().into_owned())
}

fn malformed(file: &str, line: usize, text: &str) -> LoadError {
    LoadError::MalformedRecord {
        file: file.to_owned(),
        line,
        text: text.trim().to_owned(),
    }
}

fn check_net(file: &str, line: usize, id: u32) -> Result<NetId, LoadError> {
    if (id as usize) < MAX_NETS {
        Ok(id as NetId)
    } else {
        Err(LoadError::NetIdOutOfRange {
            file: file.to_owned(),
            line,
            id,
        })
    }
}

/// Loads a name file. `overrides` selects the `netnames.js` semantics:
/// silent replacement of base names, override marking, and bus records.
fn load_names(path: &Path, names: &mut NameTable, overrides: bool) -> Result<(), LoadError> {
    info!("loading {}", path.display());
    let file = file_label(path);
    let reader = open(path)?;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;
        let lineno = idx + 1;
        if line.starts_with('/') {
            continue;
        }
        let Some((lhs, rhs)) = line.split_once(':') else {
            continue; // wrapper lines: `var … = {` and `}`
        };
        let name = lhs.trim();
        let rhs = rhs.trim().trim_end_matches(',').trim();
        if name.is_empty() {
            return Err(malformed(&file, lineno, &line));
        }

        if overrides && rhs.starts_with('[') {
            // Bus definition: a bracketed, comma-separated net list.
            let body = rhs.trim_start_matches('[').trim_end_matches(']');
            let mut nets = Vec::new();
            for item in body.split(',').filter(|s| !s.trim().is_empty()) {
                let id: u32 = item
                    .trim()
                    .parse()
                    .map_err(|_| malformed(&file, lineno, &line))?;
                nets.push(check_net(&file, lineno, id)?);
            }
            if nets.is_empty() {
                return Err(malformed(&file, lineno, &line));
            }
            names.add_bus(name, nets);
            continue;
        }

        let id: u32 = rhs.parse().map_err(|_| malformed(&file, lineno, &line))?;
        let net = check_net(&file, lineno, id)?;
        if overrides {
            names.insert_override(name, net);
        } else {
            names.insert_base(name, net);
        }
    }
    Ok(())
}

/// Loads transistor definitions into the builder.
fn load_transdefs(path: &Path, builder: &mut NetlistBuilder) -> Result<(), LoadError> {
    info!("loading {}", path.display());
    let file = file_label(path);
    let reader = open(path)?;
    let mut count = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;
        let lineno = idx + 1;
        if !line.starts_with('[') {
            continue;
        }
        let body = line.replace(['[', ']'], " ");
        let body = body.trim().trim_end_matches(',').trim();
        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() != 14 {
            return Err(malformed(&file, lineno, &line));
        }

        // Field 0 is a quoted textual id; the digits are the index.
        let digits: String = fields[0].chars().filter(char::is_ascii_digit).collect();
        let id: u32 = digits.parse().map_err(|_| malformed(&file, lineno, &line))?;
        if id as usize >= MAX_TRANSISTORS {
            return Err(LoadError::TransistorIdOutOfRange {
                file: file.clone(),
                line: lineno,
                id,
            });
        }

        let mut term = [0 as NetId; 3];
        for (slot, field) in term.iter_mut().zip(&fields[1..4]) {
            let raw: u32 = field
                .trim()
                .parse()
                .map_err(|_| malformed(&file, lineno, &line))?;
            *slot = check_net(&file, lineno, raw)?;
        }
        builder.add_transistor(id as TranId, term[0], term[1], term[2]);
        count += 1;
    }
    info!("{count} transistor definitions in {file}");
    Ok(())
}

/// Loads segment definitions; only the pull-up flag matters here.
fn load_segdefs(path: &Path, builder: &mut NetlistBuilder) -> Result<(), LoadError> {
    info!("loading {}", path.display());
    let file = file_label(path);
    let reader = open(path)?;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;
        let lineno = idx + 1;
        if !line.starts_with('[') {
            continue;
        }
        let body = line.replace(['[', ']'], " ");
        let body = body.trim().trim_end_matches(',').trim();
        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() < 2 {
            return Err(malformed(&file, lineno, &line));
        }
        let id: u32 = fields[0]
            .trim()
            .parse()
            .map_err(|_| malformed(&file, lineno, &line))?;
        let net = check_net(&file, lineno, id)?;
        builder.set_pullup(net, fields[1].contains('+'));
    }
    Ok(())
}
