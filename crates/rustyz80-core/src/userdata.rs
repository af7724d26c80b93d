//! User-maintained JSON documents: net tips, image annotations, and
//! waveform color rules.
//!
//! Each document is a single top-level array of records. All three are
//! optional at startup and written back on shutdown so hand edits and
//! in-app edits survive sessions.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use rustyz80_sim::NetId;

/// A free-text note attached to a net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    /// The net the note describes.
    pub net: NetId,
    /// The note body.
    pub tip: String,
}

/// A text annotation placed over the chip image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation text.
    pub text: String,
    /// Text position.
    pub x: i32,
    /// Text position.
    pub y: i32,
    /// Highlight rectangle origin.
    pub rx: i32,
    /// Highlight rectangle origin.
    pub ry: i32,
    /// Highlight rectangle size.
    pub rw: i32,
    /// Highlight rectangle size.
    pub rh: i32,
    /// Font size in image pixels.
    pub pix: i32,
    /// Draw an overline above the text (active-low convention).
    #[serde(rename = "bar")]
    pub overline: bool,
    /// Draw the highlight rectangle.
    #[serde(rename = "rect")]
    pub draw_rect: bool,
}

/// A waveform coloring rule: signals matching `expr` get `color`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRule {
    /// Name-matching expression.
    pub expr: String,
    /// Color as `"r,g,b,a"`.
    pub color: String,
}

impl ColorRule {
    /// Parses the color field into RGBA components.
    #[must_use]
    pub fn rgba(&self) -> Option<[u8; 4]> {
        let mut parts = self.color.split(',');
        let mut out = [0u8; 4];
        for slot in &mut out {
            *slot = parts.next()?.trim().parse().ok()?;
        }
        parts.next().is_none().then_some(out)
    }
}

#[derive(Serialize, Deserialize, Default)]
struct TipsDoc {
    tips: Vec<Tip>,
}

#[derive(Serialize, Deserialize, Default)]
struct AnnotationsDoc {
    annotations: Vec<Annotation>,
}

#[derive(Serialize, Deserialize, Default)]
struct ColorsDoc {
    colors: Vec<ColorRule>,
}

/// The user-data bundle for one resource directory.
#[derive(Debug, Clone, Default)]
pub struct UserData {
    /// Net tips (`tips.json`).
    pub tips: Vec<Tip>,
    /// Image annotations (`annotations.json`).
    pub annotations: Vec<Annotation>,
    /// Waveform color rules (`colors.json`).
    pub colors: Vec<ColorRule>,
}

fn load_doc<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> io::Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    info!("loading {}", path.display());
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

fn save_doc<T: Serialize>(path: &Path, doc: &T) -> io::Result<()> {
    info!("saving {}", path.display());
    serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), doc)?;
    Ok(())
}

impl UserData {
    /// Loads whatever documents are present in the directory; the missing
    /// ones start empty.
    ///
    /// # Errors
    ///
    /// I/O or JSON shape errors on a file that does exist.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let tips: TipsDoc = load_doc(&dir.join("tips.json"))?;
        let annotations: AnnotationsDoc = load_doc(&dir.join("annotations.json"))?;
        let colors: ColorsDoc = load_doc(&dir.join("colors.json"))?;
        Ok(Self {
            tips: tips.tips,
            annotations: annotations.annotations,
            colors: colors.colors,
        })
    }

    /// Writes all three documents back to the directory.
    ///
    /// # Errors
    ///
    /// I/O or serialization errors.
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        save_doc(
            &dir.join("tips.json"),
            &TipsDoc {
                tips: self.tips.clone(),
            },
        )?;
        save_doc(
            &dir.join("annotations.json"),
            &AnnotationsDoc {
                annotations: self.annotations.clone(),
            },
        )?;
        save_doc(
            &dir.join("colors.json"),
            &ColorsDoc {
                colors: self.colors.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_documents_load_empty() {
        let dir = TempDir::new().unwrap();
        let data = UserData::load(dir.path()).unwrap();
        assert!(data.tips.is_empty());
        assert!(data.annotations.is_empty());
        assert!(data.colors.is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let data = UserData {
            tips: vec![Tip {
                net: 559,
                tip: "clock driver".to_owned(),
            }],
            annotations: vec![Annotation {
                text: "ALU".to_owned(),
                x: 100,
                y: 200,
                rw: 50,
                rh: 40,
                pix: 12,
                draw_rect: true,
                ..Annotation::default()
            }],
            colors: vec![ColorRule {
                expr: "ab".to_owned(),
                color: "128,128,255,255".to_owned(),
            }],
        };
        data.save(dir.path()).unwrap();

        let reloaded = UserData::load(dir.path()).unwrap();
        assert_eq!(reloaded.tips, data.tips);
        assert_eq!(reloaded.annotations, data.annotations);
        assert_eq!(reloaded.colors, data.colors);
    }

    #[test]
    fn color_rule_parses_rgba() {
        let rule = ColorRule {
            expr: "clk".to_owned(),
            color: "200, 200, 200, 255".to_owned(),
        };
        assert_eq!(rule.rgba(), Some([200, 200, 200, 255]));

        let bad = ColorRule {
            expr: "clk".to_owned(),
            color: "1,2,3".to_owned(),
        };
        assert_eq!(bad.rgba(), None);
    }
}
