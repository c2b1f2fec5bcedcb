//! Painting packs: ordered circular zones over a reference image.
//!
//! Pack JSON follows the `planelock.pack.v1` schema. Zone centers and radii
//! are reference-normalized (`[0, 1]` across the reference width/height).

use std::collections::HashSet;
use std::path::Path;

const PACK_SCHEMA_V1: &str = "planelock.pack.v1";

/// Musical role a zone triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoneRole {
    Pad,
    Epiano,
    Perc,
    PatternMelody,
    PatternRhythm,
    Macro,
    Accent,
}

impl ZoneRole {
    pub const ALL: [ZoneRole; 7] = [
        ZoneRole::Pad,
        ZoneRole::Epiano,
        ZoneRole::Perc,
        ZoneRole::PatternMelody,
        ZoneRole::PatternRhythm,
        ZoneRole::Macro,
        ZoneRole::Accent,
    ];

    /// Wire name, as written in pack files.
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneRole::Pad => "pad",
            ZoneRole::Epiano => "epiano",
            ZoneRole::Perc => "perc",
            ZoneRole::PatternMelody => "pattern-melody",
            ZoneRole::PatternRhythm => "pattern-rhythm",
            ZoneRole::Macro => "macro",
            ZoneRole::Accent => "accent",
        }
    }
}

impl std::fmt::Display for ZoneRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circular zone in reference-normalized coordinates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Zone {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub r: f64,
    pub role: ZoneRole,
}

impl Zone {
    pub fn new(id: impl Into<String>, x: f64, y: f64, r: f64, role: ZoneRole) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            r,
            role,
        }
    }

    /// Boundary inclusive.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (x - self.x).hypot(y - self.y) <= self.r
    }
}

/// First zone, in slice order, containing `(x, y)`.
///
/// Overlapping zones resolve by order, so packs list narrow zones before the
/// broad ones they sit inside when the narrow one should win.
pub fn find_zone(zones: &[Zone], x: f64, y: f64) -> Option<&Zone> {
    zones.iter().find(|z| z.contains(x, y))
}

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("failed to read pack: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse pack JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported pack schema '{found}' (expected '{expected}')")]
    Schema { found: String, expected: &'static str },
    #[error("invalid pack: {0}")]
    Invalid(String),
}

/// A reference painting and its zone map.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaintingPack {
    pub schema: String,
    pub id: String,
    pub title: String,
    /// Path or URL of the reference image, as authored.
    pub reference_image: String,
    /// Ordered; lookup is first match wins.
    pub zones: Vec<Zone>,
}

impl PaintingPack {
    pub fn from_json_file(path: &Path) -> Result<Self, PackError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, PackError> {
        let pack: PaintingPack = serde_json::from_str(data)?;
        pack.validate()?;
        Ok(pack)
    }

    pub fn to_json_string(&self) -> Result<String, PackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), PackError> {
        if self.schema != PACK_SCHEMA_V1 {
            return Err(PackError::Schema {
                found: self.schema.clone(),
                expected: PACK_SCHEMA_V1,
            });
        }
        if self.id.trim().is_empty() {
            return Err(PackError::Invalid("pack id must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for z in &self.zones {
            if z.id.trim().is_empty() {
                return Err(PackError::Invalid("zone id must not be empty".to_string()));
            }
            if !seen.insert(z.id.as_str()) {
                return Err(PackError::Invalid(format!("duplicate zone id '{}'", z.id)));
            }
            if !(z.x.is_finite() && z.y.is_finite()) {
                return Err(PackError::Invalid(format!(
                    "zone '{}' center must be finite",
                    z.id
                )));
            }
            if !z.r.is_finite() || z.r <= 0.0 {
                return Err(PackError::Invalid(format!(
                    "zone '{}' radius must be finite and > 0",
                    z.id
                )));
            }
        }
        Ok(())
    }

    pub fn find_zone(&self, x: f64, y: f64) -> Option<&Zone> {
        find_zone(&self.zones, x, y)
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }
}

impl Default for PaintingPack {
    /// The bundled demo painting, "El Boss Supremo".
    fn default() -> Self {
        use ZoneRole::*;
        Self {
            schema: PACK_SCHEMA_V1.to_string(),
            id: "obra_boss".to_string(),
            title: "El Boss Supremo".to_string(),
            reference_image: "/paintings/obra_boss/ref.jpg".to_string(),
            zones: vec![
                Zone::new("wall_l", 0.18, 0.45, 0.18, Pad),
                Zone::new("wall_r", 0.82, 0.45, 0.18, Pad),
                Zone::new("ceiling", 0.5, 0.15, 0.15, Macro),
                Zone::new("meat", 0.52, 0.38, 0.09, PatternMelody),
                Zone::new("hand", 0.65, 0.78, 0.1, PatternRhythm),
                Zone::new("knife", 0.77, 0.55, 0.06, Accent),
                Zone::new("cmd", 0.28, 0.65, 0.1, Macro),
            ],
        }
    }
}
