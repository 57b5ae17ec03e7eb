//! Domain models: requests, tints, converter artifacts, outcomes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConversionError;

// ---------------------------------------------------------------------------
// Tint
// ---------------------------------------------------------------------------

/// A uniform RGB tint with components in `[0, 1]`.
///
/// `(1, 1, 1)` is the identity and means "leave colors alone".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    /// Red component.
    pub r: f64,
    /// Green component.
    pub g: f64,
    /// Blue component.
    pub b: f64,
}

impl Tint {
    /// The no-op tint.
    pub const IDENTITY: Tint = Tint {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    /// Create a tint, rejecting non-finite or out-of-range components.
    pub fn new(r: f64, g: f64, b: f64) -> Result<Self, ConversionError> {
        for (name, value) in [("r", r), ("g", g), ("b", b)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConversionError::InvalidTint {
                    value: format!("{r},{g},{b}"),
                    reason: format!("component {name}={value} is outside [0, 1]"),
                });
            }
        }
        Ok(Self { r, g, b })
    }

    /// Parse `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(input: &str) -> Result<Self, ConversionError> {
        let hex = input.trim().trim_start_matches('#');
        let invalid = |reason: &str| ConversionError::InvalidTint {
            value: input.to_string(),
            reason: reason.to_string(),
        };

        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("expected six hexadecimal digits"));
        }

        let channel = |range: std::ops::Range<usize>| -> Result<f64, ConversionError> {
            u8::from_str_radix(&hex[range], 16)
                .map(|v| f64::from(v) / 255.0)
                .map_err(|_| invalid("invalid hexadecimal digit"))
        };

        Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)
    }

    /// Whether this tint leaves colors unchanged.
    pub fn is_identity(&self) -> bool {
        self.r == 1.0 && self.g == 1.0 && self.b == 1.0
    }

    /// Components as an array.
    pub fn to_array(self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Tint {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Tint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.r, self.g, self.b)
    }
}

impl FromStr for Tint {
    type Err = ConversionError;

    /// Accepts `#RRGGBB`, `RRGGBB`, or `r,g,b` with components in `[0, 1]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with('#') || (trimmed.len() == 6 && !trimmed.contains(',')) {
            return Self::from_hex(trimmed);
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ConversionError::InvalidTint {
                value: s.to_string(),
                reason: "expected three comma-separated components".to_string(),
            });
        }

        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| ConversionError::InvalidTint {
                value: s.to_string(),
                reason: format!("'{part}' is not a number"),
            })?;
        }

        Self::new(values[0], values[1], values[2])
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A single conversion request. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Correlation identifier used in logs and the outcome.
    pub request_id: Uuid,
    /// Uploaded FBX file.
    pub source_path: PathBuf,
    /// Directory receiving the final `.glb`.
    pub output_dir: PathBuf,
    /// Optional tint; `None` and identity both mean "no tint".
    pub tint: Option<Tint>,
}

impl ConversionRequest {
    /// Create a request without a tint.
    pub fn new(source_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            source_path: source_path.into(),
            output_dir: output_dir.into(),
            tint: None,
        }
    }

    /// Attach a tint.
    pub fn with_tint(mut self, tint: Tint) -> Self {
        self.tint = Some(tint);
        self
    }

    /// The tint to apply, if any non-identity tint was requested.
    pub fn effective_tint(&self) -> Option<Tint> {
        self.tint.filter(|t| !t.is_identity())
    }
}

// ---------------------------------------------------------------------------
// Converter artifacts
// ---------------------------------------------------------------------------

/// What the native converter left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterOutput {
    /// A single binary container.
    Glb(PathBuf),
    /// A JSON document with companion `.bin` (and possibly loose textures).
    GltfBin(PathBuf),
    /// No recognizable model file.
    NotFound,
}

impl ConverterOutput {
    /// Artifact kind, if any artifact was found.
    pub fn kind(&self) -> Option<ArtifactKind> {
        match self {
            Self::Glb(_) => Some(ArtifactKind::Glb),
            Self::GltfBin(_) => Some(ArtifactKind::GltfBin),
            Self::NotFound => None,
        }
    }

    /// Path of the primary artifact file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Glb(p) | Self::GltfBin(p) => Some(p),
            Self::NotFound => None,
        }
    }
}

/// Layout the converter produced, as reported on the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Copied byte-for-byte.
    Glb,
    /// Re-encoded into a single container.
    GltfBin,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glb => write!(f, "glb"),
            Self::GltfBin => write!(f, "gltf+bin"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of the optional tint step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TintOutcome {
    /// No tint, or identity tint.
    NotRequested,
    /// Tint applied to all materials.
    Applied,
    /// The GLB could not be read for tinting; returned untinted.
    SkippedUnreadable {
        /// Underlying error message.
        reason: String,
    },
    /// Tint failed for another reason; returned untinted (lenient policy).
    Failed {
        /// Underlying error message.
        reason: String,
    },
}

impl fmt::Display for TintOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRequested => write!(f, "not requested"),
            Self::Applied => write!(f, "applied"),
            Self::SkippedUnreadable { .. } => write!(f, "skipped (unreadable GLB)"),
            Self::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Successful conversion result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Correlates with the request.
    pub request_id: Uuid,
    /// The final `<output_dir>/<stem>.glb`.
    pub glb_path: PathBuf,
    /// Layout the converter produced.
    pub artifact: ArtifactKind,
    /// Result of the tint step.
    pub tint: TintOutcome,
    /// Recoverable problems encountered along the way.
    pub warnings: Vec<String>,
    /// Converter exit code, if it exited normally.
    pub converter_exit_code: Option<i32>,
    /// Size of the final GLB.
    pub output_bytes: u64,
    /// Wall-clock duration of the whole pipeline.
    pub duration_ms: u64,
    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
}
