//! Material tinting of finished GLB files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::filesystem::FsUtils;
use crate::glb::{self, GlbError};
use crate::models::Tint;

/// Keywords that mark a tint failure as "the file could not be read as a GLB".
/// Matched case-sensitively against the error message.
const FORMAT_KEYWORDS: [&str; 3] = ["GLB", "JSON", "glTF"];

/// Name of the material appended for primitives that have none.
const TINT_MATERIAL_NAME: &str = "tint";

/// Errors from applying a tint.
#[derive(Debug, Error)]
pub enum TintError {
    /// The GLB file could not be read from disk.
    #[error("Failed to read GLB {path}: {source}")]
    Read {
        /// File being tinted.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a readable GLB.
    #[error("Unreadable GLB {path}: {source}")]
    Unreadable {
        /// File being tinted.
        path: PathBuf,
        /// Decode failure.
        #[source]
        source: GlbError,
    },

    /// The tinted model could not be written back.
    #[error("Failed to write tinted model {path}: {source}")]
    Write {
        /// File being tinted.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl TintError {
    /// Whether the failure means the file could not be read as a GLB.
    ///
    /// Disk errors never count, even when the path mentions a format name.
    pub fn is_format_related(&self) -> bool {
        match self {
            TintError::Unreadable { .. } => true,
            TintError::Read { .. } | TintError::Write { .. } => false,
            TintError::Other(message) => is_format_message(message),
        }
    }
}

/// Whether an error message names a container format problem.
pub fn is_format_message(message: &str) -> bool {
    FORMAT_KEYWORDS.iter().any(|k| message.contains(k))
}

/// Applies a uniform tint to a GLB, replacing the file.
#[async_trait]
pub trait ColorApplier: Send + Sync {
    /// Tint the GLB at `glb_path`, rewriting the file.
    async fn apply_tint(&self, glb_path: &Path, tint: Tint) -> Result<(), TintError>;
}

/// What a tint pass changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TintSummary {
    /// Existing materials whose base color was replaced.
    pub materials_tinted: usize,
    /// Primitives that received the appended tint material.
    pub primitives_assigned: usize,
    /// Whether a tint material was appended.
    pub material_added: bool,
}

/// Default applier: sets `baseColorFactor` on every material.
///
/// Existing alpha is preserved. Primitives without a material get a new
/// non-metallic, fully rough material in the tint color. Vertex colors and
/// textures are left alone, so textured materials are multiplied by the tint.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialTint;

#[async_trait]
impl ColorApplier for MaterialTint {
    async fn apply_tint(&self, glb_path: &Path, tint: Tint) -> Result<(), TintError> {
        let bytes = tokio::fs::read(glb_path)
            .await
            .map_err(|source| TintError::Read {
                path: glb_path.to_path_buf(),
                source,
            })?;

        let path = glb_path.to_path_buf();
        let (tinted, summary) = tokio::task::spawn_blocking(move || {
            tint_glb(&bytes, tint).map_err(|source| TintError::Unreadable { path, source })
        })
        .await
        .map_err(|e| TintError::Other(format!("Tint task failed: {e}")))??;

        FsUtils::write_atomic(glb_path, &tinted)
            .await
            .map_err(|source| TintError::Write {
                path: glb_path.to_path_buf(),
                source,
            })?;

        debug!(
            path = %glb_path.display(),
            tint = %tint,
            materials = summary.materials_tinted,
            assigned = summary.primitives_assigned,
            "Applied material tint"
        );
        Ok(())
    }
}

/// Tint GLB bytes, returning the rewritten container.
pub fn tint_glb(bytes: &[u8], tint: Tint) -> Result<(Vec<u8>, TintSummary), GlbError> {
    let mut parts = glb::read(bytes)?;
    let summary = tint_document(&mut parts.json, tint)?;
    let out = glb::write(&parts.json, parts.bin.as_deref())?;
    Ok((out, summary))
}

/// Tint a glTF JSON document in place.
pub fn tint_document(doc: &mut Value, tint: Tint) -> Result<TintSummary, GlbError> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| GlbError::Document("top level is not an object".to_string()))?;
    let [r, g, b] = tint.to_array();
    let mut summary = TintSummary::default();

    let materials = root
        .entry("materials")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| GlbError::Document("`materials` is not an array".to_string()))?;

    for material in materials.iter_mut().filter_map(Value::as_object_mut) {
        let pbr = material
            .entry("pbrMetallicRoughness")
            .or_insert_with(|| json!({}));
        let Some(pbr) = pbr.as_object_mut() else {
            continue;
        };
        let alpha = pbr
            .get("baseColorFactor")
            .and_then(|f| f.get(3))
            .and_then(Value::as_f64)
            .unwrap_or(1.0);
        pbr.insert("baseColorFactor".to_string(), json!([r, g, b, alpha]));
        summary.materials_tinted += 1;
    }

    let material_count = materials.len();
    let mut bare = Vec::new();
    if let Some(meshes) = root.get("meshes").and_then(Value::as_array) {
        for (mesh_index, mesh) in meshes.iter().enumerate() {
            let Some(primitives) = mesh.get("primitives").and_then(Value::as_array) else {
                continue;
            };
            for (prim_index, primitive) in primitives.iter().enumerate() {
                if primitive.get("material").is_none() {
                    bare.push((mesh_index, prim_index));
                }
            }
        }
    }

    if material_count > 0 && bare.is_empty() {
        return Ok(summary);
    }

    if let Some(materials) = root.get_mut("materials").and_then(Value::as_array_mut) {
        materials.push(json!({
            "name": TINT_MATERIAL_NAME,
            "pbrMetallicRoughness": {
                "baseColorFactor": [r, g, b, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0
            }
        }));
        summary.material_added = true;
    }

    if let Some(meshes) = root.get_mut("meshes").and_then(Value::as_array_mut) {
        for (mesh_index, prim_index) in bare {
            if let Some(primitive) = meshes
                .get_mut(mesh_index)
                .and_then(|m| m.get_mut("primitives"))
                .and_then(|p| p.get_mut(prim_index))
                .and_then(Value::as_object_mut)
            {
                primitive.insert("material".to_string(), json!(material_count));
                summary.primitives_assigned += 1;
            }
        }
    }

    Ok(summary)
}
