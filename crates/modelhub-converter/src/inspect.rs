//! Read-only GLB inspection: materials, textures, mesh assignments and
//! overall dimensions.

use std::path::{Path, PathBuf};

use modelhub_core::error::AppError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::glb::{self, GlbError};

/// Largest extent (metres) below which a model is considered degenerate.
const MIN_EXTENT_METRES: f32 = 0.001;

/// Errors from inspecting a GLB.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Inspected file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid GLB.
    #[error("Cannot inspect {path}: {source}")]
    Decode {
        /// Inspected file.
        path: PathBuf,
        /// Decode failure.
        #[source]
        source: GlbError,
    },
}

impl From<InspectError> for AppError {
    fn from(err: InspectError) -> Self {
        match &err {
            InspectError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                AppError::not_found(err.to_string())
            }
            InspectError::Read { .. } => AppError::storage(err.to_string()),
            InspectError::Decode { .. } => AppError::validation(err.to_string()),
        }
    }
}

/// One material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialReport {
    /// Material index, `None` for the implicit default material.
    pub index: Option<usize>,
    /// Material name.
    pub name: Option<String>,
    /// `pbrMetallicRoughness.baseColorFactor`.
    pub base_color_factor: [f32; 4],
    /// `pbrMetallicRoughness.metallicFactor`.
    pub metallic_factor: f32,
    /// `pbrMetallicRoughness.roughnessFactor`.
    pub roughness_factor: f32,
    /// Texture index used as base color, if any.
    pub base_color_texture: Option<usize>,
}

/// One mesh and the materials of its primitives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshReport {
    /// Mesh index.
    pub index: usize,
    /// Mesh name.
    pub name: Option<String>,
    /// Material index per primitive (`None` means no material).
    pub primitive_materials: Vec<Option<usize>>,
}

/// Axis-aligned extents in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// X extent.
    pub width_cm: f64,
    /// Y extent.
    pub height_cm: f64,
    /// Z extent.
    pub depth_cm: f64,
}

/// Summary of a GLB file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlbReport {
    /// Inspected file.
    pub path: PathBuf,
    /// File size in bytes.
    pub file_bytes: u64,
    /// Generator string from the asset block.
    pub generator: Option<String>,
    /// All materials.
    pub materials: Vec<MaterialReport>,
    /// Number of textures.
    pub texture_count: usize,
    /// Number of images.
    pub image_count: usize,
    /// All meshes.
    pub meshes: Vec<MeshReport>,
    /// Model extents; `None` when empty or degenerate.
    pub dimensions: Option<Dimensions>,
}

/// Inspect the GLB at `path`.
pub async fn inspect(path: &Path) -> Result<GlbReport, InspectError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| InspectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    inspect_bytes(path, &bytes).map_err(|source| InspectError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Inspect GLB bytes; `path` is only recorded on the report.
pub fn inspect_bytes(path: &Path, bytes: &[u8]) -> Result<GlbReport, GlbError> {
    let gltf = glb::verify(bytes)?;

    let materials = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            MaterialReport {
                index: material.index(),
                name: material.name().map(str::to_string),
                base_color_factor: pbr.base_color_factor(),
                metallic_factor: pbr.metallic_factor(),
                roughness_factor: pbr.roughness_factor(),
                base_color_texture: pbr.base_color_texture().map(|info| info.texture().index()),
            }
        })
        .collect();

    let meshes = gltf
        .meshes()
        .map(|mesh| MeshReport {
            index: mesh.index(),
            name: mesh.name().map(str::to_string),
            primitive_materials: mesh.primitives().map(|p| p.material().index()).collect(),
        })
        .collect();

    let bounds = gltf
        .meshes()
        .flat_map(|mesh| mesh.primitives().map(|p| p.bounding_box()).collect::<Vec<_>>())
        .map(|bb| (bb.min, bb.max))
        .reduce(|(amin, amax), (bmin, bmax)| {
            (
                [amin[0].min(bmin[0]), amin[1].min(bmin[1]), amin[2].min(bmin[2])],
                [amax[0].max(bmax[0]), amax[1].max(bmax[1]), amax[2].max(bmax[2])],
            )
        });

    Ok(GlbReport {
        path: path.to_path_buf(),
        file_bytes: bytes.len() as u64,
        generator: gltf.as_json().asset.generator.clone(),
        materials,
        texture_count: gltf.textures().len(),
        image_count: gltf.images().len(),
        meshes,
        dimensions: bounds.and_then(|(min, max)| dimensions_from_bounds(min, max)),
    })
}

/// Extents in centimetres, `None` when the largest extent is at most 1 mm.
pub fn dimensions_from_bounds(min: [f32; 3], max: [f32; 3]) -> Option<Dimensions> {
    let extent = |axis: usize| (max[axis] - min[axis]).max(0.0);
    let (x, y, z) = (extent(0), extent(1), extent(2));

    if x.max(y).max(z) <= MIN_EXTENT_METRES {
        return None;
    }

    let to_cm = |metres: f32| (f64::from(metres) * 100.0 * 100.0).round() / 100.0;
    Some(Dimensions {
        width_cm: to_cm(x),
        height_cm: to_cm(y),
        depth_cm: to_cm(z),
    })
}
