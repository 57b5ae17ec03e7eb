//! GLB container framing.
//!
//! Documents are edited as raw JSON so that extensions and extras the typed
//! model does not know about survive a rewrite untouched.

use std::borrow::Cow;

use gltf::binary::{Glb, Header};
use serde_json::Value;
use thiserror::Error;

/// Container version written.
const GLB_VERSION: u32 = 2;
/// File header (12) plus JSON chunk header (8).
const MIN_CONTAINER_LEN: usize = 20;
/// BIN chunk header.
const CHUNK_HEADER_LEN: usize = 8;

/// Errors reading or writing a GLB container.
#[derive(Debug, Error)]
pub enum GlbError {
    /// Container framing could not be parsed or the document failed validation.
    #[error("Invalid GLB container: {0}")]
    Container(#[from] gltf::Error),

    /// The JSON chunk is not valid JSON.
    #[error("Invalid glTF JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON is well-formed but not a usable glTF document.
    #[error("Invalid glTF document: {0}")]
    Document(String),

    /// Combined chunks do not fit the 32-bit length fields.
    #[error("GLB exceeds the 4 GiB container limit ({0} bytes)")]
    TooLarge(usize),
}

/// A GLB split into its editable JSON document and binary chunk.
#[derive(Debug, Clone)]
pub struct GlbParts {
    /// The glTF JSON document.
    pub json: Value,
    /// The binary chunk, if present.
    pub bin: Option<Vec<u8>>,
}

/// Split a GLB into JSON document and binary chunk.
pub fn read(bytes: &[u8]) -> Result<GlbParts, GlbError> {
    let glb = gltf::binary::Glb::from_slice(bytes)?;
    let json = serde_json::from_slice(&glb.json)?;
    Ok(GlbParts {
        json,
        bin: glb.bin.map(|b| b.into_owned()),
    })
}

/// Frame a JSON document and optional binary chunk as a GLB.
///
/// The JSON chunk is padded with spaces and the binary chunk with zeros to
/// 4-byte boundaries.
pub fn write(json: &Value, bin: Option<&[u8]>) -> Result<Vec<u8>, GlbError> {
    let json_bytes = serde_json::to_vec(json)?;

    let total = MIN_CONTAINER_LEN
        + json_bytes.len().next_multiple_of(4)
        + bin.map_or(0, |b| CHUNK_HEADER_LEN + b.len().next_multiple_of(4));
    let length = u32::try_from(total).map_err(|_| GlbError::TooLarge(total))?;

    let glb = Glb {
        header: Header {
            magic: *b"glTF",
            version: GLB_VERSION,
            length,
        },
        json: Cow::Owned(json_bytes),
        bin: bin.map(Cow::Borrowed),
    };
    Ok(glb.to_vec()?)
}

/// Parse and validate a GLB with the glTF loader.
///
/// Documents requiring extensions the loader does not implement are
/// rejected; use [`check_container`] when only the framing matters.
pub fn verify(bytes: &[u8]) -> Result<gltf::Gltf, GlbError> {
    Ok(gltf::Gltf::from_slice(bytes)?)
}

/// Check that `bytes` frame a GLB whose JSON chunk deserializes as a glTF
/// document, without validating indices or required extensions.
pub fn check_container(bytes: &[u8]) -> Result<(), GlbError> {
    gltf::Gltf::from_slice_without_validation(bytes)?;
    Ok(())
}
