//! GLTF + BIN → GLB repackaging.
//!
//! Every buffer (external file or `data:` URI) and every image referenced by
//! URI is folded into a single binary chunk. Buffer views are rebased onto
//! that chunk and images are rewritten to reference new buffer views, so the
//! result is fully self-contained.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::ConversionError;
use crate::filesystem::FsUtils;
use crate::glb::{self, GlbError};

/// Errors produced while packing a `.gltf` into a GLB.
#[derive(Debug, Error)]
pub enum RepackageError {
    /// A referenced file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The `.gltf` is not valid JSON.
    #[error("Invalid glTF JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is structurally unusable.
    #[error("Invalid glTF document: {0}")]
    Document(String),

    /// A `data:` URI could not be decoded.
    #[error("Invalid data URI in {context}: {reason}")]
    DataUri {
        /// Which buffer or image carried the URI.
        context: String,
        /// What was wrong.
        reason: String,
    },

    /// A buffer holds fewer bytes than its declared `byteLength`.
    #[error("Buffer {index} holds {actual} bytes but declares {declared}")]
    ShortBuffer {
        /// Buffer index.
        index: usize,
        /// Bytes available.
        actual: usize,
        /// Declared `byteLength`.
        declared: usize,
    },

    /// An image's media type could not be determined.
    #[error("Cannot determine media type of image {index}")]
    UnknownImageType {
        /// Image index.
        index: usize,
    },

    /// Framing or validation of the packed container failed.
    #[error(transparent)]
    Glb(#[from] GlbError),
}

/// Convert the `.gltf` at `gltf_path` into GLB bytes.
///
/// Relative URIs are resolved against the directory holding the `.gltf`.
/// The packed container is re-parsed before being returned.
pub fn pack_gltf(gltf_path: &Path) -> Result<Vec<u8>, RepackageError> {
    let base_dir = gltf_path.parent().unwrap_or_else(|| Path::new("."));
    let text = std::fs::read(gltf_path).map_err(|source| RepackageError::Read {
        path: gltf_path.to_path_buf(),
        source,
    })?;
    let mut doc: Value = serde_json::from_slice(&text)?;
    let root = doc
        .as_object_mut()
        .ok_or_else(|| RepackageError::Document("top level is not an object".to_string()))?;

    let mut bin = BinBuilder::default();

    let buffer_offsets = embed_buffers(root, base_dir, &mut bin)?;
    rebase_buffer_views(root, &buffer_offsets)?;
    let embedded_images = embed_images(root, base_dir, &mut bin)?;

    if bin.is_empty() {
        root.remove("buffers");
    } else {
        root.insert(
            "buffers".to_string(),
            json!([{ "byteLength": bin.len() }]),
        );
    }

    debug!(
        gltf = %gltf_path.display(),
        buffers = buffer_offsets.len(),
        images = embedded_images,
        bin_bytes = bin.len(),
        "Packed glTF resources"
    );

    let bin = bin.finish();
    let bytes = glb::write(&doc, (!bin.is_empty()).then_some(bin.as_slice()))?;
    glb::check_container(&bytes)?;
    Ok(bytes)
}

/// Pack `gltf_path` and write the GLB to `destination`. Returns the size written.
///
/// `destination` is only replaced once the whole container has been written.
pub async fn repackage(gltf_path: &Path, destination: &Path) -> Result<u64, ConversionError> {
    let source = gltf_path.to_path_buf();
    let bytes = tokio::task::spawn_blocking(move || pack_gltf(&source))
        .await?
        .map_err(|e| ConversionError::Repackaging {
            path: gltf_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    FsUtils::write_atomic(destination, &bytes)
        .await
        .map_err(|e| ConversionError::Repackaging {
            path: destination.to_path_buf(),
            reason: format!("write failed: {e}"),
        })?;

    info!(
        gltf = %gltf_path.display(),
        glb = %destination.display(),
        bytes = bytes.len(),
        "Repackaged GLTF + BIN as GLB"
    );
    Ok(bytes.len() as u64)
}

/// Append every buffer to `bin`, returning each buffer's new base offset.
fn embed_buffers(
    root: &Map<String, Value>,
    base_dir: &Path,
    bin: &mut BinBuilder,
) -> Result<Vec<usize>, RepackageError> {
    let Some(buffers) = root.get("buffers") else {
        return Ok(Vec::new());
    };
    let buffers = buffers
        .as_array()
        .ok_or_else(|| RepackageError::Document("`buffers` is not an array".to_string()))?;

    let mut offsets = Vec::with_capacity(buffers.len());
    for (index, buffer) in buffers.iter().enumerate() {
        let uri = buffer.get("uri").and_then(Value::as_str).ok_or_else(|| {
            RepackageError::Document(format!("buffer {index} has no uri"))
        })?;
        let (mut data, _) = load_uri(base_dir, uri, &format!("buffer {index}"))?;

        if let Some(declared) = buffer.get("byteLength").and_then(Value::as_u64) {
            let declared = declared as usize;
            if data.len() < declared {
                return Err(RepackageError::ShortBuffer {
                    index,
                    actual: data.len(),
                    declared,
                });
            }
            data.truncate(declared);
        }

        offsets.push(bin.push(&data));
    }
    Ok(offsets)
}

/// Point every buffer view at buffer 0 with its offset shifted by its old
/// buffer's base offset.
fn rebase_buffer_views(
    root: &mut Map<String, Value>,
    buffer_offsets: &[usize],
) -> Result<(), RepackageError> {
    let Some(views) = root.get_mut("bufferViews").and_then(Value::as_array_mut) else {
        return Ok(());
    };

    for (index, view) in views.iter_mut().enumerate() {
        let buffer = view.get("buffer").and_then(Value::as_u64).ok_or_else(|| {
            RepackageError::Document(format!("bufferView {index} has no buffer"))
        })? as usize;
        let base = *buffer_offsets.get(buffer).ok_or_else(|| {
            RepackageError::Document(format!(
                "bufferView {index} references missing buffer {buffer}"
            ))
        })?;
        let offset = view.get("byteOffset").and_then(Value::as_u64).unwrap_or(0) as usize;

        view["buffer"] = json!(0);
        view["byteOffset"] = json!(base + offset);
    }
    Ok(())
}

/// Move URI-referenced images into new buffer views. Returns how many moved.
fn embed_images(
    root: &mut Map<String, Value>,
    base_dir: &Path,
    bin: &mut BinBuilder,
) -> Result<usize, RepackageError> {
    let Some(images) = root.get("images").and_then(Value::as_array) else {
        return Ok(0);
    };

    // (image index, bytes, media type)
    let mut pending = Vec::new();
    for (index, image) in images.iter().enumerate() {
        let Some(uri) = image.get("uri").and_then(Value::as_str) else {
            continue;
        };
        let (data, uri_mime) = load_uri(base_dir, uri, &format!("image {index}"))?;
        let mime = image
            .get("mimeType")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(uri_mime.filter(|m| m.starts_with("image/")))
            .or_else(|| sniff_image_type(&data).map(str::to_string))
            .or_else(|| image_type_from_extension(uri).map(str::to_string))
            .ok_or(RepackageError::UnknownImageType { index })?;
        pending.push((index, data, mime));
    }

    if pending.is_empty() {
        return Ok(0);
    }

    let views = root
        .entry("bufferViews")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| RepackageError::Document("`bufferViews` is not an array".to_string()))?;

    let mut assignments = Vec::with_capacity(pending.len());
    for (index, data, mime) in pending.iter() {
        let offset = bin.push(data);
        views.push(json!({ "buffer": 0, "byteOffset": offset, "byteLength": data.len() }));
        assignments.push((*index, views.len() - 1, mime.clone()));
    }

    if let Some(images) = root.get_mut("images").and_then(Value::as_array_mut) {
        for (index, view, mime) in assignments {
            if let Some(image) = images.get_mut(index).and_then(Value::as_object_mut) {
                image.remove("uri");
                image.insert("bufferView".to_string(), json!(view));
                image.insert("mimeType".to_string(), json!(mime));
            }
        }
    }

    Ok(pending.len())
}

/// Resolve a buffer or image URI to bytes, plus the media type for `data:` URIs.
fn load_uri(
    base_dir: &Path,
    uri: &str,
    context: &str,
) -> Result<(Vec<u8>, Option<String>), RepackageError> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let (header, payload) = rest.split_once(',').ok_or_else(|| RepackageError::DataUri {
            context: context.to_string(),
            reason: "missing ',' separator".to_string(),
        })?;

        if let Some(mime) = header.strip_suffix(";base64") {
            let bytes = BASE64
                .decode(payload)
                .map_err(|e| RepackageError::DataUri {
                    context: context.to_string(),
                    reason: e.to_string(),
                })?;
            return Ok((bytes, (!mime.is_empty()).then(|| mime.to_string())));
        }

        let data = urlencoding::decode_binary(payload.as_bytes()).into_owned();
        let mime = header.split(';').next().filter(|m| !m.is_empty());
        return Ok((data, mime.map(str::to_string)));
    }

    let decoded = urlencoding::decode(uri)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| uri.to_string());
    let path = base_dir.join(decoded);
    let data = std::fs::read(&path).map_err(|source| RepackageError::Read { path, source })?;
    Ok((data, None))
}

/// Media type from well-known magic bytes.
fn sniff_image_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(&[0xAB, b'K', b'T', b'X', b' ', b'2', b'0']) {
        Some("image/ktx2")
    } else {
        None
    }
}

/// Media type from a file extension.
fn image_type_from_extension(uri: &str) -> Option<&'static str> {
    let ext = Path::new(uri).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "ktx2" => Some("image/ktx2"),
        _ => None,
    }
}

/// Accumulates the single binary chunk, keeping every segment 4-byte aligned.
#[derive(Debug, Default)]
struct BinBuilder {
    data: Vec<u8>,
}

impl BinBuilder {
    /// Append `bytes` at the next aligned offset and return that offset.
    fn push(&mut self, bytes: &[u8]) -> usize {
        self.align();
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        offset
    }

    fn len(&self) -> usize {
        self.data.len().next_multiple_of(4)
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn finish(mut self) -> Vec<u8> {
        self.align();
        self.data
    }

    fn align(&mut self) {
        self.data.resize(self.data.len().next_multiple_of(4), 0);
    }
}
