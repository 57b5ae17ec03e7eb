//! Fixture builders shared by unit tests.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::glb;

/// Triangle corners: (0,0,0), (1,0,0), (0,1,0).
pub(crate) const POSITIONS: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

/// Triangle indices.
pub(crate) const INDICES: [u16; 3] = [0, 1, 2];

/// Raw position bytes (36).
pub(crate) fn position_bytes() -> Vec<u8> {
    POSITIONS
        .iter()
        .flatten()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

/// Raw index bytes (6).
pub(crate) fn index_bytes() -> Vec<u8> {
    INDICES.iter().flat_map(|i| i.to_le_bytes()).collect()
}

/// Positions followed by indices, padded to 44 bytes.
pub(crate) fn triangle_bin() -> Vec<u8> {
    let mut bin = position_bytes();
    bin.extend(index_bytes());
    bin.resize(bin.len().next_multiple_of(4), 0);
    bin
}

/// A single-triangle document over one buffer.
///
/// With `with_material` the primitive uses a half-transparent white
/// material named `Body`; otherwise it has no material at all.
pub(crate) fn triangle_document(buffer_uri: Option<&str>, with_material: bool) -> Value {
    let mut buffer = json!({ "byteLength": triangle_bin().len() });
    if let Some(uri) = buffer_uri {
        buffer["uri"] = json!(uri);
    }

    let mut primitive = json!({ "attributes": { "POSITION": 0 }, "indices": 1 });
    let mut doc = json!({
        "asset": { "version": "2.0", "generator": "modelhub-tests" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": "Triangle" }],
        "buffers": [buffer],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    });

    if with_material {
        primitive["material"] = json!(0);
        doc["materials"] = json!([{
            "name": "Body",
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 1.0, 1.0, 0.5],
                "metallicFactor": 0.2
            }
        }]);
    }

    doc["meshes"] = json!([{ "name": "Triangle", "primitives": [primitive] }]);
    doc
}

/// A self-contained triangle GLB.
pub(crate) fn triangle_glb(with_material: bool) -> Vec<u8> {
    let bin = triangle_bin();
    glb::write(&triangle_document(None, with_material), Some(&bin)).expect("fixture glb")
}

/// Write `<name>.gltf` + `<name>.bin` into `dir`, returning the `.gltf` path.
pub(crate) fn write_triangle_gltf(dir: &Path, name: &str) -> PathBuf {
    let bin_name = format!("{name}.bin");
    std::fs::write(dir.join(&bin_name), triangle_bin()).expect("write bin");

    let gltf_path = dir.join(format!("{name}.gltf"));
    let doc = triangle_document(Some(&bin_name), true);
    std::fs::write(&gltf_path, serde_json::to_vec_pretty(&doc).expect("json")).expect("write gltf");
    gltf_path
}

/// Positions read back from a GLB through the typed loader.
pub(crate) fn read_positions(glb_bytes: &[u8]) -> Vec<[f32; 3]> {
    let gltf = gltf::Gltf::from_slice(glb_bytes).expect("valid glb");
    let blob = gltf.blob.clone().unwrap_or_default();
    let mesh = gltf.meshes().next().expect("mesh");
    let primitive = mesh.primitives().next().expect("primitive");
    let reader = primitive.reader(|_| Some(blob.as_slice()));
    reader.read_positions().expect("positions").collect()
}
