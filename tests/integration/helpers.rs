//! Shared test helpers for integration tests.
//!
//! Builds a small two-mesh model (a quad with a material and a triangle
//! without one) and a fake FBX2glTF made of a `/bin/sh`
//! script. The script receives the input path as `$1` and the scratch
//! directory as `$2`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use modelhub_converter::glb;
use modelhub_converter::models::Tint;
use modelhub_converter::{ColorApplier, ConverterConfig, TintError};

/// Quad corners followed by the triangle corners.
pub const POSITIONS: [[f32; 3]; 7] = [
    [0.0, 0.0, 0.0],
    [2.0, 0.0, 0.0],
    [2.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 0.5],
    [1.0, 0.0, 0.5],
    [0.0, 1.0, 0.5],
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
const TRIANGLE_INDICES: [u16; 3] = [4, 5, 6];

/// Positions (84 bytes) then quad indices (12) then triangle indices (6),
/// zero-padded to a multiple of four.
pub fn model_bin() -> Vec<u8> {
    let mut bin: Vec<u8> = POSITIONS
        .iter()
        .flatten()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    bin.extend(QUAD_INDICES.iter().flat_map(|i| i.to_le_bytes()));
    bin.extend(TRIANGLE_INDICES.iter().flat_map(|i| i.to_le_bytes()));
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    bin
}

/// The glTF document for [`model_bin`]. `buffer_uri` is set for the
/// GLTF + BIN layout and left out for GLB.
pub fn model_document(buffer_uri: Option<&str>) -> Value {
    let mut buffer = json!({ "byteLength": model_bin().len() });
    if let Some(uri) = buffer_uri {
        buffer["uri"] = json!(uri);
    }

    json!({
        "asset": { "version": "2.0", "generator": "FBX2glTF v0.9.7" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [
            { "mesh": 0, "name": "Seat" },
            { "mesh": 1, "name": "Leg" }
        ],
        "buffers": [buffer],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 84, "target": 34962 },
            { "buffer": 0, "byteOffset": 84, "byteLength": 12, "target": 34963 },
            { "buffer": 0, "byteOffset": 96, "byteLength": 6, "target": 34963 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 7, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [2.0, 1.0, 0.5]
            },
            { "bufferView": 1, "componentType": 5123, "count": 6, "type": "SCALAR" },
            { "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ],
        "materials": [{
            "name": "Fabric",
            "pbrMetallicRoughness": {
                "baseColorFactor": [0.9, 0.9, 0.9, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 0.8
            }
        }],
        "meshes": [
            {
                "name": "Seat",
                "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
            },
            {
                "name": "Leg",
                "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 2 }]
            }
        ]
    })
}

/// The model as a single GLB container.
pub fn model_glb() -> Vec<u8> {
    glb::write(&model_document(None), Some(&model_bin())).expect("fixture glb")
}

/// Write `<stem>.gltf` + `<stem>.bin` into `dir`.
pub fn write_model_gltf(dir: &Path, stem: &str) -> PathBuf {
    let bin_name = format!("{stem}.bin");
    std::fs::write(dir.join(&bin_name), model_bin()).expect("write bin");
    let path = dir.join(format!("{stem}.gltf"));
    let doc = model_document(Some(&bin_name));
    std::fs::write(&path, serde_json::to_vec_pretty(&doc).expect("json")).expect("write gltf");
    path
}

/// All vertex positions of the first mesh's first primitive.
pub fn read_positions(glb_bytes: &[u8]) -> Vec<[f32; 3]> {
    let gltf = gltf::Gltf::from_slice(glb_bytes).expect("valid glb");
    let blob = gltf.blob.clone().expect("binary chunk");
    let mesh = gltf.meshes().next().expect("mesh");
    let primitive = mesh.primitives().next().expect("primitive");
    let reader = primitive.reader(|_| Some(blob.as_slice()));
    reader.read_positions().expect("positions").collect()
}

/// Base color factors of every material, in order.
pub fn base_colors(glb_bytes: &[u8]) -> Vec<[f32; 4]> {
    let gltf = gltf::Gltf::from_slice(glb_bytes).expect("valid glb");
    gltf.materials()
        .map(|m| m.pbr_metallic_roughness().base_color_factor())
        .collect()
}

/// A temp directory holding a source FBX, the output directory, the
/// scratch root and whatever the fake converter should copy.
pub struct TestEnv {
    /// Keeps the tree alive.
    pub temp: tempfile::TempDir,
    /// `<temp>/uploads/<stem>.fbx`
    pub source: PathBuf,
    /// `<temp>/converted`
    pub output_dir: PathBuf,
    /// `<temp>/scratch`
    pub scratch_root: PathBuf,
    /// `<temp>/produced`, files the fake converter copies from.
    pub produced: PathBuf,
}

impl TestEnv {
    /// Create the tree for a source named `<stem>.fbx`.
    pub fn new(stem: &str) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let uploads = temp.path().join("uploads");
        let produced = temp.path().join("produced");
        std::fs::create_dir_all(&uploads).expect("uploads");
        std::fs::create_dir_all(&produced).expect("produced");

        let source = uploads.join(format!("{stem}.fbx"));
        std::fs::write(&source, b"Kaydara FBX Binary  \x00").expect("write source");

        Self {
            output_dir: temp.path().join("converted"),
            scratch_root: temp.path().join("scratch"),
            source,
            produced,
            temp,
        }
    }

    /// Converter config running `script` through `/bin/sh`.
    pub fn converter(&self, script: &str) -> ConverterConfig {
        let script_path = self.temp.path().join("fake_fbx2gltf.sh");
        std::fs::write(&script_path, script).expect("write script");

        ConverterConfig {
            converter_path: PathBuf::from("/bin/sh"),
            converter_args: vec![
                script_path.display().to_string(),
                "{input}".to_string(),
                "{output}".to_string(),
            ],
            ..Default::default()
        }
    }

    /// Converter that writes `<stem>.glb` into `<scratch>_out`.
    pub fn glb_converter(&self, stem: &str, bytes: &[u8]) -> ConverterConfig {
        let glb = self.produced.join(format!("{stem}.glb"));
        std::fs::write(&glb, bytes).expect("write glb");
        self.converter(&format!(
            "mkdir -p \"$2_out\" && cp '{}' \"$2_out/\"\n",
            glb.display()
        ))
    }

    /// Converter that writes `<stem>.gltf` + `<stem>.bin` into `<scratch>_out`.
    pub fn gltf_converter(&self, stem: &str) -> ConverterConfig {
        write_model_gltf(&self.produced, stem);
        self.converter(&format!(
            "mkdir -p \"$2_out\" && cp '{dir}/{stem}.gltf' '{dir}/{stem}.bin' \"$2_out/\"\n",
            dir = self.produced.display(),
        ))
    }

    /// The final GLB for `stem`.
    pub fn final_glb(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}.glb"))
    }

    /// Whether any scratch directory or `_out` sibling remains.
    pub fn scratch_is_clean(&self) -> bool {
        std::fs::read_dir(&self.scratch_root)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

/// Applier that records calls and optionally fails with a fixed error.
pub struct RecordingApplier {
    failure: Option<Failure>,
    calls: AtomicUsize,
}

enum Failure {
    Message(String),
    Io(std::io::ErrorKind),
}

impl RecordingApplier {
    /// Succeeds without touching the file.
    pub fn succeeding() -> Arc<Self> {
        Self::with_failure(None)
    }

    /// Fails every call with `message`.
    pub fn failing(message: &str) -> Arc<Self> {
        Self::with_failure(Some(Failure::Message(message.to_string())))
    }

    /// Fails every call with a read error of `kind` on the GLB.
    pub fn failing_io(kind: std::io::ErrorKind) -> Arc<Self> {
        Self::with_failure(Some(Failure::Io(kind)))
    }

    fn with_failure(failure: Option<Failure>) -> Arc<Self> {
        Arc::new(Self {
            failure,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ColorApplier for RecordingApplier {
    async fn apply_tint(&self, glb_path: &Path, _tint: Tint) -> Result<(), TintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(Failure::Message(message)) => Err(TintError::Other(message.clone())),
            Some(Failure::Io(kind)) => Err(TintError::Read {
                path: glb_path.to_path_buf(),
                source: std::io::Error::from(*kind),
            }),
            None => Ok(()),
        }
    }
}
