#![allow(dead_code)]

use std::{io::Cursor, sync::Arc};

use faux_render::{
    SceneGraph,
    backend::memory::{MemoryBackend, MemoryStats},
};
use serde_json::{Value, json};

const GLB_MAGIC: u32 = 0x4654_6C67;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

pub const UNSIGNED_BYTE: u32 = 5121;
pub const UNSIGNED_SHORT: u32 = 5123;
pub const UNSIGNED_INT: u32 = 5125;
pub const FLOAT: u32 = 5126;

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const WHITE: [u8; 4] = [255, 255, 255, 255];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A scene graph over a fresh memory backend, defaults already created.
pub fn new_graph() -> (SceneGraph, Arc<MemoryStats>) {
    new_graph_with(MemoryBackend::new())
}

pub fn new_graph_with(backend: MemoryBackend) -> (SceneGraph, Arc<MemoryStats>) {
    init_logger();
    let stats = backend.stats();
    let mut graph = SceneGraph::new(Box::new(backend));
    graph
        .initialize_defaults()
        .expect("failed to create scene graph defaults");
    (graph, stats)
}

/// Lengths of every scene graph array, for before/after comparisons.
pub fn array_lengths(graph: &SceneGraph) -> [usize; 8] {
    [
        graph.buffers().len(),
        graph.images().len(),
        graph.samplers().len(),
        graph.textures().len(),
        graph.materials().len(),
        graph.meshes().len(),
        graph.nodes().len(),
        graph.scenes().len(),
    ]
}

/// Encodes RGBA pixels as a PNG file.
pub fn png(width: u32, height: u32, pixels: &[[u8; 4]]) -> Vec<u8> {
    let raw: Vec<u8> = pixels.iter().flatten().copied().collect();
    let image = image::RgbaImage::from_raw(width, height, raw).expect("pixel count mismatch");
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("failed to encode png");
    bytes
}

/// Serializes a glTF JSON document, filling in the asset header.
pub fn gltf_json(mut document: Value) -> Vec<u8> {
    document["asset"] = json!({ "version": "2.0" });
    serde_json::to_vec(&document).expect("failed to serialize glTF")
}

/// Collects binary payloads, buffer views and accessors and wraps them
/// together with a JSON document into a GLB container.
#[derive(Default)]
pub struct GlbBuilder {
    bin: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` as a new buffer view and returns its index.
    pub fn view(&mut self, bytes: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        }));
        self.buffer_views.len() - 1
    }

    pub fn accessor(&mut self, bytes: &[u8], component_type: u32, count: usize, kind: &str) -> usize {
        let view = self.view(bytes);
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": component_type,
            "count": count,
            "type": kind,
        }));
        self.accessors.len() - 1
    }

    /// POSITION accessor, with the bounds glTF requires.
    pub fn positions(&mut self, positions: &[[f32; 3]]) -> usize {
        let index = self.vec3(positions);
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for position in positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(position[axis]);
                max[axis] = max[axis].max(position[axis]);
            }
        }
        self.accessors[index]["min"] = json!(min);
        self.accessors[index]["max"] = json!(max);
        index
    }

    pub fn vec2(&mut self, values: &[[f32; 2]]) -> usize {
        self.accessor(bytemuck::cast_slice(values), FLOAT, values.len(), "VEC2")
    }

    pub fn vec3(&mut self, values: &[[f32; 3]]) -> usize {
        self.accessor(bytemuck::cast_slice(values), FLOAT, values.len(), "VEC3")
    }

    pub fn vec4(&mut self, values: &[[f32; 4]]) -> usize {
        self.accessor(bytemuck::cast_slice(values), FLOAT, values.len(), "VEC4")
    }

    pub fn indices_u16(&mut self, indices: &[u16]) -> usize {
        self.accessor(bytemuck::cast_slice(indices), UNSIGNED_SHORT, indices.len(), "SCALAR")
    }

    pub fn indices_u8(&mut self, indices: &[u8]) -> usize {
        self.accessor(indices, UNSIGNED_BYTE, indices.len(), "SCALAR")
    }

    /// Finishes the container. `document` holds everything but the asset
    /// header, buffers, buffer views and accessors.
    pub fn build(self, mut document: Value) -> Vec<u8> {
        document["asset"] = json!({ "version": "2.0" });
        if !self.bin.is_empty() {
            document["buffers"] = json!([{ "byteLength": self.bin.len() }]);
            document["bufferViews"] = Value::Array(self.buffer_views);
            document["accessors"] = Value::Array(self.accessors);
        }
        let json = serde_json::to_vec(&document).expect("failed to serialize glTF");
        encode_glb(json, self.bin)
    }
}

pub fn encode_glb(mut json: Vec<u8>, mut bin: Vec<u8>) -> Vec<u8> {
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let mut total = 12 + 8 + json.len();
    if !bin.is_empty() {
        total += 8 + bin.len();
    }
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(&json);
    if !bin.is_empty() {
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(&bin);
    }
    glb
}

pub const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

/// One scene, one node, one mesh with a single u16-indexed triangle and no
/// material.
pub fn triangle_glb() -> Vec<u8> {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE);
    let indices = glb.indices_u16(&[0, 1, 2]);
    glb.build(json!({
        "scene": 0,
        "scenes": [{ "name": "triangle scene", "nodes": [0] }],
        "nodes": [{ "name": "triangle", "mesh": 0 }],
        "meshes": [{
            "name": "triangle",
            "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }],
        }],
    }))
}

/// 24 vertices and 36 indices; every face gets its own four corners.
pub fn cube() -> (Vec<[f32; 3]>, Vec<[f32; 2]>, Vec<u16>) {
    let faces: [[[f32; 3]; 4]; 6] = [
        [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
        [[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]],
        [[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]],
        [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]],
        [[-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]],
        [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]],
    ];
    let corners_uv = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
    let mut positions = Vec::with_capacity(24);
    let mut tex_coords = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for face in faces {
        let base = positions.len() as u16;
        positions.extend_from_slice(&face);
        tex_coords.extend_from_slice(&corners_uv);
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (positions, tex_coords, indices)
}

/// A cube whose only material samples a 2×2 image (red, green, blue, white)
/// as base colour. `texture_info` extends the material's baseColorTexture.
pub fn textured_cube_glb(texture_info: Option<Value>) -> Vec<u8> {
    let (positions, tex_coords, indices) = cube();
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&positions);
    let tex_coord = glb.vec2(&tex_coords);
    let index = glb.indices_u16(&indices);
    let image_view = glb.view(&png(2, 2, &[RED, GREEN, BLUE, WHITE]));

    let mut base_color_texture = json!({ "index": 0 });
    if let Some(Value::Object(extra)) = texture_info {
        for (key, value) in extra {
            base_color_texture[key] = value;
        }
    }
    glb.build(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "cube", "mesh": 0 }],
        "meshes": [{
            "name": "cube",
            "primitives": [{
                "attributes": { "POSITION": position, "TEXCOORD_0": tex_coord },
                "indices": index,
                "material": 0,
            }],
        }],
        "materials": [{
            "name": "checker",
            "pbrMetallicRoughness": {
                "baseColorTexture": base_color_texture,
                "metallicFactor": 0.0,
                "roughnessFactor": 0.5,
            },
        }],
        "textures": [{ "source": 0, "sampler": 0 }],
        "samplers": [{ "magFilter": 9728, "minFilter": 9728, "wrapS": 33071, "wrapT": 33071 }],
        "images": [{ "name": "checker", "bufferView": image_view, "mimeType": "image/png" }],
    }))
}
