//! faux-render
//!
//! A small, backend-neutral rendering middleware: a scene graph that owns its
//! GPU resources through a pluggable factory, a glTF 2.0 importer that fills
//! it, and an immediate-mode draw context that records line and triangle
//! batches and replays them into any command recorder. The core never names
//! a GPU API; backends plug in through the traits in [`backend`].
//!
//! High-level modules
//! - `backend`: resource/pipeline factory and command recorder traits, plus
//!   the in-memory backend (and a `wgpu` one behind the `wgpu` feature)
//! - `data_structures`: scene graph data model (buffers, images, materials,
//!   meshes, nodes, scenes)
//! - `error`: the crate-wide error type and its stable codes
//! - `pipelines`: pipeline configuration bits and programs
//! - `resources`: file and URI loading, bitmap decoding, glTF import
//! - `render`: the immediate-mode draw context
//!

pub mod backend;
pub mod data_structures;
pub mod error;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use error::{Error, ErrorKind, Result};

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use data_structures::scene_graph::SceneGraph;
pub use render::DrawContext;
pub use resources::{GltfImport, ImportOptions, import_gltf_slice, load_scene_gltf};
