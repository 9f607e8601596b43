//! Scene graph data model.
//!
//! - `buffer` holds GPU buffers and typed views into them
//! - `format` is the element format shared by views and images
//! - `texture` holds images, samplers, textures and the per-slot defaults
//! - `material` holds PBR materials and their packed shader layout
//! - `instance` holds node transforms and per-instance GPU records
//! - `scene_graph` owns all of the above and ties it together
//!
//! Entities refer to each other through the index handles defined here. An
//! index stays valid for as long as the owning graph lives.

pub mod buffer;
pub mod format;
pub mod instance;
pub mod material;
pub mod scene_graph;
pub mod texture;

/// Index value that never matches an entry; returned by failed lookups.
pub const INVALID_INDEX: u32 = u32::MAX;

macro_rules! index_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_handle!(
    /// Index into [`SceneGraph::buffers`](scene_graph::SceneGraph::buffers).
    BufferRef
);
index_handle!(
    /// Index into [`SceneGraph::images`](scene_graph::SceneGraph::images).
    ImageRef
);
index_handle!(
    /// Index into [`SceneGraph::samplers`](scene_graph::SceneGraph::samplers).
    SamplerRef
);
index_handle!(
    /// Index into [`SceneGraph::textures`](scene_graph::SceneGraph::textures).
    TextureRef
);
index_handle!(
    /// Index into [`SceneGraph::materials`](scene_graph::SceneGraph::materials).
    MaterialRef
);
index_handle!(
    /// Index into [`SceneGraph::meshes`](scene_graph::SceneGraph::meshes).
    MeshRef
);
index_handle!(
    /// Index into [`SceneGraph::nodes`](scene_graph::SceneGraph::nodes).
    NodeRef
);
index_handle!(
    /// Index into [`SceneGraph::scenes`](scene_graph::SceneGraph::scenes).
    SceneRef
);
