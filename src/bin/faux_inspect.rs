//! Imports a glTF file into the in-memory backend and logs what ended up in
//! the scene graph.
//!
//! Usage: `faux_inspect <file.gltf|file.glb>` (set `RUST_LOG=debug` for the
//! import trace).

use std::env;

use anyhow::Context;
use faux_render::{
    ImportOptions, SceneGraph, backend::memory::MemoryBackend, load_scene_gltf,
};

pub fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .context("usage: faux_inspect <file.gltf|file.glb>")?;

    let backend = MemoryBackend::new();
    let stats = backend.stats();
    let mut graph = SceneGraph::new(Box::new(backend));
    graph.initialize_defaults()?;
    let import = load_scene_gltf(&mut graph, path, &ImportOptions::default())?;

    log::info!(
        "{path}: {} buffers, {} images, {} samplers, {} textures, {} materials, {} meshes, {} nodes, {} scenes",
        import.buffers.len(),
        import.images.len(),
        import.samplers.len(),
        import.textures.len(),
        import.materials.len(),
        import.meshes.len(),
        import.nodes.len(),
        import.scenes.len()
    );
    for scene_ref in &import.scenes {
        let Some(scene) = graph.scene(*scene_ref) else {
            continue;
        };
        let camera = scene
            .active_camera
            .and_then(|node| graph.node(node))
            .map_or("none", |node| node.name.as_str());
        log::info!(
            "scene '{}'{}: {} nodes, {} instances, {} draws, camera {camera}",
            scene.name,
            if import.default_scene == Some(*scene_ref) {
                " (default)"
            } else {
                ""
            },
            scene.nodes.len(),
            scene.num_instances(),
            graph.draw_list(*scene_ref).len()
        );
    }
    for mesh in graph.meshes() {
        let indices: u32 = mesh.batches.iter().map(|batch| batch.index_view.count).sum();
        log::info!(
            "mesh '{}': {} batches, {indices} indices",
            mesh.name,
            mesh.batches.len()
        );
    }
    log::info!(
        "backend holds {} buffers, {} images, {} samplers",
        stats.live_buffers(),
        stats.live_images(),
        stats.live_samplers()
    );

    Ok(())
}
