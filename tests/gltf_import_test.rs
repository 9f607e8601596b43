mod common;

use base64::Engine;
use common::test_utils::*;
use faux_render::{
    ErrorKind, ImportOptions, SceneGraph, import_gltf_slice, load_scene_gltf,
    backend::memory::MemoryBackend,
    data_structures::{
        MaterialRef, NodeRef, SceneRef,
        buffer::BufferView,
        format::Format,
        instance::{InstanceRaw, Transform},
        material::{Material, MaterialParams, TextureSlot},
        scene_graph::{LightKind, NodeType},
        texture::{AddressMode, FilterMode},
    },
};
use serde_json::json;

/// Allocations `initialize_defaults` makes: five images, two samplers.
const DEFAULT_ALLOCATIONS: usize = 7;

fn read_material_params(graph: &SceneGraph) -> Vec<MaterialParams> {
    let buffer = graph.material_buffer().expect("no material buffer");
    let bytes = graph.factory().read_buffer(buffer.resource).unwrap();
    bytes
        .chunks_exact(std::mem::size_of::<MaterialParams>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

#[test]
fn imports_minimal_triangle() {
    let (mut graph, _) = new_graph();
    let import = import_gltf_slice(&mut graph, &triangle_glb(), &ImportOptions::default()).unwrap();

    assert_eq!(graph.scenes().len(), 1);
    let scene = &graph.scenes()[0];
    assert_eq!(scene.geometry_nodes.len(), 1);
    assert_eq!(graph.default_scene(), import.default_scene);

    let node = graph.node(scene.geometry_nodes[0]).unwrap();
    assert_eq!(node.node_type, NodeType::Geometry);
    let mesh = graph.mesh(node.mesh.unwrap()).unwrap();
    assert_eq!(mesh.batches.len(), 1);
    let batch = &mesh.batches[0];
    assert_eq!(batch.index_view.count, 3);
    assert_eq!(batch.index_view.format, Format::R16Uint);
    assert_eq!(batch.position_view.count, 3);
    assert_eq!(batch.position_view.format, Format::Rgb32Float);
    assert!(!batch.tex_coord_view.is_present());

    assert_eq!(import.default_material, Some(MaterialRef(0)));
    assert_eq!(graph.material_index(batch.material), 0);
    assert_eq!(graph.materials()[0], Material::default());
    graph.validate().unwrap();
}

#[test]
fn mesh_buffer_holds_packed_streams() {
    let (mut graph, _) = new_graph();
    import_gltf_slice(&mut graph, &triangle_glb(), &ImportOptions::default()).unwrap();

    let mesh = &graph.meshes()[0];
    let bytes = graph.read_buffer(mesh.buffer).unwrap();
    let batch = &mesh.batches[0];

    let index_bytes = &bytes[batch.index_view.offset as usize..][..batch.index_view.size as usize];
    let indices: Vec<u16> = index_bytes
        .chunks_exact(2)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);

    assert_eq!(batch.position_view.offset % 4, 0);
    let position_bytes =
        &bytes[batch.position_view.offset as usize..][..batch.position_view.size as usize];
    let positions: Vec<[f32; 3]> = position_bytes
        .chunks_exact(12)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    assert_eq!(positions, TRIANGLE.to_vec());

    // the mesh buffer is device-local
    assert!(!graph.buffers()[mesh.buffer.index()].mappable);
}

#[test]
fn imports_textured_cube() {
    let (mut graph, stats) = new_graph();
    let import =
        import_gltf_slice(&mut graph, &textured_cube_glb(None), &ImportOptions::default()).unwrap();

    assert_eq!(import.images.len(), 1);
    let image = graph.image(import.images[0]).unwrap();
    assert_eq!((image.width, image.height), (2, 2));
    assert_eq!(image.format, Format::Rgba8Unorm);

    let batch = &graph.meshes()[0].batches[0];
    assert_eq!(batch.position_view.count, 24);
    assert_eq!(batch.tex_coord_view.count, 24);
    assert_eq!(batch.index_view.count, 36);

    let material = graph.material(batch.material).unwrap();
    assert_eq!(material.flags(), TextureSlot::BaseColor.flag());
    assert_eq!(material.flags() & 0b10, 0b10);
    let texture = graph.texture(material.texture(TextureSlot::BaseColor).unwrap()).unwrap();
    assert_eq!(texture.sampler, import.samplers[0]);
    let sampler = graph.sampler(texture.sampler).unwrap();
    assert_eq!(sampler.desc.mag_filter, FilterMode::Nearest);
    assert_eq!(sampler.desc.address_u, AddressMode::Clamp);

    let params = read_material_params(&graph);
    assert_eq!(params.len(), 1);
    let base_color = params[0].textures[TextureSlot::BaseColor.index()];
    assert_eq!(base_color.image, graph.image_index(import.images[0]));
    assert_eq!(base_color.sampler, graph.sampler_index(import.samplers[0]));
    assert_eq!(params[0].flags, TextureSlot::BaseColor.flag());
    assert_eq!(params[0].roughness, 0.5);

    // untextured slots still point at their defaults
    let defaults = *graph.defaults().unwrap();
    let normal = params[0].textures[TextureSlot::Normal.index()];
    assert_eq!(normal.image, graph.image_index(defaults.image(TextureSlot::Normal)));

    graph.validate().unwrap();
    // 7 defaults + source buffer, image, sampler, mesh buffer, material,
    // instance and camera buffers; the staging copy is gone
    assert_eq!(stats.live_resources(), DEFAULT_ALLOCATIONS + 7);
}

#[test]
fn base_color_transform_becomes_the_shader_transform() {
    let transform = json!({
        "extensions": {
            "KHR_texture_transform": { "offset": [0.5, 0.25], "scale": [2.0, 3.0] },
        },
    });
    let (mut graph, _) = new_graph();
    import_gltf_slice(
        &mut graph,
        &textured_cube_glb(Some(transform)),
        &ImportOptions::default(),
    )
    .unwrap();

    let material = &graph.materials()[0];
    let slot = material.slot_transforms[TextureSlot::BaseColor.index()].unwrap();
    assert_eq!(slot.translate, [0.5, 0.25]);
    assert_eq!(slot.scale, [2.0, 3.0]);
    assert_eq!(material.tex_coord_transform, slot);

    let params = read_material_params(&graph);
    assert_eq!(params[0].tc_translate, [0.5, 0.25]);
    assert_eq!(params[0].tc_scale, [2.0, 3.0]);
}

#[test]
fn deduplicates_identical_samplers() {
    let sampler = json!({ "magFilter": 9729, "minFilter": 9987, "wrapS": 10497, "wrapT": 10497 });
    let gltf = gltf_json(json!({ "samplers": [sampler.clone(), sampler] }));
    let (mut graph, _) = new_graph();
    let import = import_gltf_slice(&mut graph, &gltf, &ImportOptions::default()).unwrap();

    // two defaults plus the shared one
    assert_eq!(graph.samplers().len(), 3);
    assert_eq!(import.samplers.len(), 2);
    assert_eq!(import.samplers[0], import.samplers[1]);
    assert_eq!(
        graph.sampler_index(import.samplers[0]),
        graph.sampler_index(import.samplers[1])
    );
    let desc = graph.sampler(import.samplers[0]).unwrap().desc;
    assert_eq!(desc.mip_filter, FilterMode::Linear);
    assert_eq!(desc.address_w, AddressMode::Wrap);
}

#[test]
fn zero_materials_pack_one_default_record() {
    let (mut graph, _) = new_graph();
    import_gltf_slice(&mut graph, &gltf_json(json!({})), &ImportOptions::default()).unwrap();

    let params = read_material_params(&graph);
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].flags, 0);
    let defaults = *graph.defaults().unwrap();
    for slot in TextureSlot::ALL {
        let indices = params[0].textures[slot.index()];
        assert_eq!(indices.image, graph.image_index(defaults.image(slot)));
        assert_eq!(indices.sampler, graph.sampler_index(defaults.wrap_sampler));
        let image = graph.image(defaults.image(slot)).unwrap();
        assert_eq!((image.width, image.height), (1, 1));
    }
    assert_eq!(params[0], graph.material_params(&Material::default()).unwrap());
}

#[test]
fn failed_import_rolls_back_every_allocation() {
    init_logger();
    let glb = textured_cube_glb(None);
    // the full import allocates eight resources; fail at each of them
    for allowed in 0..8 {
        let (mut graph, stats) =
            new_graph_with(MemoryBackend::new().with_allocation_limit(DEFAULT_ALLOCATIONS + allowed));
        let before = array_lengths(&graph);

        let err = import_gltf_slice(&mut graph, &glb, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceCreate, "failing allocation {allowed}");
        assert_eq!(array_lengths(&graph), before, "failing allocation {allowed}");
        assert_eq!(stats.live_resources(), DEFAULT_ALLOCATIONS, "failing allocation {allowed}");
        assert!(graph.material_buffer().is_none());
        assert_eq!(graph.default_scene(), None);
    }

    let (mut graph, _) =
        new_graph_with(MemoryBackend::new().with_allocation_limit(DEFAULT_ALLOCATIONS + 8));
    import_gltf_slice(&mut graph, &glb, &ImportOptions::default()).unwrap();
}

#[test]
fn failed_import_drops_a_material_buffer_it_created() {
    let (mut graph, stats) =
        new_graph_with(MemoryBackend::new().with_allocation_limit(DEFAULT_ALLOCATIONS + 4));
    graph.add_material(Material::default()).unwrap();
    let before = array_lengths(&graph);

    // source, staging, mesh and material buffers fit; the instance buffer does not
    let err = import_gltf_slice(&mut graph, &triangle_glb(), &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceCreate);
    assert_eq!(array_lengths(&graph), before);
    assert!(graph.material_buffer().is_none());
    assert_eq!(stats.live_resources(), DEFAULT_ALLOCATIONS);
}

#[test]
fn failed_import_keeps_earlier_content() {
    let (mut graph, stats) = new_graph();
    import_gltf_slice(&mut graph, &triangle_glb(), &ImportOptions::default()).unwrap();
    let before = array_lengths(&graph);
    let live = stats.live_resources();

    let err = import_gltf_slice(&mut graph, b"{ not json", &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImportParse);
    assert_eq!(err.code(), -3);
    assert_eq!(array_lengths(&graph), before);
    assert_eq!(stats.live_resources(), live);
    assert!(graph.material_buffer().is_some());
    assert_eq!(graph.default_scene(), Some(SceneRef(0)));
}

#[test]
fn rejects_integer_vertex_colors() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE);
    let colors: [[u16; 4]; 3] = [[65535, 0, 0, 65535]; 3];
    let color = glb.accessor(bytemuck::cast_slice(&colors), UNSIGNED_SHORT, 3, "VEC4");
    let document = glb.build(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{ "attributes": { "POSITION": position, "COLOR_0": color } }],
        }],
    }));

    let (mut graph, stats) = new_graph();
    let before = array_lengths(&graph);
    let err = import_gltf_slice(&mut graph, &document, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImportFormat);
    assert_eq!(err.code(), -4);
    assert_eq!(array_lengths(&graph), before);
    assert_eq!(stats.live_resources(), DEFAULT_ALLOCATIONS);

    // the same file imports once vertex colours are not requested
    let options = ImportOptions {
        vertex_colors: false,
        ..Default::default()
    };
    import_gltf_slice(&mut graph, &document, &options).unwrap();
    assert!(!graph.meshes()[0].batches[0].color_view.is_present());
}

#[test]
fn rejects_out_of_range_indices() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE);
    let indices = glb.indices_u8(&[0, 1, 3]);
    let document = glb.build(json!({
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] }],
    }));

    let (mut graph, _) = new_graph();
    let err = import_gltf_slice(&mut graph, &document, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImportFormat);
    assert!(graph.meshes().is_empty());
}

#[test]
fn reads_buffers_from_data_uris() {
    let payload =
        base64::engine::general_purpose::STANDARD.encode(bytemuck::cast_slice::<_, u8>(&TRIANGLE));
    let gltf = gltf_json(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "accessors": [{
            "bufferView": 0,
            "componentType": FLOAT,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0],
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "buffers": [{
            "byteLength": 36,
            "uri": format!("data:application/octet-stream;base64,{payload}"),
        }],
    }));

    let (mut graph, _) = new_graph();
    let import = import_gltf_slice(&mut graph, &gltf, &ImportOptions::default()).unwrap();
    assert_eq!(import.buffers.len(), 1);
    assert_eq!(graph.read_buffer(import.buffers[0]).unwrap(), bytemuck::cast_slice::<_, u8>(&TRIANGLE));

    // non-indexed primitives get sequential 32-bit indices
    let batch = &graph.meshes()[0].batches[0];
    assert_eq!(batch.index_view.format, Format::R32Uint);
    assert_eq!(batch.index_view.count, 3);
    let bytes = graph.read_buffer(graph.meshes()[0].buffer).unwrap();
    let indices: Vec<u32> = bytes[batch.index_view.offset as usize..][..12]
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn loads_gltf_with_external_buffer() {
    init_logger();
    let dir = std::env::temp_dir().join(format!("faux-render-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("tri angle.bin"), bytemuck::cast_slice::<_, u8>(&TRIANGLE)).unwrap();
    let gltf = gltf_json(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "accessors": [{
            "bufferView": 0,
            "componentType": FLOAT,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0],
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "buffers": [{ "byteLength": 36, "uri": "tri%20angle.bin" }],
    }));
    let path = dir.join("triangle.gltf");
    std::fs::write(&path, gltf).unwrap();

    let (mut graph, _) = new_graph();
    let import = load_scene_gltf(&mut graph, &path, &ImportOptions::default()).unwrap();
    assert_eq!(import.meshes.len(), 1);
    // no "scene" property: the first scene becomes the default
    assert_eq!(import.default_scene, Some(import.scenes[0]));

    let missing = load_scene_gltf(&mut graph, dir.join("missing.gltf"), &ImportOptions::default());
    assert!(missing.is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn classifies_cameras_and_lights() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE);
    let document = glb.build(json!({
        "extensionsUsed": ["KHR_lights_punctual"],
        "extensions": {
            "KHR_lights_punctual": {
                "lights": [{ "type": "point", "color": [1.0, 0.5, 0.25], "intensity": 2.0 }],
            },
        },
        "scene": 0,
        "scenes": [{ "nodes": [0, 2, 3] }],
        "nodes": [
            { "name": "body", "mesh": 0, "translation": [1.0, 0.0, 0.0], "children": [1] },
            { "name": "eye", "camera": 0, "translation": [0.0, 2.0, 0.0] },
            { "name": "lamp", "extensions": { "KHR_lights_punctual": { "light": 0 } } },
            { "name": "anchor" },
        ],
        "cameras": [{ "type": "perspective", "perspective": { "yfov": 0.8, "znear": 0.1 } }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": position } }] }],
    }));

    let (mut graph, _) = new_graph();
    let import = import_gltf_slice(&mut graph, &document, &ImportOptions::default()).unwrap();
    let types: Vec<NodeType> = import
        .nodes
        .iter()
        .map(|node| graph.node(*node).unwrap().node_type)
        .collect();
    assert_eq!(
        types,
        vec![NodeType::Geometry, NodeType::Camera, NodeType::Light, NodeType::Locator]
    );

    let scene = graph.scene(import.scenes[0]).unwrap();
    assert_eq!(scene.nodes, import.nodes);
    assert_eq!(scene.geometry_nodes, vec![import.nodes[0]]);
    assert_eq!(scene.active_camera, Some(import.nodes[1]));

    let eye = graph.node(import.nodes[1]).unwrap();
    assert_eq!(eye.parent, Some(import.nodes[0]));
    let world = eye.world_matrix();
    assert_eq!([world.w.x, world.w.y, world.w.z], [1.0, 2.0, 0.0]);

    let light = graph.node(import.nodes[2]).unwrap().light.unwrap();
    assert_eq!(light.kind, LightKind::Point);
    assert_eq!(light.intensity, 2.0);
    assert_eq!(light.color, [1.0, 0.5, 0.25]);

    let args = graph.camera_args(import.scenes[0], 1.5).unwrap();
    assert_eq!(args.position, [1.0, 2.0, 0.0, 1.0]);
    graph.write_camera_args(import.scenes[0], &args).unwrap();
    graph.validate().unwrap();
}

#[test]
fn skips_non_triangle_primitives() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE[..2]);
    let document = glb.build(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": position }, "mode": 1 }] }],
    }));

    let (mut graph, _) = new_graph();
    let import = import_gltf_slice(&mut graph, &document, &ImportOptions::default()).unwrap();
    assert_eq!(import.meshes, vec![None]);
    assert!(graph.meshes().is_empty());
    assert_eq!(graph.node(import.nodes[0]).unwrap().node_type, NodeType::Locator);
    assert_eq!(graph.scenes()[0].num_instances(), 0);
}

#[test]
fn draw_list_covers_every_node_and_batch() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE);
    let indices = glb.indices_u16(&[0, 1, 2]);
    let document = glb.build(json!({
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [
            { "mesh": 0 },
            { "mesh": 0, "translation": [0.0, 0.0, -5.0] },
        ],
        "meshes": [{
            "primitives": [
                { "attributes": { "POSITION": position }, "indices": indices },
                { "attributes": { "POSITION": position }, "indices": indices, "material": 0 },
            ],
        }],
        "materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] } }],
    }));

    let (mut graph, _) = new_graph();
    let import = import_gltf_slice(&mut graph, &document, &ImportOptions::default()).unwrap();
    let scene = import.scenes[0];

    let items = graph.draw_list(scene);
    let summary: Vec<(u32, u32, u32)> = items
        .iter()
        .map(|item| (item.instance_index, item.batch_index, item.material_index))
        .collect();
    // the imported material comes first, the default one is added for batch 0
    assert_eq!(summary, vec![(0, 0, 1), (0, 1, 0), (1, 0, 1), (1, 1, 0)]);
    assert_eq!(graph.geometry_node_index(scene, import.nodes[1]), 1);

    let instance_buffer = graph.scene(scene).unwrap().instance_buffer.clone().unwrap();
    let stride = std::mem::size_of::<InstanceRaw>();
    let read_second = |graph: &SceneGraph| -> [[f32; 4]; 4] {
        let bytes = graph.factory().read_buffer(instance_buffer.resource).unwrap();
        let raw: InstanceRaw = bytemuck::pod_read_unaligned(&bytes[stride..2 * stride]);
        raw.model
    };
    assert_eq!(read_second(&graph)[3], [0.0, 0.0, -5.0, 1.0]);

    let moved = Transform::from_trs([2.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0]);
    graph.set_node_transform(import.nodes[1], moved).unwrap();
    graph.write_instances(scene).unwrap();
    assert_eq!(read_second(&graph)[3], [2.0, 0.0, 0.0, 1.0]);
}

#[test]
fn repeated_imports_share_the_default_material() {
    let (mut graph, _) = new_graph();
    let first = import_gltf_slice(&mut graph, &triangle_glb(), &ImportOptions::default()).unwrap();
    let second = import_gltf_slice(&mut graph, &triangle_glb(), &ImportOptions::default()).unwrap();

    assert_eq!(first.default_material, second.default_material);
    assert_eq!(graph.materials().len(), 1);
    assert_eq!(graph.scenes().len(), 2);
    assert_eq!(second.nodes, vec![NodeRef(1)]);
    assert_eq!(read_material_params(&graph).len(), 1);
    graph.validate().unwrap();
}

#[test]
fn import_requires_defaults() {
    init_logger();
    let mut graph = SceneGraph::new(Box::new(MemoryBackend::new()));
    let err = import_gltf_slice(&mut graph, &triangle_glb(), &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

fn read_stream<T: bytemuck::Pod>(graph: &SceneGraph, view: &BufferView) -> Vec<T> {
    let bytes = graph.read_buffer(graph.meshes()[0].buffer).unwrap();
    bytes[view.offset as usize..][..view.size as usize]
        .chunks_exact(view.stride as usize)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

fn shaded_triangle_glb() -> Vec<u8> {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE);
    let normal = glb.vec3(&[[0.0, 0.0, 1.0]; 3]);
    let tangent = glb.vec4(&[[1.0, 0.0, 0.0, -1.0]; 3]);
    let tex_coord = glb.vec2(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
    let color = glb.vec4(&[
        [1.0, 0.0, 0.0, 0.5],
        [0.0, 1.0, 0.0, 0.5],
        [0.0, 0.0, 1.0, 0.5],
    ]);
    glb.build(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": {
                    "POSITION": position,
                    "NORMAL": normal,
                    "TANGENT": tangent,
                    "TEXCOORD_0": tex_coord,
                    "COLOR_0": color,
                },
            }],
        }],
    }))
}

#[test]
fn normals_and_tangents_keep_their_layout() {
    let (mut graph, _) = new_graph();
    import_gltf_slice(&mut graph, &shaded_triangle_glb(), &ImportOptions::default()).unwrap();
    let batch = graph.meshes()[0].batches[0].clone();

    assert_eq!(batch.normal_view.format, Format::Rgb32Float);
    assert_eq!(batch.normal_view.count, 3);
    let normals: Vec<[f32; 3]> = read_stream(&graph, &batch.normal_view);
    assert_eq!(normals, vec![[0.0, 0.0, 1.0]; 3]);

    assert_eq!(batch.tangent_view.format, Format::Rgba32Float);
    assert_eq!(batch.tangent_view.count, 3);
    let tangents: Vec<[f32; 4]> = read_stream(&graph, &batch.tangent_view);
    assert_eq!(tangents, vec![[1.0, 0.0, 0.0, -1.0]; 3]);
}

#[test]
fn four_component_colors_lose_alpha() {
    let (mut graph, _) = new_graph();
    import_gltf_slice(&mut graph, &shaded_triangle_glb(), &ImportOptions::default()).unwrap();
    let batch = graph.meshes()[0].batches[0].clone();

    assert_eq!(batch.color_view.format, Format::Rgb32Float);
    assert_eq!(batch.color_view.count, 3);
    assert_eq!(batch.color_view.size, 3 * 12);
    let colors: Vec<[f32; 3]> = read_stream(&graph, &batch.color_view);
    assert_eq!(colors, vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
}

#[test]
fn disabled_streams_are_left_out() {
    let (mut graph, _) = new_graph();
    let options = ImportOptions {
        normals: false,
        tangents: false,
        tex_coords: false,
        ..Default::default()
    };
    import_gltf_slice(&mut graph, &shaded_triangle_glb(), &options).unwrap();
    let batch = &graph.meshes()[0].batches[0];

    assert_eq!(batch.normal_view.format, Format::Unknown);
    assert_eq!(batch.tangent_view.format, Format::Unknown);
    assert_eq!(batch.tex_coord_view.format, Format::Unknown);
    assert!(!batch.normal_view.is_present());
    assert_eq!(batch.color_view.format, Format::Rgb32Float);
    assert_eq!(batch.position_view.count, 3);
}

#[test]
fn matrix_nodes_are_split_into_trs() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&TRIANGLE);
    // column-major: uniform scale 2, a quarter turn about +Z, then (1, 2, 3)
    let document = glb.build(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{
            "mesh": 0,
            "matrix": [
                0.0, 2.0, 0.0, 0.0,
                -2.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 2.0, 0.0,
                1.0, 2.0, 3.0, 1.0,
            ],
        }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": position } }] }],
    }));

    let (mut graph, _) = new_graph();
    let import = import_gltf_slice(&mut graph, &document, &ImportOptions::default()).unwrap();
    let transform = graph.node(import.nodes[0]).unwrap().transform;
    let close = |a: f32, b: f32| (a - b).abs() < 1e-4;

    let t = transform.translation;
    assert!(close(t.x, 1.0) && close(t.y, 2.0) && close(t.z, 3.0), "{t:?}");
    let s = transform.scale;
    assert!(close(s.x, 2.0) && close(s.y, 2.0) && close(s.z, 2.0), "{s:?}");

    // stored x, y, z, w; q and -q are the same rotation
    let half = std::f32::consts::FRAC_1_SQRT_2;
    let mut q = transform.rotation_xyzw();
    if q[3] < 0.0 {
        q = q.map(|c| -c);
    }
    assert!(close(q[0], 0.0) && close(q[1], 0.0), "{q:?}");
    assert!(close(q[2], half) && close(q[3], half), "{q:?}");
}
