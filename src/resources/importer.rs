//! glTF 2.0 import into a [`SceneGraph`].
//!
//! Import runs in dependency order: buffers, images, samplers, textures,
//! materials, meshes, nodes and finally scenes, each step resolving the
//! previous steps' source indices through the maps kept in [`GltfImport`].
//! Mesh attributes are re-packed on the CPU into one buffer per mesh. Any
//! failure rolls the graph back to where it was before the import started.

use std::path::Path;

use cgmath::Matrix4;
use gltf::{
    Semantic,
    accessor::{DataType, Dimensions},
    camera::Projection,
    khr_lights_punctual::Kind,
    mesh::{Mode, util::ReadIndices},
    texture::{MagFilter, MinFilter, WrappingMode},
};

use crate::{
    data_structures::{
        BufferRef, ImageRef, MaterialRef, MeshRef, NodeRef, SamplerRef, SceneRef, TextureRef,
        buffer::BufferView,
        format::Format,
        instance::Transform,
        material::{Material, NUM_TEXTURE_SLOTS, TexCoordTransform, TextureSlot},
        scene_graph::{
            CameraParams, LightKind, LightParams, MAX_IMAGES, MAX_MATERIALS, MAX_SAMPLERS, Mesh,
            NodeType, PrimitiveBatch, SceneGraph, SceneNode,
        },
        texture::{AddressMode, FilterMode, SamplerDesc},
    },
    error::{Error, ErrorKind, Result},
    resources::{ImportOptions, resolve_uri, texture::decode_bitmap},
};

/// Where each source element of an imported file ended up in the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GltfImport {
    pub buffers: Vec<BufferRef>,
    pub images: Vec<ImageRef>,
    pub samplers: Vec<SamplerRef>,
    /// `None` where the texture had no usable image.
    pub textures: Vec<Option<TextureRef>>,
    pub materials: Vec<MaterialRef>,
    /// `None` where the mesh had no triangle primitives.
    pub meshes: Vec<Option<MeshRef>>,
    pub nodes: Vec<NodeRef>,
    pub scenes: Vec<SceneRef>,
    pub default_scene: Option<SceneRef>,
    /// Material assigned to primitives that declare none.
    pub default_material: Option<MaterialRef>,
}

/// Imports a `.gltf` or `.glb` held in memory. On error the graph is left as
/// it was before the call.
pub fn import_gltf_slice(
    graph: &mut SceneGraph,
    bytes: &[u8],
    options: &ImportOptions,
) -> Result<GltfImport> {
    if graph.defaults().is_none() {
        return Err(Error::invalid("scene graph defaults must be initialized before importing"));
    }
    let checkpoint = graph.checkpoint();
    let had_material_buffer = graph.material_buffer().is_some();

    let result = Importer {
        graph: &mut *graph,
        options,
        import: GltfImport::default(),
    }
    .run(bytes);

    if let Err(err) = &result {
        log::warn!("glTF import failed, rolling back: {err}");
        graph.rollback(checkpoint);
        if had_material_buffer && graph.material_buffer().is_none() {
            if let Err(err) = graph.initialize_resources() {
                log::error!("Could not restore the material buffer after rollback: {err}");
            }
        }
    }
    result
}

struct Importer<'g, 'o> {
    graph: &'g mut SceneGraph,
    options: &'o ImportOptions,
    import: GltfImport,
}

/// Index data of one primitive in its source component type.
enum Indices {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    fn len(&self) -> usize {
        match self {
            Indices::U8(v) => v.len(),
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    fn max(&self) -> Option<u32> {
        match self {
            Indices::U8(v) => v.iter().max().map(|i| *i as u32),
            Indices::U16(v) => v.iter().max().map(|i| *i as u32),
            Indices::U32(v) => v.iter().max().copied(),
        }
    }

    fn format(&self) -> Format {
        match self {
            Indices::U8(_) => Format::R8Uint,
            Indices::U16(_) => Format::R16Uint,
            Indices::U32(_) => Format::R32Uint,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Indices::U8(v) => v,
            Indices::U16(v) => bytemuck::cast_slice(v),
            Indices::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Vertex streams of one primitive after reading and validation.
struct PrimitiveData {
    material: Option<usize>,
    indices: Indices,
    positions: Vec<[f32; 3]>,
    colors: Option<Vec<[f32; 3]>>,
    tex_coords: Option<Vec<[f32; 2]>>,
    normals: Option<Vec<[f32; 3]>>,
    tangents: Option<Vec<[f32; 4]>>,
}

/// CPU image of a mesh buffer under construction.
#[derive(Default)]
struct Packer {
    bytes: Vec<u8>,
}

impl Packer {
    fn push(&mut self, data: &[u8], format: Format, count: usize) -> BufferView {
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(data);
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
        BufferView::new(offset, format, count as u32)
    }

    fn push_stream<T: bytemuck::Pod>(&mut self, data: Option<&Vec<T>>, format: Format) -> BufferView {
        match data {
            Some(data) => self.push(bytemuck::cast_slice(data), format, data.len()),
            None => BufferView::default(),
        }
    }
}

impl Importer<'_, '_> {
    fn run(mut self, bytes: &[u8]) -> Result<GltfImport> {
        let gltf = gltf::Gltf::from_slice(bytes)?;
        log::debug!(
            "Importing glTF: {} buffers, {} images, {} materials, {} meshes, {} nodes, {} scenes",
            gltf.buffers().len(),
            gltf.images().len(),
            gltf.materials().len(),
            gltf.meshes().len(),
            gltf.nodes().len(),
            gltf.scenes().len()
        );
        self.check_limits(&gltf)?;

        let buffer_data = self.import_buffers(&gltf)?;
        self.import_images(&gltf, &buffer_data)?;
        self.import_samplers(&gltf)?;
        self.import_textures(&gltf)?;
        self.import_materials(&gltf)?;
        self.import_meshes(&gltf, &buffer_data)?;
        self.import_nodes(&gltf)?;
        self.import_scenes(&gltf)?;

        if self.graph.materials().len() > MAX_MATERIALS {
            return Err(Error::format(format!(
                "{} materials exceed the limit of {MAX_MATERIALS}",
                self.graph.materials().len()
            )));
        }
        self.graph.initialize_resources()?;
        log::debug!("glTF import finished: {:?}", self.import);
        Ok(self.import)
    }

    fn check_limits(&self, gltf: &gltf::Gltf) -> Result<()> {
        let images = self.graph.images().len() + gltf.images().len();
        if images > MAX_IMAGES {
            return Err(Error::format(format!(
                "{images} images exceed the limit of {MAX_IMAGES}"
            )));
        }
        let materials = self.graph.materials().len() + gltf.materials().len();
        if materials > MAX_MATERIALS {
            return Err(Error::format(format!(
                "{materials} materials exceed the limit of {MAX_MATERIALS}"
            )));
        }
        Ok(())
    }

    fn base_path(&self) -> Option<&Path> {
        self.options.base_path.as_deref()
    }

    fn import_buffers(&mut self, gltf: &gltf::Gltf) -> Result<Vec<Vec<u8>>> {
        let mut buffer_data = Vec::with_capacity(gltf.buffers().len());
        for buffer in gltf.buffers() {
            let mut data = match buffer.source() {
                gltf::buffer::Source::Bin => gltf
                    .blob
                    .as_deref()
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| Error::parse("GLB file references a binary chunk it lacks"))?,
                gltf::buffer::Source::Uri(uri) => resolve_uri(uri, self.base_path())?,
            };
            if data.len() < buffer.length() {
                return Err(Error::parse(format!(
                    "buffer {} holds {} bytes, {} are declared",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                )));
            }
            // GLB chunks are padded past the declared length
            data.truncate(buffer.length());

            let name = buffer
                .name()
                .map_or_else(|| format!("buffer {}", buffer.index()), str::to_string);
            let buffer_ref = self
                .graph
                .create_buffer(name, data.len() as u64, Some(&data), false)?;
            self.import.buffers.push(buffer_ref);
            buffer_data.push(data);
        }
        Ok(buffer_data)
    }

    fn import_images(&mut self, gltf: &gltf::Gltf, buffer_data: &[Vec<u8>]) -> Result<()> {
        for image in gltf.images() {
            let bitmap = match image.source() {
                gltf::image::Source::View { view, mime_type } => {
                    let data = buffer_data
                        .get(view.buffer().index())
                        .and_then(|data| data.get(view.offset()..view.offset() + view.length()))
                        .ok_or_else(|| {
                            Error::parse(format!("image {} lies outside its buffer", image.index()))
                        })?;
                    decode_bitmap(data, Some(mime_type))?
                }
                gltf::image::Source::Uri { uri, mime_type } => {
                    let data = resolve_uri(uri, self.base_path())?;
                    decode_bitmap(&data, mime_type)?
                }
            };
            let name = image
                .name()
                .map_or_else(|| format!("image {}", image.index()), str::to_string);
            let image_ref = self.graph.create_image_from_bitmap(name, &bitmap)?;
            self.import.images.push(image_ref);
        }
        Ok(())
    }

    fn import_samplers(&mut self, gltf: &gltf::Gltf) -> Result<()> {
        for sampler in gltf.samplers() {
            let (min_filter, mag_filter, mip_filter) =
                fold_filters(sampler.min_filter(), sampler.mag_filter());
            let desc = SamplerDesc {
                min_filter,
                mag_filter,
                mip_filter,
                address_u: fold_wrap(sampler.wrap_s()),
                address_v: fold_wrap(sampler.wrap_t()),
                address_w: AddressMode::Wrap,
            };
            let name = sampler
                .name()
                .map_or_else(|| format!("sampler {}", self.import.samplers.len()), str::to_string);
            let sampler_ref = self.graph.create_sampler(name, desc)?;
            self.import.samplers.push(sampler_ref);
        }
        if self.graph.samplers().len() > MAX_SAMPLERS {
            return Err(Error::format(format!(
                "{} samplers exceed the limit of {MAX_SAMPLERS}",
                self.graph.samplers().len()
            )));
        }
        Ok(())
    }

    fn import_textures(&mut self, gltf: &gltf::Gltf) -> Result<()> {
        let default_sampler = self
            .graph
            .defaults()
            .map(|defaults| defaults.wrap_sampler)
            .ok_or_else(|| Error::invalid("scene graph defaults are not initialized"))?;
        for texture in gltf.textures() {
            let Some(image) = self.import.images.get(texture.source().index()).copied() else {
                log::warn!("Texture {} has no usable image, skipping", texture.index());
                self.import.textures.push(None);
                continue;
            };
            let sampler = texture
                .sampler()
                .index()
                .and_then(|index| self.import.samplers.get(index).copied())
                .unwrap_or(default_sampler);
            let name = texture
                .name()
                .map_or_else(|| format!("texture {}", texture.index()), str::to_string);
            let texture_ref = self.graph.add_texture(name, image, sampler)?;
            self.import.textures.push(Some(texture_ref));
        }
        Ok(())
    }

    fn texture_ref(&self, index: usize) -> Option<TextureRef> {
        self.import.textures.get(index).copied().flatten()
    }

    fn import_materials(&mut self, gltf: &gltf::Gltf) -> Result<()> {
        for material in gltf.materials() {
            let pbr = material.pbr_metallic_roughness();
            let mut textures = [None; NUM_TEXTURE_SLOTS];
            let mut slot_transforms = [None; NUM_TEXTURE_SLOTS];

            let with_transform = [
                (TextureSlot::BaseColor, pbr.base_color_texture()),
                (TextureSlot::MetallicRoughness, pbr.metallic_roughness_texture()),
                (TextureSlot::Emissive, material.emissive_texture()),
            ];
            for (slot, info) in with_transform {
                if let Some(info) = info {
                    textures[slot.index()] = self.texture_ref(info.texture().index());
                    slot_transforms[slot.index()] =
                        info.texture_transform().map(|transform| TexCoordTransform {
                            translate: transform.offset(),
                            rotate: transform.rotation(),
                            scale: transform.scale(),
                        });
                }
            }
            if let Some(normal) = material.normal_texture() {
                textures[TextureSlot::Normal.index()] = self.texture_ref(normal.texture().index());
            }
            if let Some(occlusion) = material.occlusion_texture() {
                textures[TextureSlot::Occlusion.index()] =
                    self.texture_ref(occlusion.texture().index());
            }

            let mut imported = Material {
                name: material.name().map_or_else(
                    || format!("material {}", material.index().unwrap_or_default()),
                    str::to_string,
                ),
                base_color: pbr.base_color_factor(),
                metallic: pbr.metallic_factor(),
                roughness: pbr.roughness_factor(),
                emissive: material.emissive_factor(),
                emissive_strength: material.emissive_strength().unwrap_or(1.0),
                textures,
                slot_transforms,
                ..Default::default()
            };
            imported.collapse_transforms();
            let material_ref = self.graph.add_material(imported)?;
            self.import.materials.push(material_ref);
        }
        Ok(())
    }

    fn import_meshes(&mut self, gltf: &gltf::Gltf, buffer_data: &[Vec<u8>]) -> Result<()> {
        for mesh in gltf.meshes() {
            let name = mesh
                .name()
                .map_or_else(|| format!("mesh {}", mesh.index()), str::to_string);
            let mut primitives = Vec::new();
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    log::warn!(
                        "Skipping {:?} primitive {} of mesh '{name}', only triangles are supported",
                        primitive.mode(),
                        primitive.index()
                    );
                    continue;
                }
                primitives.push(self.read_primitive(&name, &primitive, buffer_data)?);
            }
            if primitives.is_empty() {
                log::warn!("Mesh '{name}' has no triangle primitives");
                self.import.meshes.push(None);
                continue;
            }
            let mesh_ref = self.pack_mesh(name, primitives)?;
            self.import.meshes.push(Some(mesh_ref));
        }
        Ok(())
    }

    fn read_primitive(
        &self,
        mesh: &str,
        primitive: &gltf::Primitive,
        buffer_data: &[Vec<u8>],
    ) -> Result<PrimitiveData> {
        let context = format!("mesh '{mesh}' primitive {}", primitive.index());
        let position = primitive
            .get(&Semantic::Positions)
            .ok_or_else(|| Error::format(format!("{context} has no POSITION")))?;
        expect_layout(&context, "POSITION", &position, &[Dimensions::Vec3])?;
        if let Some(indices) = primitive.indices() {
            if indices.dimensions() != Dimensions::Scalar
                || !matches!(indices.data_type(), DataType::U8 | DataType::U16 | DataType::U32)
            {
                return Err(Error::format(format!(
                    "{context} has {:?} {:?} indices",
                    indices.dimensions(),
                    indices.data_type()
                )));
            }
        }
        let mut truncate_colors = false;
        if self.options.vertex_colors {
            if let Some(colors) = primitive.get(&Semantic::Colors(0)) {
                expect_layout(&context, "COLOR_0", &colors, &[Dimensions::Vec3, Dimensions::Vec4])?;
                truncate_colors = colors.dimensions() == Dimensions::Vec4;
            }
        }
        if self.options.tex_coords {
            if let Some(tex_coords) = primitive.get(&Semantic::TexCoords(0)) {
                expect_layout(&context, "TEXCOORD_0", &tex_coords, &[Dimensions::Vec2])?;
            }
        }
        if self.options.normals {
            if let Some(normals) = primitive.get(&Semantic::Normals) {
                expect_layout(&context, "NORMAL", &normals, &[Dimensions::Vec3])?;
            }
        }
        if self.options.tangents {
            if let Some(tangents) = primitive.get(&Semantic::Tangents) {
                expect_layout(&context, "TANGENT", &tangents, &[Dimensions::Vec4])?;
            }
        }

        let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| Error::format(format!("{context} has POSITION without data")))?
            .collect();
        if positions.is_empty() {
            return Err(Error::format(format!("{context} has no vertices")));
        }
        let vertex_count = positions.len();

        let indices = match reader.read_indices() {
            Some(ReadIndices::U8(iter)) => Indices::U8(iter.collect()),
            Some(ReadIndices::U16(iter)) => Indices::U16(iter.collect()),
            Some(ReadIndices::U32(iter)) => Indices::U32(iter.collect()),
            None => Indices::U32((0..vertex_count as u32).collect()),
        };
        if indices.max().is_some_and(|max| max as usize >= vertex_count) {
            return Err(Error::format(format!(
                "{context} indexes past its {vertex_count} vertices"
            )));
        }

        let colors = if self.options.vertex_colors {
            if truncate_colors {
                log::warn!("{context}: COLOR_0 has four components, alpha is dropped");
            }
            reader
                .read_colors(0)
                .map(|colors| colors.into_rgb_f32().collect::<Vec<_>>())
        } else {
            None
        };
        let tex_coords = if self.options.tex_coords {
            reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().collect::<Vec<_>>())
        } else {
            None
        };
        let normals = if self.options.normals {
            reader.read_normals().map(|normals| normals.collect::<Vec<_>>())
        } else {
            None
        };
        let tangents = if self.options.tangents {
            reader.read_tangents().map(|tangents| tangents.collect::<Vec<_>>())
        } else {
            None
        };

        let counts = [
            ("COLOR_0", colors.as_ref().map(Vec::len)),
            ("TEXCOORD_0", tex_coords.as_ref().map(Vec::len)),
            ("NORMAL", normals.as_ref().map(Vec::len)),
            ("TANGENT", tangents.as_ref().map(Vec::len)),
        ];
        for (attribute, count) in counts {
            if let Some(count) = count.filter(|count| *count != vertex_count) {
                return Err(Error::format(format!(
                    "{context} has {count} {attribute} values for {vertex_count} vertices"
                )));
            }
        }

        Ok(PrimitiveData {
            material: primitive.material().index(),
            indices,
            positions,
            colors,
            tex_coords,
            normals,
            tangents,
        })
    }

    /// Packs all primitives of a mesh into one buffer, uploaded through a
    /// mappable staging copy.
    fn pack_mesh(&mut self, name: String, primitives: Vec<PrimitiveData>) -> Result<MeshRef> {
        let mut packer = Packer::default();
        let mut batches = Vec::with_capacity(primitives.len());
        for data in &primitives {
            let material = match data.material {
                Some(index) => self.import.materials.get(index).copied().ok_or_else(|| {
                    Error::format(format!("mesh '{name}' refers to missing material {index}"))
                })?,
                None => self.default_material(),
            };
            let index_view = packer.push(data.indices.bytes(), data.indices.format(), data.indices.len());
            let position_view =
                packer.push_stream(Some(&data.positions), Format::Rgb32Float);
            let color_view = packer.push_stream(data.colors.as_ref(), Format::Rgb32Float);
            let tex_coord_view = packer.push_stream(data.tex_coords.as_ref(), Format::Rg32Float);
            let normal_view = packer.push_stream(data.normals.as_ref(), Format::Rgb32Float);
            let tangent_view = packer.push_stream(data.tangents.as_ref(), Format::Rgba32Float);
            batches.push(PrimitiveBatch {
                material,
                index_view,
                position_view,
                color_view,
                tex_coord_view,
                normal_view,
                tangent_view,
            });
        }

        let size = packer.bytes.len() as u64;
        let staging =
            self.graph
                .create_temporary_buffer(format!("{name} staging"), size, Some(&packer.bytes), true)?;
        let buffer = self.graph.create_buffer_from(format!("{name} buffer"), &staging, false);
        self.graph.destroy_temporary_buffer(staging);
        let buffer = buffer?;

        self.graph.add_mesh(Mesh {
            name,
            buffer,
            batches,
        })
    }

    fn default_material(&mut self) -> MaterialRef {
        if let Some(material) = self.import.default_material {
            return material;
        }
        let material = self.graph.default_material();
        self.import.default_material = Some(material);
        material
    }

    fn import_nodes(&mut self, gltf: &gltf::Gltf) -> Result<()> {
        for node in gltf.nodes() {
            let name = node
                .name()
                .map_or_else(|| format!("node {}", node.index()), str::to_string);
            let transform = match node.transform() {
                gltf::scene::Transform::Decomposed {
                    translation,
                    rotation,
                    scale,
                } => Transform::from_trs(translation, rotation, scale),
                gltf::scene::Transform::Matrix { matrix } => {
                    let (transform, skewed) = Transform::from_matrix(&Matrix4::from(matrix));
                    if skewed {
                        log::warn!("Node '{name}' has a skewed matrix, the skew is dropped");
                    }
                    transform
                }
            };

            let mesh = node
                .mesh()
                .and_then(|mesh| self.import.meshes.get(mesh.index()).copied().flatten());
            let mut scene_node = if let Some(mesh) = mesh {
                SceneNode::geometry(name, mesh, transform)
            } else if let Some(camera) = node.camera() {
                SceneNode::camera(name, camera_params(camera.projection()), transform)
            } else if let Some(light) = node.light() {
                let kind = match light.kind() {
                    Kind::Directional => LightKind::Directional,
                    Kind::Point => LightKind::Point,
                    Kind::Spot {
                        inner_cone_angle,
                        outer_cone_angle,
                    } => LightKind::Spot {
                        inner_cone_angle,
                        outer_cone_angle,
                    },
                };
                let params = LightParams {
                    kind,
                    color: light.color(),
                    intensity: light.intensity(),
                    range: light.range(),
                };
                SceneNode::light(name, params, transform)
            } else {
                SceneNode::new(name, NodeType::Locator, transform)
            };
            if scene_node.node_type == NodeType::Geometry {
                scene_node.camera = node.camera().map(|camera| camera_params(camera.projection()));
            }
            let node_ref = self.graph.add_node(scene_node, None)?;
            self.import.nodes.push(node_ref);
        }

        for node in gltf.nodes() {
            let parent = self.import.nodes[node.index()];
            for child in node.children() {
                let child = self.import.nodes[child.index()];
                self.graph
                    .attach_child(parent, child)
                    .map_err(|err| Error::format(format!("invalid node hierarchy: {err}")))?;
            }
        }
        Ok(())
    }

    fn import_scenes(&mut self, gltf: &gltf::Gltf) -> Result<()> {
        for scene in gltf.scenes() {
            let name = scene
                .name()
                .map_or_else(|| format!("scene {}", scene.index()), str::to_string);
            let roots: Vec<NodeRef> = scene.nodes().map(|node| self.import.nodes[node.index()]).collect();
            let scene_ref = self.graph.add_scene(name, &roots).map_err(|err| match err.kind() {
                ErrorKind::InvalidArgument => Error::format(err.to_string()),
                _ => err,
            })?;
            self.import.scenes.push(scene_ref);
        }
        self.import.default_scene = gltf
            .default_scene()
            .map(|scene| self.import.scenes[scene.index()])
            .or_else(|| self.import.scenes.first().copied());
        if self.import.default_scene.is_some() {
            self.graph.set_default_scene(self.import.default_scene);
        }
        Ok(())
    }
}

fn expect_layout(
    context: &str,
    attribute: &str,
    accessor: &gltf::Accessor,
    dimensions: &[Dimensions],
) -> Result<()> {
    if accessor.data_type() != DataType::F32 || !dimensions.contains(&accessor.dimensions()) {
        return Err(Error::format(format!(
            "{context} has {attribute} as {:?} {:?}",
            accessor.dimensions(),
            accessor.data_type()
        )));
    }
    Ok(())
}

fn camera_params(projection: Projection) -> CameraParams {
    match projection {
        Projection::Perspective(perspective) => CameraParams::Perspective {
            yfov: perspective.yfov(),
            aspect_ratio: perspective.aspect_ratio(),
            znear: perspective.znear(),
            zfar: perspective.zfar(),
        },
        Projection::Orthographic(orthographic) => CameraParams::Orthographic {
            xmag: orthographic.xmag(),
            ymag: orthographic.ymag(),
            znear: orthographic.znear(),
            zfar: orthographic.zfar(),
        },
    }
}

/// Folds glTF filters into min, mag and mip filter. The mip filter comes from
/// the `_MIPMAP_*` suffix of the min filter.
fn fold_filters(
    min: Option<MinFilter>,
    mag: Option<MagFilter>,
) -> (FilterMode, FilterMode, FilterMode) {
    let mag = match mag {
        Some(MagFilter::Nearest) => FilterMode::Nearest,
        Some(MagFilter::Linear) | None => FilterMode::Linear,
    };
    let (min, mip) = match min {
        Some(MinFilter::Nearest) => (FilterMode::Nearest, FilterMode::Nearest),
        Some(MinFilter::Linear) | None => (FilterMode::Linear, FilterMode::Linear),
        Some(MinFilter::NearestMipmapNearest) => (FilterMode::Nearest, FilterMode::Nearest),
        Some(MinFilter::LinearMipmapNearest) => (FilterMode::Linear, FilterMode::Nearest),
        Some(MinFilter::NearestMipmapLinear) => (FilterMode::Nearest, FilterMode::Linear),
        Some(MinFilter::LinearMipmapLinear) => (FilterMode::Linear, FilterMode::Linear),
    };
    (min, mag, mip)
}

fn fold_wrap(mode: WrappingMode) -> AddressMode {
    match mode {
        WrappingMode::ClampToEdge => AddressMode::Clamp,
        WrappingMode::MirroredRepeat => AddressMode::Mirror,
        WrappingMode::Repeat => AddressMode::Wrap,
    }
}
