//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneGraph`] owns every entity of the loaded content by composition:
//! buffers, images, samplers, textures, materials, meshes, nodes and scenes.
//! Entities refer to each other by index handles, so the arrays may grow
//! without invalidating anything. GPU resources are created through the
//! [`ResourceFactory`] handed in at construction and released when the graph
//! is dropped.
//!
//! The order of `materials`, `images`, `samplers` and of each scene's
//! `geometry_nodes` is the order shaders index their flat arrays in.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    backend::{BufferId, ImageDesc, ResourceFactory},
    data_structures::{
        BufferRef, INVALID_INDEX, ImageRef, MaterialRef, MeshRef, NodeRef, SamplerRef, SceneRef,
        TextureRef,
        buffer::{Buffer, BufferView},
        format::Format,
        instance::{InstanceRaw, Transform},
        material::{Material, MaterialParams, NUM_TEXTURE_SLOTS, TextureIndices, TextureSlot},
        texture::{
            AddressMode, Bitmap, DefaultImage, FilterMode, Image, MipOffset, Sampler, SamplerDesc,
            Texture, max_mip_levels, mip_extent,
        },
    },
    error::{Error, Result},
};

pub const MAX_INSTANCES: usize = 100;
pub const MAX_MATERIALS: usize = 100;
pub const MAX_SAMPLERS: usize = 32;
pub const MAX_IMAGES: usize = 1024;

/// Samplers created by [`SceneGraph::initialize_defaults`]; they lead the
/// sampler array and are never deduplicated against.
pub const NUM_DEFAULT_SAMPLERS: usize = 2;

/// One draw call worth of geometry inside a mesh's backing buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveBatch {
    pub material: MaterialRef,
    pub index_view: BufferView,
    pub position_view: BufferView,
    pub color_view: BufferView,
    pub tex_coord_view: BufferView,
    pub normal_view: BufferView,
    pub tangent_view: BufferView,
}

impl PrimitiveBatch {
    fn views(&self) -> [&BufferView; 6] {
        [
            &self.index_view,
            &self.position_view,
            &self.color_view,
            &self.tex_coord_view,
            &self.normal_view,
            &self.tangent_view,
        ]
    }
}

/// Batches sharing one backing buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub buffer: BufferRef,
    pub batches: Vec<PrimitiveBatch>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Geometry,
    Camera,
    Light,
    Locator,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraParams {
    Perspective {
        yfov: f32,
        aspect_ratio: Option<f32>,
        znear: f32,
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

impl CameraParams {
    /// Projection matrix; `aspect` is used when the camera does not fix one.
    pub fn projection(&self, aspect: f32) -> Matrix4<f32> {
        match *self {
            CameraParams::Perspective {
                yfov,
                aspect_ratio,
                znear,
                zfar,
            } => {
                let aspect = aspect_ratio.unwrap_or(aspect);
                match zfar {
                    Some(zfar) => cgmath::perspective(cgmath::Rad(yfov), aspect, znear, zfar),
                    None => {
                        // infinite far plane, as glTF defines it
                        let f = 1.0 / (yfov * 0.5).tan();
                        Matrix4::new(
                            f / aspect, 0.0, 0.0, 0.0,
                            0.0, f, 0.0, 0.0,
                            0.0, 0.0, -1.0, -1.0,
                            0.0, 0.0, -2.0 * znear, 0.0,
                        )
                    }
                }
            }
            CameraParams::Orthographic {
                xmag,
                ymag,
                znear,
                zfar,
            } => cgmath::ortho(-xmag, xmag, -ymag, ymag, znear, zfar),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot {
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightParams {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub range: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub node_type: NodeType,
    pub parent: Option<NodeRef>,
    pub children: Vec<NodeRef>,
    pub mesh: Option<MeshRef>,
    pub transform: Transform,
    pub camera: Option<CameraParams>,
    pub light: Option<LightParams>,
    world: Matrix4<f32>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, node_type: NodeType, transform: Transform) -> Self {
        Self {
            name: name.into(),
            node_type,
            parent: None,
            children: Vec::new(),
            mesh: None,
            transform,
            camera: None,
            light: None,
            world: transform.to_matrix(),
        }
    }

    pub fn geometry(name: impl Into<String>, mesh: MeshRef, transform: Transform) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::new(name, NodeType::Geometry, transform)
        }
    }

    pub fn camera(name: impl Into<String>, camera: CameraParams, transform: Transform) -> Self {
        Self {
            camera: Some(camera),
            ..Self::new(name, NodeType::Camera, transform)
        }
    }

    pub fn light(name: impl Into<String>, light: LightParams, transform: Transform) -> Self {
        Self {
            light: Some(light),
            ..Self::new(name, NodeType::Light, transform)
        }
    }

    /// World matrix as of the last transform update.
    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn is_drawable(&self) -> bool {
        self.node_type == NodeType::Geometry && self.mesh.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Scene {
    pub name: String,
    /// Every node reachable from the scene roots, in pre-order.
    pub nodes: Vec<NodeRef>,
    /// The drawable subset of `nodes`; position = instance index.
    pub geometry_nodes: Vec<NodeRef>,
    pub active_camera: Option<NodeRef>,
    pub instance_buffer: Option<Buffer>,
    pub camera_args_buffer: Option<Buffer>,
}

impl Scene {
    pub fn num_instances(&self) -> u32 {
        self.geometry_nodes.len() as u32
    }
}

/// Per-frame camera constants, as laid out in a scene's camera buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraArgs {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub position: [f32; 4],
}

impl CameraArgs {
    pub fn new(world: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        let view = world.invert().unwrap_or_else(Matrix4::identity);
        Self {
            view: view.into(),
            projection: projection.into(),
            view_projection: (projection * view).into(),
            position: world.w.into(),
        }
    }
}

/// What a backend needs to issue one draw of a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawItem {
    pub node: NodeRef,
    pub instance_index: u32,
    pub mesh: MeshRef,
    pub batch_index: u32,
    pub material_index: u32,
}

/// Resources created by [`SceneGraph::initialize_defaults`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Defaults {
    pub images: [ImageRef; NUM_TEXTURE_SLOTS],
    pub clamp_sampler: SamplerRef,
    pub wrap_sampler: SamplerRef,
}

impl Defaults {
    pub fn image(&self, slot: TextureSlot) -> ImageRef {
        self.images[slot.index()]
    }
}

/// Array lengths at a point in time; used to undo an aborted import.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Checkpoint {
    buffers: usize,
    images: usize,
    samplers: usize,
    textures: usize,
    materials: usize,
    meshes: usize,
    nodes: usize,
    scenes: usize,
    default_scene: Option<SceneRef>,
    material_buffer: Option<BufferId>,
}

pub struct SceneGraph {
    factory: Box<dyn ResourceFactory>,
    pub(crate) buffers: Vec<Buffer>,
    pub(crate) images: Vec<Image>,
    pub(crate) samplers: Vec<Sampler>,
    pub(crate) textures: Vec<Texture>,
    pub(crate) materials: Vec<Material>,
    pub(crate) meshes: Vec<Mesh>,
    pub(crate) nodes: Vec<SceneNode>,
    pub(crate) scenes: Vec<Scene>,
    pub(crate) default_scene: Option<SceneRef>,
    defaults: Option<Defaults>,
    material_buffer: Option<Buffer>,
}

impl SceneGraph {
    pub fn new(factory: Box<dyn ResourceFactory>) -> Self {
        Self {
            factory,
            buffers: Vec::new(),
            images: Vec::new(),
            samplers: Vec::new(),
            textures: Vec::new(),
            materials: Vec::new(),
            meshes: Vec::new(),
            nodes: Vec::new(),
            scenes: Vec::new(),
            default_scene: None,
            defaults: None,
            material_buffer: None,
        }
    }

    pub fn factory(&self) -> &dyn ResourceFactory {
        self.factory.as_ref()
    }

    pub fn factory_mut(&mut self) -> &mut dyn ResourceFactory {
        self.factory.as_mut()
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn buffer(&self, buffer: BufferRef) -> Option<&Buffer> {
        self.buffers.get(buffer.index())
    }

    pub fn image(&self, image: ImageRef) -> Option<&Image> {
        self.images.get(image.index())
    }

    pub fn sampler(&self, sampler: SamplerRef) -> Option<&Sampler> {
        self.samplers.get(sampler.index())
    }

    pub fn texture(&self, texture: TextureRef) -> Option<&Texture> {
        self.textures.get(texture.index())
    }

    pub fn material(&self, material: MaterialRef) -> Option<&Material> {
        self.materials.get(material.index())
    }

    pub fn mesh(&self, mesh: MeshRef) -> Option<&Mesh> {
        self.meshes.get(mesh.index())
    }

    pub fn node(&self, node: NodeRef) -> Option<&SceneNode> {
        self.nodes.get(node.index())
    }

    pub fn scene(&self, scene: SceneRef) -> Option<&Scene> {
        self.scenes.get(scene.index())
    }

    pub fn default_scene(&self) -> Option<SceneRef> {
        self.default_scene
    }

    pub fn defaults(&self) -> Option<&Defaults> {
        self.defaults.as_ref()
    }

    pub fn material_buffer(&self) -> Option<&Buffer> {
        self.material_buffer.as_ref()
    }

    /// Creates the five per-slot 1×1 default images and the clamp/linear and
    /// wrap/linear default samplers. Must run once, before anything is imported.
    pub fn initialize_defaults(&mut self) -> Result<()> {
        if self.defaults.is_some() {
            return Err(Error::invalid("scene graph defaults are already initialized"));
        }
        if !self.images.is_empty() || !self.samplers.is_empty() {
            return Err(Error::invalid(
                "scene graph defaults must be created before any image or sampler",
            ));
        }
        let checkpoint = self.checkpoint();
        match self.create_defaults() {
            Ok(defaults) => {
                log::debug!("Created scene graph defaults {defaults:?}");
                self.defaults = Some(defaults);
                Ok(())
            }
            Err(err) => {
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    fn create_defaults(&mut self) -> Result<Defaults> {
        let mut images = [ImageRef(0); NUM_TEXTURE_SLOTS];
        for (slot, default) in images.iter_mut().zip(DefaultImage::ALL) {
            *slot = self.create_image_from_bitmap(
                default.name(),
                &Bitmap::solid(1, 1, default.pixel()),
            )?;
        }
        let clamp_sampler = self.push_sampler(
            "default clamp sampler",
            SamplerDesc::uniform(FilterMode::Linear, AddressMode::Clamp),
        )?;
        let wrap_sampler = self.push_sampler(
            "default wrap sampler",
            SamplerDesc::uniform(FilterMode::Linear, AddressMode::Wrap),
        )?;
        Ok(Defaults {
            images,
            clamp_sampler,
            wrap_sampler,
        })
    }

    fn require_defaults(&self) -> Result<Defaults> {
        self.defaults
            .ok_or_else(|| Error::invalid("scene graph defaults are not initialized"))
    }

    // Buffers

    /// Creates a graph-owned buffer of `size` bytes, optionally filled with
    /// `contents` (which may be shorter than `size`).
    pub fn create_buffer(
        &mut self,
        name: impl Into<String>,
        size: u64,
        contents: Option<&[u8]>,
        mappable: bool,
    ) -> Result<BufferRef> {
        let buffer = self.create_temporary_buffer(name, size, contents, mappable)?;
        self.buffers.push(buffer);
        Ok(BufferRef(self.buffers.len() as u32 - 1))
    }

    /// Creates a graph-owned copy of `src`.
    pub fn create_buffer_from(
        &mut self,
        name: impl Into<String>,
        src: &Buffer,
        mappable: bool,
    ) -> Result<BufferRef> {
        let resource = self.factory.create_buffer_from(src.resource, mappable)?;
        self.buffers.push(Buffer {
            name: name.into(),
            size: src.size,
            mappable,
            resource,
        });
        Ok(BufferRef(self.buffers.len() as u32 - 1))
    }

    /// Like [`create_buffer`](Self::create_buffer) but the graph does not keep
    /// the buffer. The caller must hand it to
    /// [`destroy_temporary_buffer`](Self::destroy_temporary_buffer).
    pub fn create_temporary_buffer(
        &mut self,
        name: impl Into<String>,
        size: u64,
        contents: Option<&[u8]>,
        mappable: bool,
    ) -> Result<Buffer> {
        if size == 0 {
            return Err(Error::invalid("buffer size must not be zero"));
        }
        if let Some(bytes) = contents {
            if bytes.len() as u64 > size {
                return Err(Error::invalid(format!(
                    "{} source bytes do not fit a buffer of {size} bytes",
                    bytes.len()
                )));
            }
        }
        let resource = self.factory.create_buffer(size, contents, mappable)?;
        Ok(Buffer {
            name: name.into(),
            size,
            mappable,
            resource,
        })
    }

    pub fn destroy_temporary_buffer(&mut self, buffer: Buffer) {
        self.factory.destroy_buffer(buffer.resource);
    }

    pub fn map_buffer(&mut self, buffer: BufferRef) -> Result<&mut [u8]> {
        let buffer = self
            .buffers
            .get(buffer.index())
            .ok_or_else(|| Error::invalid(format!("no buffer at index {}", buffer.0)))?;
        if !buffer.mappable {
            return Err(Error::invalid(format!("buffer '{}' is not mappable", buffer.name)));
        }
        self.factory.map_buffer(buffer.resource)
    }

    pub fn unmap_buffer(&mut self, buffer: BufferRef) {
        if let Some(buffer) = self.buffers.get(buffer.index()) {
            self.factory.unmap_buffer(buffer.resource);
        }
    }

    pub fn read_buffer(&self, buffer: BufferRef) -> Result<Vec<u8>> {
        let buffer = self
            .buffers
            .get(buffer.index())
            .ok_or_else(|| Error::invalid(format!("no buffer at index {}", buffer.0)))?;
        self.factory.read_buffer(buffer.resource)
    }

    // Images and samplers

    /// Creates a 2D RGBA8 image holding `bitmap`.
    pub fn create_image_from_bitmap(
        &mut self,
        name: impl Into<String>,
        bitmap: &Bitmap,
    ) -> Result<ImageRef> {
        let expected = bitmap.width as usize * bitmap.height as usize * 4;
        if bitmap.pixels.len() != expected {
            return Err(Error::invalid(format!(
                "bitmap of {}x{} holds {} bytes, expected {expected}",
                bitmap.width,
                bitmap.height,
                bitmap.pixels.len()
            )));
        }
        let mips = [MipOffset {
            offset: 0,
            row_stride: bitmap.row_stride(),
        }];
        self.create_image(
            name,
            bitmap.width,
            bitmap.height,
            Format::Rgba8Unorm,
            &mips,
            &bitmap.pixels,
        )
    }

    /// Creates a 2D image with one mip level per entry of `mips`.
    pub fn create_image(
        &mut self,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: Format,
        mips: &[MipOffset],
        data: &[u8],
    ) -> Result<ImageRef> {
        let name = name.into();
        validate_image(&name, width, height, format, mips, data)?;
        let desc = ImageDesc {
            mip_levels: mips.len() as u32,
            ..ImageDesc::new_2d(name.clone(), width, height, format)
        };
        let resource = self.factory.create_image(&desc, mips, data)?;
        self.images.push(Image {
            name,
            width,
            height,
            depth: desc.depth,
            format,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            resource,
        });
        Ok(ImageRef(self.images.len() as u32 - 1))
    }

    /// Returns the sampler matching `desc`, creating it if none exists yet.
    /// The default samplers never match.
    pub fn create_sampler(&mut self, name: impl Into<String>, desc: SamplerDesc) -> Result<SamplerRef> {
        let first = if self.defaults.is_some() {
            NUM_DEFAULT_SAMPLERS
        } else {
            0
        };
        if let Some(existing) = self
            .samplers
            .iter()
            .enumerate()
            .skip(first)
            .find(|(_, sampler)| sampler.desc == desc)
        {
            return Ok(SamplerRef(existing.0 as u32));
        }
        self.push_sampler(name, desc)
    }

    fn push_sampler(&mut self, name: impl Into<String>, desc: SamplerDesc) -> Result<SamplerRef> {
        let resource = self.factory.create_sampler(&desc)?;
        self.samplers.push(Sampler {
            name: name.into(),
            desc,
            resource,
        });
        Ok(SamplerRef(self.samplers.len() as u32 - 1))
    }

    // Textures, materials, meshes

    pub fn add_texture(
        &mut self,
        name: impl Into<String>,
        image: ImageRef,
        sampler: SamplerRef,
    ) -> Result<TextureRef> {
        if self.image(image).is_none() || self.sampler(sampler).is_none() {
            return Err(Error::invalid(format!(
                "texture refers to missing image {} or sampler {}",
                image.0, sampler.0
            )));
        }
        self.textures.push(Texture {
            name: name.into(),
            image,
            sampler,
        });
        Ok(TextureRef(self.textures.len() as u32 - 1))
    }

    pub fn add_material(&mut self, material: Material) -> Result<MaterialRef> {
        if let Some(missing) = material
            .textures
            .iter()
            .flatten()
            .find(|texture| self.texture(**texture).is_none())
        {
            return Err(Error::invalid(format!(
                "material '{}' refers to missing texture {}",
                material.name, missing.0
            )));
        }
        self.materials.push(material);
        Ok(MaterialRef(self.materials.len() as u32 - 1))
    }

    /// Returns the material batches without one fall back to, creating it
    /// when the graph has none yet.
    pub fn default_material(&mut self) -> MaterialRef {
        if let Some(index) = self.materials.iter().position(|m| *m == Material::default()) {
            return MaterialRef(index as u32);
        }
        self.materials.push(Material::default());
        MaterialRef(self.materials.len() as u32 - 1)
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<MeshRef> {
        let buffer = self
            .buffer(mesh.buffer)
            .ok_or_else(|| Error::invalid(format!("mesh '{}' has no backing buffer", mesh.name)))?;
        for batch in &mesh.batches {
            validate_batch(&mesh.name, batch, buffer.size)?;
            if self.material(batch.material).is_none() {
                return Err(Error::invalid(format!(
                    "mesh '{}' refers to missing material {}",
                    mesh.name, batch.material.0
                )));
            }
        }
        self.meshes.push(mesh);
        Ok(MeshRef(self.meshes.len() as u32 - 1))
    }

    // Nodes and scenes

    /// Appends a node, optionally as the last child of `parent`. Links the node
    /// already carries are discarded.
    pub fn add_node(&mut self, mut node: SceneNode, parent: Option<NodeRef>) -> Result<NodeRef> {
        if let Some(mesh) = node.mesh {
            if self.mesh(mesh).is_none() {
                return Err(Error::invalid(format!(
                    "node '{}' refers to missing mesh {}",
                    node.name, mesh.0
                )));
            }
        }
        node.parent = None;
        node.children.clear();
        self.nodes.push(node);
        let node = NodeRef(self.nodes.len() as u32 - 1);
        if let Some(parent) = parent {
            if let Err(err) = self.attach_child(parent, node) {
                self.nodes.pop();
                return Err(err);
            }
        }
        self.update_subtree(node);
        Ok(node)
    }

    /// Makes the root node `child` the last child of `parent`.
    pub fn attach_child(&mut self, parent: NodeRef, child: NodeRef) -> Result<()> {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return Err(Error::invalid(format!(
                "cannot attach node {} to node {}: no such node",
                child.0, parent.0
            )));
        }
        if self.nodes[child.index()].parent.is_some() {
            return Err(Error::invalid(format!(
                "node {} already has a parent",
                child.0
            )));
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(Error::invalid(format!(
                    "attaching node {} to node {} would create a cycle",
                    child.0, parent.0
                )));
            }
            ancestor = self.nodes[current.index()].parent;
        }
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        self.update_subtree(child);
        Ok(())
    }

    /// Replaces a node's local transform and re-derives the world matrices of
    /// its subtree.
    pub fn set_node_transform(&mut self, node: NodeRef, transform: Transform) -> Result<()> {
        let entry = self
            .nodes
            .get_mut(node.index())
            .ok_or_else(|| Error::invalid(format!("no node at index {}", node.0)))?;
        entry.transform = transform;
        self.update_subtree(node);
        Ok(())
    }

    /// Recomputes every world matrix from the local transforms.
    pub fn update_world_transforms(&mut self) {
        let roots: Vec<NodeRef> = (0..self.nodes.len() as u32)
            .map(NodeRef)
            .filter(|node| self.nodes[node.index()].parent.is_none())
            .collect();
        for root in roots {
            self.update_subtree(root);
        }
    }

    fn update_subtree(&mut self, node: NodeRef) {
        let parent_world = self.nodes[node.index()]
            .parent
            .map(|parent| self.nodes[parent.index()].world)
            .unwrap_or_else(Matrix4::identity);
        let mut stack = vec![(node, parent_world)];
        while let Some((current, parent_world)) = stack.pop() {
            let entry = &mut self.nodes[current.index()];
            entry.world = parent_world * entry.transform.to_matrix();
            let world = entry.world;
            stack.extend(entry.children.iter().rev().map(|child| (*child, world)));
        }
    }

    /// Adds a scene over the trees rooted at `roots`.
    pub fn add_scene(&mut self, name: impl Into<String>, roots: &[NodeRef]) -> Result<SceneRef> {
        let name = name.into();
        let mut nodes = Vec::new();
        let mut stack: Vec<NodeRef> = roots.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            let entry = self
                .node(node)
                .ok_or_else(|| Error::invalid(format!("scene '{name}' refers to missing node {}", node.0)))?;
            if nodes.contains(&node) {
                continue;
            }
            nodes.push(node);
            stack.extend(entry.children.iter().rev().copied());
        }
        let geometry_nodes: Vec<NodeRef> = nodes
            .iter()
            .copied()
            .filter(|node| self.nodes[node.index()].is_drawable())
            .collect();
        if geometry_nodes.len() > MAX_INSTANCES {
            return Err(Error::invalid(format!(
                "scene '{name}' has {} drawable nodes, at most {MAX_INSTANCES} are supported",
                geometry_nodes.len()
            )));
        }
        let active_camera = nodes
            .iter()
            .copied()
            .find(|node| self.nodes[node.index()].node_type == NodeType::Camera);
        self.scenes.push(Scene {
            name,
            nodes,
            geometry_nodes,
            active_camera,
            instance_buffer: None,
            camera_args_buffer: None,
        });
        Ok(SceneRef(self.scenes.len() as u32 - 1))
    }

    pub fn set_default_scene(&mut self, scene: Option<SceneRef>) {
        self.default_scene = scene.filter(|scene| self.scene(*scene).is_some());
    }

    // Index lookups

    pub fn material_index(&self, material: MaterialRef) -> u32 {
        checked_index(material.0, self.materials.len())
    }

    pub fn image_index(&self, image: ImageRef) -> u32 {
        checked_index(image.0, self.images.len())
    }

    pub fn sampler_index(&self, sampler: SamplerRef) -> u32 {
        checked_index(sampler.0, self.samplers.len())
    }

    /// Instance index of `node` within `scene`, or [`INVALID_INDEX`].
    pub fn geometry_node_index(&self, scene: SceneRef, node: NodeRef) -> u32 {
        self.scene(scene)
            .and_then(|scene| scene.geometry_nodes.iter().position(|n| *n == node))
            .map_or(INVALID_INDEX, |index| index as u32)
    }

    /// Image and sampler indices a shader samples `slot` of `material` through.
    pub fn texture_indices(&self, material: &Material, slot: TextureSlot) -> Result<TextureIndices> {
        let defaults = self.require_defaults()?;
        let indices = match material.texture(slot).and_then(|t| self.texture(t)) {
            Some(texture) => TextureIndices {
                image: self.image_index(texture.image),
                sampler: self.sampler_index(texture.sampler),
            },
            None => TextureIndices {
                image: self.image_index(defaults.image(slot)),
                sampler: self.sampler_index(defaults.wrap_sampler),
            },
        };
        Ok(indices)
    }

    pub fn material_params(&self, material: &Material) -> Result<MaterialParams> {
        let mut textures = [TextureIndices::default(); NUM_TEXTURE_SLOTS];
        for slot in TextureSlot::ALL {
            textures[slot.index()] = self.texture_indices(material, slot)?;
        }
        Ok(MaterialParams::new(material, textures))
    }

    // GPU-visible arrays

    /// Packs all materials into the material buffer and creates each scene's
    /// instance and camera buffers. Safe to call again after more content was
    /// added; the material buffer is rebuilt.
    pub fn initialize_resources(&mut self) -> Result<()> {
        self.require_defaults()?;
        if self.materials.is_empty() {
            self.default_material();
        }
        if self.materials.len() > MAX_MATERIALS {
            return Err(Error::invalid(format!(
                "{} materials exceed the limit of {MAX_MATERIALS}",
                self.materials.len()
            )));
        }
        let params = self
            .materials
            .iter()
            .map(|material| self.material_params(material))
            .collect::<Result<Vec<_>>>()?;
        let bytes: &[u8] = bytemuck::cast_slice(&params);
        let material_buffer =
            self.create_temporary_buffer("material buffer", bytes.len() as u64, Some(bytes), false)?;
        if let Some(old) = self.material_buffer.replace(material_buffer) {
            self.factory.destroy_buffer(old.resource);
        }
        log::debug!("Packed {} materials", params.len());

        self.update_world_transforms();
        for index in 0..self.scenes.len() {
            let scene = SceneRef(index as u32);
            if self.scenes[index].instance_buffer.is_none() {
                let size = (MAX_INSTANCES * std::mem::size_of::<InstanceRaw>()) as u64;
                let buffer = self.create_temporary_buffer("instance buffer", size, None, true)?;
                self.scenes[index].instance_buffer = Some(buffer);
            }
            if self.scenes[index].camera_args_buffer.is_none() {
                let size = std::mem::size_of::<CameraArgs>() as u64;
                let buffer = self.create_temporary_buffer("camera args buffer", size, None, true)?;
                self.scenes[index].camera_args_buffer = Some(buffer);
            }
            self.write_instances(scene)?;
        }
        Ok(())
    }

    /// Instance records of a scene's drawable nodes, in instance order.
    pub fn instances(&self, scene: SceneRef) -> Vec<InstanceRaw> {
        self.scene(scene)
            .map(|scene| {
                scene
                    .geometry_nodes
                    .iter()
                    .map(|node| InstanceRaw::from_world(&self.nodes[node.index()].world))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Writes the current world matrices of a scene's drawable nodes into its
    /// instance buffer.
    pub fn write_instances(&mut self, scene: SceneRef) -> Result<()> {
        let instances = self.instances(scene);
        let resource = self
            .scene(scene)
            .and_then(|scene| scene.instance_buffer.as_ref())
            .map(|buffer| buffer.resource)
            .ok_or_else(|| Error::invalid(format!("scene {} has no instance buffer", scene.0)))?;
        let bytes: &[u8] = bytemuck::cast_slice(&instances);
        let mapped = self.factory.map_buffer(resource)?;
        mapped[..bytes.len()].copy_from_slice(bytes);
        self.factory.unmap_buffer(resource);
        Ok(())
    }

    /// Camera constants for the scene's active camera, if it has one.
    pub fn camera_args(&self, scene: SceneRef, aspect: f32) -> Option<CameraArgs> {
        let camera = self.node(self.scene(scene)?.active_camera?)?;
        let params = camera.camera?;
        Some(CameraArgs::new(camera.world, params.projection(aspect)))
    }

    pub fn write_camera_args(&mut self, scene: SceneRef, args: &CameraArgs) -> Result<()> {
        let resource = self
            .scene(scene)
            .and_then(|scene| scene.camera_args_buffer.as_ref())
            .map(|buffer| buffer.resource)
            .ok_or_else(|| Error::invalid(format!("scene {} has no camera buffer", scene.0)))?;
        let bytes = bytemuck::bytes_of(args);
        let mapped = self.factory.map_buffer(resource)?;
        mapped[..bytes.len()].copy_from_slice(bytes);
        self.factory.unmap_buffer(resource);
        Ok(())
    }

    /// One entry per (drawable node, batch) of a scene, in instance order.
    pub fn draw_list(&self, scene: SceneRef) -> Vec<DrawItem> {
        let Some(scene) = self.scene(scene) else {
            return Vec::new();
        };
        let mut items = Vec::new();
        for (instance_index, node) in scene.geometry_nodes.iter().enumerate() {
            let Some(mesh_ref) = self.nodes[node.index()].mesh else {
                continue;
            };
            let Some(mesh) = self.mesh(mesh_ref) else {
                continue;
            };
            for (batch_index, batch) in mesh.batches.iter().enumerate() {
                items.push(DrawItem {
                    node: *node,
                    instance_index: instance_index as u32,
                    mesh: mesh_ref,
                    batch_index: batch_index as u32,
                    material_index: self.material_index(batch.material),
                });
            }
        }
        items
    }

    /// Checks the structural invariants of the graph.
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            let this = NodeRef(index as u32);
            for child in &node.children {
                let parent = self.node(*child).and_then(|c| c.parent);
                if parent != Some(this) {
                    return Err(Error::invalid(format!(
                        "node {} lists child {} whose parent is {parent:?}",
                        index, child.0
                    )));
                }
            }
            let mut ancestor = node.parent;
            let mut steps = 0;
            while let Some(current) = ancestor {
                steps += 1;
                if current == this || steps > self.nodes.len() {
                    return Err(Error::invalid(format!("node {index} is its own ancestor")));
                }
                ancestor = self.node(current).and_then(|n| n.parent);
            }
        }
        for mesh in &self.meshes {
            let size = self
                .buffer(mesh.buffer)
                .map(|buffer| buffer.size)
                .ok_or_else(|| Error::invalid(format!("mesh '{}' has no buffer", mesh.name)))?;
            for batch in &mesh.batches {
                validate_batch(&mesh.name, batch, size)?;
            }
        }
        if let Some(defaults) = &self.defaults {
            for material in &self.materials {
                for slot in TextureSlot::ALL {
                    let is_default = match material.texture(slot).and_then(|t| self.texture(t)) {
                        Some(texture) => defaults.images.contains(&texture.image),
                        None => true,
                    };
                    let flagged = material.flags() & slot.flag() != 0;
                    if flagged == is_default {
                        return Err(Error::invalid(format!(
                            "material '{}' flag for {slot:?} does not match its texture",
                            material.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            buffers: self.buffers.len(),
            images: self.images.len(),
            samplers: self.samplers.len(),
            textures: self.textures.len(),
            materials: self.materials.len(),
            meshes: self.meshes.len(),
            nodes: self.nodes.len(),
            scenes: self.scenes.len(),
            default_scene: self.default_scene,
            material_buffer: self.material_buffer.as_ref().map(|buffer| buffer.resource),
        }
    }

    /// Destroys everything created after `checkpoint` and truncates the arrays
    /// back to it.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        for scene in self.scenes.drain(checkpoint.scenes..) {
            for buffer in [scene.instance_buffer, scene.camera_args_buffer]
                .into_iter()
                .flatten()
            {
                self.factory.destroy_buffer(buffer.resource);
            }
        }
        for buffer in self.buffers.drain(checkpoint.buffers..) {
            self.factory.destroy_buffer(buffer.resource);
        }
        for image in self.images.drain(checkpoint.images..) {
            self.factory.destroy_image(image.resource);
        }
        for sampler in self.samplers.drain(checkpoint.samplers..) {
            self.factory.destroy_sampler(sampler.resource);
        }
        self.textures.truncate(checkpoint.textures);
        self.materials.truncate(checkpoint.materials);
        self.meshes.truncate(checkpoint.meshes);
        self.nodes.truncate(checkpoint.nodes);
        let kept = checkpoint.nodes as u32;
        for node in &mut self.nodes {
            node.children.retain(|child| child.0 < kept);
        }
        self.default_scene = checkpoint.default_scene;

        let current = self.material_buffer.as_ref().map(|buffer| buffer.resource);
        if current != checkpoint.material_buffer {
            if let Some(buffer) = self.material_buffer.take() {
                self.factory.destroy_buffer(buffer.resource);
            }
        }
        log::debug!("Rolled scene graph back to {checkpoint:?}");
    }
}

impl Drop for SceneGraph {
    fn drop(&mut self) {
        let scene_buffers: Vec<Buffer> = self
            .scenes
            .drain(..)
            .flat_map(|scene| [scene.instance_buffer, scene.camera_args_buffer])
            .flatten()
            .chain(self.material_buffer.take())
            .chain(self.buffers.drain(..))
            .collect();
        for buffer in scene_buffers {
            self.factory.destroy_buffer(buffer.resource);
        }
        for image in self.images.drain(..) {
            self.factory.destroy_image(image.resource);
        }
        for sampler in self.samplers.drain(..) {
            self.factory.destroy_sampler(sampler.resource);
        }
    }
}

fn checked_index(index: u32, len: usize) -> u32 {
    if (index as usize) < len {
        index
    } else {
        log::debug!("Lookup of index {index} outside of {len} entries");
        INVALID_INDEX
    }
}

fn validate_image(
    name: &str,
    width: u32,
    height: u32,
    format: Format,
    mips: &[MipOffset],
    data: &[u8],
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid(format!("image '{name}' has a zero extent")));
    }
    if !format.is_image_format() {
        return Err(Error::invalid(format!(
            "image '{name}' uses unsupported format {format:?}"
        )));
    }
    if mips.is_empty() {
        return Err(Error::invalid(format!("image '{name}' has no mip levels")));
    }
    let max_levels = max_mip_levels(width, height);
    if mips.len() > max_levels as usize {
        return Err(Error::invalid(format!(
            "image '{name}' of {width}x{height} has {} mip levels, at most {max_levels} fit",
            mips.len()
        )));
    }
    let texel = format.size_in_bytes() as u64;
    for (level, mip) in mips.iter().enumerate() {
        let level_width = mip_extent(width, level) as u64;
        let level_height = mip_extent(height, level) as u64;
        let row = level_width * texel;
        if (mip.row_stride as u64) < row {
            return Err(Error::invalid(format!(
                "image '{name}' mip {level} row stride {} is below {row} bytes",
                mip.row_stride
            )));
        }
        let end = (mip.row_stride as u64 * (level_height - 1))
            .checked_add(row)
            .and_then(|len| len.checked_add(mip.offset));
        if !end.is_some_and(|end| end <= data.len() as u64) {
            return Err(Error::invalid(format!(
                "image '{name}' mip {level} at offset {} runs past the {} given bytes",
                mip.offset,
                data.len()
            )));
        }
    }
    Ok(())
}

fn validate_batch(mesh: &str, batch: &PrimitiveBatch, buffer_size: u64) -> Result<()> {
    if !batch.index_view.format.is_index() {
        return Err(Error::invalid(format!(
            "mesh '{mesh}' has a batch with index format {:?}",
            batch.index_view.format
        )));
    }
    if batch.position_view.format != Format::Rgb32Float || batch.position_view.count == 0 {
        return Err(Error::invalid(format!(
            "mesh '{mesh}' has a batch without RGB32 float positions"
        )));
    }
    let expected = [
        (&batch.color_view, Format::Rgb32Float),
        (&batch.tex_coord_view, Format::Rg32Float),
        (&batch.normal_view, Format::Rgb32Float),
        (&batch.tangent_view, Format::Rgba32Float),
    ];
    for (view, format) in expected {
        if view.is_present() && view.format != format {
            return Err(Error::invalid(format!(
                "mesh '{mesh}' has a vertex stream of format {:?}, expected {format:?}",
                view.format
            )));
        }
    }
    for view in batch.views().into_iter().filter(|view| view.is_present()) {
        if !view.fits(buffer_size) {
            return Err(Error::invalid(format!(
                "mesh '{mesh}' has a view {view:?} outside its {buffer_size} byte buffer"
            )));
        }
    }
    Ok(())
}
