//! A backend over `wgpu`.
//!
//! The caller owns the device setup (instance, adapter, surface) and hands a
//! device/queue pair to [`WgpuBackend::new`]. Programs are WGSL; the MVP root
//! constants become vertex-stage push constants, so the device must have been
//! created with [`wgpu::Features::PUSH_CONSTANTS`].
//!
//! Commands are not encoded while the draw context flushes. Flush into a
//! [`MemoryRecorder`](super::memory::MemoryRecorder) and replay its command
//! list into a render pass with [`WgpuBackend::encode`].

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        format::Format,
        texture::{AddressMode, FilterMode, MipOffset, SamplerDesc, max_mip_levels, mip_extent},
    },
    error::{Error, Result},
    pipelines::{BlendMode, CullMode, PipelineConfig, PrimitiveTopology, ProgramDesc},
    render::{DRAW_VERTEX_STRIDE, DrawVertex},
};

use super::{
    BufferId, ImageDesc, ImageId, PipelineFactory, PipelineId, ResourceFactory, RootSignatureId,
    SamplerId, memory::Command,
};

/// Bytes of root constants a program receives: one 4×4 float matrix.
const ROOT_CONSTANT_BYTES: u32 = 64;

struct WgpuBuffer {
    buffer: wgpu::Buffer,
    size: u64,
    /// CPU copy of a mappable buffer; written to the GPU on unmap.
    shadow: Option<Vec<u8>>,
}

struct WgpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct RootSignature {
    layout: wgpu::PipelineLayout,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
}

pub struct WgpuBackend {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    next_id: u64,
    buffers: HashMap<u64, WgpuBuffer>,
    images: HashMap<u64, WgpuImage>,
    samplers: HashMap<u64, wgpu::Sampler>,
    root_signatures: HashMap<u64, RootSignature>,
    pipelines: HashMap<u64, wgpu::RenderPipeline>,
}

impl WgpuBackend {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Result<Self> {
        if !device.features().contains(wgpu::Features::PUSH_CONSTANTS) {
            return Err(Error::invalid(
                "the wgpu device must be created with Features::PUSH_CONSTANTS",
            ));
        }
        Ok(Self {
            device,
            queue,
            color_format,
            depth_format,
            next_id: 0,
            buffers: HashMap::new(),
            images: HashMap::new(),
            samplers: HashMap::new(),
            root_signatures: HashMap::new(),
            pipelines: HashMap::new(),
        })
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(&id.0).map(|buffer| &buffer.buffer)
    }

    pub fn image_view(&self, id: ImageId) -> Option<&wgpu::TextureView> {
        self.images.get(&id.0).map(|image| &image.view)
    }

    pub fn sampler(&self, id: SamplerId) -> Option<&wgpu::Sampler> {
        self.samplers.get(&id.0)
    }

    /// Replays a recorded command list into `pass`.
    pub fn encode(&self, commands: &[Command], pass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        for command in commands {
            match command {
                Command::SetRootSignature(id) => {
                    if !self.root_signatures.contains_key(&id.0) {
                        return Err(Error::invalid(format!("unknown root signature {id:?}")));
                    }
                }
                Command::SetPipelineState(id) => {
                    let pipeline = self
                        .pipelines
                        .get(&id.0)
                        .ok_or_else(|| Error::invalid(format!("unknown pipeline {id:?}")))?;
                    pass.set_pipeline(pipeline);
                }
                Command::SetVertexBuffer {
                    slot, buffer, size, ..
                } => {
                    let buffer = self
                        .buffer(*buffer)
                        .ok_or_else(|| Error::invalid(format!("unknown buffer {buffer:?}")))?;
                    pass.set_vertex_buffer(*slot, buffer.slice(..*size));
                }
                // topology is part of the pipeline state
                Command::SetPrimitiveTopology(_) => {}
                Command::SetRootConstants { slot, values } => {
                    pass.set_push_constants(
                        wgpu::ShaderStages::VERTEX,
                        slot * 4,
                        bytemuck::cast_slice(values),
                    );
                }
                Command::DrawInstanced {
                    vertex_count,
                    instance_count,
                    start_vertex,
                    start_instance,
                } => pass.draw(
                    *start_vertex..start_vertex + vertex_count,
                    *start_instance..start_instance + instance_count,
                ),
            }
        }
        Ok(())
    }
}

fn aligned(size: u64) -> u64 {
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

const BUFFER_USAGES: wgpu::BufferUsages = wgpu::BufferUsages::VERTEX
    .union(wgpu::BufferUsages::INDEX)
    .union(wgpu::BufferUsages::STORAGE)
    .union(wgpu::BufferUsages::UNIFORM)
    .union(wgpu::BufferUsages::COPY_SRC)
    .union(wgpu::BufferUsages::COPY_DST);

impl ResourceFactory for WgpuBackend {
    fn create_buffer(
        &mut self,
        size: u64,
        contents: Option<&[u8]>,
        mappable: bool,
    ) -> Result<BufferId> {
        if size == 0 {
            return Err(Error::invalid("buffer size must not be zero"));
        }
        let padded = aligned(size);
        let mut initial = vec![0u8; padded as usize];
        if let Some(contents) = contents {
            let len = contents.len().min(initial.len());
            initial[..len].copy_from_slice(&contents[..len]);
        }
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("faux-render buffer"),
                contents: &initial,
                usage: BUFFER_USAGES,
            });
        let id = self.next_id();
        self.buffers.insert(
            id,
            WgpuBuffer {
                buffer,
                size,
                shadow: mappable.then_some(initial),
            },
        );
        Ok(BufferId(id))
    }

    fn create_buffer_from(&mut self, src: BufferId, mappable: bool) -> Result<BufferId> {
        let source = self
            .buffers
            .get(&src.0)
            .ok_or_else(|| Error::invalid(format!("unknown buffer {src:?}")))?;
        let size = source.size;
        let shadow = match (&source.shadow, mappable) {
            (Some(shadow), true) => Some(shadow.clone()),
            (None, true) => {
                return Err(Error::invalid(
                    "a mappable copy needs a mappable source buffer",
                ));
            }
            (_, false) => None,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("faux-render buffer copy"),
            size: aligned(size),
            usage: BUFFER_USAGES,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("faux-render buffer copy encoder"),
            });
        encoder.copy_buffer_to_buffer(&source.buffer, 0, &buffer, 0, aligned(size));
        self.queue.submit(std::iter::once(encoder.finish()));

        let id = self.next_id();
        self.buffers.insert(id, WgpuBuffer { buffer, size, shadow });
        Ok(BufferId(id))
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.remove(&id.0) {
            buffer.buffer.destroy();
        }
    }

    fn map_buffer(&mut self, id: BufferId) -> Result<&mut [u8]> {
        let buffer = self
            .buffers
            .get_mut(&id.0)
            .ok_or_else(|| Error::invalid(format!("unknown buffer {id:?}")))?;
        let size = buffer.size as usize;
        buffer
            .shadow
            .as_mut()
            .map(|shadow| &mut shadow[..size])
            .ok_or_else(|| Error::invalid(format!("buffer {id:?} is not mappable")))
    }

    fn unmap_buffer(&mut self, id: BufferId) {
        if let Some(WgpuBuffer {
            buffer,
            shadow: Some(shadow),
            ..
        }) = self.buffers.get(&id.0)
        {
            self.queue.write_buffer(buffer, 0, shadow);
        }
    }

    fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>> {
        let buffer = self
            .buffers
            .get(&id.0)
            .ok_or_else(|| Error::invalid(format!("unknown buffer {id:?}")))?;
        buffer
            .shadow
            .as_ref()
            .map(|shadow| shadow[..buffer.size as usize].to_vec())
            .ok_or_else(|| Error::invalid(format!("buffer {id:?} cannot be read back")))
    }

    fn create_image(&mut self, desc: &ImageDesc, mips: &[MipOffset], data: &[u8]) -> Result<ImageId> {
        let format = texture_format(desc.format)?;
        let max_levels = max_mip_levels(desc.width, desc.height);
        if mips.is_empty() || mips.len() > max_levels as usize {
            return Err(Error::invalid(format!(
                "'{}' has {} mip levels, expected 1 to {max_levels}",
                desc.name,
                mips.len()
            )));
        }
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.array_layers.max(desc.depth),
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.name.as_str()),
            size,
            mip_level_count: mips.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (level, mip) in mips.iter().enumerate() {
            let width = mip_extent(desc.width, level);
            let height = mip_extent(desc.height, level);
            let start = mip.offset as usize;
            let bytes = data
                .get(start..)
                .ok_or_else(|| Error::invalid(format!("mip {level} of '{}' starts past the data", desc.name)))?;
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(mip.row_stride),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.next_id();
        self.images.insert(id, WgpuImage { texture, view });
        Ok(ImageId(id))
    }

    fn destroy_image(&mut self, id: ImageId) {
        if let Some(image) = self.images.remove(&id.0) {
            image.texture.destroy();
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId> {
        let border = [desc.address_u, desc.address_v, desc.address_w].contains(&AddressMode::Border);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: address_mode(desc.address_u),
            address_mode_v: address_mode(desc.address_v),
            address_mode_w: address_mode(desc.address_w),
            mag_filter: filter_mode(desc.mag_filter),
            min_filter: filter_mode(desc.min_filter),
            mipmap_filter: filter_mode(desc.mip_filter),
            border_color: border.then_some(wgpu::SamplerBorderColor::TransparentBlack),
            ..Default::default()
        });
        let id = self.next_id();
        self.samplers.insert(id, sampler);
        Ok(SamplerId(id))
    }

    fn destroy_sampler(&mut self, id: SamplerId) {
        self.samplers.remove(&id.0);
    }
}

impl PipelineFactory for WgpuBackend {
    fn create_root_signature(&mut self, desc: &ProgramDesc) -> Result<RootSignatureId> {
        desc.validate()?;
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label.as_str()),
                bind_group_layouts: &[],
                push_constant_ranges: &[wgpu::PushConstantRange {
                    stages: wgpu::ShaderStages::VERTEX,
                    range: 0..ROOT_CONSTANT_BYTES,
                }],
            });
        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label.as_str()),
            source: wgpu::ShaderSource::Wgsl(desc.vertex.code.as_str().into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label.as_str()),
            source: wgpu::ShaderSource::Wgsl(desc.fragment.code.as_str().into()),
        });
        let id = self.next_id();
        self.root_signatures.insert(
            id,
            RootSignature {
                layout,
                vertex,
                fragment,
            },
        );
        Ok(RootSignatureId(id))
    }

    fn destroy_root_signature(&mut self, id: RootSignatureId) {
        self.root_signatures.remove(&id.0);
    }

    fn create_pipeline(
        &mut self,
        root_signature: RootSignatureId,
        desc: &ProgramDesc,
        config: PipelineConfig,
    ) -> Result<PipelineId> {
        let signature = self.root_signatures.get(&root_signature.0).ok_or_else(|| {
            Error::invalid(format!("unknown root signature {root_signature:?}"))
        })?;
        let depth_enable = config.depth_enable();
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some(desc.label.as_str()),
                layout: Some(&signature.layout),
                vertex: wgpu::VertexState {
                    module: &signature.vertex,
                    entry_point: Some(desc.vertex.entry_point.as_str()),
                    buffers: &[draw_vertex_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &signature.fragment,
                    entry_point: Some(desc.fragment.entry_point.as_str()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: blend_state(config.blend_mode()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: match config.topology() {
                        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
                        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
                    },
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: match config.cull_mode() {
                        CullMode::None => None,
                        CullMode::Back => Some(wgpu::Face::Back),
                        CullMode::Front => Some(wgpu::Face::Front),
                    },
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: self.depth_format.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: depth_enable,
                    depth_compare: if depth_enable {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            });
        let id = self.next_id();
        self.pipelines.insert(id, pipeline);
        Ok(PipelineId(id))
    }

    fn destroy_pipeline(&mut self, id: PipelineId) {
        self.pipelines.remove(&id.0);
    }
}

fn draw_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    use std::mem;
    wgpu::VertexBufferLayout {
        array_stride: DRAW_VERTEX_STRIDE as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: mem::offset_of!(DrawVertex, color) as wgpu::BufferAddress,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: mem::offset_of!(DrawVertex, tex_coord) as wgpu::BufferAddress,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    }
}

fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    match mode {
        BlendMode::None => Some(wgpu::BlendState::REPLACE),
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        BlendMode::Additive => {
            let additive = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            };
            Some(wgpu::BlendState {
                color: additive,
                alpha: additive,
            })
        }
    }
}

fn texture_format(format: Format) -> Result<wgpu::TextureFormat> {
    let format = match format {
        Format::R8Unorm => wgpu::TextureFormat::R8Unorm,
        Format::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,
        Format::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        Format::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        Format::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        Format::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        Format::R32Float => wgpu::TextureFormat::R32Float,
        Format::Rg32Float => wgpu::TextureFormat::Rg32Float,
        Format::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        other => {
            return Err(Error::invalid(format!("{other:?} is not a wgpu texture format")));
        }
    };
    Ok(format)
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        AddressMode::Border => wgpu::AddressMode::ClampToBorder,
    }
}
