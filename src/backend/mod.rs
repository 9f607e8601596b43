//! Seams between the backend-neutral core and a concrete GPU API.
//!
//! The scene graph only talks to a [`ResourceFactory`], the draw context
//! additionally to a [`PipelineFactory`] and a [`CommandRecorder`]. Backends
//! hand out opaque ids; the core never looks behind them.
//!
//! - [`memory`] keeps every resource in CPU memory and logs recorded commands.
//!   It is what the tests and the `faux_inspect` tool run on.
//! - `wgpu` (behind the `wgpu` cargo feature) drives a real device.

pub mod memory;
#[cfg(feature = "wgpu")]
pub mod wgpu;

use crate::{
    data_structures::{
        format::Format,
        texture::{MipOffset, SamplerDesc},
    },
    error::Result,
    pipelines::{PipelineConfig, PrimitiveTopology, ProgramDesc},
};

macro_rules! backend_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

backend_id!(
    /// Backend handle of a GPU buffer.
    BufferId
);
backend_id!(
    /// Backend handle of a GPU image.
    ImageId
);
backend_id!(
    /// Backend handle of a sampler object.
    SamplerId
);
backend_id!(
    /// Backend handle of a compiled pipeline state.
    PipelineId
);
backend_id!(
    /// Backend handle of a binding layout plus the compiled shader stages of a program.
    RootSignatureId
);
backend_id!(
    /// Caller-chosen identity of a command recorder. The draw context keeps one
    /// vertex buffer per recorder id.
    RecorderId
);

/// Shape of an image handed to [`ResourceFactory::create_image`].
#[derive(Clone, Debug, PartialEq)]
pub struct ImageDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: Format,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl ImageDesc {
    pub fn new_2d(name: impl Into<String>, width: u32, height: u32, format: Format) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            depth: 1,
            format,
            mip_levels: 1,
            array_layers: 1,
        }
    }
}

/// Creates and destroys the GPU resources a scene graph owns.
///
/// Implementations must leave their own state untouched when a call fails.
pub trait ResourceFactory {
    /// Allocates `size` bytes. When `contents` is given its bytes are copied to
    /// the start of the buffer; `contents.len()` never exceeds `size`.
    /// Non-mappable buffers are filled through a staging copy that has
    /// completed when this returns.
    fn create_buffer(
        &mut self,
        size: u64,
        contents: Option<&[u8]>,
        mappable: bool,
    ) -> Result<BufferId>;

    /// Creates a new buffer holding a copy of `src`.
    fn create_buffer_from(&mut self, src: BufferId, mappable: bool) -> Result<BufferId> {
        let bytes = self.read_buffer(src)?;
        self.create_buffer(bytes.len() as u64, Some(&bytes), mappable)
    }

    fn destroy_buffer(&mut self, id: BufferId);

    /// Returns the CPU-visible contents of a mappable buffer.
    fn map_buffer(&mut self, id: BufferId) -> Result<&mut [u8]>;

    /// Publishes writes made through [`map_buffer`](Self::map_buffer).
    fn unmap_buffer(&mut self, id: BufferId);

    /// Reads a buffer back to the CPU.
    fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>>;

    /// Creates an image and uploads `data`, one region per entry of `mips`.
    /// The image is left ready for shader reads.
    fn create_image(&mut self, desc: &ImageDesc, mips: &[MipOffset], data: &[u8])
        -> Result<ImageId>;

    fn destroy_image(&mut self, id: ImageId);

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId>;

    fn destroy_sampler(&mut self, id: SamplerId);
}

/// Compiles programs and their pipeline states.
pub trait PipelineFactory {
    /// Compiles both shader stages and the binding layout of `desc`.
    fn create_root_signature(&mut self, desc: &ProgramDesc) -> Result<RootSignatureId>;

    fn destroy_root_signature(&mut self, id: RootSignatureId);

    fn create_pipeline(
        &mut self,
        root_signature: RootSignatureId,
        desc: &ProgramDesc,
        config: PipelineConfig,
    ) -> Result<PipelineId>;

    fn destroy_pipeline(&mut self, id: PipelineId);
}

/// The command stream the draw context flushes into.
pub trait CommandRecorder {
    fn recorder_id(&self) -> RecorderId;

    fn set_root_signature(&mut self, root_signature: RootSignatureId);

    fn set_pipeline_state(&mut self, pipeline: PipelineId);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, size: u64, stride: u32);

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);

    fn set_root_constants_32bit(&mut self, slot: u32, values: &[u32]);

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    );
}
