//! A backend that keeps every resource in CPU memory.
//!
//! Buffers are plain byte vectors, images keep their uploaded bytes and
//! pipelines remember the configuration they were built for. The recorder
//! logs commands instead of executing them. Allocation and pipeline failures
//! can be injected to exercise the error paths of the core.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    data_structures::texture::{MipOffset, SamplerDesc},
    error::{Error, Result},
    pipelines::{PipelineConfig, PrimitiveTopology, ProgramDesc},
};

use super::{
    BufferId, CommandRecorder, ImageDesc, ImageId, PipelineFactory, PipelineId, RecorderId,
    ResourceFactory, RootSignatureId, SamplerId,
};

/// Live object counts of a [`MemoryBackend`], readable after the backend was
/// handed off.
#[derive(Debug, Default)]
pub struct MemoryStats {
    buffers: AtomicUsize,
    images: AtomicUsize,
    samplers: AtomicUsize,
    root_signatures: AtomicUsize,
    pipelines: AtomicUsize,
}

impl MemoryStats {
    pub fn live_buffers(&self) -> usize {
        self.buffers.load(Ordering::Relaxed)
    }

    pub fn live_images(&self) -> usize {
        self.images.load(Ordering::Relaxed)
    }

    pub fn live_samplers(&self) -> usize {
        self.samplers.load(Ordering::Relaxed)
    }

    pub fn live_root_signatures(&self) -> usize {
        self.root_signatures.load(Ordering::Relaxed)
    }

    pub fn live_pipelines(&self) -> usize {
        self.pipelines.load(Ordering::Relaxed)
    }

    pub fn live_resources(&self) -> usize {
        self.live_buffers() + self.live_images() + self.live_samplers()
    }
}

#[derive(Debug)]
struct MemoryBuffer {
    bytes: Vec<u8>,
    mappable: bool,
}

#[derive(Debug)]
pub struct MemoryImage {
    pub desc: ImageDesc,
    pub mips: Vec<MipOffset>,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    next_id: u64,
    buffers: HashMap<u64, MemoryBuffer>,
    images: HashMap<u64, MemoryImage>,
    samplers: HashMap<u64, SamplerDesc>,
    root_signatures: HashMap<u64, String>,
    pipelines: HashMap<u64, (RootSignatureId, PipelineConfig)>,
    /// Remaining buffer/image/sampler allocations before they start failing.
    allocations_left: Option<usize>,
    /// Remaining pipeline creations before they start failing.
    pipelines_left: Option<usize>,
    stats: Arc<MemoryStats>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the next `limit` resource allocations succeed and fails every one
    /// after that.
    pub fn with_allocation_limit(mut self, limit: usize) -> Self {
        self.allocations_left = Some(limit);
        self
    }

    /// Lets the next `limit` pipeline creations succeed and fails every one
    /// after that.
    pub fn with_pipeline_limit(mut self, limit: usize) -> Self {
        self.pipelines_left = Some(limit);
        self
    }

    pub fn set_allocation_limit(&mut self, limit: Option<usize>) {
        self.allocations_left = limit;
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }

    pub fn image(&self, id: ImageId) -> Option<&MemoryImage> {
        self.images.get(&id.0)
    }

    pub fn sampler_desc(&self, id: SamplerId) -> Option<&SamplerDesc> {
        self.samplers.get(&id.0)
    }

    pub fn buffer_size(&self, id: BufferId) -> Option<u64> {
        self.buffers.get(&id.0).map(|buffer| buffer.bytes.len() as u64)
    }

    /// Configuration a pipeline was created for.
    pub fn pipeline_config(&self, id: PipelineId) -> Option<PipelineConfig> {
        self.pipelines.get(&id.0).map(|(_, config)| *config)
    }

    pub fn root_signature_label(&self, id: RootSignatureId) -> Option<&str> {
        self.root_signatures.get(&id.0).map(String::as_str)
    }

    fn allocate(&mut self, what: &'static str) -> Result<u64> {
        if let Some(left) = self.allocations_left.as_mut() {
            if *left == 0 {
                return Err(Error::resource(what, "memory backend allocation limit reached"));
            }
            *left -= 1;
        }
        self.next_id += 1;
        Ok(self.next_id)
    }
}

impl ResourceFactory for MemoryBackend {
    fn create_buffer(
        &mut self,
        size: u64,
        contents: Option<&[u8]>,
        mappable: bool,
    ) -> Result<BufferId> {
        if size == 0 {
            return Err(Error::invalid("buffer size must not be zero"));
        }
        let id = self.allocate("buffer")?;
        let mut bytes = vec![0u8; size as usize];
        if let Some(contents) = contents {
            let len = contents.len().min(bytes.len());
            bytes[..len].copy_from_slice(&contents[..len]);
        }
        self.buffers.insert(id, MemoryBuffer { bytes, mappable });
        self.stats.buffers.fetch_add(1, Ordering::Relaxed);
        Ok(BufferId(id))
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id.0).is_some() {
            self.stats.buffers.fetch_sub(1, Ordering::Relaxed);
        } else {
            log::warn!("Destroying unknown buffer {id:?}");
        }
    }

    fn map_buffer(&mut self, id: BufferId) -> Result<&mut [u8]> {
        match self.buffers.get_mut(&id.0) {
            Some(buffer) if buffer.mappable => Ok(&mut buffer.bytes),
            Some(_) => Err(Error::invalid(format!("buffer {id:?} is not mappable"))),
            None => Err(Error::invalid(format!("unknown buffer {id:?}"))),
        }
    }

    fn unmap_buffer(&mut self, _id: BufferId) {}

    fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>> {
        self.buffers
            .get(&id.0)
            .map(|buffer| buffer.bytes.clone())
            .ok_or_else(|| Error::invalid(format!("unknown buffer {id:?}")))
    }

    fn create_image(&mut self, desc: &ImageDesc, mips: &[MipOffset], data: &[u8]) -> Result<ImageId> {
        if desc.width == 0 || desc.height == 0 || mips.is_empty() {
            return Err(Error::invalid(format!("image '{}' is empty", desc.name)));
        }
        let id = self.allocate("image")?;
        self.images.insert(
            id,
            MemoryImage {
                desc: desc.clone(),
                mips: mips.to_vec(),
                data: data.to_vec(),
            },
        );
        self.stats.images.fetch_add(1, Ordering::Relaxed);
        Ok(ImageId(id))
    }

    fn destroy_image(&mut self, id: ImageId) {
        if self.images.remove(&id.0).is_some() {
            self.stats.images.fetch_sub(1, Ordering::Relaxed);
        } else {
            log::warn!("Destroying unknown image {id:?}");
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId> {
        let id = self.allocate("sampler")?;
        self.samplers.insert(id, *desc);
        self.stats.samplers.fetch_add(1, Ordering::Relaxed);
        Ok(SamplerId(id))
    }

    fn destroy_sampler(&mut self, id: SamplerId) {
        if self.samplers.remove(&id.0).is_some() {
            self.stats.samplers.fetch_sub(1, Ordering::Relaxed);
        } else {
            log::warn!("Destroying unknown sampler {id:?}");
        }
    }
}

impl PipelineFactory for MemoryBackend {
    fn create_root_signature(&mut self, desc: &ProgramDesc) -> Result<RootSignatureId> {
        desc.validate()?;
        self.next_id += 1;
        self.root_signatures.insert(self.next_id, desc.label.clone());
        self.stats.root_signatures.fetch_add(1, Ordering::Relaxed);
        Ok(RootSignatureId(self.next_id))
    }

    fn destroy_root_signature(&mut self, id: RootSignatureId) {
        if self.root_signatures.remove(&id.0).is_some() {
            self.stats.root_signatures.fetch_sub(1, Ordering::Relaxed);
        }
    }

    fn create_pipeline(
        &mut self,
        root_signature: RootSignatureId,
        desc: &ProgramDesc,
        config: PipelineConfig,
    ) -> Result<PipelineId> {
        if !self.root_signatures.contains_key(&root_signature.0) {
            return Err(Error::invalid(format!(
                "unknown root signature {root_signature:?} for '{}'",
                desc.label
            )));
        }
        if let Some(left) = self.pipelines_left.as_mut() {
            if *left == 0 {
                return Err(Error::resource("pipeline", "memory backend pipeline limit reached"));
            }
            *left -= 1;
        }
        self.next_id += 1;
        self.pipelines.insert(self.next_id, (root_signature, config));
        self.stats.pipelines.fetch_add(1, Ordering::Relaxed);
        Ok(PipelineId(self.next_id))
    }

    fn destroy_pipeline(&mut self, id: PipelineId) {
        if self.pipelines.remove(&id.0).is_some() {
            self.stats.pipelines.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// A command as logged by [`MemoryRecorder`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetRootSignature(RootSignatureId),
    SetPipelineState(PipelineId),
    SetVertexBuffer {
        slot: u32,
        buffer: BufferId,
        size: u64,
        stride: u32,
    },
    SetPrimitiveTopology(PrimitiveTopology),
    SetRootConstants {
        slot: u32,
        values: Vec<u32>,
    },
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    },
}

#[derive(Debug)]
pub struct MemoryRecorder {
    id: RecorderId,
    pub commands: Vec<Command>,
}

impl MemoryRecorder {
    pub fn new(id: u64) -> Self {
        Self {
            id: RecorderId(id),
            commands: Vec::new(),
        }
    }

    /// `(vertex_count, start_vertex)` of every logged draw.
    pub fn draws(&self) -> Vec<(u32, u32)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawInstanced {
                    vertex_count,
                    start_vertex,
                    ..
                } => Some((*vertex_count, *start_vertex)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandRecorder for MemoryRecorder {
    fn recorder_id(&self) -> RecorderId {
        self.id
    }

    fn set_root_signature(&mut self, root_signature: RootSignatureId) {
        self.commands.push(Command::SetRootSignature(root_signature));
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineId) {
        self.commands.push(Command::SetPipelineState(pipeline));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, size: u64, stride: u32) {
        self.commands.push(Command::SetVertexBuffer {
            slot,
            buffer,
            size,
            stride,
        });
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.commands.push(Command::SetPrimitiveTopology(topology));
    }

    fn set_root_constants_32bit(&mut self, slot: u32, values: &[u32]) {
        self.commands.push(Command::SetRootConstants {
            slot,
            values: values.to_vec(),
        });
    }

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) {
        self.commands.push(Command::DrawInstanced {
            vertex_count,
            instance_count,
            start_vertex,
            start_instance,
        });
    }
}
