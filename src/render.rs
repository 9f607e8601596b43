//! Immediate-mode drawing.
//!
//! A [`DrawContext`] collects vertices between `begin_*`/`end_*` pairs into
//! [`Batch`]es, each tagged with the program, fixed-function state and MVP
//! matrix current when it was begun. [`DrawContext::flush`] uploads the
//! vertices into a per-recorder vertex buffer and replays the batches into a
//! [`CommandRecorder`], switching pipeline state only when a batch's
//! configuration differs from the previous one.
//!
//! ```ignore
//! let lines = draw.create_program(&mut backend, &desc)?;
//! draw.set_program(lines)?;
//! draw.begin_lines();
//! draw.color([1.0, 0.0, 0.0, 1.0]);
//! draw.vertex([0.0, 0.0, 0.0]);
//! draw.vertex([1.0, 0.0, 0.0]);
//! draw.end_lines();
//! draw.flush(&mut backend, &mut recorder)?;
//! ```

use std::collections::HashMap;

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    backend::{BufferId, CommandRecorder, PipelineFactory, RecorderId, ResourceFactory},
    error::{Error, Result},
    pipelines::{
        BlendMode, CullMode, PipelineConfig, PrimitiveMode,
        program::{Program, ProgramDesc, ProgramId},
    },
};

/// Smallest vertex buffer a recorder gets, in bytes.
const MIN_VERTEX_BUFFER_SIZE: u64 = 4096;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub tex_coord: [f32; 2],
}

pub const DRAW_VERTEX_STRIDE: u32 = std::mem::size_of::<DrawVertex>() as u32;

#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub id: u32,
    pub program: Option<ProgramId>,
    pub config: PipelineConfig,
    pub mvp: Matrix4<f32>,
    pub start_vertex: u32,
    pub end_vertex: u32,
}

impl Batch {
    pub fn vertex_count(&self) -> u32 {
        self.end_vertex - self.start_vertex
    }
}

#[derive(Debug)]
struct RecorderBuffer {
    buffer: BufferId,
    capacity: u64,
}

#[derive(Debug)]
pub struct DrawContext {
    programs: HashMap<ProgramId, Program>,
    next_program: u32,
    vertices: Vec<DrawVertex>,
    batches: Vec<Batch>,
    next_batch_id: u32,
    /// Mode and batch index of the batch between `begin_*` and `end_*`.
    open: Option<(PrimitiveMode, usize)>,
    program: Option<ProgramId>,
    depth_read: bool,
    depth_write: bool,
    blend: BlendMode,
    cull: CullMode,
    mvp: Matrix4<f32>,
    color: [f32; 4],
    tex_coord: [f32; 2],
    vertex_buffers: HashMap<RecorderId, RecorderBuffer>,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawContext {
    pub fn new() -> Self {
        Self {
            programs: HashMap::new(),
            next_program: 1,
            vertices: Vec::new(),
            batches: Vec::new(),
            next_batch_id: 1,
            open: None,
            program: None,
            depth_read: false,
            depth_write: false,
            blend: BlendMode::None,
            cull: CullMode::None,
            mvp: Matrix4::identity(),
            color: [1.0, 1.0, 1.0, 1.0],
            tex_coord: [0.0, 0.0],
            vertex_buffers: HashMap::new(),
        }
    }

    // Programs

    /// Compiles `desc` and pre-builds a pipeline for every configuration.
    /// Nothing is registered when any of it fails.
    pub fn create_program(
        &mut self,
        device: &mut dyn PipelineFactory,
        desc: &ProgramDesc,
    ) -> Result<ProgramId> {
        let id = ProgramId(self.next_program);
        let program = Program::create(device, id, desc)?;
        self.next_program += 1;
        self.programs.insert(id, program);
        Ok(id)
    }

    pub fn destroy_program(&mut self, device: &mut dyn PipelineFactory, id: ProgramId) -> Result<()> {
        let program = self
            .programs
            .remove(&id)
            .ok_or_else(|| Error::invalid(format!("unknown program {id:?}")))?;
        program.destroy(device);
        if self.program == Some(id) {
            self.program = None;
        }
        Ok(())
    }

    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(&id)
    }

    // State

    pub fn set_program(&mut self, id: ProgramId) -> Result<()> {
        if !self.programs.contains_key(&id) {
            return Err(Error::invalid(format!("unknown program {id:?}")));
        }
        self.program = Some(id);
        Ok(())
    }

    pub fn depth_read(&mut self, enable: bool) {
        self.depth_read = enable;
    }

    pub fn depth_write(&mut self, enable: bool) {
        self.depth_write = enable;
    }

    pub fn blend_none(&mut self) {
        self.blend = BlendMode::None;
    }

    pub fn blend_alpha(&mut self) {
        self.blend = BlendMode::Alpha;
    }

    pub fn blend_additive(&mut self) {
        self.blend = BlendMode::Additive;
    }

    pub fn cull_none(&mut self) {
        self.cull = CullMode::None;
    }

    pub fn cull_back(&mut self) {
        self.cull = CullMode::Back;
    }

    pub fn cull_front(&mut self) {
        self.cull = CullMode::Front;
    }

    pub fn set_mvp(&mut self, mvp: Matrix4<f32>) {
        self.mvp = mvp;
    }

    /// Configuration the next batch of `primitive` would be drawn with.
    pub fn config(&self, primitive: PrimitiveMode) -> PipelineConfig {
        PipelineConfig::new(
            primitive,
            self.depth_read || self.depth_write,
            self.blend,
            self.cull,
        )
    }

    // Recording

    pub fn begin_lines(&mut self) -> u32 {
        self.begin(PrimitiveMode::Lines)
    }

    pub fn begin_triangles(&mut self) -> u32 {
        self.begin(PrimitiveMode::Triangles)
    }

    fn begin(&mut self, primitive: PrimitiveMode) -> u32 {
        if let Some((open, _)) = self.open {
            log::warn!("begin {primitive:?} while a {open:?} batch is open, closing it");
            self.end(open);
        }
        let id = self.next_batch_id;
        self.next_batch_id += 1;
        let start = self.vertices.len() as u32;
        self.batches.push(Batch {
            id,
            program: self.program,
            config: self.config(primitive),
            mvp: self.mvp,
            start_vertex: start,
            end_vertex: start,
        });
        self.open = Some((primitive, self.batches.len() - 1));
        id
    }

    /// Sticky vertex colour.
    pub fn color(&mut self, color: [f32; 4]) {
        self.color = color;
    }

    /// Sticky texture coordinate.
    pub fn tex_coord(&mut self, tex_coord: [f32; 2]) {
        self.tex_coord = tex_coord;
    }

    pub fn vertex(&mut self, position: [f32; 3]) {
        let Some((_, batch)) = self.open else {
            log::warn!("vertex outside of a batch is ignored");
            return;
        };
        self.vertices.push(DrawVertex {
            position,
            color: self.color,
            tex_coord: self.tex_coord,
        });
        self.batches[batch].end_vertex = self.vertices.len() as u32;
    }

    pub fn end_lines(&mut self) {
        self.end(PrimitiveMode::Lines)
    }

    pub fn end_triangles(&mut self) {
        self.end(PrimitiveMode::Triangles)
    }

    fn end(&mut self, primitive: PrimitiveMode) {
        let Some((open, batch)) = self.open.take() else {
            log::warn!("end {primitive:?} without a matching begin");
            return;
        };
        if open != primitive {
            log::error!("end {primitive:?} closes a {open:?} batch");
        }
        let count = self.batches[batch].vertex_count();
        let per_primitive = match open {
            PrimitiveMode::Lines => 2,
            PrimitiveMode::Triangles => 3,
        };
        if count % per_primitive != 0 {
            log::warn!("{open:?} batch ends with {count} vertices, not a multiple of {per_primitive}");
        }
    }

    /// Overrides the MVP matrix of an already recorded batch.
    pub fn set_batch_matrix(&mut self, batch_id: u32, mvp: Matrix4<f32>) -> Result<()> {
        let batch = self
            .batches
            .iter_mut()
            .find(|batch| batch.id == batch_id)
            .ok_or_else(|| Error::invalid(format!("no batch with id {batch_id}")))?;
        batch.mvp = mvp;
        Ok(())
    }

    pub fn vertices(&self) -> &[DrawVertex] {
        &self.vertices
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn vertex_buffer(&self, recorder: RecorderId) -> Option<BufferId> {
        self.vertex_buffers.get(&recorder).map(|entry| entry.buffer)
    }

    // Submission

    /// Uploads the recorded vertices and replays every batch into `recorder`.
    pub fn flush(
        &mut self,
        device: &mut dyn ResourceFactory,
        recorder: &mut dyn CommandRecorder,
    ) -> Result<()> {
        if self.vertices.is_empty() {
            return Ok(());
        }
        if let Some((open, _)) = self.open {
            log::warn!("flushing while a {open:?} batch is open");
        }

        let size = self.vertices.len() as u64 * DRAW_VERTEX_STRIDE as u64;
        let buffer = self.vertex_buffer_for(device, recorder.recorder_id(), size)?;
        let bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let mapped = device.map_buffer(buffer)?;
        mapped[..bytes.len()].copy_from_slice(bytes);
        device.unmap_buffer(buffer);
        recorder.set_vertex_buffer(0, buffer, size, DRAW_VERTEX_STRIDE);

        let mut bound: Option<(ProgramId, u32)> = None;
        for batch in &self.batches {
            let Some(program_id) = batch.program else {
                log::error!("batch {} was recorded without a program", batch.id);
                continue;
            };
            let Some(program) = self.programs.get(&program_id) else {
                log::error!("batch {} uses unknown program {program_id:?}", batch.id);
                continue;
            };
            let key = (program_id, batch.config.mask());
            if bound != Some(key) {
                let Some(pipeline) = program.pipeline(batch.config) else {
                    log::error!("program '{}' lacks pipeline {:?}", program.label, batch.config);
                    continue;
                };
                recorder.set_root_signature(program.root_signature);
                recorder.set_pipeline_state(pipeline);
                recorder.set_primitive_topology(batch.config.topology());
                bound = Some(key);
            }
            let matrix: [[f32; 4]; 4] = batch.mvp.into();
            let constants: [u32; 16] = bytemuck::cast(matrix);
            recorder.set_root_constants_32bit(0, &constants);
            recorder.draw_instanced(batch.vertex_count(), 1, batch.start_vertex, 0);
        }
        Ok(())
    }

    /// Returns the recorder's vertex buffer, growing it to the next power of
    /// two when it cannot hold `size` bytes.
    fn vertex_buffer_for(
        &mut self,
        device: &mut dyn ResourceFactory,
        recorder: RecorderId,
        size: u64,
    ) -> Result<BufferId> {
        if let Some(entry) = self.vertex_buffers.get(&recorder) {
            if entry.capacity >= size {
                return Ok(entry.buffer);
            }
        }
        let capacity = size.next_power_of_two().max(MIN_VERTEX_BUFFER_SIZE);
        let buffer = device.create_buffer(capacity, None, true)?;
        if let Some(old) = self
            .vertex_buffers
            .insert(recorder, RecorderBuffer { buffer, capacity })
        {
            device.destroy_buffer(old.buffer);
        }
        log::debug!("Vertex buffer of {recorder:?} grown to {capacity} bytes");
        Ok(buffer)
    }

    /// Drops all recorded vertices and batches. Programs and vertex buffers
    /// are kept.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.batches.clear();
        self.open = None;
    }

    /// Destroys every program and cached vertex buffer.
    pub fn release<D>(&mut self, device: &mut D)
    where
        D: ResourceFactory + PipelineFactory,
    {
        self.reset();
        for (_, program) in self.programs.drain() {
            program.destroy(device);
        }
        for (_, entry) in self.vertex_buffers.drain() {
            device.destroy_buffer(entry.buffer);
        }
        self.program = None;
    }
}

impl Drop for DrawContext {
    fn drop(&mut self) {
        if !self.programs.is_empty() || !self.vertex_buffers.is_empty() {
            log::warn!(
                "DrawContext dropped with {} programs and {} vertex buffers still alive",
                self.programs.len(),
                self.vertex_buffers.len()
            );
        }
    }
}
