use crate::backend::BufferId;

use super::format::Format;

/// A GPU buffer owned by the scene graph. The size never changes once created.
#[derive(Clone, Debug)]
pub struct Buffer {
    pub name: String,
    pub size: u64,
    pub mappable: bool,
    pub resource: BufferId,
}

/// A typed window into a buffer.
///
/// Views are stored next to the buffer they index into (a mesh and its
/// backing buffer), so they only carry offsets. `format == Format::Unknown`
/// marks a vertex stream that is absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferView {
    pub offset: u64,
    pub size: u64,
    pub stride: u32,
    pub format: Format,
    pub count: u32,
}

impl BufferView {
    pub fn new(offset: u64, format: Format, count: u32) -> Self {
        let stride = format.size_in_bytes();
        Self {
            offset,
            size: stride as u64 * count as u64,
            stride,
            format,
            count,
        }
    }

    pub fn is_present(&self) -> bool {
        self.format != Format::Unknown
    }

    /// Whether the view lies inside a buffer of `buffer_size` bytes and covers
    /// a whole number of elements.
    pub fn fits(&self, buffer_size: u64) -> bool {
        let in_bounds = self
            .offset
            .checked_add(self.size)
            .is_some_and(|end| end <= buffer_size);
        let whole = self.stride == 0 || self.size % self.stride as u64 == 0;
        in_bounds && whole
    }
}
