/// Element format of a buffer view or image texel.
///
/// `Unknown` marks an absent vertex stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    #[default]
    Unknown,
    R8Uint,
    R16Uint,
    R32Uint,
    R32Float,
    Rg32Float,
    Rgb32Float,
    Rgba32Float,
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
}

impl Format {
    /// Size of one element (or texel) in bytes, `0` for `Unknown`.
    pub fn size_in_bytes(self) -> u32 {
        match self {
            Format::Unknown => 0,
            Format::R8Uint | Format::R8Unorm => 1,
            Format::R16Uint | Format::Rg8Unorm => 2,
            Format::R32Uint
            | Format::R32Float
            | Format::Rgba8Unorm
            | Format::Rgba8UnormSrgb
            | Format::Bgra8Unorm => 4,
            Format::Rg32Float | Format::Rgba16Float => 8,
            Format::Rgb32Float => 12,
            Format::Rgba32Float => 16,
        }
    }

    pub fn is_index(self) -> bool {
        matches!(self, Format::R8Uint | Format::R16Uint | Format::R32Uint)
    }

    /// Whether images may be created with this format.
    pub fn is_image_format(self) -> bool {
        matches!(
            self,
            Format::R8Unorm
                | Format::Rg8Unorm
                | Format::Rgba8Unorm
                | Format::Rgba8UnormSrgb
                | Format::Bgra8Unorm
                | Format::Rgba16Float
                | Format::R32Float
                | Format::Rgba32Float
        )
    }
}
