//! Images, samplers and the textures pairing them.
//!
//! Images and samplers are owned by the [`SceneGraph`](super::scene_graph::SceneGraph);
//! a [`Texture`] only stores indices into the graph's arrays, which stay valid
//! for the graph's lifetime. The five per-slot default images used in place of
//! missing material textures are described by [`DefaultImage`].

use crate::backend::{ImageId, SamplerId};

use super::{ImageRef, SamplerRef, format::Format};

/// Where one mip level starts in the source bytes of an image upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipOffset {
    pub offset: u64,
    pub row_stride: u32,
}

/// Length of the full mip chain of a `width`×`height` image.
pub fn max_mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).leading_zeros()
}

/// Extent of mip `level` along one axis, never below one texel.
pub fn mip_extent(extent: u32, level: usize) -> u32 {
    u32::try_from(level)
        .ok()
        .and_then(|level| extent.checked_shr(level))
        .unwrap_or(0)
        .max(1)
}

/// Tightly packed RGBA8 pixels, as produced by the bitmap decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A bitmap filled with a single colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .cycle()
            .take(width as usize * height as usize * 4)
            .copied()
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn row_stride(&self) -> u32 {
        self.width * 4
    }
}

/// A GPU image. Contents are immutable after creation.
#[derive(Clone, Debug)]
pub struct Image {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub resource: ImageId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Clamp,
    #[default]
    Wrap,
    Mirror,
    Border,
}

/// The six-tuple samplers are deduplicated on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
}

impl SamplerDesc {
    pub fn uniform(filter: FilterMode, address: AddressMode) -> Self {
        Self {
            min_filter: filter,
            mag_filter: filter,
            mip_filter: filter,
            address_u: address,
            address_v: address,
            address_w: address,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Sampler {
    pub name: String,
    pub desc: SamplerDesc,
    pub resource: SamplerId,
}

/// An image paired with the sampler it is read through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texture {
    pub name: String,
    pub image: ImageRef,
    pub sampler: SamplerRef,
}

/// The 1×1 images standing in for absent material texture slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefaultImage {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

impl DefaultImage {
    pub const ALL: [DefaultImage; 5] = [
        DefaultImage::BaseColor,
        DefaultImage::MetallicRoughness,
        DefaultImage::Normal,
        DefaultImage::Occlusion,
        DefaultImage::Emissive,
    ];

    pub fn pixel(self) -> [u8; 4] {
        match self {
            DefaultImage::BaseColor => [255, 255, 255, 255],
            // G holds roughness, B metalness
            DefaultImage::MetallicRoughness => [0, 128, 128, 255],
            DefaultImage::Normal => [128, 128, 255, 255],
            DefaultImage::Occlusion => [255, 255, 255, 255],
            DefaultImage::Emissive => [0, 0, 0, 255],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DefaultImage::BaseColor => "default base color",
            DefaultImage::MetallicRoughness => "default metallic roughness",
            DefaultImage::Normal => "default normal map",
            DefaultImage::Occlusion => "default occlusion",
            DefaultImage::Emissive => "default emissive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_length_follows_the_longer_side() {
        assert_eq!(max_mip_levels(1, 1), 1);
        assert_eq!(max_mip_levels(2, 2), 2);
        assert_eq!(max_mip_levels(256, 16), 9);
        assert_eq!(max_mip_levels(u32::MAX, 1), 32);
    }

    #[test]
    fn mip_extent_stops_at_one_texel() {
        assert_eq!(mip_extent(8, 1), 4);
        assert_eq!(mip_extent(8, 5), 1);
        assert_eq!(mip_extent(8, 40), 1);
    }
}
