//! PBR metallic-roughness materials and their shader-visible packing.

use super::TextureRef;

/// The five texture slots of a material, in the order their transforms are
/// looked up and their indices are packed.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor = 0,
    MetallicRoughness = 1,
    Normal = 2,
    Occlusion = 3,
    Emissive = 4,
}

pub const NUM_TEXTURE_SLOTS: usize = 5;

impl TextureSlot {
    pub const ALL: [TextureSlot; NUM_TEXTURE_SLOTS] = [
        TextureSlot::BaseColor,
        TextureSlot::MetallicRoughness,
        TextureSlot::Normal,
        TextureSlot::Occlusion,
        TextureSlot::Emissive,
    ];

    /// Bit set in [`MaterialParams::flags`] when this slot holds a texture.
    /// Bit 0 is reserved.
    pub fn flag(self) -> u32 {
        1 << (self as u32 + 1)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Affine transform applied to texture coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexCoordTransform {
    pub translate: [f32; 2],
    pub rotate: f32,
    pub scale: [f32; 2],
}

impl Default for TexCoordTransform {
    fn default() -> Self {
        Self {
            translate: [0.0, 0.0],
            rotate: 0.0,
            scale: [1.0, 1.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub emissive_strength: f32,
    /// Indexed by [`TextureSlot`]; `None` falls back to the slot's default image.
    pub textures: [Option<TextureRef>; NUM_TEXTURE_SLOTS],
    /// The transform shaders see: the first one found in slot order.
    pub tex_coord_transform: TexCoordTransform,
    /// Transforms as declared per slot, for consumers that can use them.
    pub slot_transforms: [Option<TexCoordTransform>; NUM_TEXTURE_SLOTS],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            emissive_strength: 1.0,
            textures: [None; NUM_TEXTURE_SLOTS],
            tex_coord_transform: TexCoordTransform::default(),
            slot_transforms: [None; NUM_TEXTURE_SLOTS],
        }
    }
}

impl Material {
    pub fn texture(&self, slot: TextureSlot) -> Option<TextureRef> {
        self.textures[slot.index()]
    }

    pub fn flags(&self) -> u32 {
        TextureSlot::ALL
            .iter()
            .filter(|slot| self.texture(**slot).is_some())
            .fold(0, |flags, slot| flags | slot.flag())
    }

    /// Collapses the per-slot transforms into one, taking the first slot that
    /// declares a transform.
    pub fn collapse_transforms(&mut self) {
        self.tex_coord_transform = self
            .slot_transforms
            .iter()
            .flatten()
            .next()
            .copied()
            .unwrap_or_default();
    }
}

/// Image and sampler slot a shader reads one texture through.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextureIndices {
    pub image: u32,
    pub sampler: u32,
}

/// One material as laid out in the material buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialParams {
    pub flags: u32,
    pub base_color: [f32; 3],
    pub roughness: f32,
    pub metallic: f32,
    pub textures: [TextureIndices; NUM_TEXTURE_SLOTS],
    pub tc_translate: [f32; 2],
    pub tc_scale: [f32; 2],
    pub tc_rotate: f32,
    _padding: [u32; 3],
}

impl MaterialParams {
    pub fn new(material: &Material, textures: [TextureIndices; NUM_TEXTURE_SLOTS]) -> Self {
        let transform = material.tex_coord_transform;
        Self {
            flags: material.flags(),
            base_color: [
                material.base_color[0],
                material.base_color[1],
                material.base_color[2],
            ],
            roughness: material.roughness,
            metallic: material.metallic,
            textures,
            tc_translate: transform.translate,
            tc_scale: transform.scale,
            tc_rotate: transform.rotate,
            _padding: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<MaterialParams>() % 16, 0);
    }

    #[test]
    fn first_declared_transform_wins() {
        let normal = TexCoordTransform {
            translate: [0.5, 0.0],
            rotate: 0.0,
            scale: [2.0, 2.0],
        };
        let emissive = TexCoordTransform {
            rotate: 1.0,
            ..Default::default()
        };
        let mut material = Material::default();
        material.slot_transforms[TextureSlot::Normal.index()] = Some(normal);
        material.slot_transforms[TextureSlot::Emissive.index()] = Some(emissive);
        material.collapse_transforms();
        assert_eq!(material.tex_coord_transform, normal);
    }
}
