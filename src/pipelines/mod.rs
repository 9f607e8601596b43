//! Pipeline-state configuration for the immediate-mode draw context.
//!
//! A [`PipelineConfig`] packs the fixed-function state that varies between
//! draw batches into a 13 bit mask:
//!
//! | bits   | field            |
//! |--------|------------------|
//! | 0..4   | primitive mode   |
//! | 4      | depth enable     |
//! | 5..9   | blend mode       |
//! | 9..13  | cull mode        |
//!
//! The mask doubles as the key of a program's pipeline map, so switching state
//! during a flush is a single `u32` compare.

pub mod program;

pub use program::{Program, ProgramDesc, ProgramId, ShaderSource};

const PRIMITIVE_SHIFT: u32 = 0;
const DEPTH_SHIFT: u32 = 4;
const BLEND_SHIFT: u32 = 5;
const CULL_SHIFT: u32 = 9;
const FIELD_MASK: u32 = 0xF;

/// Number of pipeline states pre-built for every program.
pub const NUM_PIPELINE_CONFIGS: usize = 2 * 2 * 3 * 3;

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Lines = 0,
    #[default]
    Triangles = 1,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    None = 0,
    Alpha = 1,
    Additive = 2,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    #[default]
    None = 0,
    Back = 1,
    Front = 2,
}

/// Topology the command recorder is switched to for a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    LineList,
    TriangleList,
}

impl PrimitiveMode {
    pub const ALL: [PrimitiveMode; 2] = [PrimitiveMode::Lines, PrimitiveMode::Triangles];

    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(PrimitiveMode::Lines),
            1 => Some(PrimitiveMode::Triangles),
            _ => None,
        }
    }

    pub fn topology(self) -> PrimitiveTopology {
        match self {
            PrimitiveMode::Lines => PrimitiveTopology::LineList,
            PrimitiveMode::Triangles => PrimitiveTopology::TriangleList,
        }
    }
}

impl BlendMode {
    pub const ALL: [BlendMode; 3] = [BlendMode::None, BlendMode::Alpha, BlendMode::Additive];

    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(BlendMode::None),
            1 => Some(BlendMode::Alpha),
            2 => Some(BlendMode::Additive),
            _ => None,
        }
    }
}

impl CullMode {
    pub const ALL: [CullMode; 3] = [CullMode::None, CullMode::Back, CullMode::Front];

    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(CullMode::None),
            1 => Some(CullMode::Back),
            2 => Some(CullMode::Front),
            _ => None,
        }
    }
}

/// Compact fixed-function state of one draw batch.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineConfig {
    mask: u32,
}

impl PipelineConfig {
    pub fn new(
        primitive: PrimitiveMode,
        depth_enable: bool,
        blend: BlendMode,
        cull: CullMode,
    ) -> Self {
        let mask = ((primitive as u32) << PRIMITIVE_SHIFT)
            | ((depth_enable as u32) << DEPTH_SHIFT)
            | ((blend as u32) << BLEND_SHIFT)
            | ((cull as u32) << CULL_SHIFT);
        Self { mask }
    }

    /// Rebuilds a config from a raw mask, rejecting bit patterns no
    /// combination of the enums produces.
    pub fn from_mask(mask: u32) -> Option<Self> {
        if mask >> (CULL_SHIFT + 4) != 0 {
            return None;
        }
        let primitive = PrimitiveMode::from_bits((mask >> PRIMITIVE_SHIFT) & FIELD_MASK)?;
        let blend = BlendMode::from_bits((mask >> BLEND_SHIFT) & FIELD_MASK)?;
        let cull = CullMode::from_bits((mask >> CULL_SHIFT) & FIELD_MASK)?;
        let depth = (mask >> DEPTH_SHIFT) & 1 == 1;
        Some(Self::new(primitive, depth, blend, cull))
    }

    pub fn mask(self) -> u32 {
        self.mask
    }

    pub fn primitive_mode(self) -> PrimitiveMode {
        PrimitiveMode::from_bits((self.mask >> PRIMITIVE_SHIFT) & FIELD_MASK)
            .unwrap_or_default()
    }

    pub fn depth_enable(self) -> bool {
        (self.mask >> DEPTH_SHIFT) & 1 == 1
    }

    pub fn blend_mode(self) -> BlendMode {
        BlendMode::from_bits((self.mask >> BLEND_SHIFT) & FIELD_MASK).unwrap_or_default()
    }

    pub fn cull_mode(self) -> CullMode {
        CullMode::from_bits((self.mask >> CULL_SHIFT) & FIELD_MASK).unwrap_or_default()
    }

    pub fn topology(self) -> PrimitiveTopology {
        self.primitive_mode().topology()
    }

    /// All valid configurations, in a fixed order.
    pub fn all() -> impl Iterator<Item = PipelineConfig> {
        PrimitiveMode::ALL.into_iter().flat_map(|primitive| {
            [false, true].into_iter().flat_map(move |depth| {
                BlendMode::ALL.into_iter().flat_map(move |blend| {
                    CullMode::ALL
                        .into_iter()
                        .map(move |cull| PipelineConfig::new(primitive, depth, blend, cull))
                })
            })
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(
            PrimitiveMode::Triangles,
            false,
            BlendMode::None,
            CullMode::None,
        )
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("mask", &format_args!("{:#06x}", self.mask))
            .field("primitive", &self.primitive_mode())
            .field("depth", &self.depth_enable())
            .field("blend", &self.blend_mode())
            .field("cull", &self.cull_mode())
            .finish()
    }
}
