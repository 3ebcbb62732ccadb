use std::fmt::Debug;

use glam::Vec4;

use crate::descriptor::{InputRequirements, Material};
use crate::error::ResourceError;
use crate::frame::{FrameContext, TargetDescriptor};

/// Identity scale/bias: sample the whole source, no sub-rect offset.
pub const BLIT_SCALE_BIAS: Vec4 = Vec4::new(1.0, 1.0, 0.0, 0.0);

// ---------------------------------------------------------------------------
// Host — everything the core asks of the rendering engine it runs inside
// ---------------------------------------------------------------------------

/// The rendering engine that owns frame scheduling, GPU allocation and
/// command execution. Passes only ever talk to the GPU through this trait.
///
/// Handle types are small `Copy` ids; the host keeps the real objects.
pub trait Host {
    type Material: Material;
    type Target: Copy + Eq + Debug;
    type Texture: Copy + Eq + Debug;
    type CommandBuffer;

    /// The color target the current view renders into.
    fn live_color_target(&mut self, frame: &FrameContext) -> Result<Self::Target, ResourceError>;

    /// Allocate a sampleable, renderable color texture matching `desc`.
    fn allocate_texture(
        &mut self,
        label: &str,
        desc: &TargetDescriptor,
    ) -> Result<Self::Texture, ResourceError>;

    fn release_texture(&mut self, texture: Self::Texture);

    /// Bind `target` as the output of subsequent draws in `cmd`.
    fn set_render_target(&mut self, cmd: &mut Self::CommandBuffer, target: Self::Target);

    /// Full-screen copy of `source` into `dest`, reading mip `mip`.
    fn record_blit(
        &mut self,
        cmd: &mut Self::CommandBuffer,
        source: Self::Target,
        dest: Self::Texture,
        scale_bias: Vec4,
        mip: u32,
    ) -> Result<(), ResourceError>;

    /// Procedural draw into the currently bound render target.
    fn record_draw(
        &mut self,
        cmd: &mut Self::CommandBuffer,
        draw: &DrawCall<'_, Self::Material, Self::Texture>,
    ) -> Result<(), ResourceError>;

    /// Auxiliary inputs this host can produce for passes that request them.
    fn supported_inputs(&self) -> InputRequirements {
        InputRequirements::COLOR
    }

    /// User-visible diagnostic (misconfigured assets, persistent failures).
    fn emit_warning(&mut self, message: &str) {
        log::warn!("{message}");
    }

    fn push_debug_group(&mut self, _cmd: &mut Self::CommandBuffer, _label: &str) {}

    fn pop_debug_group(&mut self, _cmd: &mut Self::CommandBuffer) {}
}

// ---------------------------------------------------------------------------
// Draw description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Triangles,
}

/// A single procedural draw (no vertex buffers) handed to
/// [`Host::record_draw`].
#[derive(Debug)]
pub struct DrawCall<'a, M, T> {
    pub material: &'a M,
    pub pass_index: usize,
    pub vertex_count: u32,
    pub instance_count: u32,
    pub topology: Topology,
    pub params: &'a ParamBlock<T>,
}

impl<'a, M, T> DrawCall<'a, M, T> {
    /// The oversized triangle covering the whole viewport.
    pub fn fullscreen_triangle(
        material: &'a M,
        pass_index: usize,
        params: &'a ParamBlock<T>,
    ) -> Self {
        Self {
            material,
            pass_index,
            vertex_count: 3,
            instance_count: 1,
            topology: Topology::Triangles,
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// ParamBlock — per-draw shader constants
// ---------------------------------------------------------------------------

/// Shader-visible constants attached to one draw.
///
/// Owned by a single pass and reused across frames; callers must
/// [`clear`](ParamBlock::clear) it before filling it for a new draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBlock<T> {
    scale_bias: Vec4,
    blit_texture: Option<T>,
}

impl<T> Default for ParamBlock<T> {
    fn default() -> Self {
        Self {
            scale_bias: Vec4::ZERO,
            blit_texture: None,
        }
    }
}

impl<T: Copy> ParamBlock<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.scale_bias = Vec4::ZERO;
        self.blit_texture = None;
    }

    pub fn set_scale_bias(&mut self, scale_bias: Vec4) {
        self.scale_bias = scale_bias;
    }

    /// Texture the material samples as its source image.
    pub fn set_blit_texture(&mut self, texture: T) {
        self.blit_texture = Some(texture);
    }

    pub fn scale_bias(&self) -> Vec4 {
        self.scale_bias
    }

    pub fn blit_texture(&self) -> Option<T> {
        self.blit_texture
    }
}
