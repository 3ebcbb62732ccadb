/// Color formats a host can hand to the core. Hosts map these onto their
/// native format enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgb10a2Unorm,
    Rgba16Float,
    Rgba32Float,
}

/// Shape of a render target: what the color copy has to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub sample_count: u32,
    pub depth_bits: u32,
}

impl TargetDescriptor {
    pub fn new(width: u32, height: u32, format: ColorFormat) -> Self {
        Self {
            width,
            height,
            format,
            sample_count: 1,
            depth_bits: 0,
        }
    }

    /// Descriptor for a sampleable copy of this target: single-sampled and
    /// without depth.
    pub fn color_copy(&self) -> Self {
        Self {
            sample_count: 1,
            depth_bits: 0,
            ..*self
        }
    }
}

/// What the current camera/view is rendering for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewKind {
    #[default]
    Game,
    SceneView,
    /// Asset preview thumbnails.
    Preview,
    /// Environment reflection capture.
    Reflection,
    /// Camera rendering only into an offscreen depth texture.
    OffscreenDepth,
}

impl ViewKind {
    /// Whether the view has a color target a full-screen effect can
    /// composite into.
    pub fn has_composite_target(self) -> bool {
        matches!(self, ViewKind::Game | ViewKind::SceneView)
    }
}

/// Per-frame information the host passes to features and passes. Borrowed
/// for one frame only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub frame_index: u64,
    pub view: ViewKind,
    pub target: TargetDescriptor,
}

impl FrameContext {
    pub fn new(frame_index: u64, view: ViewKind, target: TargetDescriptor) -> Self {
        Self {
            frame_index,
            view,
            target,
        }
    }
}
