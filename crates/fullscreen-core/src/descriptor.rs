use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Material — the only thing the core needs to know about a shader asset
// ---------------------------------------------------------------------------

/// A shader/parameter-binding object owned by the host's asset system.
pub trait Material {
    fn name(&self) -> &str;

    /// Number of passes the material exposes. Valid pass indices are
    /// `0..pass_count()`.
    fn pass_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// InjectionPoint
// ---------------------------------------------------------------------------

/// Stage of the host's fixed pipeline at which a pass is inserted.
///
/// Ordering follows [`InjectionPoint::order`], so sorting passes by injection
/// point yields the host's execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InjectionPoint {
    BeforeRendering,
    BeforeRenderingShadows,
    AfterRenderingShadows,
    BeforeRenderingPrePasses,
    AfterRenderingPrePasses,
    BeforeRenderingOpaques,
    AfterRenderingOpaques,
    BeforeRenderingSkybox,
    AfterRenderingSkybox,
    BeforeRenderingTransparents,
    AfterRenderingTransparents,
    BeforeRenderingPostProcessing,
    #[default]
    AfterRenderingPostProcessing,
    AfterRendering,
}

impl InjectionPoint {
    pub const ALL: [InjectionPoint; 14] = [
        InjectionPoint::BeforeRendering,
        InjectionPoint::BeforeRenderingShadows,
        InjectionPoint::AfterRenderingShadows,
        InjectionPoint::BeforeRenderingPrePasses,
        InjectionPoint::AfterRenderingPrePasses,
        InjectionPoint::BeforeRenderingOpaques,
        InjectionPoint::AfterRenderingOpaques,
        InjectionPoint::BeforeRenderingSkybox,
        InjectionPoint::AfterRenderingSkybox,
        InjectionPoint::BeforeRenderingTransparents,
        InjectionPoint::AfterRenderingTransparents,
        InjectionPoint::BeforeRenderingPostProcessing,
        InjectionPoint::AfterRenderingPostProcessing,
        InjectionPoint::AfterRendering,
    ];

    /// Numeric sort key. Gaps leave room for host-defined stages.
    pub fn order(self) -> u32 {
        match self {
            InjectionPoint::BeforeRendering => 0,
            InjectionPoint::BeforeRenderingShadows => 50,
            InjectionPoint::AfterRenderingShadows => 100,
            InjectionPoint::BeforeRenderingPrePasses => 150,
            InjectionPoint::AfterRenderingPrePasses => 200,
            InjectionPoint::BeforeRenderingOpaques => 250,
            InjectionPoint::AfterRenderingOpaques => 300,
            InjectionPoint::BeforeRenderingSkybox => 350,
            InjectionPoint::AfterRenderingSkybox => 400,
            InjectionPoint::BeforeRenderingTransparents => 450,
            InjectionPoint::AfterRenderingTransparents => 500,
            InjectionPoint::BeforeRenderingPostProcessing => 550,
            InjectionPoint::AfterRenderingPostProcessing => 600,
            InjectionPoint::AfterRendering => 1000,
        }
    }
}

impl PartialOrd for InjectionPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InjectionPoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order().cmp(&other.order())
    }
}

// ---------------------------------------------------------------------------
// InputRequirements — which upstream buffers the pass reads
// ---------------------------------------------------------------------------

/// One upstream buffer a pass can ask the host to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
    Color,
    Depth,
    Normal,
    Motion,
}

impl InputKind {
    fn bit(self) -> u8 {
        match self {
            InputKind::Color => 1 << 0,
            InputKind::Depth => 1 << 1,
            InputKind::Normal => 1 << 2,
            InputKind::Motion => 1 << 3,
        }
    }
}

/// Bit-set of [`InputKind`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputRequirements(u8);

impl InputRequirements {
    pub const NONE: Self = Self(0);
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);
    pub const NORMAL: Self = Self(1 << 2);
    pub const MOTION: Self = Self(1 << 3);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has(self, kind: InputKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: InputKind) {
        self.0 |= kind.bit();
    }

    /// Kinds in `self` that are not in `other`.
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterate the contained kinds in declaration order.
    pub fn iter(self) -> impl Iterator<Item = InputKind> {
        [
            InputKind::Color,
            InputKind::Depth,
            InputKind::Normal,
            InputKind::Motion,
        ]
        .into_iter()
        .filter(move |k| self.has(*k))
    }
}

impl BitOr for InputRequirements {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InputRequirements {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<InputKind> for InputRequirements {
    fn from_iter<I: IntoIterator<Item = InputKind>>(iter: I) -> Self {
        let mut out = Self::NONE;
        for kind in iter {
            out.insert(kind);
        }
        out
    }
}

impl fmt::Debug for InputRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// EffectPassDescriptor / ValidatedConfig
// ---------------------------------------------------------------------------

/// User-facing configuration of a full-screen effect. May be invalid; only
/// [`validate`] turns it into something a pass can run with.
pub struct EffectPassDescriptor<M> {
    pub injection_point: InjectionPoint,
    pub input_requirements: InputRequirements,
    /// Shared with the asset system, which may swap or drop it at runtime.
    pub material: Option<Arc<M>>,
    pub pass_sub_index: i32,
    /// Draw from a scratch copy of the color target instead of the live one.
    pub fetch_color_buffer: bool,
}

impl<M> Default for EffectPassDescriptor<M> {
    fn default() -> Self {
        Self {
            injection_point: InjectionPoint::default(),
            input_requirements: InputRequirements::NONE,
            material: None,
            pass_sub_index: 0,
            fetch_color_buffer: true,
        }
    }
}

impl<M> Clone for EffectPassDescriptor<M> {
    fn clone(&self) -> Self {
        Self {
            injection_point: self.injection_point,
            input_requirements: self.input_requirements,
            material: self.material.clone(),
            pass_sub_index: self.pass_sub_index,
            fetch_color_buffer: self.fetch_color_buffer,
        }
    }
}

impl<M: Material> fmt::Debug for EffectPassDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectPassDescriptor")
            .field("injection_point", &self.injection_point)
            .field("input_requirements", &self.input_requirements)
            .field("material", &self.material.as_ref().map(|m| m.name()))
            .field("pass_sub_index", &self.pass_sub_index)
            .field("fetch_color_buffer", &self.fetch_color_buffer)
            .finish()
    }
}

impl<M: Material> EffectPassDescriptor<M> {
    pub fn validate(&self) -> Result<ValidatedConfig<M>, ConfigError> {
        validate(self)
    }
}

/// A descriptor that passed [`validate`]. Immutable; the material is present
/// and `pass_index < material.pass_count()`.
pub struct ValidatedConfig<M> {
    material: Arc<M>,
    pass_index: usize,
    input_requirements: InputRequirements,
    injection_point: InjectionPoint,
    fetch_color_buffer: bool,
}

impl<M> Clone for ValidatedConfig<M> {
    fn clone(&self) -> Self {
        Self {
            material: Arc::clone(&self.material),
            pass_index: self.pass_index,
            input_requirements: self.input_requirements,
            injection_point: self.injection_point,
            fetch_color_buffer: self.fetch_color_buffer,
        }
    }
}

impl<M: Material> fmt::Debug for ValidatedConfig<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("material", &self.material.name())
            .field("pass_index", &self.pass_index)
            .field("input_requirements", &self.input_requirements)
            .field("injection_point", &self.injection_point)
            .field("fetch_color_buffer", &self.fetch_color_buffer)
            .finish()
    }
}

impl<M> ValidatedConfig<M> {
    pub fn material(&self) -> &Arc<M> {
        &self.material
    }

    pub fn pass_index(&self) -> usize {
        self.pass_index
    }

    pub fn input_requirements(&self) -> InputRequirements {
        self.input_requirements
    }

    pub fn injection_point(&self) -> InjectionPoint {
        self.injection_point
    }

    pub fn fetch_color_buffer(&self) -> bool {
        self.fetch_color_buffer
    }
}

/// Check a descriptor against its material.
pub fn validate<M: Material>(
    descriptor: &EffectPassDescriptor<M>,
) -> Result<ValidatedConfig<M>, ConfigError> {
    let material = descriptor
        .material
        .as_ref()
        .ok_or(ConfigError::MissingMaterial)?;

    let pass_count = material.pass_count();
    let pass_index = usize::try_from(descriptor.pass_sub_index)
        .ok()
        .filter(|&i| i < pass_count)
        .ok_or_else(|| ConfigError::PassIndexOutOfRange {
            material: material.name().to_owned(),
            index: descriptor.pass_sub_index,
            pass_count,
        })?;

    Ok(ValidatedConfig {
        material: Arc::clone(material),
        pass_index,
        input_requirements: descriptor.input_requirements,
        injection_point: descriptor.injection_point,
        fetch_color_buffer: descriptor.fetch_color_buffer,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
