//! Renderer-agnostic full-screen effect passes.
//!
//! A [`FullScreenFeature`] validates an [`EffectPassDescriptor`] every frame
//! and, when it is usable, enqueues a [`FullScreenEffectPass`] into the host's
//! [`PassQueue`]. The pass optionally copies the live color target, then draws
//! a single full-screen triangle with the configured material pass.
//!
//! Everything GPU-specific lives behind the [`Host`] trait.

pub mod descriptor;
pub mod error;
pub mod feature;
pub mod frame;
pub mod host;
pub mod pass;
pub mod queue;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_host;

pub use descriptor::{
    validate, EffectPassDescriptor, InjectionPoint, InputKind, InputRequirements, Material,
    ValidatedConfig,
};
pub use error::{ConfigError, PassError, ResourceError, SettingsError};
pub use feature::{EnqueuedPass, FullScreenFeature, RendererFeature, SkipReason, WarningPolicy};
pub use frame::{ColorFormat, FrameContext, TargetDescriptor, ViewKind};
pub use host::{DrawCall, Host, ParamBlock, Topology, BLIT_SCALE_BIAS};
pub use pass::{FullScreenEffectPass, PassState, RenderPass};
pub use queue::PassQueue;
pub use settings::{FeatureSettings, MaterialLibrary};
