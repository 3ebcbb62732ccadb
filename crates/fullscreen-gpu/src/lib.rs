//! wgpu implementation of the `fullscreen-core` [`Host`](fullscreen_core::Host).

pub mod context;
pub mod format;
pub mod host;
pub mod material;
pub mod shaders;
mod uniforms;

pub use context::{BlitParams, ContextError, GpuContext};
pub use host::{TargetId, TextureId, WgpuHost};
pub use material::{MaterialError, WgpuMaterial};
