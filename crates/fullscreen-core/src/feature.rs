use serde::{Deserialize, Serialize};

use crate::descriptor::{EffectPassDescriptor, InjectionPoint, InputRequirements};
use crate::error::ConfigError;
use crate::frame::{FrameContext, ViewKind};
use crate::host::Host;
use crate::pass::{FullScreenEffectPass, PassState};
use crate::queue::PassQueue;
use crate::settings::{FeatureSettings, MaterialLibrary};

// ---------------------------------------------------------------------------
// RendererFeature — the capability set a host holds features by
// ---------------------------------------------------------------------------

/// A pluggable piece of a host's frame. The host calls
/// [`add_passes`](RendererFeature::add_passes) once per view per frame and
/// [`dispose`](RendererFeature::dispose) once at teardown.
pub trait RendererFeature<H: Host> {
    fn name(&self) -> &str;

    /// Enqueue this frame's passes, if any. Never fails: problems are
    /// reported as diagnostics and the feature sits the frame out.
    fn add_passes<'a>(
        &'a mut self,
        host: &mut H,
        frame: &FrameContext,
        queue: &mut PassQueue<'a, H>,
    ) -> Option<EnqueuedPass>;

    /// Release GPU resources. Idempotent.
    fn dispose(&mut self, host: &mut H);
}

/// Summary of a pass that made it into the queue this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedPass {
    pub name: String,
    pub injection_point: InjectionPoint,
    pub pass_index: usize,
    pub input_requirements: InputRequirements,
}

/// Why a feature produced no pass for a frame without it being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ViewIncompatible(ViewKind),
    Disposed,
}

/// How often configuration warnings are repeated while the problem persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WarningPolicy {
    /// Once per distinct problem; re-armed after a frame validates.
    #[default]
    OnChange,
    /// Every frame the problem holds.
    EveryFrame,
}

// ---------------------------------------------------------------------------
// FullScreenFeature
// ---------------------------------------------------------------------------

/// Injects a [`FullScreenEffectPass`] configured from an
/// [`EffectPassDescriptor`].
pub struct FullScreenFeature<H: Host> {
    name: String,
    descriptor: EffectPassDescriptor<H::Material>,
    warning_policy: WarningPolicy,
    last_error: Option<ConfigError>,
    pass: FullScreenEffectPass<H>,
}

impl<H: Host> FullScreenFeature<H> {
    pub fn create(name: impl Into<String>, descriptor: EffectPassDescriptor<H::Material>) -> Self {
        let name = name.into();
        log::debug!("creating full screen feature \"{name}\"");
        Self {
            pass: FullScreenEffectPass::new(name.clone()),
            name,
            descriptor,
            warning_policy: WarningPolicy::default(),
            last_error: None,
        }
    }

    pub fn from_settings<L>(settings: &FeatureSettings, library: &L) -> Self
    where
        L: MaterialLibrary<H::Material> + ?Sized,
    {
        Self::create(settings.name.clone(), settings.to_descriptor(library))
            .with_warning_policy(settings.warning_policy)
    }

    pub fn with_warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.warning_policy = policy;
        self
    }

    /// Swap in reloaded settings. The pass and its color copy survive; the
    /// next frame re-validates against the new descriptor.
    pub fn apply_settings<L>(&mut self, settings: &FeatureSettings, library: &L)
    where
        L: MaterialLibrary<H::Material> + ?Sized,
    {
        self.descriptor = settings.to_descriptor(library);
        self.warning_policy = settings.warning_policy;
        if settings.name != self.name {
            log::info!(
                "feature \"{}\" settings now name it \"{}\"; keeping the original name",
                self.name,
                settings.name
            );
        }
    }

    pub fn descriptor(&self) -> &EffectPassDescriptor<H::Material> {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut EffectPassDescriptor<H::Material> {
        &mut self.descriptor
    }

    pub fn pass(&self) -> &FullScreenEffectPass<H> {
        &self.pass
    }

    /// Whether this frame should be skipped before looking at the descriptor.
    pub fn skip_reason(&self, frame: &FrameContext) -> Option<SkipReason> {
        if self.pass.state() == PassState::Disposed {
            Some(SkipReason::Disposed)
        } else if !frame.view.has_composite_target() {
            Some(SkipReason::ViewIncompatible(frame.view))
        } else {
            None
        }
    }

    fn report(&mut self, host: &mut H, err: ConfigError) {
        let repeat = self.last_error.as_ref() == Some(&err);
        if !repeat || self.warning_policy == WarningPolicy::EveryFrame {
            host.emit_warning(&self.diagnostic(&err));
        }
        self.last_error = Some(err);
    }

    fn diagnostic(&self, err: &ConfigError) -> String {
        match err {
            ConfigError::MissingMaterial => format!(
                "The full screen feature \"{}\" will not execute - no material is assigned. \
                 Please make sure a material is assigned for this feature on the renderer asset.",
                self.name
            ),
            ConfigError::PassIndexOutOfRange { index, pass_count, .. } => format!(
                "The full screen feature \"{}\" will not execute - the pass index is out of \
                 bounds for the material (index {index}, {pass_count} passes).",
                self.name
            ),
        }
    }
}

impl<H: Host> RendererFeature<H> for FullScreenFeature<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_passes<'a>(
        &'a mut self,
        host: &mut H,
        frame: &FrameContext,
        queue: &mut PassQueue<'a, H>,
    ) -> Option<EnqueuedPass> {
        if let Some(reason) = self.skip_reason(frame) {
            log::trace!("{}: skipping frame {}: {reason:?}", self.name, frame.frame_index);
            return None;
        }

        let config = match self.descriptor.validate() {
            Ok(config) => config,
            Err(err) => {
                self.report(host, err);
                return None;
            }
        };
        if self.last_error.take().is_some() {
            log::info!("{}: configuration is valid again", self.name);
        }

        let enqueued = EnqueuedPass {
            name: self.name.clone(),
            injection_point: config.injection_point(),
            pass_index: config.pass_index(),
            input_requirements: config.input_requirements(),
        };

        if let Err(err) = self.pass.configure(config) {
            log::debug!("{}: {err}", self.name);
            return None;
        }
        queue.enqueue(
            &mut self.pass,
            enqueued.injection_point,
            enqueued.input_requirements,
        );
        Some(enqueued)
    }

    fn dispose(&mut self, host: &mut H) {
        log::debug!("disposing full screen feature \"{}\"", self.name);
        self.pass.dispose(host);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
