use crate::descriptor::ValidatedConfig;
use crate::error::{PassError, ResourceError};
use crate::frame::{FrameContext, TargetDescriptor};
use crate::host::{DrawCall, Host, ParamBlock, BLIT_SCALE_BIAS};

const COLOR_COPY_LABEL: &str = "fullscreen-color-copy";

// ---------------------------------------------------------------------------
// RenderPass — what the host's pass queue drives every frame
// ---------------------------------------------------------------------------

/// A unit of work enqueued into the host's per-frame execution list.
///
/// The host calls [`setup`](RenderPass::setup) then
/// [`execute`](RenderPass::execute), once each per frame, never concurrently.
pub trait RenderPass<H: Host> {
    fn name(&self) -> &str;

    /// Bind targets and (re)allocate transient resources for this frame.
    fn setup(&mut self, host: &mut H, frame: &FrameContext) -> Result<(), PassError>;

    /// Record the pass's commands into `cmd`.
    fn execute(&mut self, host: &mut H, cmd: &mut H::CommandBuffer) -> Result<(), PassError>;
}

// ---------------------------------------------------------------------------
// FullScreenEffectPass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// No material bound yet.
    Created,
    Configured,
    SetUp,
    Executed,
    Disposed,
}

/// Scratch copy of the frame's color target, and the descriptor it was
/// allocated for.
#[derive(Debug)]
struct ColorCopy<T> {
    texture: T,
    desc: TargetDescriptor,
}

/// Draws one full-screen triangle with a material pass, optionally reading a
/// copy of the live color target.
pub struct FullScreenEffectPass<H: Host> {
    name: String,
    state: PassState,
    config: Option<ValidatedConfig<H::Material>>,
    target: Option<H::Target>,
    color_copy: Option<ColorCopy<H::Texture>>,
    params: ParamBlock<H::Texture>,
    resource_failures: u32,
}

impl<H: Host> FullScreenEffectPass<H> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: PassState::Created,
            config: None,
            target: None,
            color_copy: None,
            params: ParamBlock::new(),
            resource_failures: 0,
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn config(&self) -> Option<&ValidatedConfig<H::Material>> {
        self.config.as_ref()
    }

    /// Handle of the current color copy, if one is allocated.
    pub fn color_copy(&self) -> Option<H::Texture> {
        self.color_copy.as_ref().map(|c| c.texture)
    }

    /// (Re)bind material, pass index, injection point and input requirements.
    /// Cheap; the feature calls this every frame the descriptor validates.
    pub fn configure(&mut self, config: ValidatedConfig<H::Material>) -> Result<(), PassError> {
        if self.state == PassState::Disposed {
            return Err(PassError::Disposed);
        }
        self.config = Some(config);
        self.state = PassState::Configured;
        Ok(())
    }

    /// Release the color copy. Safe to call any number of times.
    pub fn dispose(&mut self, host: &mut H) {
        if let Some(copy) = self.color_copy.take() {
            log::debug!("{}: releasing color copy {:?}", self.name, copy.texture);
            host.release_texture(copy.texture);
        }
        self.target = None;
        self.config = None;
        self.state = PassState::Disposed;
    }

    /// Compare-and-reallocate: a new texture is only requested when the
    /// copy descriptor differs from the one the current copy was made for.
    fn ensure_color_copy(
        &mut self,
        host: &mut H,
        frame: &FrameContext,
    ) -> Result<H::Texture, ResourceError> {
        let desc = frame.target.color_copy();
        if let Some(copy) = &self.color_copy {
            if copy.desc == desc {
                return Ok(copy.texture);
            }
        }

        if let Some(old) = self.color_copy.take() {
            log::debug!(
                "{}: color target changed {}x{} {:?} -> {}x{} {:?}, reallocating copy",
                self.name,
                old.desc.width,
                old.desc.height,
                old.desc.format,
                desc.width,
                desc.height,
                desc.format,
            );
            host.release_texture(old.texture);
        }

        let texture = host.allocate_texture(COLOR_COPY_LABEL, &desc)?;
        self.color_copy = Some(ColorCopy { texture, desc });
        Ok(texture)
    }

    fn release_color_copy(&mut self, host: &mut H) {
        if let Some(copy) = self.color_copy.take() {
            log::debug!("{}: color copy no longer needed, releasing", self.name);
            host.release_texture(copy.texture);
        }
    }

    fn on_resource_error(&mut self, host: &mut H, err: &ResourceError) {
        self.resource_failures += 1;
        if self.resource_failures == 1 {
            host.emit_warning(&format!(
                "The full screen pass \"{}\" is skipped this frame: {err}",
                self.name
            ));
        } else {
            log::debug!(
                "{}: still failing ({} frames): {err}",
                self.name,
                self.resource_failures
            );
        }
    }
}

impl<H: Host> RenderPass<H> for FullScreenEffectPass<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, host: &mut H, frame: &FrameContext) -> Result<(), PassError> {
        match self.state {
            PassState::Configured | PassState::SetUp | PassState::Executed => {}
            PassState::Disposed => return Err(PassError::Disposed),
            state => {
                return Err(PassError::InvalidState {
                    operation: "setup",
                    state,
                })
            }
        }
        let fetch = self
            .config
            .as_ref()
            .map(|c| c.fetch_color_buffer())
            .unwrap_or(false);

        let prepared = host.live_color_target(frame).and_then(|target| {
            if fetch {
                self.ensure_color_copy(host, frame)?;
            } else {
                self.release_color_copy(host);
            }
            Ok(target)
        });

        match prepared {
            Ok(target) => {
                self.target = Some(target);
                self.state = PassState::SetUp;
                Ok(())
            }
            Err(err) => {
                self.on_resource_error(host, &err);
                self.target = None;
                self.state = PassState::Configured;
                Err(err.into())
            }
        }
    }

    fn execute(&mut self, host: &mut H, cmd: &mut H::CommandBuffer) -> Result<(), PassError> {
        let (config, target) = match (self.state, &self.config, self.target) {
            (PassState::SetUp, Some(config), Some(target)) => (config.clone(), target),
            (PassState::Disposed, ..) => return Err(PassError::Disposed),
            (state, ..) => {
                return Err(PassError::InvalidState {
                    operation: "execute",
                    state,
                })
            }
        };

        host.push_debug_group(cmd, &self.name);
        let recorded = self.record(host, cmd, &config, target);
        host.pop_debug_group(cmd);

        match recorded {
            Ok(()) => {
                self.resource_failures = 0;
                self.state = PassState::Executed;
                Ok(())
            }
            Err(err) => {
                self.on_resource_error(host, &err);
                self.state = PassState::Configured;
                Err(err.into())
            }
        }
    }
}

impl<H: Host> FullScreenEffectPass<H> {
    /// Optional blit into the color copy, then the full-screen draw.
    fn record(
        &mut self,
        host: &mut H,
        cmd: &mut H::CommandBuffer,
        config: &ValidatedConfig<H::Material>,
        target: H::Target,
    ) -> Result<(), ResourceError> {
        let copy = match &self.color_copy {
            Some(copy) if config.fetch_color_buffer() => Some(copy.texture),
            _ => None,
        };
        if let Some(copy) = copy {
            host.record_blit(cmd, target, copy, BLIT_SCALE_BIAS, 0)?;
        }

        host.set_render_target(cmd, target);

        self.params.clear();
        self.params.set_scale_bias(BLIT_SCALE_BIAS);
        if let Some(copy) = copy {
            self.params.set_blit_texture(copy);
        }

        let draw = DrawCall::fullscreen_triangle(
            config.material().as_ref(),
            config.pass_index(),
            &self.params,
        );
        host.record_draw(cmd, &draw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::descriptor::{validate, EffectPassDescriptor};
    use crate::frame::{ColorFormat, ViewKind};
    use crate::test_host::{Call, RecordingHost, TestMaterial, LIVE_TARGET};

    fn config(fetch: bool, index: i32) -> ValidatedConfig<TestMaterial> {
        validate(&EffectPassDescriptor {
            material: Some(Arc::new(TestMaterial::new("tint", 2))),
            pass_sub_index: index,
            fetch_color_buffer: fetch,
            ..Default::default()
        })
        .unwrap()
    }

    fn frame(width: u32, height: u32) -> FrameContext {
        FrameContext::new(
            0,
            ViewKind::Game,
            TargetDescriptor::new(width, height, ColorFormat::Rgba8UnormSrgb),
        )
    }

    fn configured(fetch: bool) -> FullScreenEffectPass<RecordingHost> {
        let mut pass = FullScreenEffectPass::new("test-pass");
        pass.configure(config(fetch, 1)).unwrap();
        pass
    }

    fn run_frame(
        pass: &mut FullScreenEffectPass<RecordingHost>,
        host: &mut RecordingHost,
        f: &FrameContext,
    ) {
        pass.setup(host, f).unwrap();
        pass.execute(host, &mut ()).unwrap();
    }

    // --- State machine ---------------------------------------------------------

    #[test]
    fn new_pass_starts_created_and_refuses_setup() {
        let mut host = RecordingHost::new();
        let mut pass = FullScreenEffectPass::<RecordingHost>::new("p");
        assert_eq!(pass.state(), PassState::Created);
        assert_eq!(
            pass.setup(&mut host, &frame(4, 4)),
            Err(PassError::InvalidState {
                operation: "setup",
                state: PassState::Created
            })
        );
    }

    #[test]
    fn execute_requires_setup() {
        let mut host = RecordingHost::new();
        let mut pass = configured(false);
        assert!(matches!(
            pass.execute(&mut host, &mut ()),
            Err(PassError::InvalidState { operation: "execute", .. })
        ));
        assert!(host.draws().is_empty());
    }

    #[test]
    fn states_advance_through_a_frame() {
        let mut host = RecordingHost::new();
        let mut pass = configured(false);
        assert_eq!(pass.state(), PassState::Configured);
        pass.setup(&mut host, &frame(4, 4)).unwrap();
        assert_eq!(pass.state(), PassState::SetUp);
        pass.execute(&mut host, &mut ()).unwrap();
        assert_eq!(pass.state(), PassState::Executed);
    }

    #[test]
    fn disposed_pass_rejects_everything() {
        let mut host = RecordingHost::new();
        let mut pass = configured(false);
        pass.dispose(&mut host);
        assert_eq!(pass.configure(config(false, 0)), Err(PassError::Disposed));
        assert_eq!(pass.setup(&mut host, &frame(4, 4)), Err(PassError::Disposed));
        assert_eq!(pass.execute(&mut host, &mut ()), Err(PassError::Disposed));
    }

    // --- Draw protocol ---------------------------------------------------------

    #[test]
    fn without_fetch_only_one_draw_is_recorded() {
        let mut host = RecordingHost::new();
        let mut pass = configured(false);
        run_frame(&mut pass, &mut host, &frame(64, 32));

        assert!(host.blits().is_empty());
        assert_eq!(host.allocations(), 0);
        assert_eq!(
            host.calls,
            vec![
                Call::PushGroup("test-pass".into()),
                Call::SetTarget(LIVE_TARGET),
                Call::Draw {
                    material: "tint".into(),
                    pass_index: 1,
                    vertex_count: 3,
                    instance_count: 1,
                    topology: crate::host::Topology::Triangles,
                    scale_bias: BLIT_SCALE_BIAS,
                    blit_texture: None,
                },
                Call::PopGroup,
            ]
        );
    }

    #[test]
    fn with_fetch_blit_precedes_draw() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(64, 32));

        let copy = pass.color_copy().expect("copy allocated");
        assert_eq!(host.blits().len(), 1);
        assert_eq!(host.draws().len(), 1);

        let blit_at = host.calls.iter().position(|c| matches!(c, Call::Blit { .. })).unwrap();
        let draw_at = host.calls.iter().position(|c| matches!(c, Call::Draw { .. })).unwrap();
        assert!(blit_at < draw_at);

        assert_eq!(
            host.calls[blit_at],
            Call::Blit {
                source: LIVE_TARGET,
                dest: copy,
                scale_bias: BLIT_SCALE_BIAS,
                mip: 0,
            }
        );
        match &host.calls[draw_at] {
            Call::Draw { blit_texture, .. } => assert_eq!(*blit_texture, Some(copy)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn params_do_not_leak_between_frames() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(8, 8));

        pass.configure(config(false, 1)).unwrap();
        run_frame(&mut pass, &mut host, &frame(8, 8));

        match host.draws().last().unwrap() {
            Call::Draw { blit_texture, scale_bias, .. } => {
                assert_eq!(*blit_texture, None);
                assert_eq!(*scale_bias, BLIT_SCALE_BIAS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    // --- Color copy lifetime ---------------------------------------------------

    #[test]
    fn unchanged_target_reuses_copy() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(64, 32));
        let first = pass.color_copy();
        pass.configure(config(true, 1)).unwrap();
        run_frame(&mut pass, &mut host, &frame(64, 32));

        assert_eq!(pass.color_copy(), first);
        assert_eq!(host.allocations(), 1);
        assert!(host.releases().is_empty());
    }

    #[test]
    fn resized_target_reallocates_exactly_once() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(64, 32));
        let first = pass.color_copy().unwrap();

        run_frame(&mut pass, &mut host, &frame(128, 64));
        let second = pass.color_copy().unwrap();

        assert_ne!(first, second);
        assert_eq!(host.allocations(), 2);
        assert_eq!(host.releases(), vec![first]);
        assert_eq!(host.live_textures(), 1);

        let release_at = host.calls.iter().position(|c| *c == Call::Release(first)).unwrap();
        let realloc_at = host
            .calls
            .iter()
            .rposition(|c| matches!(c, Call::Allocate { .. }))
            .unwrap();
        assert!(release_at < realloc_at, "old copy must go before the new one");
    }

    #[test]
    fn format_change_reallocates() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(64, 32));

        let hdr = FrameContext::new(
            1,
            ViewKind::Game,
            TargetDescriptor::new(64, 32, ColorFormat::Rgba16Float),
        );
        run_frame(&mut pass, &mut host, &hdr);
        assert_eq!(host.allocations(), 2);
    }

    #[test]
    fn msaa_change_alone_does_not_reallocate() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(64, 32));

        let mut msaa = frame(64, 32);
        msaa.target.sample_count = 4;
        run_frame(&mut pass, &mut host, &msaa);
        assert_eq!(host.allocations(), 1);
    }

    #[test]
    fn turning_fetch_off_releases_copy() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(64, 32));
        assert_eq!(host.live_textures(), 1);

        pass.configure(config(false, 1)).unwrap();
        run_frame(&mut pass, &mut host, &frame(64, 32));
        assert_eq!(host.live_textures(), 0);
        assert_eq!(pass.color_copy(), None);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut host = RecordingHost::new();
        let mut pass = configured(true);
        run_frame(&mut pass, &mut host, &frame(64, 32));
        let copy = pass.color_copy().unwrap();

        pass.dispose(&mut host);
        pass.dispose(&mut host);

        assert_eq!(host.releases(), vec![copy]);
        assert_eq!(host.live_textures(), 0);
        assert_eq!(pass.state(), PassState::Disposed);
    }

    #[test]
    fn dispose_without_allocation_releases_nothing() {
        let mut host = RecordingHost::new();
        let mut pass = FullScreenEffectPass::<RecordingHost>::new("p");
        pass.dispose(&mut host);
        assert!(host.calls.is_empty());
    }

    // --- Resource failures -----------------------------------------------------

    #[test]
    fn allocation_failure_skips_frame_and_warns_once_per_streak() {
        let mut host = RecordingHost::new();
        host.fail_allocations = true;
        let mut pass = configured(true);

        for _ in 0..3 {
            let err = pass.setup(&mut host, &frame(64, 32)).unwrap_err();
            assert!(matches!(err, PassError::Resource(ResourceError::AllocationFailed { .. })));
            assert_eq!(pass.state(), PassState::Configured);
        }
        assert_eq!(host.warnings().len(), 1);
        assert!(host.warnings()[0].contains("test-pass"));
        assert!(host.draws().is_empty());

        host.fail_allocations = false;
        run_frame(&mut pass, &mut host, &frame(64, 32));
        assert_eq!(host.draws().len(), 1);

        host.fail_allocations = true;
        run_frame(&mut pass, &mut host, &frame(64, 32));
        assert_eq!(host.warnings().len(), 1, "unchanged target needs no allocation");
        assert!(pass.setup(&mut host, &frame(32, 32)).is_err());
        assert_eq!(host.warnings().len(), 2, "a new streak warns again");
    }

    #[test]
    fn failed_draw_closes_the_debug_group_and_recovers() {
        let mut host = RecordingHost::new();
        host.fail_draws = true;
        let mut pass = configured(false);

        for _ in 0..2 {
            pass.setup(&mut host, &frame(64, 32)).unwrap();
            let err = pass.execute(&mut host, &mut ()).unwrap_err();
            assert!(matches!(err, PassError::Resource(ResourceError::Unsupported(_))));
            assert_eq!(pass.state(), PassState::Configured);
            assert_eq!(host.calls.last(), Some(&Call::PopGroup));
        }
        assert_eq!(host.warnings().len(), 1);
        assert!(host.warnings()[0].contains("test-pass"));
        assert!(host.draws().is_empty());

        host.fail_draws = false;
        run_frame(&mut pass, &mut host, &frame(64, 32));
        assert_eq!(pass.state(), PassState::Executed);
        assert_eq!(host.draws().len(), 1);

        host.fail_draws = true;
        pass.setup(&mut host, &frame(64, 32)).unwrap();
        assert!(pass.execute(&mut host, &mut ()).is_err());
        assert_eq!(host.warnings().len(), 2, "a new streak warns again");
    }

    #[test]
    fn failed_blit_skips_the_draw() {
        let mut host = RecordingHost::new();
        host.fail_blits = true;
        let mut pass = configured(true);

        pass.setup(&mut host, &frame(64, 32)).unwrap();
        let err = pass.execute(&mut host, &mut ()).unwrap_err();
        assert!(matches!(err, PassError::Resource(ResourceError::UnknownTexture(_))));
        assert_eq!(pass.state(), PassState::Configured);
        assert!(host.draws().is_empty());
        assert!(!host.calls.iter().any(|c| matches!(c, Call::SetTarget(_))));
        assert_eq!(host.calls.last(), Some(&Call::PopGroup));
        assert_eq!(host.warnings().len(), 1);

        host.fail_blits = false;
        run_frame(&mut pass, &mut host, &frame(64, 32));
        assert_eq!(host.blits().len(), 1);
        assert_eq!(host.draws().len(), 1);
        assert_eq!(host.allocations(), 1, "the copy survives the failed frame");
    }
}
