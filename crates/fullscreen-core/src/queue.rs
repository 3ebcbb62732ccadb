use crate::descriptor::{InjectionPoint, InputRequirements};
use crate::frame::FrameContext;
use crate::host::Host;
use crate::pass::RenderPass;

struct QueuedPass<'a, H: Host> {
    injection_point: InjectionPoint,
    input_requirements: InputRequirements,
    pass: &'a mut (dyn RenderPass<H> + 'a),
}

/// The host's per-frame execution list.
///
/// Features enqueue borrowed passes while the frame is being built; the host
/// then runs them in injection-point order. Passes enqueued at the same point
/// keep their enqueue order.
pub struct PassQueue<'a, H: Host> {
    passes: Vec<QueuedPass<'a, H>>,
}

impl<'a, H: Host> Default for PassQueue<'a, H> {
    fn default() -> Self {
        Self { passes: Vec::new() }
    }
}

impl<'a, H: Host> PassQueue<'a, H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue<P>(
        &mut self,
        pass: &'a mut P,
        injection_point: InjectionPoint,
        input_requirements: InputRequirements,
    ) where
        P: RenderPass<H> + 'a,
    {
        log::trace!("enqueue \"{}\" at {injection_point:?}", pass.name());
        self.passes.push(QueuedPass {
            injection_point,
            input_requirements,
            pass,
        });
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Union of every enqueued pass's input requirements: the auxiliary
    /// buffers the host must produce this frame.
    pub fn required_inputs(&self) -> InputRequirements {
        self.passes
            .iter()
            .fold(InputRequirements::NONE, |acc, p| acc | p.input_requirements)
    }

    /// Required inputs `host` cannot produce.
    pub fn missing_inputs(&self, host: &H) -> InputRequirements {
        self.required_inputs().without(host.supported_inputs())
    }

    /// Warn through the host when the set of missing inputs changes to a
    /// non-empty one. `reported` carries the last set across frames. Passes
    /// still run; they just see no data for the missing kinds.
    pub fn report_missing_inputs(&self, host: &mut H, reported: &mut InputRequirements) {
        let missing = self.missing_inputs(host);
        if missing != *reported && !missing.is_empty() {
            let names: Vec<String> = self
                .passes
                .iter()
                .filter(|p| !p.input_requirements.without(host.supported_inputs()).is_empty())
                .map(|p| format!("\"{}\"", p.pass.name()))
                .collect();
            host.emit_warning(&format!(
                "The host cannot provide {missing:?} requested by {}; those inputs will be empty.",
                names.join(", ")
            ));
        }
        *reported = missing;
    }

    /// Pass names in execution order.
    pub fn order(&mut self) -> Vec<(InjectionPoint, String)> {
        self.sort();
        self.passes
            .iter()
            .map(|p| (p.injection_point, p.pass.name().to_owned()))
            .collect()
    }

    fn sort(&mut self) {
        // Stable: equal injection points keep enqueue order.
        self.passes.sort_by_key(|p| p.injection_point);
    }

    /// Run setup then execute for every pass. A failing pass is logged and
    /// skipped; the rest of the frame continues. Returns how many passes
    /// recorded their commands.
    pub fn execute(
        &mut self,
        host: &mut H,
        cmd: &mut H::CommandBuffer,
        frame: &FrameContext,
    ) -> usize {
        self.sort();
        let mut executed = 0;
        for queued in &mut self.passes {
            let pass = &mut *queued.pass;
            let result = pass.setup(host, frame).and_then(|()| pass.execute(host, cmd));
            match result {
                Ok(()) => executed += 1,
                Err(err) => log::debug!(
                    "frame {}: pass \"{}\" skipped: {err}",
                    frame.frame_index,
                    pass.name()
                ),
            }
        }
        executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PassError, ResourceError};
    use crate::frame::{ColorFormat, TargetDescriptor, ViewKind};
    use crate::test_host::RecordingHost;

    /// Counts how often it was executed.
    struct CountingPass {
        name: &'static str,
        fail_setup: bool,
        executed: u32,
    }

    impl CountingPass {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                fail_setup: false,
                executed: 0,
            }
        }
    }

    impl RenderPass<RecordingHost> for CountingPass {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(
            &mut self,
            _host: &mut RecordingHost,
            _frame: &FrameContext,
        ) -> Result<(), PassError> {
            if self.fail_setup {
                Err(ResourceError::UnknownTarget.into())
            } else {
                Ok(())
            }
        }

        fn execute(&mut self, host: &mut RecordingHost, cmd: &mut ()) -> Result<(), PassError> {
            self.executed += 1;
            host.push_debug_group(cmd, self.name);
            Ok(())
        }
    }

    fn frame() -> FrameContext {
        FrameContext::new(
            3,
            ViewKind::Game,
            TargetDescriptor::new(8, 8, ColorFormat::Rgba8Unorm),
        )
    }

    #[test]
    fn runs_in_injection_order_stable_within_a_point() {
        let mut late = CountingPass::new("late");
        let mut early = CountingPass::new("early");
        let mut post_a = CountingPass::new("post-a");
        let mut post_b = CountingPass::new("post-b");

        let mut host = RecordingHost::new();
        let mut queue = PassQueue::<RecordingHost>::new();
        let post = InjectionPoint::AfterRenderingPostProcessing;
        let none = InputRequirements::NONE;
        queue.enqueue(&mut late, InjectionPoint::AfterRendering, none);
        queue.enqueue(&mut post_a, post, none);
        queue.enqueue(&mut early, InjectionPoint::AfterRenderingOpaques, none);
        queue.enqueue(&mut post_b, post, none);

        let names: Vec<_> = queue.order().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, ["early", "post-a", "post-b", "late"]);
        assert_eq!(queue.execute(&mut host, &mut (), &frame()), 4);
    }

    #[test]
    fn failing_pass_does_not_stop_the_frame() {
        let mut broken = CountingPass::new("broken");
        broken.fail_setup = true;
        let mut fine = CountingPass::new("fine");

        let mut host = RecordingHost::new();
        {
            let mut queue = PassQueue::<RecordingHost>::new();
            queue.enqueue(&mut broken, InjectionPoint::BeforeRendering, InputRequirements::NONE);
            queue.enqueue(&mut fine, InjectionPoint::AfterRendering, InputRequirements::NONE);
            assert_eq!(queue.execute(&mut host, &mut (), &frame()), 1);
        }
        assert_eq!(broken.executed, 0);
        assert_eq!(fine.executed, 1);
    }

    #[test]
    fn required_inputs_is_the_union() {
        let mut a = CountingPass::new("a");
        let mut b = CountingPass::new("b");
        let mut queue = PassQueue::<RecordingHost>::new();
        assert!(queue.required_inputs().is_empty());
        queue.enqueue(&mut a, InjectionPoint::BeforeRendering, InputRequirements::DEPTH);
        queue.enqueue(&mut b, InjectionPoint::BeforeRendering, InputRequirements::MOTION);
        assert_eq!(
            queue.required_inputs(),
            InputRequirements::DEPTH | InputRequirements::MOTION
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn color_only_host_reports_missing_inputs_once() {
        let mut outline = CountingPass::new("outline");
        let mut grade = CountingPass::new("grade");
        let mut host = RecordingHost::new();
        let mut reported = InputRequirements::NONE;

        let depth_motion = InputRequirements::DEPTH | InputRequirements::MOTION;
        for _ in 0..3 {
            let mut queue = PassQueue::<RecordingHost>::new();
            queue.enqueue(&mut outline, InjectionPoint::BeforeRendering, depth_motion);
            queue.enqueue(&mut grade, InjectionPoint::AfterRendering, InputRequirements::COLOR);
            assert_eq!(queue.missing_inputs(&host), depth_motion);
            queue.report_missing_inputs(&mut host, &mut reported);
        }

        assert_eq!(reported, depth_motion);
        let warnings = host.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("\"outline\""));
        assert!(!warnings[0].contains("\"grade\""));
    }

    #[test]
    fn supported_inputs_are_not_reported() {
        let mut a = CountingPass::new("a");
        let mut host = RecordingHost::new();
        host.supported = InputRequirements::COLOR | InputRequirements::DEPTH;
        let mut reported = InputRequirements::NONE;

        let mut queue = PassQueue::<RecordingHost>::new();
        queue.enqueue(&mut a, InjectionPoint::BeforeRendering, InputRequirements::DEPTH);
        assert!(queue.missing_inputs(&host).is_empty());
        queue.report_missing_inputs(&mut host, &mut reported);
        assert!(host.warnings().is_empty());
    }

    #[test]
    fn missing_inputs_warn_again_after_being_resolved() {
        let mut a = CountingPass::new("a");
        let mut host = RecordingHost::new();
        let mut reported = InputRequirements::NONE;
        let frames = [
            InputRequirements::NORMAL,
            InputRequirements::COLOR,
            InputRequirements::NORMAL,
        ];
        for requirements in frames {
            let mut queue = PassQueue::<RecordingHost>::new();
            queue.enqueue(&mut a, InjectionPoint::BeforeRendering, requirements);
            queue.report_missing_inputs(&mut host, &mut reported);
        }
        assert_eq!(host.warnings().len(), 2);
    }
}
