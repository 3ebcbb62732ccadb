//! In-memory [`Host`] that records every call, for unit tests.

use std::collections::HashSet;

use glam::Vec4;

use crate::descriptor::{InputRequirements, Material};
use crate::error::ResourceError;
use crate::frame::{FrameContext, TargetDescriptor};
use crate::host::{DrawCall, Host, Topology};

#[derive(Debug)]
pub struct TestMaterial {
    name: String,
    passes: usize,
}

impl TestMaterial {
    pub fn new(name: &str, passes: usize) -> Self {
        Self {
            name: name.to_owned(),
            passes,
        }
    }
}

impl Material for TestMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn pass_count(&self) -> usize {
        self.passes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Allocate { texture: u32, desc: TargetDescriptor },
    Release(u32),
    SetTarget(u32),
    Blit {
        source: u32,
        dest: u32,
        scale_bias: Vec4,
        mip: u32,
    },
    Draw {
        material: String,
        pass_index: usize,
        vertex_count: u32,
        instance_count: u32,
        topology: Topology,
        scale_bias: Vec4,
        blit_texture: Option<u32>,
    },
    Warning(String),
    PushGroup(String),
    PopGroup,
}

pub const LIVE_TARGET: u32 = 100;

#[derive(Debug)]
pub struct RecordingHost {
    pub calls: Vec<Call>,
    pub supported: InputRequirements,
    pub fail_allocations: bool,
    pub fail_blits: bool,
    pub fail_draws: bool,
    next_texture: u32,
    live: HashSet<u32>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            supported: InputRequirements::COLOR,
            fail_allocations: false,
            fail_blits: false,
            fail_draws: false,
            next_texture: 0,
            live: HashSet::new(),
        }
    }

    pub fn live_textures(&self) -> usize {
        self.live.len()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Warning(w) => Some(w.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Draw { .. }))
            .collect()
    }

    pub fn blits(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Blit { .. }))
            .collect()
    }

    pub fn allocations(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Allocate { .. }))
            .count()
    }

    pub fn releases(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Release(t) => Some(*t),
                _ => None,
            })
            .collect()
    }
}

impl Host for RecordingHost {
    type Material = TestMaterial;
    type Target = u32;
    type Texture = u32;
    type CommandBuffer = ();

    fn live_color_target(&mut self, _frame: &FrameContext) -> Result<u32, ResourceError> {
        Ok(LIVE_TARGET)
    }

    fn allocate_texture(
        &mut self,
        label: &str,
        desc: &TargetDescriptor,
    ) -> Result<u32, ResourceError> {
        if self.fail_allocations {
            return Err(ResourceError::AllocationFailed {
                label: label.to_owned(),
                reason: "out of memory".into(),
            });
        }
        self.next_texture += 1;
        let texture = self.next_texture;
        self.live.insert(texture);
        self.calls.push(Call::Allocate {
            texture,
            desc: *desc,
        });
        Ok(texture)
    }

    fn release_texture(&mut self, texture: u32) {
        assert!(self.live.remove(&texture), "texture {texture} released twice");
        self.calls.push(Call::Release(texture));
    }

    fn set_render_target(&mut self, _cmd: &mut (), target: u32) {
        self.calls.push(Call::SetTarget(target));
    }

    fn record_blit(
        &mut self,
        _cmd: &mut (),
        source: u32,
        dest: u32,
        scale_bias: Vec4,
        mip: u32,
    ) -> Result<(), ResourceError> {
        if self.fail_blits {
            return Err(ResourceError::UnknownTexture(format!("{dest}")));
        }
        self.calls.push(Call::Blit {
            source,
            dest,
            scale_bias,
            mip,
        });
        Ok(())
    }

    fn record_draw(
        &mut self,
        _cmd: &mut (),
        draw: &DrawCall<'_, TestMaterial, u32>,
    ) -> Result<(), ResourceError> {
        if self.fail_draws {
            return Err(ResourceError::Unsupported(format!(
                "pass {} of {}",
                draw.pass_index,
                draw.material.name()
            )));
        }
        self.calls.push(Call::Draw {
            material: draw.material.name().to_owned(),
            pass_index: draw.pass_index,
            vertex_count: draw.vertex_count,
            instance_count: draw.instance_count,
            topology: draw.topology,
            scale_bias: draw.params.scale_bias(),
            blit_texture: draw.params.blit_texture(),
        });
        Ok(())
    }

    fn supported_inputs(&self) -> InputRequirements {
        self.supported
    }

    fn emit_warning(&mut self, message: &str) {
        self.calls.push(Call::Warning(message.to_owned()));
    }

    fn push_debug_group(&mut self, _cmd: &mut (), label: &str) {
        self.calls.push(Call::PushGroup(label.to_owned()));
    }

    fn pop_debug_group(&mut self, _cmd: &mut ()) {
        self.calls.push(Call::PopGroup);
    }
}
