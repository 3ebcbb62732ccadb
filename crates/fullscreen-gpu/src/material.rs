use fullscreen_core::{ColorFormat, Material, ResourceError};
use thiserror::Error;
use wgpu::RenderPipeline;

use crate::format::to_wgpu;
use crate::host::WgpuHost;
use crate::shaders::{with_prelude, VERTEX_ENTRY};

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("material `{name}` declares no passes")]
    NoPasses { name: String },

    #[error("material `{name}` failed to build: {message}")]
    Build { name: String, message: String },
}

/// A full-screen material: one WGSL module, one render pipeline per
/// fragment entry point ("pass"), all built for a single target format.
pub struct WgpuMaterial {
    name: String,
    format: ColorFormat,
    passes: Vec<MaterialPass>,
}

struct MaterialPass {
    entry_point: String,
    pipeline: RenderPipeline,
}

impl WgpuMaterial {
    /// Compile `fragment_wgsl` (appended to the full-screen prelude) and
    /// build a pipeline per entry in `entry_points`, in pass-index order.
    ///
    /// Materials that draw without fetching the color buffer usually want a
    /// `blend` state, since they cannot read what they draw over.
    pub fn new(
        host: &WgpuHost,
        name: &str,
        fragment_wgsl: &str,
        entry_points: &[&str],
        format: ColorFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Result<Self, MaterialError> {
        if entry_points.is_empty() {
            return Err(MaterialError::NoPasses { name: name.to_owned() });
        }
        let device = host.device();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(with_prelude(fragment_wgsl).into()),
        });

        let passes = entry_points
            .iter()
            .map(|&entry| MaterialPass {
                entry_point: entry.to_owned(),
                pipeline: build_pipeline(
                    device,
                    host.pipeline_layout(),
                    &module,
                    &format!("{name}:{entry}"),
                    entry,
                    to_wgpu(format),
                    blend,
                ),
            })
            .collect();

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(MaterialError::Build {
                name: name.to_owned(),
                message: err.to_string(),
            });
        }

        log::debug!("material `{name}` built with passes {entry_points:?} for {format:?}");
        Ok(Self {
            name: name.to_owned(),
            format,
            passes,
        })
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    pub fn entry_point(&self, pass_index: usize) -> Option<&str> {
        self.passes.get(pass_index).map(|p| p.entry_point.as_str())
    }

    /// Pipeline for `pass_index`, checked against the format being drawn into.
    pub(crate) fn pipeline(
        &self,
        pass_index: usize,
        target: ColorFormat,
    ) -> Result<&RenderPipeline, ResourceError> {
        if target != self.format {
            return Err(ResourceError::Unsupported(format!(
                "material `{}` is built for {:?}, target is {target:?}",
                self.name, self.format
            )));
        }
        self.passes
            .get(pass_index)
            .map(|p| &p.pipeline)
            .ok_or_else(|| {
                ResourceError::Unsupported(format!(
                    "material `{}` has no pass {pass_index}",
                    self.name
                ))
            })
    }
}

impl Material for WgpuMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

/// Full-screen triangle pipeline: no vertex buffers, no depth.
pub(crate) fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    label: &str,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: VERTEX_ENTRY,
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: fragment_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
