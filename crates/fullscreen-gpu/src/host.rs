use std::collections::HashMap;

use fullscreen_core::{
    ColorFormat, DrawCall, FrameContext, Host, Material, ResourceError, TargetDescriptor,
    BLIT_SCALE_BIAS,
};
use glam::Vec4;

use crate::context::{BlitParams, GpuContext};
use crate::format::to_wgpu;
use crate::material::{build_pipeline, WgpuMaterial};
use crate::shaders::{with_prelude, BLIT_ENTRY, BLIT_FRAGMENT_WGSL};
use crate::uniforms::UniformRing;

/// Handle to a texture allocated through [`Host::allocate_texture`].
/// The generation guards against use after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId {
    index: u32,
    generation: u32,
}

/// Handle to the camera color target of one frame configuration.
/// Invalidated when the camera target is reallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId {
    generation: u32,
}

struct ColorTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TargetDescriptor,
    generation: u32,
}

/// [`Host`] implementation on wgpu.
///
/// Owns the camera color target the scene renders into, the transient
/// textures passes allocate, and the blit pipelines. Passes bind a target
/// with `set_render_target`; each draw opens its own render pass on it with
/// `LoadOp::Load`.
pub struct WgpuHost {
    ctx: GpuContext,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    blit_module: wgpu::ShaderModule,
    blit_pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    sampler: wgpu::Sampler,
    uniforms: UniformRing,
    // 1×1 black, bound when a draw has no blit texture
    _fallback: wgpu::Texture,
    fallback_view: wgpu::TextureView,

    textures: Vec<Option<ColorTexture>>,
    free_slots: Vec<u32>,
    next_generation: u32,

    camera: Option<ColorTexture>,
    bound_target: Option<TargetId>,

    resolution: [f32; 2],
    time: f32,
}

impl WgpuHost {
    pub fn new(ctx: GpuContext) -> Self {
        let device = &ctx.device;

        // --- bind group layout -------------------------------------------------
        // binding 0 : BlitParams uniform buffer
        // binding 1 : blit_texture (color copy or fallback)
        // binding 2 : linear clamp sampler
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fullscreen_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: UniformRing::binding_size(),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fullscreen_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let blit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit"),
            source: wgpu::ShaderSource::Wgsl(with_prelude(BLIT_FRAGMENT_WGSL).into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("fullscreen_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let fallback = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("fullscreen_fallback"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_view = fallback.create_view(&Default::default());
        let uniforms = UniformRing::new(device);

        Self {
            bind_group_layout,
            pipeline_layout,
            blit_module,
            blit_pipelines: HashMap::new(),
            sampler,
            uniforms,
            _fallback: fallback,
            fallback_view,
            textures: Vec::new(),
            free_slots: Vec::new(),
            next_generation: 0,
            camera: None,
            bound_target: None,
            resolution: [0.0, 0.0],
            time: 0.0,
            ctx,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.ctx.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.ctx.queue
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.ctx.adapter
    }

    pub(crate) fn pipeline_layout(&self) -> &wgpu::PipelineLayout {
        &self.pipeline_layout
    }

    /// Number of transient textures currently allocated by passes.
    pub fn live_textures(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    // -------------------------------------------------------------------------
    // Frame
    // -------------------------------------------------------------------------

    /// Make sure the camera color target matches `desc` and set the frame
    /// globals. Call once per frame before anything else.
    pub fn begin_frame(
        &mut self,
        desc: TargetDescriptor,
        time: f32,
    ) -> Result<TargetId, ResourceError> {
        self.uniforms.begin_frame();
        self.time = time;
        self.resolution = [desc.width as f32, desc.height as f32];
        self.bound_target = None;

        if let Some(camera) = &self.camera {
            if camera.desc == desc {
                return Ok(TargetId {
                    generation: camera.generation,
                });
            }
        }
        if let Some(old) = self.camera.take() {
            log::debug!(
                "camera target {}x{} -> {}x{}",
                old.desc.width,
                old.desc.height,
                desc.width,
                desc.height
            );
            old.texture.destroy();
        }

        let (texture, view) = self.create_color_texture("camera_color", &desc)?;
        let generation = self.bump_generation();
        self.camera = Some(ColorTexture {
            texture,
            view,
            desc,
            generation,
        });
        Ok(TargetId { generation })
    }

    /// Blit the camera target onto the swapchain image.
    pub fn present(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        surface_format: wgpu::TextureFormat,
    ) -> Result<(), ResourceError> {
        self.ensure_blit_pipeline(surface_format);
        let offset = self.write_params(BLIT_SCALE_BIAS);
        let camera = self.camera.as_ref().ok_or(ResourceError::UnknownTarget)?;
        let bind_group = self.bind_group("present", &camera.view);
        encode_fullscreen(
            encoder,
            "present",
            surface_view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &self.blit_pipelines[&surface_format],
            &bind_group,
            offset,
            3,
            1,
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn bump_generation(&mut self) -> u32 {
        self.next_generation = self.next_generation.wrapping_add(1);
        self.next_generation
    }

    fn camera(&self, id: TargetId) -> Result<&ColorTexture, ResourceError> {
        self.camera
            .as_ref()
            .filter(|c| c.generation == id.generation)
            .ok_or(ResourceError::UnknownTarget)
    }

    fn texture(&self, id: TextureId) -> Result<&ColorTexture, ResourceError> {
        self.textures
            .get(id.index as usize)
            .and_then(Option::as_ref)
            .filter(|t| t.generation == id.generation)
            .ok_or_else(|| ResourceError::UnknownTexture(format!("{id:?}")))
    }

    fn create_color_texture(
        &self,
        label: &str,
        desc: &TargetDescriptor,
    ) -> Result<(wgpu::Texture, wgpu::TextureView), ResourceError> {
        let limit = self.ctx.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > limit || desc.height > limit {
            return Err(ResourceError::InvalidExtent {
                width: desc.width,
                height: desc.height,
                limit,
            });
        }
        if desc.sample_count != 1 {
            return Err(ResourceError::Unsupported(format!(
                "`{label}`: multisampled color targets ({}x) cannot be sampled",
                desc.sample_count
            )));
        }
        if desc.format == ColorFormat::Rgba32Float {
            return Err(ResourceError::Unsupported(format!(
                "`{label}`: Rgba32Float is not filterable"
            )));
        }

        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: to_wgpu(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let out_of_memory = pollster::block_on(device.pop_error_scope());
        let invalid = pollster::block_on(device.pop_error_scope());
        if let Some(err) = out_of_memory.or(invalid) {
            texture.destroy();
            return Err(ResourceError::AllocationFailed {
                label: label.to_owned(),
                reason: err.to_string(),
            });
        }

        let view = texture.create_view(&Default::default());
        Ok((texture, view))
    }

    fn ensure_blit_pipeline(&mut self, format: wgpu::TextureFormat) {
        self.blit_pipelines.entry(format).or_insert_with(|| {
            log::debug!("building blit pipeline for {format:?}");
            build_pipeline(
                &self.ctx.device,
                &self.pipeline_layout,
                &self.blit_module,
                "blit",
                BLIT_ENTRY,
                format,
                None,
            )
        });
    }

    /// Stage this draw's constants in the uniform ring.
    fn write_params(&mut self, scale_bias: Vec4) -> u32 {
        let params = BlitParams {
            scale_bias: scale_bias.to_array(),
            resolution: self.resolution,
            time: self.time,
            _pad: 0.0,
        };
        self.uniforms.push(&self.ctx.device, &self.ctx.queue, &params)
    }

    /// Bind group over the uniform ring and `source`; the slot is picked by
    /// the dynamic offset at draw time.
    fn bind_group(&self, label: &str, source: &wgpu::TextureView) -> wgpu::BindGroup {
        self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: self.uniforms.buffer(),
                        offset: 0,
                        size: UniformRing::binding_size(),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn encode_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    dynamic_offset: u32,
    vertex_count: u32,
    instance_count: u32,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    rpass.set_pipeline(pipeline);
    rpass.set_bind_group(0, bind_group, &[dynamic_offset]);
    rpass.draw(0..vertex_count, 0..instance_count);
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

impl Host for WgpuHost {
    type Material = WgpuMaterial;
    type Target = TargetId;
    type Texture = TextureId;
    type CommandBuffer = wgpu::CommandEncoder;

    fn live_color_target(&mut self, frame: &FrameContext) -> Result<TargetId, ResourceError> {
        match &self.camera {
            Some(camera) if camera.desc == frame.target => Ok(TargetId {
                generation: camera.generation,
            }),
            _ => Err(ResourceError::UnknownTarget),
        }
    }

    fn allocate_texture(
        &mut self,
        label: &str,
        desc: &TargetDescriptor,
    ) -> Result<TextureId, ResourceError> {
        let (texture, view) = self.create_color_texture(label, desc)?;
        let generation = self.bump_generation();
        let slot = ColorTexture {
            texture,
            view,
            desc: *desc,
            generation,
        };

        let index = match self.free_slots.pop() {
            Some(index) => {
                self.textures[index as usize] = Some(slot);
                index
            }
            None => {
                self.textures.push(Some(slot));
                (self.textures.len() - 1) as u32
            }
        };
        let id = TextureId { index, generation };
        log::debug!(
            "allocated `{label}` {}x{} {:?} as {id:?}",
            desc.width,
            desc.height,
            desc.format
        );
        Ok(id)
    }

    fn release_texture(&mut self, id: TextureId) {
        match self.textures.get_mut(id.index as usize) {
            Some(slot) if slot.as_ref().is_some_and(|t| t.generation == id.generation) => {
                if let Some(released) = slot.take() {
                    released.texture.destroy();
                    self.free_slots.push(id.index);
                    log::debug!("released {id:?}");
                }
            }
            _ => log::warn!("release of unknown texture {id:?} ignored"),
        }
    }

    fn set_render_target(&mut self, _cmd: &mut wgpu::CommandEncoder, target: TargetId) {
        self.bound_target = Some(target);
    }

    fn record_blit(
        &mut self,
        cmd: &mut wgpu::CommandEncoder,
        source: TargetId,
        dest: TextureId,
        scale_bias: Vec4,
        mip: u32,
    ) -> Result<(), ResourceError> {
        let dest_format = to_wgpu(self.texture(dest)?.desc.format);
        self.ensure_blit_pipeline(dest_format);
        let offset = self.write_params(scale_bias);

        let camera = self.camera(source)?;
        if mip >= camera.texture.mip_level_count() {
            return Err(ResourceError::Unsupported(format!(
                "blit source has no mip {mip}"
            )));
        }
        let source_view = camera.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("blit_source"),
            base_mip_level: mip,
            mip_level_count: Some(1),
            ..Default::default()
        });

        let dest = self.texture(dest)?;
        let bind_group = self.bind_group("blit", &source_view);
        encode_fullscreen(
            cmd,
            "blit",
            &dest.view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            &self.blit_pipelines[&dest_format],
            &bind_group,
            offset,
            3,
            1,
        );
        Ok(())
    }

    fn record_draw(
        &mut self,
        cmd: &mut wgpu::CommandEncoder,
        draw: &DrawCall<'_, WgpuMaterial, TextureId>,
    ) -> Result<(), ResourceError> {
        let target = self.bound_target.ok_or(ResourceError::UnknownTarget)?;
        let format = self.camera(target)?.desc.format;
        let pipeline = draw.material.pipeline(draw.pass_index, format)?;
        if let Some(id) = draw.params.blit_texture() {
            self.texture(id)?;
        }
        let offset = self.write_params(draw.params.scale_bias());

        let target = self.camera(target)?;
        let source = match draw.params.blit_texture() {
            Some(id) => &self.texture(id)?.view,
            None => &self.fallback_view,
        };
        let label = draw_label(draw);
        let bind_group = self.bind_group(&label, source);
        encode_fullscreen(
            cmd,
            &label,
            &target.view,
            wgpu::LoadOp::Load,
            pipeline,
            &bind_group,
            offset,
            draw.vertex_count,
            draw.instance_count,
        );
        Ok(())
    }

    fn push_debug_group(&mut self, cmd: &mut wgpu::CommandEncoder, label: &str) {
        cmd.push_debug_group(label);
    }

    fn pop_debug_group(&mut self, cmd: &mut wgpu::CommandEncoder) {
        cmd.pop_debug_group();
    }
}

fn draw_label(draw: &DrawCall<'_, WgpuMaterial, TextureId>) -> String {
    match draw.material.entry_point(draw.pass_index) {
        Some(entry) => format!("{}:{entry}", draw.material.name()),
        None => draw.material.name().to_owned(),
    }
}
