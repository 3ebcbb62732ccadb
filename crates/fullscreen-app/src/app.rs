use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use fullscreen_core::{
    ColorFormat, DrawCall, FeatureSettings, FrameContext, FullScreenFeature, Host,
    InputRequirements, ParamBlock, PassQueue, RendererFeature, TargetDescriptor, ViewKind,
    BLIT_SCALE_BIAS,
};
use fullscreen_gpu::{format, GpuContext, TargetId, WgpuHost, WgpuMaterial};
use winit::window::Window;

use crate::input::{edit_settings, next_view, InputAction};

const SETTINGS_ENV: &str = "FULLSCREEN_FX_SETTINGS";
const DEFAULT_SETTINGS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/feature.ron");

// ---------------------------------------------------------------------------
// Simple FPS counter — logs to console once per second
// ---------------------------------------------------------------------------

struct FpsCounter {
    frames: u32,
    last_report: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            last_report: Instant::now(),
        }
    }

    /// Increment the frame count.  Returns the FPS value if a full second has
    /// elapsed since the last report (so the caller can log it).
    fn tick(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.last_report.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frames as f32 / elapsed;
            self.frames = 0;
            self.last_report = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    host: WgpuHost,
    camera_format: ColorFormat,

    scene: Arc<WgpuMaterial>,
    materials: HashMap<String, Arc<WgpuMaterial>>,

    settings_path: PathBuf,
    settings: FeatureSettings,
    feature: FullScreenFeature<WgpuHost>,
    missing_inputs: InputRequirements,

    view: ViewKind,
    frame_index: u64,
    start: Instant,
    fps: FpsCounter,
}

impl App {
    /// Initialise wgpu for a given window.  The window is wrapped in `Arc` so
    /// that the surface can safely hold a `'static` reference to it.
    pub fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        // ---- Instance / surface / device -------------------------------------
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create wgpu surface")?;
        let ctx = pollster::block_on(GpuContext::new(&instance, Some(&surface)))?;

        // ---- Surface configuration ------------------------------------------
        let surface_caps = surface.get_capabilities(&ctx.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &surface_config);

        // The camera target matches the swapchain where possible so present is
        // a plain copy.
        let camera_format =
            format::from_wgpu(surface_format).unwrap_or(ColorFormat::Rgba8UnormSrgb);
        log::info!(
            "Surface configured: {}×{} {:?}, camera target {:?}",
            width,
            height,
            surface_format,
            camera_format
        );

        let host = WgpuHost::new(ctx);

        // ---- Materials --------------------------------------------------------
        let scene = Arc::new(WgpuMaterial::new(
            &host,
            "scene",
            include_str!("../shaders/scene.wgsl"),
            &["fs_scene"],
            camera_format,
            None,
        )?);
        let grade = WgpuMaterial::new(
            &host,
            "grade",
            include_str!("../shaders/grade.wgsl"),
            &["fs_invert", "fs_grayscale", "fs_pixelate"],
            camera_format,
            None,
        )?;
        let overlay = WgpuMaterial::new(
            &host,
            "overlay",
            include_str!("../shaders/overlay.wgsl"),
            &["fs_vignette", "fs_scanlines"],
            camera_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        )?;
        let materials = HashMap::from([
            ("grade".to_owned(), Arc::new(grade)),
            ("overlay".to_owned(), Arc::new(overlay)),
        ]);

        // ---- Feature ------------------------------------------------------------
        let settings_path = std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS));
        let settings = FeatureSettings::load(&settings_path).unwrap_or_else(|err| {
            log::warn!("{err}; using built-in settings");
            FeatureSettings {
                material: Some("grade".into()),
                ..Default::default()
            }
        });
        let feature = FullScreenFeature::from_settings(&settings, &materials);

        Ok(Self {
            surface,
            surface_config,
            host,
            camera_format,
            scene,
            materials,
            settings_path,
            settings,
            feature,
            missing_inputs: InputRequirements::NONE,
            view: ViewKind::Game,
            frame_index: 0,
            start: Instant::now(),
            fps: FpsCounter::new(),
        })
    }

    // -------------------------------------------------------------------------
    // Resize
    // -------------------------------------------------------------------------

    /// Reconfigure the surface. The camera target and the feature's color copy
    /// follow on the next frame.
    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width == 0 || new_height == 0 {
            return;
        }
        self.surface_config.width = new_width;
        self.surface_config.height = new_height;
        self.surface.configure(self.host.device(), &self.surface_config);
        log::debug!("Surface resized to {}×{}", new_width, new_height);
    }

    // -------------------------------------------------------------------------
    // Input
    // -------------------------------------------------------------------------

    /// Apply an action to the app state.
    ///
    /// Returns `true` if the app should exit (i.e. action was `Quit`).
    pub fn handle_action(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Quit => return true,
            InputAction::CycleView => {
                self.view = next_view(self.view);
                log::info!("View → {:?}", self.view);
            }
            InputAction::ReloadSettings => match FeatureSettings::load(&self.settings_path) {
                Ok(settings) => {
                    log::info!("Reloaded {}", self.settings_path.display());
                    self.settings = settings;
                    self.feature.apply_settings(&self.settings, &self.materials);
                }
                Err(err) => log::warn!("{err:#}"),
            },
            edit => {
                let mut keys: Vec<&str> = self.materials.keys().map(String::as_str).collect();
                keys.sort_unstable();
                if edit_settings(&mut self.settings, edit, &keys) {
                    log::info!(
                        "material {:?} pass {} fetch {}",
                        self.settings.material,
                        self.settings.pass_index,
                        self.settings.fetch_color_buffer
                    );
                    self.feature.apply_settings(&self.settings, &self.materials);
                }
            }
        }
        false
    }

    // -------------------------------------------------------------------------
    // Render
    // -------------------------------------------------------------------------

    /// Run one full frame: scene into the camera target, the feature at its
    /// injection point, then present.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        if let Some(fps) = self.fps.tick() {
            log::debug!(
                "FPS: {:.1}  view: {:?}  color copies: {}",
                fps,
                self.view,
                self.host.live_textures()
            );
        }

        let desc = TargetDescriptor::new(
            self.surface_config.width,
            self.surface_config.height,
            self.camera_format,
        );
        let frame = FrameContext::new(self.frame_index, self.view, desc);
        self.frame_index += 1;

        // --- Acquire surface texture -----------------------------------------
        let output = self.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .host
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        match self.host.begin_frame(desc, self.start.elapsed().as_secs_f32()) {
            Ok(camera) => {
                // --- 1. Scene ------------------------------------------------------
                self.draw_scene(&mut encoder, camera);

                // --- 2. Features ---------------------------------------------------
                let mut queue = PassQueue::new();
                let enqueued = self.feature.add_passes(&mut self.host, &frame, &mut queue);
                if let Some(pass) = enqueued {
                    log::trace!("{pass:?}");
                }
                queue.report_missing_inputs(&mut self.host, &mut self.missing_inputs);
                queue.execute(&mut self.host, &mut encoder, &frame);
                drop(queue);

                // --- 3. Present ----------------------------------------------------
                let surface_format = self.surface_config.format;
                if let Err(err) = self.host.present(&mut encoder, &surface_view, surface_format) {
                    log::warn!("present failed: {err}");
                }
            }
            Err(err) => log::warn!("camera target unavailable: {err}"),
        }

        self.host.queue().submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn draw_scene(&mut self, encoder: &mut wgpu::CommandEncoder, camera: TargetId) {
        let mut params = ParamBlock::new();
        params.set_scale_bias(BLIT_SCALE_BIAS);
        self.host.set_render_target(encoder, camera);
        let draw = DrawCall::fullscreen_triangle(self.scene.as_ref(), 0, &params);
        if let Err(err) = self.host.record_draw(encoder, &draw) {
            log::warn!("scene draw failed: {err}");
        }
    }

    /// Release the feature's GPU resources. Called once when the window closes.
    pub fn shutdown(&mut self) {
        self.feature.dispose(&mut self.host);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use fullscreen_gpu::shaders::with_prelude;

    use super::*;

    fn validate_wgsl(name: &str, fragment: &str, entries: &[&str]) {
        let source = with_prelude(fragment);
        let module = naga::front::wgsl::parse_str(&source)
            .unwrap_or_else(|e| panic!("{name}: {}", e.emit_to_string(&source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("{name}: {e:?}"));

        for entry in entries {
            assert!(
                module.entry_points.iter().any(|ep| ep.name == *entry),
                "{name} has no entry point {entry}"
            );
        }
    }

    #[test]
    fn scene_shader_validates() {
        validate_wgsl("scene", include_str!("../shaders/scene.wgsl"), &["fs_scene"]);
    }

    #[test]
    fn grade_shader_validates() {
        validate_wgsl(
            "grade",
            include_str!("../shaders/grade.wgsl"),
            &["fs_invert", "fs_grayscale", "fs_pixelate"],
        );
    }

    #[test]
    fn overlay_shader_validates() {
        validate_wgsl(
            "overlay",
            include_str!("../shaders/overlay.wgsl"),
            &["fs_vignette", "fs_scanlines"],
        );
    }

    #[test]
    fn bundled_settings_parse_and_name_a_bundled_material() {
        let settings = FeatureSettings::from_ron_str(include_str!("../assets/feature.ron"))
            .expect("bundled settings parse");
        assert_eq!(settings.material.as_deref(), Some("grade"));
        assert_eq!(settings.pass_index, 0);
    }

    #[test]
    fn fps_counter_waits_a_second() {
        let mut fps = FpsCounter::new();
        assert_eq!(fps.tick(), None);
        assert_eq!(fps.frames, 1);
    }
}
