use std::sync::Arc;

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

mod app;
mod input;

use app::App;
use input::{on_key, Key};

// ---------------------------------------------------------------------------
// Handler — winit ApplicationHandler
// ---------------------------------------------------------------------------

struct Handler {
    window: Option<Arc<Window>>,
    app: Option<App>,
}

impl Handler {
    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(app) = &mut self.app {
            app.shutdown();
        }
        event_loop.exit();
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyQ => Key::Q,
        KeyCode::Escape => Key::Escape,
        _ => return None,
    })
}

impl ApplicationHandler for Handler {
    /// Called once on desktop when the event loop starts.
    /// Creates the window then initialises the wgpu host and the feature.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("Full-Screen Effects")
            .with_inner_size(winit::dpi::LogicalSize::new(800u32, 600u32));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };
        log::info!("Window created (800×600)");

        match App::new(Arc::clone(&window)) {
            Ok(app) => {
                self.window = Some(window);
                self.app = Some(app);
            }
            Err(err) => {
                log::error!("{err:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested — exiting");
                self.exit(event_loop);
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                let Some(key) = map_key(code) else { return };
                let quit = match &mut self.app {
                    Some(app) => app.handle_action(on_key(key)),
                    None => false,
                };
                if quit {
                    log::info!("{key:?} pressed — exiting");
                    self.exit(event_loop);
                }
            }

            WindowEvent::Resized(new_size) => {
                if let Some(app) = &mut self.app {
                    app.resize(new_size.width, new_size.height);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(app) = &mut self.app else { return };
                match app.render() {
                    Ok(()) => {}
                    // Surface lost / outdated: reconfigure and try again next frame.
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        if let Some(window) = &self.window {
                            let size = window.inner_size();
                            app.resize(size.width, size.height);
                        }
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory — exiting");
                        app.shutdown();
                        event_loop.exit();
                    }
                    Err(e) => log::warn!("render error: {e:?}"),
                }
            }

            _ => {}
        }
    }

    /// Drive continuous redraws (game-loop style).
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut handler = Handler {
        window: None,
        app: None,
    };
    event_loop.run_app(&mut handler).context("event loop error")?;
    Ok(())
}
