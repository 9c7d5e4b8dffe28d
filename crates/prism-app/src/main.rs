// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use prism_core::init_tracing;
use prism_platform::{create_window, framebuffer_size};
use prism_render::Renderer;
use prism_render_vk::{SessionConfig, VkRenderer};
use tracing::{error, info};

use prism_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use serde::Deserialize;

const CONFIG_FILE: &str = "prism.toml";

const EXIT_OK: i32 = 0;
const EXIT_WINDOW_FAILED: i32 = -1;
const EXIT_SESSION_FAILED: i32 = 1;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppCfg {
    session: SessionConfig,
}

struct App {
    cfg: AppCfg,
    // Declared before `window`: the surface must go before the window does.
    renderer: Option<VkRenderer>,
    window: Option<Window>,
    exit_code: i32,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        Self {
            cfg,
            renderer: None,
            window: None,
            exit_code: EXIT_OK,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, code: i32) {
        self.exit_code = code;
        self.shutdown();
        event_loop.exit();
    }

    fn shutdown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            if let Err(e) = renderer.wait_idle() {
                error!("wait_idle on shutdown: {e:#}");
            }
            let frames = renderer.session().frames_presented();
            drop(renderer);
            info!("renderer released after {frames} frame(s)");
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match create_window(event_loop) {
            Ok(w) => w,
            Err(e) => {
                error!("{e:#}");
                self.fail(event_loop, EXIT_WINDOW_FAILED);
                return;
            }
        };

        let size = framebuffer_size(&window);
        match VkRenderer::new(&window, &window, size, &self.cfg.session) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("{e:#}");
                self.window = Some(window);
                self.fail(event_loop, EXIT_SESSION_FAILED);
                return;
            }
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                let Some(renderer) = &mut self.renderer else {
                    return;
                };
                if let Err(e) = renderer.render() {
                    error!("render error: {e:#}");
                    self.fail(event_loop, EXIT_SESSION_FAILED);
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }
}

fn run() -> i32 {
    let cfg: AppCfg = prism_core::load_or_default(CONFIG_FILE);
    let event_loop = match EventLoop::new() {
        Ok(l) => l,
        Err(e) => {
            error!("creating the event loop: {e}");
            return EXIT_WINDOW_FAILED;
        }
    };

    let mut app = App::new(cfg);
    if let Err(e) = event_loop.run_app(&mut app) {
        error!("event loop: {e}");
        app.shutdown();
        return EXIT_WINDOW_FAILED;
    }
    app.shutdown();
    app.exit_code
}

fn main() {
    init_tracing();
    let code = run();
    info!("exiting with code {code}");
    std::process::exit(code);
}
