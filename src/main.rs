use std::convert::Infallible;

use starfield_lib::{
    application::{AppState, Application, Layer, Screen},
    config::{self, SceneConfig},
    field,
    input::{self, InputRouter},
    loader::{self, AssetRequest, GltfSource},
    renderer::SceneRenderer,
    scene::SceneState,
    update,
};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
};

struct Starfield {
    scene: SceneState,
    router: InputRouter,
    renderer: SceneRenderer,
    model_request: Option<AssetRequest>,
}

impl Layer for Starfield {
    type LayerErr = Infallible;

    fn start(screen: &mut Screen, _app: &AppState) -> Self {
        let size = screen.size();
        let config = SceneConfig::default();
        let router = InputRouter::new(config.max_scroll(), size.height as f32);
        let mut scene = SceneState::new(config, size.width, size.height);

        // The field exists before the load is issued, so clones always have a home.
        if let Err(error) = field::generate(&mut scene, &mut rand::thread_rng()) {
            tracing::warn!(%error, "skipping field generation");
        }
        let model_path = config::model_path(std::env::args().skip(1));
        let model_request = Some(AssetRequest::spawn(GltfSource, model_path));

        let renderer = SceneRenderer::new(screen, &scene);

        Self {
            scene,
            router,
            renderer,
            model_request,
        }
    }

    fn process_event(&mut self, event: &Event<()>, screen: &mut Screen) -> bool {
        let Event::WindowEvent { window_id, event } = event else {
            return false;
        };
        if *window_id != screen.window().id() {
            return false;
        }

        if let WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    state: ElementState::Pressed,
                    virtual_keycode: Some(VirtualKeyCode::Escape),
                    ..
                },
            ..
        } = event
        {
            return true;
        }

        for input_event in self.router.translate(event) {
            input::apply(&mut self.scene, input_event);
        }
        false
    }

    // Aspect ratio follows the router's `Resized` event; only GPU targets live here.
    fn resize(&mut self, new_size: PhysicalSize<u32>, _app: &AppState, screen: &mut Screen) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(screen);
        }
    }

    fn update(&mut self, app: &AppState, _screen: &mut Screen) {
        if let Some(request) = self.model_request.as_ref() {
            if let Some(result) = request.poll() {
                let path = request.path().to_owned();
                loader::complete_load(&mut self.scene, &path, result);
                self.model_request = None;
            }
        }

        update::advance(&mut self.scene, app.frame_ticks());
    }

    fn render(&mut self, _app: &AppState, screen: &mut Screen) -> Result<(), wgpu::SurfaceError> {
        self.renderer.prepare(screen, &mut self.scene);
        self.renderer.render(screen)
    }

    fn shutdown(&mut self, _app: &AppState, _screen: &mut Screen) -> Result<(), Self::LayerErr> {
        tracing::info!("exiting");
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(error) = pollster::block_on(Application::<Starfield>::init("starfield")) {
        tracing::error!(%error, "failed to start");
        std::process::exit(1);
    }
}
