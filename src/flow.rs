//! Render loop and the winit host that drives it.
//!
//! # Lifecycle
//!
//! 1. [`run`] builds the event loop and the [`App`] from a [`ViewerConfig`]
//! 2. on `resumed` the window is created (and, on the web, its canvas is
//!    appended to the configured attachment point), the [`Session`] is set
//!    up and the asset load is spawned on the host executor
//! 3. once the GPU context is ready the [`RenderLoop`] starts; from then on
//!    every `RedrawRequested` is one tick
//! 4. the load result comes back as a [`ViewerEvent`] through the event-loop
//!    proxy and is handed to the session on the loop thread
//!
//! The loop never waits for the load: it draws the empty scene until the
//! model arrives, or forever if the load fails.

use std::{cell::Cell, rc::Rc, sync::Arc};

use instant::Duration;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    clock::Clock,
    config::ViewerConfig,
    context::Context,
    error::{Result, ViewerError},
    gpu::GpuRenderer,
    render::Renderer,
    resources::{AssetLoader, HttpSource, LoadedAssets},
    session::Session,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Asks the host for one more frame callback.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

impl<F: FnMut()> FrameScheduler for F {
    fn request_frame(&mut self) {
        self()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// Cancels the loop it was returned from at its next tick.
#[derive(Clone, Debug)]
pub struct LoopHandle {
    cancelled: Rc<Cell<bool>>,
}

impl LoopHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Per-frame driver: `Idle -> Running -> Stopped`.
///
/// Every tick while running first requests the next frame from the
/// scheduler, then lets the session do its frame work.
#[derive(Debug)]
pub struct RenderLoop {
    state: LoopState,
    cancelled: Rc<Cell<bool>>,
    clock: Clock,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            cancelled: Rc::new(Cell::new(false)),
            clock: Clock::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Starts (or restarts) the loop. Starting a running loop returns a
    /// handle to the same run unless that run was cancelled.
    pub fn start(&mut self) -> LoopHandle {
        if self.state != LoopState::Running || self.cancelled.get() {
            self.cancelled = Rc::new(Cell::new(false));
            self.clock.reset();
            self.state = LoopState::Running;
        }
        LoopHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    pub fn stop(&mut self) {
        self.state = LoopState::Stopped;
    }

    /// One tick timed by the loop's own clock.
    pub fn frame(
        &mut self,
        session: &mut Session,
        scheduler: &mut dyn FrameScheduler,
        renderer: &mut dyn Renderer,
    ) -> Result<bool> {
        let dt = self.clock.delta();
        self.advance(dt, session, scheduler, renderer)
    }

    /// One tick with an explicit delta. Returns whether the tick ran.
    pub fn advance(
        &mut self,
        dt: Duration,
        session: &mut Session,
        scheduler: &mut dyn FrameScheduler,
        renderer: &mut dyn Renderer,
    ) -> Result<bool> {
        if self.cancelled.get() {
            self.state = LoopState::Stopped;
        }
        if self.state != LoopState::Running {
            return Ok(false);
        }
        scheduler.request_frame();
        session.tick(dt, renderer)?;
        Ok(true)
    }
}

/// Messages from spawned tasks back to the event loop.
pub enum ViewerEvent {
    #[cfg(target_arch = "wasm32")]
    GraphicsReady(Result<GpuRenderer>),
    Loaded(Result<LoadedAssets>),
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::GraphicsReady(res) => f.debug_tuple("GraphicsReady").field(&res.is_ok()).finish(),
            Self::Loaded(res) => f.debug_tuple("Loaded").field(&res.is_ok()).finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    session: Option<Session>,
    renderer: Option<GpuRenderer>,
    render_loop: RenderLoop,
    handle: Option<LoopHandle>,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            window: None,
            session: None,
            renderer: None,
            render_loop: RenderLoop::new(),
            handle: None,
        })
    }

    fn spawn_load(&self) {
        let loader = AssetLoader::from_config(HttpSource, &self.config);
        let proxy = self.proxy.clone();
        let task = async move {
            let result = loader.load().await;
            if proxy.send_event(ViewerEvent::Loaded(result)).is_err() {
                log::warn!("event loop closed before the assets arrived");
            }
        };
        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.spawn(task);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
    }

    fn graphics_ready(&mut self, renderer: GpuRenderer) {
        let config = &renderer.context().config;
        log::info!("surface ready at {}x{}", config.width, config.height);
        self.renderer = Some(renderer);
        self.handle = Some(self.render_loop.start());
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("rigview");

        #[cfg(target_arch = "wasm32")]
        {
            let window = web_sys::window()
                .ok_or_else(|| ViewerError::Graphics("no browser window".to_string()))?;
            let dimension = |value: std::result::Result<JsValue, JsValue>| {
                value.ok().and_then(|v| v.as_f64()).unwrap_or(1.0)
            };
            window_attributes = window_attributes.with_inner_size(winit::dpi::LogicalSize::new(
                dimension(window.inner_width()),
                dimension(window.inner_height()),
            ));
        }

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .map_err(|e| ViewerError::Graphics(e.to_string()))?,
        );

        #[cfg(target_arch = "wasm32")]
        attach_canvas(&window, &self.config.attach_selector)?;

        Ok(window)
    }
}

/// Appends the window canvas to the first element matching `selector`.
#[cfg(target_arch = "wasm32")]
fn attach_canvas(window: &Window, selector: &str) -> Result<()> {
    use winit::platform::web::WindowExtWebSys;

    let missing = || ViewerError::AttachmentMissing {
        selector: selector.to_string(),
    };
    let parent = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|document| document.query_selector(selector).ok().flatten())
        .ok_or_else(missing)?;
    let canvas = window
        .canvas()
        .ok_or_else(|| ViewerError::Graphics("window has no canvas".to_string()))?;
    parent.append_child(&canvas).map_err(|_| missing())?;
    Ok(())
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match self.create_window(event_loop) {
            Ok(window) => window,
            Err(e) => {
                log::error!("{e}");
                event_loop.exit();
                return;
            }
        };
        let size = window.inner_size();
        self.session = Some(Session::new(self.config.clone(), (size.width, size.height)));
        self.window = Some(window.clone());

        let background = self.config.clear_colour;
        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(Context::new(window)) {
                Ok(ctx) => self.graphics_ready(GpuRenderer::new(ctx, background)),
                Err(e) => {
                    log::error!("{e}");
                    event_loop.exit();
                    return;
                }
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let renderer = Context::new(window)
                    .await
                    .map(|ctx| GpuRenderer::new(ctx, background));
                if proxy.send_event(ViewerEvent::GraphicsReady(renderer)).is_err() {
                    log::warn!("event loop closed before graphics were ready");
                }
            });
        }

        self.spawn_load();
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::GraphicsReady(Ok(renderer)) => self.graphics_ready(renderer),
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::GraphicsReady(Err(e)) => {
                log::error!("{e}");
                event_loop.exit();
            }
            ViewerEvent::Loaded(result) => {
                let Some(session) = &mut self.session else {
                    return;
                };
                match result {
                    Ok(assets) => {
                        let report = session.on_assets_loaded(assets);
                        log::info!(
                            "{} patches applied, {} skipped",
                            report.applied.len(),
                            report.mismatches.len()
                        );
                    }
                    Err(e) => session.on_assets_failed(&e),
                }
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        let _ = event_loop;
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(session) = &mut self.session else {
            return;
        };
        session.controls_mut().handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => {
                if let Some(handle) = &self.handle {
                    handle.cancel();
                }
                self.render_loop.stop();
                event_loop.exit();
            }
            WindowEvent::CursorMoved { position, .. } => {
                session.on_pointer_moved((position.x, position.y));
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size.width, size.height);
                }
                session.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) else {
                    return;
                };
                let mut scheduler = || window.request_redraw();
                if let Err(e) = self.render_loop.frame(session, &mut scheduler, renderer) {
                    log::error!("unable to render: {e}");
                }
            }
            _ => {}
        }
    }
}

/// Opens the viewer and blocks until its window is closed (native) or hands
/// control to the browser (web).
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    #[cfg(not(target_arch = "wasm32"))]
    event_loop.run_app(&mut app)?;

    #[cfg(target_arch = "wasm32")]
    {
        use winit::platform::web::EventLoopExtWebSys;
        event_loop.spawn_app(app);
    }

    Ok(())
}
