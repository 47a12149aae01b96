use core::time::Duration;
use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::{Context, bail};
use egui::{Color32, FontDefinitions};
use glasspane_event::WindowEvent;
use parking_lot::Mutex;
use scopeguard::defer;
use tracing::{debug, error, trace, warn};

use crate::{
    backend::{Backend, BackendFactory, RenderFrame},
    clickthrough::ClickThrough,
    font::{self, FontGlyphs, FontQueue, FontRequest, GlyphRanges},
    image::{ImageCache, ImageInfo, ImageSource},
    input::{InputBridge, InputCapture},
    lifecycle::{Lifecycle, OverlayState},
    pacing::FramePacing,
};

/// Interval of the polling waits of [`Overlay::start`] and [`Overlay::run`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sleep of a loop iteration while the window is hidden.
const HIDDEN_SLEEP: Duration = Duration::from_millis(10);

const RENDER_THREAD_NAME: &str = "glasspane-render";

/// Overlay configuration.
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    /// Title of the native window.
    pub title: String,

    /// Left-top position of the window on the virtual screen.
    pub position: (i32, i32),

    /// Client area size.
    pub size: (u32, u32),

    /// Frame rate cap used while vsync is off. `0` is uncapped.
    pub fps: u32,

    pub vsync: bool,

    /// Backbuffer clear color. Transparent pixels show the desktop.
    pub clear_color: Color32,

    /// Maximum wait of [`Overlay::start`] for the render thread to initialize.
    pub start_timeout: Duration,

    /// Show the window once created.
    pub visible: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            title: "Overlay".to_owned(),
            position: (0, 0),
            size: (800, 600),
            fps: 60,
            vsync: true,
            clear_color: Color32::TRANSPARENT,
            start_timeout: Duration::from_secs(10),
            visible: true,
        }
    }
}

/// Host side of an overlay.
///
/// Every method is called on the render thread.
pub trait OverlayApp: Send + 'static {
    /// Called once after initialization, before the first frame.
    fn post_initialize(&mut self, _frame: &mut Frame) -> anyhow::Result<()> {
        Ok(())
    }

    /// Draw the UI of a frame.
    ///
    /// An error stops the overlay and is returned from [`Overlay::run`].
    fn render(&mut self, frame: &mut Frame) -> anyhow::Result<()>;

    /// Called once after the render loop stopped.
    fn on_close(&mut self) {}
}

impl<F> OverlayApp for F
where
    F: FnMut(&mut Frame) -> anyhow::Result<()> + Send + 'static,
{
    fn render(&mut self, frame: &mut Frame) -> anyhow::Result<()> {
        self(frame)
    }
}

/// A frame being built.
pub struct Frame<'a> {
    ctx: &'a egui::Context,
    handle: &'a OverlayHandle,
}

impl<'a> Frame<'a> {
    #[inline]
    pub fn ctx(&self) -> &'a egui::Context {
        self.ctx
    }

    #[inline]
    pub fn handle(&self) -> &'a OverlayHandle {
        self.handle
    }

    /// Time passed since the previous frame.
    pub fn delta_time(&self) -> Duration {
        let dt = self.ctx.input(|input| input.unstable_dt);
        Duration::try_from_secs_f32(dt).unwrap_or_default()
    }

    /// Request the overlay to close after this frame.
    pub fn close(&self) {
        self.handle.close();
    }
}

/// Points of a frame, relative to the start of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTimings {
    /// Input of the frame was built.
    pub input: Duration,

    /// UI of the frame was built.
    pub render: Duration,

    /// Input capture was read and click-through updated.
    pub capture: Duration,

    /// Frame was presented.
    pub present: Duration,
}

#[derive(Debug, Default)]
struct WindowRequests {
    position: Option<(i32, i32)>,
    size: Option<(u32, u32)>,
    visible: Option<bool>,
}

#[derive(Debug)]
struct Geometry {
    position: (i32, i32),
    size: (u32, u32),
    visible: bool,
}

struct Shared {
    lifecycle: Lifecycle,
    ctx: egui::Context,
    fonts: FontQueue,
    images: ImageCache,
    pacing: FramePacing,
    clear_color: Mutex<Color32>,
    requests: Mutex<WindowRequests>,
    geometry: Mutex<Geometry>,
    timings: Mutex<Option<FrameTimings>>,
    frames: AtomicU64,
    error: Mutex<Option<anyhow::Error>>,
}

impl Shared {
    fn new(options: &OverlayOptions) -> Self {
        let ctx = egui::Context::default();

        Self {
            lifecycle: Lifecycle::new(),
            images: ImageCache::new(ctx.clone()),
            ctx,
            fonts: FontQueue::new(),
            pacing: FramePacing::new(options.fps, options.vsync),
            clear_color: Mutex::new(options.clear_color),
            requests: Mutex::new(WindowRequests::default()),
            geometry: Mutex::new(Geometry {
                position: options.position,
                size: options.size,
                visible: options.visible,
            }),
            timings: Mutex::new(None),
            frames: AtomicU64::new(0),
            error: Mutex::new(None),
        }
    }

    fn set_error(&self, err: anyhow::Error) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

/// Thread-safe handle controlling a running overlay.
#[derive(Clone)]
pub struct OverlayHandle(Arc<Shared>);

impl OverlayHandle {
    /// Request close. Idempotent, callable from any thread.
    pub fn close(&self) {
        self.0.lifecycle.request_close();
    }

    #[inline]
    pub fn state(&self) -> OverlayState {
        self.0.lifecycle.get()
    }

    /// Queue a font replacement applied before a following frame.
    ///
    /// Returns `false` if the file does not exist or the ranges are malformed.
    pub fn replace_font(&self, path: impl AsRef<Path>, size: f32, glyphs: GlyphRanges) -> bool {
        self.queue_font(path.as_ref(), size, FontGlyphs::Ranges(glyphs))
    }

    /// Queue a font replacement placed in font families by `loader`.
    pub fn replace_font_with(
        &self,
        path: impl AsRef<Path>,
        size: f32,
        loader: impl FnOnce(&mut FontDefinitions) -> anyhow::Result<()> + Send + 'static,
    ) -> bool {
        self.queue_font(path.as_ref(), size, FontGlyphs::Loader(Box::new(loader)))
    }

    fn queue_font(&self, path: &Path, size: f32, glyphs: FontGlyphs) -> bool {
        match FontRequest::new(path, size, glyphs) {
            Ok(request) => {
                self.0.fonts.push(request);
                true
            }

            Err(err) => {
                warn!("font replacement rejected. err: {:?}", err);
                false
            }
        }
    }

    /// Number of font requests not applied yet.
    pub fn pending_fonts(&self) -> usize {
        self.0.fonts.len()
    }

    #[inline]
    pub fn fps(&self) -> u32 {
        self.0.pacing.fps()
    }

    #[inline]
    pub fn set_fps(&self, fps: u32) {
        self.0.pacing.set_fps(fps);
    }

    #[inline]
    pub fn vsync(&self) -> bool {
        self.0.pacing.vsync()
    }

    #[inline]
    pub fn set_vsync(&self, vsync: bool) {
        self.0.pacing.set_vsync(vsync);
    }

    pub fn clear_color(&self) -> Color32 {
        *self.0.clear_color.lock()
    }

    pub fn set_clear_color(&self, color: Color32) {
        *self.0.clear_color.lock() = color;
    }

    /// Last known window position.
    pub fn position(&self) -> (i32, i32) {
        self.0.geometry.lock().position
    }

    pub fn set_position(&self, x: i32, y: i32) {
        self.0.requests.lock().position = Some((x, y));
    }

    /// Last known client area size.
    pub fn size(&self) -> (u32, u32) {
        self.0.geometry.lock().size
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.0.requests.lock().size = Some((width, height));
    }

    pub fn visible(&self) -> bool {
        self.0.geometry.lock().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.0.requests.lock().visible = Some(visible);
    }

    /// Get the texture of `key`, uploading `source` only if the key is new.
    pub fn add_or_get_image(&self, key: &str, source: ImageSource) -> anyhow::Result<ImageInfo> {
        if self.state() == OverlayState::Closed {
            bail!("overlay is closed");
        }

        self.0.images.add_or_get(key, source)
    }

    /// Release the texture of `key`. Returns `false` if the key is unknown.
    pub fn remove_image(&self, key: &str) -> bool {
        self.0.images.remove(key)
    }

    pub fn last_frame_timings(&self) -> Option<FrameTimings> {
        *self.0.timings.lock()
    }

    /// Number of presented frames.
    pub fn frame_count(&self) -> u64 {
        self.0.frames.load(Ordering::Acquire)
    }
}

type Launcher = Box<dyn FnOnce(Arc<Shared>) + Send>;

/// A transparent overlay window rendered on a dedicated thread.
///
/// Nothing native is created until [`Overlay::start`].
pub struct Overlay {
    shared: Arc<Shared>,
    start_timeout: Duration,
    launcher: Option<Launcher>,
    thread: Option<JoinHandle<()>>,
}

impl Overlay {
    /// Create an overlay backed by a Win32 window and Direct3D 11.
    #[cfg(windows)]
    pub fn new(options: OverlayOptions, app: impl OverlayApp) -> Self {
        Self::with_backend(crate::backend::win32::Win32Factory, options, app)
    }

    pub fn with_backend(
        factory: impl BackendFactory,
        options: OverlayOptions,
        app: impl OverlayApp,
    ) -> Self {
        let shared = Arc::new(Shared::new(&options));
        let start_timeout = options.start_timeout;

        Self {
            shared,
            start_timeout,
            launcher: Some(Box::new(move |shared| {
                render_thread(shared, factory, options, app)
            })),
            thread: None,
        }
    }

    pub fn handle(&self) -> OverlayHandle {
        OverlayHandle(self.shared.clone())
    }

    #[inline]
    pub fn state(&self) -> OverlayState {
        self.shared.lifecycle.get()
    }

    /// Start the render thread and wait until it is ready.
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) -> anyhow::Result<()> {
        // an overlay runs at most once
        if self.launcher.is_none() && self.shared.lifecycle.get() == OverlayState::Closed {
            if let Some(err) = self.shared.error.lock().take() {
                return Err(err);
            }
            bail!("overlay is closed");
        }

        if let Some(launcher) = self.launcher.take() {
            if !self
                .shared
                .lifecycle
                .transition(OverlayState::NotStarted, OverlayState::Initializing)
            {
                bail!("overlay is closed before start");
            }

            let shared = self.shared.clone();
            let thread = thread::Builder::new()
                .name(RENDER_THREAD_NAME.to_owned())
                .spawn(move || launcher(shared));

            match thread {
                Ok(thread) => self.thread = Some(thread),
                Err(err) => {
                    self.shared.lifecycle.advance(OverlayState::Closed);
                    return Err(err).context("failed to spawn render thread");
                }
            }
        }

        let deadline = Instant::now() + self.start_timeout;
        loop {
            match self.shared.lifecycle.get() {
                OverlayState::Ready | OverlayState::Running => return Ok(()),

                OverlayState::CloseRequested | OverlayState::Closed => {
                    return match self.shared.error.lock().take() {
                        Some(err) => Err(err),
                        None => Ok(()),
                    };
                }

                OverlayState::NotStarted | OverlayState::Initializing => {}
            }

            if Instant::now() >= deadline {
                self.shared.lifecycle.request_close();
                bail!(
                    "overlay initialization timed out after {:?}",
                    self.start_timeout
                );
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Start if needed and wait until the overlay is closed.
    ///
    /// Returns the error that stopped the render loop.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> anyhow::Result<()> {
        if let Err(err) = self.start() {
            self.join();
            return Err(err);
        }

        while self.shared.lifecycle.get() != OverlayState::Closed {
            thread::sleep(POLL_INTERVAL);
        }
        self.join();

        match self.shared.error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Request close. Idempotent, callable from any thread.
    pub fn close(&self) {
        self.shared.lifecycle.request_close();
    }

    /// Close and wait until every resource is released.
    pub fn dispose(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.lifecycle.request_close();
        // never started, drops the host app without running it
        self.launcher.take();
        self.join();
        self.shared.images.clear();
    }

    fn join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        if thread.join().is_err() {
            error!("render thread panicked");
        }
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[tracing::instrument(skip_all)]
fn render_thread<F: BackendFactory, A: OverlayApp>(
    shared: Arc<Shared>,
    factory: F,
    options: OverlayOptions,
    mut app: A,
) {
    let handle = OverlayHandle(shared.clone());
    defer!({
        if thread::panicking() {
            shared.set_error(anyhow::anyhow!("render thread panicked"));
        }
        shared.lifecycle.advance(OverlayState::Closed);
    });

    let mut render_loop = match RenderLoop::<F::Backend>::new(&shared, factory, &options) {
        Ok(render_loop) => render_loop,
        Err(err) => {
            error!("overlay initialization failed. err: {:?}", err);
            shared.set_error(err);
            return;
        }
    };

    shared.lifecycle.advance(OverlayState::Ready);
    if let Err(err) = app.post_initialize(&mut Frame {
        ctx: &shared.ctx,
        handle: &handle,
    }) {
        error!("post initialize failed. err: {:?}", err);
        shared.set_error(err);
        shared.lifecycle.request_close();
    }
    shared
        .lifecycle
        .transition(OverlayState::Ready, OverlayState::Running);

    while !shared.lifecycle.close_requested() {
        if let Err(err) = render_loop.frame(&handle, &mut app) {
            error!("render loop stopped. err: {:?}", err);
            shared.set_error(err);
            shared.lifecycle.request_close();
        }
    }
    debug!("render loop exited");

    app.on_close();
    shared.images.clear();
    drop(render_loop);
}

struct RenderLoop<B> {
    backend: B,
    clickthrough: ClickThrough,
    bridge: InputBridge,
    events: Vec<WindowEvent>,
    capture: Option<InputCapture>,
    visible: bool,
    surface_ready: bool,
    destroyed: bool,
}

impl<B: Backend> RenderLoop<B> {
    fn new(
        shared: &Shared,
        factory: impl BackendFactory<Backend = B>,
        options: &OverlayOptions,
    ) -> anyhow::Result<Self> {
        let mut backend = factory
            .create(options)
            .context("failed to create overlay window")?;
        let clickthrough = ClickThrough::init_transparency(&mut backend)?;

        let (width, height) = backend.client_size();
        shared.geometry.lock().size = (width, height);

        Ok(Self {
            backend,
            clickthrough,
            bridge: InputBridge::new(width, height),
            events: Vec::new(),
            capture: None,
            visible: false,
            surface_ready: false,
            destroyed: false,
        })
    }

    fn apply_requests(&mut self, shared: &Shared) {
        let requests = std::mem::take(&mut *shared.requests.lock());

        if let Some((x, y)) = requests.position {
            if let Err(err) = self.backend.set_position(x, y) {
                warn!("failed to move overlay window. err: {:?}", err);
            }
        }

        if let Some((width, height)) = requests.size {
            if let Err(err) = self.backend.set_size(width, height) {
                warn!("failed to resize overlay window. err: {:?}", err);
            }
        }

        if let Some(visible) = requests.visible {
            if let Err(err) = self.backend.set_visible(visible) {
                warn!("failed to change overlay visibility. err: {:?}", err);
            }
        }
    }

    fn handle_event(&mut self, shared: &Shared, event: WindowEvent) -> anyhow::Result<()> {
        trace!("window event: {:?}", event);

        match event {
            WindowEvent::Shown { first } => {
                self.visible = true;
                shared.geometry.lock().visible = true;

                if first || !self.surface_ready {
                    let (width, height) = self.backend.client_size();
                    self.backend
                        .recreate_surface(width, height)
                        .context("failed to create render surface")?;
                    self.surface_ready = true;
                    self.bridge.set_screen_size(width, height);
                }
            }

            WindowEvent::Hidden => {
                self.visible = false;
                shared.geometry.lock().visible = false;
            }

            WindowEvent::Resized { width, height } => {
                shared.geometry.lock().size = (width, height);
                if width == 0 || height == 0 {
                    return Ok(());
                }

                if self.surface_ready {
                    self.backend
                        .resize_surface(width, height)
                        .context("failed to resize render surface")?;
                }
                self.bridge.set_screen_size(width, height);
            }

            WindowEvent::Moved { x, y } => {
                shared.geometry.lock().position = (x, y);
            }

            WindowEvent::FocusChanged(focused) => self.bridge.set_focused(focused),

            WindowEvent::Input(input) => self.bridge.handle_input(&input),

            WindowEvent::Destroyed => {
                debug!("overlay window destroyed");
                self.destroyed = true;
                shared.lifecycle.request_close();
            }
        }

        Ok(())
    }

    fn frame(&mut self, handle: &OverlayHandle, app: &mut impl OverlayApp) -> anyhow::Result<()> {
        let shared = &*handle.0;

        self.apply_requests(shared);

        self.backend.pump_message(&mut self.events)?;
        for event in std::mem::take(&mut self.events) {
            self.handle_event(shared, event)?;
        }

        if self.destroyed {
            return Ok(());
        }

        let screen = self.bridge.screen_size();
        if !self.visible || !self.surface_ready || screen.x <= 0.0 || screen.y <= 0.0 {
            thread::sleep(HIDDEN_SLEEP);
            return Ok(());
        }

        let start = Instant::now();
        let raw = self
            .bridge
            .begin_frame(self.backend.modifiers(), self.backend.cursor_position());
        let input = start.elapsed();

        let mut res = Ok(());
        let output = shared.ctx.run(raw, |ctx| {
            if res.is_ok() {
                res = app.render(&mut Frame { ctx, handle });
            }
        });
        let render = start.elapsed();

        let frame = self.bridge.end_frame(&shared.ctx, &output.platform_output);
        self.clickthrough.set_clickable(
            &mut self.backend,
            frame.capture.contains(InputCapture::CURSOR),
        );
        if self.capture != Some(frame.capture) {
            self.capture = Some(frame.capture);
            self.backend.set_capture(frame.capture);
        }
        if let Some(cursor) = frame.cursor {
            self.backend.set_cursor(cursor);
        }
        let capture = start.elapsed();

        res.context("render callback failed")?;

        let primitives = shared
            .ctx
            .tessellate(output.shapes, output.pixels_per_point);
        let clear_color = shared.clear_color.lock().to_normalized_gamma_f32();
        self.backend.render(RenderFrame {
            primitives: &primitives,
            textures_delta: &output.textures_delta,
            pixels_per_point: output.pixels_per_point,
            clear_color,
        })?;

        let vsync = shared.pacing.vsync();
        self.backend.present(vsync)?;
        let present = start.elapsed();

        *shared.timings.lock() = Some(FrameTimings {
            input,
            render,
            capture,
            present,
        });
        shared.frames.fetch_add(1, Ordering::AcqRel);

        if let Some(sleep) = shared.pacing.sleep_after(start.elapsed()) {
            thread::sleep(sleep);
        }

        font::drain_one(&shared.ctx, &shared.fonts);
        Ok(())
    }
}
