#[cfg(windows)]
mod app {
    use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
    use std::{
        env,
        path::PathBuf,
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use glasspane::{
        Frame, OverlayApp, OverlayHandle, OverlayState, egui,
        hotkey::{DEFAULT_COOLDOWN, KeyCooldown},
        image::{ImageInfo, ImageSource},
    };
    use tracing::{debug, info, warn};

    /// `VK_F8`
    const TOGGLE_KEY: u8 = 0x77;

    /// Written by the logic thread, read by the render callback.
    #[derive(Default)]
    pub struct LogicState {
        ticks: AtomicU64,
        hide_secs: AtomicU32,
        sleep_secs: AtomicU32,
        close: AtomicBool,
    }

    pub fn logic_thread(handle: OverlayHandle, state: Arc<LogicState>) {
        let mut toggle = KeyCooldown::new(DEFAULT_COOLDOWN);
        let mut hidden_until = None::<Instant>;

        while handle.state() != OverlayState::Closed {
            state.ticks.fetch_add(1, Ordering::Relaxed);

            if state.close.swap(false, Ordering::AcqRel) {
                info!("logic thread closing overlay");
                handle.close();
            }

            let sleep = state.sleep_secs.swap(0, Ordering::AcqRel);
            if sleep > 0 {
                debug!("logic thread sleeping for {}s", sleep);
                thread::sleep(Duration::from_secs(sleep as u64));
            }

            let hide = state.hide_secs.swap(0, Ordering::AcqRel);
            if hide > 0 {
                handle.set_visible(false);
                hidden_until = Some(Instant::now() + Duration::from_secs(hide as u64));
            }
            if hidden_until.is_some_and(|until| Instant::now() >= until) {
                hidden_until = None;
                handle.set_visible(true);
            }

            if toggle.is_pressed(TOGGLE_KEY) {
                handle.set_visible(!handle.visible());
            }

            thread::sleep(Duration::from_millis(16));
        }
    }

    pub struct MultiThreaded {
        state: Arc<LogicState>,
        image: Option<ImageInfo>,
        size: (u32, u32),
        hide_secs: u32,
        sleep_secs: u32,
    }

    impl MultiThreaded {
        pub fn new(state: Arc<LogicState>, size: (u32, u32)) -> Self {
            Self {
                state,
                image: None,
                size,
                hide_secs: 3,
                sleep_secs: 2,
            }
        }
    }

    fn image_source() -> ImageSource {
        match env::args().nth(1) {
            Some(path) => ImageSource::Path(PathBuf::from(path)),

            None => {
                let (width, height) = (128, 128);
                let mut pixels = Vec::with_capacity(width * height * 4);
                for y in 0..height {
                    for x in 0..width {
                        pixels.extend_from_slice(&[(x * 2) as u8, (y * 2) as u8, 160, 255]);
                    }
                }

                ImageSource::Rgba {
                    size: [width, height],
                    pixels,
                }
            }
        }
    }

    impl OverlayApp for MultiThreaded {
        fn post_initialize(&mut self, frame: &mut Frame) -> anyhow::Result<()> {
            match frame.handle().add_or_get_image("picture", image_source()) {
                Ok(image) => self.image = Some(image),
                Err(err) => warn!("failed to load image. err: {:?}", err),
            }

            Ok(())
        }

        fn render(&mut self, frame: &mut Frame) -> anyhow::Result<()> {
            let handle = frame.handle();

            egui::Window::new("logic thread").show(frame.ctx(), |ui| {
                ui.label(format!(
                    "logic ticks: {}",
                    self.state.ticks.load(Ordering::Relaxed)
                ));
                ui.label(format!("rendered frames: {}", handle.frame_count()));
                ui.label("F8 toggles the overlay");

                ui.horizontal(|ui| {
                    ui.add(egui::Slider::new(&mut self.sleep_secs, 1..=10).suffix("s"));
                    if ui.button("Sleep logic thread").clicked() {
                        self.state
                            .sleep_secs
                            .store(self.sleep_secs, Ordering::Release);
                    }
                });

                ui.horizontal(|ui| {
                    ui.add(egui::Slider::new(&mut self.hide_secs, 1..=10).suffix("s"));
                    if ui.button("Hide overlay").clicked() {
                        self.state.hide_secs.store(self.hide_secs, Ordering::Release);
                    }
                });

                if ui.button("Close from logic thread").clicked() {
                    self.state.close.store(true, Ordering::Release);
                }
            });

            egui::Window::new("window").show(frame.ctx(), |ui| {
                let (mut width, mut height) = self.size;
                let changed = ui
                    .add(egui::Slider::new(&mut width, 200..=3840).text("width"))
                    .changed()
                    | ui
                        .add(egui::Slider::new(&mut height, 200..=2160).text("height"))
                        .changed();

                if changed {
                    self.size = (width, height);
                    handle.set_size(width, height);
                }

                let (x, y) = handle.position();
                ui.label(format!("position: {}, {}", x, y));
            });

            if let Some(image) = self.image {
                egui::Window::new("image").show(frame.ctx(), |ui| {
                    ui.image((
                        image.id,
                        egui::vec2(image.width as f32, image.height as f32),
                    ));
                });
            }

            Ok(())
        }

        fn on_close(&mut self) {
            info!("overlay closed");
        }
    }
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use std::{sync::Arc, thread};

    use glasspane::{Overlay, OverlayOptions, display};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    glasspane::declare_dpi_awareness();

    let mut options = OverlayOptions {
        title: "multi-threaded".to_owned(),
        ..Default::default()
    };
    if let Some(bounds) = display::bounds(0) {
        options.position = (bounds.x, bounds.y);
        options.size = (bounds.width, bounds.height);
    }

    let state = Arc::new(app::LogicState::default());
    let mut overlay = Overlay::new(
        options.clone(),
        app::MultiThreaded::new(state.clone(), options.size),
    );
    overlay.start()?;

    let handle = overlay.handle();
    let logic = thread::spawn(move || app::logic_thread(handle, state));

    let res = overlay.run();
    _ = logic.join();
    res
}

#[cfg(not(windows))]
fn main() {
    eprintln!("this demo requires Windows");
}
