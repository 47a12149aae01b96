#![cfg_attr(windows, windows_subsystem = "windows")]

#[cfg(windows)]
mod app {
    use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::{sync::Arc, time::Duration};

    use glasspane::{
        Frame, OverlayApp, egui,
        font::GlyphRanges,
        image::{ImageInfo, ImageSource},
        schedule::{Scheduler, Signal, Step, TaskId},
    };
    use rand::Rng;
    use tracing::{info, warn};

    const NOISE_KEY: &str = "noise";
    const NOISE_SIZE: usize = 96;

    const PRESETS: [(&str, GlyphRanges); 4] = [
        ("English", GlyphRanges::English),
        ("Korean", GlyphRanges::Korean),
        ("Japanese", GlyphRanges::Japanese),
        ("Cyrillic", GlyphRanges::Cyrillic),
    ];

    #[derive(Default)]
    struct Shared {
        blink: AtomicBool,
        seconds: AtomicU64,
        wakeups: AtomicU64,
        countdown: AtomicU64,
    }

    pub struct Coroutines {
        scheduler: Scheduler,
        tasks: Vec<TaskId>,
        shared: Arc<Shared>,
        signal: Signal,
        noise: Option<ImageInfo>,
        font_path: String,
        font_size: f32,
    }

    impl Coroutines {
        pub fn new() -> Self {
            let mut scheduler = Scheduler::new();
            let shared = Arc::new(Shared::default());
            let signal = Signal::new();
            let mut tasks = vec![];

            tasks.push(scheduler.spawn("blink", {
                let shared = shared.clone();
                move || {
                    shared.blink.fetch_xor(true, Ordering::Relaxed);
                    Step::Wait(Duration::from_millis(500))
                }
            }));

            tasks.push(scheduler.spawn("clock", {
                let shared = shared.clone();
                move || {
                    shared.seconds.fetch_add(1, Ordering::Relaxed);
                    Step::Wait(Duration::from_secs(1))
                }
            }));

            tasks.push(scheduler.spawn("waiter", {
                let shared = shared.clone();
                let signal = signal.clone();
                let mut first = true;
                move || {
                    if !first {
                        shared.wakeups.fetch_add(1, Ordering::Relaxed);
                    }
                    first = false;
                    Step::WaitFor(signal.clone())
                }
            }));

            tasks.push(scheduler.spawn("countdown", {
                let shared = shared.clone();
                let mut left = 10;
                move || {
                    shared.countdown.store(left, Ordering::Relaxed);
                    if left == 0 {
                        info!("countdown finished");
                        return Step::Done;
                    }
                    left -= 1;
                    Step::Wait(Duration::from_secs(1))
                }
            }));

            Self {
                scheduler,
                tasks,
                shared,
                signal,
                noise: None,
                font_path: String::new(),
                font_size: 18.0,
            }
        }

        fn regenerate_noise(&mut self, frame: &Frame) {
            let handle = frame.handle();
            handle.remove_image(NOISE_KEY);

            let mut pixels = vec![0u8; NOISE_SIZE * NOISE_SIZE * 4];
            rand::rng().fill(&mut pixels[..]);
            for alpha in pixels.iter_mut().skip(3).step_by(4) {
                *alpha = 255;
            }

            let source = ImageSource::Rgba {
                size: [NOISE_SIZE, NOISE_SIZE],
                pixels,
            };
            match handle.add_or_get_image(NOISE_KEY, source) {
                Ok(info) => self.noise = Some(info),
                Err(err) => warn!("failed to upload noise image. err: {:?}", err),
            }
        }
    }

    impl OverlayApp for Coroutines {
        fn post_initialize(&mut self, frame: &mut Frame) -> anyhow::Result<()> {
            self.regenerate_noise(frame);
            Ok(())
        }

        fn render(&mut self, frame: &mut Frame) -> anyhow::Result<()> {
            self.scheduler.tick(frame.delta_time());

            let mut regenerate = false;
            egui::Window::new("coroutines").show(frame.ctx(), |ui| {
                let blink = self.shared.blink.load(Ordering::Relaxed);
                ui.colored_label(
                    if blink {
                        egui::Color32::LIGHT_GREEN
                    } else {
                        egui::Color32::DARK_GREEN
                    },
                    "blink",
                );
                ui.label(format!(
                    "clock: {}s",
                    self.shared.seconds.load(Ordering::Relaxed)
                ));
                ui.label(format!(
                    "countdown: {}",
                    self.shared.countdown.load(Ordering::Relaxed)
                ));

                ui.horizontal(|ui| {
                    if ui.button("Raise signal").clicked() {
                        self.signal.raise();
                    }
                    ui.label(format!(
                        "wakeups: {}",
                        self.shared.wakeups.load(Ordering::Relaxed)
                    ));
                });

                ui.separator();
                ui.label(format!(
                    "tasks: {} ticking, {} waiting on signal",
                    self.scheduler.ticking_count(),
                    self.scheduler.signal_count()
                ));
                egui::Grid::new("task stats").striped(true).show(ui, |ui| {
                    ui.label("task");
                    ui.label("resumes");
                    ui.label("average");
                    ui.end_row();

                    for id in &self.tasks {
                        let Some(stats) = self.scheduler.stats(*id) else {
                            continue;
                        };
                        ui.label(&stats.name);
                        ui.label(stats.resumes.to_string());
                        ui.label(format!("{:?}", stats.average()));
                        ui.end_row();
                    }
                });
            });

            egui::Window::new("font").show(frame.ctx(), |ui| {
                ui.horizontal(|ui| {
                    ui.label("path");
                    ui.text_edit_singleline(&mut self.font_path);
                });
                ui.add(egui::Slider::new(&mut self.font_size, 8.0..=48.0).text("size"));

                ui.horizontal(|ui| {
                    for (name, ranges) in PRESETS {
                        if ui.button(name).clicked()
                            && !frame
                                .handle()
                                .replace_font(&self.font_path, self.font_size, ranges)
                        {
                            warn!("font replacement rejected: {}", self.font_path);
                        }
                    }
                });
                ui.label(format!("pending fonts: {}", frame.handle().pending_fonts()));
                ui.label("한국어 日本語 Русский");
            });

            egui::Window::new("noise").show(frame.ctx(), |ui| {
                if let Some(noise) = self.noise {
                    ui.image((
                        noise.id,
                        egui::vec2(noise.width as f32 * 2.0, noise.height as f32 * 2.0),
                    ));
                }
                regenerate = ui.button("Regenerate").clicked();
            });

            if regenerate {
                self.regenerate_noise(frame);
            }

            Ok(())
        }
    }
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use glasspane::{Overlay, OverlayOptions, dbg::WinDbgMakeWriter, display};
    use tracing_subscriber::EnvFilter;

    // readable with a debugger attached, the demo has no console of its own
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(WinDbgMakeWriter::new())
        .init();
    glasspane::declare_dpi_awareness();

    let mut options = OverlayOptions {
        title: "coroutines".to_owned(),
        ..Default::default()
    };
    if let Some(bounds) = display::bounds(0) {
        options.position = (bounds.x, bounds.y);
        options.size = (bounds.width, bounds.height);
    }

    Overlay::new(options, app::Coroutines::new()).run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("this demo requires Windows");
}
