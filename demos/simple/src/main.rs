#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use glasspane::{Frame, Overlay, OverlayOptions, display, egui};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    glasspane::declare_dpi_awareness();

    // cover the primary display
    let options = match display::bounds(0) {
        Some(bounds) => OverlayOptions {
            title: "simple".to_owned(),
            position: (bounds.x, bounds.y),
            size: (bounds.width, bounds.height),
            ..Default::default()
        },
        None => OverlayOptions::default(),
    };

    let mut clicks = 0;
    let mut overlay = Overlay::new(options, move |frame: &mut Frame| {
        egui::Window::new("glasspane").show(frame.ctx(), |ui| {
            ui.label("Everything outside of this window is click-through.");
            ui.label(format!("frame time: {:?}", frame.delta_time()));

            if ui.button(format!("clicked {} times", clicks)).clicked() {
                clicks += 1;
            }

            let handle = frame.handle();
            let mut vsync = handle.vsync();
            if ui.checkbox(&mut vsync, "vsync").changed() {
                handle.set_vsync(vsync);
            }

            let mut fps = handle.fps();
            if ui
                .add(egui::Slider::new(&mut fps, 0..=240).text("fps cap"))
                .changed()
            {
                handle.set_fps(fps);
            }

            let mut clear = handle.clear_color();
            if ui.color_edit_button_srgba(&mut clear).changed() {
                handle.set_clear_color(clear);
            }

            if ui.button("Close").clicked() {
                frame.close();
            }
        });

        Ok(())
    });

    overlay.run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("this demo requires Windows");
}
