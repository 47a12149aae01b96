use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::bail;
use glasspane::{
    Frame, Overlay, OverlayApp, OverlayOptions, OverlayState,
    backend::headless::{HeadlessFactory, HeadlessOp},
    clickthrough::{EX_LAYERED, EX_TRANSPARENT},
    egui::{self, pos2},
    event::WindowEvent,
    font::GlyphRanges,
    image::ImageSource,
};
use parking_lot::Mutex;

const FRAME_LIMIT: u64 = 1000;

fn options() -> OverlayOptions {
    OverlayOptions {
        fps: 0,
        vsync: false,
        start_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn app(f: impl FnMut(&mut Frame) -> anyhow::Result<()> + Send + 'static) -> impl OverlayApp {
    f
}

/// Close after `frames` frames, or a hard limit so a broken loop fails instead of hanging.
fn close_after(frames: u64) -> impl OverlayApp {
    app(move |frame| {
        if frame.handle().frame_count() >= frames.min(FRAME_LIMIT) {
            frame.close();
        }
        Ok(())
    })
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }

    false
}

#[derive(Default)]
struct Calls {
    post_initialize: AtomicU32,
    render: AtomicU32,
    on_close: AtomicU32,
}

struct CountingApp(Arc<Calls>);

impl OverlayApp for CountingApp {
    fn post_initialize(&mut self, _frame: &mut Frame) -> anyhow::Result<()> {
        self.0.post_initialize.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) -> anyhow::Result<()> {
        if self.0.render.fetch_add(1, Ordering::Relaxed) >= 3 {
            frame.close();
        }
        Ok(())
    }

    fn on_close(&mut self) {
        self.0.on_close.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn run_goes_through_lifecycle() {
    let factory = HeadlessFactory::new();
    let calls = Arc::new(Calls::default());
    let mut overlay = Overlay::with_backend(factory.clone(), options(), CountingApp(calls.clone()));
    assert_eq!(overlay.state(), OverlayState::NotStarted);

    overlay.run().unwrap();

    assert_eq!(overlay.state(), OverlayState::Closed);
    assert_eq!(calls.post_initialize.load(Ordering::Relaxed), 1);
    assert_eq!(calls.on_close.load(Ordering::Relaxed), 1);
    assert_eq!(calls.render.load(Ordering::Relaxed), 4);
    assert_eq!(factory.ops().last(), Some(&HeadlessOp::Dropped));
    assert_eq!(factory.live_textures(), 0);
}

#[test]
fn first_show_creates_surface_before_rendering() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory.clone(), options(), close_after(2));
    overlay.run().unwrap();

    let ops = factory.ops();
    let recreate = ops
        .iter()
        .position(|op| *op == HeadlessOp::RecreateSurface(800, 600))
        .unwrap();
    let render = ops
        .iter()
        .position(|op| matches!(op, HeadlessOp::Render { .. }))
        .unwrap();
    assert!(recreate < render);
    assert_eq!(
        factory.count(|op| matches!(op, HeadlessOp::RecreateSurface(..))),
        1
    );
}

#[test]
fn close_before_start() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory.clone(), options(), close_after(1));

    overlay.close();
    assert!(overlay.start().is_err());
    assert_eq!(overlay.state(), OverlayState::Closed);
    assert!(factory.ops().is_empty());
}

#[test]
fn closed_overlay_cannot_start_again() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory.clone(), options(), close_after(1));
    overlay.run().unwrap();
    assert_eq!(overlay.state(), OverlayState::Closed);

    assert!(overlay.start().is_err());
    assert!(overlay.run().is_err());
    assert_eq!(
        factory.count(|op| matches!(op, HeadlessOp::Created { .. })),
        1
    );
}

#[test]
fn dispose_without_start() {
    let factory = HeadlessFactory::new();
    let overlay = Overlay::with_backend(factory.clone(), options(), close_after(1));
    let handle = overlay.handle();

    overlay.dispose();
    assert_eq!(handle.state(), OverlayState::Closed);
    assert!(factory.ops().is_empty());
}

#[test]
fn init_failure_is_returned_from_start() {
    let factory = HeadlessFactory::new();
    factory.fail_create("no display");
    let mut overlay = Overlay::with_backend(factory.clone(), options(), close_after(1));

    let err = overlay.start().unwrap_err();
    assert!(format!("{:#}", err).contains("no display"));
    assert!(wait_until(|| overlay.state() == OverlayState::Closed));
}

#[test]
fn callback_error_stops_before_submit() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(
        factory.clone(),
        options(),
        app(|frame| {
            if frame.handle().frame_count() == 1 {
                bail!("host failure");
            }
            Ok(())
        }),
    );

    let err = overlay.run().unwrap_err();
    assert!(format!("{:#}", err).contains("host failure"));
    assert_eq!(factory.count(|op| matches!(op, HeadlessOp::Render { .. })), 1);
    assert_eq!(
        factory.count(|op| matches!(op, HeadlessOp::Present { .. })),
        1
    );
}

#[test]
fn paint_callback_is_fatal() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(
        factory.clone(),
        options(),
        app(|frame| {
            let callback = egui::epaint::PaintCallback {
                rect: egui::Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(10.0, 10.0)),
                callback: Arc::new(()),
            };
            frame
                .ctx()
                .layer_painter(egui::LayerId::background())
                .add(egui::Shape::Callback(callback));
            Ok(())
        }),
    );

    let err = overlay.run().unwrap_err();
    assert!(format!("{:#}", err).contains("paint callbacks are not supported"));
}

#[test]
fn frame_timings_are_ordered() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory, options(), close_after(5));
    let handle = overlay.handle();
    overlay.run().unwrap();

    let timings = handle.last_frame_timings().unwrap();
    assert!(timings.input <= timings.render);
    assert!(timings.render <= timings.capture);
    assert!(timings.capture <= timings.present);
    assert!(handle.frame_count() >= 5);
}

#[test]
fn resize_reaches_ui_and_surface() {
    let factory = HeadlessFactory::new();
    factory.push_event(WindowEvent::Resized {
        width: 640,
        height: 480,
    });

    let mut overlay = Overlay::with_backend(
        factory.clone(),
        options(),
        app(|frame| {
            let size = frame.ctx().screen_rect().size();
            if size == egui::vec2(640.0, 480.0) || frame.handle().frame_count() >= FRAME_LIMIT {
                frame.close();
            }
            Ok(())
        }),
    );
    let handle = overlay.handle();
    overlay.run().unwrap();

    assert!(factory.ops().contains(&HeadlessOp::ResizeSurface(640, 480)));
    assert_eq!(handle.size(), (640, 480));
}

#[test]
fn zero_size_is_not_resized() {
    let factory = HeadlessFactory::new();
    factory.push_event(WindowEvent::Resized {
        width: 0,
        height: 0,
    });
    factory.push_event(WindowEvent::Resized {
        width: 320,
        height: 200,
    });

    let mut overlay = Overlay::with_backend(
        factory.clone(),
        options(),
        app(|frame| {
            let size = frame.ctx().screen_rect().size();
            if size == egui::vec2(320.0, 200.0) || frame.handle().frame_count() >= FRAME_LIMIT {
                frame.close();
            }
            Ok(())
        }),
    );
    overlay.run().unwrap();

    assert_eq!(factory.count(|op| *op == HeadlessOp::ResizeSurface(0, 0)), 0);
    assert_eq!(
        factory.count(|op| *op == HeadlessOp::ResizeSurface(320, 200)),
        1
    );
}

#[test]
fn close_from_logic_thread() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory, options(), app(|_| Ok(())));
    let handle = overlay.handle();

    let logic = thread::spawn(move || {
        assert!(wait_until(|| handle.frame_count() > 3));
        handle.close();
        handle.close();
    });

    overlay.run().unwrap();
    logic.join().unwrap();
    assert_eq!(overlay.state(), OverlayState::Closed);
}

#[test]
fn transparent_area_is_click_through() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory.clone(), options(), close_after(3));
    overlay.run().unwrap();

    assert!(factory.ops().contains(&HeadlessOp::ExtendFrame));
    let last_style = factory
        .ops()
        .into_iter()
        .filter_map(|op| match op {
            HeadlessOp::SetStyle(style) => Some(style),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(
        last_style & (EX_LAYERED | EX_TRANSPARENT),
        EX_LAYERED | EX_TRANSPARENT
    );
}

#[test]
fn hovered_window_is_clickable() {
    let factory = HeadlessFactory::new();
    factory.set_cursor_position(Some(pos2(700.0, 500.0)));

    let cursor = factory.clone();
    let mut overlay = Overlay::with_backend(
        factory.clone(),
        options(),
        app(move |frame| {
            egui::Window::new("hover target")
                .fixed_pos(pos2(0.0, 0.0))
                .show(frame.ctx(), |ui| ui.label("hover"));

            match frame.handle().frame_count() {
                5 => cursor.set_cursor_position(Some(pos2(20.0, 20.0))),
                count if count >= 10 => frame.close(),
                _ => {}
            }
            Ok(())
        }),
    );
    overlay.run().unwrap();

    let ops = factory.ops();
    let styles = ops
        .iter()
        .enumerate()
        .filter_map(|(index, op)| match op {
            HeadlessOp::SetStyle(style) => Some((index, *style)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(styles.len(), 2, "ops: {:?}", ops);

    let (_, outside) = styles[0];
    assert_eq!(outside & EX_TRANSPARENT, EX_TRANSPARENT);

    let (hovered_at, hovered) = styles[1];
    assert_eq!(hovered & EX_TRANSPARENT, 0);
    assert!(
        ops[hovered_at..].contains(&HeadlessOp::Focus),
        "ops: {:?}",
        ops
    );
}

#[test]
fn queued_fonts_are_drained() {
    let mut broken = tempfile::NamedTempFile::new().unwrap();
    broken.write_all(b"not a font").unwrap();

    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory, options(), app(|_| Ok(())));
    let handle = overlay.handle();

    assert!(!handle.replace_font("missing.ttf", 16.0, GlyphRanges::English));
    assert!(handle.replace_font(broken.path(), 16.0, GlyphRanges::English));
    assert!(handle.replace_font(broken.path(), 18.0, GlyphRanges::Korean));
    assert_eq!(handle.pending_fonts(), 2);

    overlay.start().unwrap();
    assert!(wait_until(|| handle.pending_fonts() == 0));
    overlay.dispose();
}

#[test]
fn fonts_apply_in_order_between_frames() {
    let definitions = egui::FontDefinitions::default();
    let name = &definitions.families[&egui::FontFamily::Proportional][0];
    let mut font = tempfile::NamedTempFile::new().unwrap();
    font.write_all(&definitions.font_data[name].font).unwrap();

    let sizes = Arc::new(Mutex::new(Vec::<f32>::new()));
    let seen = sizes.clone();
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(
        factory,
        options(),
        app(move |frame| {
            let body = frame.ctx().style().text_styles[&egui::TextStyle::Body].size;
            seen.lock().push(body);

            if frame.handle().frame_count() >= 8 {
                frame.close();
            }
            Ok(())
        }),
    );
    let handle = overlay.handle();

    for size in [20.0, 30.0, 40.0] {
        assert!(handle.replace_font(font.path(), size, GlyphRanges::English));
    }
    overlay.run().unwrap();
    assert_eq!(handle.pending_fonts(), 0);

    let mut sizes = sizes.lock().clone();
    sizes.dedup_by(|a, b| (*a - *b).abs() < 0.01);
    assert_eq!(sizes.len(), 4, "body sizes: {:?}", sizes);
    for (size, expected) in sizes[1..].iter().zip([20.0, 30.0, 40.0]) {
        assert!((size - expected).abs() < 0.01, "body sizes: {:?}", sizes);
    }
}

#[test]
fn images_are_uploaded_once() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory, options(), app(|_| Ok(())));
    let handle = overlay.handle();
    overlay.start().unwrap();

    let source = || ImageSource::Rgba {
        size: [2, 2],
        pixels: vec![255; 16],
    };
    let first = handle.add_or_get_image("dot", source()).unwrap();
    let second = handle.add_or_get_image("dot", source()).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!((first.width, first.height), (2, 2));

    assert!(handle.remove_image("dot"));
    assert!(!handle.remove_image("dot"));

    overlay.dispose();
    assert!(handle.add_or_get_image("dot", source()).is_err());
}

#[test]
fn hidden_overlay_idles() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(
        factory.clone(),
        OverlayOptions {
            visible: false,
            ..options()
        },
        app(|_| Ok(())),
    );
    let handle = overlay.handle();
    overlay.start().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(handle.frame_count(), 0);
    assert_eq!(
        factory.count(|op| matches!(op, HeadlessOp::RecreateSurface(..))),
        0
    );

    handle.set_visible(true);
    assert!(wait_until(|| handle.frame_count() > 0));
    assert!(handle.visible());

    handle.set_visible(false);
    assert!(wait_until(|| !handle.visible()));
    overlay.dispose();

    assert_eq!(
        factory.count(|op| matches!(op, HeadlessOp::RecreateSurface(..))),
        1
    );
}

#[test]
fn window_requests_are_applied() {
    let factory = HeadlessFactory::new();
    let mut overlay = Overlay::with_backend(factory.clone(), options(), app(|_| Ok(())));
    let handle = overlay.handle();
    overlay.start().unwrap();

    handle.set_position(100, 50);
    handle.set_size(300, 200);
    assert!(wait_until(|| handle.position() == (100, 50) && handle.size() == (300, 200)));
    overlay.dispose();

    assert!(factory.ops().contains(&HeadlessOp::SetPosition(100, 50)));
    assert!(factory.ops().contains(&HeadlessOp::ResizeSurface(300, 200)));
}
