use crate::records::RecordSink;
use crate::steps::{Step, screen_html, session_steps};
use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rsvp_core::{Key, KeyEvent, ResultRecord, SessionPhase, Sizing, Surface};
use rsvp_experiment::session::EXAMPLE_BLOCK_NUM;
use rsvp_experiment::{SessionConfig, SessionPlan, SessionSummary, TrialRunner};
use rsvp_render::{CanvasSurface, FontVec, FsLoader};
use rsvp_timing::{HighPrecisionTimer, Timer, duration_ns, ns_to_ms};
use std::collections::VecDeque;
use std::io::Stdout;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key as LogicalKey, KeyCode, NamedKey, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

/// Frames sampled before the frame-timing stats are logged.
const CALIBRATION_FRAMES: usize = 120;

type Runner = TrialRunner<CanvasSurface<FsLoader>, HighPrecisionTimer, StdRng>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Activity {
    Idle,
    /// Text screen up; any key moves on.
    Screen,
    Trial,
    Pause { until: u64 },
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    config: SessionConfig,
    runner: Runner,
    steps: VecDeque<(SessionPhase, Step)>,
    phase: SessionPhase,
    activity: Activity,
    sink: RecordSink<Stdout>,
    windowed: bool,

    frames: usize,
    last_frame_ns: Option<u64>,
    calibrated: bool,
    should_exit: bool,
}

/// The window always shows a canvas; element mode only changes how images
/// are sized on it.
fn session_canvas(
    config: &SessionConfig,
    media_root: &Path,
    font: Option<FontVec>,
) -> Result<CanvasSurface<FsLoader>> {
    let mut surface = CanvasSurface::new(800, 600, FsLoader::new(media_root), Sizing::default())?
        .with_decode_tolerance(config.decode_tolerance())
        .with_render_mode(config.render_mode());
    if let Some(font) = font {
        surface = surface.with_font(font);
    } else {
        warn!("no --font given; instruction and caption text will not be drawn");
    }
    Ok(surface)
}

impl App {
    pub fn new(
        config: SessionConfig,
        media_root: &Path,
        font: Option<FontVec>,
        seed: u64,
        sink: RecordSink<Stdout>,
        windowed: bool,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let plan = SessionPlan::build(&config, &mut rng);
        let steps = session_steps(&config, &plan);
        info!(
            "{} steps planned, {} trials",
            steps.len(),
            plan.trial_count()
        );

        let surface = session_canvas(&config, media_root, font)?;

        Ok(Self {
            window: None,
            pixels: None,
            config,
            runner: TrialRunner::new(surface, HighPrecisionTimer::new(), rng),
            steps,
            phase: SessionPhase::default(),
            activity: Activity::Idle,
            sink,
            windowed,
            frames: 0,
            last_frame_ns: None,
            calibrated: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            "{} on {}/{}; ESC quits",
            self.config.experiment_name,
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;
        if let Some(mhz) = monitor.refresh_rate_millihertz() {
            info!("refresh rate {:.1} Hz", mhz as f64 / 1000.0);
        }

        let mut attributes = Window::default_attributes()
            .with_title(self.config.experiment_name.clone())
            .with_resizable(self.windowed);
        if !self.windowed {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            "display {}x{} at scale {:.2}",
            size.width,
            size.height,
            window.scale_factor()
        );

        let texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, texture)?);
        self.runner
            .surface_mut()
            .resize(size.width, size.height)
            .context("sizing the canvas to the window")?;

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// Enter steps until one needs to wait for time or a key.
    fn advance(&mut self, event_loop: &ActiveEventLoop) {
        self.activity = Activity::Idle;
        loop {
            let Some((phase, step)) = self.steps.pop_front() else {
                info!("session complete");
                self.cleanup_and_exit(event_loop);
                return;
            };
            if phase != self.phase {
                info!("entering {phase:?}");
                self.phase = phase;
            }

            match step {
                Step::Screen(screen) => {
                    let summary = SessionSummary::from_records(self.sink.records());
                    let html = screen_html(&screen, &self.config, &summary, self.example_counts());
                    self.runner.surface_mut().show_message(&html);
                    self.activity = Activity::Screen;
                    return;
                }
                Step::Preload(images, budget) => {
                    let report = self.runner.surface_mut().preload(&images, budget);
                    info!("preloaded {} of {} images", report.loaded, images.len());
                    for image in &report.failed {
                        warn!("could not load {image}");
                    }
                    if report.timed_out {
                        warn!("preload stopped after {} ms", budget.as_millis());
                    }
                }
                Step::Trial(trial) => match self.runner.start(&trial.params) {
                    Ok(()) => {
                        self.activity = Activity::Trial;
                        return;
                    }
                    Err(e) => error!(
                        "skipping trial {:?}/{:?}: {e}",
                        trial.params.block_num, trial.params.trial_num
                    ),
                },
                Step::Pause(pause) if pause.is_zero() => {}
                Step::Pause(pause) => {
                    self.runner.surface_mut().reset();
                    let until = self.runner.timer().now().saturating_add(duration_ns(pause));
                    self.activity = Activity::Pause { until };
                    return;
                }
            }
        }
    }

    /// (trials, correct) in the example block.
    fn example_counts(&self) -> (usize, usize) {
        self.sink
            .records()
            .iter()
            .filter(|r| r.block_num == Some(EXAMPLE_BLOCK_NUM))
            .fold((0, 0), |(n, c), r| (n + 1, c + usize::from(r.correct)))
    }

    fn finish_trial(&mut self, record: ResultRecord, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.sink.emit(record) {
            error!("failed to write record: {e:#}");
        }
        self.advance(event_loop);
    }

    fn update(&mut self, event_loop: &ActiveEventLoop) {
        match self.activity {
            Activity::Trial => {
                if let Some(record) = self.runner.poll() {
                    self.finish_trial(record, event_loop);
                }
            }
            Activity::Pause { until } if self.runner.timer().now() >= until => {
                self.advance(event_loop);
            }
            _ => {}
        }
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(window)) = (self.pixels.as_mut(), self.window.as_ref()) else {
            return Ok(());
        };

        let frame = pixels.frame_mut();
        let canvas = self.runner.surface().frame();
        if frame.len() == canvas.len() {
            frame.copy_from_slice(canvas);
        } else {
            debug!("canvas and frame buffer differ in size; skipping copy");
        }
        pixels.render()?;

        let now = self.runner.timer().now();
        if let Some(last) = self.last_frame_ns.replace(now) {
            self.runner
                .timer_mut()
                .record_frame(Duration::from_nanos(now.saturating_sub(last)));
            self.frames += 1;
        }
        if !self.calibrated && self.frames >= CALIBRATION_FRAMES {
            let stats = self.runner.timer().calibration_stats();
            info!(
                "frame timing: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms, range {:.3}-{:.3} ms",
                ns_to_ms(stats.average_frame_time_ns as u64),
                stats.effective_fps,
                ns_to_ms(stats.jitter_ns as u64),
                ns_to_ms(stats.min_frame_time_ns as u64),
                ns_to_ms(stats.max_frame_time_ns as u64),
            );
            self.calibrated = true;
        }

        window.request_redraw();
        Ok(())
    }

    fn handle_key(&mut self, event: &winit::event::KeyEvent, event_loop: &ActiveEventLoop) {
        if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
            self.cleanup_and_exit(event_loop);
            return;
        }
        let Some(name) = key_name(&event.logical_key) else {
            return;
        };
        let key_event = KeyEvent {
            key: Key::new(&name),
            repeat: event.repeat,
        };

        match self.activity {
            Activity::Screen if !event.repeat => self.advance(event_loop),
            Activity::Trial => {
                if let Some(record) = self.runner.key_pressed(&key_event) {
                    self.finish_trial(record, event_loop);
                }
            }
            _ => {}
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                error!("failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                error!("failed to resize buffer: {e}");
            }
        }
        if let Err(e) = self.runner.surface_mut().resize(size.width, size.height) {
            error!("failed to resize canvas: {e:#}");
        }
        debug!("display resized to {}x{}", size.width, size.height);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        if self.runner.abort() {
            warn!("session ended during a trial; its record is discarded");
        }
        let summary = SessionSummary::from_records(self.sink.records());
        info!(
            "{} records written; {} of {} targets found ({:.2}%)",
            self.sink.records().len(),
            summary.correct,
            summary.trials,
            summary.hit_rate
        );
        self.should_exit = true;
        event_loop.exit();
    }
}

fn key_name(key: &LogicalKey) -> Option<String> {
    match key {
        LogicalKey::Named(NamedKey::Space) => Some("space".into()),
        LogicalKey::Named(named) => Some(format!("{named:?}")),
        LogicalKey::Character(c) => Some(c.to_string()),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("failed to create window and surface: {e:#}");
                event_loop.exit();
                return;
            }
            self.advance(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                self.update(event_loop);
                if let Err(e) = self.render() {
                    error!("render failed: {e:#}");
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(&event, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        } else {
            self.update(event_loop);
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        debug!("application resources released");
    }
}
