use crate::caption::caption_lines;
use crate::loader::{ImageLoader, decode_pixmap};
use crate::sizing::displayed_size;
use crate::text::render_text_pixmap;
use ab_glyph::FontVec;
use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use rsvp_cache::intern_text;
use rsvp_core::{ImageRef, PreloadReport, PresentOutcome, RenderMode, Sizing, Surface};
use rsvp_timing::{HighPrecisionTimer, Timer};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{BlendMode, Color, FilterQuality, Paint, Pixmap, PixmapPaint, Rect, Transform};

const CAPTION_GAP_PX: f32 = 8.0;
const CAPTION_SIZE_PX: f32 = 24.0;
const LINE_SPACING_PX: f32 = 6.0;
const DEFAULT_DECODE_TOLERANCE: Duration = Duration::from_millis(20);

/// Raster surface: decodes images into pixmaps and composites them, scaled
/// by the sizing policy, onto an offscreen canvas the host copies to screen.
pub struct CanvasSurface<L> {
    width: u32,
    height: u32,
    loader: L,
    sizing: Sizing,
    mode: RenderMode,
    decode_tolerance: Duration,
    timer: HighPrecisionTimer,

    decoded: HashMap<usize, Arc<Pixmap>>,
    undecodable: HashSet<usize>,
    font: Option<FontVec>,
    text_cache: HashMap<usize, Arc<Pixmap>>,

    canvas: Pixmap,
    background: Color,
    image_rect: Option<Rect>,
    caption_rect: Option<Rect>,
    caption_id: Option<usize>,
}

impl<L: ImageLoader> CanvasSurface<L> {
    pub fn new(width: u32, height: u32, loader: L, sizing: Sizing) -> Result<Self> {
        let canvas = blank_canvas(width, height, Color::BLACK)?;
        Ok(Self {
            width,
            height,
            loader,
            sizing,
            mode: RenderMode::Canvas,
            decode_tolerance: DEFAULT_DECODE_TOLERANCE,
            timer: HighPrecisionTimer::new(),
            decoded: HashMap::new(),
            undecodable: HashSet::new(),
            font: None,
            text_cache: HashMap::new(),
            canvas,
            background: Color::BLACK,
            image_rect: None,
            caption_rect: None,
            caption_id: None,
        })
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self.text_cache.clear();
        self
    }

    /// Size images the way a plain image element would: rounded, and
    /// always following the natural aspect ratio.
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    /// Longest a first decode may take before the frame counts as degraded.
    pub fn with_decode_tolerance(mut self, tolerance: Duration) -> Self {
        self.decode_tolerance = tolerance;
        self
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = blank_canvas(width, height, self.background)?;
        self.width = width;
        self.height = height;
        self.image_rect = None;
        self.caption_rect = None;
        self.caption_id = None;
        Ok(())
    }

    /// Premultiplied RGBA bytes of the whole canvas.
    pub fn frame(&self) -> &[u8] {
        self.canvas.data()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn image_rect(&self) -> Option<Rect> {
        self.image_rect
    }

    pub fn caption_visible(&self) -> bool {
        self.caption_id.is_some()
    }

    /// Text-only screen between trials.
    pub fn show_message(&mut self, html: &str) {
        self.reset();
        self.caption_id = Some(intern_text(html));
        let top = self.height as f32 * 0.4;
        self.caption_rect = self.draw_caption(html, top);
    }

    fn decoded(&mut self, image: &ImageRef) -> (Option<Arc<Pixmap>>, PresentOutcome) {
        let id = image.cache_id();
        if let Some(pm) = self.decoded.get(&id) {
            return (Some(Arc::clone(pm)), PresentOutcome::Decoded);
        }
        if self.undecodable.contains(&id) {
            return (None, PresentOutcome::DecodeDegraded);
        }

        let started = self.timer.now();
        match self.load(image) {
            Ok(pm) => {
                let pm = Arc::new(pm);
                self.decoded.insert(id, Arc::clone(&pm));
                let took = self.timer.elapsed(started);
                if took > self.decode_tolerance {
                    warn!(
                        "decoding {image} took {:.3} ms, over the {:.3} ms tolerance",
                        took.as_secs_f64() * 1e3,
                        self.decode_tolerance.as_secs_f64() * 1e3
                    );
                    (Some(pm), PresentOutcome::DecodeDegraded)
                } else {
                    (Some(pm), PresentOutcome::Decoded)
                }
            }
            Err(e) => {
                warn!("decode failed for {image}: {e:#}");
                self.undecodable.insert(id);
                (None, PresentOutcome::DecodeDegraded)
            }
        }
    }

    fn load(&self, image: &ImageRef) -> Result<Pixmap> {
        let bytes = self.loader.load(image)?;
        decode_pixmap(&bytes).with_context(|| format!("image {image}"))
    }

    fn erase(&mut self, rect: Option<Rect>) {
        let Some(r) = rect else { return };
        // one pixel margin for bilinear bleed
        let Some(r) = Rect::from_ltrb(r.left() - 1.0, r.top() - 1.0, r.right() + 1.0, r.bottom() + 1.0)
        else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(self.background);
        paint.anti_alias = false;
        paint.blend_mode = BlendMode::Source;
        self.canvas.fill_rect(r, &paint, Transform::identity(), None);
    }

    fn draw_scaled(&mut self, pm: &Pixmap) -> Option<Rect> {
        let (w, h) = displayed_size(self.mode, &self.sizing, (pm.width(), pm.height()));
        if w == 0 || h == 0 {
            return None;
        }
        let x = ((self.width as f32 - w as f32) * 0.5).floor();
        let y = ((self.height as f32 - h as f32) * 0.5).floor();
        let sx = w as f32 / pm.width() as f32;
        let sy = h as f32 / pm.height() as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.canvas.draw_pixmap(
            0,
            0,
            pm.as_ref(),
            &paint,
            Transform::from_row(sx, 0.0, 0.0, sy, x, y),
            None,
        );
        Rect::from_xywh(x, y, w as f32, h as f32)
    }

    fn draw_caption(&mut self, html: &str, top: f32) -> Option<Rect> {
        let Some(font) = self.font.as_ref() else {
            debug!("no caption font loaded; caption region left blank");
            return None;
        };

        let mut lines = Vec::new();
        for line in caption_lines(html) {
            let id = intern_text(&line);
            let pm = match self.text_cache.get(&id) {
                Some(pm) => Arc::clone(pm),
                None => {
                    let Some(pm) = render_text_pixmap(&line, CAPTION_SIZE_PX, font, [255; 4])
                    else {
                        continue;
                    };
                    let pm = Arc::new(pm);
                    self.text_cache.insert(id, Arc::clone(&pm));
                    pm
                }
            };
            lines.push(pm);
        }

        let mut y = top;
        let mut widest = 0u32;
        for pm in &lines {
            let x = ((self.width as f32 - pm.width() as f32) * 0.5).floor() as i32;
            self.canvas.draw_pixmap(
                x,
                y as i32,
                (**pm).as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
            y += pm.height() as f32 + LINE_SPACING_PX;
            widest = widest.max(pm.width());
        }
        if lines.is_empty() {
            return None;
        }
        let left = ((self.width as f32 - widest as f32) * 0.5).floor();
        Rect::from_xywh(left, top, widest as f32, y - top)
    }
}

impl<L: ImageLoader> Surface for CanvasSurface<L> {
    fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome {
        let (pixmap, outcome) = self.decoded(image);
        let old = self.image_rect.take();
        self.erase(old);
        let old = self.caption_rect.take();
        self.erase(old);

        if let Some(pm) = pixmap {
            self.image_rect = self.draw_scaled(&pm);
        }

        self.caption_id = caption.map(intern_text);
        if let Some(html) = caption {
            let top = self
                .image_rect
                .map_or(self.height as f32 * 0.5, |r| r.bottom())
                + CAPTION_GAP_PX;
            self.caption_rect = self.draw_caption(html, top);
        }
        outcome
    }

    fn clear(&mut self) {
        let old = self.image_rect.take();
        self.erase(old);
    }

    fn reset(&mut self) {
        self.canvas.fill(self.background);
        self.image_rect = None;
        self.caption_rect = None;
        self.caption_id = None;
    }

    fn set_sizing(&mut self, sizing: Sizing) {
        self.sizing = sizing;
    }

    fn preload(&mut self, images: &[ImageRef], budget: Duration) -> PreloadReport {
        let started = self.timer.now();
        let mut report = PreloadReport::default();
        for image in images {
            if self.timer.elapsed(started) > budget {
                report.timed_out = true;
                break;
            }
            match self.decoded(image) {
                (Some(_), _) => report.loaded += 1,
                (None, _) => report.failed.push(image.clone()),
            }
        }
        debug!(
            "preloaded {} images, {} failed{}",
            report.loaded,
            report.failed.len(),
            if report.timed_out { ", budget exhausted" } else { "" }
        );
        report
    }
}

fn blank_canvas(width: u32, height: u32, background: Color) -> Result<Pixmap> {
    let mut pm = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
    pm.fill(background);
    Ok(pm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::test_support::png;

    fn surface(sizing: Sizing) -> CanvasSurface<MemoryLoader> {
        let loader = MemoryLoader::new()
            .with("red.png", png(4, 2, [255, 0, 0, 255]))
            .with("blue.png", png(4, 2, [0, 0, 255, 255]))
            .with("broken.png", b"not an image".to_vec());
        CanvasSurface::new(100, 100, loader, sizing)
            .unwrap()
            .with_decode_tolerance(Duration::from_secs(5))
    }

    #[derive(Debug, PartialEq)]
    enum Shade {
        Red,
        Blue,
        Black,
        Other,
    }

    // bilinear sampling may be off by a rounding step, so classify instead
    fn centre(s: &CanvasSurface<MemoryLoader>) -> Shade {
        let px = s.canvas.pixel(50, 50).unwrap();
        match (px.red(), px.green(), px.blue()) {
            (r, g, b) if r > 200 && g < 40 && b < 40 => Shade::Red,
            (r, g, b) if b > 200 && r < 40 && g < 40 => Shade::Blue,
            (0, 0, 0) => Shade::Black,
            _ => Shade::Other,
        }
    }

    #[test]
    fn present_scales_and_centres_image() {
        let mut s = surface(Sizing {
            height: Some(20),
            ..Sizing::default()
        });
        let out = s.present(&ImageRef::from("red.png"), None);
        assert_eq!(out, PresentOutcome::Decoded);
        let r = s.image_rect().unwrap();
        assert_eq!((r.width(), r.height()), (40.0, 20.0));
        assert_eq!((r.x(), r.y()), (30.0, 40.0));
        assert_eq!(centre(&s), Shade::Red);
        assert!(!s.caption_visible());
    }

    #[test]
    fn element_mode_keeps_aspect_ratio() {
        let sizing = Sizing {
            height: Some(20),
            width: None,
            maintain_aspect_ratio: false,
        };
        let mut s = surface(sizing);
        s.present(&ImageRef::from("red.png"), None);
        let r = s.image_rect().unwrap();
        assert_eq!((r.width(), r.height()), (4.0, 20.0));

        let mut s = surface(sizing).with_render_mode(RenderMode::Element);
        s.present(&ImageRef::from("red.png"), None);
        let r = s.image_rect().unwrap();
        assert_eq!((r.width(), r.height()), (40.0, 20.0));
    }

    #[test]
    fn next_present_replaces_previous_image() {
        let mut s = surface(Sizing::default());
        s.present(&ImageRef::from("red.png"), None);
        s.present(&ImageRef::from("blue.png"), None);
        assert_eq!(centre(&s), Shade::Blue);
    }

    #[test]
    fn clear_blanks_image_but_keeps_caption_region() {
        let mut s = surface(Sizing {
            width: Some(30),
            height: Some(30),
            maintain_aspect_ratio: true,
        });
        s.present(&ImageRef::from("red.png"), Some("<p>Memorize</p>"));
        assert!(s.caption_visible());
        s.clear();
        assert!(s.image_rect().is_none());
        assert!(s.caption_visible());
        assert_eq!(centre(&s), Shade::Black);

        s.reset();
        assert!(!s.caption_visible());
    }

    #[test]
    fn broken_image_degrades_without_failing() {
        let mut s = surface(Sizing::default());
        s.present(&ImageRef::from("red.png"), None);
        let out = s.present(&ImageRef::from("broken.png"), None);
        assert_eq!(out, PresentOutcome::DecodeDegraded);
        assert!(s.image_rect().is_none());
        assert_eq!(centre(&s), Shade::Black);
        assert!(s.present(&ImageRef::from("missing.png"), None).is_degraded());
        // cached failure stays degraded
        assert!(s.present(&ImageRef::from("broken.png"), None).is_degraded());
    }

    #[test]
    fn slow_first_decode_is_degraded_but_drawn() {
        let mut s = surface(Sizing::default()).with_decode_tolerance(Duration::ZERO);
        let out = s.present(&ImageRef::from("red.png"), None);
        assert_eq!(out, PresentOutcome::DecodeDegraded);
        assert!(s.image_rect().is_some());
        // already decoded: no decode cost the second time
        assert_eq!(s.present(&ImageRef::from("red.png"), None), PresentOutcome::Decoded);
    }

    #[test]
    fn preload_reports_failures() {
        let mut s = surface(Sizing::default());
        let report = s.preload(
            &[ImageRef::from("red.png"), ImageRef::from("broken.png")],
            Duration::from_secs(5),
        );
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed, vec![ImageRef::from("broken.png")]);
        assert!(!report.timed_out);
    }

    #[test]
    fn zero_sized_canvas_is_an_error() {
        assert!(CanvasSurface::new(0, 10, MemoryLoader::new(), Sizing::default()).is_err());
    }

    #[test]
    fn message_without_font_still_marks_caption() {
        let mut s = surface(Sizing::default());
        s.show_message("<p>Welcome</p>");
        assert!(s.caption_visible());
        assert!(s.image_rect().is_none());
        assert_eq!(s.frame().len(), 100 * 100 * 4);
    }
}
