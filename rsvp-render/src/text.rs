use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use std::path::Path;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Read a TTF/OTF file for caption text.
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

/// Rasterise one line of text into a tight, transparent pixmap.
///
/// Returns `None` when nothing in `text` has an outline (empty or
/// whitespace-only lines).
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    rgba: [u8; 4],
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // lay out on a baseline at the ascent
    let mut pen_x = 0.0f32;
    let mut glyphs: Vec<Glyph> = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let first = outlines.first()?.px_bounds();
    let bounds = outlines.iter().map(|o| o.px_bounds()).fold(first, |acc, b| {
        ab_glyph::Rect {
            min: point(acc.min.x.min(b.min.x), acc.min.y.min(b.min.y)),
            max: point(acc.max.x.max(b.max.x), acc.max.y.max(b.max.y)),
        }
    });

    let w = (bounds.max.x.ceil() - bounds.min.x.floor()).max(1.0) as u32;
    let h = (bounds.max.y.ceil() - bounds.min.y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();
    let [r, g, b, a] = rgba;

    for out in &outlines {
        let gb = out.px_bounds();
        out.draw(|x, y, cov| {
            let fx = (x as f32 + gb.min.x - bounds.min.x).floor() as i64;
            let fy = (y as f32 + gb.min.y - bounds.min.y).floor() as i64;
            if fx < 0 || fy < 0 || fx >= w as i64 || fy >= h as i64 {
                return;
            }
            let i = fy as usize * stride + fx as usize;
            let sa = (cov.clamp(0.0, 1.0) * a as f32 / 255.0).clamp(0.0, 1.0);
            if sa <= f32::EPSILON {
                return;
            }
            // source-over in premultiplied space
            let bg = dst[i];
            let inv = 1.0 - sa;
            let mix = |src: u8, back: u8| {
                (src as f32 * sa + back as f32 * inv).round().clamp(0.0, 255.0) as u8
            };
            let out_a = mix(255, bg.alpha());
            let px = PremultipliedColorU8::from_rgba(
                mix(r, bg.red()).min(out_a),
                mix(g, bg.green()).min(out_a),
                mix(b, bg.blue()).min(out_a),
                out_a,
            );
            if let Some(px) = px {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}
