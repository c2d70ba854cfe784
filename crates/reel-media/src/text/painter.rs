//! Glyph rasterizing onto RGBA canvases.

use image::{Rgba, RgbaImage};
use std::collections::HashMap;

use super::font::FontSet;

struct GlyphBitmap {
    metrics: fontdue::Metrics,
    bitmap: Vec<u8>,
}

/// Outline drawn by repeating the glyphs at small offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outline {
    None,
    /// Every offset in a square of `radius` (heavy outline for captions)
    Square { radius: i32, color: [u8; 4] },
    /// Four axis offsets of `radius` (light outline for cards)
    Cross { radius: i32, color: [u8; 4] },
}

impl Outline {
    pub fn offsets(&self) -> Vec<(i32, i32)> {
        match *self {
            Outline::None => Vec::new(),
            Outline::Square { radius, .. } => (-radius..=radius)
                .flat_map(|dx| (-radius..=radius).map(move |dy| (dx, dy)))
                .filter(|&(dx, dy)| dx != 0 || dy != 0)
                .collect(),
            Outline::Cross { radius, .. } => {
                vec![(-radius, 0), (radius, 0), (0, -radius), (0, radius)]
            }
        }
    }

    fn color(&self) -> Option<[u8; 4]> {
        match *self {
            Outline::None => None,
            Outline::Square { color, .. } | Outline::Cross { color, .. } => Some(color),
        }
    }
}

/// Draws text with a per-painter glyph cache.
pub struct TextPainter {
    fonts: FontSet,
    cache: HashMap<(bool, char, u32), GlyphBitmap>,
}

impl TextPainter {
    pub fn new(fonts: FontSet) -> Self {
        Self {
            fonts,
            cache: HashMap::new(),
        }
    }

    fn ascent(&self, size: u32, bold: bool) -> f32 {
        self.fonts
            .get(bold)
            .horizontal_line_metrics(size as f32)
            .map(|m| m.ascent)
            .unwrap_or(size as f32 * 0.8)
    }

    /// Height of one line box (ascent to descent).
    pub fn line_height(&self, size: u32, bold: bool) -> u32 {
        self.fonts
            .get(bold)
            .horizontal_line_metrics(size as f32)
            .map(|m| (m.ascent - m.descent).ceil() as u32)
            .unwrap_or(size * 6 / 5)
    }

    /// Advance width of `text`.
    pub fn measure(&self, text: &str, size: u32, bold: bool) -> u32 {
        let font = self.fonts.get(bold);
        let px = size as f32;
        let mut width = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                width += font.horizontal_kern(prev, ch, px).unwrap_or(0.0);
            }
            width += font.metrics(ch, px).advance_width;
            previous = Some(ch);
        }
        width.ceil() as u32
    }

    /// Draw `text` with its line box top-left at (`x`, `y`).
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        canvas: &mut RgbaImage,
        x: i32,
        y: i32,
        text: &str,
        size: u32,
        bold: bool,
        color: [u8; 4],
    ) {
        let baseline = y as f32 + self.ascent(size, bold);
        let Self { fonts, cache } = self;
        let font = fonts.get(bold);
        let px = size as f32;
        let mut pen = x as f32;
        let mut previous = None;

        for ch in text.chars() {
            if let Some(prev) = previous {
                pen += font.horizontal_kern(prev, ch, px).unwrap_or(0.0);
            }
            previous = Some(ch);

            let glyph = cache.entry((bold, ch, size)).or_insert_with(|| {
                let (metrics, bitmap) = font.rasterize(ch, px);
                GlyphBitmap { metrics, bitmap }
            });

            let gx = (pen + glyph.metrics.xmin as f32).round() as i32;
            let gy = (baseline - glyph.metrics.height as f32 - glyph.metrics.ymin as f32).round() as i32;
            blend_glyph(canvas, gx, gy, glyph, color);
            pen += glyph.metrics.advance_width;
        }
    }

    /// Draw the outline passes first, then the fill.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_outlined(
        &mut self,
        canvas: &mut RgbaImage,
        x: i32,
        y: i32,
        text: &str,
        size: u32,
        bold: bool,
        fill: [u8; 4],
        outline: Outline,
    ) {
        if let Some(color) = outline.color() {
            for (dx, dy) in outline.offsets() {
                self.draw(canvas, x + dx, y + dy, text, size, bold, color);
            }
        }
        self.draw(canvas, x, y, text, size, bold, fill);
    }
}

fn blend_glyph(canvas: &mut RgbaImage, x: i32, y: i32, glyph: &GlyphBitmap, color: [u8; 4]) {
    let (width, height) = canvas.dimensions();
    let gw = glyph.metrics.width;

    for (row, line) in glyph.bitmap.chunks(gw.max(1)).enumerate() {
        let py = y + row as i32;
        if py < 0 || py >= height as i32 {
            continue;
        }
        for (col, &mask) in line.iter().enumerate() {
            let px = x + col as i32;
            if mask == 0 || px < 0 || px >= width as i32 {
                continue;
            }
            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            blend_over(
                canvas.get_pixel_mut(px as u32, py as u32),
                [color[0], color[1], color[2], alpha],
            );
        }
    }
}

/// Source-over compositing with straight alpha.
pub fn blend_over(dst: &mut Rgba<u8>, src: [u8; 4]) {
    let sa = f32::from(src[3]) / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst.0[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let blended = (f32::from(src[c]) * sa + f32::from(dst.0[c]) * da * (1.0 - sa)) / out_a;
        dst.0[c] = blended.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

/// Blend a filled rectangle; coordinates are clamped to the canvas.
pub fn fill_rect(canvas: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 4]) {
    let (width, height) = canvas.dimensions();
    let x0 = x0.clamp(0, width as i32) as u32;
    let x1 = x1.clamp(0, width as i32) as u32;
    let y0 = y0.clamp(0, height as i32) as u32;
    let y1 = y1.clamp(0, height as i32) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            blend_over(canvas.get_pixel_mut(x, y), color);
        }
    }
}

/// Split a word list into two lines at the midpoint.
pub fn split_in_two<T: Clone>(items: &[T]) -> (Vec<T>, Vec<T>) {
    let mid = items.len() / 2;
    (items[..mid].to_vec(), items[mid..].to_vec())
}
