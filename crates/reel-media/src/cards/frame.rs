//! Still-frame rendering for text cards.

use image::{imageops, Rgb, RgbImage, Rgba, RgbaImage};
use reel_models::{CardTheme, Rgb as Color, TextCard};

use crate::text::{blend_over, FontSet, Outline, TextPainter};

/// Horizontal padding on each side of the text column.
const PADDING: u32 = 80;
/// Vertical gap between text blocks.
const BLOCK_GAP: u32 = 36;
/// Extra leading added to the font size.
const LEADING: u32 = 12;
const ACCENT_BAR_HEIGHT: u32 = 4;
const GLOW_SIGMA: f32 = 6.0;
/// Margin around a glow layer so the blur is not clipped.
const GLOW_MARGIN: u32 = 36;

/// Vertical linear gradient between two colours.
pub fn gradient(width: u32, height: u32, top: Color, bottom: Color) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    let span = height.saturating_sub(1).max(1) as f32;
    for y in 0..height {
        let Color(rgb) = top.lerp(bottom, y as f32 / span);
        for x in 0..width {
            image.put_pixel(x, y, Rgb(rgb));
        }
    }
    image
}

/// Text opacity of fade frame `frame` out of `fade_frames`.
pub fn fade_opacity(frame: u32, fade_frames: u32) -> u8 {
    if fade_frames == 0 {
        return 255;
    }
    (255 * frame.min(fade_frames) / fade_frames) as u8
}

/// Renders card frames over a shared background.
pub struct CardRenderer {
    painter: TextPainter,
    theme: CardTheme,
    background: RgbImage,
}

struct Block {
    lines: Vec<String>,
    size: u32,
    color: Color,
    bold: bool,
}

impl Block {
    fn line_advance(&self) -> u32 {
        self.size.saturating_add(LEADING)
    }
}

impl CardRenderer {
    pub fn new(fonts: FontSet, theme: CardTheme, width: u32, height: u32) -> Self {
        let mut background = gradient(width, height, theme.bg_top, theme.bg_bottom);
        for y in 0..ACCENT_BAR_HEIGHT.min(height) {
            for x in 0..width {
                background.put_pixel(x, y, Rgb(theme.accent.0));
            }
        }
        Self {
            painter: TextPainter::new(fonts),
            theme,
            background,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.background.dimensions()
    }

    /// Render `card` with its text at `opacity`.
    pub fn render(&mut self, card: &TextCard, opacity: u8) -> RgbImage {
        let (width, height) = self.background.dimensions();
        let column = width.saturating_sub(2 * PADDING).max(1);

        let blocks: Vec<Block> = card
            .lines
            .iter()
            .map(|line| Block {
                lines: wrap_greedy(&self.painter, &line.text, line.size, line.bold, column),
                size: line.size,
                color: line.color,
                bold: line.bold,
            })
            .collect();

        let total_h = stack_height(&blocks);

        let mut layer = RgbaImage::new(width, height);
        let mut y = ((i64::from(height) - i64::from(total_h)) / 2).max(i64::from(i32::MIN)) as i32;

        for block in &blocks {
            let glow = self.theme.is_highlight(block.color);
            for line in &block.lines {
                let text_w = self.painter.measure(line, block.size, block.bold);
                let x = (width as i32 - text_w as i32) / 2;

                if glow && opacity > 0 {
                    let alpha = (opacity / 3).max(30);
                    self.draw_glow(&mut layer, x, y, line, block, text_w, alpha);
                }

                let [r, g, b] = block.color.0;
                self.painter.draw_outlined(
                    &mut layer,
                    x,
                    y,
                    line,
                    block.size,
                    block.bold,
                    [r, g, b, opacity],
                    Outline::Cross {
                        radius: 2,
                        color: [0, 0, 0, opacity],
                    },
                );
                y = y.saturating_add(block.line_advance().min(i32::MAX as u32) as i32);
            }
            y = y.saturating_add(BLOCK_GAP as i32);
        }

        let mut frame = self.background.clone();
        flatten(&mut frame, &layer);
        frame
    }

    /// Blurred copy of a line drawn beneath the sharp text.
    #[allow(clippy::too_many_arguments)]
    fn draw_glow(
        &mut self,
        layer: &mut RgbaImage,
        x: i32,
        y: i32,
        line: &str,
        block: &Block,
        text_w: u32,
        alpha: u8,
    ) {
        let [r, g, b] = block.color.0;
        let glow_w = text_w + 2 * GLOW_MARGIN;
        let glow_h = self.painter.line_height(block.size, block.bold) + 2 * GLOW_MARGIN;
        // Transparent pixels carry the glow colour so the blur does not darken
        let mut glow = RgbaImage::from_pixel(glow_w, glow_h, Rgba([r, g, b, 0]));
        self.painter.draw(
            &mut glow,
            GLOW_MARGIN as i32,
            GLOW_MARGIN as i32,
            line,
            block.size,
            block.bold,
            [r, g, b, alpha],
        );
        let glow = imageops::blur(&glow, GLOW_SIGMA);

        let (width, height) = layer.dimensions();
        let origin_x = x - GLOW_MARGIN as i32;
        let origin_y = y - GLOW_MARGIN as i32;
        for (gx, gy, px) in glow.enumerate_pixels() {
            let lx = origin_x + gx as i32;
            let ly = origin_y + gy as i32;
            if px.0[3] == 0 || lx < 0 || ly < 0 || lx >= width as i32 || ly >= height as i32 {
                continue;
            }
            blend_over(layer.get_pixel_mut(lx as u32, ly as u32), px.0);
        }
    }
}

/// Height of the stacked text blocks, saturating on absurd font sizes.
fn stack_height(blocks: &[Block]) -> u32 {
    let lines = blocks
        .iter()
        .map(|b| b.line_advance().saturating_mul(b.lines.len() as u32))
        .fold(0u32, u32::saturating_add);
    let gaps = BLOCK_GAP.saturating_mul((blocks.len() as u32).saturating_sub(1));
    lines.saturating_add(gaps)
}

/// Word-wrap `text` so each line fits `max_width`.
fn wrap_greedy(painter: &TextPainter, text: &str, size: u32, bold: bool, max_width: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if !current.is_empty() && painter.measure(&candidate, size, bold) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Composite a straight-alpha layer onto an opaque frame.
fn flatten(frame: &mut RgbImage, layer: &RgbaImage) {
    for (dst, src) in frame.pixels_mut().zip(layer.pixels()) {
        let alpha = u16::from(src.0[3]);
        if alpha == 0 {
            continue;
        }
        let inv = 255 - alpha;
        for c in 0..3 {
            dst.0[c] = ((u16::from(src.0[c]) * alpha + u16::from(dst.0[c]) * inv + 127) / 255) as u8;
        }
    }
}
