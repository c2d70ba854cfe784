//! Per-frame overlays for the frame-pipe compositor.

use image::{ImageBuffer, Rgb, RgbaImage};
use reel_models::{CaptionPosition, CaptionSegment, CaptionStyle, Rgb as Color};
use tracing::debug;

use crate::captions::CaptionTimeline;
use crate::text::{fill_rect, split_in_two, FontSet, Outline, Sprite, TextPainter};

/// A raw RGB24 frame borrowed from the pump's reusable buffer.
pub type FrameView<'a> = ImageBuffer<Rgb<u8>, &'a mut [u8]>;

/// Something drawn over decoded frames.
pub trait FrameOverlay: Send {
    /// Draw onto frame `index` shown at `timestamp`. Returns whether any
    /// pixel was written.
    fn apply(&mut self, index: u64, timestamp: f64, frame: &mut FrameView<'_>) -> bool;
}

/// Turns one caption segment into a positioned sprite for a frame size.
pub trait CaptionRasterizer: Send {
    fn rasterize(&mut self, segment: &CaptionSegment, width: u32, height: u32) -> Option<Sprite>;
}

/// Burns a caption timeline into frames.
///
/// Each segment is rasterized once, on the first frame where it becomes
/// active, and reused for the rest of its span.
pub struct CaptionOverlay<R> {
    timeline: CaptionTimeline,
    rasterizer: R,
    cached: Option<(usize, Option<Sprite>)>,
}

impl<R: CaptionRasterizer> CaptionOverlay<R> {
    pub fn new(timeline: CaptionTimeline, rasterizer: R) -> Self {
        Self {
            timeline,
            rasterizer,
            cached: None,
        }
    }

    pub fn timeline(&self) -> &CaptionTimeline {
        &self.timeline
    }
}

impl<R: CaptionRasterizer> FrameOverlay for CaptionOverlay<R> {
    fn apply(&mut self, _index: u64, timestamp: f64, frame: &mut FrameView<'_>) -> bool {
        let Some(active) = self.timeline.index_at(timestamp) else {
            return false;
        };

        if self.cached.as_ref().map(|(i, _)| *i) != Some(active) {
            let (width, height) = frame.dimensions();
            let segment = &self.timeline.segments()[active];
            let sprite = self.rasterizer.rasterize(segment, width, height);
            debug!(
                segment = active,
                start_sec = segment.start_sec,
                text = %segment.display_text,
                "Rasterized caption"
            );
            self.cached = Some((active, sprite));
        }

        match &self.cached {
            Some((_, Some(sprite))) => sprite.composite_onto(frame),
            _ => false,
        }
    }
}

/// Font sizes and bar styling per caption style, at a 1080px short side.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CaptionLook {
    size: f32,
    highlight_size: f32,
    bold: bool,
    bar_alpha: u8,
    padding: f32,
    outline_radius: i32,
    max_width: f32,
}

impl CaptionLook {
    fn for_style(style: CaptionStyle) -> Self {
        match style {
            CaptionStyle::Subtitle => Self {
                size: 56.0,
                highlight_size: 56.0,
                bold: false,
                bar_alpha: 180,
                padding: 12.0,
                outline_radius: 2,
                max_width: 0.90,
            },
            CaptionStyle::GroupedHighlight | CaptionStyle::PerWord => Self {
                size: 80.0,
                highlight_size: 92.0,
                bold: true,
                bar_alpha: 160,
                padding: 14.0,
                outline_radius: 3,
                max_width: 0.85,
            },
        }
    }
}

/// Font-backed caption rasterizer.
pub struct CaptionRenderer {
    painter: TextPainter,
    style: CaptionStyle,
    position: CaptionPosition,
}

impl CaptionRenderer {
    pub fn new(fonts: FontSet, style: CaptionStyle, position: CaptionPosition) -> Self {
        Self {
            painter: TextPainter::new(fonts),
            style,
            position,
        }
    }
}

impl CaptionRasterizer for CaptionRenderer {
    fn rasterize(&mut self, segment: &CaptionSegment, width: u32, height: u32) -> Option<Sprite> {
        let look = CaptionLook::for_style(self.style);
        let scale = width.min(height) as f32 / 1080.0;
        let size = scaled(look.size, scale);
        let highlight_size = scaled(look.highlight_size, scale);
        let highlight = if self.style.is_highlighted() {
            segment.highlight()
        } else {
            None
        };

        let words: Vec<&str> = if segment.words.is_empty() {
            segment.display_text.split_whitespace().collect()
        } else {
            segment.words.iter().map(String::as_str).collect()
        };

        let runs = words
            .iter()
            .enumerate()
            .map(|(i, word)| {
                let lit = highlight == Some(i);
                let (size, color) = if lit {
                    (highlight_size, Color::GOLD)
                } else {
                    (size, Color::WHITE)
                };
                Run::new(&self.painter, word, size, opaque(color), look.bold)
            })
            .collect();

        let block = BlockStyle {
            bold: look.bold,
            padding: scaled(look.padding, scale),
            bar_alpha: look.bar_alpha,
            outline: Outline::Square {
                radius: look.outline_radius,
                color: [0, 0, 0, 255],
            },
            max_width: look.max_width,
            y_fraction: self.position.y_fraction(self.style),
            full_width: false,
        };
        paint_block(&mut self.painter, runs, &block, width, height)
    }
}

/// A headline burned into the opening seconds of a video.
pub struct HookOverlay {
    painter: TextPainter,
    text: String,
    until_sec: f64,
    sprite: Option<Option<Sprite>>,
}

impl HookOverlay {
    pub const DEFAULT_DURATION_SEC: f64 = 2.5;

    pub fn new(fonts: FontSet, text: impl Into<String>, duration_sec: f64) -> Self {
        Self {
            painter: TextPainter::new(fonts),
            text: text.into(),
            until_sec: duration_sec,
            sprite: None,
        }
    }
}

impl FrameOverlay for HookOverlay {
    fn apply(&mut self, _index: u64, timestamp: f64, frame: &mut FrameView<'_>) -> bool {
        if timestamp >= self.until_sec {
            return false;
        }
        let Self {
            painter,
            text,
            sprite,
            ..
        } = self;
        let (width, height) = frame.dimensions();
        let sprite = sprite.get_or_insert_with(|| render_hook(painter, text, width, height));
        sprite.as_ref().is_some_and(|s| s.composite_onto(frame))
    }
}

fn render_hook(painter: &mut TextPainter, text: &str, width: u32, height: u32) -> Option<Sprite> {
    let size = 48.max((height as f32 * 0.042).round() as u32);
    let runs = text
        .split_whitespace()
        .map(|word| Run::new(painter, word, size, opaque(Color::WHITE), true))
        .collect();
    let block = BlockStyle {
        bold: true,
        padding: size / 3,
        bar_alpha: 140,
        outline: Outline::Square {
            radius: 3,
            color: [0, 0, 0, 255],
        },
        max_width: 0.80,
        y_fraction: 0.15,
        full_width: true,
    };
    paint_block(painter, runs, &block, width, height)
}

/// A measured word.
#[derive(Debug, Clone)]
struct Run {
    text: String,
    size: u32,
    color: [u8; 4],
    width: u32,
}

impl Run {
    fn new(painter: &TextPainter, text: &str, size: u32, color: [u8; 4], bold: bool) -> Self {
        Self {
            text: text.to_string(),
            size,
            color,
            width: painter.measure(text, size, bold),
        }
    }
}

struct BlockStyle {
    bold: bool,
    padding: u32,
    bar_alpha: u8,
    outline: Outline,
    /// Widest line as a fraction of frame width before wrapping
    max_width: f32,
    /// Top of the block as a fraction of frame height
    y_fraction: f32,
    /// Stretch the bar across the whole frame
    full_width: bool,
}

fn line_width(runs: &[Run], space: u32) -> u32 {
    let words: u32 = runs.iter().map(|r| r.width).sum();
    words + space * runs.len().saturating_sub(1) as u32
}

/// Lay out words on a translucent bar; wraps onto two lines when too wide.
fn paint_block(
    painter: &mut TextPainter,
    runs: Vec<Run>,
    style: &BlockStyle,
    frame_w: u32,
    frame_h: u32,
) -> Option<Sprite> {
    let base_size = runs.iter().map(|r| r.size).min()?;
    let space = painter.measure(" ", base_size, style.bold);
    let limit = (frame_w as f32 * style.max_width) as u32;

    let lines = if runs.len() > 1 && line_width(&runs, space) > limit {
        let (first, second) = split_in_two(&runs);
        vec![first, second]
    } else {
        vec![runs]
    };

    let heights: Vec<u32> = lines
        .iter()
        .map(|line| {
            line.iter()
                .map(|r| painter.line_height(r.size, style.bold))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let gap = style.padding / 2;
    let content_w = lines.iter().map(|l| line_width(l, space)).max().unwrap_or(0);
    let content_h = heights.iter().sum::<u32>() + gap * (lines.len() as u32 - 1);

    let block_w = if style.full_width {
        frame_w
    } else {
        (content_w + 2 * style.padding).min(frame_w)
    };
    let block_h = (content_h + 2 * style.padding).min(frame_h);
    if block_w == 0 || block_h == 0 {
        return None;
    }

    let mut canvas = RgbaImage::new(block_w, block_h);
    fill_rect(
        &mut canvas,
        0,
        0,
        block_w as i32,
        block_h as i32,
        [0, 0, 0, style.bar_alpha],
    );

    let mut y = style.padding as i32;
    for (line, line_h) in lines.iter().zip(&heights) {
        let mut x = (block_w as i32 - line_width(line, space) as i32) / 2;
        for run in line {
            // Bottom-align mixed sizes on one line
            let run_y = y + (*line_h - painter.line_height(run.size, style.bold)) as i32;
            painter.draw_outlined(
                &mut canvas,
                x,
                run_y,
                &run.text,
                run.size,
                style.bold,
                run.color,
                style.outline,
            );
            x += (run.width + space) as i32;
        }
        y += (*line_h + gap) as i32;
    }

    let top = (frame_h as f32 * style.y_fraction) as i32;
    let top = top.min(frame_h as i32 - block_h as i32).max(0);
    Some(Sprite::new((frame_w as i32 - block_w as i32) / 2, top, canvas))
}

fn scaled(size: f32, scale: f32) -> u32 {
    ((size * scale).round() as u32).max(1)
}

fn opaque(color: Color) -> [u8; 4] {
    [color.0[0], color.0[1], color.0[2], 255]
}
