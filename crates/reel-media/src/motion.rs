//! Pan/zoom motion presets ("Ken Burns" transforms).
//!
//! A motion is a pure function of segment progress `p = frame / (frames - 1)`,
//! so the same preset looks identical at any frame rate. The visible window
//! is `src / zoom` and is always clamped inside the pre-scaled source, which
//! is why every zoom value here is `>= 1`.

use reel_models::{MotionSetKind, ResolutionClass};

/// Corner or centre a zoom is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    /// Position of the window as a fraction of the free space (x, y).
    fn fractions(&self) -> (f64, f64) {
        match self {
            Anchor::Center => (0.5, 0.5),
            Anchor::TopLeft => (0.0, 0.0),
            Anchor::TopRight => (1.0, 0.0),
            Anchor::BottomLeft => (0.0, 1.0),
            Anchor::BottomRight => (1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionKind {
    /// Zoom between `zoom_start` and `zoom_end` around a fixed anchor
    Zoom(Anchor),
    /// Straight pan across the free space
    Pan(PanDirection),
    /// Corner-to-corner pan; `reverse` runs bottom-right to top-left
    Diagonal { reverse: bool },
}

/// One motion preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub name: &'static str,
    pub kind: MotionKind,
    pub zoom_start: f64,
    pub zoom_end: f64,
}

/// Visible source rectangle for one output frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropWindow {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Motion {
    const fn zoom(name: &'static str, anchor: Anchor, zoom_start: f64, zoom_end: f64) -> Self {
        Self {
            name,
            kind: MotionKind::Zoom(anchor),
            zoom_start,
            zoom_end,
        }
    }

    const fn pan(name: &'static str, direction: PanDirection, zoom: f64) -> Self {
        Self {
            name,
            kind: MotionKind::Pan(direction),
            zoom_start: zoom,
            zoom_end: zoom,
        }
    }

    const fn diagonal(name: &'static str, reverse: bool, zoom_start: f64, zoom_end: f64) -> Self {
        Self {
            name,
            kind: MotionKind::Diagonal { reverse },
            zoom_start,
            zoom_end,
        }
    }

    /// Zoom factor at progress `p` (0..=1).
    pub fn zoom_at(&self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        (self.zoom_start + (self.zoom_end - self.zoom_start) * p).max(1.0)
    }

    /// Window position as fractions of the free space at progress `p`.
    fn position_at(&self, p: f64) -> (f64, f64) {
        let p = p.clamp(0.0, 1.0);
        match self.kind {
            MotionKind::Zoom(anchor) => anchor.fractions(),
            MotionKind::Pan(PanDirection::LeftToRight) => (p, 0.5),
            MotionKind::Pan(PanDirection::RightToLeft) => (1.0 - p, 0.5),
            MotionKind::Pan(PanDirection::TopToBottom) => (0.5, p),
            MotionKind::Pan(PanDirection::BottomToTop) => (0.5, 1.0 - p),
            MotionKind::Diagonal { reverse: false } => (p, p),
            MotionKind::Diagonal { reverse: true } => (1.0 - p, 1.0 - p),
        }
    }

    /// Sample the visible window for `frame` of `total_frames`.
    pub fn window(&self, frame: u32, total_frames: u32, src_w: f64, src_h: f64) -> CropWindow {
        let p = progress(frame, total_frames);
        let zoom = self.zoom_at(p);
        let width = src_w / zoom;
        let height = src_h / zoom;
        let (fx, fy) = self.position_at(p);
        CropWindow {
            x: ((src_w - width) * fx).clamp(0.0, src_w - width),
            y: ((src_h - height) * fy).clamp(0.0, src_h - height),
            width,
            height,
        }
    }

    /// The same motion as FFmpeg `zoompan` expressions (z, x, y).
    ///
    /// `last_frame` is `frames - 1`; `on` is zoompan's output frame counter.
    fn expressions(&self, last_frame: u32) -> (String, String, String) {
        let p = format!("min(on/{},1)", last_frame.max(1));
        let z = if (self.zoom_end - self.zoom_start).abs() < f64::EPSILON {
            format!("{:.4}", self.zoom_start.max(1.0))
        } else {
            format!(
                "max({:.4}+({:.4})*{},1)",
                self.zoom_start,
                self.zoom_end - self.zoom_start,
                p
            )
        };

        let axis = |fraction: Fraction, free: &str| match fraction {
            Fraction::Fixed(f) if f <= 0.0 => "0".to_string(),
            Fraction::Fixed(f) if f >= 1.0 => free.to_string(),
            Fraction::Fixed(f) => format!("({})*{:.3}", free, f),
            Fraction::Forward => format!("({})*{}", free, p),
            Fraction::Backward => format!("({})*(1-{})", free, p),
        };

        let (fx, fy) = self.fraction_kinds();
        (z, axis(fx, "iw-iw/zoom"), axis(fy, "ih-ih/zoom"))
    }

    fn fraction_kinds(&self) -> (Fraction, Fraction) {
        use Fraction::*;
        match self.kind {
            MotionKind::Zoom(anchor) => {
                let (x, y) = anchor.fractions();
                (Fixed(x), Fixed(y))
            }
            MotionKind::Pan(PanDirection::LeftToRight) => (Forward, Fixed(0.5)),
            MotionKind::Pan(PanDirection::RightToLeft) => (Backward, Fixed(0.5)),
            MotionKind::Pan(PanDirection::TopToBottom) => (Fixed(0.5), Forward),
            MotionKind::Pan(PanDirection::BottomToTop) => (Fixed(0.5), Backward),
            MotionKind::Diagonal { reverse: false } => (Forward, Forward),
            MotionKind::Diagonal { reverse: true } => (Backward, Backward),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Fraction {
    Fixed(f64),
    Forward,
    Backward,
}

fn progress(frame: u32, total_frames: u32) -> f64 {
    if total_frames <= 1 {
        return 0.0;
    }
    (f64::from(frame) / f64::from(total_frames - 1)).clamp(0.0, 1.0)
}

/// Immutable table of motion presets.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSet {
    kind: MotionSetKind,
    motions: Vec<Motion>,
}

impl MotionSet {
    /// Gentle motions for landscape B-roll.
    pub fn landscape() -> Self {
        use Anchor::*;
        use PanDirection::*;
        Self {
            kind: MotionSetKind::Landscape,
            motions: vec![
                Motion::zoom("zoom_in_center", Center, 1.0, 1.15),
                Motion::zoom("zoom_out_center", Center, 1.15, 1.0),
                Motion::pan("pan_left_to_right", LeftToRight, 1.08),
                Motion::pan("pan_right_to_left", RightToLeft, 1.08),
                Motion::zoom("zoom_in_top_left", TopLeft, 1.0, 1.2),
                Motion::zoom("zoom_in_bottom_right", BottomRight, 1.0, 1.2),
                Motion::pan("pan_top_to_bottom", TopToBottom, 1.08),
                Motion::pan("pan_bottom_to_top", BottomToTop, 1.08),
                Motion::zoom("zoom_in_top_right", TopRight, 1.0, 1.2),
                Motion::zoom("zoom_in_bottom_left", BottomLeft, 1.0, 1.2),
                Motion::diagonal("diagonal_down", false, 1.1, 1.1),
                Motion::diagonal("diagonal_up", true, 1.1, 1.1),
            ],
        }
    }

    /// Faster, steeper motions that read well in a short-form feed.
    pub fn vertical() -> Self {
        use Anchor::*;
        use PanDirection::*;
        Self {
            kind: MotionSetKind::Vertical,
            motions: vec![
                Motion::zoom("fast_zoom_in", Center, 1.0, 1.35),
                Motion::zoom("fast_zoom_out", Center, 1.35, 1.0),
                Motion::pan("pan_down", TopToBottom, 1.25),
                Motion::pan("pan_up", BottomToTop, 1.25),
                Motion::zoom("zoom_top_left", TopLeft, 1.0, 1.4),
                Motion::zoom("zoom_bottom_right", BottomRight, 1.0, 1.4),
                Motion::zoom("zoom_top_right", TopRight, 1.0, 1.35),
                Motion::zoom("zoom_bottom_left", BottomLeft, 1.0, 1.35),
                Motion::diagonal("diagonal_down", false, 1.0, 1.3),
                Motion::diagonal("diagonal_up", true, 1.0, 1.3),
                Motion::zoom("punch_in", Center, 1.0, 1.5),
                Motion::pan("drift_right", LeftToRight, 1.25),
            ],
        }
    }

    /// Barely perceptible motions for long ambient segments.
    pub fn ambient() -> Self {
        use Anchor::*;
        use PanDirection::*;
        Self {
            kind: MotionSetKind::Ambient,
            motions: vec![
                Motion::zoom("slow_zoom_in", Center, 1.0, 1.08),
                Motion::zoom("slow_zoom_out", Center, 1.08, 1.0),
                Motion::pan("drift_right", LeftToRight, 1.05),
                Motion::pan("drift_left", RightToLeft, 1.05),
                Motion::pan("drift_down", TopToBottom, 1.05),
                Motion::pan("drift_up", BottomToTop, 1.05),
                Motion::zoom("creep_top_left", TopLeft, 1.0, 1.06),
                Motion::zoom("creep_bottom_right", BottomRight, 1.0, 1.06),
            ],
        }
    }

    pub fn for_kind(kind: MotionSetKind) -> Self {
        match kind {
            MotionSetKind::Landscape => Self::landscape(),
            MotionSetKind::Vertical => Self::vertical(),
            MotionSetKind::Ambient => Self::ambient(),
        }
    }

    pub fn kind(&self) -> MotionSetKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.motions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }

    /// Motion for any index; indices wrap around the table.
    pub fn get(&self, index: usize) -> &Motion {
        &self.motions[index % self.motions.len()]
    }

    /// Full parametrized motion for one segment.
    pub fn plan(
        &self,
        index: usize,
        duration_sec: f64,
        fps: u32,
        resolution: ResolutionClass,
    ) -> MotionPlan {
        let frames = ((duration_sec * f64::from(fps)).round() as u32).max(1);
        MotionPlan {
            motion: *self.get(index),
            frames,
            fps,
            output: resolution.dimensions(),
            source: source_dimensions(resolution),
        }
    }
}

/// Size the source image is normalised to before motion is applied.
///
/// The width is the class minimum; the height follows the output aspect so
/// the crop window never leaves the image.
pub fn source_dimensions(resolution: ResolutionClass) -> (u32, u32) {
    let (out_w, out_h) = resolution.dimensions();
    let src_w = resolution.min_source_width();
    let src_h = (u64::from(src_w) * u64::from(out_h) / u64::from(out_w)) as u32;
    (src_w, src_h & !1)
}

/// A motion bound to a concrete frame count and geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPlan {
    pub motion: Motion,
    pub frames: u32,
    pub fps: u32,
    pub output: (u32, u32),
    pub source: (u32, u32),
}

impl MotionPlan {
    pub fn window_at(&self, frame: u32) -> CropWindow {
        self.motion.window(
            frame,
            self.frames,
            f64::from(self.source.0),
            f64::from(self.source.1),
        )
    }

    /// Exact duration of the rendered clip.
    pub fn duration_sec(&self) -> f64 {
        f64::from(self.frames) / f64::from(self.fps.max(1))
    }

    /// Complete `-vf` chain: fill-scale the source, then pan/zoom to output.
    pub fn filter_chain(&self) -> String {
        let (src_w, src_h) = self.source;
        let (out_w, out_h) = self.output;
        let (z, x, y) = self.motion.expressions(self.frames.saturating_sub(1));
        format!(
            "scale={sw}:{sh}:force_original_aspect_ratio=increase,crop={sw}:{sh},setsar=1,\
             zoompan=z='{z}':x='{x}':y='{y}':d={d}:s={ow}x{oh}:fps={fps},format=yuv420p",
            sw = src_w,
            sh = src_h,
            z = z,
            x = x,
            y = y,
            d = self.frames,
            ow = out_w,
            oh = out_h,
            fps = self.fps,
        )
    }
}
