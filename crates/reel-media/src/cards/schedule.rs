//! Card timing and sound-effect placement.

use reel_models::TextCard;

use crate::audio::{SfxEvent, SfxKind};

/// Delay between a card appearing and its impact hit.
pub const IMPACT_DELAY_SEC: f64 = 0.5;
/// Shortest hold clip after the fade-in.
pub const MIN_HOLD_SEC: f64 = 0.1;

/// How each card clip is built: a rendered fade-in followed by a held frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTiming {
    pub fps: u32,
    pub fade_frames: u32,
}

impl Default for CardTiming {
    fn default() -> Self {
        Self {
            fps: 30,
            fade_frames: 15,
        }
    }
}

impl CardTiming {
    pub fn fade_sec(&self) -> f64 {
        f64::from(self.fade_frames) / f64::from(self.fps.max(1))
    }

    /// Seconds the full-opacity frame is held.
    pub fn hold_sec(&self, card_duration_sec: f64) -> f64 {
        (card_duration_sec - self.fade_sec()).max(MIN_HOLD_SEC)
    }

    /// Length of the encoded clip for a card.
    pub fn clip_sec(&self, card_duration_sec: f64) -> f64 {
        self.fade_sec() + self.hold_sec(card_duration_sec)
    }
}

/// Start time of each clip on the joined timeline.
///
/// Falls back to back-to-back placement when the crossfade cannot apply
/// (single clip, or a clip no longer than the crossfade).
pub fn clip_starts(durations: &[f64], crossfade_sec: f64) -> Vec<f64> {
    let overlap = effective_crossfade(durations, crossfade_sec);
    let mut starts = Vec::with_capacity(durations.len());
    let mut t = 0.0;
    for d in durations {
        starts.push(t);
        t += d - overlap;
    }
    starts
}

fn effective_crossfade(durations: &[f64], crossfade_sec: f64) -> f64 {
    let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
    if durations.len() > 1 && crossfade_sec > 0.0 && crossfade_sec < shortest {
        crossfade_sec
    } else {
        0.0
    }
}

/// Whoosh at the midpoint of every transition, impact shortly after each
/// card that asks for one. Sorted by time.
pub fn sfx_schedule(cards: &[TextCard], timing: CardTiming, crossfade_sec: f64) -> Vec<SfxEvent> {
    let durations: Vec<f64> = cards.iter().map(|c| timing.clip_sec(c.duration_sec)).collect();
    let overlap = effective_crossfade(&durations, crossfade_sec);
    let starts = clip_starts(&durations, crossfade_sec);

    let mut events = Vec::new();
    for (i, card) in cards.iter().enumerate() {
        if card.triggers_impact_sfx {
            events.push(SfxEvent {
                kind: SfxKind::Impact,
                at_sec: starts[i] + IMPACT_DELAY_SEC,
            });
        }
        if let Some(next) = starts.get(i + 1) {
            events.push(SfxEvent {
                kind: SfxKind::Whoosh,
                at_sec: next + overlap / 2.0,
            });
        }
    }

    events.sort_by(|a, b| a.at_sec.total_cmp(&b.at_sec));
    events
}
