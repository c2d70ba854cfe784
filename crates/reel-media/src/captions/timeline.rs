//! Time-indexed caption lookup.

use reel_models::CaptionSegment;

/// Caption segments sorted by start time for per-frame lookup.
///
/// Construction sorts the segments, drops empty ones, and clips each end to
/// the next start, so at most one segment is active at any instant.
#[derive(Debug, Clone, Default)]
pub struct CaptionTimeline {
    segments: Vec<CaptionSegment>,
}

impl CaptionTimeline {
    pub fn new(mut segments: Vec<CaptionSegment>) -> Self {
        segments.retain(|s| s.end_sec > s.start_sec);
        segments.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));

        for i in 1..segments.len() {
            let next_start = segments[i].start_sec;
            let prev = &mut segments[i - 1];
            if prev.end_sec > next_start {
                prev.end_sec = next_start;
            }
        }
        segments.retain(|s| s.end_sec > s.start_sec);

        Self { segments }
    }

    pub fn segments(&self) -> &[CaptionSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Index of the segment shown at `timestamp`, if any.
    pub fn index_at(&self, timestamp: f64) -> Option<usize> {
        // Segments starting after `timestamp` are never candidates
        let after = self.segments.partition_point(|s| s.start_sec <= timestamp);
        let candidate = after.checked_sub(1)?;
        self.segments[candidate]
            .is_active_at(timestamp)
            .then_some(candidate)
    }

    /// The segment shown at `timestamp`, if any.
    pub fn active_at(&self, timestamp: f64) -> Option<&CaptionSegment> {
        self.index_at(timestamp).map(|i| &self.segments[i])
    }

    /// End of the last segment.
    pub fn end_sec(&self) -> f64 {
        self.segments.last().map(|s| s.end_sec).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start: f64, end: f64) -> CaptionSegment {
        CaptionSegment {
            display_text: text.into(),
            words: vec![text.into()],
            highlight_index: 0,
            start_sec: start,
            end_sec: end,
        }
    }

    #[test]
    fn test_lookup() {
        let timeline = CaptionTimeline::new(vec![seg("b", 2.0, 4.0), seg("a", 0.5, 1.0)]);
        assert!(timeline.active_at(0.0).is_none());
        assert_eq!(timeline.active_at(0.5).unwrap().display_text, "a");
        assert!(timeline.active_at(1.0).is_none());
        assert!(timeline.active_at(1.5).is_none());
        assert_eq!(timeline.active_at(2.0).unwrap().display_text, "b");
        assert_eq!(timeline.active_at(3.99).unwrap().display_text, "b");
        assert!(timeline.active_at(4.0).is_none());
        assert!(timeline.active_at(100.0).is_none());
    }

    #[test]
    fn test_overlaps_are_clipped() {
        let timeline = CaptionTimeline::new(vec![seg("a", 0.0, 2.0), seg("b", 1.0, 3.0)]);
        assert_eq!(timeline.segments()[0].end_sec, 1.0);
        assert_eq!(timeline.active_at(1.5).unwrap().display_text, "b");
    }

    #[test]
    fn test_degenerate_segments_dropped() {
        let timeline = CaptionTimeline::new(vec![seg("x", 1.0, 1.0), seg("y", 2.0, 1.0)]);
        assert!(timeline.is_empty());
        assert_eq!(timeline.end_sec(), 0.0);
    }
}
