//! Word timestamps to display-ready caption segments.

use reel_models::{CaptionSegment, CaptionStyle, Word};

/// Default words per group for grouped-highlight captions.
pub const DEFAULT_GROUP_SIZE: usize = 3;
/// Words per subtitle line group.
pub const SUBTITLE_GROUP_SIZE: usize = 6;

/// Convert words into caption segments for `style`.
///
/// `group_size` applies to grouped-highlight captions; subtitles use
/// [`SUBTITLE_GROUP_SIZE`] and per-word captions one word each. Segments
/// that would never be visible (`end <= start`) are dropped. An empty
/// word list yields no segments.
pub fn segment_words(words: &[Word], style: CaptionStyle, group_size: usize) -> Vec<CaptionSegment> {
    let segments = match style {
        CaptionStyle::GroupedHighlight => grouped_highlight(words, group_size.max(1)),
        CaptionStyle::Subtitle => subtitle(words, SUBTITLE_GROUP_SIZE),
        CaptionStyle::PerWord => per_word(words),
    };

    segments
        .into_iter()
        .filter(|s| s.end_sec > s.start_sec)
        .collect()
}

fn grouped_highlight(words: &[Word], group_size: usize) -> Vec<CaptionSegment> {
    let mut segments = Vec::with_capacity(words.len());

    for group in words.chunks(group_size) {
        let texts: Vec<String> = group.iter().map(|w| w.text.clone()).collect();
        let display_text = texts.join(" ");

        for (idx, word) in group.iter().enumerate() {
            segments.push(CaptionSegment {
                display_text: display_text.clone(),
                words: texts.clone(),
                highlight_index: idx as i32,
                start_sec: word.start_sec,
                end_sec: word.end_sec,
            });
        }
    }

    segments
}

fn subtitle(words: &[Word], group_size: usize) -> Vec<CaptionSegment> {
    words
        .chunks(group_size)
        .filter_map(|group| {
            let first = group.first()?;
            let last = group.last()?;
            let texts: Vec<String> = group.iter().map(|w| w.text.clone()).collect();
            Some(CaptionSegment {
                display_text: texts.join(" "),
                words: texts,
                highlight_index: -1,
                start_sec: first.start_sec,
                end_sec: last.end_sec,
            })
        })
        .collect()
}

fn per_word(words: &[Word]) -> Vec<CaptionSegment> {
    words
        .iter()
        .map(|w| CaptionSegment {
            display_text: w.text.clone(),
            words: vec![w.text.clone()],
            highlight_index: 0,
            start_sec: w.start_sec,
            end_sec: w.end_sec,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(entries: &[(&str, f64, f64)]) -> Vec<Word> {
        entries.iter().map(|(t, s, e)| Word::new(*t, *s, *e)).collect()
    }

    fn sentence(n: usize) -> Vec<Word> {
        (0..n)
            .map(|i| Word::new(format!("w{}", i), i as f64 * 0.4, i as f64 * 0.4 + 0.35))
            .collect()
    }

    #[test]
    fn test_grouped_highlight_rotates_within_group() {
        let input = words(&[("hi", 0.0, 0.3), ("there", 0.3, 0.6), ("friend", 0.6, 1.0)]);
        let segments = segment_words(&input, CaptionStyle::GroupedHighlight, 3);

        assert_eq!(segments.len(), 3);
        let spans = [(0.0, 0.3), (0.3, 0.6), (0.6, 1.0)];
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.words, vec!["hi", "there", "friend"]);
            assert_eq!(seg.display_text, "hi there friend");
            assert_eq!(seg.highlight_index, i as i32);
            assert_eq!((seg.start_sec, seg.end_sec), spans[i]);
        }
    }

    #[test]
    fn test_grouped_highlight_partial_last_group() {
        let segments = segment_words(&sentence(5), CaptionStyle::GroupedHighlight, 3);
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[3].words, vec!["w3", "w4"]);
        assert_eq!(segments[4].highlight_index, 1);
    }

    #[test]
    fn test_subtitle_groups_of_six() {
        let segments = segment_words(&sentence(14), CaptionStyle::Subtitle, 3);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].words.len(), 6);
        assert_eq!(segments[2].words.len(), 2);
        assert!(segments.iter().all(|s| s.highlight_index == -1));
        assert_eq!(segments[0].start_sec, 0.0);
        assert!((segments[0].end_sec - (5.0 * 0.4 + 0.35)).abs() < 1e-9);
    }

    #[test]
    fn test_per_word_highlights_index_zero() {
        let segments = segment_words(&sentence(4), CaptionStyle::PerWord, 3);
        assert_eq!(segments.len(), 4);
        assert!(segments.iter().all(|s| s.highlight_index == 0 && s.words.len() == 1));
    }

    #[test]
    fn test_sorted_and_non_overlapping_for_every_style() {
        let input = sentence(20);
        for style in [CaptionStyle::GroupedHighlight, CaptionStyle::Subtitle, CaptionStyle::PerWord] {
            let segments = segment_words(&input, style, 3);
            for pair in segments.windows(2) {
                assert!(pair[0].start_sec <= pair[1].start_sec, "{}", style);
                assert!(pair[0].end_sec <= pair[1].start_sec, "{}", style);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        for style in [CaptionStyle::GroupedHighlight, CaptionStyle::Subtitle, CaptionStyle::PerWord] {
            assert!(segment_words(&[], style, 3).is_empty());
        }
    }

    #[test]
    fn test_zero_length_words_are_dropped() {
        let input = words(&[("a", 1.0, 1.0), ("b", 1.0, 1.5)]);
        let segments = segment_words(&input, CaptionStyle::PerWord, 3);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].display_text, "b");
    }
}
