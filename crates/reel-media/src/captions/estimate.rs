//! Proportional word timing when no transcription is available.

use reel_models::Word;

/// Share of the audio the estimated words are spread over.
const USABLE_FRACTION: f64 = 0.95;

/// Distribute the words of `text` over `audio_duration_sec`.
///
/// Each word gets time in proportion to its character count. The last 5% of
/// the audio is left uncovered so captions never run to the final frame.
pub fn estimate_word_timestamps(text: &str, audio_duration_sec: f64) -> Vec<Word> {
    let raw: Vec<&str> = text.split_whitespace().collect();
    let total_chars: usize = raw.iter().map(|w| w.chars().count()).sum();
    if raw.is_empty() || total_chars == 0 || audio_duration_sec <= 0.0 {
        return Vec::new();
    }

    let usable = audio_duration_sec * USABLE_FRACTION;
    let mut cursor = 0.0;

    raw.into_iter()
        .map(|w| {
            let duration = w.chars().count() as f64 / total_chars as f64 * usable;
            let word = Word::new(w, round_ms(cursor), round_ms(cursor + duration));
            cursor += duration;
            word
        })
        .collect()
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_to_length() {
        let words = estimate_word_timestamps("a bbb", 10.0);
        assert_eq!(words.len(), 2);
        // 1 of 4 characters of 9.5 usable seconds
        assert!((words[0].end_sec - 2.375).abs() < 1e-9);
        assert!((words[1].start_sec - 2.375).abs() < 1e-9);
        assert!((words[1].end_sec - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_contiguous_and_monotonic() {
        let words = estimate_word_timestamps("the quick brown fox jumps over the lazy dog", 7.3);
        for pair in words.windows(2) {
            assert_eq!(pair[0].end_sec, pair[1].start_sec);
            assert!(pair[0].start_sec <= pair[0].end_sec);
        }
        assert!(words.last().unwrap().end_sec <= 7.3 * 0.95 + 1e-3);
    }

    #[test]
    fn test_empty_text() {
        assert!(estimate_word_timestamps("   ", 10.0).is_empty());
        assert!(estimate_word_timestamps("hello", 0.0).is_empty());
    }
}
