//! Text-quality heuristics
//!
//! Engines that do not report native confidence (ocrs) score their output by
//! looking for the patterns garbled recognition tends to produce.

/// Individual quality signals, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSignals {
    pub characters: f32,
    pub word_lengths: f32,
    pub whitespace: f32,
    pub repetition: f32,
}

impl TextSignals {
    pub fn measure(text: &str) -> Self {
        Self {
            characters: character_signal(text),
            word_lengths: word_length_signal(text),
            whitespace: whitespace_signal(text),
            repetition: repetition_signal(text),
        }
    }

    /// Weighted combination of the signals
    pub fn combined(&self) -> f32 {
        let score = 0.40 * self.characters
            + 0.30 * self.word_lengths
            + 0.15 * self.whitespace
            + 0.15 * self.repetition;
        score.clamp(0.0, 1.0)
    }
}

/// Confidence for a piece of recognized text.
///
/// Empty text scores 0; text shorter than five characters is too short to
/// judge and scores 0.5.
pub fn text_confidence(text: &str) -> f32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if trimmed.chars().count() < 5 {
        return 0.5;
    }
    TextSignals::measure(trimmed).combined()
}

/// Penalizes exotic symbols and text with very few letters.
fn character_signal(text: &str) -> f32 {
    let mut total = 0usize;
    let mut letters = 0usize;
    let mut exotic = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_alphabetic() {
            letters += 1;
        } else if !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation() {
            exotic += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }

    let exotic_penalty = 1.0 - (exotic as f32 / total as f32 * 10.0).min(1.0);
    let letter_score = (letters as f32 / total as f32 * 1.5).min(1.0);

    0.6 * exotic_penalty + 0.4 * letter_score
}

/// Garbled output skews toward one-character fragments or run-on tokens.
fn word_length_signal(text: &str) -> f32 {
    let lengths: Vec<usize> = text.split_whitespace().map(|w| w.chars().count()).collect();
    if lengths.is_empty() {
        return 0.5;
    }

    let average = lengths.iter().sum::<usize>() as f32 / lengths.len() as f32;
    let average_score = match average as usize {
        0..=1 => 0.3,
        2..=3 => 0.7,
        4..=8 => 1.0,
        9..=12 => 0.8,
        _ => 0.4,
    };

    let singles = lengths.iter().filter(|&&len| len == 1).count();
    let single_penalty = 1.0 - (singles as f32 / lengths.len() as f32 * 1.5).min(0.5);

    average_score * single_penalty
}

/// Prose sits around 10-25% whitespace.
fn whitespace_signal(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let spaces = text.chars().filter(|c| c.is_whitespace()).count();
    let percent = (spaces * 100 / total) as u32;

    match percent {
        0..=5 => 0.5,
        6..=10 => 0.8,
        11..=25 => 1.0,
        26..=40 => 0.7,
        _ => 0.3,
    }
}

/// Long runs of one character ("aaaa", "####") point at recognizer confusion.
fn repetition_signal(text: &str) -> f32 {
    let mut longest = 1usize;
    let mut run = 1usize;
    let mut previous: Option<char> = None;

    for c in text.chars() {
        if previous == Some(c) && !c.is_whitespace() {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
        previous = Some(c);
    }

    match longest {
        0..=3 => 1.0,
        4..=5 => 0.8,
        6..=10 => 0.5,
        _ => 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_returns_zero() {
        assert_eq!(text_confidence(""), 0.0);
        assert_eq!(text_confidence("   \n"), 0.0);
    }

    #[test]
    fn test_short_text_returns_half() {
        assert_eq!(text_confidence("Hi"), 0.5);
        assert_eq!(text_confidence("Test"), 0.5);
    }

    #[test]
    fn test_clean_text_high_confidence() {
        let confidence = text_confidence("Hello World OCR Test 12345");
        assert!(confidence > 0.7, "Expected > 0.7, got {}", confidence);
    }

    #[test]
    fn test_normal_sentence_good_confidence() {
        let confidence = text_confidence("The quick brown fox jumps over the lazy dog.");
        assert!(confidence > 0.75, "Expected > 0.75, got {}", confidence);
    }

    #[test]
    fn test_garbled_text_low_confidence() {
        let confidence = text_confidence("§±®©¥€£¢¤");
        assert!(confidence < 0.5, "Expected < 0.5, got {}", confidence);
    }

    #[test]
    fn test_single_char_words_lower_confidence() {
        let confidence = text_confidence("a b c d e f g h i j k l m n o p");
        assert!(confidence < 0.7, "Expected < 0.7, got {}", confidence);
    }

    #[test]
    fn test_repeated_chars_lower_confidence() {
        let clean = text_confidence("Hello there World");
        let repeated = text_confidence("Hello aaaaaaaaaaaa World");
        assert!(repeated < clean, "{} should be < {}", repeated, clean);
    }

    #[test]
    fn test_signals_stay_in_unit_range() {
        for text in ["x", "####", "a\tb\tc", "ünïcödé wörds", "1234567890"] {
            let signals = TextSignals::measure(text);
            for value in [
                signals.characters,
                signals.word_lengths,
                signals.whitespace,
                signals.repetition,
            ] {
                assert!((0.0..=1.0).contains(&value), "{} out of range for {:?}", value, text);
            }
        }
    }

    #[test]
    fn test_repetition_signal() {
        assert_eq!(repetition_signal("Hello World"), 1.0);
        assert!(repetition_signal("Hellooooo World") < 1.0);
    }
}
