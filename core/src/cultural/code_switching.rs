// ── Code-Switching Analyzer ──────────────────────────────────────────────
// Tokenizes an utterance and classifies each token as Swahili, English, or
// ambiguous via a small dictionary, then derives switch frequency and an
// intensity band used as a conversational-guidance signal.

use crate::atoms::constants::{SWITCH_HIGH_MIN, SWITCH_LOW_MIN, SWITCH_MEDIUM_MIN};
use crate::atoms::types::SwitchIntensity;

const SWAHILI_WORDS: &[&str] = &[
    "na", "ya", "wa", "za", "la", "ni", "si", "tu", "sana", "sawa", "nimechoka", "nataka",
    "kufa", "sina", "sababu", "kuishi", "sijui", "tutaona", "lakini", "kwa", "hii", "hiyo",
    "mimi", "wewe", "yeye", "sisi", "nyinyi", "wao", "leo", "jana", "kesho", "moyo", "roho",
    "asante", "pole", "karibu", "habari", "poa", "nzuri", "mbaya", "salama", "huzuni",
    "furaha", "uchovu", "maumivu", "kuchoka",
];

const ENGLISH_WORDS: &[&str] = &[
    "i", "you", "he", "she", "we", "they", "am", "is", "are", "was", "were", "the", "a",
    "an", "feel", "feeling", "today", "yesterday", "tomorrow", "good", "bad", "sad",
    "happy", "tired", "okay", "fine", "everything", "nothing", "life", "no", "reason",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenLang {
    Swahili,
    English,
    Ambiguous,
}

fn classify_token(token: &str) -> TokenLang {
    let lower = token.to_lowercase();
    let stripped: String = lower.chars().filter(|c| c.is_alphanumeric()).collect();
    if stripped.is_empty() {
        return TokenLang::Ambiguous;
    }
    let is_sw = SWAHILI_WORDS.contains(&stripped.as_str());
    let is_en = ENGLISH_WORDS.contains(&stripped.as_str());
    match (is_sw, is_en) {
        (true, false) => TokenLang::Swahili,
        (false, true) => TokenLang::English,
        _ => TokenLang::Ambiguous,
    }
}

/// Result of the code-switching analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeSwitching {
    pub detected: bool,
    pub intensity: SwitchIntensity,
    pub switch_count: u32,
    pub swahili_ratio: f64,
}

/// Analyze a raw utterance for Swahili/English code-switching.
pub fn analyze(text: &str) -> CodeSwitching {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return CodeSwitching {
            detected: false,
            intensity: SwitchIntensity::None,
            switch_count: 0,
            swahili_ratio: 0.0,
        };
    }

    let classified: Vec<TokenLang> = tokens.iter().map(|t| classify_token(t)).collect();
    let sw_count = classified.iter().filter(|l| **l == TokenLang::Swahili).count();
    let en_count = classified.iter().filter(|l| **l == TokenLang::English).count();
    let decided = sw_count + en_count;
    let swahili_ratio = if decided > 0 {
        sw_count as f64 / decided as f64
    } else {
        0.0
    };

    let mut switch_count = 0u32;
    let mut last_decided: Option<TokenLang> = None;
    for lang in &classified {
        if *lang == TokenLang::Ambiguous {
            continue;
        }
        if let Some(prev) = last_decided {
            if prev != *lang {
                switch_count += 1;
            }
        }
        last_decided = Some(*lang);
    }

    let intensity = if switch_count >= SWITCH_HIGH_MIN {
        SwitchIntensity::High
    } else if switch_count >= SWITCH_MEDIUM_MIN {
        SwitchIntensity::Medium
    } else if switch_count >= SWITCH_LOW_MIN {
        SwitchIntensity::Low
    } else {
        SwitchIntensity::None
    };

    CodeSwitching {
        detected: switch_count > 0,
        intensity,
        switch_count,
        swahili_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_swahili_has_ratio_one_and_no_switches() {
        let result = analyze("nimechoka sana lakini sawa tu");
        assert_eq!(result.switch_count, 0);
        assert_eq!(result.intensity, SwitchIntensity::None);
        assert!((result.swahili_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn alternating_languages_count_switches() {
        let result = analyze("i feel nimechoka today sana but fine sawa tu yeye good");
        assert!(result.switch_count >= 2);
    }

    #[test]
    fn empty_text_has_zero_everything() {
        let result = analyze("");
        assert_eq!(result.switch_count, 0);
        assert_eq!(result.swahili_ratio, 0.0);
        assert!(!result.detected);
    }
}
