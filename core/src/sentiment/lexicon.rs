// ── Sentiment Lexicon ────────────────────────────────────────────────────
// Marker-counting heuristic, grounded in the teacher's
// `engine/engram/emotional_memory.rs::score_affect`. Bilingual (English +
// a handful of common Swahili sentiment words) since SentimentAnalyzer
// must produce a valence for both `en` and `sw` transcripts.

use crate::atoms::types::SentimentLabel;

const POSITIVE_MARKERS: &[&str] = &[
    // English
    "good", "great", "happy", "fine", "okay", "wonderful", "love", "glad",
    "better", "hopeful", "grateful", "thankful", "excited", "proud", "calm",
    "peaceful", "improving", "strong",
    // Swahili
    "nzuri", "furaha", "asante", "salama", "poa", "vizuri", "imara",
];

const NEGATIVE_MARKERS: &[&str] = &[
    // English
    "sad", "bad", "hopeless", "hurts", "tired", "angry", "afraid", "scared",
    "worthless", "alone", "lonely", "exhausted", "broken", "crying", "pain",
    "suffering", "hate", "awful", "terrible", "worse", "struggling", "die",
    "dying", "kufa",
    // Swahili
    "huzuni", "uchovu", "maumivu", "kuchoka", "nimechoka", "sina",
];

fn count_hits(text: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|m| text.contains(**m)).count()
}

/// Classify normalized (lowercased, whitespace-collapsed) text. Always
/// returns a result — this backend has no notion of "unavailable".
pub fn classify(normalized_text: &str) -> (SentimentLabel, f64) {
    let words = normalized_text.split_whitespace().count().max(1) as f64;
    let pos = count_hits(normalized_text, POSITIVE_MARKERS);
    let neg = count_hits(normalized_text, NEGATIVE_MARKERS);

    if pos == 0 && neg == 0 {
        // No lexicon signal: neutral, but confidence reflects that we
        // scanned the whole text and found nothing, not that we failed.
        return (SentimentLabel::Neutral, 0.55);
    }

    let net = pos as f64 - neg as f64;
    let total = (pos + neg) as f64;
    let density = (total / words).min(1.0);
    let confidence = (0.55 + density * 0.45).min(0.99);

    let label = if net > 0.0 {
        SentimentLabel::Positive
    } else if net < 0.0 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    (label, confidence)
}
