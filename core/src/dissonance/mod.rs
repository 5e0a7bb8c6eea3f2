// ── DissonanceEngine ─────────────────────────────────────────────────────
// (transcript, voice emotion) → dissonance record: the gap between what a
// user says and how they sound, classified into level/interpretation/risk.
//
// Grounded on the teacher's small-pure-function composition style in
// `engine/engram/emotional_memory.rs` (`affect_congruent_boost`,
// `modulated_half_life`): table-driven constants feeding a short,
// deterministic pipeline, covered by direct unit tests per stage plus the
// worked end-to-end scenarios in the integration tests.

use chrono::{DateTime, Utc};
use log::debug;

use crate::atoms::constants::*;
use crate::atoms::types::{DissonanceLevel, EmotionLabel, Interpretation, RiskLevel, SentimentLabel, SessionId};
use crate::records::{Transcript, VoiceEmotion};
use crate::sentiment::SentimentAnalyzer;

/// A fully-classified dissonance measurement for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct DissonanceRecord {
    pub session_id: SessionId,
    pub seq: u32,
    pub stated_emotion: SentimentLabel,
    pub actual_emotion: SentimentLabel,
    pub stated_valence: f64,
    pub actual_valence: f64,
    pub gap: f64,
    pub normalized_gap: f64,
    pub level: DissonanceLevel,
    pub interpretation: Interpretation,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

/// Coarse positive/neutral/negative bucket for a valence value, used only
/// to populate the record's descriptive `stated_emotion`/`actual_emotion`
/// fields — the interpretation tie-breaks in step 5 use the raw valence
/// thresholds directly, not this bucket.
fn valence_direction(v: f64) -> SentimentLabel {
    if v > 0.1 {
        SentimentLabel::Positive
    } else if v < -0.1 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Map a voice-emotion label to its fixed valence anchor.
fn emotion_valence_anchor(label: EmotionLabel) -> f64 {
    match label {
        EmotionLabel::Happy => VALENCE_HAPPY,
        EmotionLabel::Surprise => VALENCE_SURPRISE,
        EmotionLabel::Neutral => VALENCE_NEUTRAL,
        EmotionLabel::Fear => VALENCE_FEAR,
        EmotionLabel::Sad => VALENCE_SAD,
        EmotionLabel::Disgust => VALENCE_DISGUST,
        EmotionLabel::Angry => VALENCE_ANGRY,
    }
}

pub struct DissonanceEngine {
    low_threshold: f64,
    high_threshold: f64,
}

impl Default for DissonanceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DISSONANCE_LOW_THRESHOLD, DEFAULT_DISSONANCE_HIGH_THRESHOLD)
    }
}

impl DissonanceEngine {
    pub fn new(low_threshold: f64, high_threshold: f64) -> Self {
        Self { low_threshold, high_threshold }
    }

    /// `score(transcript, voice_emotion) -> DissonanceRecord`.
    /// Never fails — absent voice emotion or a degraded sentiment result
    /// both fall through to an `unclear`, `low`-risk, zero-confidence
    /// record.
    pub fn score(
        &self,
        sentiment_analyzer: &SentimentAnalyzer,
        transcript: &Transcript,
        voice_emotion: Option<&VoiceEmotion>,
    ) -> DissonanceRecord {
        let sentiment = sentiment_analyzer.analyze(&transcript.text, transcript.language);

        let Some(voice) = voice_emotion else {
            debug!("[dissonance] no voice emotion supplied, returning unclear record");
            return self.unclear_record(transcript, sentiment.valence, 0.0, 0.0);
        };

        if sentiment.degraded {
            debug!("[dissonance] sentiment degraded, returning unclear record");
            return self.unclear_record(transcript, sentiment.valence, 0.0, voice.confidence);
        }

        let stated_valence = sentiment.valence;
        // Step 2: dampen low-confidence acoustics.
        let actual_valence = emotion_valence_anchor(voice.label) * voice.confidence;

        let gap = (stated_valence - actual_valence).abs();
        let normalized_gap = (gap / 2.0).min(1.0);

        let level = if normalized_gap < self.low_threshold {
            DissonanceLevel::Low
        } else if normalized_gap < self.high_threshold {
            DissonanceLevel::Medium
        } else {
            DissonanceLevel::High
        };

        let interpretation = classify_interpretation(stated_valence, actual_valence, normalized_gap);
        let risk_level = classify_risk(level, interpretation);
        let confidence = sentiment.confidence.min(voice.confidence);

        DissonanceRecord {
            session_id: transcript.session_id.clone(),
            seq: transcript.seq,
            stated_emotion: valence_direction(stated_valence),
            actual_emotion: valence_direction(actual_valence),
            stated_valence,
            actual_valence,
            gap,
            normalized_gap,
            level,
            interpretation,
            risk_level,
            confidence,
            generated_at: Utc::now(),
        }
    }

    fn unclear_record(
        &self,
        transcript: &Transcript,
        stated_valence: f64,
        actual_valence: f64,
        _voice_confidence: f64,
    ) -> DissonanceRecord {
        DissonanceRecord {
            session_id: transcript.session_id.clone(),
            seq: transcript.seq,
            stated_emotion: valence_direction(stated_valence),
            actual_emotion: valence_direction(actual_valence),
            stated_valence,
            actual_valence,
            gap: 0.0,
            normalized_gap: 0.0,
            level: DissonanceLevel::Low,
            interpretation: Interpretation::Unclear,
            risk_level: RiskLevel::Low,
            confidence: 0.0,
            generated_at: Utc::now(),
        }
    }
}

/// Interpretation tie-breaks, evaluated in priority order.
fn classify_interpretation(stated: f64, actual: f64, normalized_gap: f64) -> Interpretation {
    if normalized_gap < DISSONANCE_AUTHENTIC_CUTOFF {
        return Interpretation::Authentic;
    }
    if stated >= DISSONANCE_TIE_BREAK_STATED && actual <= -DISSONANCE_TIE_BREAK_ACTUAL {
        return Interpretation::DefensiveConcealment;
    }
    if stated <= -DISSONANCE_TIE_BREAK_STATED && actual >= DISSONANCE_TIE_BREAK_ACTUAL {
        return Interpretation::RecoveryIndicator;
    }
    if stated < 0.0 && actual < 0.0 && (stated - actual).abs() >= DISSONANCE_INTENSITY_MISMATCH_DIFF {
        return Interpretation::IntensityMismatch;
    }
    Interpretation::Unclear
}

/// Risk level from (level, interpretation).
fn classify_risk(level: DissonanceLevel, interpretation: Interpretation) -> RiskLevel {
    match (level, interpretation) {
        (DissonanceLevel::High, Interpretation::DefensiveConcealment) => RiskLevel::MediumHigh,
        (DissonanceLevel::High, _) => RiskLevel::Medium,
        (DissonanceLevel::Medium, Interpretation::DefensiveConcealment) => RiskLevel::Medium,
        (DissonanceLevel::Medium, _) => RiskLevel::Low,
        (DissonanceLevel::Low, _) => RiskLevel::Low,
    }
}
