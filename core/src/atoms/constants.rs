// ── Kioo Atoms: Constants ────────────────────────────────────────────────
// All calibrated numeric tables live here, collected in one place so an
// auditor (or a clinical partner) can review every tuned number without
// hunting through the engine.

// ── Sentiment valence anchors ────────────────────────────────────────────
pub const SENTIMENT_VALENCE_POSITIVE: f64 = 0.75;
pub const SENTIMENT_VALENCE_NEUTRAL: f64 = 0.0;
pub const SENTIMENT_VALENCE_NEGATIVE: f64 = -0.75;

// ── Emotion → valence anchor table ──────────────────────────────────────
// Chosen for internal consistency, not clinically calibrated. Do not
// adjust without re-checking the dissonance scenario tests that depend
// on them.
pub const VALENCE_HAPPY: f64 = 0.8;
pub const VALENCE_SURPRISE: f64 = 0.3;
pub const VALENCE_NEUTRAL: f64 = 0.0;
pub const VALENCE_FEAR: f64 = -0.4;
// Negative enough that a sad voice at the S1 scenario's 0.85 confidence
// still crosses the high-dissonance band against a +0.75 stated valence
// (0.75 - (-0.8 * 0.85) = 1.43, normalized 0.715 >= 0.7).
pub const VALENCE_SAD: f64 = -0.8;
pub const VALENCE_DISGUST: f64 = -0.6;
pub const VALENCE_ANGRY: f64 = -0.7;

// ── Dissonance band cutoffs (also configurable defaults) ───────────────
pub const DEFAULT_DISSONANCE_LOW_THRESHOLD: f64 = 0.3;
pub const DEFAULT_DISSONANCE_HIGH_THRESHOLD: f64 = 0.7;
pub const DISSONANCE_AUTHENTIC_CUTOFF: f64 = 0.15;
pub const DISSONANCE_TIE_BREAK_STATED: f64 = 0.3;
pub const DISSONANCE_TIE_BREAK_ACTUAL: f64 = 0.3;
pub const DISSONANCE_INTENSITY_MISMATCH_DIFF: f64 = 0.4;

// ── BaselineTracker ──────────────────────────────────────────────────────
pub const DEFAULT_BASELINE_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_BASELINE_MIN_SAMPLES: u32 = 15;
pub const DEVIATION_ZSCORE_CLAMP: f64 = 3.0;
pub const DEVIATION_VOICE_WEIGHT: f64 = 0.6;
pub const DEVIATION_EMOTION_WEIGHT: f64 = 0.4;
pub const DEVIATION_DETECTED_THRESHOLD: f64 = 0.5;
pub const DEVIATION_SEVERITY_MEDIUM: f64 = 0.65;
pub const DEVIATION_SEVERITY_HIGH: f64 = 0.8;

/// Acoustic features tracked per fingerprint, in a fixed order so the
/// deviation aggregation and the z-score vector always line up.
pub const VOICE_FEATURE_NAMES: [&str; 6] = [
    "pitch_mean",
    "pitch_std",
    "energy_mean",
    "energy_std",
    "speech_rate",
    "pause_frequency",
];

// ── CulturalAnalyzer weight table ───────────────────────────────────────
pub const SEVERITY_WEIGHT_LOW: f64 = 0.10;
pub const SEVERITY_WEIGHT_MEDIUM: f64 = 0.30;
pub const SEVERITY_WEIGHT_HIGH: f64 = 0.60;
pub const CONTRADICTION_SEVERITY_MULTIPLIER: f64 = 1.5;

pub const CULTURAL_RISK_LOW_CUTOFF: f64 = 0.2;
pub const CULTURAL_RISK_MEDIUM_CUTOFF: f64 = 0.45;
pub const CULTURAL_RISK_HIGH_CUTOFF: f64 = 0.8;

pub const DEFLECTION_CONTEXT_WINDOW: usize = 40;

/// Code-switching intensity bands, by switch count.
pub const SWITCH_LOW_MIN: u32 = 2;
pub const SWITCH_MEDIUM_MIN: u32 = 4;
pub const SWITCH_HIGH_MIN: u32 = 7;

// ── OvernightBuilder ─────────────────────────────────────────────────────
pub const DEFAULT_OVERNIGHT_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_OVERNIGHT_MAX_CONCURRENT_USERS: usize = 8;
pub const DISSONANCE_INDICATOR_GAP_THRESHOLD: f64 = 0.7;

/// Urgency → base priority points.
pub fn urgency_base(u: crate::atoms::types::Urgency) -> f64 {
    use crate::atoms::types::Urgency::*;
    match u {
        None => 0.0,
        Low => 25.0,
        Medium => 50.0,
        High => 75.0,
        Critical => 100.0,
    }
}

/// Risk level → priority multiplier. Only Low/Medium/High/
/// Critical are used here; `RiskLevel::MediumHigh` (a dissonance-only
/// value) never reaches this function.
pub fn risk_multiplier(r: crate::atoms::types::RiskLevel) -> f64 {
    use crate::atoms::types::RiskLevel::*;
    match r {
        Low => 0.5,
        Medium => 1.0,
        MediumHigh => 1.0,
        High => 1.5,
        Critical => 2.0,
    }
}

/// Prominence → flat priority bonus.
pub fn prominence_bonus(p: crate::atoms::types::Prominence) -> f64 {
    use crate::atoms::types::Prominence::*;
    match p {
        Hidden => 0.0,
        Minimal => 10.0,
        Sidebar => 20.0,
        Card => 30.0,
        Top => 40.0,
        Modal => 50.0,
    }
}

pub const SPECIAL_BOOST_CRISIS_OR_SAFETY: f64 = 50.0;
pub const SPECIAL_BOOST_DISSONANCE_INDICATOR: f64 = 30.0;
pub const SPECIAL_BOOST_PROGRESS_CELEBRATION: f64 = 20.0;

/// Risk-based compaction caps.
pub const COMPACTION_CAP_CRITICAL: usize = 3;
pub const COMPACTION_CAP_HIGH: usize = 5;
pub const COMPACTION_CAP_MEDIUM: usize = 8;
pub const COMPACTION_CAP_LOW: usize = 12;

pub const MOBILE_LAYOUT_CAP: usize = 7;
pub const MOBILE_SIDEBAR_CAP: usize = 3;
pub const MOBILE_FOOTER_CAP: usize = 2;

/// Known component names, in canonical declaration order.
pub const COMPONENT_NAMES: [&str; 11] = [
    "cultural_greeting",
    "voice_recorder",
    "emotion_timeline",
    "dissonance_indicator",
    "crisis_resources",
    "safety_check",
    "whats_working",
    "gentle_observations",
    "progress_celebration",
    "personalized_resources",
    "adaptive_menu",
];

// ── UIConfig encryption ──────────────────────────────────────────────────
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;
pub const PBKDF2_SALT_LEN: usize = 16;
pub const AES_GCM_NONCE_LEN: usize = 12;
pub const AES_GCM_TAG_LEN: usize = 16;
pub const AES_KEY_LEN: usize = 32;

// ── Sentiment cache ──────────────────────────────────────────────────────
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1_000;
