// ── Deflection Pattern Table ─────────────────────────────────────────────
// Compiled regex table, grounded on the teacher's `engine/engram/
// encryption.rs` static `PII_PATTERNS`/`INJECTION_PATTERNS` tables: a
// `LazyLock<Vec<_>>` of (regex, classification) pairs built once and
// scanned per call.

use std::sync::LazyLock;

use regex::Regex;

use crate::atoms::types::{Language, ProbeCategory, Severity};

/// Category of a detected deflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingType {
    Minimization,
    EmotionalExhaustion,
    Avoidance,
    Fatalism,
    SuicidalIdeation,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::Minimization => "minimization",
            FindingType::EmotionalExhaustion => "emotional_exhaustion",
            FindingType::Avoidance => "avoidance",
            FindingType::Fatalism => "fatalism",
            FindingType::SuicidalIdeation => "suicidal_ideation",
        }
    }
}

pub struct Pattern {
    pub regex: Regex,
    pub finding_type: FindingType,
    pub severity: Severity,
    pub cultural_meaning: &'static str,
    pub languages: &'static [Language],
}

/// Compiled pattern table covering minimization, emotional exhaustion,
/// avoidance, fatalism, and crisis-severity markers. Critical patterns
/// bypass all weighting in risk aggregation (`aggregate_risk`).
pub static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        Pattern {
            regex: Regex::new(r"(?i)\bsawa\s+tu\b").unwrap(),
            finding_type: FindingType::Minimization,
            severity: Severity::Medium,
            cultural_meaning: "downplaying distress as acceptable ('just fine') rather than naming it",
            languages: &[Language::Sw, Language::Mixed],
        },
        Pattern {
            regex: Regex::new(r"(?i)\bnimechoka\b").unwrap(),
            finding_type: FindingType::EmotionalExhaustion,
            severity: Severity::Medium,
            cultural_meaning: "expressing exhaustion as a culturally acceptable proxy for deeper distress",
            languages: &[Language::Sw, Language::Mixed],
        },
        Pattern {
            regex: Regex::new(r"(?i)\bsijui\b").unwrap(),
            finding_type: FindingType::Avoidance,
            severity: Severity::Low,
            cultural_meaning: "professed uncertainty used to avoid naming the issue directly",
            languages: &[Language::Sw, Language::Mixed],
        },
        Pattern {
            regex: Regex::new(r"(?i)\btutaona\b").unwrap(),
            finding_type: FindingType::Fatalism,
            severity: Severity::Low,
            cultural_meaning: "fatalistic deferral ('we'll see') signaling resignation",
            languages: &[Language::Sw, Language::Mixed],
        },
        Pattern {
            regex: Regex::new(r"(?i)\bnataka\s+kufa\b").unwrap(),
            finding_type: FindingType::SuicidalIdeation,
            severity: Severity::Critical,
            cultural_meaning: "explicit expression of wanting to die",
            languages: &[Language::Sw, Language::Mixed, Language::En],
        },
        Pattern {
            regex: Regex::new(r"(?i)\bsina\s+sababu\s+ya\s+kuishi\b").unwrap(),
            finding_type: FindingType::SuicidalIdeation,
            severity: Severity::Critical,
            cultural_meaning: "explicit statement of having no reason to live",
            languages: &[Language::Sw, Language::Mixed, Language::En],
        },
    ]
});

/// Default probe category for a finding severity.
pub fn probe_category_for(severity: Severity) -> ProbeCategory {
    match severity {
        Severity::Low => ProbeCategory::GentleInquiry,
        Severity::Medium => ProbeCategory::SupportiveExploration,
        Severity::High => ProbeCategory::DirectExploration,
        Severity::Critical => ProbeCategory::SafetyAssessment,
    }
}
