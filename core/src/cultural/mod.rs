// ── CulturalAnalyzer ─────────────────────────────────────────────────────
// (text, language, emotion?, voice_features?) → deflection findings,
// code-switching metrics, voice-text contradictions, and a risk verdict.
//
// Grounded on the teacher's `engine/engram/encryption.rs` static
// pattern-table scanning idiom (see `patterns.rs`) plus
// `engine/engram/consolidation.rs`'s small-stage pipeline shape for the
// overall `analyze` flow.

pub mod code_switching;
pub mod kb;
pub mod patterns;

use log::warn;

use crate::atoms::constants::*;
use crate::atoms::types::{
    EmotionLabel, Language, ProbeCategory, RecommendedAction, RiskLevel, SessionId, Severity,
};
use crate::records::AcousticFeatures;
use patterns::{probe_category_for, FindingType, PATTERNS};

pub use code_switching::CodeSwitching;
pub use kb::CulturalKnowledgeBase;

/// A single deflection match.
#[derive(Debug, Clone)]
pub struct DeflectionFinding {
    pub position: usize,
    pub pattern: String,
    pub finding_type: FindingType,
    pub severity: Severity,
    pub confidence: f64,
    pub cultural_meaning: &'static str,
    pub interpretation: String,
    pub context: String,
}

/// A detected mismatch between vocal affect and minimizing text.
#[derive(Debug, Clone)]
pub struct Contradiction {
    pub description: String,
    pub severity_multiplier: f64,
}

/// A suggested follow-up probe, carrying the finding it was raised for.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSuggestion {
    pub category: ProbeCategory,
    pub severity: Severity,
}

/// One call's worth of cultural analysis.
#[derive(Debug, Clone)]
pub struct CulturalAnalysis {
    pub session_id: SessionId,
    pub findings: Vec<DeflectionFinding>,
    pub code_switching: CodeSwitching,
    pub voice_text_contradictions: Vec<Contradiction>,
    pub overall_risk_level: RiskLevel,
    pub probe_suggestions: Vec<ProbeSuggestion>,
    pub recommended_action: RecommendedAction,
}

fn is_negative_valent(label: EmotionLabel) -> bool {
    matches!(
        label,
        EmotionLabel::Sad | EmotionLabel::Angry | EmotionLabel::Fear | EmotionLabel::Disgust
    )
}

fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let lo = start.saturating_sub(radius);
    let hi = (end + radius).min(text.len());
    // Snap to char boundaries so we never slice inside a multi-byte char.
    let lo = (lo..=start).find(|i| text.is_char_boundary(*i)).unwrap_or(0);
    let hi = (end..=hi).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(text.len());
    text[lo..hi].to_string()
}

fn interpretation_for(finding_type: FindingType) -> &'static str {
    match finding_type {
        FindingType::Minimization => "likely understating actual distress level",
        FindingType::EmotionalExhaustion => "may indicate sustained unaddressed stress",
        FindingType::Avoidance => "may be deflecting from a sensitive topic",
        FindingType::Fatalism => "may reflect a sense of diminished agency",
        FindingType::SuicidalIdeation => "explicit risk indicator requiring immediate attention",
    }
}

fn detect_findings(text: &str, language: Language) -> Vec<DeflectionFinding> {
    let mut findings = Vec::new();
    for pattern in PATTERNS.iter() {
        if !pattern.languages.contains(&language) && language != Language::Auto {
            continue;
        }
        for m in pattern.regex.find_iter(text) {
            findings.push(DeflectionFinding {
                position: m.start(),
                pattern: m.as_str().to_string(),
                finding_type: pattern.finding_type,
                severity: pattern.severity,
                confidence: 0.9,
                cultural_meaning: pattern.cultural_meaning,
                interpretation: interpretation_for(pattern.finding_type).to_string(),
                context: context_window(text, m.start(), m.end(), DEFLECTION_CONTEXT_WINDOW),
            });
        }
    }
    findings.sort_by_key(|f| f.position);
    findings
}

fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Low => SEVERITY_WEIGHT_LOW,
        Severity::Medium => SEVERITY_WEIGHT_MEDIUM,
        Severity::High => SEVERITY_WEIGHT_HIGH,
        Severity::Critical => 1.0, // unreachable: critical short-circuits aggregation.
    }
}

/// Risk aggregation. The `<=` upper bound on `medium` (rather than strict
/// `<`) is deliberate — see DESIGN.md.
fn aggregate_risk(findings: &[DeflectionFinding], contradiction_present: bool) -> RiskLevel {
    if findings.iter().any(|f| f.severity == Severity::Critical) {
        return RiskLevel::Critical;
    }
    if findings.is_empty() {
        return RiskLevel::Low;
    }
    let avg = findings.iter().map(|f| severity_weight(f.severity)).sum::<f64>() / findings.len() as f64;
    let score = if contradiction_present {
        avg * CONTRADICTION_SEVERITY_MULTIPLIER
    } else {
        avg
    };
    if score < CULTURAL_RISK_LOW_CUTOFF {
        RiskLevel::Low
    } else if score <= CULTURAL_RISK_MEDIUM_CUTOFF {
        RiskLevel::Medium
    } else if score < CULTURAL_RISK_HIGH_CUTOFF {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

fn probes_for(findings: &[DeflectionFinding]) -> Vec<ProbeSuggestion> {
    let mut probes = Vec::new();
    for finding in findings {
        if finding.severity == Severity::Low {
            continue;
        }
        probes.push(ProbeSuggestion {
            category: probe_category_for(finding.severity),
            severity: finding.severity,
        });
        if finding.severity == Severity::Critical {
            probes.push(ProbeSuggestion {
                category: ProbeCategory::SafetyAssessment,
                severity: finding.severity,
            });
        }
    }
    probes.sort_by(|a, b| b.severity.cmp(&a.severity));
    probes
}

fn recommended_action_for(overall: RiskLevel, contradiction_present: bool) -> RecommendedAction {
    match overall {
        RiskLevel::Critical => RecommendedAction::CrisisIntervention,
        RiskLevel::High => RecommendedAction::SupportiveExploration,
        RiskLevel::Medium | RiskLevel::MediumHigh => RecommendedAction::SupportiveExploration,
        RiskLevel::Low if contradiction_present => RecommendedAction::GentleInquiry,
        RiskLevel::Low => RecommendedAction::NormalFlow,
    }
}

/// Detects culturally specific concealment, language-switching, and
/// voice/text contradictions; emits probes and a risk verdict.
#[derive(Default)]
pub struct CulturalAnalyzer {
    kb: CulturalKnowledgeBase,
}

impl CulturalAnalyzer {
    pub fn new(kb: CulturalKnowledgeBase) -> Self {
        Self { kb }
    }

    /// `retrieve(query, language) -> {contexts, deflections, code_switching}`.
    /// KB-load failure degrades to pattern-only detection —
    /// `CulturalKnowledgeBase` already guarantees a loaded
    /// (if possibly stale) entry set, so this never fails outright.
    pub fn retrieve(&self, query: &str, language: Language) -> Vec<kb::KbEntry> {
        self.kb.retrieve(query, Some(language))
    }

    /// `analyze(text, language, emotion?, voice_features?) -> CulturalAnalysis`.
    pub fn analyze(
        &self,
        session_id: &SessionId,
        text: &str,
        language: Language,
        emotion: Option<EmotionLabel>,
        _voice_features: Option<&AcousticFeatures>,
    ) -> CulturalAnalysis {
        let findings = detect_findings(text, language);
        let switching = code_switching::analyze(text);

        let has_minimization = findings.iter().any(|f| f.finding_type == FindingType::Minimization);
        let mut contradictions = Vec::new();
        if let Some(label) = emotion {
            if is_negative_valent(label) && has_minimization {
                contradictions.push(Contradiction {
                    description: format!(
                        "voice emotion '{label}' is negative-valent but text minimizes distress"
                    ),
                    severity_multiplier: CONTRADICTION_SEVERITY_MULTIPLIER,
                });
            }
        }

        let overall_risk_level = aggregate_risk(&findings, !contradictions.is_empty());
        let probe_suggestions = probes_for(&findings);
        let recommended_action = recommended_action_for(overall_risk_level, !contradictions.is_empty());

        if overall_risk_level == RiskLevel::Critical {
            warn!("[cultural] critical-severity finding surfaced for session {session_id}");
        }

        CulturalAnalysis {
            session_id: session_id.clone(),
            findings,
            code_switching: switching,
            voice_text_contradictions: contradictions,
            overall_risk_level,
            probe_suggestions,
            recommended_action,
        }
    }
}
