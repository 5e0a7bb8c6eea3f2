// ── Component Rules & Layout Prioritization ─────────────────────────────
// Tagged variant tables (component name -> config) rather than dynamic
// dispatch over theme/component rules, for determinism and exhaustiveness
// checks.

use std::collections::HashMap;

use serde::Serialize;

use crate::atoms::constants::*;
use crate::atoms::types::{Prominence, RiskLevel, Trajectory, Urgency};

/// The subset of nightly signals the rules table and priority formula
/// need, already reduced from the raw record history.
#[derive(Debug, Clone, Copy)]
pub struct Signals {
    pub risk_level: RiskLevel,
    pub trajectory: Trajectory,
    pub gap_7d_mean: f64,
    pub critical_findings_last_24h: u32,
}

/// Visibility + prominence + urgency for one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentConfig {
    pub visible: bool,
    pub prominence: Prominence,
    pub urgency: Urgency,
}

fn urgency_from_risk(risk: RiskLevel) -> Urgency {
    match risk {
        RiskLevel::Low => Urgency::Low,
        RiskLevel::Medium | RiskLevel::MediumHigh => Urgency::Medium,
        RiskLevel::High => Urgency::High,
        RiskLevel::Critical => Urgency::Critical,
    }
}

/// Component visibility & urgency rules table.
pub fn build_components(signals: &Signals) -> HashMap<String, ComponentConfig> {
    let mut map = HashMap::new();
    let risk = signals.risk_level;
    let dissonance_elevated = signals.gap_7d_mean > DISSONANCE_INDICATOR_GAP_THRESHOLD;
    let crisis_present = signals.critical_findings_last_24h > 0;

    map.insert(
        "cultural_greeting".to_string(),
        ComponentConfig { visible: true, prominence: Prominence::Minimal, urgency: Urgency::None },
    );

    map.insert(
        "voice_recorder".to_string(),
        ComponentConfig { visible: true, prominence: Prominence::Top, urgency: Urgency::None },
    );

    map.insert(
        "emotion_timeline".to_string(),
        ComponentConfig { visible: true, prominence: Prominence::Card, urgency: Urgency::None },
    );

    map.insert(
        "dissonance_indicator".to_string(),
        ComponentConfig {
            visible: true,
            prominence: if dissonance_elevated { Prominence::Top } else { Prominence::Card },
            urgency: urgency_from_risk(risk),
        },
    );

    let crisis_prominence = match risk {
        RiskLevel::Low => Prominence::Hidden,
        RiskLevel::Medium | RiskLevel::MediumHigh => Prominence::Sidebar,
        RiskLevel::High => Prominence::Top,
        RiskLevel::Critical => Prominence::Modal,
    };
    map.insert(
        "crisis_resources".to_string(),
        ComponentConfig {
            visible: crisis_prominence != Prominence::Hidden,
            prominence: crisis_prominence,
            urgency: urgency_from_risk(risk),
        },
    );

    map.insert(
        "safety_check".to_string(),
        ComponentConfig {
            visible: true,
            prominence: if crisis_present {
                Prominence::Modal
            } else if risk >= RiskLevel::Medium {
                Prominence::Card
            } else {
                Prominence::Minimal
            },
            urgency: if crisis_present { Urgency::Critical } else { urgency_from_risk(risk) },
        },
    );

    map.insert(
        "whats_working".to_string(),
        ComponentConfig {
            visible: signals.trajectory == Trajectory::Improving || risk <= RiskLevel::Medium,
            prominence: Prominence::Sidebar,
            urgency: Urgency::None,
        },
    );

    map.insert(
        "gentle_observations".to_string(),
        ComponentConfig {
            visible: matches!(risk, RiskLevel::Low | RiskLevel::Medium),
            prominence: Prominence::Sidebar,
            urgency: Urgency::Low,
        },
    );

    let progress_eligible =
        signals.trajectory == Trajectory::Improving && matches!(risk, RiskLevel::Low | RiskLevel::Medium);
    map.insert(
        "progress_celebration".to_string(),
        ComponentConfig {
            visible: progress_eligible,
            prominence: if progress_eligible { Prominence::Card } else { Prominence::Hidden },
            urgency: Urgency::None,
        },
    );

    map.insert(
        "personalized_resources".to_string(),
        ComponentConfig { visible: true, prominence: Prominence::Minimal, urgency: Urgency::None },
    );

    map.insert(
        "adaptive_menu".to_string(),
        ComponentConfig { visible: true, prominence: Prominence::Minimal, urgency: Urgency::None },
    );

    map
}

fn special_boost(name: &str, signals: &Signals) -> f64 {
    let mut boost = 0.0;
    if name == "crisis_resources" || name == "safety_check" {
        boost += SPECIAL_BOOST_CRISIS_OR_SAFETY;
    }
    if name == "dissonance_indicator" && signals.gap_7d_mean > DISSONANCE_INDICATOR_GAP_THRESHOLD {
        boost += SPECIAL_BOOST_DISSONANCE_INDICATOR;
    }
    if name == "progress_celebration" && signals.trajectory == Trajectory::Improving {
        boost += SPECIAL_BOOST_PROGRESS_CELEBRATION;
    }
    boost
}

/// `priority = urgency_base * risk_multiplier + prominence_bonus + special_boost`.
pub fn priority(name: &str, config: &ComponentConfig, signals: &Signals) -> f64 {
    urgency_base(config.urgency) * risk_multiplier(signals.risk_level)
        + prominence_bonus(config.prominence)
        + special_boost(name, signals)
}

/// The four layout buckets a component can be placed into.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutBuckets {
    pub hero: Vec<String>,
    pub primary: Vec<String>,
    pub sidebar: Vec<String>,
    pub footer: Vec<String>,
}

fn compaction_cap(risk: RiskLevel) -> usize {
    match risk {
        RiskLevel::Critical => COMPACTION_CAP_CRITICAL,
        RiskLevel::High => COMPACTION_CAP_HIGH,
        RiskLevel::Medium | RiskLevel::MediumHigh => COMPACTION_CAP_MEDIUM,
        RiskLevel::Low => COMPACTION_CAP_LOW,
    }
}

/// Bucket assignment, priority sort, and risk-based compaction.
/// Returns `(buckets, mobile_layout)`.
pub fn lay_out(
    components: &HashMap<String, ComponentConfig>,
    signals: &Signals,
) -> (LayoutBuckets, Vec<String>) {
    let mut visible: Vec<(String, f64)> = components
        .iter()
        .filter(|(_, c)| c.visible)
        .map(|(name, c)| (name.clone(), priority(name, c, signals)))
        .collect();
    visible.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));

    let cap = compaction_cap(signals.risk_level);
    let critical = signals.risk_level == RiskLevel::Critical;
    let high = signals.risk_level == RiskLevel::High;

    let kept: Vec<(String, f64)> = visible.into_iter().take(cap).collect();
    let kept_names: std::collections::HashSet<&str> = kept.iter().map(|(n, _)| n.as_str()).collect();

    let mut buckets = LayoutBuckets::default();
    for (name, _) in &kept {
        let prominence = components[name].prominence;
        match prominence {
            Prominence::Modal | Prominence::Top => buckets.hero.push(name.clone()),
            Prominence::Card => buckets.primary.push(name.clone()),
            Prominence::Sidebar => {
                if !critical && !high {
                    buckets.sidebar.push(name.clone());
                }
            }
            Prominence::Minimal => {
                if !critical {
                    buckets.footer.push(name.clone());
                }
            }
            Prominence::Hidden => {}
        }
    }

    if critical {
        buckets.hero.truncate(1);
        buckets.sidebar.clear();
        buckets.footer.clear();
    }
    if high {
        buckets.footer.clear();
    }

    let mobile_layout = mobile_layout(components, signals, &kept_names);

    (buckets, mobile_layout)
}

/// Mobile layout rule: top 7 overall, always including any
/// critical-urgency component and `crisis_resources` when visible;
/// sidebar capped at 3, footer capped at 2 within the mobile set.
fn mobile_layout(
    components: &HashMap<String, ComponentConfig>,
    signals: &Signals,
    kept_names: &std::collections::HashSet<&str>,
) -> Vec<String> {
    let mut ranked: Vec<(String, f64)> = components
        .iter()
        .filter(|(_, c)| c.visible)
        .map(|(name, c)| (name.clone(), priority(name, c, signals)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));

    let mut mobile: Vec<String> = ranked.iter().take(MOBILE_LAYOUT_CAP).map(|(n, _)| n.clone()).collect();

    for (name, config) in components {
        if !config.visible {
            continue;
        }
        let must_include = config.urgency == Urgency::Critical || name == "crisis_resources";
        if must_include && !mobile.contains(name) {
            mobile.push(name.clone());
        }
    }

    // Only ever surface components the compaction pass actually kept.
    mobile.retain(|n| kept_names.contains(n.as_str()));

    let mut sidebar_count = 0;
    let mut footer_count = 0;
    mobile.retain(|name| match components[name].prominence {
        Prominence::Sidebar => {
            sidebar_count += 1;
            sidebar_count <= MOBILE_SIDEBAR_CAP
        }
        Prominence::Minimal => {
            footer_count += 1;
            footer_count <= MOBILE_FOOTER_CAP
        }
        _ => true,
    });

    mobile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(risk: RiskLevel, trajectory: Trajectory) -> Signals {
        Signals { risk_level: risk, trajectory, gap_7d_mean: 0.2, critical_findings_last_24h: 0 }
    }

    #[test]
    fn voice_recorder_is_always_visible_at_top() {
        let components = build_components(&signals(RiskLevel::Low, Trajectory::Stable));
        let vr = &components["voice_recorder"];
        assert!(vr.visible);
        assert_eq!(vr.prominence, Prominence::Top);
    }

    #[test]
    fn critical_risk_caps_at_three_with_no_sidebar_or_footer() {
        let mut sig = signals(RiskLevel::Critical, Trajectory::Declining);
        sig.critical_findings_last_24h = 3;
        let components = build_components(&sig);
        let (buckets, _) = lay_out(&components, &sig);
        let total = buckets.hero.len() + buckets.primary.len() + buckets.sidebar.len() + buckets.footer.len();
        assert!(total <= 3);
        assert!(buckets.sidebar.is_empty());
        assert!(buckets.footer.is_empty());
    }

    #[test]
    fn safety_check_urgency_critical_when_recent_critical_finding() {
        let mut sig = signals(RiskLevel::High, Trajectory::Volatile);
        sig.critical_findings_last_24h = 1;
        let components = build_components(&sig);
        assert_eq!(components["safety_check"].urgency, Urgency::Critical);
        assert_eq!(components["safety_check"].prominence, Prominence::Modal);
    }

    #[test]
    fn progress_celebration_only_rises_when_improving_and_low_or_medium_risk() {
        let improving_low = signals(RiskLevel::Low, Trajectory::Improving);
        let components = build_components(&improving_low);
        assert!(components["progress_celebration"].visible);

        let declining_low = signals(RiskLevel::Low, Trajectory::Declining);
        let components = build_components(&declining_low);
        assert!(!components["progress_celebration"].visible);

        let improving_high = signals(RiskLevel::High, Trajectory::Improving);
        let components = build_components(&improving_high);
        assert!(!components["progress_celebration"].visible);
    }

    #[test]
    fn mobile_layout_caps_sidebar_and_footer() {
        let sig = signals(RiskLevel::Low, Trajectory::Stable);
        let components = build_components(&sig);
        let (_, mobile) = lay_out(&components, &sig);
        let sidebar_in_mobile = mobile.iter().filter(|n| components[*n].prominence == Prominence::Sidebar).count();
        let footer_in_mobile = mobile.iter().filter(|n| components[*n].prominence == Prominence::Minimal).count();
        assert!(sidebar_in_mobile <= MOBILE_SIDEBAR_CAP);
        assert!(footer_in_mobile <= MOBILE_FOOTER_CAP);
        assert!(mobile.len() <= MOBILE_LAYOUT_CAP + 2);
    }
}
