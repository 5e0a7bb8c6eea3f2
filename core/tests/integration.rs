// End-to-end scenarios chaining multiple components through their public
// APIs, and the cross-component behaviors that only show up once records
// flow through the shared store into an overnight build.

use chrono::{Duration, Utc};
use kioo_core::atoms::types::{
    DissonanceLevel, EmotionLabel, Interpretation, Language, RiskLevel, SessionId, UserId,
};
use kioo_core::baseline::BaselineTracker;
use kioo_core::cultural::CulturalAnalyzer;
use kioo_core::dissonance::DissonanceEngine;
use kioo_core::overnight::crypto::Salt;
use kioo_core::overnight::{OvernightBuilder, UserKeyMaterial};
use kioo_core::records::{AcousticFeatures, Transcript, VoiceEmotion};
use kioo_core::sentiment::SentimentAnalyzer;
use kioo_core::store::{InMemoryStore, RecordStore};

fn transcript(text: &str, language: Language) -> Transcript {
    Transcript { session_id: SessionId::from("s"), seq: 1, text: text.to_string(), language, confidence: None }
}

fn voice(label: EmotionLabel, confidence: f64) -> VoiceEmotion {
    VoiceEmotion { session_id: SessionId::from("s"), seq: 1, label, confidence, features: None }
}

// S1: a user says "I'm fine, everything is okay" with a sad voice ->
// high dissonance, defensive concealment, medium-high risk, persisted
// and later visible to the overnight build.
#[test]
fn scenario_s1_concealment_flows_into_overnight_signals() {
    let store = InMemoryStore::default();
    let analyzer = SentimentAnalyzer::default();
    let engine = DissonanceEngine::default();
    let user = UserId::from("s1-user");
    let now = Utc::now();

    let record = engine.score(&analyzer, &transcript("I'm fine, everything is okay", Language::En), Some(&voice(EmotionLabel::Sad, 0.85)));
    assert_eq!(record.level, DissonanceLevel::High);
    assert_eq!(record.interpretation, Interpretation::DefensiveConcealment);
    assert_eq!(record.risk_level, RiskLevel::MediumHigh);
    store.append_dissonance(&user, record, now);

    let signals = kioo_core::overnight::collect_signals(&store.list_dissonance_since(&user, now - Duration::days(30)), &[], now);
    assert!(signals.gap_7d_mean >= 0.7);
}

// S2: authentic alignment produces low dissonance and no escalation.
#[test]
fn scenario_s2_authentic_alignment() {
    let analyzer = SentimentAnalyzer::default();
    let engine = DissonanceEngine::default();
    let record = engine.score(&analyzer, &transcript("I feel good today", Language::En), Some(&voice(EmotionLabel::Happy, 0.9)));
    assert_eq!(record.level, DissonanceLevel::Low);
    assert_eq!(record.risk_level, RiskLevel::Low);
}

// S3: Swahili minimization + exhaustion with a sad voice -> medium
// cultural risk, one contradiction, at least two probes.
#[test]
fn scenario_s3_cultural_deflection_with_contradiction() {
    let cultural = CulturalAnalyzer::default();
    let analysis = cultural.analyze(&SessionId::from("s3"), "Nimechoka sana, lakini sawa tu", Language::Sw, Some(EmotionLabel::Sad), None);
    assert_eq!(analysis.overall_risk_level, RiskLevel::Medium);
    assert_eq!(analysis.voice_text_contradictions.len(), 1);
    assert!(analysis.probe_suggestions.len() >= 2);
}

// S4: explicit suicidal ideation forces critical risk and crisis
// intervention regardless of other signals.
#[test]
fn scenario_s4_crisis_overrides_everything() {
    let cultural = CulturalAnalyzer::default();
    let analysis = cultural.analyze(&SessionId::from("s4"), "Nataka kufa, sina sababu ya kuishi", Language::Sw, None, None);
    assert_eq!(analysis.overall_risk_level, RiskLevel::Critical);
    assert_eq!(analysis.recommended_action, kioo_core::atoms::types::RecommendedAction::CrisisIntervention);
}

// S5: a pitch outlier after a stable 30-sample baseline triggers
// deviation detection.
#[test]
fn scenario_s5_voice_deviation_detected() {
    let tracker = BaselineTracker::default();
    let user = UserId::from("s5-user");
    let now = Utc::now();
    let noisy = [170.0, 175.0, 180.0, 185.0, 190.0, 172.0, 178.0, 182.0, 188.0, 176.0];
    for i in 0..30 {
        let features = AcousticFeatures {
            pitch_mean: noisy[i % noisy.len()],
            pitch_std: 10.0,
            energy_mean: 0.5,
            energy_std: 0.1,
            speech_rate: 3.0,
            pause_frequency: 0.2,
            duration: 4.0,
        };
        tracker.update(&user, Some(&features), None, now + Duration::minutes(i as i64));
    }
    let outlier = AcousticFeatures {
        pitch_mean: 230.0,
        pitch_std: 10.0,
        energy_mean: 0.5,
        energy_std: 0.1,
        speech_rate: 3.0,
        pause_frequency: 0.2,
        duration: 4.0,
    };
    let result = tracker.update(&user, Some(&outlier), None, now + Duration::minutes(31));
    assert!(result.deviation_detected);
}

// S6: a user with repeated crisis-level findings gets a crisis theme,
// a heavily compacted layout, and an encrypted, versioned UIConfig.
#[test]
fn scenario_s6_crisis_overnight_build() {
    let store = InMemoryStore::default();
    let cultural = CulturalAnalyzer::default();
    let user = UserId::from("s6-user");
    let now = Utc::now();

    for i in 0..3 {
        let analysis = cultural.analyze(&SessionId::from("s6"), "Nataka kufa, sina sababu ya kuishi", Language::Sw, None, None);
        store.append_cultural(&user, analysis, now - Duration::hours(i));
    }
    store.register_active_user(&user);

    let builder = OvernightBuilder::new(10_000);
    let key_material = UserKeyMaterial { passphrase: "correct horse battery staple".to_string(), salt: Salt::generate() };
    let record = builder.build_for_user(&store, &user, now, 30, Language::Sw, &key_material).unwrap();

    assert_eq!(record.version, 1);
    let decrypted = kioo_core::overnight::crypto::decrypt(&record.encrypted_config, "correct horse battery staple", &key_material.salt, 10_000).unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&decrypted).unwrap();
    assert_eq!(payload["theme"], serde_json::json!("crisis"));

    let stored = store.get_ui_config(&user).unwrap();
    assert_eq!(stored.version, record.version);
}

// UIConfig version strictly increases across repeated
// builds for the same user.
#[test]
fn ui_config_version_strictly_increases() {
    let store = InMemoryStore::default();
    let analyzer = SentimentAnalyzer::default();
    let engine = DissonanceEngine::default();
    let user = UserId::from("version-user");
    let now = Utc::now();
    let record = engine.score(&analyzer, &transcript("I feel good today", Language::En), None);
    store.append_dissonance(&user, record, now);

    let builder = OvernightBuilder::new(10_000);
    let key_material = UserKeyMaterial { passphrase: "p".to_string(), salt: Salt::generate() };
    let first = builder.build_for_user(&store, &user, now, 30, Language::En, &key_material).unwrap();
    let second = builder.build_for_user(&store, &user, now + Duration::hours(1), 30, Language::En, &key_material).unwrap();
    let third = builder.build_for_user(&store, &user, now + Duration::hours(2), 30, Language::En, &key_material).unwrap();
    assert!(first.version < second.version);
    assert!(second.version < third.version);
}

// Cross-component: a critical cultural finding and a defensive-
// concealment dissonance record for the same user both surface in the
// overnight signal collection's last-24h window.
#[test]
fn critical_finding_and_concealment_both_elevate_overnight_risk() {
    let store = InMemoryStore::default();
    let analyzer = SentimentAnalyzer::default();
    let engine = DissonanceEngine::default();
    let cultural = CulturalAnalyzer::default();
    let user = UserId::from("combined-user");
    let now = Utc::now();

    let dissonance_record = engine.score(&analyzer, &transcript("I'm fine, everything is okay", Language::En), Some(&voice(EmotionLabel::Sad, 0.85)));
    store.append_dissonance(&user, dissonance_record, now);

    let cultural_analysis = cultural.analyze(&SessionId::from("c"), "Nataka kufa", Language::Sw, None, None);
    store.append_cultural(&user, cultural_analysis, now);

    let dissonance_history = store.list_dissonance_since(&user, now - Duration::days(30));
    let cultural_history = store.list_cultural_since(&user, now - Duration::days(30));
    let signals = kioo_core::overnight::collect_signals(&dissonance_history, &cultural_history, now);
    assert_eq!(signals.risk_level, RiskLevel::Critical);
    assert!(signals.critical_findings_last_24h > 0);
}
