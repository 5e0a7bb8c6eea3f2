// ── BaselineTracker ──────────────────────────────────────────────────────
// Streaming voice/emotion samples → per-user fingerprint + deviation score.
//
// Grounded on the teacher's `engine/engram/emotional_memory.rs` for the
// exponential-decay idiom (`modulated_half_life`) applied here to the
// emotion distribution, and on `engine/sessions.rs`'s mutex-guarded
// per-connection state for the per-user keyed locking shape (generalized
// from one lock per DB connection to one lock per user).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;
use parking_lot::Mutex;

use crate::atoms::constants::*;
use crate::atoms::types::{EmotionLabel, Severity, UserId};
use crate::records::AcousticFeatures;

const RECENT_DEVIATIONS_CAP: usize = 50;
const EPSILON: f64 = 1e-6;

/// Which signal family a deviation observation was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationKind {
    Voice,
    Emotion,
    Combined,
}

/// Running acoustic statistics for one user.
#[derive(Debug, Clone)]
pub struct VoiceFingerprint {
    pub user_id: UserId,
    pub means: HashMap<String, f64>,
    pub std_devs: HashMap<String, f64>,
    pub sample_count: u64,
    pub confidence: f64,
    pub calculated_at: DateTime<Utc>,
}

/// Decayed emotion-label distribution for one user.
#[derive(Debug, Clone)]
pub struct EmotionBaseline {
    pub user_id: UserId,
    pub distribution: HashMap<EmotionLabel, f64>,
    pub dominant_emotion: EmotionLabel,
    pub average_confidence: f64,
    pub window_days: u32,
    pub sample_count: u64,
}

/// An appended deviation observation.
#[derive(Debug, Clone)]
pub struct DeviationRecord {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub kind: DeviationKind,
    pub score: f64,
    pub severity: Severity,
    pub feature_zscores: HashMap<String, f64>,
}

/// Return value of `BaselineTracker::update`.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub fingerprint: VoiceFingerprint,
    pub baseline: EmotionBaseline,
    pub deviation_score: f64,
    pub deviation_detected: bool,
}

/// Snapshot returned by `get_baseline`.
#[derive(Debug, Clone)]
pub struct BaselineSnapshot {
    pub fingerprint: Option<VoiceFingerprint>,
    pub baseline: Option<EmotionBaseline>,
    pub recent_deviations: Vec<DeviationRecord>,
}

/// Per-feature Welford accumulator, indexed in `VOICE_FEATURE_NAMES` order.
#[derive(Debug, Clone, Copy)]
struct Welford {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    fn new() -> Self {
        Self { n: 0, mean: 0.0, m2: 0.0 }
    }

    fn update(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / self.n as f64
        }
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

struct UserState {
    welford: [Welford; 6],
    emotion_counts: HashMap<EmotionLabel, f64>,
    confidence_sum: f64,
    emotion_sample_count: u64,
    last_updated: Option<DateTime<Utc>>,
    recent_deviations: VecDeque<DeviationRecord>,
    window_days: u32,
}

impl UserState {
    fn new(window_days: u32) -> Self {
        Self {
            welford: [Welford::new(); 6],
            emotion_counts: HashMap::new(),
            confidence_sum: 0.0,
            emotion_sample_count: 0,
            last_updated: None,
            recent_deviations: VecDeque::new(),
            window_days,
        }
    }

    fn voice_sample_count(&self) -> u64 {
        self.welford[0].n
    }

    fn confidence(&self, min_samples: u32) -> f64 {
        (self.voice_sample_count() as f64 / min_samples as f64).min(1.0)
    }

    fn fingerprint(&self, user_id: &UserId, min_samples: u32, now: DateTime<Utc>) -> VoiceFingerprint {
        let mut means = HashMap::new();
        let mut std_devs = HashMap::new();
        for (i, name) in VOICE_FEATURE_NAMES.iter().enumerate() {
            means.insert(name.to_string(), self.welford[i].mean);
            std_devs.insert(name.to_string(), self.welford[i].std_dev());
        }
        VoiceFingerprint {
            user_id: user_id.clone(),
            means,
            std_devs,
            sample_count: self.voice_sample_count(),
            confidence: self.confidence(min_samples).max(if self.voice_sample_count() > 0 {
                1.0 / min_samples as f64
            } else {
                0.0
            }),
            calculated_at: now,
        }
    }

    fn emotion_distribution(&self) -> HashMap<EmotionLabel, f64> {
        let total: f64 = self.emotion_counts.values().sum();
        let mut dist = HashMap::new();
        if total <= EPSILON {
            for label in EmotionLabel::ALL {
                dist.insert(label, 0.0);
            }
            return dist;
        }
        for label in EmotionLabel::ALL {
            let count = self.emotion_counts.get(&label).copied().unwrap_or(0.0);
            dist.insert(label, count / total);
        }
        dist
    }

    fn baseline(&self, user_id: &UserId) -> EmotionBaseline {
        let distribution = self.emotion_distribution();
        let dominant_emotion = distribution
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(label, _)| *label)
            .unwrap_or(EmotionLabel::Neutral);
        let average_confidence = if self.emotion_sample_count > 0 {
            self.confidence_sum / self.emotion_sample_count as f64
        } else {
            0.0
        };
        EmotionBaseline {
            user_id: user_id.clone(),
            distribution,
            dominant_emotion,
            average_confidence,
            window_days: self.window_days,
            sample_count: self.emotion_sample_count,
        }
    }

    fn apply_emotion_decay(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_updated {
            let delta_days = (now - last).num_milliseconds() as f64 / 86_400_000.0;
            if delta_days > 0.0 && self.window_days > 0 {
                let decay = (-delta_days / self.window_days as f64).exp();
                for count in self.emotion_counts.values_mut() {
                    *count *= decay;
                }
            }
        }
    }

    fn push_deviation(&mut self, record: DeviationRecord) {
        self.recent_deviations.push_back(record);
        while self.recent_deviations.len() > RECENT_DEVIATIONS_CAP {
            self.recent_deviations.pop_front();
        }
    }
}

fn severity_for(score: f64) -> Severity {
    if score >= DEVIATION_SEVERITY_HIGH {
        Severity::High
    } else if score >= DEVIATION_SEVERITY_MEDIUM {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Per-user fingerprint + deviation tracker.
pub struct BaselineTracker {
    min_samples: u32,
    window_days: u32,
    users: Mutex<HashMap<UserId, Arc<Mutex<UserState>>>>,
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW_DAYS, DEFAULT_BASELINE_MIN_SAMPLES)
    }
}

impl BaselineTracker {
    pub fn new(window_days: u32, min_samples: u32) -> Self {
        Self {
            min_samples,
            window_days,
            users: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: &UserId) -> Arc<Mutex<UserState>> {
        let mut users = self.users.lock();
        users
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(UserState::new(self.window_days))))
            .clone()
    }

    /// Compute voice + emotion + combined deviation against the CURRENT
    /// (pre-update) state. Shared by `update` and `check_deviation`.
    fn compute_deviation(
        &self,
        state: &UserState,
        voice_features: Option<&AcousticFeatures>,
        emotion_data: Option<(EmotionLabel, f64)>,
    ) -> (f64, HashMap<String, f64>) {
        let confidence = state.confidence(self.min_samples);
        let mut zscores = HashMap::new();

        let voice_score = voice_features.and_then(|features| {
            if state.voice_sample_count() == 0 {
                return None;
            }
            // Worst-feature, not mean-across-features: a single acoustic
            // signal spiking hard (e.g. pitch_mean) is a meaningful
            // deviation on its own and must not be diluted by five other
            // features sitting quietly at baseline.
            let mut max_z = 0.0_f64;
            for (i, name) in VOICE_FEATURE_NAMES.iter().enumerate() {
                let wf = &state.welford[i];
                let std = wf.std_dev().max(EPSILON);
                let z = ((features.get(name) - wf.mean).abs() / std).min(DEVIATION_ZSCORE_CLAMP);
                zscores.insert(name.to_string(), z);
                max_z = max_z.max(z);
            }
            Some((max_z / DEVIATION_ZSCORE_CLAMP) * confidence)
        });

        let emotion_score = emotion_data.and_then(|(label, _conf)| {
            if state.emotion_sample_count == 0 {
                return None;
            }
            let baseline_dist = state.emotion_distribution();
            Some(jensen_shannon_one_hot(label, &baseline_dist) * confidence)
        });

        let combined = match (voice_score, emotion_score) {
            (Some(v), Some(e)) => v * DEVIATION_VOICE_WEIGHT + e * DEVIATION_EMOTION_WEIGHT,
            (Some(v), None) => v,
            (None, Some(e)) => e,
            (None, None) => 0.0,
        };

        (combined.clamp(0.0, 1.0), zscores)
    }

    /// Record a new voice and/or emotion sample for a user, updating its
    /// running statistics and returning the resulting deviation score.
    pub fn update(
        &self,
        user_id: &UserId,
        voice_features: Option<&AcousticFeatures>,
        emotion_data: Option<(EmotionLabel, f64)>,
        now: DateTime<Utc>,
    ) -> UpdateResult {
        let lock = self.user_lock(user_id);
        let mut state = lock.lock();

        let (deviation_score, zscores) = self.compute_deviation(&state, voice_features, emotion_data);
        let deviation_detected = deviation_score >= DEVIATION_DETECTED_THRESHOLD;

        if let Some(features) = voice_features {
            for (i, name) in VOICE_FEATURE_NAMES.iter().enumerate() {
                state.welford[i].update(features.get(name));
            }
        }

        if let Some((label, confidence)) = emotion_data {
            state.apply_emotion_decay(now);
            *state.emotion_counts.entry(label).or_insert(0.0) += 1.0;
            state.confidence_sum += confidence;
            state.emotion_sample_count += 1;
        }
        state.last_updated = Some(now);

        let kind = match (voice_features.is_some(), emotion_data.is_some()) {
            (true, true) => DeviationKind::Combined,
            (true, false) => DeviationKind::Voice,
            (false, true) => DeviationKind::Emotion,
            (false, false) => DeviationKind::Combined,
        };
        let record = DeviationRecord {
            user_id: user_id.clone(),
            timestamp: now,
            kind,
            score: deviation_score,
            severity: severity_for(deviation_score),
            feature_zscores: zscores,
        };
        state.push_deviation(record);

        if deviation_detected {
            warn!("[baseline] deviation detected for user, score={deviation_score:.3}");
        }

        UpdateResult {
            fingerprint: state.fingerprint(user_id, self.min_samples, now),
            baseline: state.baseline(user_id),
            deviation_score,
            deviation_detected,
        }
    }

    /// Score a hypothetical sample against the current baseline without
    /// recording it.
    pub fn check_deviation(
        &self,
        user_id: &UserId,
        voice_features: Option<&AcousticFeatures>,
        emotion_data: Option<(EmotionLabel, f64)>,
    ) -> (f64, bool) {
        let lock = self.user_lock(user_id);
        let state = lock.lock();
        let (score, _) = self.compute_deviation(&state, voice_features, emotion_data);
        (score, score >= DEVIATION_DETECTED_THRESHOLD)
    }

    /// Snapshot a user's current fingerprint, baseline, and recent
    /// deviation history.
    pub fn get_baseline(&self, user_id: &UserId, now: DateTime<Utc>) -> BaselineSnapshot {
        let lock = self.user_lock(user_id);
        let state = lock.lock();
        if state.voice_sample_count() == 0 && state.emotion_sample_count == 0 {
            return BaselineSnapshot {
                fingerprint: None,
                baseline: None,
                recent_deviations: Vec::new(),
            };
        }
        BaselineSnapshot {
            fingerprint: Some(state.fingerprint(user_id, self.min_samples, now)),
            baseline: Some(state.baseline(user_id)),
            recent_deviations: state.recent_deviations.iter().cloned().collect(),
        }
    }
}

/// Jensen-Shannon-like divergence between a one-hot distribution at
/// `label` and `baseline`, using log2 so the natural range is [0,1].
fn jensen_shannon_one_hot(label: EmotionLabel, baseline: &HashMap<EmotionLabel, f64>) -> f64 {
    let mut divergence = 0.0;
    for candidate in EmotionLabel::ALL {
        let p = if candidate == label { 1.0 } else { 0.0 };
        let q = baseline.get(&candidate).copied().unwrap_or(0.0);
        let m = (p + q) / 2.0;
        divergence += 0.5 * kl_term(p, m) + 0.5 * kl_term(q, m);
    }
    divergence.clamp(0.0, 1.0)
}

fn kl_term(p: f64, m: f64) -> f64 {
    if p <= EPSILON || m <= EPSILON {
        0.0
    } else {
        p * (p / m).log2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    fn features(pitch_mean: f64) -> AcousticFeatures {
        AcousticFeatures {
            pitch_mean,
            pitch_std: 10.0,
            energy_mean: 0.5,
            energy_std: 0.1,
            speech_rate: 3.0,
            pause_frequency: 0.2,
            duration: 4.0,
        }
    }

    // Welford mean matches arithmetic mean, order-independent.
    #[test]
    fn welford_mean_matches_arithmetic_mean_regardless_of_order() {
        let samples = [180.0, 175.0, 190.0, 182.0, 178.0, 185.0];
        let mut forward = Welford::new();
        for x in samples {
            forward.update(x);
        }
        let mut reversed = Welford::new();
        for x in samples.iter().rev() {
            reversed.update(*x);
        }
        let expected = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((forward.mean - expected).abs() < 1e-9);
        assert!((reversed.mean - expected).abs() < 1e-9);
    }

    // §8 invariant 3: distribution sums to 1.
    #[test]
    fn emotion_distribution_sums_to_one() {
        let tracker = BaselineTracker::default();
        let u = user("u1");
        let now = Utc::now();
        for (label, offset) in [
            (EmotionLabel::Happy, 0),
            (EmotionLabel::Sad, 1),
            (EmotionLabel::Happy, 2),
        ] {
            tracker.update(&u, None, Some((label, 0.8)), now + Duration::hours(offset));
        }
        let snapshot = tracker.get_baseline(&u, now + Duration::hours(3));
        let sum: f64 = snapshot.baseline.unwrap().distribution.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    // §8 boundary case: first-ever sample.
    #[test]
    fn first_sample_creates_fingerprint_with_floor_confidence_and_no_deviation() {
        let tracker = BaselineTracker::default();
        let u = user("u2");
        let now = Utc::now();
        let result = tracker.update(&u, Some(&features(180.0)), None, now);
        assert_eq!(result.fingerprint.sample_count, 1);
        assert!((result.fingerprint.confidence - 1.0 / 15.0).abs() < 1e-9);
        assert!(!result.deviation_detected);
        assert_eq!(result.deviation_score, 0.0);
    }

    // S5: baseline deviation scenario.
    #[test]
    fn scenario_s5_deviation_after_thirty_samples() {
        let tracker = BaselineTracker::default();
        let u = user("u3");
        let now = Utc::now();
        // Build up a stable baseline around pitch_mean=180 with noise.
        let noisy = [
            170.0, 175.0, 180.0, 185.0, 190.0, 172.0, 178.0, 182.0, 188.0, 176.0,
        ];
        for i in 0..30 {
            let pitch = noisy[i % noisy.len()];
            tracker.update(&u, Some(&features(pitch)), None, now + Duration::minutes(i as i64));
        }
        let result = tracker.update(&u, Some(&features(230.0)), None, now + Duration::minutes(31));
        assert!(result.deviation_score >= 0.5, "score was {}", result.deviation_score);
        assert!(result.deviation_detected);
        assert!(matches!(severity_for(result.deviation_score), Severity::Medium | Severity::High));
    }

    #[test]
    fn missing_voice_sample_defaults_to_zero_contribution() {
        let tracker = BaselineTracker::default();
        let u = user("u4");
        let now = Utc::now();
        let (score, detected) = tracker.check_deviation(&u, None, None);
        assert_eq!(score, 0.0);
        assert!(!detected);
        let _ = tracker.get_baseline(&u, now);
    }

    #[test]
    fn check_deviation_does_not_mutate_state() {
        let tracker = BaselineTracker::default();
        let u = user("u5");
        let now = Utc::now();
        for i in 0..20 {
            tracker.update(&u, Some(&features(180.0)), None, now + Duration::minutes(i));
        }
        let before = tracker.get_baseline(&u, now).fingerprint.unwrap().sample_count;
        tracker.check_deviation(&u, Some(&features(300.0)), None);
        let after = tracker.get_baseline(&u, now).fingerprint.unwrap().sample_count;
        assert_eq!(before, after);
    }
}
