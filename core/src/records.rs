// ── Kioo Records: Live-Session Inputs ───────────────────────────────────
// The two inputs produced by external collaborators: the voice analyzer's
// VoiceEmotion and the STT layer's Transcript. Everything downstream
// (SentimentScore, DissonanceRecord, ...) is derived and lives in its
// owning component module.

use serde::{Deserialize, Serialize};

use crate::atoms::types::{EmotionLabel, Language, SessionId};

/// Acoustic features attached to a VoiceEmotion sample.
/// All fields optional at the call site — BaselineTracker treats a
/// missing feature as contributing zero to deviation, so
/// `AcousticFeatures` itself is required but individual samples may
/// omit the whole struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcousticFeatures {
    pub pitch_mean: f64,
    pub pitch_std: f64,
    pub energy_mean: f64,
    pub energy_std: f64,
    pub speech_rate: f64,
    pub pause_frequency: f64,
    pub duration: f64,
}

impl AcousticFeatures {
    /// Look up a named feature by the canonical `VOICE_FEATURE_NAMES`
    /// order. Panics on an unknown name — callers only ever pass names
    /// drawn from that table.
    pub fn get(&self, name: &str) -> f64 {
        match name {
            "pitch_mean" => self.pitch_mean,
            "pitch_std" => self.pitch_std,
            "energy_mean" => self.energy_mean,
            "energy_std" => self.energy_std,
            "speech_rate" => self.speech_rate,
            "pause_frequency" => self.pause_frequency,
            other => panic!("unknown acoustic feature: {other}"),
        }
    }
}

/// A single utterance's detected voice emotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceEmotion {
    pub session_id: SessionId,
    pub seq: u32,
    pub label: EmotionLabel,
    pub confidence: f64,
    pub features: Option<AcousticFeatures>,
}

/// A single utterance's transcribed text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: SessionId,
    pub seq: u32,
    pub text: String,
    pub language: Language,
    pub confidence: Option<f64>,
}

/// Redact transcript text before it reaches a log line. Mirrors the
/// teacher's `safe_log_preview` discipline in `engine/engram/encryption.rs`.
pub fn safe_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        format!("<{} chars>", text.chars().count())
    } else {
        format!("<{} chars, truncated>", text.chars().count())
    }
}
