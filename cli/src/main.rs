// ── kioo CLI ──────────────────────────────────────────────────────────────
// Thin driver binary over kioo-core: feed a transcript + optional voice
// emotion through the live-session pipeline, dump a user's baseline, or
// force a single-user overnight build. Grounded on the teacher's
// `openpawz-cli` role (a clap binary over the core crate) — see DESIGN.md.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use kioo_core::atoms::types::{EmotionLabel, Language, SessionId, UserId};
use kioo_core::config::CoreConfig;
use kioo_core::cultural::CulturalAnalyzer;
use kioo_core::overnight::crypto::Salt;
use kioo_core::overnight::scheduler::{schedule_run, UserProfileLookup};
use kioo_core::overnight::UserKeyMaterial;
use kioo_core::records::{AcousticFeatures, Transcript, VoiceEmotion};
use kioo_core::store::{InMemoryStore, RecordStore};

#[derive(Parser)]
#[command(name = "kioo", about = "Driver for the kioo-core analytical pipeline")]
struct Cli {
    /// Path to a TOML config file overriding the documented defaults
    /// (baseline windows, dissonance cutoffs, PBKDF2 iterations, ...).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn load_config(path: Option<&PathBuf>) -> CoreConfig {
    let Some(path) = path else { return CoreConfig::default() };
    match std::fs::read_to_string(path) {
        Ok(raw) => match CoreConfig::from_toml(&raw) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to parse config at {}: {err}, using defaults", path.display());
                CoreConfig::default()
            }
        },
        Err(err) => {
            eprintln!("failed to read config at {}: {err}, using defaults", path.display());
            CoreConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run a single transcript (+ optional voice emotion) through
    /// sentiment, dissonance, and cultural analysis; print JSON.
    Analyze {
        #[arg(long)]
        user: String,
        #[arg(long)]
        text: String,
        #[arg(long, value_enum)]
        language: LanguageArg,
        #[arg(long)]
        voice_emotion: Option<String>,
        #[arg(long, default_value_t = 0.8)]
        voice_confidence: f64,
    },
    /// Print a user's current baseline snapshot.
    Baseline {
        #[arg(long)]
        user: String,
    },
    /// Force a single user's overnight UIConfig build from their current
    /// in-process record history.
    Overnight {
        #[arg(long)]
        user: String,
        #[arg(long)]
        passphrase: String,
        #[arg(long, value_enum, default_value = "en")]
        language: LanguageArg,
    },
    /// Load a cultural KB file from disk and print retrieval results for
    /// a query (operational helper for hot-reload testing).
    KbLookup {
        #[arg(long)]
        kb_path: PathBuf,
        #[arg(long)]
        query: String,
    },
    /// Run the bounded-concurrency overnight scheduler over every
    /// registered active user in this process's in-memory store.
    Schedule {
        #[arg(long)]
        users: Vec<String>,
        #[arg(long)]
        passphrase: String,
        #[arg(long, default_value_t = 8)]
        max_concurrent: usize,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

/// Fixed passphrase + language for every user in a `Schedule` run. A real
/// deployment sources per-user key material and language from a user
/// profile service; this CLI has no such service to call.
struct FixedProfileLookup {
    passphrase: String,
}

impl UserProfileLookup for FixedProfileLookup {
    fn key_material(&self, _user_id: &UserId) -> Option<UserKeyMaterial> {
        Some(UserKeyMaterial { passphrase: self.passphrase.clone(), salt: Salt::generate() })
    }

    fn primary_language(&self, _user_id: &UserId) -> Language {
        Language::En
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LanguageArg {
    En,
    Sw,
    Mixed,
    Auto,
}

impl From<LanguageArg> for Language {
    fn from(value: LanguageArg) -> Self {
        match value {
            LanguageArg::En => Language::En,
            LanguageArg::Sw => Language::Sw,
            LanguageArg::Mixed => Language::Mixed,
            LanguageArg::Auto => Language::Auto,
        }
    }
}

fn parse_emotion(s: &str) -> Option<EmotionLabel> {
    match s.to_lowercase().as_str() {
        "neutral" => Some(EmotionLabel::Neutral),
        "happy" => Some(EmotionLabel::Happy),
        "sad" => Some(EmotionLabel::Sad),
        "angry" => Some(EmotionLabel::Angry),
        "fear" => Some(EmotionLabel::Fear),
        "surprise" => Some(EmotionLabel::Surprise),
        "disgust" => Some(EmotionLabel::Disgust),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref());

    // Process-local state. A real deployment wires a persistent RecordStore
    // and per-user BaselineTracker/Analyzer instances behind a service.
    let store = InMemoryStore::default();
    let analyzer = config.sentiment_analyzer();
    let dissonance = config.dissonance_engine();
    let cultural = CulturalAnalyzer::default();
    let baseline = config.baseline_tracker();

    match cli.command {
        Command::Analyze { user, text, language, voice_emotion, voice_confidence } => {
            let user_id = UserId::from(user.as_str());
            let session_id = SessionId::from("cli-session");
            let language: Language = language.into();

            let transcript = Transcript {
                session_id: session_id.clone(),
                seq: 1,
                text: text.clone(),
                language,
                confidence: None,
            };
            let voice = voice_emotion.as_deref().and_then(parse_emotion).map(|label| VoiceEmotion {
                session_id: session_id.clone(),
                seq: 1,
                label,
                confidence: voice_confidence,
                features: None,
            });

            let dissonance_record = dissonance.score(&analyzer, &transcript, voice.as_ref());
            let cultural_analysis = cultural.analyze(&session_id, &text, language, voice.as_ref().map(|v| v.label), None);

            store.append_dissonance(&user_id, dissonance_record, Utc::now());
            store.append_cultural(&user_id, cultural_analysis, Utc::now());
            store.register_active_user(&user_id);

            let snapshot = store.list_dissonance_since(&user_id, Utc::now() - chrono::Duration::days(1));
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "dissonance_level": snapshot.last().map(|r| format!("{:?}", r.record.level)),
                "interpretation": snapshot.last().map(|r| format!("{:?}", r.record.interpretation)),
                "risk_level": snapshot.last().map(|r| format!("{:?}", r.record.risk_level)),
            })).unwrap());
        }

        Command::Baseline { user } => {
            let user_id = UserId::from(user.as_str());
            // Demonstration samples: a real CLI invocation would stream
            // live voice samples rather than synthesizing them.
            let features = AcousticFeatures {
                pitch_mean: 180.0,
                pitch_std: 12.0,
                energy_mean: 0.5,
                energy_std: 0.1,
                speech_rate: 3.2,
                pause_frequency: 0.15,
                duration: 4.0,
            };
            let now = Utc::now();
            let result = baseline.update(&user_id, Some(&features), Some((EmotionLabel::Neutral, 0.8)), now);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "sample_count": result.fingerprint.sample_count,
                    "confidence": result.fingerprint.confidence,
                    "deviation_score": result.deviation_score,
                    "deviation_detected": result.deviation_detected,
                }))
                .unwrap()
            );
        }

        Command::Overnight { user, passphrase, language } => {
            let user_id = UserId::from(user.as_str());
            store.register_active_user(&user_id);
            let builder = config.overnight_builder();
            let key_material = UserKeyMaterial { passphrase, salt: Salt::generate() };
            match builder.build_for_user(&store, &user_id, Utc::now(), config.overnight_lookback_days, language.into(), &key_material) {
                Ok(record) => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "version": record.version,
                        "generated_at": record.generated_at.to_rfc3339(),
                        "encrypted_config_len": record.encrypted_config.len(),
                    }))
                    .unwrap()
                ),
                Err(err) => eprintln!("overnight build failed: {err}"),
            }
        }

        Command::Schedule { users, passphrase, max_concurrent, timeout_secs } => {
            for user in &users {
                store.register_active_user(&UserId::from(user.as_str()));
            }
            let store: Arc<dyn RecordStore> = Arc::new(store);
            let profiles: Arc<dyn UserProfileLookup> = Arc::new(FixedProfileLookup { passphrase });
            let builder = Arc::new(config.overnight_builder());
            let summary = schedule_run(
                store,
                profiles,
                builder,
                Utc::now(),
                StdDuration::from_secs(timeout_secs),
                Some(max_concurrent),
            )
            .await;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "attempted": summary.attempted,
                    "succeeded": summary.succeeded.len(),
                    "failed": summary.failed.len(),
                    "abandoned": summary.abandoned.len(),
                }))
                .unwrap()
            );
        }

        Command::KbLookup { kb_path, query } => {
            let raw = match std::fs::read_to_string(&kb_path) {
                Ok(raw) => raw,
                Err(err) => {
                    eprintln!("failed to read {}: {err}", kb_path.display());
                    std::process::exit(1);
                }
            };
            match kioo_core::cultural::CulturalKnowledgeBase::from_json(&raw) {
                Ok(kb) => {
                    let results = kb.retrieve(&query, None);
                    println!("{}", serde_json::to_string_pretty(&serde_json::json!(
                        results.iter().map(|r| &r.content).collect::<Vec<_>>()
                    )).unwrap());
                }
                Err(err) => {
                    eprintln!("failed to parse KB: {err}");
                    std::process::exit(1);
                }
            }
        }
    }
}
