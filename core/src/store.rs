// ── Central Record Store ────────────────────────────────────────────────
// Breaks the would-be cycle between Baseline, Dissonance, and Cultural by
// making all writes append-only to a central record store; each component
// reads the store by session_id without holding references to peer
// components.
//
// `RecordStore` is the seam; `InMemoryStore` is the only implementation
// here, grounded on the teacher's `engine/sessions.rs` /
// `engine/sessions/mod.rs` connection-guarded-by-mutex pattern, applied
// to a handful of per-kind append-only vectors instead of a SQL
// connection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::atoms::error::{CoreError, CoreResult};
use crate::atoms::types::UserId;
use crate::cultural::CulturalAnalysis;
use crate::dissonance::DissonanceRecord;
use crate::baseline::DeviationRecord;
use crate::overnight::UIConfigRecord;

#[derive(Debug, Clone)]
pub struct StoredDissonance {
    pub user_id: UserId,
    pub record: DissonanceRecord,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredCultural {
    pub user_id: UserId,
    pub analysis: CulturalAnalysis,
    pub created_at: DateTime<Utc>,
}

/// Append-only record store, read by session/user id.
/// All methods are synchronous: every implementation here is in-memory,
/// but a storage-backed implementation would make these `async fn` via
/// an adapter at the call site, matching the teacher's sync-core /
/// async-adapter split.
pub trait RecordStore: Send + Sync {
    fn append_dissonance(&self, user_id: &UserId, record: DissonanceRecord, now: DateTime<Utc>);
    fn list_dissonance_since(&self, user_id: &UserId, since: DateTime<Utc>) -> Vec<StoredDissonance>;

    fn append_cultural(&self, user_id: &UserId, analysis: CulturalAnalysis, now: DateTime<Utc>);
    fn list_cultural_since(&self, user_id: &UserId, since: DateTime<Utc>) -> Vec<StoredCultural>;

    fn append_deviation(&self, record: DeviationRecord);
    fn list_deviations_since(&self, user_id: &UserId, since: DateTime<Utc>) -> Vec<DeviationRecord>;

    fn get_ui_config(&self, user_id: &UserId) -> Option<UIConfigRecord>;
    /// Upsert iff `record.version > current.version` (or no current
    /// record); else an integrity error.
    fn upsert_ui_config(&self, record: UIConfigRecord) -> CoreResult<()>;

    fn register_active_user(&self, user_id: &UserId);
    fn list_active_users(&self) -> Vec<UserId>;
}

#[derive(Default)]
struct Tables {
    dissonance: Vec<StoredDissonance>,
    cultural: Vec<StoredCultural>,
    deviations: Vec<DeviationRecord>,
    ui_configs: HashMap<UserId, UIConfigRecord>,
    active_users: Vec<UserId>,
}

/// Process-local, in-memory `RecordStore` (no persistence across runs).
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self { tables: Mutex::new(Tables::default()) }
    }
}

impl RecordStore for InMemoryStore {
    fn append_dissonance(&self, user_id: &UserId, record: DissonanceRecord, now: DateTime<Utc>) {
        let mut tables = self.tables.lock();
        tables.dissonance.push(StoredDissonance {
            user_id: user_id.clone(),
            record,
            created_at: now,
        });
    }

    fn list_dissonance_since(&self, user_id: &UserId, since: DateTime<Utc>) -> Vec<StoredDissonance> {
        self.tables
            .lock()
            .dissonance
            .iter()
            .filter(|r| &r.user_id == user_id && r.created_at >= since)
            .cloned()
            .collect()
    }

    fn append_cultural(&self, user_id: &UserId, analysis: CulturalAnalysis, now: DateTime<Utc>) {
        let mut tables = self.tables.lock();
        tables.cultural.push(StoredCultural {
            user_id: user_id.clone(),
            analysis,
            created_at: now,
        });
    }

    fn list_cultural_since(&self, user_id: &UserId, since: DateTime<Utc>) -> Vec<StoredCultural> {
        self.tables
            .lock()
            .cultural
            .iter()
            .filter(|r| &r.user_id == user_id && r.created_at >= since)
            .cloned()
            .collect()
    }

    fn append_deviation(&self, record: DeviationRecord) {
        self.tables.lock().deviations.push(record);
    }

    fn list_deviations_since(&self, user_id: &UserId, since: DateTime<Utc>) -> Vec<DeviationRecord> {
        self.tables
            .lock()
            .deviations
            .iter()
            .filter(|r| &r.user_id == user_id && r.timestamp >= since)
            .cloned()
            .collect()
    }

    fn get_ui_config(&self, user_id: &UserId) -> Option<UIConfigRecord> {
        self.tables.lock().ui_configs.get(user_id).cloned()
    }

    fn upsert_ui_config(&self, record: UIConfigRecord) -> CoreResult<()> {
        let mut tables = self.tables.lock();
        if let Some(current) = tables.ui_configs.get(&record.user_id) {
            if record.version <= current.version {
                return Err(CoreError::integrity(format!(
                    "UIConfig version {} is not greater than current version {} for user {}",
                    record.version, current.version, record.user_id
                )));
            }
        }
        tables.ui_configs.insert(record.user_id.clone(), record);
        Ok(())
    }

    fn register_active_user(&self, user_id: &UserId) {
        let mut tables = self.tables.lock();
        if !tables.active_users.contains(user_id) {
            tables.active_users.push(user_id.clone());
        }
    }

    fn list_active_users(&self) -> Vec<UserId> {
        self.tables.lock().active_users.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::Language;
    use crate::overnight::UIConfigRecord;

    fn user() -> UserId {
        UserId::from("u1")
    }

    #[test]
    fn upsert_rejects_non_increasing_version() {
        let store = InMemoryStore::default();
        let u = user();
        let first = UIConfigRecord {
            user_id: u.clone(),
            version: 1,
            generated_at: Utc::now(),
            encrypted_config: "x".into(),
            salt: "y".into(),
        };
        store.upsert_ui_config(first).unwrap();
        let stale = UIConfigRecord {
            user_id: u.clone(),
            version: 1,
            generated_at: Utc::now(),
            encrypted_config: "z".into(),
            salt: "w".into(),
        };
        assert!(store.upsert_ui_config(stale).is_err());
    }

    #[test]
    fn list_since_filters_by_user_and_time() {
        let store = InMemoryStore::default();
        let u1 = UserId::from("a");
        let u2 = UserId::from("b");
        let now = Utc::now();
        let record = crate::dissonance::DissonanceEngine::default().score(
            &crate::sentiment::SentimentAnalyzer::default(),
            &crate::records::Transcript {
                session_id: crate::atoms::types::SessionId::from("s"),
                seq: 1,
                text: "fine".into(),
                language: Language::En,
                confidence: None,
            },
            None,
        );
        store.append_dissonance(&u1, record.clone(), now);
        store.append_dissonance(&u2, record, now);
        assert_eq!(store.list_dissonance_since(&u1, now).len(), 1);
        assert_eq!(store.list_dissonance_since(&u1, now + chrono::Duration::seconds(1)).len(), 0);
    }
}
