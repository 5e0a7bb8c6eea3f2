// ── Overnight Scheduler ──────────────────────────────────────────────────
// Bounded-concurrency run over every active user, each isolated so one
// user's failure never blocks or corrupts another's. Grounded on the
// teacher's `lib.rs` cron-heartbeat spawn-loop, with the teacher's
// fire-and-forget per-tick tasks replaced by a `Semaphore`-bounded
// `JoinSet` so a run with thousands of users doesn't spawn thousands of
// tasks at once.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::atoms::constants::{DEFAULT_OVERNIGHT_LOOKBACK_DAYS, DEFAULT_OVERNIGHT_MAX_CONCURRENT_USERS};
use crate::atoms::types::{Language, UserId};
use crate::store::RecordStore;

use super::{log_build_failure, OvernightBuilder, UIConfigRecord, UserKeyMaterial};

/// Per-user inputs the scheduler cannot derive from the store alone:
/// encryption passphrase/salt and the user's primary language hint.
/// A production deployment would source these from a user-profile
/// service; here the caller supplies a lookup implementation.
/// `OvernightBuilder` never itself owns passphrase material beyond a
/// single build call.
pub trait UserProfileLookup: Send + Sync {
    fn key_material(&self, user_id: &UserId) -> Option<UserKeyMaterial>;
    fn primary_language(&self, user_id: &UserId) -> Language;
}

pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: Vec<UIConfigRecord>,
    pub failed: Vec<UserId>,
    pub abandoned: Vec<UserId>,
}

/// Runs `build_for_user` for every user returned by
/// `store.list_active_users()`, bounded to `max_concurrent` in-flight
/// builds, stopping at `deadline` (users not yet started by then are
/// abandoned rather than started late).
pub async fn schedule_run(
    store: Arc<dyn RecordStore>,
    profiles: Arc<dyn UserProfileLookup>,
    builder: Arc<OvernightBuilder>,
    now: DateTime<Utc>,
    deadline: StdDuration,
    max_concurrent: Option<usize>,
) -> RunSummary {
    let users = store.list_active_users();
    let max_concurrent = max_concurrent.unwrap_or(DEFAULT_OVERNIGHT_MAX_CONCURRENT_USERS);
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let deadline_at = tokio::time::Instant::now() + deadline;

    info!("[overnight] starting run for {} active users, concurrency={max_concurrent}", users.len());

    let mut set: JoinSet<(UserId, Option<UIConfigRecord>)> = JoinSet::new();
    let mut abandoned = Vec::new();

    for user_id in users.iter().cloned() {
        if tokio::time::Instant::now() >= deadline_at {
            abandoned.push(user_id);
            continue;
        }
        let Some(key_material) = profiles.key_material(&user_id) else {
            warn!("[overnight] no key material for user {user_id}, skipping");
            abandoned.push(user_id);
            continue;
        };
        let language = profiles.primary_language(&user_id);
        let semaphore = semaphore.clone();
        let store = store.clone();
        let builder = builder.clone();
        let user_for_task = user_id.clone();

        set.spawn(async move {
            let permit = semaphore.acquire_owned().await;
            let Ok(_permit) = permit else {
                return (user_for_task, None);
            };
            let result = tokio::task::spawn_blocking(move || {
                builder.build_for_user(
                    store.as_ref(),
                    &user_for_task,
                    now,
                    DEFAULT_OVERNIGHT_LOOKBACK_DAYS,
                    language,
                    &key_material,
                )
                .map(|record| (user_for_task.clone(), record))
                .map_err(|err| (user_for_task, err))
            })
            .await;

            match result {
                Ok(Ok((user, record))) => (user, Some(record)),
                Ok(Err((user, err))) => {
                    log_build_failure(&user, &err);
                    (user, None)
                }
                Err(join_err) => {
                    warn!("[overnight] build task panicked: {join_err}");
                    (UserId::from("unknown"), None)
                }
            }
        });
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_user_id, Some(record))) => succeeded.push(record),
            Ok((user_id, None)) => failed.push(user_id),
            Err(join_err) => warn!("[overnight] scheduler task join failure: {join_err}"),
        }
    }

    info!(
        "[overnight] run complete: {} succeeded, {} failed, {} abandoned",
        succeeded.len(),
        failed.len(),
        abandoned.len()
    );

    RunSummary { attempted: users.len(), succeeded, failed, abandoned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overnight::crypto::Salt;
    use crate::store::InMemoryStore;

    struct FixedProfiles;

    impl UserProfileLookup for FixedProfiles {
        fn key_material(&self, _user_id: &UserId) -> Option<UserKeyMaterial> {
            Some(UserKeyMaterial { passphrase: "p".to_string(), salt: Salt::generate() })
        }

        fn primary_language(&self, _user_id: &UserId) -> Language {
            Language::En
        }
    }

    #[tokio::test]
    async fn run_with_no_active_users_is_a_no_op() {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryStore::default());
        let profiles: Arc<dyn UserProfileLookup> = Arc::new(FixedProfiles);
        let builder = Arc::new(OvernightBuilder::new(1_000));
        let summary = schedule_run(store, profiles, builder, Utc::now(), StdDuration::from_secs(5), Some(2)).await;
        assert_eq!(summary.attempted, 0);
        assert!(summary.succeeded.is_empty());
    }

    #[tokio::test]
    async fn run_builds_every_registered_active_user() {
        let store = Arc::new(InMemoryStore::default());
        let user_a = UserId::from("a");
        let user_b = UserId::from("b");
        store.register_active_user(&user_a);
        store.register_active_user(&user_b);

        let now = Utc::now();
        let analyzer = crate::sentiment::SentimentAnalyzer::default();
        let engine = crate::dissonance::DissonanceEngine::default();
        for user in [&user_a, &user_b] {
            let record = engine.score(
                &analyzer,
                &crate::records::Transcript {
                    session_id: crate::atoms::types::SessionId::from("s"),
                    seq: 1,
                    text: "I feel good today".to_string(),
                    language: Language::En,
                    confidence: None,
                },
                None,
            );
            store.append_dissonance(user, record, now);
        }

        let store: Arc<dyn RecordStore> = store;
        let profiles: Arc<dyn UserProfileLookup> = Arc::new(FixedProfiles);
        let builder = Arc::new(OvernightBuilder::new(1_000));
        let summary = schedule_run(store, profiles, builder, now, StdDuration::from_secs(5), Some(2)).await;
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded.len(), 2);
        assert!(summary.failed.is_empty());
    }
}
