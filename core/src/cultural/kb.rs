// ── Cultural Knowledge Base ──────────────────────────────────────────────
// Static JSON entries, keyword-retrieved. Read-only after load; hot-reload
// flips a pointer atomically, mirroring the teacher's approach to swapping
// in a freshly-loaded config without stopping in-flight requests.

use std::sync::RwLock;

use serde::Deserialize;

use crate::atoms::error::{CoreError, CoreResult};
use crate::atoms::types::{Language, Severity};

/// One cultural knowledge base entry.
#[derive(Debug, Clone, Deserialize)]
pub struct KbEntry {
    pub id: String,
    pub content: String,
    pub keywords: Vec<String>,
    pub language: String,
    pub region: String,
    pub category: String,
    pub severity: String,
    pub cultural_significance: String,
}

/// Bundled default KB, used when no external path is configured. Keeps
/// the core usable without deployment-specific asset wiring.
const DEFAULT_KB_JSON: &str = include_str!("../../assets/cultural_kb.json");

fn parse_kb(raw: &str) -> CoreResult<Vec<KbEntry>> {
    serde_json::from_str(raw).map_err(|e| CoreError::configuration(format!("malformed cultural KB: {e}")))
}

/// Retrieval + hot-reload wrapper around the entry set. The index is
/// read-only after load; hot-reload flips a pointer atomically.
pub struct CulturalKnowledgeBase {
    entries: RwLock<Vec<KbEntry>>,
}

impl Default for CulturalKnowledgeBase {
    fn default() -> Self {
        // The bundled default asset is validated at compile/test time by
        // `default_kb_parses`; unwrap here reflects that guarantee.
        Self {
            entries: RwLock::new(parse_kb(DEFAULT_KB_JSON).expect("bundled cultural KB must parse")),
        }
    }
}

impl CulturalKnowledgeBase {
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        Ok(Self {
            entries: RwLock::new(parse_kb(raw)?),
        })
    }

    /// Atomically replace the loaded entry set (SIGHUP-equivalent reload).
    pub fn reload(&self, raw: &str) -> CoreResult<()> {
        let parsed = parse_kb(raw)?;
        *self.entries.write().unwrap() = parsed;
        Ok(())
    }

    /// Keyword retrieval: entries whose keywords or content overlap with
    /// the query, optionally filtered by language, ranked by hit count.
    pub fn retrieve(&self, query: &str, language: Option<Language>) -> Vec<KbEntry> {
        let lower_query = query.to_lowercase();
        let lang_code = language.map(|l| l.to_string());

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(usize, &KbEntry)> = entries
            .iter()
            .filter(|e| lang_code.as_deref().map(|l| e.language == l || l == "mixed").unwrap_or(true))
            .filter_map(|e| {
                let mut hits = 0usize;
                for kw in &e.keywords {
                    if lower_query.contains(&kw.to_lowercase()) {
                        hits += 1;
                    }
                }
                if hits > 0 {
                    Some((hits, e))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, e)| e.clone()).collect()
    }
}

/// Parse a KB's declared severity string into the shared enum, falling
/// back to `Low` for unrecognized values rather than failing retrieval.
pub fn parse_severity(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kb_parses() {
        let kb = CulturalKnowledgeBase::default();
        let results = kb.retrieve("nimechoka", Some(Language::Sw));
        assert!(!results.is_empty());
    }

    #[test]
    fn reload_replaces_entries_atomically() {
        let kb = CulturalKnowledgeBase::default();
        let minimal = r#"[{"id":"x","content":"c","keywords":["zzz"],"language":"en","region":"na","category":"test","severity":"low","cultural_significance":"n/a"}]"#;
        kb.reload(minimal).unwrap();
        assert!(kb.retrieve("nimechoka", None).is_empty());
        assert!(!kb.retrieve("zzz", None).is_empty());
    }

    #[test]
    fn malformed_reload_returns_configuration_error() {
        let kb = CulturalKnowledgeBase::default();
        let err = kb.reload("not json").unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }
}
