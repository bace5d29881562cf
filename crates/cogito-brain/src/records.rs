//! Append-only record collections: thoughts, knowledge, theories, insights.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use cogito_types::{
    Insight, InsightKind, KnowledgeEntry, KnowledgeSource, Theory, TheoryStatus, Thought,
    ThoughtKind, ThoughtStatus,
};

/// Default page size for recent thoughts.
pub const DEFAULT_THOUGHT_LIMIT: usize = 20;

/// Insights are always served as a top-N by significance.
pub const TOP_INSIGHTS: usize = 10;

/// Optional filters for listing thoughts.
#[derive(Debug, Clone, Default)]
pub struct ThoughtFilter {
    pub kind: Option<ThoughtKind>,
    pub domain: Option<String>,
}

/// Row counts per collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordCounts {
    pub thoughts: u64,
    pub knowledge: u64,
    pub theories: u64,
    pub insights: u64,
}

/// Record store sharing the SQLite connection from Storage.
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Mutex<Connection>>,
}

impl RecordStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    // ── Appends ─────────────────────────────────────────────────────

    pub fn append_thought(&self, t: &Thought) -> Result<()> {
        insert_thought(&self.db.lock(), t)
    }

    pub fn append_knowledge(&self, k: &KnowledgeEntry) -> Result<()> {
        insert_knowledge(&self.db.lock(), k)
    }

    pub fn append_theory(&self, t: &Theory) -> Result<()> {
        insert_theory(&self.db.lock(), t)
    }

    pub fn append_insight(&self, i: &Insight) -> Result<()> {
        insert_insight(&self.db.lock(), i)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Most recent thoughts first, at most `limit`, optionally filtered.
    pub fn thoughts(&self, filter: &ThoughtFilter, limit: usize) -> Result<Vec<Thought>> {
        let mut sql = String::from(
            "SELECT id, content, kind, domain, confidence, complexity, novelty, reasoning, parent_thought_id, related_thoughts, evidence, timestamp, status FROM thoughts WHERE 1 = 1",
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(kind) = filter.kind {
            sql.push_str(" AND kind = ?");
            args.push(kind.as_str().to_string().into());
        }
        if let Some(domain) = filter.domain.as_deref().filter(|d| !d.is_empty()) {
            sql.push_str(" AND domain = ?");
            args.push(domain.to_string().into());
        }
        sql.push_str(" ORDER BY timestamp DESC, rowid DESC LIMIT ?");
        args.push((limit as i64).into());

        let db = self.db.lock();
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), map_thought)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All theories, most novel first.
    pub fn theories(&self) -> Result<Vec<Theory>> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT id, title, description, domain, hypothesis, evidence, predictions, confidence, novelty, complexity, supporting_thoughts, contradicting_evidence, status, created_at, last_evolved FROM theories ORDER BY novelty DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], map_theory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The `limit` most significant insights.
    pub fn top_insights(&self, limit: usize) -> Result<Vec<Insight>> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT id, content, kind, domain, significance, related_concepts, implications, discovered_at FROM insights ORDER BY significance DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], map_insight)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Knowledge entries, optionally restricted to one domain. An empty
    /// domain is treated as no filter.
    pub fn knowledge(&self, domain: Option<&str>) -> Result<Vec<KnowledgeEntry>> {
        let db = self.db.lock();
        let rows = match domain.filter(|d| !d.is_empty()) {
            Some(domain) => {
                let mut stmt = db.prepare(
                    "SELECT id, concept, definition, domain, connections, confidence, source, last_updated, usage_count FROM knowledge WHERE domain = ?1 ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![domain], map_knowledge)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = db.prepare(
                    "SELECT id, concept, definition, domain, connections, confidence, source, last_updated, usage_count FROM knowledge ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map([], map_knowledge)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// Case-insensitive substring search on `concept`, optionally within one
    /// domain. Highest confidence first.
    pub fn search_knowledge(
        &self,
        query: &str,
        domain: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let mut sql = String::from(
            "SELECT id, concept, definition, domain, connections, confidence, source, last_updated, usage_count FROM knowledge WHERE concept LIKE ? ESCAPE '\\'",
        );
        let mut args: Vec<Value> = vec![pattern.into()];
        if let Some(domain) = domain.filter(|d| !d.is_empty()) {
            sql.push_str(" AND domain = ?");
            args.push(domain.to_string().into());
        }
        sql.push_str(" ORDER BY confidence DESC, rowid DESC LIMIT ?");
        args.push((limit as i64).into());

        let db = self.db.lock();
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), map_knowledge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn counts(&self) -> Result<RecordCounts> {
        let db = self.db.lock();
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                db.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(RecordCounts {
            thoughts: count("thoughts")?,
            knowledge: count("knowledge")?,
            theories: count("theories")?,
            insights: count("insights")?,
        })
    }
}

// ── Inserts ─────────────────────────────────────────────────────────
//
// Usable on a connection that is already locked, e.g. inside a transaction.

pub fn insert_thought(db: &Connection, t: &Thought) -> Result<()> {
    db.execute(
        "INSERT INTO thoughts (id, content, kind, domain, confidence, complexity, novelty, reasoning, parent_thought_id, related_thoughts, evidence, timestamp, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            t.id.to_string(),
            t.content,
            t.kind.as_str(),
            t.domain,
            t.confidence,
            t.complexity,
            t.novelty,
            t.reasoning,
            t.parent_thought_id.map(|id| id.to_string()),
            serde_json::to_string(&t.related_thoughts)?,
            serde_json::to_string(&t.evidence)?,
            t.timestamp.timestamp_millis(),
            t.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn insert_knowledge(db: &Connection, k: &KnowledgeEntry) -> Result<()> {
    db.execute(
        "INSERT INTO knowledge (id, concept, definition, domain, connections, confidence, source, last_updated, usage_count) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            k.id.to_string(),
            k.concept,
            k.definition,
            k.domain,
            serde_json::to_string(&k.connections)?,
            k.confidence,
            k.source.as_str(),
            k.last_updated.timestamp_millis(),
            k.usage_count as i64,
        ],
    )?;
    Ok(())
}

pub fn insert_theory(db: &Connection, t: &Theory) -> Result<()> {
    db.execute(
        "INSERT INTO theories (id, title, description, domain, hypothesis, evidence, predictions, confidence, novelty, complexity, supporting_thoughts, contradicting_evidence, status, created_at, last_evolved) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        rusqlite::params![
            t.id.to_string(),
            t.title,
            t.description,
            t.domain,
            t.hypothesis,
            serde_json::to_string(&t.evidence)?,
            serde_json::to_string(&t.predictions)?,
            t.confidence,
            t.novelty,
            t.complexity,
            serde_json::to_string(&t.supporting_thoughts)?,
            serde_json::to_string(&t.contradicting_evidence)?,
            t.status.as_str(),
            t.created_at.timestamp_millis(),
            t.last_evolved.timestamp_millis(),
        ],
    )?;
    Ok(())
}

pub fn insert_insight(db: &Connection, i: &Insight) -> Result<()> {
    db.execute(
        "INSERT INTO insights (id, content, kind, domain, significance, related_concepts, implications, discovered_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            i.id.to_string(),
            i.content,
            i.kind.as_str(),
            i.domain,
            i.significance,
            serde_json::to_string(&i.related_concepts)?,
            serde_json::to_string(&i.implications)?,
            i.discovered_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

// ── Row mapping ─────────────────────────────────────────────────────

fn map_thought(row: &Row<'_>) -> rusqlite::Result<Thought> {
    Ok(Thought {
        id: uuid_col(row, 0)?,
        content: row.get(1)?,
        kind: enum_col(row, 2, ThoughtKind::parse)?,
        domain: row.get(3)?,
        confidence: row.get(4)?,
        complexity: row.get(5)?,
        novelty: row.get(6)?,
        reasoning: row.get(7)?,
        parent_thought_id: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| Uuid::parse_str(&s).ok()),
        related_thoughts: json_col(row, 9)?,
        evidence: json_col(row, 10)?,
        timestamp: millis_col(row, 11)?,
        status: enum_col(row, 12, ThoughtStatus::parse)?,
    })
}

fn map_knowledge(row: &Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    Ok(KnowledgeEntry {
        id: uuid_col(row, 0)?,
        concept: row.get(1)?,
        definition: row.get(2)?,
        domain: row.get(3)?,
        connections: json_col(row, 4)?,
        confidence: row.get(5)?,
        source: enum_col(row, 6, KnowledgeSource::parse)?,
        last_updated: millis_col(row, 7)?,
        usage_count: row.get::<_, i64>(8)? as u64,
    })
}

fn map_theory(row: &Row<'_>) -> rusqlite::Result<Theory> {
    Ok(Theory {
        id: uuid_col(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        domain: row.get(3)?,
        hypothesis: row.get(4)?,
        evidence: json_col(row, 5)?,
        predictions: json_col(row, 6)?,
        confidence: row.get(7)?,
        novelty: row.get(8)?,
        complexity: row.get(9)?,
        supporting_thoughts: json_col(row, 10)?,
        contradicting_evidence: json_col(row, 11)?,
        status: enum_col(row, 12, TheoryStatus::parse)?,
        created_at: millis_col(row, 13)?,
        last_evolved: millis_col(row, 14)?,
    })
}

fn map_insight(row: &Row<'_>) -> rusqlite::Result<Insight> {
    Ok(Insight {
        id: uuid_col(row, 0)?,
        content: row.get(1)?,
        kind: enum_col(row, 2, InsightKind::parse)?,
        domain: row.get(3)?,
        significance: row.get(4)?,
        related_concepts: json_col(row, 5)?,
        implications: json_col(row, 6)?,
        discovered_at: millis_col(row, 7)?,
    })
}

fn conversion_error(idx: usize, ty: Type, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, msg.into())
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e.to_string()))
}

fn enum_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, Type::Text, format!("unknown variant: {raw}")))
}

fn json_col<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e.to_string()))
}

fn millis_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("timestamp out of range: {ms}")))
}

/// Escape LIKE wildcards so the query matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> RecordStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::storage::create_schema(&conn).unwrap();
        RecordStore::new(Arc::new(Mutex::new(conn)))
    }

    fn thought(content: &str, kind: ThoughtKind, domain: &str, at: DateTime<Utc>) -> Thought {
        Thought {
            id: Uuid::now_v7(),
            content: content.into(),
            kind,
            domain: domain.into(),
            confidence: 0.5,
            complexity: 0.5,
            novelty: 0.5,
            reasoning: "test".into(),
            parent_thought_id: None,
            related_thoughts: vec![],
            evidence: vec![],
            timestamp: at,
            status: ThoughtStatus::Active,
        }
    }

    fn knowledge(concept: &str, domain: &str, confidence: f64) -> KnowledgeEntry {
        KnowledgeEntry {
            id: Uuid::now_v7(),
            concept: concept.into(),
            definition: format!("definition of {concept}"),
            domain: domain.into(),
            connections: vec![],
            confidence,
            source: KnowledgeSource::Learned,
            last_updated: Utc::now(),
            usage_count: 0,
        }
    }

    fn insight(significance: f64) -> Insight {
        Insight {
            id: Uuid::now_v7(),
            content: format!("insight {significance}"),
            kind: InsightKind::Breakthrough,
            domain: "Deep Analysis".into(),
            significance,
            related_concepts: vec!["Complexity".into()],
            implications: vec!["Paradigm shift potential".into()],
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn recent_thoughts_limited_and_descending() {
        let store = store();
        let base = Utc::now();
        for i in 0..8 {
            let t = thought(&format!("t{i}"), ThoughtKind::Question, "Physics", base + Duration::seconds(i));
            store.append_thought(&t).unwrap();
        }
        let recent = store.thoughts(&ThoughtFilter::default(), 5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "t7");
        for pair in recent.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn same_millisecond_thoughts_keep_insert_order() {
        let store = store();
        let at = Utc::now();
        store.append_thought(&thought("first", ThoughtKind::Insight, "Biology", at)).unwrap();
        store.append_thought(&thought("second", ThoughtKind::Insight, "Biology", at)).unwrap();
        let recent = store.thoughts(&ThoughtFilter::default(), 2).unwrap();
        assert_eq!(recent[0].content, "second");
        assert_eq!(recent[1].content, "first");
    }

    #[test]
    fn thought_filters() {
        let store = store();
        let now = Utc::now();
        store.append_thought(&thought("a", ThoughtKind::Question, "Physics", now)).unwrap();
        store.append_thought(&thought("b", ThoughtKind::Hypothesis, "Physics", now)).unwrap();
        store.append_thought(&thought("c", ThoughtKind::Question, "Biology", now)).unwrap();

        let questions = store
            .thoughts(&ThoughtFilter { kind: Some(ThoughtKind::Question), domain: None }, 10)
            .unwrap();
        assert_eq!(questions.len(), 2);

        let physics_questions = store
            .thoughts(
                &ThoughtFilter { kind: Some(ThoughtKind::Question), domain: Some("Physics".into()) },
                10,
            )
            .unwrap();
        assert_eq!(physics_questions.len(), 1);
        assert_eq!(physics_questions[0].content, "a");
    }

    #[test]
    fn thought_fields_survive_storage() {
        let store = store();
        let mut t = thought("roundtrip", ThoughtKind::Connection, "Mathematics", Utc::now());
        t.evidence = vec!["e1".into()];
        store.append_thought(&t).unwrap();
        let back = &store.thoughts(&ThoughtFilter::default(), 1).unwrap()[0];
        assert_eq!(back.id, t.id);
        assert_eq!(back.kind, ThoughtKind::Connection);
        assert_eq!(back.evidence, vec!["e1".to_string()]);
        assert_eq!(back.timestamp.timestamp_millis(), t.timestamp.timestamp_millis());
    }

    #[test]
    fn top_insights_capped_at_ten_by_significance() {
        let store = store();
        for i in 0..14 {
            store.append_insight(&insight(0.5 + i as f64 * 0.03)).unwrap();
        }
        let top = store.top_insights(TOP_INSIGHTS).unwrap();
        assert_eq!(top.len(), 10);
        for pair in top.windows(2) {
            assert!(pair[0].significance >= pair[1].significance);
        }
    }

    #[test]
    fn knowledge_domain_filter() {
        let store = store();
        store.append_knowledge(&knowledge("Quantum Coherence", "Physics", 0.7)).unwrap();
        store.append_knowledge(&knowledge("Neural Plasticity", "Neuroscience", 0.8)).unwrap();

        assert_eq!(store.knowledge(None).unwrap().len(), 2);
        assert_eq!(store.knowledge(Some("")).unwrap().len(), 2);
        let physics = store.knowledge(Some("Physics")).unwrap();
        assert_eq!(physics.len(), 1);
        assert_eq!(physics[0].concept, "Quantum Coherence");
        assert!(store.knowledge(Some("Alchemy")).unwrap().is_empty());
    }

    #[test]
    fn knowledge_search_is_case_insensitive_and_literal() {
        let store = store();
        store.append_knowledge(&knowledge("Quantum Coherence", "Physics", 0.7)).unwrap();
        store.append_knowledge(&knowledge("Information Integration", "Cognitive Science", 0.9)).unwrap();
        store.append_knowledge(&knowledge("100% Recall", "Memory", 0.6)).unwrap();

        let hits = store.search_knowledge("quantum", None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].concept, "Quantum Coherence");

        let hits = store.search_knowledge("%", None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].concept, "100% Recall");

        let hits = store.search_knowledge("in", Some("Physics"), 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn theories_by_novelty() {
        let store = store();
        for novelty in [0.3, 0.9, 0.6] {
            let now = Utc::now();
            store
                .append_theory(&Theory {
                    id: Uuid::now_v7(),
                    title: format!("theory {novelty}"),
                    description: "d".into(),
                    domain: "AI".into(),
                    hypothesis: "h".into(),
                    evidence: vec![],
                    predictions: vec![],
                    confidence: 0.5,
                    novelty,
                    complexity: 0.5,
                    supporting_thoughts: vec![],
                    contradicting_evidence: vec![],
                    status: TheoryStatus::Forming,
                    created_at: now,
                    last_evolved: now,
                })
                .unwrap();
        }
        let theories = store.theories().unwrap();
        let novelties: Vec<f64> = theories.iter().map(|t| t.novelty).collect();
        assert_eq!(novelties, vec![0.9, 0.6, 0.3]);
    }

    #[test]
    fn counts_per_collection() {
        let store = store();
        store.append_insight(&insight(0.7)).unwrap();
        store.append_knowledge(&knowledge("X", "Y", 0.7)).unwrap();
        let counts = store.counts().unwrap();
        assert_eq!(counts.insights, 1);
        assert_eq!(counts.knowledge, 1);
        assert_eq!(counts.thoughts, 0);
    }
}
