//! Storage layer: redb (cognitive state) + rusqlite (record collections).

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use redb::{Database, ReadableTable, TableDefinition};
use rusqlite::Connection;
use std::sync::Arc;

use cogito_types::CognitiveState;

use crate::config::{LevelsConfig, StorageConfig};

// ── redb table definitions ──────────────────────────────────────────

/// Singleton cognitive state, stored as JSON under [`STATE_KEY`].
const STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cognitive_state");

const STATE_KEY: &str = "singleton";

/// The unified storage backend.
pub struct Storage {
    /// redb key-value database.
    pub kv: Database,
    /// rusqlite relational database.
    pub db: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Initialize storage, creating databases and tables as needed.
    pub fn init(config: &StorageConfig) -> Result<Self> {
        // Ensure parent directories exist.
        if let Some(parent) = config.redb_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create dir: {}", parent.display()))?;
        }
        if let Some(parent) = config.sqlite_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create dir: {}", parent.display()))?;
        }

        let kv = Database::create(&config.redb_path)
            .with_context(|| format!("failed to open redb at {}", config.redb_path.display()))?;
        {
            let write_txn = kv.begin_write()?;
            {
                let _ = write_txn.open_table(STATE_TABLE)?;
            }
            write_txn.commit()?;
        }

        let db = Connection::open(&config.sqlite_path)
            .with_context(|| format!("failed to open sqlite at {}", config.sqlite_path.display()))?;
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        create_schema(&db)?;

        Ok(Self {
            kv,
            db: Arc::new(Mutex::new(db)),
        })
    }

    // ── Cognitive state ─────────────────────────────────────────────

    /// Create the singleton state if it does not exist yet and return it.
    pub fn initialize_state(&self, levels: &LevelsConfig) -> Result<CognitiveState> {
        let write_txn = self.kv.begin_write()?;
        let state = {
            let mut table = write_txn.open_table(STATE_TABLE)?;
            let existing = table.get(STATE_KEY)?.map(|v| v.value().to_vec());
            match existing {
                Some(bytes) => serde_json::from_slice(&bytes)
                    .context("stored cognitive state is corrupt")?,
                None => {
                    let fresh = CognitiveState::new(
                        levels.learning_rate,
                        levels.creativity_level,
                        levels.curiosity_level,
                    );
                    let bytes = serde_json::to_vec(&fresh)?;
                    table.insert(STATE_KEY, bytes.as_slice())?;
                    tracing::info!("cognitive state created");
                    fresh
                }
            }
        };
        write_txn.commit()?;
        Ok(state)
    }

    /// Read the current state.
    pub fn load_state(&self) -> Result<CognitiveState> {
        let read_txn = self.kv.begin_read()?;
        let table = read_txn.open_table(STATE_TABLE)?;
        let bytes = table
            .get(STATE_KEY)?
            .map(|v| v.value().to_vec())
            .ok_or_else(|| anyhow!("cognitive state not initialized"))?;
        serde_json::from_slice(&bytes).context("stored cognitive state is corrupt")
    }

    /// Read-modify-write the state inside one redb write transaction.
    ///
    /// redb admits a single writer at a time, so everything `f` does is atomic
    /// with respect to every other state mutation. If `f` fails the
    /// transaction is aborted and the state is left untouched.
    pub fn transact<T>(&self, f: impl FnOnce(&mut CognitiveState) -> Result<T>) -> Result<T> {
        let write_txn = self.kv.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(STATE_TABLE)?;
            let bytes = table
                .get(STATE_KEY)?
                .map(|v| v.value().to_vec())
                .ok_or_else(|| anyhow!("cognitive state not initialized"))?;
            let mut state: CognitiveState =
                serde_json::from_slice(&bytes).context("stored cognitive state is corrupt")?;
            match f(&mut state) {
                Ok(out) => {
                    let bytes = serde_json::to_vec(&state)?;
                    table.insert(STATE_KEY, bytes.as_slice())?;
                    Ok(out)
                }
                Err(e) => Err(e),
            }
        };
        match outcome {
            Ok(out) => {
                write_txn.commit()?;
                Ok(out)
            }
            Err(e) => {
                write_txn.abort()?;
                Err(e)
            }
        }
    }

    /// Like [`Storage::transact`], with `f` also appending records through an
    /// open SQLite transaction.
    ///
    /// The SQLite transaction commits only after the state commit succeeds, so
    /// a failed step leaves neither records nor counters behind. If the SQLite
    /// commit itself fails after the state committed, the counters stay
    /// ahead of the records; that failure is returned to the caller.
    pub fn transact_with_records<T>(
        &self,
        f: impl FnOnce(&mut CognitiveState, &Connection) -> Result<T>,
    ) -> Result<T> {
        let db = self.db.lock();
        let tx = db.unchecked_transaction()?;
        let out = self.transact(|state| f(state, &tx))?;
        tx.commit().context("record commit failed after state commit")?;
        Ok(out)
    }
}

/// Create the append-only record tables and their secondary indexes.
pub(crate) fn create_schema(db: &Connection) -> Result<()> {
    db.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS thoughts (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            kind TEXT NOT NULL,
            domain TEXT NOT NULL,
            confidence REAL NOT NULL,
            complexity REAL NOT NULL,
            novelty REAL NOT NULL,
            reasoning TEXT NOT NULL,
            parent_thought_id TEXT,
            related_thoughts TEXT NOT NULL DEFAULT '[]',
            evidence TEXT NOT NULL DEFAULT '[]',
            timestamp INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS knowledge (
            id TEXT PRIMARY KEY,
            concept TEXT NOT NULL,
            definition TEXT NOT NULL,
            domain TEXT NOT NULL,
            connections TEXT NOT NULL DEFAULT '[]',
            confidence REAL NOT NULL,
            source TEXT NOT NULL,
            last_updated INTEGER NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS theories (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            domain TEXT NOT NULL,
            hypothesis TEXT NOT NULL,
            evidence TEXT NOT NULL DEFAULT '[]',
            predictions TEXT NOT NULL DEFAULT '[]',
            confidence REAL NOT NULL,
            novelty REAL NOT NULL,
            complexity REAL NOT NULL,
            supporting_thoughts TEXT NOT NULL DEFAULT '[]',
            contradicting_evidence TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'forming',
            created_at INTEGER NOT NULL,
            last_evolved INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS insights (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            kind TEXT NOT NULL,
            domain TEXT NOT NULL,
            significance REAL NOT NULL,
            related_concepts TEXT NOT NULL DEFAULT '[]',
            implications TEXT NOT NULL DEFAULT '[]',
            discovered_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_thoughts_kind ON thoughts(kind);
        CREATE INDEX IF NOT EXISTS idx_thoughts_domain ON thoughts(domain);
        CREATE INDEX IF NOT EXISTS idx_thoughts_timestamp ON thoughts(timestamp);
        CREATE INDEX IF NOT EXISTS idx_thoughts_novelty ON thoughts(novelty);
        CREATE INDEX IF NOT EXISTS idx_thoughts_confidence ON thoughts(confidence);
        CREATE INDEX IF NOT EXISTS idx_knowledge_domain ON knowledge(domain);
        CREATE INDEX IF NOT EXISTS idx_knowledge_confidence ON knowledge(confidence);
        CREATE INDEX IF NOT EXISTS idx_knowledge_concept ON knowledge(concept);
        CREATE INDEX IF NOT EXISTS idx_theories_domain ON theories(domain);
        CREATE INDEX IF NOT EXISTS idx_theories_novelty ON theories(novelty);
        CREATE INDEX IF NOT EXISTS idx_theories_confidence ON theories(confidence);
        CREATE INDEX IF NOT EXISTS idx_theories_status ON theories(status);
        CREATE INDEX IF NOT EXISTS idx_insights_significance ON insights(significance);
        CREATE INDEX IF NOT EXISTS idx_insights_kind ON insights(kind);
        CREATE INDEX IF NOT EXISTS idx_insights_domain ON insights(domain);
        ",
    )?;
    Ok(())
}

/// Fresh storage in a temporary directory, for tests across the crate.
#[cfg(test)]
pub(crate) fn test_storage() -> (tempfile::TempDir, Storage) {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        redb_path: dir.path().join("state.redb"),
        sqlite_path: dir.path().join("records.sqlite"),
        journal_dir: dir.path().join("journal"),
        journal_max_size: 1024 * 1024,
    };
    let storage = Storage::init(&config).unwrap();
    storage.initialize_state(&LevelsConfig::default()).unwrap();
    (dir, storage)
}
