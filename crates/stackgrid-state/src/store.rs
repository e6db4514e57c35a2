//! IntentStore: redb-backed journal of lifecycle sequences.
//!
//! Values are JSON-serialized `StackIntent`s. Ids come from a counter in
//! the `meta` table, bumped in the same write transaction that inserts the
//! intent, so ids are unique and increasing across reopen.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

#[derive(Clone)]
pub struct IntentStore {
    db: Arc<Database>,
}

impl IntentStore {
    /// Open (or create) a persistent intent log at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "intent log opened");
        Ok(store)
    }

    /// Ephemeral in-memory intent log.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory intent log opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(INTENTS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Record a new `Pending` intent and return it with its assigned id.
    pub fn begin(
        &self,
        verb: IntentVerb,
        tenant_id: &str,
        version: &str,
        detail: Option<&str>,
    ) -> StateResult<StackIntent> {
        let now = epoch_secs();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let intent;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let last = meta
                .get(INTENT_SEQ_KEY)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            let id = last + 1;
            meta.insert(INTENT_SEQ_KEY, id).map_err(map_err!(Write))?;

            intent = StackIntent {
                id,
                verb,
                tenant_id: tenant_id.to_string(),
                version: version.to_string(),
                status: IntentStatus::Pending,
                detail: detail.map(str::to_string),
                created_at: now,
                updated_at: now,
            };
            let value = serde_json::to_vec(&intent).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(INTENTS).map_err(map_err!(Table))?;
            table
                .insert(intent.table_key().as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = intent.id, verb = %verb, tenant_id, version, "intent opened");
        Ok(intent)
    }

    /// Close an intent as `Completed`, optionally replacing its detail.
    pub fn complete(&self, id: IntentId, detail: Option<&str>) -> StateResult<StackIntent> {
        self.update(id, |intent| {
            intent.status = IntentStatus::Completed;
            if let Some(d) = detail {
                intent.detail = Some(d.to_string());
            }
        })
    }

    /// Close an intent as `Failed`.
    pub fn fail(&self, id: IntentId, reason: &str) -> StateResult<StackIntent> {
        self.update(id, |intent| {
            intent.status = IntentStatus::Failed {
                reason: reason.to_string(),
            };
        })
    }

    fn update(&self, id: IntentId, apply: impl FnOnce(&mut StackIntent)) -> StateResult<StackIntent> {
        let key = intent_key(id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let intent;
        {
            let mut table = txn.open_table(INTENTS).map_err(map_err!(Table))?;
            let raw = table
                .get(key.as_str())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec())
                .ok_or(StateError::NotFound(id))?;
            let mut current: StackIntent =
                serde_json::from_slice(&raw).map_err(map_err!(Deserialize))?;
            apply(&mut current);
            current.updated_at = epoch_secs();

            let value = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            intent = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, status = ?intent.status, "intent updated");
        Ok(intent)
    }

    pub fn get(&self, id: IntentId) -> StateResult<Option<StackIntent>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INTENTS).map_err(map_err!(Table))?;
        match table.get(intent_key(id).as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let intent: StackIntent =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(intent))
            }
            None => Ok(None),
        }
    }

    /// All intents, oldest first.
    pub fn list(&self) -> StateResult<Vec<StackIntent>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INTENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let intent: StackIntent =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(intent);
        }
        Ok(results)
    }

    /// Sequences that never closed, oldest first.
    pub fn pending(&self) -> StateResult<Vec<StackIntent>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|i| i.status.is_pending())
            .collect())
    }

    /// Drop every closed intent. Returns how many were removed.
    pub fn prune_finished(&self) -> StateResult<u32> {
        let finished: Vec<String> = self
            .list()?
            .iter()
            .filter(|i| !i.status.is_pending())
            .map(StackIntent::table_key)
            .collect();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut removed = 0u32;
        {
            let mut table = txn.open_table(INTENTS).map_err(map_err!(Table))?;
            for key in &finished {
                if table.remove(key.as_str()).map_err(map_err!(Write))?.is_some() {
                    removed += 1;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(removed, "finished intents pruned");
        Ok(removed)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
