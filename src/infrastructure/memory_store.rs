use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde_json::Value;
use uuid::Uuid;

use crate::domain::deadline::Deadline;
use crate::domain::errors::DomainError;
use crate::domain::pipeline::{Document, Filter};
use crate::domain::ports::{document_id, RecordStore, Update, UpdateOutcome};
use crate::domain::records::Collection;

/// Process-local document store. Keeps insertion order per collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> DomainError {
        DomainError::StoreUnavailable("memory store lock poisoned".to_string())
    }
}

fn with_id(mut doc: Document) -> Result<(Uuid, Document), DomainError> {
    let id = match document_id(&doc)? {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            doc.insert("_id".to_string(), Value::String(id.to_string()));
            id
        }
    };
    Ok((id, doc))
}

impl RecordStore for MemoryStore {
    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError> {
        deadline.remaining()?;
        let collections = self.collections.read().map_err(Self::poisoned)?;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn insert(
        &self,
        collection: Collection,
        doc: Document,
        deadline: Deadline,
    ) -> Result<Uuid, DomainError> {
        Ok(self.insert_many(collection, vec![doc], deadline)?.remove(0))
    }

    fn insert_many(
        &self,
        collection: Collection,
        docs: Vec<Document>,
        deadline: Deadline,
    ) -> Result<Vec<Uuid>, DomainError> {
        deadline.remaining()?;
        let prepared = docs
            .into_iter()
            .map(with_id)
            .collect::<Result<Vec<_>, _>>()?;
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        let stored = collections.entry(collection).or_default();

        // The whole batch is checked before anything is written.
        let mut taken: HashSet<Uuid> = stored
            .iter()
            .filter_map(|d| document_id(d).ok().flatten())
            .collect();
        for (id, _) in &prepared {
            if !taken.insert(*id) {
                return Err(DomainError::Validation(format!(
                    "duplicate _id {id} in {collection}"
                )));
            }
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for (id, doc) in prepared {
            ids.push(id);
            stored.push(doc);
        }
        Ok(ids)
    }

    fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        deadline.remaining()?;
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        let stored = collections.entry(collection).or_default();

        if let Some(existing) = stored.iter_mut().find(|d| filter.matches(d)) {
            let modified = update
                .set
                .iter()
                .any(|(field, value)| existing.get(field) != Some(value));
            existing.extend(update.set.clone());
            return Ok(UpdateOutcome {
                matched_count: 1,
                modified_count: u64::from(modified),
                upserted_id: None,
            });
        }

        if !update.upsert {
            return Ok(UpdateOutcome::default());
        }
        let (id, doc) = with_id(update.seed_document(filter))?;
        stored.push(doc);
        Ok(UpdateOutcome {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(id),
        })
    }

    fn delete(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<u64, DomainError> {
        deadline.remaining()?;
        let mut collections = self.collections.write().map_err(Self::poisoned)?;
        let Some(stored) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|d| !filter.matches(d));
        Ok((before - stored.len()) as u64)
    }
}
