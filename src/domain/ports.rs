use serde_json::Value;
use uuid::Uuid;

use super::deadline::Deadline;
use super::errors::DomainError;
use super::pipeline::{Document, Filter, JoinSource, Pipeline};
use super::records::{Collection, Record};

/// Field-level change applied by [`RecordStore::update`]. Nothing is ever
/// replaced wholesale: `set` overwrites the named fields only.
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub set: Document,
    /// Written only when the update inserts a new record.
    pub set_on_insert: Document,
    pub upsert: bool,
}

impl Update {
    pub fn upsert() -> Self {
        Self {
            upsert: true,
            ..Self::default()
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    pub fn set_on_insert(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set_on_insert.insert(field.to_string(), value.into());
        self
    }

    /// Build the document an upsert inserts: filter equalities, then
    /// `set_on_insert`, then `set`.
    pub fn seed_document(&self, filter: &Filter) -> Document {
        let mut doc: Document = filter
            .clauses()
            .iter()
            .filter(|(path, _)| !path.contains('.'))
            .cloned()
            .collect();
        doc.extend(self.set_on_insert.clone());
        doc.extend(self.set.clone());
        doc
    }
}

/// Counts reported by [`RecordStore::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Uuid>,
}

/// Document store holding the restaurant collections. Every call is bound to
/// the caller's deadline and every write is visible to the next read.
pub trait RecordStore: Send + Sync + 'static {
    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError>;

    /// Store `doc`, generating `_id` when it has none, and return the `_id`.
    fn insert(
        &self,
        collection: Collection,
        doc: Document,
        deadline: Deadline,
    ) -> Result<Uuid, DomainError>;

    /// Store all of `docs` in a single call.
    fn insert_many(
        &self,
        collection: Collection,
        docs: Vec<Document>,
        deadline: Deadline,
    ) -> Result<Vec<Uuid>, DomainError>;

    /// Apply `update` to the first record matching `filter`.
    fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError>;

    /// Remove every matching record. Only used to undo a partially failed
    /// multi-record write.
    fn delete(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<u64, DomainError>;

    fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<Document, DomainError> {
        self.find(collection, filter, deadline)?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(collection.to_string()))
    }

    fn aggregate(
        &self,
        collection: Collection,
        pipeline: &Pipeline,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError> {
        pipeline.run(self, collection, deadline)
    }
}

impl<S: RecordStore + ?Sized> JoinSource for S {
    fn fetch(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError> {
        self.find(collection, filter, deadline)
    }
}

pub(crate) fn document_id(doc: &Document) -> Result<Option<Uuid>, DomainError> {
    match doc.get("_id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|e| DomainError::Validation(format!("invalid _id '{raw}': {e}"))),
        Some(other) => Err(DomainError::Validation(format!(
            "_id must be a string, got {other}"
        ))),
    }
}

pub fn to_document<R: Record>(record: &R) -> Result<Document, DomainError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(mut doc)) => {
            doc.insert("_id".to_string(), Value::String(record.id().to_string()));
            Ok(doc)
        }
        Ok(other) => Err(DomainError::Validation(format!(
            "{} record serialized to {other}",
            R::COLLECTION
        ))),
        Err(e) => Err(DomainError::Validation(e.to_string())),
    }
}

pub fn from_document<R: Record>(doc: Document) -> Result<R, DomainError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| {
        DomainError::StoreUnavailable(format!("malformed {} record: {e}", R::COLLECTION))
    })
}

/// Decode the documents of a listing. A document that is not a complete
/// record, such as one seeded by an upsert that never set the required
/// fields, is logged and left out instead of failing the whole listing.
pub fn from_listed<R: Record>(docs: impl IntoIterator<Item = Value>) -> Vec<R> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<R>(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping incomplete {} record: {e}", R::COLLECTION);
                None
            }
        })
        .collect()
}

/// Typed access on top of the document-level [`RecordStore`] calls.
pub trait TypedStore: RecordStore {
    fn insert_record<R: Record>(&self, record: &R, deadline: Deadline) -> Result<Uuid, DomainError> {
        self.insert(R::COLLECTION, to_document(record)?, deadline)
    }

    fn insert_records<R: Record>(
        &self,
        records: &[R],
        deadline: Deadline,
    ) -> Result<Vec<Uuid>, DomainError> {
        let docs = records
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>, _>>()?;
        self.insert_many(R::COLLECTION, docs, deadline)
    }

    fn get_record<R: Record>(&self, id: Uuid, deadline: Deadline) -> Result<R, DomainError> {
        let doc = self.find_one(
            R::COLLECTION,
            &Filter::eq(R::ID_FIELD, id.to_string()),
            deadline,
        )?;
        from_document(doc)
    }

    fn find_records<R: Record>(
        &self,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<Vec<R>, DomainError> {
        let docs = self.find(R::COLLECTION, filter, deadline)?;
        Ok(from_listed(docs.into_iter().map(Value::Object)))
    }

    /// Catalog lookup used to check a foreign reference before a write:
    /// a miss is reported as `ReferenceNotFound`, not `NotFound`.
    fn resolve<R: Record>(&self, id: Uuid, deadline: Deadline) -> Result<R, DomainError> {
        self.get_record(id, deadline).map_err(|e| match e {
            DomainError::NotFound(_) => {
                DomainError::ReferenceNotFound(format!("{} '{id}'", R::COLLECTION))
            }
            other => other,
        })
    }

    fn update_record<R: Record>(
        &self,
        id: Uuid,
        update: &Update,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        let update = update.clone().set_on_insert("_id", id.to_string());
        self.update(
            R::COLLECTION,
            &Filter::eq(R::ID_FIELD, id.to_string()),
            &update,
            deadline,
        )
    }
}

impl<S: RecordStore + ?Sized> TypedStore for S {}
