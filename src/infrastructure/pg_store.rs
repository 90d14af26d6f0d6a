use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::deadline::Deadline;
use crate::domain::errors::DomainError;
use crate::domain::pipeline::{Document, Filter};
use crate::domain::ports::{document_id, RecordStore, Update, UpdateOutcome};
use crate::domain::records::Collection;
use crate::schema::records;

use super::models::NewRecordRow;

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::StoreUnavailable(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::StoreUnavailable(e.to_string())
    }
}

// ── Filter translation ────────────────────────────────────────────────────────

/// Equality filters become a JSONB containment document: `a.b = 1` turns into
/// `{"a": {"b": 1}}` and is matched with `body @> ...`.
fn containment(filter: &Filter) -> Value {
    let mut root = Value::Object(Map::new());
    for (path, value) in filter.clauses() {
        let nested = path
            .rsplit('.')
            .fold(value.clone(), |inner, segment| {
                Value::Object(Map::from_iter([(segment.to_string(), inner)]))
            });
        merge(&mut root, nested);
    }
    root
}

fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        into.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

fn into_document(body: Value) -> Result<Document, DomainError> {
    match body {
        Value::Object(doc) => Ok(doc),
        other => Err(DomainError::StoreUnavailable(format!(
            "stored record is not a document: {other}"
        ))),
    }
}

fn new_row(collection: Collection, mut doc: Document) -> Result<NewRecordRow, DomainError> {
    let id = match document_id(&doc)? {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            doc.insert("_id".to_string(), Value::String(id.to_string()));
            id
        }
    };
    Ok(NewRecordRow {
        id,
        collection: collection.as_str().to_string(),
        body: Value::Object(doc),
    })
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Document collections kept in one Postgres JSONB table.
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run `op` in a transaction whose connection checkout and statements are
    /// both cut off at `deadline`.
    fn with_deadline<T>(
        &self,
        deadline: Deadline,
        op: impl FnOnce(&mut PgConnection) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let remaining = deadline.remaining()?;
        let result = self.pool.get_timeout(remaining).map_err(DomainError::from).and_then(
            |mut conn| {
                conn.transaction::<_, DomainError, _>(|conn| {
                    diesel::sql_query(format!(
                        "SET LOCAL statement_timeout = {}",
                        remaining.as_millis().max(1)
                    ))
                    .execute(conn)?;
                    op(conn)
                })
            },
        );
        result.map_err(|e| match e {
            DomainError::StoreUnavailable(_) if deadline.is_expired() => DomainError::Timeout,
            other => other,
        })
    }
}

impl RecordStore for PgRecordStore {
    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError> {
        self.with_deadline(deadline, |conn| {
            records::table
                .filter(records::collection.eq(collection.as_str()))
                .filter(records::body.contains(containment(filter)))
                .order(records::seq.asc())
                .select(records::body)
                .load::<Value>(conn)?
                .into_iter()
                .map(into_document)
                .collect()
        })
    }

    fn insert(
        &self,
        collection: Collection,
        doc: Document,
        deadline: Deadline,
    ) -> Result<Uuid, DomainError> {
        let row = new_row(collection, doc)?;
        self.with_deadline(deadline, |conn| {
            diesel::insert_into(records::table)
                .values(&row)
                .execute(conn)?;
            Ok(row.id)
        })
    }

    fn insert_many(
        &self,
        collection: Collection,
        docs: Vec<Document>,
        deadline: Deadline,
    ) -> Result<Vec<Uuid>, DomainError> {
        let rows = docs
            .into_iter()
            .map(|doc| new_row(collection, doc))
            .collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.with_deadline(deadline, |conn| {
            diesel::insert_into(records::table)
                .values(&rows)
                .execute(conn)?;
            Ok(rows.iter().map(|r| r.id).collect())
        })
    }

    fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        self.with_deadline(deadline, |conn| {
            let target = records::table
                .filter(records::collection.eq(collection.as_str()))
                .filter(records::body.contains(containment(filter)))
                .order(records::seq.asc())
                .select((records::id, records::body))
                .for_update()
                .first::<(Uuid, Value)>(conn)
                .optional()?;

            if let Some((id, body)) = target {
                let mut doc = into_document(body)?;
                let modified = update
                    .set
                    .iter()
                    .any(|(field, value)| doc.get(field) != Some(value));
                doc.extend(update.set.clone());
                diesel::update(records::table.find(id))
                    .set((
                        records::body.eq(Value::Object(doc)),
                        records::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                return Ok(UpdateOutcome {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_id: None,
                });
            }

            if !update.upsert {
                return Ok(UpdateOutcome::default());
            }
            let row = new_row(collection, update.seed_document(filter))?;
            diesel::insert_into(records::table)
                .values(&row)
                .execute(conn)?;
            Ok(UpdateOutcome {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(row.id),
            })
        })
    }

    fn delete(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<u64, DomainError> {
        self.with_deadline(deadline, |conn| {
            let removed = diesel::delete(
                records::table
                    .filter(records::collection.eq(collection.as_str()))
                    .filter(records::body.contains(containment(filter))),
            )
            .execute(conn)?;
            Ok(removed as u64)
        })
    }
}
