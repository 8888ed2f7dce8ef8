//! Entity-shape-agnostic access to one document collection.
//!
//! Everything entity-specific (collection binding, filter contents, sort
//! keys, page defaults) stays with the per-entity repository; this layer
//! only translates manager-level calls into driver calls and maps driver
//! failures onto the repository error vocabulary.

use std::time::Duration;

use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Collection, Cursor};
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::application::repos::RepoError;

/// Capability contract a stored entity exposes to [`EntityCollection`]:
/// serde marshalling plus an identifier accessor. No hierarchy, just the
/// minimum the generic operations need.
pub trait Entity: Serialize + DeserializeOwned + Unpin + Send + Sync {
    /// The value stored under `_id`.
    fn id(&self) -> Bson;
}

/// Skip/limit window translated onto a store query. A `limit` of zero means
/// "no cap from this caller" and leaves the query unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pagination {
    pub offset: u64,
    pub limit: i64,
}

pub struct EntityCollection<T: Send + Sync> {
    collection: Collection<T>,
    read_deadline: Duration,
}

impl<T: Entity> EntityCollection<T> {
    pub fn new(collection: Collection<T>, read_deadline: Duration) -> Result<Self, RepoError> {
        if collection.name().is_empty() {
            return Err(RepoError::unavailable("collection name is empty"));
        }
        Ok(Self {
            collection,
            read_deadline,
        })
    }

    /// Insert one document; the identifier the store settled on comes back.
    pub async fn add(&self, entity: &T) -> Result<Bson, RepoError> {
        match self.collection.insert_one(entity).await {
            Ok(outcome) => Ok(outcome.inserted_id),
            Err(err) if is_duplicate_key(&err) => Err(RepoError::Duplicate {
                id: entity.id().to_string(),
            }),
            Err(err) => Err(RepoError::unavailable(err)),
        }
    }

    /// First match, with zero matches as the distinguished
    /// [`RepoError::NotFound`] rather than a transport failure.
    pub async fn find_one(&self, filter: Document) -> Result<T, RepoError> {
        self.collection
            .find_one(normalize_filter(filter))
            .await
            .map_err(RepoError::unavailable)?
            .ok_or(RepoError::NotFound)
    }

    /// Lazy, forward-only cursor over matching documents. Sort keys apply in
    /// insertion order: the first key is primary, later keys break ties. A
    /// well-formed query with zero matches yields an empty cursor.
    pub async fn find(
        &self,
        filter: Document,
        sort: Document,
        page: Pagination,
    ) -> Result<Cursor<T>, RepoError> {
        let mut find = self.collection.find(normalize_filter(filter)).sort(sort);
        if page.offset > 0 {
            find = find.skip(page.offset);
        }
        if page.limit > 0 {
            find = find.limit(page.limit);
        }
        find.await.map_err(RepoError::unavailable)
    }

    /// Run a listing and drain it under the collection's read deadline.
    pub async fn find_all(
        &self,
        filter: Document,
        sort: Document,
        page: Pagination,
    ) -> Result<Vec<T>, RepoError> {
        let cursor = self.find(filter, sort, page).await?;
        drain_within(self.read_deadline, cursor).await
    }

    /// Replace `entity` only if the stored copy still carries
    /// `expected_updated_at`. A missed guard on an existing document is a
    /// stale write; a missed guard on no document at all is not-found.
    pub async fn replace_if_unchanged(
        &self,
        entity: &T,
        expected_updated_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let guard = doc! {
            "_id": entity.id(),
            "updated_at": bson::DateTime::from_time_0_3(expected_updated_at),
        };
        let outcome = self
            .collection
            .replace_one(guard, entity)
            .await
            .map_err(RepoError::unavailable)?;
        if outcome.matched_count > 0 {
            return Ok(());
        }

        let exists = self
            .collection
            .find_one(doc! { "_id": entity.id() })
            .await
            .map_err(RepoError::unavailable)?;
        match exists {
            Some(_) => Err(RepoError::StaleWrite),
            None => Err(RepoError::NotFound),
        }
    }

    /// Partial update of named fields, without the version guard.
    pub async fn set_fields(&self, id: Bson, fields: Document) -> Result<(), RepoError> {
        let outcome = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": fields })
            .await
            .map_err(RepoError::unavailable)?;
        if outcome.matched_count == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    pub async fn delete(&self, id: Bson) -> Result<(), RepoError> {
        let outcome = self
            .collection
            .delete_one(doc! { "_id": id })
            .await
            .map_err(RepoError::unavailable)?;
        if outcome.deleted_count == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

/// Rewrite sequence-valued filter entries to membership tests: filtering a
/// field by a set of values means "any of these", not equality against an
/// array. Operator documents and scalars pass through untouched.
pub fn normalize_filter(filter: Document) -> Document {
    filter
        .into_iter()
        .map(|(key, value)| match value {
            Bson::Array(values) => (key, Bson::Document(doc! { "$in": values })),
            other => (key, other),
        })
        .collect()
}

/// Drain a document stream, bounding total wall-clock cost. On expiry the
/// stream is dropped, which releases the server-side cursor; the same holds
/// on the error path.
pub(crate) async fn drain_within<S, T>(deadline: Duration, stream: S) -> Result<Vec<T>, RepoError>
where
    S: futures::TryStream<Ok = T, Error = mongodb::error::Error> + Unpin,
{
    let drain = async move {
        let mut stream = stream;
        let mut items = Vec::new();
        while let Some(item) = stream.try_next().await.map_err(RepoError::unavailable)? {
            items.push(item);
        }
        Ok(items)
    };
    match tokio::time::timeout(deadline, drain).await {
        Ok(result) => result,
        Err(_) => Err(RepoError::Timeout),
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}
