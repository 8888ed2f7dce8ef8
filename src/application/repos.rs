//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use bson::oid::ObjectId;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::listing::ListWindow;
use crate::domain::entities::{MessageRecord, RoomRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate identifier `{id}`")]
    Duplicate { id: String },
    #[error("resource not found")]
    NotFound,
    #[error("entity changed since it was read")]
    StaleWrite,
    #[error("listing exceeded its read deadline")]
    Timeout,
}

impl RepoError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn insert(&self, user: &UserRecord) -> Result<(), RepoError>;

    /// Point lookup; zero matches is the distinguished [`RepoError::NotFound`].
    async fn find_by_id(&self, id: &str) -> Result<UserRecord, RepoError>;

    /// Newest-first listing bounded by the window's threshold and cap.
    async fn list(&self, window: ListWindow) -> Result<Vec<UserRecord>, RepoError>;

    /// Membership listing: ids without a backing document are omitted, in
    /// no guaranteed order.
    async fn list_by_ids(&self, ids: &[String]) -> Result<Vec<UserRecord>, RepoError>;

    /// Compare-and-swap replace guarded on the record's last-read
    /// `updated_at`.
    async fn replace(
        &self,
        user: &UserRecord,
        expected_updated_at: OffsetDateTime,
    ) -> Result<(), RepoError>;

    async fn delete(&self, id: &str) -> Result<(), RepoError>;
}

#[async_trait]
pub trait RoomsRepo: Send + Sync {
    /// Insert and return the store-generated identifier.
    async fn insert(&self, room: &RoomRecord) -> Result<ObjectId, RepoError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<RoomRecord, RepoError>;

    async fn list(&self, window: ListWindow) -> Result<Vec<RoomRecord>, RepoError>;

    /// Bump the room's recency marker after a message lands.
    async fn touch_last_message(&self, id: ObjectId, at: OffsetDateTime) -> Result<(), RepoError>;
}

#[async_trait]
pub trait MessagesRepo: Send + Sync {
    async fn insert(&self, message: &MessageRecord) -> Result<(), RepoError>;

    async fn find_in_room(&self, room_id: ObjectId, id: i64) -> Result<MessageRecord, RepoError>;

    async fn list_room(
        &self,
        room_id: ObjectId,
        window: ListWindow,
    ) -> Result<Vec<MessageRecord>, RepoError>;
}

/// Liveness probe against the backing store, used by the health endpoint.
#[async_trait]
pub trait StorePing: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
