use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, doc};
use time::OffsetDateTime;

use crate::application::listing::ListWindow;
use crate::application::repos::{RepoError, RoomsRepo};
use crate::domain::entities::RoomRecord;

use super::entity::Pagination;
use super::{MongoRepositories, window_filter};

#[async_trait]
impl RoomsRepo for MongoRepositories {
    async fn insert(&self, room: &RoomRecord) -> Result<ObjectId, RepoError> {
        match self.rooms.add(room).await? {
            Bson::ObjectId(id) => Ok(id),
            other => Err(RepoError::Unavailable(format!(
                "store returned a non-object id: {other}"
            ))),
        }
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<RoomRecord, RepoError> {
        self.rooms.find_one(doc! { "_id": id }).await
    }

    async fn list(&self, window: ListWindow) -> Result<Vec<RoomRecord>, RepoError> {
        self.rooms
            .find_all(
                window_filter(&window),
                doc! { "created_at": -1 },
                Pagination {
                    offset: 0,
                    limit: window.effective_limit(),
                },
            )
            .await
    }

    async fn touch_last_message(&self, id: ObjectId, at: OffsetDateTime) -> Result<(), RepoError> {
        self.rooms
            .set_fields(
                Bson::ObjectId(id),
                doc! { "last_message_at": bson::DateTime::from_time_0_3(at) },
            )
            .await
    }
}
