use async_trait::async_trait;
use bson::doc;
use bson::oid::ObjectId;

use crate::application::listing::ListWindow;
use crate::application::repos::{MessagesRepo, RepoError};
use crate::domain::entities::{MessageRecord, format_rfc3339};

use super::MongoRepositories;
use super::entity::Pagination;

#[async_trait]
impl MessagesRepo for MongoRepositories {
    async fn insert(&self, message: &MessageRecord) -> Result<(), RepoError> {
        self.messages.add(message).await.map(|_| ())
    }

    async fn find_in_room(&self, room_id: ObjectId, id: i64) -> Result<MessageRecord, RepoError> {
        self.messages
            .find_one(doc! { "_id": id, "room_id": room_id })
            .await
    }

    async fn list_room(
        &self,
        room_id: ObjectId,
        window: ListWindow,
    ) -> Result<Vec<MessageRecord>, RepoError> {
        let mut filter = doc! { "room_id": room_id };
        if let Some(from_ts) = window.from_ts {
            // Message creation times are RFC3339 strings; with a fixed UTC
            // offset their lexicographic order is chronological.
            filter.insert("created_at", doc! { "$gt": format_rfc3339(from_ts) });
        }
        self.messages
            .find_all(
                filter,
                doc! { "created_at": -1, "_id": -1 },
                Pagination {
                    offset: 0,
                    limit: window.effective_limit(),
                },
            )
            .await
    }
}
