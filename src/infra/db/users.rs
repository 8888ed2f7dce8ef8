use async_trait::async_trait;
use bson::{Bson, doc};
use time::OffsetDateTime;

use crate::application::listing::ListWindow;
use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

use super::entity::Pagination;
use super::{MongoRepositories, window_filter};

#[async_trait]
impl UsersRepo for MongoRepositories {
    async fn insert(&self, user: &UserRecord) -> Result<(), RepoError> {
        self.users.add(user).await.map(|_| ())
    }

    async fn find_by_id(&self, id: &str) -> Result<UserRecord, RepoError> {
        self.users.find_one(doc! { "_id": id }).await
    }

    async fn list(&self, window: ListWindow) -> Result<Vec<UserRecord>, RepoError> {
        self.users
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

    async fn list_by_ids(&self, ids: &[String]) -> Result<Vec<UserRecord>, RepoError> {
        // The array value becomes an `$in` membership test downstream; ids
        // with no backing document are simply absent from the result.
        self.users
            .find_all(
                doc! { "_id": ids.to_vec() },
                doc! { "created_at": -1 },
                Pagination::default(),
            )
            .await
    }

    async fn replace(
        &self,
        user: &UserRecord,
        expected_updated_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        self.users
            .replace_if_unchanged(user, expected_updated_at)
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), RepoError> {
        self.users.delete(Bson::String(id.to_owned())).await
    }
}
