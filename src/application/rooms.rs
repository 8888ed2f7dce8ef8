use std::sync::Arc;

use bson::oid::ObjectId;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::listing::ListWindow;
use crate::application::repos::{RepoError, RoomsRepo};
use crate::domain::custom_data::CustomData;
use crate::domain::entities::RoomRecord;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("`{0}` is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct CreateRoomCommand {
    pub name: String,
    pub private: bool,
    pub push_notification_title_override: String,
    pub created_by_id: String,
    pub custom_data: CustomData,
}

#[derive(Clone)]
pub struct RoomService {
    repo: Arc<dyn RoomsRepo>,
}

impl RoomService {
    pub fn new(repo: Arc<dyn RoomsRepo>) -> Self {
        Self { repo }
    }

    pub async fn create_room(&self, command: CreateRoomCommand) -> Result<RoomRecord, RoomError> {
        ensure_non_empty(&command.name, "name")?;
        ensure_non_empty(&command.created_by_id, "created_by_id")?;

        let now = OffsetDateTime::now_utc();
        let mut room = RoomRecord {
            id: None,
            name: command.name,
            private: command.private,
            push_notification_title_override: command.push_notification_title_override,
            created_by_id: command.created_by_id,
            // The epoch marks "no messages yet"; the first send bumps it.
            last_message_at: OffsetDateTime::UNIX_EPOCH,
            created_at: now,
            updated_at: now,
            custom_data: command.custom_data,
        };
        room.id = Some(self.repo.insert(&room).await?);
        Ok(room)
    }

    pub async fn get_room(&self, id: ObjectId) -> Result<RoomRecord, RoomError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    pub async fn list_rooms(&self, window: ListWindow) -> Result<Vec<RoomRecord>, RoomError> {
        Ok(self.repo.list(window).await?)
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), RoomError> {
    if value.trim().is_empty() {
        return Err(RoomError::MissingField(field));
    }
    Ok(())
}
