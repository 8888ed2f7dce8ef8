use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::application::listing::ListWindow;
use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::custom_data::CustomData;
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("`{0}` is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct CreateUserCommand {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub custom_data: CustomData,
}

#[derive(Debug, Clone)]
pub struct UpdateUserCommand {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub custom_data: CustomData,
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UsersRepo>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepo>) -> Self {
        Self { repo }
    }

    pub async fn create_user(&self, command: CreateUserCommand) -> Result<UserRecord, UserError> {
        ensure_non_empty(&command.id, "id")?;
        ensure_non_empty(&command.name, "name")?;

        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: command.id,
            name: command.name,
            avatar_url: command.avatar_url,
            custom_data: command.custom_data,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert(&user).await?;
        Ok(user)
    }

    /// Create batch members one at a time; the first failure aborts the
    /// remainder, leaving earlier members in place.
    pub async fn create_users(
        &self,
        commands: Vec<CreateUserCommand>,
    ) -> Result<Vec<UserRecord>, UserError> {
        let mut created = Vec::with_capacity(commands.len());
        for command in commands {
            created.push(self.create_user(command).await?);
        }
        Ok(created)
    }

    pub async fn get_user(&self, id: &str) -> Result<UserRecord, UserError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    pub async fn list_users(&self, window: ListWindow) -> Result<Vec<UserRecord>, UserError> {
        Ok(self.repo.list(window).await?)
    }

    pub async fn list_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRecord>, UserError> {
        Ok(self.repo.list_by_ids(ids).await?)
    }

    /// Replace the mutable attributes, guarded against concurrent edits: the
    /// write only lands if the record still carries the `updated_at` we read.
    pub async fn update_user(&self, command: UpdateUserCommand) -> Result<UserRecord, UserError> {
        ensure_non_empty(&command.name, "name")?;

        let existing = self.repo.find_by_id(&command.id).await?;
        let mut user = existing.clone();
        user.name = command.name;
        user.avatar_url = command.avatar_url;
        user.custom_data = command.custom_data;
        user.updated_at = OffsetDateTime::now_utc();

        self.repo.replace(&user, existing.updated_at).await?;
        Ok(user)
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), UserError> {
        Ok(self.repo.delete(id).await?)
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), UserError> {
    if value.trim().is_empty() {
        return Err(UserError::MissingField(field));
    }
    Ok(())
}
