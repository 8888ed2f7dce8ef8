//! MongoDB-backed repository implementations.

pub mod entity;
mod messages;
mod rooms;
mod users;

pub use entity::{Entity, EntityCollection, Pagination};

use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use mongodb::{Client, Database};

use crate::application::listing::ListWindow;
use crate::application::repos::{RepoError, StorePing};
use crate::domain::entities::{MessageRecord, RoomRecord, UserRecord};

const USERS_COLLECTION: &str = "users";
const ROOMS_COLLECTION: &str = "rooms";
const MESSAGES_COLLECTION: &str = "messages";

pub struct MongoRepositories {
    users: EntityCollection<UserRecord>,
    rooms: EntityCollection<RoomRecord>,
    messages: EntityCollection<MessageRecord>,
    db: Database,
}

impl MongoRepositories {
    pub async fn connect(url: &str) -> Result<Client, mongodb::error::Error> {
        Client::with_uri_str(url).await
    }

    /// Bind one collection per entity kind. Each [`EntityCollection`] is
    /// owned exclusively by its repository for the process lifetime; only
    /// the client's connection pool is shared underneath.
    pub fn new(
        client: &Client,
        database: &str,
        read_deadline: Duration,
    ) -> Result<Self, RepoError> {
        let db = client.database(database);
        Ok(Self {
            users: EntityCollection::new(db.collection(USERS_COLLECTION), read_deadline)?,
            rooms: EntityCollection::new(db.collection(ROOMS_COLLECTION), read_deadline)?,
            messages: EntityCollection::new(db.collection(MESSAGES_COLLECTION), read_deadline)?,
            db,
        })
    }

    pub async fn health_check(&self) -> Result<(), mongodb::error::Error> {
        self.db.run_command(doc! { "ping": 1 }).await.map(|_| ())
    }
}

#[async_trait]
impl StorePing for MongoRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(RepoError::unavailable)
    }
}

/// Creation-time threshold shared by the user and room listings: strictly
/// newer than `from_ts`, or everything when no threshold was given.
pub(crate) fn window_filter(window: &ListWindow) -> Document {
    match window.from_ts {
        Some(from_ts) => doc! {
            "created_at": { "$gt": bson::DateTime::from_time_0_3(from_ts) },
        },
        None => doc! {},
    }
}

impl Entity for UserRecord {
    fn id(&self) -> Bson {
        Bson::String(self.id.clone())
    }
}

impl Entity for RoomRecord {
    fn id(&self) -> Bson {
        self.id.map(Bson::ObjectId).unwrap_or(Bson::Null)
    }
}

impl Entity for MessageRecord {
    fn id(&self) -> Bson {
        Bson::Int64(self.id)
    }
}
