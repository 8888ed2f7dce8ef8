//! Redis-backed message cache adapter.
//!
//! Cache trouble is never an operation failure: every Redis error here
//! degrades to a store round-trip (a miss or a skipped write), logged and
//! counted, and the caller proceeds as if no cache were configured.
//!
//! Listing entries are indexed per room in a Redis set so a write can
//! invalidate them with one membership read and one delete, no scanning.

use std::time::Duration;

use async_trait::async_trait;
use bson::oid::ObjectId;
use metrics::counter;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::warn;

use crate::application::messages::{ListingKey, MessageCache};
use crate::domain::entities::MessageRecord;

pub struct RedisMessageCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisMessageCache {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, ttl })
    }

    fn degraded(stage: &'static str, err: &redis::RedisError) {
        counter!("brusio_cache_degraded_total").increment(1);
        warn!(
            target: "brusio::cache",
            stage,
            error = %err,
            "message cache degraded; falling back to the store"
        );
    }
}

fn listing_entry_key(key: &ListingKey) -> String {
    format!(
        "messages:{}:{}:{}",
        key.room_id().to_hex(),
        key.from_ts().unwrap_or("-"),
        key.limit()
    )
}

fn listing_index_key(room_id: ObjectId) -> String {
    format!("messages:{}:keys", room_id.to_hex())
}

fn message_key(room_id: ObjectId, id: i64) -> String {
    format!("message:{}:{}", room_id.to_hex(), id)
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, payload: &[u8]) -> Option<T> {
    match serde_json::from_slice(payload) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                target: "brusio::cache",
                key,
                error = %err,
                "dropping undecodable cache entry"
            );
            None
        }
    }
}

#[async_trait]
impl MessageCache for RedisMessageCache {
    async fn listing(&self, key: &ListingKey) -> Option<Vec<MessageRecord>> {
        let entry = listing_entry_key(key);
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = match conn.get(&entry).await {
            Ok(payload) => payload,
            Err(err) => {
                Self::degraded("listing-get", &err);
                return None;
            }
        };
        match payload {
            Some(payload) => {
                let decoded = decode(&entry, &payload);
                if decoded.is_some() {
                    counter!("brusio_cache_hit_total").increment(1);
                }
                decoded
            }
            None => {
                counter!("brusio_cache_miss_total").increment(1);
                None
            }
        }
    }

    async fn store_listing(&self, key: &ListingKey, messages: &[MessageRecord]) {
        let payload = match serde_json::to_vec(messages) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "brusio::cache", error = %err, "listing failed to encode");
                return;
            }
        };
        let entry = listing_entry_key(key);
        let index = listing_index_key(key.room_id());
        let ttl = self.ttl.as_secs();
        let mut conn = self.conn.clone();

        if let Err(err) = conn.set_ex::<_, _, ()>(&entry, payload, ttl).await {
            Self::degraded("listing-set", &err);
            return;
        }
        if let Err(err) = conn.sadd::<_, _, ()>(&index, &entry).await {
            Self::degraded("listing-index", &err);
            return;
        }
        if let Err(err) = conn.expire::<_, ()>(&index, ttl as i64).await {
            Self::degraded("listing-index-expire", &err);
        }
    }

    async fn message(&self, room_id: ObjectId, id: i64) -> Option<MessageRecord> {
        let entry = message_key(room_id, id);
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = match conn.get(&entry).await {
            Ok(payload) => payload,
            Err(err) => {
                Self::degraded("message-get", &err);
                return None;
            }
        };
        match payload {
            Some(payload) => {
                let decoded = decode(&entry, &payload);
                if decoded.is_some() {
                    counter!("brusio_cache_hit_total").increment(1);
                }
                decoded
            }
            None => {
                counter!("brusio_cache_miss_total").increment(1);
                None
            }
        }
    }

    async fn store_message(&self, message: &MessageRecord) {
        let payload = match serde_json::to_vec(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "brusio::cache", error = %err, "message failed to encode");
                return;
            }
        };
        let entry = message_key(message.room_id, message.id);
        let mut conn = self.conn.clone();
        if let Err(err) = conn
            .set_ex::<_, _, ()>(&entry, payload, self.ttl.as_secs())
            .await
        {
            Self::degraded("message-set", &err);
        }
    }

    async fn invalidate_room(&self, room_id: ObjectId) {
        let index = listing_index_key(room_id);
        let mut conn = self.conn.clone();
        let keys: Vec<String> = match conn.smembers(&index).await {
            Ok(keys) => keys,
            Err(err) => {
                Self::degraded("invalidate-members", &err);
                return;
            }
        };

        let mut doomed = keys;
        doomed.push(index);
        if let Err(err) = conn.del::<_, ()>(doomed).await {
            Self::degraded("invalidate-del", &err);
        }
    }
}
