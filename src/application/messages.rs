//! The message service: the one manager that reads through a cache tier.
//!
//! Cache presence is a capability checked at construction, not a subtype:
//! without a cache every call is a plain store round-trip. Cache failures
//! are the adapter's problem (logged and absorbed there) and never surface
//! here.

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

use crate::application::listing::ListWindow;
use crate::application::repos::{MessagesRepo, RepoError, RoomsRepo};
use crate::domain::entities::{MessagePart, MessageRecord, format_rfc3339};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("`{0}` is required")]
    MissingField(&'static str),
    #[error("a message needs at least one part")]
    EmptyParts,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Identifies one cached room listing: the query's identifying parameters,
/// with the limit already clamped so equivalent requests share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    room_id: ObjectId,
    from_ts: Option<String>,
    limit: i64,
}

impl ListingKey {
    pub fn for_window(room_id: ObjectId, window: &ListWindow) -> Self {
        Self {
            room_id,
            from_ts: window.from_ts.map(format_rfc3339),
            limit: window.effective_limit(),
        }
    }

    pub fn room_id(&self) -> ObjectId {
        self.room_id
    }

    pub fn from_ts(&self) -> Option<&str> {
        self.from_ts.as_deref()
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

/// Cache tier for message reads. Implementations are infallible from the
/// caller's point of view: trouble degrades to a miss or a no-op.
#[async_trait]
pub trait MessageCache: Send + Sync {
    async fn listing(&self, key: &ListingKey) -> Option<Vec<MessageRecord>>;

    async fn store_listing(&self, key: &ListingKey, messages: &[MessageRecord]);

    async fn message(&self, room_id: ObjectId, id: i64) -> Option<MessageRecord>;

    async fn store_message(&self, message: &MessageRecord);

    /// Drop every cached listing for the room. Point entries are refreshed
    /// directly instead.
    async fn invalidate_room(&self, room_id: ObjectId);
}

#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub room_id: ObjectId,
    pub user_id: String,
    pub parts: Vec<MessagePart>,
}

#[derive(Clone)]
pub struct MessageService {
    repo: Arc<dyn MessagesRepo>,
    rooms: Arc<dyn RoomsRepo>,
    cache: Option<Arc<dyn MessageCache>>,
}

impl MessageService {
    pub fn new(repo: Arc<dyn MessagesRepo>, rooms: Arc<dyn RoomsRepo>) -> Self {
        Self {
            repo,
            rooms,
            cache: None,
        }
    }

    pub fn with_cache_opt(mut self, cache: Option<Arc<dyn MessageCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub async fn send_message(
        &self,
        command: SendMessageCommand,
    ) -> Result<MessageRecord, MessageError> {
        if command.user_id.trim().is_empty() {
            return Err(MessageError::MissingField("user_id"));
        }
        if command.parts.is_empty() {
            return Err(MessageError::EmptyParts);
        }
        for part in &command.parts {
            if part.part_type.trim().is_empty() {
                return Err(MessageError::MissingField("type"));
            }
        }

        let now = OffsetDateTime::now_utc();
        let message = MessageRecord {
            id: message_id_at(now),
            created_at: format_rfc3339(now),
            parts: command.parts,
            room_id: command.room_id,
            user_id: command.user_id,
            updated_at: now,
        };
        self.repo.insert(&message).await?;

        // The recency marker is advisory; a failed bump must not un-send a
        // durable message.
        if let Err(err) = self.rooms.touch_last_message(command.room_id, now).await {
            warn!(
                target: "brusio::messages",
                room_id = %command.room_id,
                error = %err,
                "failed to bump the room's last-message marker"
            );
        }

        if let Some(cache) = &self.cache {
            cache.invalidate_room(command.room_id).await;
            cache.store_message(&message).await;
        }
        Ok(message)
    }

    pub async fn list_messages(
        &self,
        room_id: ObjectId,
        window: ListWindow,
    ) -> Result<Vec<MessageRecord>, MessageError> {
        let key = ListingKey::for_window(room_id, &window);
        if let Some(cache) = &self.cache {
            if let Some(messages) = cache.listing(&key).await {
                return Ok(messages);
            }
        }

        let messages = self.repo.list_room(room_id, window).await?;
        if let Some(cache) = &self.cache {
            cache.store_listing(&key, &messages).await;
        }
        Ok(messages)
    }

    pub async fn get_message(
        &self,
        room_id: ObjectId,
        id: i64,
    ) -> Result<MessageRecord, MessageError> {
        if let Some(cache) = &self.cache {
            if let Some(message) = cache.message(room_id, id).await {
                return Ok(message);
            }
        }

        let message = self.repo.find_in_room(room_id, id).await?;
        if let Some(cache) = &self.cache {
            cache.store_message(&message).await;
        }
        Ok(message)
    }
}

/// Creation-ordered identifier: microseconds since the Unix epoch. The
/// store's unique `_id` index backstops the (remote) collision case.
fn message_id_at(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::entities::RoomRecord;

    #[derive(Default)]
    struct CountingMessagesRepo {
        list_calls: AtomicUsize,
        inserted: Mutex<Vec<MessageRecord>>,
    }

    #[async_trait]
    impl MessagesRepo for CountingMessagesRepo {
        async fn insert(&self, message: &MessageRecord) -> Result<(), RepoError> {
            self.inserted.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn find_in_room(
            &self,
            _room_id: ObjectId,
            _id: i64,
        ) -> Result<MessageRecord, RepoError> {
            Err(RepoError::NotFound)
        }

        async fn list_room(
            &self,
            _room_id: ObjectId,
            _window: ListWindow,
        ) -> Result<Vec<MessageRecord>, RepoError> {
            self.list_calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.inserted.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct RecordingRoomsRepo {
        touched: Mutex<Vec<ObjectId>>,
        fail_touch: bool,
    }

    #[async_trait]
    impl RoomsRepo for RecordingRoomsRepo {
        async fn insert(&self, _room: &RoomRecord) -> Result<ObjectId, RepoError> {
            Ok(ObjectId::new())
        }

        async fn find_by_id(&self, _id: ObjectId) -> Result<RoomRecord, RepoError> {
            Err(RepoError::NotFound)
        }

        async fn list(&self, _window: ListWindow) -> Result<Vec<RoomRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn touch_last_message(
            &self,
            id: ObjectId,
            _at: OffsetDateTime,
        ) -> Result<(), RepoError> {
            if self.fail_touch {
                return Err(RepoError::unavailable("store down"));
            }
            self.touched.lock().unwrap().push(id);
            Ok(())
        }
    }

    /// In-memory stand-in mirroring the invalidation contract.
    #[derive(Default)]
    struct MemoryCache {
        listings: Mutex<HashMap<ListingKey, Vec<MessageRecord>>>,
        invalidations: AtomicUsize,
    }

    #[async_trait]
    impl MessageCache for MemoryCache {
        async fn listing(&self, key: &ListingKey) -> Option<Vec<MessageRecord>> {
            self.listings.lock().unwrap().get(key).cloned()
        }

        async fn store_listing(&self, key: &ListingKey, messages: &[MessageRecord]) {
            self.listings
                .lock()
                .unwrap()
                .insert(key.clone(), messages.to_vec());
        }

        async fn message(&self, _room_id: ObjectId, _id: i64) -> Option<MessageRecord> {
            None
        }

        async fn store_message(&self, _message: &MessageRecord) {}

        async fn invalidate_room(&self, room_id: ObjectId) {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            self.listings
                .lock()
                .unwrap()
                .retain(|key, _| key.room_id() != room_id);
        }
    }

    fn text_part(content: &str) -> MessagePart {
        MessagePart {
            content: content.to_string(),
            part_type: "text/plain".to_string(),
            url: None,
            attachment: None,
        }
    }

    fn send(room_id: ObjectId) -> SendMessageCommand {
        SendMessageCommand {
            room_id,
            user_id: "ada".to_string(),
            parts: vec![text_part("hello")],
        }
    }

    #[tokio::test]
    async fn repeated_listing_hits_the_store_once() {
        let repo = Arc::new(CountingMessagesRepo::default());
        let rooms = Arc::new(RecordingRoomsRepo::default());
        let cache = Arc::new(MemoryCache::default());
        let service = MessageService::new(repo.clone(), rooms)
            .with_cache_opt(Some(cache as Arc<dyn MessageCache>));
        let room_id = ObjectId::new();

        let window = ListWindow::default();
        service.list_messages(room_id, window).await.expect("first");
        service.list_messages(room_id, window).await.expect("second");

        assert_eq!(repo.list_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn a_send_invalidates_the_room_listings() {
        let repo = Arc::new(CountingMessagesRepo::default());
        let rooms = Arc::new(RecordingRoomsRepo::default());
        let cache = Arc::new(MemoryCache::default());
        let service = MessageService::new(repo.clone(), rooms)
            .with_cache_opt(Some(cache.clone() as Arc<dyn MessageCache>));
        let room_id = ObjectId::new();
        let window = ListWindow::default();

        service.list_messages(room_id, window).await.expect("warm");
        service.send_message(send(room_id)).await.expect("send");
        let after = service.list_messages(room_id, window).await.expect("re-read");

        assert_eq!(cache.invalidations.load(Ordering::Relaxed), 1);
        assert_eq!(repo.list_calls.load(Ordering::Relaxed), 2);
        assert_eq!(after.len(), 1, "the re-read reflects the write");
    }

    #[tokio::test]
    async fn listings_for_other_rooms_survive_an_invalidation() {
        let repo = Arc::new(CountingMessagesRepo::default());
        let rooms = Arc::new(RecordingRoomsRepo::default());
        let cache = Arc::new(MemoryCache::default());
        let service = MessageService::new(repo.clone(), rooms)
            .with_cache_opt(Some(cache.clone() as Arc<dyn MessageCache>));
        let room_a = ObjectId::new();
        let room_b = ObjectId::new();
        let window = ListWindow::default();

        service.list_messages(room_a, window).await.expect("warm a");
        service.list_messages(room_b, window).await.expect("warm b");
        service.send_message(send(room_a)).await.expect("send");
        service.list_messages(room_b, window).await.expect("b again");

        // Rooms a and b each warmed once; only room a re-queries.
        assert_eq!(repo.list_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn works_without_a_cache() {
        let repo = Arc::new(CountingMessagesRepo::default());
        let rooms = Arc::new(RecordingRoomsRepo::default());
        let service = MessageService::new(repo.clone(), rooms);
        let room_id = ObjectId::new();

        service
            .list_messages(room_id, ListWindow::default())
            .await
            .expect("list");
        service
            .list_messages(room_id, ListWindow::default())
            .await
            .expect("list again");

        assert_eq!(repo.list_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn send_stamps_an_ordering_significant_id() {
        let repo = Arc::new(CountingMessagesRepo::default());
        let rooms = Arc::new(RecordingRoomsRepo::default());
        let service = MessageService::new(repo.clone(), rooms.clone());
        let room_id = ObjectId::new();

        let first = service.send_message(send(room_id)).await.expect("first");
        let second = service.send_message(send(room_id)).await.expect("second");

        assert!(second.id >= first.id);
        assert_eq!(first.created_at, {
            // The stored string and the version stamp describe one instant.
            format_rfc3339(first.updated_at)
        });
        assert_eq!(rooms.touched.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn a_failed_recency_bump_does_not_fail_the_send() {
        let repo = Arc::new(CountingMessagesRepo::default());
        let rooms = Arc::new(RecordingRoomsRepo {
            fail_touch: true,
            ..RecordingRoomsRepo::default()
        });
        let service = MessageService::new(repo.clone(), rooms);

        let sent = service.send_message(send(ObjectId::new())).await;
        assert!(sent.is_ok());
        assert_eq!(repo.inserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_validates_its_input() {
        let repo = Arc::new(CountingMessagesRepo::default());
        let rooms = Arc::new(RecordingRoomsRepo::default());
        let service = MessageService::new(repo, rooms);
        let room_id = ObjectId::new();

        let result = service
            .send_message(SendMessageCommand {
                room_id,
                user_id: String::new(),
                parts: vec![text_part("hi")],
            })
            .await;
        assert!(matches!(result, Err(MessageError::MissingField("user_id"))));

        let result = service
            .send_message(SendMessageCommand {
                room_id,
                user_id: "ada".to_string(),
                parts: Vec::new(),
            })
            .await;
        assert!(matches!(result, Err(MessageError::EmptyParts)));
    }

    #[test]
    fn listing_keys_separate_windows_and_rooms() {
        let room_a = ObjectId::new();
        let room_b = ObjectId::new();
        let base = ListWindow::default();
        let narrower = ListWindow::new(None, Some(5));

        assert_eq!(
            ListingKey::for_window(room_a, &base),
            ListingKey::for_window(room_a, &base)
        );
        assert_ne!(
            ListingKey::for_window(room_a, &base),
            ListingKey::for_window(room_b, &base)
        );
        assert_ne!(
            ListingKey::for_window(room_a, &base),
            ListingKey::for_window(room_a, &narrower)
        );
        // Requests that clamp to the same effective limit share an entry.
        assert_eq!(
            ListingKey::for_window(room_a, &ListWindow::new(None, Some(500))),
            ListingKey::for_window(room_a, &base)
        );
    }
}
