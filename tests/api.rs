//! Router-level tests against in-memory repositories.
//!
//! These exercise the full HTTP surface (binding, validation, middleware,
//! error mapping) with repository stand-ins that mirror the store's
//! semantics: duplicate detection, threshold filtering, limit clamping, and
//! membership listings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use bson::oid::ObjectId;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tower::ServiceExt;

use brusio::application::listing::ListWindow;
use brusio::application::messages::MessageService;
use brusio::application::repos::{
    MessagesRepo, RepoError, RoomsRepo, StorePing, UsersRepo,
};
use brusio::application::rooms::RoomService;
use brusio::application::users::UserService;
use brusio::domain::entities::{MessageRecord, RoomRecord, UserRecord};
use brusio::infra::http::{AppState, build_router};

#[derive(Default)]
struct InMemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    rooms: Mutex<HashMap<ObjectId, RoomRecord>>,
    messages: Mutex<Vec<MessageRecord>>,
    store_down: AtomicBool,
}

#[async_trait]
impl UsersRepo for InMemoryStore {
    async fn insert(&self, user: &UserRecord) -> Result<(), RepoError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.id) {
            return Err(RepoError::Duplicate {
                id: user.id.clone(),
            });
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<UserRecord, RepoError> {
        self.users
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list(&self, window: ListWindow) -> Result<Vec<UserRecord>, RepoError> {
        let mut users: Vec<UserRecord> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|user| match window.from_ts {
                Some(from_ts) => user.created_at > from_ts,
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users.truncate(window.effective_limit() as usize);
        Ok(users)
    }

    async fn list_by_ids(&self, ids: &[String]) -> Result<Vec<UserRecord>, RepoError> {
        let users = self.users.lock().unwrap();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn replace(
        &self,
        user: &UserRecord,
        expected_updated_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let mut users = self.users.lock().unwrap();
        match users.get(&user.id) {
            Some(stored) if stored.updated_at == expected_updated_at => {
                users.insert(user.id.clone(), user.clone());
                Ok(())
            }
            Some(_) => Err(RepoError::StaleWrite),
            None => Err(RepoError::NotFound),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), RepoError> {
        self.users
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl RoomsRepo for InMemoryStore {
    async fn insert(&self, room: &RoomRecord) -> Result<ObjectId, RepoError> {
        let id = ObjectId::new();
        let mut stored = room.clone();
        stored.id = Some(id);
        self.rooms.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<RoomRecord, RepoError> {
        self.rooms
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list(&self, window: ListWindow) -> Result<Vec<RoomRecord>, RepoError> {
        let mut rooms: Vec<RoomRecord> = self.rooms.lock().unwrap().values().cloned().collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms.truncate(window.effective_limit() as usize);
        Ok(rooms)
    }

    async fn touch_last_message(&self, id: ObjectId, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms.get_mut(&id).ok_or(RepoError::NotFound)?;
        room.last_message_at = at;
        Ok(())
    }
}

#[async_trait]
impl MessagesRepo for InMemoryStore {
    async fn insert(&self, message: &MessageRecord) -> Result<(), RepoError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn find_in_room(&self, room_id: ObjectId, id: i64) -> Result<MessageRecord, RepoError> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|message| message.room_id == room_id && message.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list_room(
        &self,
        room_id: ObjectId,
        window: ListWindow,
    ) -> Result<Vec<MessageRecord>, RepoError> {
        let mut messages: Vec<MessageRecord> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|message| message.room_id == room_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (&b.created_at, b.id).cmp(&(&a.created_at, a.id)));
        messages.truncate(window.effective_limit() as usize);
        Ok(messages)
    }
}

#[async_trait]
impl StorePing for InMemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.store_down.load(Ordering::Relaxed) {
            return Err(RepoError::unavailable("ping failed"));
        }
        Ok(())
    }
}

fn app() -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::default());
    let users_repo: Arc<dyn UsersRepo> = store.clone();
    let rooms_repo: Arc<dyn RoomsRepo> = store.clone();
    let messages_repo: Arc<dyn MessagesRepo> = store.clone();
    let ping: Arc<dyn StorePing> = store.clone();

    let state = AppState {
        users: UserService::new(users_repo),
        rooms: RoomService::new(rooms_repo.clone()),
        messages: MessageService::new(messages_repo, rooms_repo),
        store: ping,
    };
    (build_router(state), store)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, String) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn parse(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or(Value::Null)
}

#[tokio::test]
async fn create_then_get_round_trips_the_user() {
    let (router, _) = app();

    // Raw body on purpose: `json!` would sort the custom_data keys, and the
    // point is that the caller's exact bytes come back.
    let raw_body = concat!(
        r#"{"id":"ada","name":"Ada","avatar_url":"https://example.test/ada.png","#,
        r#""custom_data":{"z":1,"a":2}}"#
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(raw_body))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let (status, body) = send(&router, Method::GET, "/api/users/ada", None).await;
    assert_eq!(status, StatusCode::OK);

    let user = parse(&body);
    assert_eq!(user["id"], "ada");
    assert_eq!(user["name"], "Ada");
    assert_eq!(user["avatar_url"], "https://example.test/ada.png");
    // Byte-for-byte round trip, key order included.
    assert!(
        body.contains(r#""custom_data":{"z":1,"a":2}"#),
        "custom_data was reserialized: {body}"
    );
}

#[tokio::test]
async fn duplicate_create_conflicts_and_keeps_the_original() {
    let (router, _) = app();

    let first = json!({"id": "ada", "name": "Ada"});
    let second = json!({"id": "ada", "name": "Imposter"});

    let (status, _) = send(&router, Method::POST, "/api/users", Some(first)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&router, Method::POST, "/api/users", Some(second)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse(&body)["error"]["code"], "duplicate_key");

    let (_, body) = send(&router, Method::GET, "/api/users/ada", None).await;
    assert_eq!(parse(&body)["name"], "Ada");
}

#[tokio::test]
async fn missing_user_is_a_not_found() {
    let (router, _) = app();
    let (status, body) = send(&router, Method::GET, "/api/users/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse(&body)["error"]["code"], "not_found");
}

#[tokio::test]
async fn empty_required_fields_fail_validation() {
    let (router, _) = app();
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/users",
        Some(json!({"id": "ada", "name": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["error"]["code"], "validation_failed");
}

#[tokio::test]
async fn listing_clamps_out_of_range_limits() {
    let (router, _) = app();

    for index in 0..25 {
        let (status, _) = send(
            &router,
            Method::POST,
            "/api/users",
            Some(json!({"id": format!("user-{index}"), "name": "User"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&router, Method::GET, "/api/users?limit=500", None).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 20);

    let (_, body) = send(&router, Method::GET, "/api/users?limit=101", None).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 20);

    let (_, body) = send(&router, Method::GET, "/api/users?limit=100", None).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 25);

    let (_, body) = send(&router, Method::GET, "/api/users", None).await;
    assert_eq!(parse(&body).as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn future_thresholds_list_nothing() {
    let (router, _) = app();

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/users",
        Some(json!({"id": "ada", "name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/users?from_ts=2999-01-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body), json!([]));
}

#[tokio::test]
async fn malformed_thresholds_are_rejected() {
    let (router, _) = app();
    let (status, body) = send(&router, Method::GET, "/api/users?from_ts=yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["error"]["code"], "bad_request");
}

#[tokio::test]
async fn membership_listing_omits_missing_ids() {
    let (router, _) = app();

    for id in ["a", "c"] {
        let (status, _) = send(
            &router,
            Method::POST,
            "/api/users",
            Some(json!({"id": id, "name": "User"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/users_by_ids?id=a&id=b&id=c",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let listed = parse(&body);
    let mut ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["id"].as_str().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn update_replaces_the_mutable_attributes() {
    let (router, _) = app();

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/users",
        Some(json!({"id": "ada", "name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/users/ada",
        Some(json!({"name": "Ada L.", "avatar_url": "https://example.test/new.png"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(parse(&body)["name"], "Ada L.");

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/users/ghost",
        Some(json!({"name": "Ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_the_user() {
    let (router, _) = app();

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/users",
        Some(json!({"id": "ada", "name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&router, Method::DELETE, "/api/users/ada", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, Method::GET, "/api/users/ada", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_create_makes_every_member() {
    let (router, _) = app();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/batch_users",
        Some(json!([
            {"id": "ada", "name": "Ada"},
            {"id": "brian", "name": "Brian"},
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(parse(&body).as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn message_flow_spans_rooms_and_messages() {
    let (router, _) = app();

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/users",
        Some(json!({"id": "ada", "name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/rooms",
        Some(json!({"name": "general", "created_by_id": "ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    let room_id = parse(&body)["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("/api/rooms/{room_id}/messages"),
        Some(json!({
            "user_id": "ada",
            "parts": [
                {"type": "text/plain", "content": "hello"},
                {"type": "image/png", "url": "https://example.test/cat.png"},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    let message_id = parse(&body)["id"].as_i64().unwrap();

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/rooms/{room_id}/messages"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listing = parse(&body);
    let messages = listing.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    let parts = messages[0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2, "part order and count are preserved");
    assert_eq!(parts[0]["type"], "text/plain");
    assert_eq!(parts[1]["type"], "image/png");

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/rooms/{room_id}/messages/{message_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["user_id"], "ada");

    // The send bumped the room's recency marker.
    let (_, body) = send(&router, Method::GET, &format!("/api/rooms/{room_id}"), None).await;
    let room = parse(&body);
    assert_ne!(room["last_message_at"], "1970-01-01T00:00:00Z");
}

#[tokio::test]
async fn malformed_room_ids_are_rejected() {
    let (router, _) = app();
    let (status, body) = send(&router, Method::GET, "/api/rooms/not-hex/messages", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["error"]["code"], "bad_request");
}

#[tokio::test]
async fn unknown_rooms_are_not_found() {
    let (router, _) = app();
    let room_id = ObjectId::new().to_hex();
    let (status, _) = send(&router, Method::GET, &format!("/api/rooms/{room_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn declared_but_unimplemented_routes_answer_501() {
    let (router, _) = app();

    let (status, _) = send(&router, Method::GET, "/api/roles", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(&router, Method::POST, "/api/token", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let room_id = ObjectId::new().to_hex();
    let (status, _) = send(
        &router,
        Method::POST,
        &format!("/api/rooms/{room_id}/typing_indicators"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn healthz_reports_store_liveness() {
    let (router, store) = app();

    let (status, _) = send(&router, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    store.store_down.store(true, Ordering::Relaxed);
    let (status, _) = send(&router, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
