//! Wire payloads for the chat API.
//!
//! Timestamps serialize as RFC3339 strings; room and attachment identifiers
//! as 24-hex-character strings; `custom_data` as the caller's own JSON,
//! byte-for-byte, or `null` when none was supplied.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::listing::ListWindow;
use crate::application::rooms::CreateRoomCommand;
use crate::application::users::{CreateUserCommand, UpdateUserCommand};
use crate::domain::custom_data::CustomData;
use crate::domain::entities::{
    AttachmentRecord, MessagePart, MessageRecord, RoomRecord, UserRecord, format_rfc3339,
};
use crate::infra::http::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub custom_data: Option<Box<RawValue>>,
}

impl CreateUserRequest {
    pub fn into_command(self) -> CreateUserCommand {
        CreateUserCommand {
            id: self.id,
            name: self.name,
            avatar_url: self.avatar_url,
            custom_data: custom_data_from(self.custom_data),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub custom_data: Option<Box<RawValue>>,
}

impl UpdateUserRequest {
    pub fn into_command(self, id: String) -> UpdateUserCommand {
        UpdateUserCommand {
            id,
            name: self.name,
            avatar_url: self.avatar_url,
            custom_data: custom_data_from(self.custom_data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub custom_data: Option<Box<RawValue>>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserResponse {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            avatar_url: record.avatar_url.clone(),
            custom_data: raw_custom_data(&record.custom_data),
            created_at: format_rfc3339(record.created_at),
            updated_at: format_rfc3339(record.updated_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub push_notification_title_override: String,
    pub created_by_id: String,
    #[serde(default)]
    pub custom_data: Option<Box<RawValue>>,
}

impl CreateRoomRequest {
    pub fn into_command(self) -> CreateRoomCommand {
        CreateRoomCommand {
            name: self.name,
            private: self.private,
            push_notification_title_override: self.push_notification_title_override,
            created_by_id: self.created_by_id,
            custom_data: custom_data_from(self.custom_data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub private: bool,
    pub push_notification_title_override: String,
    pub created_by_id: String,
    pub last_message_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub custom_data: Option<Box<RawValue>>,
}

impl RoomResponse {
    pub fn from_record(record: &RoomRecord) -> Self {
        Self {
            id: record.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: record.name.clone(),
            private: record.private,
            push_notification_title_override: record.push_notification_title_override.clone(),
            created_by_id: record.created_by_id.clone(),
            last_message_at: format_rfc3339(record.last_message_at),
            created_at: format_rfc3339(record.created_at),
            updated_at: format_rfc3339(record.updated_at),
            custom_data: raw_custom_data(&record.custom_data),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: String,
    pub parts: Vec<MessagePartPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePartPayload {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentPayload>,
}

impl MessagePartPayload {
    pub fn into_part(self) -> MessagePart {
        MessagePart {
            content: self.content,
            part_type: self.part_type,
            url: self.url,
            attachment: self.attachment.map(AttachmentPayload::into_record),
        }
    }

    fn from_part(part: &MessagePart) -> Self {
        Self {
            content: part.content.clone(),
            part_type: part.part_type.clone(),
            url: part.url.clone(),
            attachment: part.attachment.as_ref().map(AttachmentPayload::from_record),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPayload {
    /// Absent on input: the attachment then gets a fresh identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub custom_data: Option<Box<RawValue>>,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub expiration: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub refresh_url: String,
    #[serde(default)]
    pub size: i64,
}

impl AttachmentPayload {
    fn into_record(self) -> AttachmentRecord {
        let id = self
            .id
            .as_deref()
            .and_then(|raw| ObjectId::parse_str(raw).ok())
            .unwrap_or_else(ObjectId::new);
        AttachmentRecord {
            id,
            custom_data: custom_data_from(self.custom_data),
            download_url: self.download_url,
            expiration: self.expiration,
            name: self.name,
            refresh_url: self.refresh_url,
            size: self.size,
        }
    }

    fn from_record(record: &AttachmentRecord) -> Self {
        Self {
            id: Some(record.id.to_hex()),
            custom_data: raw_custom_data(&record.custom_data),
            download_url: record.download_url.clone(),
            expiration: record.expiration.clone(),
            name: record.name.clone(),
            refresh_url: record.refresh_url.clone(),
            size: record.size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub created_at: String,
    pub parts: Vec<MessagePartPayload>,
    pub room_id: String,
    pub user_id: String,
    pub updated_at: String,
}

impl MessageResponse {
    pub fn from_record(record: &MessageRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at.clone(),
            parts: record.parts.iter().map(MessagePartPayload::from_part).collect(),
            room_id: record.room_id.to_hex(),
            user_id: record.user_id.clone(),
            updated_at: format_rfc3339(record.updated_at),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub from_ts: Option<String>,
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn window(&self) -> Result<ListWindow, ApiError> {
        let from_ts = match self.from_ts.as_deref() {
            Some(raw) => Some(OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| {
                ApiError::bad_request(format!("`{raw}` is not an RFC3339 timestamp"))
            })?),
            None => None,
        };
        Ok(ListWindow::new(from_ts, self.limit))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersByIdsQuery {
    #[serde(default)]
    pub id: Vec<String>,
}

fn custom_data_from(raw: Option<Box<RawValue>>) -> CustomData {
    raw.map(|raw| CustomData::from_raw_json(&raw))
        .unwrap_or_default()
}

fn raw_custom_data(data: &CustomData) -> Option<Box<RawValue>> {
    if data.is_empty() {
        return None;
    }
    let text = String::from_utf8(data.as_bytes().to_vec()).ok()?;
    RawValue::from_string(text).ok()
}
