//! Persistent chat entities as they live in the document store.
//!
//! Timestamps persist as native BSON datetimes except for message creation
//! times, which keep the original wire shape: an RFC3339 string. With a
//! fixed UTC offset those strings sort chronologically, which the message
//! listing query relies on.

use bson::oid::ObjectId;
use bson::serde_helpers::time_0_3_offsetdatetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::custom_data::CustomData;

/// A chat user. The identifier is assigned by the calling application and is
/// immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub custom_data: CustomData,
    #[serde(with = "time_0_3_offsetdatetime_as_bson_datetime")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time_0_3_offsetdatetime_as_bson_datetime")]
    pub updated_at: OffsetDateTime,
}

/// A room. The identifier is generated by the store on insert, so it is
/// absent until the first write completes.
///
/// `created_by_id` references a [`UserRecord`]; referential integrity is the
/// caller's concern, not this layer's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub private: bool,
    pub push_notification_title_override: String,
    pub created_by_id: String,
    #[serde(with = "time_0_3_offsetdatetime_as_bson_datetime")]
    pub last_message_at: OffsetDateTime,
    #[serde(with = "time_0_3_offsetdatetime_as_bson_datetime")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time_0_3_offsetdatetime_as_bson_datetime")]
    pub updated_at: OffsetDateTime,
    pub custom_data: CustomData,
}

/// A message. The identifier is a creation-ordered integer (microseconds
/// since the Unix epoch at send time); the store's unique index on `_id` is
/// the collision backstop.
///
/// Part order carries meaning and is preserved end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(rename = "_id")]
    pub id: i64,
    pub created_at: String,
    pub parts: Vec<MessagePart>,
    pub room_id: ObjectId,
    pub user_id: String,
    #[serde(with = "time_0_3_offsetdatetime_as_bson_datetime")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    pub content: String,
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: ObjectId,
    pub custom_data: CustomData,
    pub download_url: String,
    pub expiration: String,
    pub name: String,
    pub refresh_url: String,
    pub size: i64,
}

/// RFC3339 rendering shared by message stamps and API payloads.
pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .expect("in-range timestamps format as RFC3339")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_strings_sort_chronologically() {
        let earlier = format_rfc3339(OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap());
        let later = format_rfc3339(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn message_serializes_id_under_underscore_id() {
        let message = MessageRecord {
            id: 42,
            created_at: format_rfc3339(OffsetDateTime::UNIX_EPOCH),
            parts: vec![MessagePart {
                content: "hi".to_string(),
                part_type: "text/plain".to_string(),
                url: None,
                attachment: None,
            }],
            room_id: ObjectId::new(),
            user_id: "ada".to_string(),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let doc = bson::to_document(&message).expect("to bson");
        assert_eq!(doc.get_i64("_id").expect("_id"), 42);
        assert_eq!(
            doc.get_array("parts").expect("parts").len(),
            1,
            "part order and count survive encoding"
        );
    }
}
