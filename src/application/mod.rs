//! Application services: the typed operations the HTTP layer calls.

pub mod error;
pub mod listing;
pub mod messages;
pub mod repos;
pub mod rooms;
pub mod users;
