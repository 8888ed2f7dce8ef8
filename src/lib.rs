//! Brusio is a self-hosted chat backend: users, rooms, and messages stored
//! in MongoDB, with room message listings served through a Redis cache tier
//! when one is configured.
//!
//! The crate is layered: `domain` holds the persistent entity shapes,
//! `application` the services and the traits they depend on, `infra` the
//! MongoDB/Redis adapters and the HTTP surface, and `config` the settings
//! loader.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
